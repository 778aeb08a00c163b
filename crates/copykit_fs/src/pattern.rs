//! Include/exclude pattern compilation and relative-path matching.

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::spec::{CopyTreeError, EnumCopyPatternMode};

////////////////////////////////////////////////////////////////////////////////
// #region CompiledPatterns

/// One compiled pattern list in a single dialect.
#[derive(Debug, Clone)]
pub(crate) enum TypeCopyPatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

impl TypeCopyPatternSeq {
    /// True when any pattern in the list matches the relative-path text.
    fn is_match(&self, c_path_rel: &str) -> bool {
        match self {
            Self::Literal(l_literal) => l_literal.iter().any(|p| c_path_rel.contains(p.as_str())),
            Self::Glob(l_glob) => l_glob.iter().any(|p| p.is_match(c_path_rel)),
            Self::Regex(l_regex) => l_regex.iter().any(|p| p.is_match(c_path_rel)),
        }
    }
}

/// Compiled include/exclude pattern sets for the file and directory axes.
///
/// An absent (or empty) include list means "match everything" on that axis.
/// Exclude always overrides include.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecCopyPatterns {
    patterns_include_files: Option<TypeCopyPatternSeq>,
    patterns_exclude_files: Option<TypeCopyPatternSeq>,
    patterns_include_dirs: Option<TypeCopyPatternSeq>,
    patterns_exclude_dirs: Option<TypeCopyPatternSeq>,
}

impl SpecCopyPatterns {
    /// Compile all four raw lists, failing fast on invalid pattern syntax.
    pub(crate) fn from_raw(
        patterns_include_files: Option<&[String]>,
        patterns_exclude_files: Option<&[String]>,
        patterns_include_dirs: Option<&[String]>,
        patterns_exclude_dirs: Option<&[String]>,
        rule_pattern: EnumCopyPatternMode,
    ) -> Result<Self, CopyTreeError> {
        Ok(Self {
            patterns_include_files: _compile(patterns_include_files, rule_pattern)?,
            patterns_exclude_files: _compile(patterns_exclude_files, rule_pattern)?,
            patterns_include_dirs: _compile(patterns_include_dirs, rule_pattern)?,
            patterns_exclude_dirs: _compile(patterns_exclude_dirs, rule_pattern)?,
        })
    }

    /// True when a file at this relative path must not be copied.
    pub(crate) fn is_file_excluded(&self, c_path_rel: &str) -> bool {
        _is_excluded(
            c_path_rel,
            self.patterns_include_files.as_ref(),
            self.patterns_exclude_files.as_ref(),
        )
    }

    /// True when a directory at this relative path (and its whole subtree)
    /// must be pruned.
    pub(crate) fn is_dir_excluded(&self, c_path_rel: &str) -> bool {
        _is_excluded(
            c_path_rel,
            self.patterns_include_dirs.as_ref(),
            self.patterns_exclude_dirs.as_ref(),
        )
    }
}

fn _is_excluded(
    c_path_rel: &str,
    patterns_include: Option<&TypeCopyPatternSeq>,
    patterns_exclude: Option<&TypeCopyPatternSeq>,
) -> bool {
    let b_included = patterns_include.is_none_or(|pats| pats.is_match(c_path_rel));
    let b_excluded = patterns_exclude.is_some_and(|pats| pats.is_match(c_path_rel));
    !b_included || b_excluded
}

fn _compile(
    patterns: Option<&[String]>,
    rule_pattern: EnumCopyPatternMode,
) -> Result<Option<TypeCopyPatternSeq>, CopyTreeError> {
    let Some(patterns) = patterns else {
        return Ok(None);
    };
    // An explicit empty sequence is normalized to "no constraint".
    if patterns.is_empty() {
        return Ok(None);
    }

    match rule_pattern {
        EnumCopyPatternMode::Literal => Ok(Some(TypeCopyPatternSeq::Literal(patterns.to_vec()))),
        EnumCopyPatternMode::Glob => {
            let mut l_glob = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matcher = Glob::new(pattern)
                    .map_err(|e| {
                        CopyTreeError::InvalidPattern(format!(
                            "Invalid pattern in include/exclude: {e}"
                        ))
                    })?
                    .compile_matcher();
                l_glob.push(matcher);
            }
            Ok(Some(TypeCopyPatternSeq::Glob(l_glob)))
        }
        EnumCopyPatternMode::Regex => {
            let mut l_regex = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex = Regex::new(pattern).map_err(|e| {
                    CopyTreeError::InvalidPattern(format!("Invalid pattern in include/exclude: {e}"))
                })?;
                l_regex.push(regex);
            }
            Ok(Some(TypeCopyPatternSeq::Regex(l_regex)))
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
