//! Copy rule enums, options, task model, and top-level error types.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region RuleEnums

/// Symlink handling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopySymlinkStrategy {
    /// Follow the link and copy the target bytes/entries.
    Dereference,
    /// Recreate the symbolic link at the destination (do not copy target bytes).
    CopySymlinks,
    /// Skip symlink entries, recording a warning for each matched one.
    SkipSymlinks,
}

/// Existing destination file conflict policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopyFileConflictStrategy {
    /// Keep the destination file and count the source file as skipped.
    Skip,
    /// Replace the destination file with the source file.
    Overwrite,
    /// Record an error and leave the destination file untouched.
    Error,
}

/// Existing destination directory conflict policy.
///
/// Directory conflicts govern creation only: an existing directory is never
/// truncated or replaced, and descent into the source subtree is not affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopyDirectoryConflictStrategy {
    /// Count the existing destination directory as skipped.
    Skip,
    /// Reuse the existing destination directory.
    Merge,
    /// Record an error when the destination directory already exists.
    Error,
}

/// Pattern matching mode for include/exclude lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopyPatternMode {
    /// Shell-like wildcards (`*`, `**`, `?`, character classes).
    Glob,
    /// Regular expression pattern (unanchored search).
    Regex,
    /// Substring containment.
    Literal,
}

/// Depth filter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopyDepthLimitMode {
    /// Include entries with depth `<= depth_limit`.
    AtMost,
    /// Include entries with depth exactly equal to `depth_limit`.
    Exact,
}

impl FromStr for EnumCopySymlinkStrategy {
    type Err = CopyTreeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "dereference" => Ok(Self::Dereference),
            "copy_symlinks" => Ok(Self::CopySymlinks),
            "skip_symlinks" => Ok(Self::SkipSymlinks),
            _ => Err(CopyTreeError::InvalidRule(format!(
                "Invalid symlink strategy: `{value}`. \
                 Expected one of: ['dereference', 'copy_symlinks', 'skip_symlinks']"
            ))),
        }
    }
}

impl FromStr for EnumCopyFileConflictStrategy {
    type Err = CopyTreeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "skip" => Ok(Self::Skip),
            "overwrite" => Ok(Self::Overwrite),
            "error" => Ok(Self::Error),
            _ => Err(CopyTreeError::InvalidRule(format!(
                "Invalid file conflict strategy: `{value}`. \
                 Expected one of: ['skip', 'overwrite', 'error']"
            ))),
        }
    }
}

impl FromStr for EnumCopyDirectoryConflictStrategy {
    type Err = CopyTreeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "skip" => Ok(Self::Skip),
            "merge" => Ok(Self::Merge),
            "error" => Ok(Self::Error),
            _ => Err(CopyTreeError::InvalidRule(format!(
                "Invalid directory conflict strategy: `{value}`. \
                 Expected one of: ['skip', 'merge', 'error']"
            ))),
        }
    }
}

impl FromStr for EnumCopyPatternMode {
    type Err = CopyTreeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "glob" => Ok(Self::Glob),
            "regex" => Ok(Self::Regex),
            "literal" => Ok(Self::Literal),
            _ => Err(CopyTreeError::InvalidRule(format!(
                "Invalid pattern strategy: `{value}`. \
                 Expected one of: ['glob', 'regex', 'literal']"
            ))),
        }
    }
}

impl FromStr for EnumCopyDepthLimitMode {
    type Err = CopyTreeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "at_most" => Ok(Self::AtMost),
            "exact" => Ok(Self::Exact),
            _ => Err(CopyTreeError::InvalidRule(format!(
                "Invalid depth mode: `{value}`. Expected one of: ['at_most', 'exact']"
            ))),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region OptionsAndTasks

/// Input options for [`crate::copy_tree`].
///
/// Built once per invocation, validated before traversal starts, and shared
/// read-only across the walker and all workers.
#[derive(Debug, Clone)]
pub struct SpecCopyOptions {
    /// Include patterns applied to file paths relative to the source root.
    pub patterns_include_files: Option<Vec<String>>,
    /// Exclude patterns applied to file paths relative to the source root.
    pub patterns_exclude_files: Option<Vec<String>>,
    /// Include patterns applied to directory paths relative to the source root.
    pub patterns_include_dirs: Option<Vec<String>>,
    /// Exclude patterns applied to directory paths relative to the source root.
    pub patterns_exclude_dirs: Option<Vec<String>>,
    /// Pattern interpretation mode.
    pub rule_pattern: EnumCopyPatternMode,
    /// Conflict behavior for destination files.
    pub rule_conflict_file: EnumCopyFileConflictStrategy,
    /// Conflict behavior for destination directories.
    pub rule_conflict_dir: EnumCopyDirectoryConflictStrategy,
    /// Symlink handling behavior.
    pub rule_symlink: EnumCopySymlinkStrategy,
    /// Optional depth bound interpreted through `rule_depth_limit`.
    /// Entries directly under the source root have depth 0.
    pub depth_limit: Option<usize>,
    /// Depth evaluation mode.
    pub rule_depth_limit: EnumCopyDepthLimitMode,
    /// Ceiling on concurrent copy workers (None picks a host-derived default).
    pub num_workers_max: Option<usize>,
    /// Mirror the relative source tree in the destination; `false` flattens
    /// matched files directly under the destination root.
    pub if_keep_tree: bool,
    /// Perform every decision step without mutating the filesystem.
    pub if_dry_run: bool,
}

impl Default for SpecCopyOptions {
    fn default() -> Self {
        Self {
            patterns_include_files: None,
            patterns_exclude_files: None,
            patterns_include_dirs: None,
            patterns_exclude_dirs: None,
            rule_pattern: EnumCopyPatternMode::Glob,
            rule_conflict_file: EnumCopyFileConflictStrategy::Skip,
            rule_conflict_dir: EnumCopyDirectoryConflictStrategy::Skip,
            rule_symlink: EnumCopySymlinkStrategy::CopySymlinks,
            depth_limit: None,
            rule_depth_limit: EnumCopyDepthLimitMode::AtMost,
            num_workers_max: None,
            if_keep_tree: true,
            if_dry_run: false,
        }
    }
}

/// Kind of filesystem entry a copy task acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopyEntryKind {
    /// Regular file (or dereferenced symlink target file).
    File,
    /// Directory to create at the destination.
    Directory,
    /// Symbolic link to recreate with its original target string.
    Symlink,
}

/// One unit of work emitted by the walker and consumed by exactly one worker.
#[derive(Debug, Clone)]
pub struct SpecCopyTask {
    /// Path relative to the source root.
    pub path_rel: PathBuf,
    /// Entry kind driving the worker action.
    pub kind_entry: EnumCopyEntryKind,
    /// Absolute source path.
    pub path_src: PathBuf,
    /// Absolute destination path.
    pub path_dst: PathBuf,
}

/// One copy failure item with path + error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCopyError {
    /// Failed source or destination path.
    pub path: PathBuf,
    /// User-facing error text.
    pub exception: String,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TopLevelErrors

/// "Top-level call failed" errors (input validation / setup stage).
///
/// Per-entry copy failures never surface here; they are recorded in the
/// report's `errors` and the call still returns a [`crate::ReportCopy`].
#[derive(Debug, Error)]
pub enum CopyTreeError {
    /// Invalid depth combination or value.
    #[error("{0}")]
    InvalidDepthLimit(String),
    /// Invalid include/exclude pattern.
    #[error("{0}")]
    InvalidPattern(String),
    /// Unknown rule value passed through a string-typed boundary.
    #[error("{0}")]
    InvalidRule(String),
    /// Source path is not a directory.
    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
    /// Source and destination overlap (`src` contains `dst` or vice versa).
    #[error(
        "Source and destination directories overlap: {} <-> {}",
        path_source.display(),
        path_destination.display()
    )]
    SourceDestinationOverlap {
        /// Normalized source directory.
        path_source: PathBuf,
        /// Normalized destination directory.
        path_destination: PathBuf,
    },
    /// Destination directory initialization failed.
    #[error("Failed to initialize destination {}: {message}", .path.display())]
    DestinationInitFailed {
        /// Destination path that failed initialization.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
    /// A binding layer's expected bridge triple does not match this engine.
    #[error("Bridge contract mismatch: expected {expected}, got {actual}")]
    BridgeContractMismatch {
        /// Component the engine exports.
        expected: String,
        /// Component the binding expected.
        actual: String,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn rule_enums_parse_known_values() {
        assert_eq!(
            EnumCopyPatternMode::from_str("glob").expect("glob"),
            EnumCopyPatternMode::Glob
        );
        assert_eq!(
            EnumCopySymlinkStrategy::from_str("copy_symlinks").expect("copy_symlinks"),
            EnumCopySymlinkStrategy::CopySymlinks
        );
        assert_eq!(
            EnumCopyFileConflictStrategy::from_str("overwrite").expect("overwrite"),
            EnumCopyFileConflictStrategy::Overwrite
        );
        assert_eq!(
            EnumCopyDirectoryConflictStrategy::from_str("merge").expect("merge"),
            EnumCopyDirectoryConflictStrategy::Merge
        );
        assert_eq!(
            EnumCopyDepthLimitMode::from_str("exact").expect("exact"),
            EnumCopyDepthLimitMode::Exact
        );
    }

    #[test]
    fn rule_enums_reject_unknown_values() {
        let err = EnumCopyPatternMode::from_str("glob2").expect_err("unknown mode");
        assert!(matches!(err, CopyTreeError::InvalidRule(_)));
        assert!(err.to_string().contains("`glob2`"));

        assert!(EnumCopySymlinkStrategy::from_str("follow").is_err());
        assert!(EnumCopyFileConflictStrategy::from_str("replace").is_err());
        assert!(EnumCopyDirectoryConflictStrategy::from_str("union").is_err());
        assert!(EnumCopyDepthLimitMode::from_str("at_least").is_err());
    }
}
