//! Source-tree traversal: iterative DFS producing copy tasks.
//!
//! The walker applies the source-side policies only (patterns, symlink
//! classification, depth gating). Destination state is the workers' concern.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use crossbeam_channel::Sender;
use tracing::trace;

use crate::copy::SpecCopyPlan;
use crate::report::ReportAggregator;
use crate::spec::{EnumCopyDepthLimitMode, EnumCopyEntryKind, EnumCopySymlinkStrategy, SpecCopyTask};
use crate::util::derive_pattern_text;

////////////////////////////////////////////////////////////////////////////////
// #region DepthGate

/// Entry eligibility at a given depth. Entries directly under the source
/// root have depth 0; `None` means unlimited.
pub(crate) fn is_depth_eligible(
    n_depth: usize,
    depth_limit: Option<usize>,
    rule_depth_limit: EnumCopyDepthLimitMode,
) -> bool {
    match depth_limit {
        None => true,
        Some(limit) => match rule_depth_limit {
            EnumCopyDepthLimitMode::AtMost => n_depth <= limit,
            EnumCopyDepthLimitMode::Exact => n_depth == limit,
        },
    }
}

/// Whether entries below a directory at `n_depth` can still be eligible.
/// Holds for both rules: children sit at `n_depth + 1`.
pub(crate) fn should_descend_below(n_depth: usize, depth_limit: Option<usize>) -> bool {
    match depth_limit {
        None => true,
        Some(limit) => n_depth < limit,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TreeWalker

#[derive(Debug)]
struct SpecWalkEntry {
    path_src: PathBuf,
    name_entry: String,
    if_symlink: bool,
    /// Dereference mode only: the symlink target does not exist.
    if_broken: bool,
}

#[derive(Debug)]
struct FrameWalkDir {
    path_dir_src_sub: PathBuf,
    path_rel: PathBuf,
    /// Depth of the entries directly inside this directory.
    n_depth: usize,
}

/// Iterative depth-first producer of [`SpecCopyTask`] values.
pub(crate) struct TreeWalker<'run> {
    spec_cp_plan: &'run SpecCopyPlan,
    aggregator: &'run ReportAggregator,
    tx_tasks: Sender<SpecCopyTask>,
    /// Canonicalized real paths of directories already entered; consulted
    /// only when the symlink rule dereferences (cycle avoidance).
    set_visited_dirs: HashSet<PathBuf>,
    if_pool_disconnected: bool,
}

impl<'run> TreeWalker<'run> {
    pub(crate) fn new(
        spec_cp_plan: &'run SpecCopyPlan,
        aggregator: &'run ReportAggregator,
        tx_tasks: Sender<SpecCopyTask>,
    ) -> Self {
        Self {
            spec_cp_plan,
            aggregator,
            tx_tasks,
            set_visited_dirs: HashSet::new(),
            if_pool_disconnected: false,
        }
    }

    /// Walk the whole source tree. Dropping `self` closes the task channel,
    /// which is what lets the worker pool drain and exit.
    pub(crate) fn run(mut self) {
        if self.spec_cp_plan.spec_cp_options.rule_symlink == EnumCopySymlinkStrategy::Dereference
            && let Ok(path_root_canonical) = fs::canonicalize(&self.spec_cp_plan.path_dir_src)
        {
            self.set_visited_dirs.insert(path_root_canonical);
        }

        let mut l_stack = vec![FrameWalkDir {
            path_dir_src_sub: self.spec_cp_plan.path_dir_src.clone(),
            path_rel: PathBuf::new(),
            n_depth: 0,
        }];
        while let Some(frame) = l_stack.pop() {
            if self.if_pool_disconnected {
                return;
            }
            self.visit_directory(frame, &mut l_stack);
        }
    }

    fn visit_directory(&mut self, frame: FrameWalkDir, l_stack: &mut Vec<FrameWalkDir>) {
        trace!(
            directory = %frame.path_dir_src_sub.display(),
            depth = frame.n_depth,
            "walking directory"
        );

        let iter_entries = match fs::read_dir(&frame.path_dir_src_sub) {
            Ok(iter) => iter,
            Err(e) => {
                self.aggregator.add_warning(format!(
                    "Failed to read directory {} ({e})",
                    frame.path_dir_src_sub.display()
                ));
                return;
            }
        };

        let rule_symlink = self.spec_cp_plan.spec_cp_options.rule_symlink;
        let mut l_dirs: Vec<SpecWalkEntry> = Vec::new();
        let mut l_files: Vec<SpecWalkEntry> = Vec::new();

        for entry_res in iter_entries {
            let entry = match entry_res {
                Ok(v) => v,
                Err(e) => {
                    self.aggregator.add_warning(format!(
                        "Failed to read directory entry under {} ({e})",
                        frame.path_dir_src_sub.display()
                    ));
                    continue;
                }
            };

            let path_entry = entry.path();
            let c_name = entry.file_name().to_string_lossy().to_string();
            self.aggregator.add_scanned();

            let cfg_file_type = match entry.file_type() {
                Ok(v) => v,
                Err(e) => {
                    self.aggregator
                        .add_warning(format!("Failed to inspect {} ({e})", path_entry.display()));
                    continue;
                }
            };

            let b_is_symlink = cfg_file_type.is_symlink();
            if b_is_symlink && rule_symlink == EnumCopySymlinkStrategy::Dereference {
                match fs::metadata(&path_entry) {
                    Ok(meta_target) if meta_target.is_dir() => l_dirs.push(SpecWalkEntry {
                        path_src: path_entry,
                        name_entry: c_name,
                        if_symlink: true,
                        if_broken: false,
                    }),
                    Ok(meta_target) if meta_target.is_file() => l_files.push(SpecWalkEntry {
                        path_src: path_entry,
                        name_entry: c_name,
                        if_symlink: true,
                        if_broken: false,
                    }),
                    Ok(_) => self.aggregator.add_warning(format!(
                        "Special file target skipped: {}",
                        path_entry.display()
                    )),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        l_files.push(SpecWalkEntry {
                            path_src: path_entry,
                            name_entry: c_name,
                            if_symlink: true,
                            if_broken: true,
                        });
                    }
                    Err(e) => self
                        .aggregator
                        .add_warning(format!("Failed to inspect {} ({e})", path_entry.display())),
                }
            } else if b_is_symlink {
                // Leaf link: the pattern axis follows the target shape.
                let entry_leaf = SpecWalkEntry {
                    path_src: path_entry,
                    name_entry: c_name,
                    if_symlink: true,
                    if_broken: false,
                };
                if entry_leaf.path_src.is_dir() {
                    l_dirs.push(entry_leaf);
                } else {
                    l_files.push(entry_leaf);
                }
            } else if cfg_file_type.is_dir() {
                l_dirs.push(SpecWalkEntry {
                    path_src: path_entry,
                    name_entry: c_name,
                    if_symlink: false,
                    if_broken: false,
                });
            } else if cfg_file_type.is_file() {
                l_files.push(SpecWalkEntry {
                    path_src: path_entry,
                    name_entry: c_name,
                    if_symlink: false,
                    if_broken: false,
                });
            } else {
                self.aggregator
                    .add_warning(format!("Special file skipped: {}", path_entry.display()));
            }
        }

        l_dirs.sort_by(|a, b| a.name_entry.cmp(&b.name_entry));
        l_files.sort_by(|a, b| a.name_entry.cmp(&b.name_entry));

        for entry_dir in l_dirs {
            self.handle_dir_entry(entry_dir, &frame, l_stack);
            if self.if_pool_disconnected {
                return;
            }
        }
        for entry_file in l_files {
            self.handle_file_entry(entry_file, &frame);
            if self.if_pool_disconnected {
                return;
            }
        }
    }

    fn handle_dir_entry(
        &mut self,
        entry: SpecWalkEntry,
        frame: &FrameWalkDir,
        l_stack: &mut Vec<FrameWalkDir>,
    ) {
        let spec_cp_options = &self.spec_cp_plan.spec_cp_options;
        let path_rel = frame.path_rel.join(&entry.name_entry);
        let c_rel = derive_pattern_text(&path_rel);

        if self.spec_cp_plan.spec_cp_pats.is_dir_excluded(&c_rel) {
            trace!(path = %c_rel, "directory pruned by pattern");
            return;
        }

        let b_eligible = is_depth_eligible(
            frame.n_depth,
            spec_cp_options.depth_limit,
            spec_cp_options.rule_depth_limit,
        );

        if entry.if_symlink
            && spec_cp_options.rule_symlink != EnumCopySymlinkStrategy::Dereference
        {
            if !b_eligible {
                return;
            }
            self.aggregator.add_matched();
            match spec_cp_options.rule_symlink {
                EnumCopySymlinkStrategy::SkipSymlinks => {
                    self.aggregator.add_skipped();
                    self.aggregator
                        .add_warning(format!("Symlink skipped: {}", entry.path_src.display()));
                }
                EnumCopySymlinkStrategy::CopySymlinks => {
                    let path_dst = if spec_cp_options.if_keep_tree {
                        self.spec_cp_plan.path_dir_dst.join(&path_rel)
                    } else {
                        self.spec_cp_plan.path_dir_dst.join(&entry.name_entry)
                    };
                    self.emit_task(SpecCopyTask {
                        path_rel,
                        kind_entry: EnumCopyEntryKind::Symlink,
                        path_src: entry.path_src,
                        path_dst,
                    });
                }
                EnumCopySymlinkStrategy::Dereference => unreachable!(),
            }
            return;
        }

        // Real directory, or dereferenced symlink directory.
        if b_eligible && spec_cp_options.if_keep_tree {
            self.aggregator.add_matched();
            let path_dst = self.spec_cp_plan.path_dir_dst.join(&path_rel);
            self.emit_task(SpecCopyTask {
                path_rel: path_rel.clone(),
                kind_entry: EnumCopyEntryKind::Directory,
                path_src: entry.path_src.clone(),
                path_dst,
            });
        }

        if !should_descend_below(frame.n_depth, spec_cp_options.depth_limit) {
            return;
        }
        if spec_cp_options.rule_symlink == EnumCopySymlinkStrategy::Dereference {
            match fs::canonicalize(&entry.path_src) {
                Ok(path_canonical) => {
                    if !self.set_visited_dirs.insert(path_canonical) {
                        self.aggregator.add_warning(format!(
                            "Symlink loop detected: {}",
                            entry.path_src.display()
                        ));
                        return;
                    }
                }
                Err(e) => {
                    self.aggregator
                        .add_warning(format!("Failed to inspect {} ({e})", entry.path_src.display()));
                    return;
                }
            }
        }
        l_stack.push(FrameWalkDir {
            path_dir_src_sub: entry.path_src,
            path_rel,
            n_depth: frame.n_depth + 1,
        });
    }

    fn handle_file_entry(&mut self, entry: SpecWalkEntry, frame: &FrameWalkDir) {
        let spec_cp_options = &self.spec_cp_plan.spec_cp_options;
        if !is_depth_eligible(
            frame.n_depth,
            spec_cp_options.depth_limit,
            spec_cp_options.rule_depth_limit,
        ) {
            return;
        }

        let path_rel = frame.path_rel.join(&entry.name_entry);
        let c_rel = derive_pattern_text(&path_rel);
        if self.spec_cp_plan.spec_cp_pats.is_file_excluded(&c_rel) {
            return;
        }
        self.aggregator.add_matched();

        let mut kind_entry = EnumCopyEntryKind::File;
        if entry.if_symlink {
            match spec_cp_options.rule_symlink {
                EnumCopySymlinkStrategy::SkipSymlinks => {
                    self.aggregator.add_skipped();
                    self.aggregator
                        .add_warning(format!("Symlink skipped: {}", entry.path_src.display()));
                    return;
                }
                EnumCopySymlinkStrategy::Dereference => {
                    if entry.if_broken {
                        self.aggregator.add_error(
                            entry.path_src.clone(),
                            format!("Broken symlink: {}", entry.path_src.display()),
                        );
                        return;
                    }
                }
                EnumCopySymlinkStrategy::CopySymlinks => {
                    kind_entry = EnumCopyEntryKind::Symlink;
                }
            }
        }

        #[cfg(target_os = "linux")]
        {
            use std::os::unix::fs::MetadataExt;

            if !entry.if_symlink
                && let Ok(stat_src) = fs::metadata(&entry.path_src)
                && stat_src.nlink() > 1
            {
                self.aggregator
                    .add_warning(format!("Hard link detected: {}", entry.path_src.display()));
            }
        }

        let path_dst = if spec_cp_options.if_keep_tree {
            self.spec_cp_plan.path_dir_dst.join(&path_rel)
        } else {
            self.spec_cp_plan.path_dir_dst.join(&entry.name_entry)
        };
        self.emit_task(SpecCopyTask {
            path_rel,
            kind_entry,
            path_src: entry.path_src,
            path_dst,
        });
    }

    fn emit_task(&mut self, spec_task: SpecCopyTask) {
        if self.tx_tasks.send(spec_task).is_err() && !self.if_pool_disconnected {
            self.if_pool_disconnected = true;
            self.aggregator
                .add_warning("Worker pool disconnected; traversal aborted.".to_string());
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{is_depth_eligible, should_descend_below};
    use crate::spec::EnumCopyDepthLimitMode;

    #[test]
    fn depth_gate_unlimited_accepts_everything() {
        for n_depth in [0, 1, 7] {
            assert!(is_depth_eligible(
                n_depth,
                None,
                EnumCopyDepthLimitMode::AtMost
            ));
            assert!(should_descend_below(n_depth, None));
        }
    }

    #[test]
    fn depth_gate_at_most_zero_keeps_top_level_only() {
        assert!(is_depth_eligible(0, Some(0), EnumCopyDepthLimitMode::AtMost));
        assert!(!is_depth_eligible(1, Some(0), EnumCopyDepthLimitMode::AtMost));
        assert!(!should_descend_below(0, Some(0)));
    }

    #[test]
    fn depth_gate_exact_matches_single_level_but_descends_to_it() {
        assert!(!is_depth_eligible(0, Some(2), EnumCopyDepthLimitMode::Exact));
        assert!(is_depth_eligible(2, Some(2), EnumCopyDepthLimitMode::Exact));
        assert!(!is_depth_eligible(3, Some(2), EnumCopyDepthLimitMode::Exact));
        assert!(should_descend_below(0, Some(2)));
        assert!(should_descend_below(1, Some(2)));
        assert!(!should_descend_below(2, Some(2)));
    }
}
