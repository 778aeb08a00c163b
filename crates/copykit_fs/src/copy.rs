//! Top-level `copy_tree` orchestration.
//!
//! Builds the validated copy plan, then wires the producer (tree walker) to
//! the bounded worker pool and freezes the aggregated report.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::bounded;
use tracing::debug;

use crate::conf::N_TASK_QUEUE_CAP;
use crate::pattern::SpecCopyPatterns;
use crate::pool::{DestinationLedger, worker_loop};
use crate::report::{ReportAggregator, ReportCopy};
use crate::spec::{CopyTreeError, EnumCopyDepthLimitMode, SpecCopyOptions};
use crate::util::{calculate_worker_limit, is_overlap};
use crate::walk::TreeWalker;

////////////////////////////////////////////////////////////////////////////////
// #region CopyPlan

/// Validated, immutable per-invocation state shared by the walker and all
/// workers.
#[derive(Debug)]
pub(crate) struct SpecCopyPlan {
    pub(crate) path_dir_src: PathBuf,
    pub(crate) path_dir_dst: PathBuf,
    pub(crate) spec_cp_options: SpecCopyOptions,
    pub(crate) spec_cp_pats: SpecCopyPatterns,
    pub(crate) n_workers_max: usize,
}

impl SpecCopyPlan {
    /// Single validation pass: every configuration error is raised here,
    /// before any traversal or filesystem mutation.
    fn from_options(
        path_dir_src: PathBuf,
        path_dir_dst: PathBuf,
        spec_cp_options: SpecCopyOptions,
    ) -> Result<Self, CopyTreeError> {
        if spec_cp_options.depth_limit.is_none()
            && spec_cp_options.rule_depth_limit == EnumCopyDepthLimitMode::Exact
        {
            return Err(CopyTreeError::InvalidDepthLimit(
                "`depth_limit` is required when depth_mode='exact'.".to_string(),
            ));
        }

        if !path_dir_src.is_dir() {
            return Err(CopyTreeError::SourceNotDirectory(path_dir_src));
        }
        if is_overlap(&path_dir_src, &path_dir_dst) {
            return Err(CopyTreeError::SourceDestinationOverlap {
                path_source: path_dir_src,
                path_destination: path_dir_dst,
            });
        }

        if spec_cp_options.if_dry_run {
            // Dry runs must not create anything, the root included; an
            // existing root still has to be a usable directory.
            match fs::symlink_metadata(&path_dir_dst) {
                Ok(meta_dir_dst) if meta_dir_dst.file_type().is_symlink() => {
                    return Err(CopyTreeError::DestinationInitFailed {
                        path: path_dir_dst,
                        message: "Destination root path must not be a symbolic link.".to_string(),
                    });
                }
                Ok(meta_dir_dst) if !meta_dir_dst.is_dir() => {
                    return Err(CopyTreeError::DestinationInitFailed {
                        path: path_dir_dst,
                        message: "Destination root path must be a directory.".to_string(),
                    });
                }
                _ => {}
            }
        } else {
            fs::create_dir_all(&path_dir_dst).map_err(|e| CopyTreeError::DestinationInitFailed {
                path: path_dir_dst.clone(),
                message: e.to_string(),
            })?;
            let meta_dir_dst = fs::symlink_metadata(&path_dir_dst).map_err(|e| {
                CopyTreeError::DestinationInitFailed {
                    path: path_dir_dst.clone(),
                    message: e.to_string(),
                }
            })?;
            if meta_dir_dst.file_type().is_symlink() {
                return Err(CopyTreeError::DestinationInitFailed {
                    path: path_dir_dst,
                    message: "Destination root path must not be a symbolic link.".to_string(),
                });
            }
        }

        let spec_cp_pats = SpecCopyPatterns::from_raw(
            spec_cp_options.patterns_include_files.as_deref(),
            spec_cp_options.patterns_exclude_files.as_deref(),
            spec_cp_options.patterns_include_dirs.as_deref(),
            spec_cp_options.patterns_exclude_dirs.as_deref(),
            spec_cp_options.rule_pattern,
        )?;
        let n_workers_max = calculate_worker_limit(spec_cp_options.num_workers_max);

        Ok(Self {
            path_dir_src,
            path_dir_dst,
            spec_cp_options,
            spec_cp_pats,
            n_workers_max,
        })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CopyTree

/// Copy a directory tree from `dir_source` to `dir_destination`.
///
/// Behavior is controlled by [`SpecCopyOptions`]:
/// - include/exclude pattern rules for files and directories, matched
///   against paths relative to the source root,
/// - conflict policies for destination files/directories,
/// - symlink handling strategy,
/// - optional depth limiting (entries directly under the root have depth 0),
/// - flatten (`if_keep_tree=false`) vs keep-tree copy mode,
/// - dry-run and worker count.
///
/// One walker thread enumerates the source and streams copy tasks over a
/// bounded queue to a fixed pool of workers; the walker blocks when the
/// queue is full, which bounds memory when the destination is slow.
///
/// Returns [`ReportCopy`] when the run completes (per-entry failures are
/// recorded inside the report). Returns [`CopyTreeError`] only for setup and
/// validation failures, before anything was traversed or written.
pub fn copy_tree<P, Q>(
    dir_source: P,
    dir_destination: Q,
    spec_cp_options: SpecCopyOptions,
) -> Result<ReportCopy, CopyTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let spec_cp_plan = SpecCopyPlan::from_options(
        dir_source.as_ref().to_path_buf(),
        dir_destination.as_ref().to_path_buf(),
        spec_cp_options,
    )?;
    debug!(
        source = %spec_cp_plan.path_dir_src.display(),
        destination = %spec_cp_plan.path_dir_dst.display(),
        workers = spec_cp_plan.n_workers_max,
        dry_run = spec_cp_plan.spec_cp_options.if_dry_run,
        "starting copy_tree"
    );

    let aggregator = ReportAggregator::default();
    let ledger = DestinationLedger::default();
    let (tx_tasks, rx_tasks) = bounded(N_TASK_QUEUE_CAP);

    thread::scope(|scope| {
        for _ in 0..spec_cp_plan.n_workers_max {
            let rx_worker = rx_tasks.clone();
            let r_plan = &spec_cp_plan;
            let r_aggregator = &aggregator;
            let r_ledger = &ledger;
            scope.spawn(move || worker_loop(rx_worker, r_plan, r_aggregator, r_ledger));
        }
        // The walker runs on the calling thread; dropping it closes the
        // channel and lets the workers drain out.
        TreeWalker::new(&spec_cp_plan, &aggregator, tx_tasks).run();
    });

    let report = aggregator.into_report();
    debug!(summary = %report.format("[COPY]"), "copy_tree finished");
    Ok(report)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
