//! Bounded worker pool: conflict resolution and copy-task execution.
//!
//! Workers own all destination-side decisions. A shared destination ledger
//! records which paths were claimed and which directories this run created,
//! so conflict outcomes depend on pre-run destination state only — not on
//! worker count, task interleaving, or dry-run mode.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crossbeam_channel::Receiver;
use tracing::{trace, warn};

use crate::copy::SpecCopyPlan;
use crate::report::ReportAggregator;
use crate::spec::{
    EnumCopyDirectoryConflictStrategy, EnumCopyEntryKind, EnumCopyFileConflictStrategy,
    SpecCopyTask,
};
use crate::util::{
    copy_file_with_metadata, create_symbolic_link, validate_destination_path_safety,
};

////////////////////////////////////////////////////////////////////////////////
// #region DestinationLedger

#[derive(Debug, Default)]
struct StateLedger {
    set_claimed: HashSet<PathBuf>,
    set_created: HashSet<PathBuf>,
}

/// Shared record of destination paths touched by this run.
#[derive(Debug, Default)]
pub(crate) struct DestinationLedger {
    state: Mutex<StateLedger>,
}

impl DestinationLedger {
    fn lock_state(&self) -> MutexGuard<'_, StateLedger> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim a destination path for one task. Returns false when an earlier
    /// task of this run already targets the same path.
    fn claim(&self, path_dst: &Path) -> bool {
        self.lock_state().set_claimed.insert(path_dst.to_path_buf())
    }

    /// Record a directory materialized (or, in dry-run, planned) by this run.
    fn mark_created(&self, path_dir: PathBuf) {
        self.lock_state().set_created.insert(path_dir);
    }

    fn was_created(&self, path_dir: &Path) -> bool {
        self.lock_state().set_created.contains(path_dir)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ConflictResolver

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumConflictDecision {
    Proceed,
    SkipEntry,
    FailEntry,
}

fn resolve_existing_file_conflict(
    rule_conflict: EnumCopyFileConflictStrategy,
) -> EnumConflictDecision {
    match rule_conflict {
        EnumCopyFileConflictStrategy::Skip => EnumConflictDecision::SkipEntry,
        EnumCopyFileConflictStrategy::Overwrite => EnumConflictDecision::Proceed,
        EnumCopyFileConflictStrategy::Error => EnumConflictDecision::FailEntry,
    }
}

fn resolve_existing_dir_conflict(
    rule_conflict: EnumCopyDirectoryConflictStrategy,
) -> EnumConflictDecision {
    match rule_conflict {
        EnumCopyDirectoryConflictStrategy::Skip => EnumConflictDecision::SkipEntry,
        EnumCopyDirectoryConflictStrategy::Merge => EnumConflictDecision::Proceed,
        EnumCopyDirectoryConflictStrategy::Error => EnumConflictDecision::FailEntry,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WorkerExecution

/// Drain the task channel until the walker drops its sender.
pub(crate) fn worker_loop(
    rx_tasks: Receiver<SpecCopyTask>,
    spec_cp_plan: &SpecCopyPlan,
    aggregator: &ReportAggregator,
    ledger: &DestinationLedger,
) {
    while let Ok(spec_task) = rx_tasks.recv() {
        execute_task(&spec_task, spec_cp_plan, aggregator, ledger);
    }
}

fn execute_task(
    spec_task: &SpecCopyTask,
    spec_cp_plan: &SpecCopyPlan,
    aggregator: &ReportAggregator,
    ledger: &DestinationLedger,
) {
    trace!(
        path = %spec_task.path_rel.display(),
        kind = ?spec_task.kind_entry,
        "executing copy task"
    );

    if let Err(message) =
        validate_destination_path_safety(&spec_task.path_dst, &spec_cp_plan.path_dir_dst)
    {
        warn!(path = %spec_task.path_dst.display(), "unsafe destination path");
        aggregator.add_error(spec_task.path_dst.clone(), message);
        return;
    }

    match spec_task.kind_entry {
        EnumCopyEntryKind::Directory => execute_directory_task(spec_task, spec_cp_plan, aggregator, ledger),
        EnumCopyEntryKind::File => execute_file_task(spec_task, spec_cp_plan, aggregator, ledger),
        EnumCopyEntryKind::Symlink => execute_symlink_task(spec_task, spec_cp_plan, aggregator, ledger),
    }
}

fn execute_directory_task(
    spec_task: &SpecCopyTask,
    spec_cp_plan: &SpecCopyPlan,
    aggregator: &ReportAggregator,
    ledger: &DestinationLedger,
) {
    let if_dry_run = spec_cp_plan.spec_cp_options.if_dry_run;
    let rule_conflict = spec_cp_plan.spec_cp_options.rule_conflict_dir;
    let path_dst = &spec_task.path_dst;

    if !ledger.claim(path_dst) || ledger.was_created(path_dst) {
        // Another task of this run already claimed or materialized it
        // (a sibling file's parent-ensure can win the mkdir race).
        aggregator.add_copied();
        return;
    }

    match fs::symlink_metadata(path_dst) {
        Ok(meta_dst) if !meta_dst.is_dir() => {
            aggregator.add_error(
                path_dst.clone(),
                format!(
                    "Destination is a file, expected directory: {}",
                    path_dst.display()
                ),
            );
        }
        Ok(_) => match resolve_existing_dir_conflict(rule_conflict) {
            EnumConflictDecision::SkipEntry => aggregator.add_skipped(),
            EnumConflictDecision::FailEntry => aggregator.add_error(
                path_dst.clone(),
                format!("Destination exists: {}", path_dst.display()),
            ),
            // Merge: reuse the existing directory as-is.
            EnumConflictDecision::Proceed => aggregator.add_copied(),
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if if_dry_run {
                ledger.mark_created(path_dst.clone());
                aggregator.add_copied();
            } else {
                match fs::create_dir_all(path_dst) {
                    Ok(_) => {
                        ledger.mark_created(path_dst.clone());
                        aggregator.add_copied();
                    }
                    Err(e_create) => aggregator.add_error(path_dst.clone(), e_create.to_string()),
                }
            }
        }
        Err(e) => aggregator.add_error(path_dst.clone(), e.to_string()),
    }
}

fn execute_file_task(
    spec_task: &SpecCopyTask,
    spec_cp_plan: &SpecCopyPlan,
    aggregator: &ReportAggregator,
    ledger: &DestinationLedger,
) {
    let if_dry_run = spec_cp_plan.spec_cp_options.if_dry_run;
    let rule_conflict = spec_cp_plan.spec_cp_options.rule_conflict_file;
    let path_dst = &spec_task.path_dst;

    if let Err(message) =
        ensure_parent_dirs(path_dst, &spec_cp_plan.path_dir_dst, if_dry_run, ledger)
    {
        aggregator.add_error(path_dst.clone(), message);
        return;
    }

    let b_exists = if ledger.claim(path_dst) {
        match fs::symlink_metadata(path_dst) {
            Ok(meta_dst) if meta_dst.is_dir() => {
                aggregator.add_error(
                    path_dst.clone(),
                    format!("Destination is a directory: {}", path_dst.display()),
                );
                return;
            }
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                aggregator.add_error(path_dst.clone(), e.to_string());
                return;
            }
        }
    } else {
        // Flattened name collision: an earlier task owns this destination.
        true
    };

    if b_exists {
        match resolve_existing_file_conflict(rule_conflict) {
            EnumConflictDecision::SkipEntry => {
                aggregator.add_skipped();
                return;
            }
            EnumConflictDecision::FailEntry => {
                aggregator.add_error(
                    path_dst.clone(),
                    format!("Destination exists: {}", path_dst.display()),
                );
                return;
            }
            EnumConflictDecision::Proceed => {}
        }
    }

    if if_dry_run {
        aggregator.add_copied();
        return;
    }
    match copy_file_with_metadata(&spec_task.path_src, path_dst) {
        Ok(_) => aggregator.add_copied(),
        Err(e) => aggregator.add_error(path_dst.clone(), e.to_string()),
    }
}

fn execute_symlink_task(
    spec_task: &SpecCopyTask,
    spec_cp_plan: &SpecCopyPlan,
    aggregator: &ReportAggregator,
    ledger: &DestinationLedger,
) {
    let if_dry_run = spec_cp_plan.spec_cp_options.if_dry_run;
    let rule_conflict = spec_cp_plan.spec_cp_options.rule_conflict_file;
    let path_dst = &spec_task.path_dst;

    if let Err(message) =
        ensure_parent_dirs(path_dst, &spec_cp_plan.path_dir_dst, if_dry_run, ledger)
    {
        aggregator.add_error(path_dst.clone(), message);
        return;
    }

    let b_exists = if ledger.claim(path_dst) {
        match fs::symlink_metadata(path_dst) {
            Ok(meta_dst) if meta_dst.is_dir() => {
                aggregator.add_error(
                    path_dst.clone(),
                    format!("Destination is a directory: {}", path_dst.display()),
                );
                return;
            }
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                aggregator.add_error(path_dst.clone(), e.to_string());
                return;
            }
        }
    } else {
        true
    };

    if b_exists {
        match resolve_existing_file_conflict(rule_conflict) {
            EnumConflictDecision::SkipEntry => {
                aggregator.add_skipped();
                return;
            }
            EnumConflictDecision::FailEntry => {
                aggregator.add_error(
                    path_dst.clone(),
                    format!("Destination exists: {}", path_dst.display()),
                );
                return;
            }
            EnumConflictDecision::Proceed => {
                // A link cannot be truncated in place; replace it.
                if !if_dry_run
                    && let Err(e) = fs::remove_file(path_dst)
                    && e.kind() != io::ErrorKind::NotFound
                {
                    aggregator.add_error(path_dst.clone(), e.to_string());
                    return;
                }
            }
        }
    }

    if if_dry_run {
        aggregator.add_copied();
        return;
    }
    match create_symbolic_link(&spec_task.path_src, path_dst) {
        Ok(_) => aggregator.add_copied(),
        Err(message) => aggregator.add_error(path_dst.clone(), message),
    }
}

/// Make sure every ancestor of `path_dst` below the destination root exists,
/// tolerating concurrent creation by sibling workers. Dry-run records the
/// would-be creations in the ledger instead of touching the filesystem.
fn ensure_parent_dirs(
    path_dst: &Path,
    path_dir_dst_root: &Path,
    if_dry_run: bool,
    ledger: &DestinationLedger,
) -> Result<(), String> {
    let Some(path_parent) = path_dst.parent() else {
        return Ok(());
    };
    if path_parent == path_dir_dst_root || !path_parent.starts_with(path_dir_dst_root) {
        return Ok(());
    }

    let mut l_missing: Vec<PathBuf> = Vec::new();
    let mut path_cursor = path_parent.to_path_buf();
    while path_cursor.starts_with(path_dir_dst_root) && path_cursor != *path_dir_dst_root {
        if ledger.was_created(&path_cursor) || path_cursor.exists() {
            break;
        }
        l_missing.push(path_cursor.clone());
        let Some(path_up) = path_cursor.parent() else {
            break;
        };
        path_cursor = path_up.to_path_buf();
    }
    if l_missing.is_empty() {
        return Ok(());
    }

    if !if_dry_run {
        fs::create_dir_all(path_parent).map_err(|e| e.to_string())?;
    }
    for path_dir in l_missing {
        ledger.mark_created(path_dir);
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
