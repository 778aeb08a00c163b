//! Copy report models, mutable builder, and thread-safe aggregation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::spec::SpecCopyError;

////////////////////////////////////////////////////////////////////////////////
// #region ReportModel

/// Aggregate counters and diagnostics for one `copy_tree` run.
#[derive(Debug, Default, Clone)]
pub struct ReportCopy {
    /// Number of scanned entries that passed all filters.
    pub cnt_matched: u64,
    /// Total entries visited by the walker, including filtered-out ones.
    pub cnt_scanned: u64,
    /// Number of entries committed to the destination (or simulated in dry-run).
    pub cnt_copied: u64,
    /// Number of matched entries skipped by conflict or symlink policy.
    pub cnt_skipped: u64,
    /// Non-fatal anomalies collected during traversal/copy.
    pub warnings: Vec<String>,
    /// Per-entry failures.
    pub errors: Vec<SpecCopyError>,
}

impl ReportCopy {
    /// Number of collected hard errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_copied".to_string(), self.cnt_copied);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_errors".to_string(), self.error_count() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} matched={} scanned={} copied={} skipped={} errors={} warnings={}",
            dict_counts["cnt_matched"],
            dict_counts["cnt_scanned"],
            dict_counts["cnt_copied"],
            dict_counts["cnt_skipped"],
            dict_counts["cnt_errors"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[COPY]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BuilderAndAggregator

/// Mutable accumulator for copy statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportCopyBuilder {
    /// See [`ReportCopy::cnt_matched`].
    pub cnt_matched: u64,
    /// See [`ReportCopy::cnt_scanned`].
    pub cnt_scanned: u64,
    /// See [`ReportCopy::cnt_copied`].
    pub cnt_copied: u64,
    /// See [`ReportCopy::cnt_skipped`].
    pub cnt_skipped: u64,
    /// See [`ReportCopy::errors`].
    pub errors: Vec<SpecCopyError>,
    /// See [`ReportCopy::warnings`].
    pub warnings: Vec<String>,
}

impl ReportCopyBuilder {
    /// Finalize builder into an immutable report.
    pub fn build(self) -> ReportCopy {
        ReportCopy {
            cnt_matched: self.cnt_matched,
            cnt_scanned: self.cnt_scanned,
            cnt_copied: self.cnt_copied,
            cnt_skipped: self.cnt_skipped,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

/// Lock-protected report accumulator shared by the walker and all workers.
///
/// The lock is held only for the O(1) counter/log update, never across I/O,
/// so final totals are independent of worker count and interleaving.
#[derive(Debug, Default)]
pub struct ReportAggregator {
    mtx_builder: Mutex<ReportCopyBuilder>,
}

impl ReportAggregator {
    fn with_builder(&self, apply: impl FnOnce(&mut ReportCopyBuilder)) {
        let mut builder = self
            .mtx_builder
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        apply(&mut builder);
    }

    /// Count one visited entry.
    pub fn add_scanned(&self) {
        self.with_builder(|b| b.cnt_scanned += 1);
    }

    /// Count one entry that passed all filters.
    pub fn add_matched(&self) {
        self.with_builder(|b| b.cnt_matched += 1);
    }

    /// Count one committed (or dry-run simulated) copy.
    pub fn add_copied(&self) {
        self.with_builder(|b| b.cnt_copied += 1);
    }

    /// Count one matched entry skipped by policy.
    pub fn add_skipped(&self) {
        self.with_builder(|b| b.cnt_skipped += 1);
    }

    /// Append a warning message.
    pub fn add_warning(&self, warning: String) {
        self.with_builder(|b| b.warnings.push(warning));
    }

    /// Append one path-scoped error.
    pub fn add_error(&self, path: PathBuf, exception: String) {
        self.with_builder(|b| b.errors.push(SpecCopyError { path, exception }));
    }

    /// Freeze the accumulated state into the final report.
    pub fn into_report(self) -> ReportCopy {
        self.mtx_builder
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .build()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{ReportAggregator, ReportCopy};

    #[test]
    fn report_copy_to_dict_and_format_are_stable() {
        let report = ReportCopy {
            cnt_matched: 5,
            cnt_scanned: 8,
            cnt_copied: 3,
            cnt_skipped: 2,
            warnings: vec!["w".to_string()],
            errors: vec![],
        };

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_matched"], 5);
        assert_eq!(dict_counts["cnt_scanned"], 8);
        assert_eq!(dict_counts["cnt_copied"], 3);
        assert_eq!(dict_counts["cnt_skipped"], 2);
        assert_eq!(dict_counts["cnt_errors"], 0);
        assert_eq!(dict_counts["cnt_warnings"], 1);

        let txt = report.format("[COPY]");
        assert_eq!(
            txt,
            "[COPY] matched=5 scanned=8 copied=3 skipped=2 errors=0 warnings=1"
        );
        assert_eq!(report.to_string(), txt);
    }

    #[test]
    fn aggregator_totals_equal_sum_of_thread_contributions() {
        let aggregator = ReportAggregator::default();

        std::thread::scope(|scope| {
            for n_thread in 0..4 {
                let r_aggregator = &aggregator;
                scope.spawn(move || {
                    for _ in 0..100 {
                        r_aggregator.add_scanned();
                        r_aggregator.add_matched();
                        r_aggregator.add_copied();
                    }
                    r_aggregator.add_warning(format!("w{n_thread}"));
                });
            }
        });
        aggregator.add_error(PathBuf::from("/x"), "boom".to_string());

        let report = aggregator.into_report();
        assert_eq!(report.cnt_scanned, 400);
        assert_eq!(report.cnt_matched, 400);
        assert_eq!(report.cnt_copied, 400);
        assert_eq!(report.warning_count(), 4);
        assert_eq!(report.error_count(), 1);
    }
}
