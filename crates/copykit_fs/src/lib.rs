//! `copykit_fs` v1:
//! Concurrent, policy-driven directory-tree copy engine.
//!
//! Architecture:
//! - `conf`    : engine constants and binding-bridge identifiers
//! - `spec`    : enums/options/tasks/errors
//! - `pattern` : include/exclude pattern compilation and matching
//! - `report`  : run-time report model and thread-safe aggregation
//! - `walk`    : source-tree traversal producing copy tasks
//! - `pool`    : bounded worker pool executing copy tasks
//! - `copy`    : top-level `copy_tree` orchestration
//! - `util`    : shared path/metadata helper functions

pub mod conf;
pub mod copy;
mod pattern;
mod pool;
pub mod report;
pub mod spec;
mod util;
mod walk;

pub use conf::{
    C_BRIDGE_CONTRACT_VERSION, C_BRIDGE_TRANSPORT, N_BRIDGE_ABI_VERSION, validate_bridge_contract,
};
pub use copy::copy_tree;
pub use report::{ReportAggregator, ReportCopy, ReportCopyBuilder};
pub use spec::{
    CopyTreeError, EnumCopyDepthLimitMode, EnumCopyDirectoryConflictStrategy, EnumCopyEntryKind,
    EnumCopyFileConflictStrategy, EnumCopyPatternMode, EnumCopySymlinkStrategy, SpecCopyError,
    SpecCopyOptions, SpecCopyTask,
};
