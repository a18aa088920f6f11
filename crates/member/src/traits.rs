//! Capability handles for process-wide collaborators
//!
//! The storage engine, schema registry and directory manager are singletons
//! with their own init/teardown lifecycle outside this crate. The member
//! receives them as injected handles and never constructs them. The
//! metadata-group member is borrowed the same way: the member only reads
//! its term, log position and partition table.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chron_core::{
    LogEntry, LogPosition, MeasurementSchema, SlotPartitionTable, TimeFilter, TimeValuePair,
};

use crate::error::MemberError;

/// Applies consensus-committed log entries to local storage.
pub trait LogApplier: Send + Sync {
    fn apply(&self, entry: &LogEntry) -> Result<(), MemberError>;
}

/// A sealed, immutable data file owned by the local storage engine.
#[derive(Debug, Clone)]
pub struct SealedFile {
    pub storage_group: String,
    pub path: PathBuf,
    pub digest: [u8; 16],
}

/// The local storage engine.
pub trait StorageEngine: Send + Sync {
    /// Hand a staged remote file over for ingestion. The engine may
    /// relocate the file; the returned path is its final location.
    fn ingest_file(&self, storage_group: &str, staged: &Path) -> Result<PathBuf, MemberError>;

    /// All sealed data files, used when materialising file snapshots.
    fn sealed_files(&self) -> Vec<SealedFile>;

    /// Build a point reader over the leader-synchronised local data.
    fn create_reader(
        &self,
        path: &str,
        filter: Option<TimeFilter>,
        pushdown_unseq: bool,
    ) -> Result<Box<dyn PointReader>, MemberError>;
}

/// The schema registry (series catalog).
pub trait SchemaRegistry: Send + Sync {
    fn register(&self, schema: &MeasurementSchema) -> Result<(), MemberError>;

    /// All schemas whose path starts with `prefix`.
    fn collect_series(&self, prefix: &str) -> Vec<MeasurementSchema>;

    /// All series paths matching `prefix`.
    fn all_paths(&self, prefix: &str) -> Result<Vec<String>, MemberError>;
}

/// Registered data directories, used for already-pulled detection.
pub trait DirectoryManager: Send + Sync {
    fn sequence_dirs(&self) -> Vec<PathBuf>;
    fn unsequence_dirs(&self) -> Vec<PathBuf>;
}

/// A pull-based reader over one series.
pub trait PointReader: Send {
    fn next_pair(&mut self) -> Result<Option<TimeValuePair>, MemberError>;
}

/// Read-only view of the local metadata-group member.
pub trait MetaGroup: Send + Sync {
    /// Current metadata-group term
    fn term(&self) -> u64;

    /// Last position of the metadata-group log
    fn log_position(&self) -> LogPosition;

    /// The current partition table
    fn partition_table(&self) -> Arc<SlotPartitionTable>;
}
