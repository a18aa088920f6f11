//! Snapshot model
//!
//! A snapshot is the materialised state of one slot, sufficient to
//! reconstruct it without replaying earlier log entries. Remote variants
//! are placeholders registered while a pull task is in flight; they carry a
//! shared one-shot cell that the task resolves, and accessing their
//! contents blocks until resolution (bounded by the caller's timeout).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chron_core::{LogEntry, LogPosition, MeasurementSchema, Node};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::error::MemberError;

/// Suffix of the modification sidecar that may accompany a data file.
pub const MODS_SUFFIX: &str = ".mods";

/// A reference to an immutable data file owned by another member.
///
/// The only positional information the path carries is its tail:
/// `…/{sequence|unsequence}/{storageGroup}/{fileName}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFileRef {
    /// Node the file was exported by
    pub source: Node,
    /// Absolute path on the source node
    pub path: String,
    pub digest: [u8; 16],
    /// Whether a modification sidecar accompanies the file
    pub has_modifications: bool,
    /// Path of the sidecar on the source node
    pub modifications_path: String,
    /// Cleared once the file has been pulled and ingested locally
    pub remote: bool,
}

impl RemoteFileRef {
    pub fn new(source: Node, path: impl Into<String>, digest: [u8; 16]) -> Self {
        let path = path.into();
        Self {
            source,
            modifications_path: format!("{path}{MODS_SUFFIX}"),
            path,
            digest,
            has_modifications: false,
            remote: true,
        }
    }

    /// `{storageGroup}/{fileName}` from the path tail.
    pub fn storage_group_and_file(&self) -> Option<(String, String)> {
        let path = Path::new(&self.path);
        let file_name = path.file_name()?.to_str()?.to_string();
        let storage_group = path.parent()?.file_name()?.to_str()?.to_string();
        Some((storage_group, file_name))
    }

    /// Whether the file lives under a `sequence` directory; `None` when the
    /// path does not follow the naming contract.
    pub fn is_sequence(&self) -> Option<bool> {
        let kind = Path::new(&self.path)
            .parent()?
            .parent()?
            .file_name()?
            .to_str()?;
        match kind {
            "sequence" => Some(true),
            "unsequence" => Some(false),
            _ => None,
        }
    }
}

/// Schemas plus a batch of log entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimpleSnapshot {
    pub schemas: Vec<MeasurementSchema>,
    pub operations: Vec<LogEntry>,
    pub last: LogPosition,
}

/// Schemas plus references to immutable remote data files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub schemas: Vec<MeasurementSchema>,
    pub files: Vec<RemoteFileRef>,
    pub last: LogPosition,
}

impl FileSnapshot {
    pub fn new(last: LogPosition) -> Self {
        Self {
            schemas: Vec::new(),
            files: Vec::new(),
            last,
        }
    }

    pub fn add_schema(&mut self, schema: MeasurementSchema) {
        if !self.schemas.contains(&schema) {
            self.schemas.push(schema);
        }
    }
}

/// Mapping of slot to per-slot snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionedSnapshot {
    pub slots: BTreeMap<u32, Snapshot>,
    pub last: LogPosition,
}

impl PartitionedSnapshot {
    pub fn get_snapshot(&self, slot: u32) -> Option<&Snapshot> {
        self.slots.get(&slot)
    }

    pub fn take_snapshot(&mut self, slot: u32) -> Option<Snapshot> {
        self.slots.remove(&slot)
    }

    pub fn put_snapshot(&mut self, slot: u32, snapshot: Snapshot) {
        self.slots.insert(slot, snapshot);
    }
}

/// One-shot resolution cell shared between a remote placeholder and the
/// pull task that materialises it. Resolution is idempotent: the first
/// value wins, later calls are ignored.
pub struct SnapshotCell {
    state: parking_lot::Mutex<Option<Snapshot>>,
    notify: Notify,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self {
            state: parking_lot::Mutex::new(None),
            notify: Notify::new(),
        }
    }

    pub fn resolve(&self, snapshot: Snapshot) {
        {
            let mut state = self.state.lock();
            if state.is_none() {
                *state = Some(snapshot);
            }
        }
        self.notify.notify_waiters();
    }

    pub fn get(&self) -> Option<Snapshot> {
        self.state.lock().clone()
    }

    /// Wait until resolved or the timeout elapses; returns the resolved
    /// snapshot if there is one by then.
    pub async fn wait(&self, timeout: Duration) -> Option<Snapshot> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(snapshot) = self.get() {
                return Some(snapshot);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.get();
            }
        }
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Placeholder for a snapshot still being pulled from a prior owner.
#[derive(Clone)]
pub struct RemoteSnapshot {
    cell: Arc<SnapshotCell>,
}

impl RemoteSnapshot {
    pub fn new(cell: Arc<SnapshotCell>) -> Self {
        Self { cell }
    }

    pub fn cell(&self) -> &Arc<SnapshotCell> {
        &self.cell
    }
}

impl std::fmt::Debug for RemoteSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSnapshot")
            .field("resolved", &self.cell.get().is_some())
            .finish()
    }
}

/// The snapshot union. `Remote` never crosses the wire: it resolves before
/// export and serialising it is an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Snapshot {
    Simple(SimpleSnapshot),
    File(FileSnapshot),
    Partitioned(PartitionedSnapshot),
    #[serde(skip)]
    Remote(RemoteSnapshot),
}

impl Snapshot {
    pub fn is_remote(&self) -> bool {
        matches!(self, Snapshot::Remote(_))
    }

    /// Last log position the snapshot covers. For unresolved placeholders
    /// this is the default position, which never wins an install race.
    pub fn last(&self) -> LogPosition {
        match self {
            Snapshot::Simple(s) => s.last,
            Snapshot::File(s) => s.last,
            Snapshot::Partitioned(s) => s.last,
            Snapshot::Remote(r) => r.cell().get().map(|s| s.last()).unwrap_or_default(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MemberError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| MemberError::Codec(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MemberError> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(snapshot, _)| snapshot)
            .map_err(|e| MemberError::Codec(e.to_string()))
    }
}

impl PartitionedSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, MemberError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| MemberError::Codec(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MemberError> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(snapshot, _)| snapshot)
            .map_err(|e| MemberError::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chron_core::{TsDataType, TsEncoding};

    fn node(id: u64) -> Node {
        Node::new(format!("10.0.0.{id}"), 9003, id)
    }

    #[test]
    fn file_ref_parses_its_path_tail() {
        let r = RemoteFileRef::new(
            node(1),
            "/data/chrondb/sequence/root.vehicle/1-0-0.cdb",
            [0u8; 16],
        );
        assert_eq!(
            r.storage_group_and_file(),
            Some(("root.vehicle".to_string(), "1-0-0.cdb".to_string()))
        );
        assert_eq!(r.is_sequence(), Some(true));
    }

    #[test]
    fn snapshot_round_trips_through_bincode() {
        let mut partitioned = PartitionedSnapshot::default();
        let mut file = FileSnapshot::new(LogPosition::new(2, 17));
        file.add_schema(MeasurementSchema::new(
            "root.vehicle.d0.s0",
            TsDataType::Int64,
            TsEncoding::Rle,
        ));
        file.files.push(RemoteFileRef::new(
            node(1),
            "/data/chrondb/sequence/root.vehicle/1-0-0.cdb",
            [7u8; 16],
        ));
        partitioned.put_snapshot(3, Snapshot::File(file));
        partitioned.last = LogPosition::new(2, 17);

        let bytes = partitioned.to_bytes().unwrap();
        let decoded = PartitionedSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.last, partitioned.last);
        assert!(decoded.get_snapshot(3).is_some());
        assert!(decoded.get_snapshot(4).is_none());
    }

    #[test]
    fn remote_snapshots_do_not_serialize() {
        let remote = Snapshot::Remote(RemoteSnapshot::new(Arc::new(SnapshotCell::new())));
        assert!(remote.to_bytes().is_err());
    }

    #[test]
    fn cell_resolution_is_idempotent() {
        let cell = SnapshotCell::new();
        cell.resolve(Snapshot::Simple(SimpleSnapshot {
            last: LogPosition::new(1, 5),
            ..Default::default()
        }));
        cell.resolve(Snapshot::Simple(SimpleSnapshot {
            last: LogPosition::new(9, 9),
            ..Default::default()
        }));
        assert_eq!(cell.get().unwrap().last(), LogPosition::new(1, 5));
    }

    #[tokio::test]
    async fn waiters_observe_resolution() {
        let cell = Arc::new(SnapshotCell::new());
        let waiter = {
            let cell = cell.clone();
            tokio::spawn(async move { cell.wait(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        cell.resolve(Snapshot::Simple(SimpleSnapshot::default()));
        let resolved = waiter.await.unwrap();
        assert!(resolved.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_on_unresolved_cells() {
        let cell = SnapshotCell::new();
        assert!(cell.wait(Duration::from_millis(10)).await.is_none());
    }
}
