//! Partitioned log manager
//!
//! One mutual exclusion guards the ordered log, the per-slot snapshot cache
//! and the last-log bookkeeping. Log application, snapshot application and
//! snapshot export all run under it, so an exported snapshot always
//! reflects every committed append, and a reader racing an install sees
//! either the pre- or post-install snapshot, never a torn composite.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chron_core::{LogEntry, LogPosition, Node, SlotPartitionTable};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::MemberError;
use crate::snapshot::{FileSnapshot, PartitionedSnapshot, RemoteFileRef, Snapshot};
use crate::traits::{LogApplier, SchemaRegistry, StorageEngine};

pub struct PartitionedLogManager {
    name: String,
    node: Node,
    applier: Arc<dyn LogApplier>,
    storage: Arc<dyn StorageEngine>,
    schemas: Arc<dyn SchemaRegistry>,
    inner: Mutex<LogManagerInner>,
}

#[derive(Default)]
pub struct LogManagerInner {
    /// Appended entries not yet applied, ascending by index
    entries: Vec<LogEntry>,
    /// Position of the last applied entry
    commit: LogPosition,
    /// Position of the last appended entry or installed snapshot,
    /// monotonic non-decreasing
    last: LogPosition,
    /// Per-slot snapshot cache
    snapshots: HashMap<u32, Snapshot>,
}

impl LogManagerInner {
    pub fn last(&self) -> LogPosition {
        self.last
    }

    pub fn commit(&self) -> LogPosition {
        self.commit
    }
}

impl PartitionedLogManager {
    pub fn new(
        name: String,
        node: Node,
        applier: Arc<dyn LogApplier>,
        storage: Arc<dyn StorageEngine>,
        schemas: Arc<dyn SchemaRegistry>,
    ) -> Self {
        Self {
            name,
            node,
            applier,
            storage,
            schemas,
            inner: Mutex::new(LogManagerInner::default()),
        }
    }

    /// Take the log-manager exclusion for a compound critical section.
    pub async fn lock(&self) -> MutexGuard<'_, LogManagerInner> {
        self.inner.lock().await
    }

    pub async fn last_position(&self) -> LogPosition {
        self.inner.lock().await.last
    }

    pub async fn commit_index(&self) -> u64 {
        self.inner.lock().await.commit.index
    }

    pub async fn append(&self, entry: LogEntry) -> Result<(), MemberError> {
        let mut inner = self.inner.lock().await;
        self.append_locked(&mut inner, entry)
    }

    pub async fn commit_to(&self, index: u64) {
        let mut inner = self.inner.lock().await;
        self.commit_locked(&mut inner, index);
    }

    pub async fn set_snapshot(&self, slot: u32, snapshot: Snapshot) {
        let mut inner = self.inner.lock().await;
        self.set_snapshot_locked(&mut inner, slot, snapshot);
    }

    pub async fn snapshot(&self, slot: u32) -> Option<Snapshot> {
        self.inner.lock().await.snapshots.get(&slot).cloned()
    }

    /// Append one entry to the ordered log; indexes may not regress.
    pub fn append_locked(
        &self,
        inner: &mut LogManagerInner,
        entry: LogEntry,
    ) -> Result<(), MemberError> {
        if entry.index <= inner.last.index {
            return Err(MemberError::StorageEngine(format!(
                "log index {} does not advance past {}",
                entry.index, inner.last.index
            )));
        }
        inner.last = entry.position();
        inner.entries.push(entry);
        Ok(())
    }

    /// Apply all appended entries up to `index` through the applier, in
    /// index order. A failing entry is logged and skipped; the rest of the
    /// batch still applies.
    pub fn commit_locked(&self, inner: &mut LogManagerInner, index: u64) {
        let mut applied_to = inner.commit;
        inner.entries.retain(|entry| {
            if entry.index > index {
                return true;
            }
            if let Err(e) = self.applier.apply(entry) {
                warn!(
                    "{}: cannot apply log {} at index {}, skipped: {}",
                    self.name, entry.slot, entry.index, e
                );
            }
            if entry.index > applied_to.index {
                applied_to = entry.position();
            }
            false
        });
        inner.commit = applied_to;
    }

    /// Publish a snapshot under a slot.
    ///
    /// A materialised snapshot is authoritative: it is replaced only by a
    /// materialised snapshot with a strictly greater last index. Remote
    /// placeholders never displace materialised state.
    pub fn set_snapshot_locked(&self, inner: &mut LogManagerInner, slot: u32, snapshot: Snapshot) {
        if let Some(existing) = inner.snapshots.get(&slot) {
            if !existing.is_remote() {
                if snapshot.is_remote() {
                    debug!(
                        "{}: slot {} already materialised, placeholder ignored",
                        self.name, slot
                    );
                    return;
                }
                if snapshot.last().index <= existing.last().index {
                    debug!(
                        "{}: snapshot for slot {} at index {} does not supersede {}",
                        self.name,
                        slot,
                        snapshot.last().index,
                        existing.last().index
                    );
                    return;
                }
            }
        }
        inner.snapshots.insert(slot, snapshot);
    }

    /// Whether a slot has neither a materialised snapshot nor a pending
    /// placeholder.
    pub fn snapshot_missing_locked(&self, inner: &LogManagerInner, slot: u32) -> bool {
        !inner.snapshots.contains_key(&slot)
    }

    /// The slot's snapshot, resolving a remote placeholder if necessary.
    /// Resolution is bounded by `timeout`; an unresolved placeholder yields
    /// `None`.
    pub async fn resolved_snapshot_locked(
        &self,
        inner: &mut LogManagerInner,
        slot: u32,
        timeout: Duration,
    ) -> Option<Snapshot> {
        let snapshot = inner.snapshots.get(&slot)?.clone();
        match snapshot {
            Snapshot::Remote(remote) => {
                let resolved = remote.cell().wait(timeout).await?;
                inner.snapshots.insert(slot, resolved.clone());
                Some(resolved)
            }
            other => Some(other),
        }
    }

    /// Raise the last (and applied) position to `position`; neither ever
    /// decreases.
    pub fn install_position_locked(&self, inner: &mut LogManagerInner, position: LogPosition) {
        if position.index > inner.last.index {
            inner.last = position;
        }
        if position.index > inner.commit.index {
            inner.commit = position;
        }
    }

    /// Fold local state into the per-slot cache so the materialised
    /// [`PartitionedSnapshot`] reflects all committed appends: sealed data
    /// files are collected from the storage engine, mapped to slots by
    /// their storage group, and combined with the matching schemas.
    pub fn take_snapshot_locked(&self, inner: &mut LogManagerInner) {
        let commit = inner.commit;
        let mut per_slot: HashMap<u32, FileSnapshot> = HashMap::new();

        for sealed in self.storage.sealed_files() {
            let slot = SlotPartitionTable::slot_for_group(&sealed.storage_group);
            let entry = per_slot
                .entry(slot)
                .or_insert_with(|| FileSnapshot::new(commit));
            let mut file = RemoteFileRef::new(
                self.node.clone(),
                sealed.path.to_string_lossy().into_owned(),
                sealed.digest,
            );
            let mods = format!("{}{}", file.path, crate::snapshot::MODS_SUFFIX);
            if std::path::Path::new(&mods).exists() {
                file.has_modifications = true;
            }
            entry.files.push(file);
            for schema in self.schemas.collect_series(&sealed.storage_group) {
                entry.add_schema(schema);
            }
        }

        for (slot, file_snapshot) in per_slot {
            self.set_snapshot_locked(inner, slot, Snapshot::File(file_snapshot));
        }
    }

    /// Assemble the full partitioned view from the cache. Unresolved
    /// placeholders are skipped.
    pub fn partitioned_snapshot_locked(&self, inner: &LogManagerInner) -> PartitionedSnapshot {
        let mut partitioned = PartitionedSnapshot {
            last: inner.last,
            ..Default::default()
        };
        for (slot, snapshot) in &inner.snapshots {
            match snapshot {
                Snapshot::Remote(remote) => {
                    if let Some(resolved) = remote.cell().get() {
                        partitioned.put_snapshot(*slot, resolved);
                    }
                }
                other => partitioned.put_snapshot(*slot, other.clone()),
            }
        }
        partitioned
    }
}
