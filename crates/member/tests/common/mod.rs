//! Shared fixtures: an in-process client pool that wires members directly
//! to each other, plus in-memory collaborator implementations.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chron_core::{
    ElectionRequest, ElectionResponse, HeartbeatRequest, HeartbeatResponse, LogEntry, LogPosition,
    MeasurementSchema, Node, PartitionGroup, SlotPartitionTable, TimeFilter, TimeValuePair,
};
use chron_member::config::MemberConfig;
use chron_member::error::MemberError;
use chron_member::rpc::{
    ClientPool, DataRpc, ExecStatus, PhysicalPlan, PullSchemaRequest, PullSchemaResponse,
    PullSnapshotRequest, PullSnapshotResponse, SendSnapshotRequest, SingleSeriesQueryRequest,
};
use chron_member::traits::{
    DirectoryManager, LogApplier, MetaGroup, PointReader, SchemaRegistry, SealedFile,
    StorageEngine,
};
use chron_member::{DataGroupMember, DataGroupMemberFactory};
use parking_lot::Mutex;

pub fn node(id: u64) -> Node {
    Node::new(format!("10.0.0.{id}"), 9003, id)
}

pub fn single_group(n: &Node) -> PartitionGroup {
    PartitionGroup::new(n.clone(), [])
}

/// Test configuration with short timeouts.
pub fn test_config() -> MemberConfig {
    let mut config = MemberConfig::default();
    config.pull.connection_timeout_ms = 500;
    config.query.sync_leader_timeout_ms = 100;
    config
}

// === metadata-group view ===

pub struct TestMeta {
    term: AtomicU64,
    position: Mutex<LogPosition>,
    table: Mutex<Arc<SlotPartitionTable>>,
}

impl TestMeta {
    pub fn new(table: Arc<SlotPartitionTable>) -> Arc<Self> {
        Arc::new(Self {
            term: AtomicU64::new(0),
            position: Mutex::new(LogPosition::default()),
            table: Mutex::new(table),
        })
    }

    pub fn set_term(&self, term: u64) {
        self.term.store(term, Ordering::SeqCst);
    }

    pub fn set_position(&self, position: LogPosition) {
        *self.position.lock() = position;
    }
}

impl MetaGroup for TestMeta {
    fn term(&self) -> u64 {
        self.term.load(Ordering::SeqCst)
    }

    fn log_position(&self) -> LogPosition {
        *self.position.lock()
    }

    fn partition_table(&self) -> Arc<SlotPartitionTable> {
        self.table.lock().clone()
    }
}

// === applier ===

#[derive(Default)]
pub struct RecordingApplier {
    pub applied: Mutex<Vec<LogEntry>>,
    pub fail_at: Mutex<Option<u64>>,
}

impl LogApplier for RecordingApplier {
    fn apply(&self, entry: &LogEntry) -> Result<(), MemberError> {
        if *self.fail_at.lock() == Some(entry.index) {
            return Err(MemberError::StorageEngine("poisoned entry".into()));
        }
        self.applied.lock().push(entry.clone());
        Ok(())
    }
}

// === storage engine ===

pub struct VecReader {
    pairs: std::vec::IntoIter<TimeValuePair>,
}

impl PointReader for VecReader {
    fn next_pair(&mut self) -> Result<Option<TimeValuePair>, MemberError> {
        Ok(self.pairs.next())
    }
}

#[derive(Default)]
pub struct MemStorage {
    pub sealed: Mutex<Vec<SealedFile>>,
    /// Directory ingested files are moved into; ingestion fails when unset
    pub ingest_dir: Mutex<Option<PathBuf>>,
    pub ingested: Mutex<Vec<(String, PathBuf)>>,
    pub series: Mutex<HashMap<String, Vec<TimeValuePair>>>,
    pub fail_ingest: AtomicBool,
}

impl MemStorage {
    pub fn add_series(&self, path: &str, pairs: Vec<TimeValuePair>) {
        self.series.lock().insert(path.to_string(), pairs);
    }

    pub fn add_sealed(&self, storage_group: &str, path: PathBuf) {
        self.sealed.lock().push(SealedFile {
            storage_group: storage_group.to_string(),
            path,
            digest: [0u8; 16],
        });
    }
}

impl StorageEngine for MemStorage {
    fn ingest_file(&self, storage_group: &str, staged: &Path) -> Result<PathBuf, MemberError> {
        if self.fail_ingest.load(Ordering::SeqCst) {
            return Err(MemberError::StorageEngine("ingestion rejected".into()));
        }
        let dir = self
            .ingest_dir
            .lock()
            .clone()
            .ok_or_else(|| MemberError::StorageEngine("no ingest directory".into()))?;
        let target_dir = dir.join(storage_group);
        std::fs::create_dir_all(&target_dir)?;
        let file_name = staged
            .file_name()
            .ok_or_else(|| MemberError::StorageEngine("staged file has no name".into()))?;
        let target = target_dir.join(file_name);
        std::fs::rename(staged, &target)?;
        self.ingested
            .lock()
            .push((storage_group.to_string(), target.clone()));
        Ok(target)
    }

    fn sealed_files(&self) -> Vec<SealedFile> {
        self.sealed.lock().clone()
    }

    fn create_reader(
        &self,
        path: &str,
        filter: Option<TimeFilter>,
        _pushdown_unseq: bool,
    ) -> Result<Box<dyn PointReader>, MemberError> {
        let series = self.series.lock();
        let pairs = series
            .get(path)
            .ok_or_else(|| MemberError::StorageEngine(format!("no such series: {path}")))?;
        let selected: Vec<TimeValuePair> = pairs
            .iter()
            .filter(|p| filter.map_or(true, |f| f.satisfies(p.timestamp)))
            .cloned()
            .collect();
        Ok(Box::new(VecReader {
            pairs: selected.into_iter(),
        }))
    }
}

// === schema registry ===

#[derive(Default)]
pub struct MemSchemas {
    pub registered: Mutex<Vec<MeasurementSchema>>,
    pub fail_paths: AtomicBool,
}

impl MemSchemas {
    pub fn add(&self, schema: MeasurementSchema) {
        self.registered.lock().push(schema);
    }
}

impl SchemaRegistry for MemSchemas {
    fn register(&self, schema: &MeasurementSchema) -> Result<(), MemberError> {
        let mut registered = self.registered.lock();
        if !registered.contains(schema) {
            registered.push(schema.clone());
        }
        Ok(())
    }

    fn collect_series(&self, prefix: &str) -> Vec<MeasurementSchema> {
        self.registered
            .lock()
            .iter()
            .filter(|s| s.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn all_paths(&self, prefix: &str) -> Result<Vec<String>, MemberError> {
        if self.fail_paths.load(Ordering::SeqCst) {
            return Err(MemberError::Metadata("catalog unavailable".into()));
        }
        Ok(self
            .registered
            .lock()
            .iter()
            .filter(|s| s.path.starts_with(prefix))
            .map(|s| s.path.clone())
            .collect())
    }
}

// === directories ===

#[derive(Default)]
pub struct StaticDirs {
    pub sequence: Mutex<Vec<PathBuf>>,
    pub unsequence: Mutex<Vec<PathBuf>>,
}

impl DirectoryManager for StaticDirs {
    fn sequence_dirs(&self) -> Vec<PathBuf> {
        self.sequence.lock().clone()
    }

    fn unsequence_dirs(&self) -> Vec<PathBuf> {
        self.unsequence.lock().clone()
    }
}

// === client pool ===

/// Wires node ids straight to in-process [`DataRpc`] implementations.
#[derive(Default)]
pub struct LoopbackPool {
    clients: Mutex<HashMap<u64, Arc<dyn DataRpc>>>,
}

impl LoopbackPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, node: &Node, rpc: Arc<dyn DataRpc>) {
        self.clients.lock().insert(node.id, rpc);
    }

    pub fn disconnect(&self, node: &Node) {
        self.clients.lock().remove(&node.id);
    }
}

impl ClientPool for LoopbackPool {
    fn connect(&self, node: &Node) -> Option<Arc<dyn DataRpc>> {
        self.clients.lock().get(&node.id).cloned()
    }
}

// === chunked file server ===

/// Serves `read_file` from the local filesystem; every other operation
/// fails. `stall` makes reads hang past any timeout.
#[derive(Default)]
pub struct ChunkFileServer {
    pub reads: AtomicU64,
    pub stall: AtomicBool,
}

fn unsupported(op: &str) -> MemberError {
    MemberError::Rpc {
        node: "file-server".into(),
        reason: format!("{op} is not served here"),
    }
}

#[async_trait]
impl DataRpc for ChunkFileServer {
    async fn send_snapshot(&self, _request: SendSnapshotRequest) -> Result<(), MemberError> {
        Err(unsupported("send_snapshot"))
    }

    async fn pull_snapshot(
        &self,
        _request: PullSnapshotRequest,
    ) -> Result<PullSnapshotResponse, MemberError> {
        Err(unsupported("pull_snapshot"))
    }

    async fn pull_timeseries_schema(
        &self,
        _request: PullSchemaRequest,
    ) -> Result<PullSchemaResponse, MemberError> {
        Err(unsupported("pull_timeseries_schema"))
    }

    async fn query_single_series(
        &self,
        _request: SingleSeriesQueryRequest,
    ) -> Result<u64, MemberError> {
        Err(unsupported("query_single_series"))
    }

    async fn fetch_single_series(
        &self,
        _reader_id: u64,
        _fetch_size: usize,
    ) -> Result<Bytes, MemberError> {
        Err(unsupported("fetch_single_series"))
    }

    async fn end_query(&self, _requester: Node, _query_id: u64) -> Result<(), MemberError> {
        Err(unsupported("end_query"))
    }

    async fn get_all_paths(&self, _prefix: String) -> Result<Vec<String>, MemberError> {
        Err(unsupported("get_all_paths"))
    }

    async fn execute_non_query(&self, _plan: PhysicalPlan) -> Result<ExecStatus, MemberError> {
        Err(unsupported("execute_non_query"))
    }

    async fn process_election(
        &self,
        _request: ElectionRequest,
    ) -> Result<ElectionResponse, MemberError> {
        Err(unsupported("process_election"))
    }

    async fn heartbeat(
        &self,
        _request: HeartbeatRequest,
    ) -> Result<HeartbeatResponse, MemberError> {
        Err(unsupported("heartbeat"))
    }

    async fn read_file(
        &self,
        path: String,
        offset: u64,
        length: usize,
        _header: Node,
    ) -> Result<Bytes, MemberError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        chron_member::file_puller::read_file_chunk(path, offset, length).await
    }

    async fn commit_index(&self, _header: Node) -> Result<u64, MemberError> {
        Err(unsupported("commit_index"))
    }
}

// === fixture ===

/// One member's collaborators plus the shared client pool.
pub struct Fixture {
    pub config: MemberConfig,
    pub meta: Arc<TestMeta>,
    pub applier: Arc<RecordingApplier>,
    pub storage: Arc<MemStorage>,
    pub schemas: Arc<MemSchemas>,
    pub dirs: Arc<StaticDirs>,
    pub pool: Arc<LoopbackPool>,
}

impl Fixture {
    pub fn new(table: Arc<SlotPartitionTable>) -> Self {
        Self::with_pool(table, LoopbackPool::new())
    }

    pub fn with_pool(table: Arc<SlotPartitionTable>, pool: Arc<LoopbackPool>) -> Self {
        Self {
            config: test_config(),
            meta: TestMeta::new(table),
            applier: Arc::new(RecordingApplier::default()),
            storage: Arc::new(MemStorage::default()),
            schemas: Arc::new(MemSchemas::default()),
            dirs: Arc::new(StaticDirs::default()),
            pool,
        }
    }

    /// Build a member and register it in the pool under its own node.
    pub fn create_member(&self, group: PartitionGroup, this_node: Node) -> Arc<DataGroupMember> {
        let factory = DataGroupMemberFactory::new(
            self.config.clone(),
            self.applier.clone(),
            self.meta.clone(),
            self.pool.clone(),
            self.storage.clone(),
            self.schemas.clone(),
            self.dirs.clone(),
        );
        let member = factory.create(group, this_node.clone());
        self.pool.register(&this_node, member.clone());
        member
    }
}
