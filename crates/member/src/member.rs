//! Data group member
//!
//! The replica-level member of one partition group: it gates elections on
//! metadata freshness, applies consensus-committed snapshots, pulls slot
//! state from prior owners when ownership shifts, serves chunked remote
//! reads, and routes query operations, either serving locally after
//! catching up with the leader or forwarding to it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use chron_core::{
    serialize_tv_pairs, ElectionRequest, ElectionResponse, HeartbeatRequest, HeartbeatResponse,
    LogEntry, LogPosition, Node, PartitionGroup, TimeFilter,
};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::MemberConfig;
use crate::error::MemberError;
use crate::file_puller::{self, FilePuller};
use crate::heartbeat;
use crate::log_manager::{LogManagerInner, PartitionedLogManager};
use crate::pull_scheduler::PullSnapshotScheduler;
use crate::query_manager::QueryManager;
use crate::rpc::{
    ClientPool, DataRpc, ExecStatus, PhysicalPlan, PullSchemaRequest, PullSchemaResponse,
    PullSnapshotRequest, PullSnapshotResponse, SendSnapshotRequest, SingleSeriesQueryRequest,
};
use crate::snapshot::{
    FileSnapshot, PartitionedSnapshot, RemoteSnapshot, SimpleSnapshot, Snapshot, SnapshotCell,
};
use crate::traits::{
    DirectoryManager, LogApplier, MetaGroup, SchemaRegistry, StorageEngine,
};

/// The role a member currently occupies within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
    Elector,
}

/// Compound election state: the term bump always happens together with the
/// role and leader reset, in one critical section.
struct MemberState {
    role: Role,
    term: u64,
    leader: Option<Node>,
    last_heartbeat: Instant,
}

pub struct DataGroupMember {
    name: String,
    this_node: Node,
    nodes: Mutex<PartitionGroup>,
    state: Mutex<MemberState>,
    log_manager: Arc<PartitionedLogManager>,
    meta: Arc<dyn MetaGroup>,
    clients: Arc<dyn ClientPool>,
    applier: Arc<dyn LogApplier>,
    storage: Arc<dyn StorageEngine>,
    schemas: Arc<dyn SchemaRegistry>,
    query_manager: QueryManager,
    puller: FilePuller,
    scheduler: PullSnapshotScheduler,
    config: MemberConfig,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    /// Handle to the owning `Arc`, for spawning the heartbeat loop
    self_handle: Weak<DataGroupMember>,
}

/// Creates data-group members with a fixed set of collaborator handles.
pub struct DataGroupMemberFactory {
    config: MemberConfig,
    applier: Arc<dyn LogApplier>,
    meta: Arc<dyn MetaGroup>,
    clients: Arc<dyn ClientPool>,
    storage: Arc<dyn StorageEngine>,
    schemas: Arc<dyn SchemaRegistry>,
    directories: Arc<dyn DirectoryManager>,
}

impl DataGroupMemberFactory {
    pub fn new(
        config: MemberConfig,
        applier: Arc<dyn LogApplier>,
        meta: Arc<dyn MetaGroup>,
        clients: Arc<dyn ClientPool>,
        storage: Arc<dyn StorageEngine>,
        schemas: Arc<dyn SchemaRegistry>,
        directories: Arc<dyn DirectoryManager>,
    ) -> Self {
        Self {
            config,
            applier,
            meta,
            clients,
            storage,
            schemas,
            directories,
        }
    }

    pub fn create(&self, nodes: PartitionGroup, this_node: Node) -> Arc<DataGroupMember> {
        let header = nodes.header().clone();
        let name = format!("Data({}:{})", header.address, header.meta_port);
        let log_manager = Arc::new(PartitionedLogManager::new(
            name.clone(),
            this_node.clone(),
            self.applier.clone(),
            self.storage.clone(),
            self.schemas.clone(),
        ));
        let puller = FilePuller::new(
            name.clone(),
            header,
            self.clients.clone(),
            self.storage.clone(),
            self.directories.clone(),
            self.meta.clone(),
            self.config.pull.clone(),
        );
        let scheduler = PullSnapshotScheduler::new(
            name.clone(),
            self.clients.clone(),
            self.config.pull.workers(),
        );
        Arc::new_cyclic(|self_handle| DataGroupMember {
            name,
            this_node,
            nodes: Mutex::new(nodes),
            state: Mutex::new(MemberState {
                role: Role::Elector,
                term: 0,
                leader: None,
                last_heartbeat: Instant::now(),
            }),
            log_manager,
            meta: self.meta.clone(),
            clients: self.clients.clone(),
            applier: self.applier.clone(),
            storage: self.storage.clone(),
            schemas: self.schemas.clone(),
            query_manager: QueryManager::new(),
            puller,
            scheduler,
            config: self.config.clone(),
            shutdown: Mutex::new(None),
            self_handle: self_handle.clone(),
        })
    }
}

impl DataGroupMember {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn this_node(&self) -> &Node {
        &self.this_node
    }

    /// The first node on the ring in this group. It determines which slots
    /// the group takes responsibility for; other members may change, this
    /// one is fixed for the group's lifetime and identifies the group.
    pub fn header(&self) -> Node {
        self.nodes.lock().header().clone()
    }

    pub fn all_nodes(&self) -> Vec<Node> {
        self.nodes.lock().nodes().to_vec()
    }

    pub fn role(&self) -> Role {
        self.state.lock().role
    }

    pub fn term(&self) -> u64 {
        self.state.lock().term
    }

    pub fn leader(&self) -> Option<Node> {
        self.state.lock().leader.clone()
    }

    pub fn log_manager(&self) -> &Arc<PartitionedLogManager> {
        &self.log_manager
    }

    pub fn config(&self) -> &MemberConfig {
        &self.config
    }

    /// Start the heartbeat loop. The pull-snapshot pool is ready from
    /// construction.
    pub fn start(&self) {
        let Some(this) = self.self_handle.upgrade() else {
            return;
        };
        let (tx, rx) = watch::channel(false);
        *self.shutdown.lock() = Some(tx);
        tokio::spawn(heartbeat::run(this, rx));
        info!("{}: member started", self.name);
    }

    /// Stop the heartbeat loop and force-terminate in-flight snapshot
    /// pulls.
    pub fn stop(&self) {
        if let Some(tx) = self.shutdown.lock().take() {
            let _ = tx.send(true);
        }
        self.scheduler.stop();
        info!("{}: member stopped", self.name);
    }

    // === election ===

    /// Decide a vote request.
    ///
    /// A data-group candidate is admitted only if it would also be
    /// admitted as a metadata-group candidate: a leader with a stale
    /// metadata log would expose clients to an out-of-date partition
    /// table. Only after the metadata gate passes is the data log
    /// compared.
    pub async fn process_election_request(&self, request: &ElectionRequest) -> ElectionResponse {
        info!(
            "{}: received an election request, term {}, meta log {:?}, data log {:?}",
            self.name, request.term, request.meta_log, request.data_log
        );

        let meta_verdict = verify_elector(
            self.meta.term(),
            self.meta.log_position(),
            request.term,
            request.meta_log,
        );
        if meta_verdict == ElectionResponse::LogMismatch {
            return ElectionResponse::MetaLogStale;
        }

        let data_position = self.log_manager.last_position().await;
        let mut state = self.state.lock();
        let verdict = verify_elector(state.term, data_position, request.term, request.data_log);
        if verdict == ElectionResponse::Agree {
            state.term = request.term;
            state.role = Role::Follower;
            state.leader = Some(request.elector.clone());
            state.last_heartbeat = Instant::now();
            info!(
                "{}: accepted {} as leader for term {}",
                self.name, request.elector, request.term
            );
        }
        verdict
    }

    // === membership ===

    /// Try to add a node into this group.
    ///
    /// Returns `true` if the local node was dropped to preserve the
    /// replication factor and should leave the group.
    pub fn add_node(&self, node: Node) -> bool {
        // a new member forces a fresh election so the stale leader cannot
        // keep taking the leadership
        {
            let mut state = self.state.lock();
            state.term += 1;
            state.last_heartbeat = Instant::now();
            state.role = Role::Elector;
            state.leader = None;
        }

        let mut nodes = self.nodes.lock();
        let mut insert_index = 0usize;
        for i in 0..nodes.len().saturating_sub(1) {
            let prev = &nodes.nodes()[i];
            let next = &nodes.nodes()[i + 1];
            if prev.id < node.id && node.id < next.id
                || prev.id < node.id && next.id < prev.id
                || node.id < next.id && next.id < prev.id
            {
                insert_index = i + 1;
                break;
            }
        }
        if insert_index > 0 {
            nodes.insert(insert_index, node);
            let removed = nodes.remove_last();
            debug!("{}: node inserted, the group is now {}", self.name, *nodes);
            removed.as_ref() == Some(&self.this_node)
        } else {
            false
        }
    }

    // === snapshot application ===

    /// Install a partitioned snapshot produced by the group's consensus.
    /// Only slots held by the local header (per the current partition
    /// table) are applied; the rest belonged to a different header.
    pub async fn apply_partitioned_snapshot(&self, mut snapshot: PartitionedSnapshot) {
        let mut inner = self.log_manager.lock().await;
        let table = self.meta.partition_table();
        let header = self.header();
        for slot in table.node_slots(&header) {
            if let Some(sub) = snapshot.take_snapshot(slot) {
                self.apply_snapshot_locked(&mut inner, sub, slot).await;
            }
        }
        self.log_manager
            .install_position_locked(&mut inner, snapshot.last);
    }

    /// Apply one slot's snapshot; the caller holds the log-manager
    /// exclusion.
    async fn apply_snapshot_locked(
        &self,
        inner: &mut LogManagerInner,
        snapshot: Snapshot,
        slot: u32,
    ) {
        debug!("{}: applying snapshot of slot {}", self.name, slot);
        match snapshot {
            Snapshot::Simple(simple) => self.apply_simple_snapshot_locked(inner, simple, slot),
            Snapshot::File(file) => self.apply_file_snapshot(file).await,
            other => error!(
                "{}: unrecognized snapshot {:?} for slot {}, dropped",
                self.name, other, slot
            ),
        }
    }

    fn apply_simple_snapshot_locked(
        &self,
        inner: &mut LogManagerInner,
        snapshot: SimpleSnapshot,
        slot: u32,
    ) {
        for schema in &snapshot.schemas {
            if let Err(e) = self.schemas.register(schema) {
                warn!(
                    "{}: cannot register schema {}: {}",
                    self.name, schema.path, e
                );
            }
        }
        for operation in &snapshot.operations {
            if let Err(e) = self.applier.apply(operation) {
                error!(
                    "{}: cannot apply a log at index {} in snapshot, ignored: {}",
                    self.name, operation.index, e
                );
            }
        }
        self.log_manager
            .set_snapshot_locked(inner, slot, Snapshot::Simple(snapshot));
    }

    async fn apply_file_snapshot(&self, snapshot: FileSnapshot) {
        for schema in &snapshot.schemas {
            if let Err(e) = self.schemas.register(schema) {
                warn!(
                    "{}: cannot register schema {}: {}",
                    self.name, schema.path, e
                );
            }
        }
        for file in &snapshot.files {
            if !self.puller.is_file_already_pulled(file) {
                self.puller.load_remote_file(file).await;
            }
        }
    }

    // === snapshot serving and pulling ===

    /// Export per-slot snapshots to a node that announced ownership of the
    /// requested slots. Non-leaders forward to the leader; the leader
    /// serves under the log-manager exclusion so everything committed
    /// before this point is visible to the successor.
    pub async fn handle_pull_snapshot(
        &self,
        request: PullSnapshotRequest,
    ) -> Result<PullSnapshotResponse, MemberError> {
        if self.role() != Role::Leader {
            if let Some(leader) = self.leader() {
                if let Some(client) = self.clients.connect(&leader) {
                    debug!(
                        "{}: forwarding a pull snapshot request to the leader {}",
                        self.name, leader
                    );
                    return client.pull_snapshot(request).await;
                }
            }
            return Err(MemberError::LeaderUnknown(self.all_nodes()));
        }

        let mut inner = self.log_manager.lock().await;
        debug!(
            "{}: {} slots are requested",
            self.name,
            request.required_slots.len()
        );
        self.log_manager.take_snapshot_locked(&mut inner);

        let table = self.meta.partition_table();
        let held: HashSet<u32> = table.node_slots(&self.header()).into_iter().collect();
        let mut snapshots = HashMap::new();
        for slot in request.required_slots {
            if !held.contains(&slot) {
                continue;
            }
            if let Some(snapshot) = self
                .log_manager
                .resolved_snapshot_locked(&mut inner, slot, self.config.pull.connection_timeout())
                .await
            {
                snapshots.insert(slot, snapshot.to_bytes()?);
            }
        }
        debug!(
            "{}: sending {} snapshots to the requester",
            self.name,
            snapshots.len()
        );
        Ok(PullSnapshotResponse { snapshots })
    }

    /// Pull the state of slots that migrated to the local header, grouped
    /// by previous holder. One placeholder is registered per slot; the
    /// scheduler resolves them as the batched pulls complete.
    pub async fn pull_snapshots(&self, slots: &[u32], new_node: &Node) {
        let mut inner = self.log_manager.lock().await;
        info!("{} pulling {} slots from remote", self.name, slots.len());
        let table = self.meta.partition_table();
        let previous_holders = table.previous_node_map(new_node).unwrap_or_default();

        let mut holder_slots: HashMap<u64, (Node, Vec<u32>)> = HashMap::new();
        for slot in slots {
            if self.log_manager.snapshot_missing_locked(&inner, *slot) {
                if let Some(holder) = previous_holders.get(slot) {
                    holder_slots
                        .entry(holder.id)
                        .or_insert_with(|| (holder.clone(), Vec::new()))
                        .1
                        .push(*slot);
                }
            }
        }

        for (_, (holder, holder_held)) in holder_slots {
            let Some(group) = table.header_group(&holder) else {
                warn!(
                    "{}: previous holder {} has no group in the partition table",
                    self.name, holder
                );
                continue;
            };
            let mut cells = Vec::with_capacity(holder_held.len());
            for slot in holder_held {
                let cell = Arc::new(SnapshotCell::new());
                self.log_manager.set_snapshot_locked(
                    &mut inner,
                    slot,
                    Snapshot::Remote(RemoteSnapshot::new(cell.clone())),
                );
                cells.push((slot, cell));
            }
            self.scheduler.submit(group, cells);
        }
    }

    // === query path ===

    /// Ensure local committed state is at least as recent as the leader's,
    /// bounded by the configured timeout.
    pub async fn sync_leader(&self) -> bool {
        let (role, leader) = {
            let state = self.state.lock();
            (state.role, state.leader.clone())
        };
        if role == Role::Leader {
            return true;
        }
        let Some(leader) = leader else {
            return false;
        };
        if leader == self.this_node {
            return true;
        }
        let Some(client) = self.clients.connect(&leader) else {
            return false;
        };
        let leader_commit = match client.commit_index(self.header()).await {
            Ok(index) => index,
            Err(e) => {
                warn!(
                    "{}: cannot read the commit index of leader {}: {}",
                    self.name, leader, e
                );
                return false;
            }
        };
        let deadline = Instant::now() + self.config.query.sync_leader_timeout();
        loop {
            if self.log_manager.commit_index().await >= leader_commit {
                return true;
            }
            if Instant::now() >= deadline {
                warn!(
                    "{}: cannot catch up with leader {} in time",
                    self.name, leader
                );
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn handle_query_single_series(
        &self,
        request: SingleSeriesQueryRequest,
    ) -> Result<u64, MemberError> {
        debug!(
            "{}: {} is querying {}, queryId {}",
            self.name, request.requester, request.path, request.query_id
        );
        if !self.sync_leader().await {
            return Err(MemberError::LeaderUnknown(self.all_nodes()));
        }

        let filter = match &request.filter_bytes {
            Some(bytes) => Some(decode_time_filter(bytes)?),
            None => None,
        };
        let context = self
            .query_manager
            .get_query_context(&request.requester, request.query_id);
        let reader = self
            .storage
            .create_reader(&request.path, filter, request.pushdown_unseq)?;
        let reader_id = self.query_manager.register_reader(&context, reader);
        debug!(
            "{}: built a reader of {} for {}, readerId {}",
            self.name, request.path, request.requester, reader_id
        );
        Ok(reader_id)
    }

    pub fn handle_fetch_single_series(
        &self,
        reader_id: u64,
        fetch_size: usize,
    ) -> Result<Bytes, MemberError> {
        let Some(reader) = self.query_manager.get_reader(reader_id) else {
            return Err(MemberError::ReaderNotFound(reader_id));
        };
        let mut reader = reader.lock();
        let mut pairs = Vec::new();
        while pairs.len() < fetch_size {
            match reader.next_pair()? {
                Some(pair) => pairs.push(pair),
                None => break,
            }
        }
        if pairs.is_empty() {
            return Ok(Bytes::new());
        }
        let mut buf = BytesMut::new();
        buf.put_u8(pairs[0].value.data_type().ordinal());
        serialize_tv_pairs(&pairs, &mut buf);
        debug!(
            "{}: sending {} results of reader {}",
            self.name,
            pairs.len(),
            reader_id
        );
        Ok(buf.freeze())
    }

    pub async fn handle_pull_timeseries_schema(
        &self,
        request: PullSchemaRequest,
    ) -> Result<PullSchemaResponse, MemberError> {
        // synchronize with the leader first: schema logs may be accepted
        // but not committed yet
        if !self.sync_leader().await {
            let leader = self
                .leader()
                .ok_or_else(|| MemberError::LeaderUnknown(self.all_nodes()))?;
            let client = self
                .clients
                .connect(&leader)
                .ok_or_else(|| MemberError::LeaderUnknown(self.all_nodes()))?;
            return client.pull_timeseries_schema(request).await;
        }

        let schemas = self.schemas.collect_series(&request.prefix);
        let mut buf = BytesMut::new();
        buf.put_u32(schemas.len() as u32);
        for schema in &schemas {
            schema.serialize_into(&mut buf);
        }
        Ok(PullSchemaResponse {
            schema_bytes: buf.to_vec(),
        })
    }

    pub async fn handle_execute_non_query(
        &self,
        plan: PhysicalPlan,
    ) -> Result<ExecStatus, MemberError> {
        if self.role() == Role::Leader {
            if let Some(status) = self.process_plan_locally(&plan).await {
                return Ok(status);
            }
        }
        let leader = self
            .leader()
            .ok_or_else(|| MemberError::LeaderUnknown(self.all_nodes()))?;
        let client = self
            .clients
            .connect(&leader)
            .ok_or_else(|| MemberError::LeaderUnknown(self.all_nodes()))?;
        client.execute_non_query(plan).await
    }

    /// Commit the plan through the local log. `None` when leadership was
    /// lost before the append, in which case the plan is forwarded.
    async fn process_plan_locally(&self, plan: &PhysicalPlan) -> Option<ExecStatus> {
        let mut inner = self.log_manager.lock().await;
        let term = {
            let state = self.state.lock();
            if state.role != Role::Leader {
                return None;
            }
            state.term
        };
        let index = inner.last().index + 1;
        let entry = LogEntry::new(term, index, plan.slot, plan.payload.clone());
        if let Err(e) = self.log_manager.append_locked(&mut inner, entry) {
            return Some(ExecStatus::error(e.to_string()));
        }
        self.log_manager.commit_locked(&mut inner, index);
        Some(ExecStatus::ok())
    }

    pub fn handle_get_all_paths(&self, prefix: &str) -> Result<Vec<String>, MemberError> {
        self.schemas.all_paths(prefix)
    }

    pub fn handle_end_query(&self, requester: &Node, query_id: u64) {
        self.query_manager.end_query(requester, query_id);
    }

    // === heartbeat ===

    pub async fn handle_heartbeat(
        &self,
        request: HeartbeatRequest,
    ) -> Result<HeartbeatResponse, MemberError> {
        let term = {
            let mut state = self.state.lock();
            if request.term < state.term {
                return Ok(HeartbeatResponse {
                    term: state.term,
                    success: false,
                });
            }
            state.term = request.term;
            if request.leader != self.this_node {
                state.role = Role::Follower;
            }
            state.leader = Some(request.leader.clone());
            state.last_heartbeat = Instant::now();
            state.term
        };
        self.log_manager.commit_to(request.commit_index).await;
        Ok(HeartbeatResponse {
            term,
            success: true,
        })
    }

    /// Send one round of heartbeats to the other members, stepping down if
    /// a higher term comes back.
    pub async fn broadcast_heartbeat(&self) {
        let request = HeartbeatRequest {
            term: self.term(),
            leader: self.this_node.clone(),
            header: self.header(),
            commit_index: self.log_manager.commit_index().await,
        };
        for node in self.all_nodes() {
            if node == self.this_node {
                continue;
            }
            let Some(client) = self.clients.connect(&node) else {
                continue;
            };
            match client.heartbeat(request.clone()).await {
                Ok(response) if !response.success && response.term > request.term => {
                    info!(
                        "{}: a higher term {} exists, stepping down",
                        self.name, response.term
                    );
                    let mut state = self.state.lock();
                    state.term = state.term.max(response.term);
                    state.role = Role::Elector;
                    state.leader = None;
                    return;
                }
                Ok(_) => {}
                Err(e) => debug!("{}: cannot send a heartbeat to {}: {}", self.name, node, e),
            }
        }
    }

    /// Bump the term and solicit votes; becomes leader on a majority of
    /// `Agree` verdicts.
    pub async fn start_election(&self) {
        let data_log = self.log_manager.last_position().await;
        let request = {
            let mut state = self.state.lock();
            state.term += 1;
            state.role = Role::Elector;
            state.leader = None;
            ElectionRequest {
                term: state.term,
                elector: self.this_node.clone(),
                meta_log: self.meta.log_position(),
                data_log,
            }
        };
        info!(
            "{}: starting an election for term {}",
            self.name, request.term
        );

        let peers = self.all_nodes();
        let mut agrees = 1usize;
        for node in peers.iter().filter(|n| **n != self.this_node) {
            let Some(client) = self.clients.connect(node) else {
                continue;
            };
            match client.process_election(request.clone()).await {
                Ok(ElectionResponse::Agree) => agrees += 1,
                Ok(ElectionResponse::TermStale { local_term }) if local_term >= request.term => {
                    info!(
                        "{}: a higher term {} exists, abandoning the election",
                        self.name, local_term
                    );
                    let mut state = self.state.lock();
                    state.term = state.term.max(local_term);
                    state.role = Role::Elector;
                    return;
                }
                Ok(verdict) => debug!("{}: vote rejected by {}: {:?}", self.name, node, verdict),
                Err(e) => debug!("{}: cannot request a vote from {}: {}", self.name, node, e),
            }
        }

        if agrees * 2 > peers.len() {
            let mut state = self.state.lock();
            if state.term == request.term && state.role == Role::Elector {
                state.role = Role::Leader;
                state.leader = Some(self.this_node.clone());
                info!("{}: became leader for term {}", self.name, state.term);
            }
        }
    }

    pub(crate) fn heartbeat_elapsed(&self) -> Duration {
        self.state.lock().last_heartbeat.elapsed()
    }

    pub(crate) fn election_timeout(&self) -> Duration {
        let min = self.config.heartbeat.election_timeout_min_ms;
        let max = self.config.heartbeat.election_timeout_max_ms.max(min);
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// Log-freshness comparison for elections.
///
/// The candidate's term must be strictly greater than the local term, and
/// its `(lastLogTerm, lastLogIndex)` must not be lexicographically behind
/// the local log. A stale log is reported distinctly from a stale term.
pub fn verify_elector(
    local_term: u64,
    local: LogPosition,
    candidate_term: u64,
    candidate: LogPosition,
) -> ElectionResponse {
    if candidate_term <= local_term {
        return ElectionResponse::TermStale { local_term };
    }
    if candidate < local {
        return ElectionResponse::LogMismatch;
    }
    ElectionResponse::Agree
}

fn decode_time_filter(bytes: &[u8]) -> Result<TimeFilter, MemberError> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(filter, _)| filter)
        .map_err(|e| MemberError::Codec(e.to_string()))
}

/// Encode a time filter the way `querySingleSeries` expects it.
pub fn encode_time_filter(filter: &TimeFilter) -> Vec<u8> {
    bincode::serde::encode_to_vec(filter, bincode::config::standard())
        .unwrap_or_default()
}

#[async_trait]
impl DataRpc for DataGroupMember {
    async fn send_snapshot(&self, request: SendSnapshotRequest) -> Result<(), MemberError> {
        let snapshot = PartitionedSnapshot::from_bytes(&request.snapshot_bytes)?;
        debug!(
            "{}: received a snapshot covering {} slots",
            self.name,
            snapshot.slots.len()
        );
        self.apply_partitioned_snapshot(snapshot).await;
        Ok(())
    }

    async fn pull_snapshot(
        &self,
        request: PullSnapshotRequest,
    ) -> Result<PullSnapshotResponse, MemberError> {
        self.handle_pull_snapshot(request).await
    }

    async fn pull_timeseries_schema(
        &self,
        request: PullSchemaRequest,
    ) -> Result<PullSchemaResponse, MemberError> {
        self.handle_pull_timeseries_schema(request).await
    }

    async fn query_single_series(
        &self,
        request: SingleSeriesQueryRequest,
    ) -> Result<u64, MemberError> {
        self.handle_query_single_series(request).await
    }

    async fn fetch_single_series(
        &self,
        reader_id: u64,
        fetch_size: usize,
    ) -> Result<Bytes, MemberError> {
        self.handle_fetch_single_series(reader_id, fetch_size)
    }

    async fn end_query(&self, requester: Node, query_id: u64) -> Result<(), MemberError> {
        self.handle_end_query(&requester, query_id);
        Ok(())
    }

    async fn get_all_paths(&self, prefix: String) -> Result<Vec<String>, MemberError> {
        self.handle_get_all_paths(&prefix)
    }

    async fn execute_non_query(&self, plan: PhysicalPlan) -> Result<ExecStatus, MemberError> {
        self.handle_execute_non_query(plan).await
    }

    async fn process_election(
        &self,
        request: ElectionRequest,
    ) -> Result<ElectionResponse, MemberError> {
        Ok(self.process_election_request(&request).await)
    }

    async fn heartbeat(
        &self,
        request: HeartbeatRequest,
    ) -> Result<HeartbeatResponse, MemberError> {
        self.handle_heartbeat(request).await
    }

    async fn read_file(
        &self,
        path: String,
        offset: u64,
        length: usize,
        header: Node,
    ) -> Result<Bytes, MemberError> {
        if header.id != self.header().id {
            return Err(MemberError::transfer(
                path,
                format!("file belongs to the group of {}, not {}", self.header(), header),
            ));
        }
        file_puller::read_file_chunk(path, offset, length).await
    }

    async fn commit_index(&self, _header: Node) -> Result<u64, MemberError> {
        Ok(self.log_manager.commit_index().await)
    }
}
