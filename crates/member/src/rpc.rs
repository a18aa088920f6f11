//! RPC surface of a data-group member
//!
//! The wire framework is out of scope; the surface is the [`DataRpc`]
//! trait, implemented both by the member itself (server side) and by the
//! transport's client stubs. Handlers are async and return `Result`: the
//! completion of the returned future drives the transport's response
//! write, which removes the explicit result-handler from every signature.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chron_core::{ElectionRequest, ElectionResponse, HeartbeatRequest, HeartbeatResponse, Node};
use serde::{Deserialize, Serialize};

use crate::error::MemberError;

/// A serialised partitioned snapshot pushed by the group's consensus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendSnapshotRequest {
    pub snapshot_bytes: Vec<u8>,
}

/// Request for the per-slot snapshots of the given slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullSnapshotRequest {
    pub required_slots: Vec<u32>,
}

/// Per-slot serialised snapshots; slots not held by the serving group are
/// silently absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullSnapshotResponse {
    pub snapshots: HashMap<u32, Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullSchemaRequest {
    pub prefix: String,
}

/// Length-prefixed schema batch: a u32 big-endian count followed by each
/// schema's canonical encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullSchemaResponse {
    pub schema_bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleSeriesQueryRequest {
    pub path: String,
    /// Optional serialised [`chron_core::TimeFilter`]
    pub filter_bytes: Option<Vec<u8>>,
    pub requester: Node,
    pub query_id: u64,
    pub pushdown_unseq: bool,
}

/// An opaque physical plan routed to the slot it operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalPlan {
    pub slot: u32,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecStatus {
    pub code: u16,
    pub message: String,
}

impl ExecStatus {
    pub const SUCCESS: u16 = 200;
    pub const INTERNAL_ERROR: u16 = 500;

    pub fn ok() -> Self {
        Self {
            code: Self::SUCCESS,
            message: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: Self::INTERNAL_ERROR,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == Self::SUCCESS
    }
}

/// Operations peers invoke on a data-group member.
#[async_trait]
pub trait DataRpc: Send + Sync {
    /// Install a partitioned snapshot produced by the group's consensus.
    async fn send_snapshot(&self, request: SendSnapshotRequest) -> Result<(), MemberError>;

    /// Export per-slot snapshots to a new owner of the given slots.
    async fn pull_snapshot(
        &self,
        request: PullSnapshotRequest,
    ) -> Result<PullSnapshotResponse, MemberError>;

    async fn pull_timeseries_schema(
        &self,
        request: PullSchemaRequest,
    ) -> Result<PullSchemaResponse, MemberError>;

    /// Open a series reader; returns the reader id for fetching.
    async fn query_single_series(
        &self,
        request: SingleSeriesQueryRequest,
    ) -> Result<u64, MemberError>;

    /// Fetch up to `fetch_size` pairs from a registered reader. The buffer
    /// starts with the value data-type ordinal byte; an exhausted reader
    /// yields an empty buffer.
    async fn fetch_single_series(
        &self,
        reader_id: u64,
        fetch_size: usize,
    ) -> Result<Bytes, MemberError>;

    async fn end_query(&self, requester: Node, query_id: u64) -> Result<(), MemberError>;

    async fn get_all_paths(&self, prefix: String) -> Result<Vec<String>, MemberError>;

    async fn execute_non_query(&self, plan: PhysicalPlan) -> Result<ExecStatus, MemberError>;

    async fn process_election(
        &self,
        request: ElectionRequest,
    ) -> Result<ElectionResponse, MemberError>;

    async fn heartbeat(&self, request: HeartbeatRequest)
        -> Result<HeartbeatResponse, MemberError>;

    /// Read a chunk of a local file, for chunked remote pulls. An empty
    /// buffer signals end-of-file.
    async fn read_file(
        &self,
        path: String,
        offset: u64,
        length: usize,
        header: Node,
    ) -> Result<Bytes, MemberError>;

    /// The member's current commit index; used by followers to catch up.
    async fn commit_index(&self, header: Node) -> Result<u64, MemberError>;
}

/// Resolves a node to a client for it.
///
/// Returns `None` when the node is unreachable, which callers treat the
/// same as a failed call: move on to the next candidate.
pub trait ClientPool: Send + Sync {
    fn connect(&self, node: &Node) -> Option<Arc<dyn DataRpc>>;
}
