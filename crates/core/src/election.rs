//! Election and heartbeat message shapes

use serde::{Deserialize, Serialize};

use crate::log::LogPosition;
use crate::node::Node;

/// A vote request from a data-group candidate.
///
/// Carries the candidate's position in both the metadata-group log and the
/// data-group log: a data-group leader must also be acceptable as a
/// metadata-group leader, otherwise it could serve clients a stale
/// partition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionRequest {
    /// The candidate's term
    pub term: u64,
    /// The candidate itself
    pub elector: Node,
    /// The candidate's metadata-group log position
    pub meta_log: LogPosition,
    /// The candidate's data-group log position
    pub data_log: LogPosition,
}

/// Verdict of a vote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionResponse {
    /// The candidate is admitted; the voter has become its follower.
    Agree,
    /// The candidate's data log is behind the voter's.
    LogMismatch,
    /// The candidate's metadata log is behind the voter's; admitting it
    /// would expose clients to an out-of-date partition table.
    MetaLogStale,
    /// The candidate's term is not greater than the voter's.
    TermStale { local_term: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub term: u64,
    pub leader: Node,
    /// Header of the group the heartbeat belongs to
    pub header: Node,
    /// The leader's commit index; followers catch their local log up to it
    pub commit_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub term: u64,
    pub success: bool,
}
