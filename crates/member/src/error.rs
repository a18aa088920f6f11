//! Member error types

use chron_core::Node;
use thiserror::Error;

/// Errors surfaced by data-group member operations.
///
/// `LeaderUnknown` carries the full group membership so the caller can
/// retry against another member; transfer and ingest failures are recovered
/// internally and only surface after the whole source group is exhausted.
#[derive(Debug, Error)]
pub enum MemberError {
    #[error("leader unknown, group members: {0:?}")]
    LeaderUnknown(Vec<Node>),

    #[error("no reader bound to id {0}")]
    ReaderNotFound(u64),

    #[error("metadata error: {0}")]
    Metadata(String),

    #[error("storage engine error: {0}")]
    StorageEngine(String),

    #[error("transfer of {path} failed: {reason}")]
    Transfer { path: String, reason: String },

    #[error("snapshot codec error: {0}")]
    Codec(String),

    #[error("rpc to {node} failed: {reason}")]
    Rpc { node: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MemberError {
    pub fn transfer(path: impl Into<String>, reason: impl Into<String>) -> Self {
        MemberError::Transfer {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn rpc(node: &Node, reason: impl Into<String>) -> Self {
        MemberError::Rpc {
            node: node.to_string(),
            reason: reason.into(),
        }
    }
}
