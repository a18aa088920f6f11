//! Per-partition replication and data-transfer core
//!
//! A partition of the cluster's slot space is owned by a group of replicas
//! that jointly run consensus. This crate implements the replica-level
//! member of such a group: election gated on metadata freshness, snapshot
//! application, pulling partition state from prior owners when slot
//! ownership shifts, serving chunked remote reads to peers, and routing
//! client query operations to the correct replica.
//!
//! Collaborators outside this core (the storage engine, the schema
//! registry, the metadata-group member, the transport) are injected as
//! capability handles; see [`traits`] and [`rpc`].

pub mod config;
pub mod error;
pub mod file_puller;
mod heartbeat;
pub mod log_manager;
pub mod member;
pub mod pull_scheduler;
pub mod query_manager;
pub mod rpc;
pub mod snapshot;
pub mod traits;

pub use config::MemberConfig;
pub use error::MemberError;
pub use member::{DataGroupMember, DataGroupMemberFactory, Role};
