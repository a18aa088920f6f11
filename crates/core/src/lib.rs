//! Cluster-wide shared types for the ChronDB data plane
//!
//! Contains the node identity and partition-group model, the slot partition
//! table, log entry/position types, election message shapes, and the series
//! schema and value types together with their wire encodings.

pub mod election;
pub mod error;
pub mod group;
pub mod log;
pub mod node;
pub mod partition;
pub mod series;

pub use election::{ElectionRequest, ElectionResponse, HeartbeatRequest, HeartbeatResponse};
pub use error::CodecError;
pub use group::PartitionGroup;
pub use log::{LogEntry, LogPosition};
pub use node::Node;
pub use partition::{SlotPartitionTable, TOTAL_SLOTS};
pub use series::{
    deserialize_tv_pairs, serialize_tv_pairs, MeasurementSchema, TimeFilter, TimeValuePair,
    TsDataType, TsEncoding, TsValue,
};
