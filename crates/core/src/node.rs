//! Node identity

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a cluster node.
///
/// Node ids form the sort key over the wrap-around consistent-hash ring;
/// the address and metadata port identify the process for RPC purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    /// Host address
    pub address: String,
    /// Port of the metadata service on this node
    pub meta_port: u16,
    /// Ring identifier, unique cluster-wide
    pub id: u64,
}

impl Node {
    pub fn new(address: impl Into<String>, meta_port: u16, id: u64) -> Self {
        Self {
            address: address.into(),
            meta_port,
            id,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}(#{})", self.address, self.meta_port, self.id)
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.address.cmp(&other.address))
            .then_with(|| self.meta_port.cmp(&other.meta_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_ring_id() {
        let a = Node::new("10.0.0.1", 9003, 10);
        let b = Node::new("10.0.0.2", 9003, 20);
        assert!(a < b);

        let mut nodes = vec![b.clone(), a.clone()];
        nodes.sort();
        assert_eq!(nodes, vec![a, b]);
    }
}
