//! Slot partition table
//!
//! The key space of time-series is partitioned by a consistent-hash ring of
//! integer slots. Each slot is owned by exactly one partition-group header;
//! a storage group hashes to a slot with CRC16 (XMODEM variant).

use std::collections::HashMap;

use crc::{Crc, CRC_16_XMODEM};
use parking_lot::RwLock;

use crate::group::PartitionGroup;
use crate::node::Node;

/// Number of slots, fixed cluster-wide.
pub const TOTAL_SLOTS: u32 = 10_000;

static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Maps slots to owning headers and headers to their groups.
///
/// Owned by the metadata-group member; data-group members borrow it as a
/// read-only capability. Membership changes go through [`add_node`], which
/// records the pre-change holder of every reassigned slot so new owners
/// know where to pull slot state from.
///
/// [`add_node`]: SlotPartitionTable::add_node
pub struct SlotPartitionTable {
    replication: usize,
    inner: RwLock<TableInner>,
}

struct TableInner {
    /// All nodes, sorted by ring id
    ring: Vec<Node>,
    /// Owning header per slot, `TOTAL_SLOTS` entries
    slot_to_header: Vec<Node>,
    /// new-node id -> (moved slot -> holder before the move)
    previous_holders: HashMap<u64, HashMap<u32, Node>>,
}

impl SlotPartitionTable {
    /// Build a table over the given nodes, assigning slots in contiguous
    /// ranges across the ring.
    pub fn new(mut nodes: Vec<Node>, replication: usize) -> Self {
        debug_assert!(!nodes.is_empty(), "a partition table needs at least one node");
        nodes.sort();
        let count = nodes.len().max(1);
        let mut slot_to_header = Vec::with_capacity(TOTAL_SLOTS as usize);
        for slot in 0..TOTAL_SLOTS {
            let owner = (slot as usize * count) / TOTAL_SLOTS as usize;
            slot_to_header.push(nodes[owner.min(count - 1)].clone());
        }
        Self {
            replication,
            inner: RwLock::new(TableInner {
                ring: nodes,
                slot_to_header,
                previous_holders: HashMap::new(),
            }),
        }
    }

    pub fn replication(&self) -> usize {
        self.replication
    }

    /// Slot a storage group hashes to.
    pub fn slot_for_group(storage_group: &str) -> u32 {
        CRC16.checksum(storage_group.as_bytes()) as u32 % TOTAL_SLOTS
    }

    /// Owning header of a slot.
    pub fn route(&self, slot: u32) -> Option<Node> {
        self.inner.read().slot_to_header.get(slot as usize).cloned()
    }

    /// All slots held by the given header.
    pub fn node_slots(&self, header: &Node) -> Vec<u32> {
        self.inner
            .read()
            .slot_to_header
            .iter()
            .enumerate()
            .filter(|(_, owner)| owner.id == header.id)
            .map(|(slot, _)| slot as u32)
            .collect()
    }

    /// The partition group headed by `header`: the header and its
    /// `replication - 1` ring successors, wrapping around.
    pub fn header_group(&self, header: &Node) -> Option<PartitionGroup> {
        let inner = self.inner.read();
        let pos = inner.ring.iter().position(|n| n.id == header.id)?;
        let mut rest = Vec::with_capacity(self.replication.saturating_sub(1));
        for i in 1..self.replication.min(inner.ring.len()) {
            rest.push(inner.ring[(pos + i) % inner.ring.len()].clone());
        }
        Some(PartitionGroup::new(inner.ring[pos].clone(), rest))
    }

    /// Extend the ring with a node and rebalance an even share of slots to
    /// it, taking from every existing header in turn. The pre-change holder
    /// of each moved slot is recorded for [`previous_node_map`].
    ///
    /// [`previous_node_map`]: SlotPartitionTable::previous_node_map
    pub fn add_node(&self, new_node: Node) {
        let mut inner = self.inner.write();
        if inner.ring.iter().any(|n| n.id == new_node.id) {
            return;
        }
        let pos = inner.ring.partition_point(|n| n.id < new_node.id);
        inner.ring.insert(pos, new_node.clone());

        let holders = inner.ring.len() - 1;
        let quota = TOTAL_SLOTS as usize / inner.ring.len();
        let per_holder = quota / holders.max(1) + 1;

        let mut by_holder: Vec<(u64, Vec<u32>)> = Vec::new();
        for (slot, owner) in inner.slot_to_header.iter().enumerate() {
            match by_holder.iter_mut().find(|(id, _)| *id == owner.id) {
                Some((_, slots)) => slots.push(slot as u32),
                None => by_holder.push((owner.id, vec![slot as u32])),
            }
        }
        by_holder.sort_by_key(|(id, _)| *id);

        let mut moved = HashMap::new();
        for (_, slots) in &by_holder {
            for slot in slots.iter().take(per_holder) {
                if moved.len() >= quota {
                    break;
                }
                let old = inner.slot_to_header[*slot as usize].clone();
                inner.slot_to_header[*slot as usize] = new_node.clone();
                moved.insert(*slot, old);
            }
        }
        inner.previous_holders.insert(new_node.id, moved);
    }

    /// Pre-change holders of the slots that moved to `new_node`.
    pub fn previous_node_map(&self, new_node: &Node) -> Option<HashMap<u32, Node>> {
        self.inner.read().previous_holders.get(&new_node.id).cloned()
    }
}
