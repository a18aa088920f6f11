//! Membership insertion keeps the group ring-sorted at fixed size and
//! forces a fresh election.

mod common;

use std::sync::Arc;

use chron_core::{Node, PartitionGroup, SlotPartitionTable};
use chron_member::{DataGroupMember, Role};
use common::*;

fn member_with_group(ids: &[u64], local: u64) -> Arc<DataGroupMember> {
    let nodes: Vec<Node> = ids.iter().map(|id| node(*id)).collect();
    let table = Arc::new(SlotPartitionTable::new(nodes.clone(), nodes.len()));
    let fixture = Fixture::new(table);
    let group = PartitionGroup::new(nodes[0].clone(), nodes[1..].iter().cloned());
    fixture.create_member(group, node(local))
}

fn ids(member: &DataGroupMember) -> Vec<u64> {
    member.all_nodes().iter().map(|n| n.id).collect()
}

#[tokio::test]
async fn insertion_with_wrap_evicts_the_local_tail() {
    let member = member_with_group(&[10, 20, 30, 40], 40);
    let evicted = member.add_node(node(35));
    assert_eq!(ids(&member), vec![10, 20, 30, 35]);
    assert!(evicted, "the local node was dropped and must leave the group");
}

#[tokio::test]
async fn insertion_preserves_length_and_order() {
    let member = member_with_group(&[10, 20, 30, 40], 10);
    let evicted = member.add_node(node(25));
    assert_eq!(ids(&member), vec![10, 20, 25, 30]);
    assert!(!evicted);

    let mut sorted = ids(&member);
    sorted.sort_unstable();
    assert_eq!(sorted, ids(&member));
    assert_eq!(member.all_nodes().len(), 4);
}

#[tokio::test]
async fn add_node_bumps_term_and_clears_leadership() {
    let member = member_with_group(&[10], 10);
    member.start_election().await;
    assert_eq!(member.role(), Role::Leader);
    let term_before = member.term();

    // no insertion point in a single-member sequence, but the election
    // reset happens regardless
    let evicted = member.add_node(node(25));
    assert!(!evicted);
    assert_eq!(ids(&member), vec![10]);
    assert_eq!(member.term(), term_before + 1);
    assert_eq!(member.role(), Role::Elector);
    assert_eq!(member.leader(), None);
}

#[tokio::test]
async fn known_ids_are_not_reinserted() {
    let member = member_with_group(&[10, 20, 30, 40], 10);
    member.add_node(node(35));
    let after_first = ids(&member);
    let evicted = member.add_node(node(35));
    assert!(!evicted);
    assert_eq!(ids(&member), after_first);
}

#[tokio::test]
async fn wrap_below_the_seam_inserts_before_the_tail() {
    // ring rotation [30, 40, 20]: id 10 lands after the 40-20 seam via the
    // node < next < prev condition, and the local tail is evicted
    let member = member_with_group(&[30, 40, 20], 20);
    let evicted = member.add_node(node(10));
    assert_eq!(ids(&member), vec![30, 40, 10]);
    assert!(evicted);
}
