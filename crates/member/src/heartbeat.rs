//! Data heartbeat loop
//!
//! One fixed-interval loop per member: a leader broadcasts heartbeats
//! carrying its commit index; a follower or elector whose heartbeat has
//! gone stale past a jittered election timeout starts an election.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::member::{DataGroupMember, Role};

pub(crate) async fn run(member: Arc<DataGroupMember>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(member.config().heartbeat.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut election_timeout = member.election_timeout();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        match member.role() {
            Role::Leader => member.broadcast_heartbeat().await,
            Role::Follower | Role::Elector => {
                if member.heartbeat_elapsed() >= election_timeout {
                    member.start_election().await;
                    election_timeout = member.election_timeout();
                }
            }
        }
    }
    debug!("{}: heartbeat loop exited", member.name());
}
