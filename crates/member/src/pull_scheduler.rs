//! Pull-snapshot scheduler
//!
//! Materialises pending remote snapshots on a worker pool bounded by the
//! hardware parallelism. One task serves all slots previously held by one
//! group: it issues a single batched pull, failing over across the group's
//! members, and resolves the placeholder cell registered under each slot.

use std::sync::Arc;

use chron_core::PartitionGroup;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::rpc::{ClientPool, PullSnapshotRequest};
use crate::snapshot::{Snapshot, SnapshotCell};

pub struct PullSnapshotScheduler {
    name: String,
    clients: Arc<dyn ClientPool>,
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
}

impl PullSnapshotScheduler {
    pub fn new(name: String, clients: Arc<dyn ClientPool>, workers: usize) -> Self {
        Self {
            name,
            clients,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Submit one batched pull for the slots previously held by `holders`.
    /// Each `(slot, cell)` pair is resolved when the pull completes.
    pub fn submit(&self, holders: PartitionGroup, cells: Vec<(u32, Arc<SnapshotCell>)>) {
        let name = self.name.clone();
        let clients = self.clients.clone();
        let permits = self.permits.clone();
        self.tasks.lock().spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            pull_from_group(&name, clients, holders, cells).await;
        });
    }

    /// Abort all in-flight pulls. Cells that have not been resolved remain
    /// unresolved; the next leadership cycle re-attempts them.
    pub fn stop(&self) {
        self.tasks.lock().abort_all();
    }
}

async fn pull_from_group(
    name: &str,
    clients: Arc<dyn ClientPool>,
    holders: PartitionGroup,
    cells: Vec<(u32, Arc<SnapshotCell>)>,
) {
    let slots: Vec<u32> = cells.iter().map(|(slot, _)| *slot).collect();
    info!(
        "{}: pulling {} slots from group {}",
        name,
        slots.len(),
        holders
    );
    for node in holders.nodes() {
        let Some(client) = clients.connect(node) else {
            continue;
        };
        let request = PullSnapshotRequest {
            required_slots: slots.clone(),
        };
        match client.pull_snapshot(request).await {
            Ok(response) => {
                for (slot, cell) in &cells {
                    match response.snapshots.get(slot) {
                        Some(bytes) => match Snapshot::from_bytes(bytes) {
                            Ok(snapshot) => cell.resolve(snapshot),
                            Err(e) => warn!(
                                "{}: cannot decode snapshot of slot {} from {}: {}",
                                name, slot, node, e
                            ),
                        },
                        None => debug!("{}: slot {} not served by {}", name, slot, node),
                    }
                }
                return;
            }
            Err(e) => warn!("{}: cannot pull snapshots from {}: {}", name, node, e),
        }
    }
    warn!(
        "{}: no member of {} could serve slots {:?}",
        name, holders, slots
    );
}
