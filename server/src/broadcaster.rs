//! Broadcast fan-out driven by buffer readiness.

use log::{debug, warn};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;

use crate::buffer_pool::PoolReader;
use crate::registry::ClientRegistry;

/// Broadcast cycles between statistics lines.
const STATS_INTERVAL: u64 = 500;

/// Sends each ready snapshot buffer to every registered client, then
/// returns the buffer to the empty pool.
///
/// The loop is paced entirely by buffer readiness; wall-clock timing never
/// enters into it. Registry reads are point-in-time snapshots taken under
/// a read lock that is dropped before the first send, so registrations are
/// never blocked by an in-flight broadcast.
pub struct Broadcaster {
    socket: Arc<UdpSocket>,
    registry: Arc<RwLock<ClientRegistry>>,
    cycles: u64,
}

impl Broadcaster {
    pub fn new(socket: Arc<UdpSocket>, registry: Arc<RwLock<ClientRegistry>>) -> Self {
        Self {
            socket,
            registry,
            cycles: 0,
        }
    }

    /// Runs until the ready queue closes. A failed send to one client is
    /// logged and never aborts the rest of the fan-out.
    pub async fn run(mut self, mut pool: PoolReader) {
        while let Some(buffer) = pool.acquire_ready().await {
            let addrs = {
                let registry = self.registry.read().await;
                registry.addresses()
            };

            for addr in addrs.iter().copied() {
                if let Err(e) = self.socket.send_to(buffer.filled(), addr).await {
                    warn!("Failed to send snapshot to {}: {}", addr, e);
                }
                // Let other tasks run between per-client sends.
                tokio::task::yield_now().await;
            }

            let bytes = buffer.len();
            pool.release_empty(buffer).await;

            self.cycles += 1;
            if self.cycles % STATS_INTERVAL == 0 {
                debug!(
                    "Broadcast cycle {}: {} bytes to {} clients",
                    self.cycles,
                    bytes,
                    addrs.len()
                );
            }
        }

        debug!("Broadcaster stopped");
    }
}
