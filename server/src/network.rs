//! Server wiring: socket ownership, inbound dispatch, and task spawning.

use log::{error, info, warn};
use shared::protocol::{self, Op};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::aggregator::Aggregator;
use crate::broadcaster::Broadcaster;
use crate::buffer_pool::BufferPool;
use crate::registry::ClientRegistry;

/// Tunables supplied by the binary's argument parsing.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Broadcast-host override for single-gateway environments.
    pub gateway: Option<IpAddr>,
    /// Number of reusable broadcast buffers.
    pub pool_size: usize,
    /// Capacity of each broadcast buffer in bytes.
    pub buffer_capacity: usize,
    /// Accumulated snapshot size that triggers an immediate flush.
    pub watermark: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            gateway: None,
            pool_size: 4,
            buffer_capacity: 8192,
            watermark: 4096,
        }
    }
}

/// The relay server: receives client datagrams, aggregates state updates,
/// and rebroadcasts merged snapshots to every registered client.
pub struct Server {
    socket: Arc<UdpSocket>,
    registry: Arc<RwLock<ClientRegistry>>,
    config: ServerConfig,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);
        if let Some(gateway) = config.gateway {
            info!("Broadcast gateway override: {}", gateway);
        }

        let registry = Arc::new(RwLock::new(ClientRegistry::new(config.gateway)));

        Ok(Server {
            socket,
            registry,
            config,
        })
    }

    /// Bound address, for callers that asked for an ephemeral port.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns the task that receives datagrams and dispatches on the op
    /// byte: registrations go to the registry, state updates to the
    /// aggregator, everything else is logged and dropped.
    fn spawn_receiver(&self, updates: mpsc::UnboundedSender<Vec<u8>>) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            // Large enough for any UDP datagram.
            let mut buffer = [0u8; 65536];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let datagram = &buffer[..len];
                        match datagram.first().copied().map(Op::from_byte) {
                            Some(Ok(Op::Register)) => {
                                match protocol::decode_register(datagram) {
                                    Ok(registration) => {
                                        let mut registry = registry.write().await;
                                        registry.register(
                                            registration.client_id,
                                            addr,
                                            registration.listen_port,
                                        );
                                    }
                                    Err(e) => warn!("Bad register message from {}: {}", addr, e),
                                }
                            }
                            Some(Ok(Op::StateUpdate)) => {
                                if updates.send(datagram.to_vec()).is_err() {
                                    error!("Aggregator channel closed, stopping receiver");
                                    break;
                                }
                            }
                            Some(Err(e)) => warn!("Dropping datagram from {}: {}", addr, e),
                            None => warn!("Dropping empty datagram from {}", addr),
                        }
                    }
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Spawns the receive/aggregate/broadcast pipeline and runs until a
    /// task exits or the process is interrupted.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let (pool_writer, pool_reader) =
            BufferPool::new(self.config.pool_size, self.config.buffer_capacity);
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let receiver = self.spawn_receiver(update_tx);
        let aggregator =
            tokio::spawn(Aggregator::new(self.config.watermark).run(update_rx, pool_writer));
        let broadcaster = tokio::spawn(
            Broadcaster::new(Arc::clone(&self.socket), Arc::clone(&self.registry))
                .run(pool_reader),
        );

        info!("Server started successfully");

        tokio::select! {
            _ = receiver => warn!("Receiver task exited"),
            _ = aggregator => warn!("Aggregator task exited"),
            _ = broadcaster => warn!("Broadcaster task exited"),
            _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
        }

        Ok(())
    }
}
