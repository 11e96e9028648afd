//! Client network layer: registration, the update send loop, and the
//! broadcast receive counter.

use log::{debug, info, warn};
use rand::Rng;
use shared::protocol::{self, SnapshotMap};
use shared::resource::{Player, Resource, PLAYER_LEN};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Updates between progress log lines in the send loop.
const REPORT_INTERVAL: u64 = 100;

pub struct Client {
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    client_id: u32,
    received: Arc<AtomicU64>,
}

impl Client {
    /// Binds the receive socket on `listen_port` (0 picks an ephemeral
    /// port) and resolves the relay address.
    pub async fn new(
        server_addr: &str,
        client_id: u32,
        listen_port: u16,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(("0.0.0.0", listen_port)).await?);
        let server_addr = server_addr.parse()?;
        info!(
            "Client {} listening on {}",
            client_id,
            socket.local_addr()?
        );

        Ok(Client {
            socket,
            server_addr,
            client_id,
            received: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Announces this client's id and listen port to the relay. Sent
    /// twice: registration is idempotent and the transport is lossy.
    pub async fn register(&self) -> Result<(), Box<dyn std::error::Error>> {
        let mut packet = [0u8; protocol::REGISTER_LEN];
        let port = self.socket.local_addr()?.port();
        protocol::encode_register(&mut packet, self.client_id, port)?;

        self.socket.send_to(&packet, self.server_addr).await?;
        self.socket.send_to(&packet, self.server_addr).await?;
        info!(
            "Client {} registered port {} with {}",
            self.client_id, port, self.server_addr
        );

        Ok(())
    }

    /// Spawns the task that decodes and counts incoming broadcasts.
    pub fn spawn_receiver(&self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let received = Arc::clone(&self.received);
        let client_id = self.client_id;

        tokio::spawn(async move {
            let mut buffer = [0u8; 65536];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, _)) => {
                        let mut snapshot = SnapshotMap::new();
                        match protocol::decode_update(&buffer[..len], &mut snapshot) {
                            Ok(_) => {
                                received.fetch_add(1, Ordering::Relaxed);
                                debug!(
                                    "Client {} got snapshot of {} resources",
                                    client_id,
                                    snapshot.len()
                                );
                            }
                            Err(e) => {
                                warn!("Client {} got malformed broadcast: {}", client_id, e)
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Client {} receive error: {}", client_id, e);
                        break;
                    }
                }
            }
        })
    }

    /// Sends `count` player updates at `interval_ms` spacing, logging how
    /// many broadcasts came back at each report interval.
    pub async fn run_updates(
        &self,
        count: u64,
        interval_ms: u64,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut tick = interval(Duration::from_millis(interval_ms.max(1)));
        let mut packet = [0u8; protocol::HEADER_LEN + PLAYER_LEN];

        for i in 0..count {
            tick.tick().await;

            let player = self.sample_player();
            let len =
                protocol::encode_update(&mut packet, self.client_id, &[Resource::Player(player)])?;
            self.socket.send_to(&packet[..len], self.server_addr).await?;

            if (i + 1) % REPORT_INTERVAL == 0 {
                info!(
                    "Client {}: {} updates sent, {} broadcasts received",
                    self.client_id,
                    i + 1,
                    self.pop_stats()
                );
            }
        }

        Ok(())
    }

    /// A plausible-looking player state for this client id.
    fn sample_player(&self) -> Player {
        let mut rng = rand::thread_rng();
        Player {
            id: self.client_id,
            health: rng.gen_range(1..=100),
            x: rng.gen_range(-100.0..100.0),
            y: rng.gen_range(-100.0..100.0),
            z: rng.gen_range(-100.0..100.0),
        }
    }

    /// Returns and resets the broadcast delivery counter.
    pub fn pop_stats(&self) -> u64 {
        self.received.swap(0, Ordering::Relaxed)
    }
}
