//! Client registration and broadcast address bookkeeping.

use log::{debug, info};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

/// Maps a client id to the address its broadcasts are sent to.
///
/// Registration is an idempotent upsert, so a client can re-register after
/// reconnecting or when NAT rewrites its source address; the newest
/// registration always wins. Registrations never expire: clients are
/// assumed to persist for the session.
///
/// When a gateway override is configured (every client reachable through a
/// single host, as in containerized development setups), the gateway ip
/// replaces the datagram's source ip while the client-declared port is
/// preserved.
pub struct ClientRegistry {
    clients: HashMap<u32, SocketAddr>,
    gateway: Option<IpAddr>,
}

impl ClientRegistry {
    pub fn new(gateway: Option<IpAddr>) -> Self {
        Self {
            clients: HashMap::new(),
            gateway,
        }
    }

    /// Registers (or re-registers) a client, returning the resolved
    /// broadcast address.
    pub fn register(&mut self, client_id: u32, source: SocketAddr, listen_port: u16) -> SocketAddr {
        let host = self.gateway.unwrap_or(source.ip());
        let addr = SocketAddr::new(host, listen_port);

        match self.clients.insert(client_id, addr) {
            None => info!("Registered client {} at {}", client_id, addr),
            Some(previous) if previous != addr => {
                info!("Client {} moved from {} to {}", client_id, previous, addr)
            }
            Some(_) => debug!("Client {} re-registered at {}", client_id, addr),
        }

        addr
    }

    /// Point-in-time list of broadcast addresses. Callers iterate the
    /// returned snapshot, never the live map, so registrations arriving
    /// mid-broadcast are neither observed nor blocked.
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.clients.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(ip: &str, port: u16) -> SocketAddr {
        format!("{}:{}", ip, port).parse().unwrap()
    }

    #[test]
    fn register_uses_source_ip_and_declared_port() {
        let mut registry = ClientRegistry::new(None);

        let addr = registry.register(1, source("10.0.0.5", 30000), 9001);
        assert_eq!(addr, source("10.0.0.5", 9001));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.addresses(), vec![source("10.0.0.5", 9001)]);
    }

    #[test]
    fn reregistration_overwrites_address() {
        let mut registry = ClientRegistry::new(None);

        registry.register(1, source("10.0.0.5", 30000), 9001);
        registry.register(1, source("10.0.0.9", 30500), 9002);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.addresses(), vec![source("10.0.0.9", 9002)]);
    }

    #[test]
    fn reregistration_is_idempotent() {
        let mut registry = ClientRegistry::new(None);

        let first = registry.register(7, source("10.0.0.5", 30000), 9001);
        let second = registry.register(7, source("10.0.0.5", 30000), 9001);

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn gateway_override_replaces_host_but_keeps_port() {
        let gateway: IpAddr = "192.168.65.2".parse().unwrap();
        let mut registry = ClientRegistry::new(Some(gateway));

        let addr = registry.register(1, source("10.0.0.5", 30000), 9001);
        assert_eq!(addr, source("192.168.65.2", 9001));
    }

    #[test]
    fn addresses_is_a_detached_snapshot() {
        let mut registry = ClientRegistry::new(None);
        registry.register(1, source("10.0.0.5", 30000), 9001);

        let snapshot = registry.addresses();
        registry.register(2, source("10.0.0.6", 30001), 9002);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }
}
