//! Connection tracking for the coordination server
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Mapping of network addresses to authenticated slots
//! - Death link subscriptions
//! - Capacity management
//!
//! A slot may be played from more than one address at a time; every
//! connection of a slot receives that slot's items.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Clients silent for longer than this are dropped.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// An authenticated connection
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Slot this connection authenticated as
    pub slot: String,
    /// Whether the client wants death link traffic
    pub death_link: bool,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, slot: String, death_link: bool) -> Self {
        Self {
            id,
            addr,
            slot,
            death_link,
            last_seen: Instant::now(),
        }
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if no packets have been received from this client
    /// within the specified timeout duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all authenticated connections
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to register a new connection for `slot`
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, slot: &str, death_link: bool) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {} as {}", client_id, addr, slot);
        self.clients
            .insert(client_id, Client::new(client_id, addr, slot.to_string(), death_link));

        Some(client_id)
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if they were already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} ({}) disconnected", client.id, client.slot);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Client ID and slot name of the connection at `addr`
    pub fn lookup(&self, addr: SocketAddr) -> Option<(u32, String)> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| (client.id, client.slot.clone()))
    }

    /// Records activity from `addr`. Returns false for unknown addresses.
    pub fn touch(&mut self, addr: SocketAddr) -> bool {
        match self.clients.values_mut().find(|client| client.addr == addr) {
            Some(client) => {
                client.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed clients so their slots can be told about it.
    pub fn check_timeouts(&mut self) -> Vec<Client> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .iter()
            .filter_map(|id| self.clients.remove(id))
            .inspect(|client| info!("Client {} ({}) timed out", client.id, client.slot))
            .collect()
    }

    /// Gets all client IDs and their network addresses
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Addresses of every connection authenticated as `slot`
    pub fn slot_addrs(&self, slot: &str) -> Vec<SocketAddr> {
        self.clients
            .values()
            .filter(|client| client.slot == slot)
            .map(|client| client.addr)
            .collect()
    }

    /// Addresses of death link subscribers, except `exclude`
    pub fn death_link_addrs(&self, exclude: Option<u32>) -> Vec<SocketAddr> {
        self.clients
            .values()
            .filter(|client| client.death_link && Some(client.id) != exclude)
            .map(|client| client.addr)
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr, "Player".into(), true);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert_eq!(client.slot, "Player");
        assert!(client.death_link);
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr(), "Player".into(), false);

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);

        let client_id1 = manager.add_client(test_addr(), "A", false).unwrap();
        let client_id2 = manager.add_client(test_addr2(), "B", false).unwrap();

        assert_eq!(client_id1, 1);
        assert_eq!(client_id2, 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert!(manager.add_client(test_addr(), "A", false).is_some());
        assert!(manager.add_client(test_addr2(), "B", false).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr(), "A", false).unwrap();

        assert!(manager.remove_client(&client_id));
        assert!(!manager.remove_client(&client_id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_lookup_and_find() {
        let mut manager = ClientManager::new(2);
        let client_id1 = manager.add_client(test_addr(), "A", false).unwrap();
        manager.add_client(test_addr2(), "B", false).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));
        assert_eq!(manager.lookup(test_addr2()).map(|(_, slot)| slot), Some("B".to_string()));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
        assert!(!manager.touch(unknown_addr));
        assert!(manager.touch(test_addr()));
    }

    #[test]
    fn test_slot_and_death_link_addrs() {
        let mut manager = ClientManager::new(4);
        let a = manager.add_client(test_addr(), "A", true).unwrap();
        manager.add_client(test_addr2(), "B", true).unwrap();
        let third: SocketAddr = "127.0.0.1:8082".parse().unwrap();
        manager.add_client(third, "A", false).unwrap();

        let mut slot_a = manager.slot_addrs("A");
        slot_a.sort();
        assert_eq!(slot_a, vec![test_addr(), third]);

        assert_eq!(manager.death_link_addrs(Some(a)), vec![test_addr2()]);
        assert_eq!(manager.death_link_addrs(None).len(), 2);
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr(), "A", false).unwrap();
        manager.add_client(test_addr2(), "B", false).unwrap();

        manager.clients.get_mut(&id).unwrap().last_seen =
            Instant::now() - CLIENT_TIMEOUT - Duration::from_secs(1);

        let removed = manager.check_timeouts();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].slot, "A");
        assert_eq!(manager.len(), 1);
    }
}
