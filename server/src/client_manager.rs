//! Connection table for the multiplayer server
//!
//! This module tracks which live connection belongs to which player and
//! owns the outbound half of every connection:
//! - Registration and removal of connections keyed by player id
//! - Per-connection generation ids so a stale connection can never tear
//!   down a newer session that reused its player id
//! - Fan-out of pre-serialized messages with per-recipient failure isolation
//!
//! Outbound queues are bounded channels drained by each connection's
//! writer task. Sending never waits: a frame for a full queue is dropped,
//! so a client that stops reading cannot grow server memory.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Frames a connection may have queued before new ones are dropped
pub const OUTBOUND_CAPACITY: usize = 1000;

/// Outbound queue of one connection. Each item is one JSON text frame.
pub type Outbound = mpsc::Sender<Arc<str>>;

/// Represents a connected client
#[derive(Debug)]
pub struct Client {
    /// Player this connection is bound to
    pub player_id: String,
    /// Unique per accepted connection, never reused
    pub connection_id: u64,
    /// Queue drained by the connection's writer task
    pub sender: Outbound,
}

impl Client {
    /// Queues a frame without waiting. Returns false if the connection has
    /// gone away or its queue is full, in which case the frame is dropped.
    pub fn send(&self, message: Arc<str>) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue of {} is full, dropping frame", self.player_id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Manages all live connections
///
/// Dropping a `Client` drops its sender, which ends the writer task and
/// closes the socket. Removing an entry is therefore enough to disconnect it.
#[derive(Debug)]
pub struct ClientManager {
    /// Connected clients indexed by player id
    clients: HashMap<String, Client>,
    /// Next connection generation to hand out
    next_connection_id: u64,
    /// Counter behind generated `player_N` ids
    next_player_number: u64,
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            next_connection_id: 1,
            next_player_number: 1,
        }
    }

    /// Allocates a new connection generation id
    pub fn allocate_connection_id(&mut self) -> u64 {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        id
    }

    /// Picks a placeholder number for a client that did not send an id or
    /// name. The resulting `player_N` id is guaranteed not to be in use.
    pub fn allocate_player_number(&mut self) -> u64 {
        loop {
            let number = self.next_player_number;
            self.next_player_number += 1;
            if !self.clients.contains_key(&format!("player_{}", number)) {
                return number;
            }
        }
    }

    /// Registers a connection for a player
    ///
    /// Returns the previous connection for the same player id, if any.
    pub fn add_client(&mut self, player_id: String, connection_id: u64, sender: Outbound) -> Option<Client> {
        info!("Connection {} bound to player {}", connection_id, player_id);
        let client = Client {
            player_id: player_id.clone(),
            connection_id,
            sender,
        };
        self.clients.insert(player_id, client)
    }

    /// Removes a player's connection regardless of generation
    pub fn remove_client(&mut self, player_id: &str) -> bool {
        if let Some(client) = self.clients.remove(player_id) {
            info!("Connection {} for player {} removed", client.connection_id, player_id);
            true
        } else {
            false
        }
    }

    /// Removes a player's connection only if it is still the given
    /// generation. Returns true if something was removed.
    pub fn remove_connection(&mut self, player_id: &str, connection_id: u64) -> bool {
        if self.is_current(player_id, connection_id) {
            self.remove_client(player_id)
        } else {
            false
        }
    }

    /// True if `connection_id` is the live connection for `player_id`
    pub fn is_current(&self, player_id: &str, connection_id: u64) -> bool {
        self.clients
            .get(player_id)
            .map_or(false, |client| client.connection_id == connection_id)
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.clients.contains_key(player_id)
    }

    /// Queues a frame for one player. Returns false if it could not be queued.
    pub fn send_to(&self, player_id: &str, message: Arc<str>) -> bool {
        match self.clients.get(player_id) {
            Some(client) => {
                let sent = client.send(message);
                if !sent {
                    debug!("Dropped message for {}", player_id);
                }
                sent
            }
            None => false,
        }
    }

    /// Queues a frame for every connection except `exclude`
    ///
    /// A closed or backed-up recipient is skipped and does not affect the
    /// others. Its entry stays until its reader loop or the liveness check
    /// removes it.
    /// Returns how many recipients accepted the frame.
    pub fn broadcast(&self, message: &Arc<str>, exclude: Option<&str>) -> usize {
        let mut delivered = 0;
        for (player_id, client) in &self.clients {
            if Some(player_id.as_str()) == exclude {
                continue;
            }
            if client.send(Arc::clone(message)) {
                delivered += 1;
            } else {
                debug!("Broadcast to {} dropped", player_id);
            }
        }
        delivered
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

/// Test suite for the connection table
///
/// Covers registration, generation-checked removal and broadcast isolation.
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    fn channel() -> (Outbound, mpsc::Receiver<Arc<str>>) {
        mpsc::channel(OUTBOUND_CAPACITY)
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new();
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_connection_ids_unique() {
        let mut manager = ClientManager::new();
        let a = manager.allocate_connection_id();
        let b = manager.allocate_connection_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_add_and_remove_client() {
        let mut manager = ClientManager::new();
        let (tx, _rx) = channel();
        assert!(manager.add_client("p1".to_string(), 1, tx).is_none());
        assert!(manager.contains("p1"));
        assert_eq!(manager.len(), 1);

        assert!(manager.remove_client("p1"));
        assert!(!manager.remove_client("p1"));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_add_client_returns_replaced() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        manager.add_client("p1".to_string(), 1, tx1);
        let old = manager.add_client("p1".to_string(), 2, tx2).unwrap();
        assert_eq!(old.connection_id, 1);
        assert!(manager.is_current("p1", 2));
    }

    #[test]
    fn test_stale_connection_cannot_remove_newer() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        manager.add_client("p1".to_string(), 1, tx1);
        manager.add_client("p1".to_string(), 2, tx2);

        assert!(!manager.remove_connection("p1", 1));
        assert!(manager.contains("p1"));
        assert!(manager.remove_connection("p1", 2));
        assert!(!manager.contains("p1"));
    }

    #[test]
    fn test_removing_client_closes_its_queue() {
        let mut manager = ClientManager::new();
        let (tx, mut rx) = channel();
        manager.add_client("p1".to_string(), 1, tx);
        manager.remove_client("p1");
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn test_placeholder_numbers_skip_taken_ids() {
        let mut manager = ClientManager::new();
        let (tx, _rx) = channel();
        manager.add_client("player_1".to_string(), 1, tx);
        assert_eq!(manager.allocate_player_number(), 2);
        assert_eq!(manager.allocate_player_number(), 3);
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let mut manager = ClientManager::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        manager.add_client("a".to_string(), 1, tx1);
        manager.add_client("b".to_string(), 2, tx2);

        let message: Arc<str> = Arc::from("hello");
        assert_eq!(manager.broadcast(&message, Some("a")), 1);
        assert!(rx1.try_recv().is_err());
        assert_eq!(&*rx2.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_broadcast_survives_closed_recipient() {
        let mut manager = ClientManager::new();
        let (tx1, rx1) = channel();
        let (tx2, mut rx2) = channel();
        let (tx3, mut rx3) = channel();
        manager.add_client("dead".to_string(), 1, tx1);
        manager.add_client("b".to_string(), 2, tx2);
        manager.add_client("c".to_string(), 3, tx3);
        drop(rx1);

        let message: Arc<str> = Arc::from("x");
        assert_eq!(manager.broadcast(&message, None), 2);
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
        assert!(!manager.send_to("dead", Arc::from("y")));
    }

    #[test]
    fn test_send_to_unknown_player() {
        let manager = ClientManager::new();
        assert!(!manager.send_to("nobody", Arc::from("x")));
    }

    #[test]
    fn test_stalled_recipient_is_capped() {
        let mut manager = ClientManager::new();
        let (stalled_tx, mut stalled_rx) = mpsc::channel(2);
        let (tx, mut rx) = channel();
        manager.add_client("stalled".to_string(), 1, stalled_tx);
        manager.add_client("b".to_string(), 2, tx);

        for i in 0..10 {
            let message: Arc<str> = Arc::from(format!("m{}", i));
            let delivered = manager.broadcast(&message, None);
            assert_eq!(delivered, if i < 2 { 2 } else { 1 });
        }
        assert!(!manager.send_to("stalled", Arc::from("late")));

        let mut backlog = Vec::new();
        while let Ok(frame) = stalled_rx.try_recv() {
            backlog.push(frame.to_string());
        }
        assert_eq!(backlog, vec!["m0", "m1"]);

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 10);

        // Draining frees room again
        assert!(manager.send_to("stalled", Arc::from("again")));
    }
}
