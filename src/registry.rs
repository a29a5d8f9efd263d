//! Session registry
//!
//! The single source of truth for routing: connection → client state,
//! room → member set, and the reverse client → room mapping. Owned by
//! the `ChatServer` actor, so every mutation happens on one task and
//! each command's effects are atomic without locks.
//!
//! Invariants:
//! - nicknames are unique among registered clients (case-sensitive);
//! - a client is in at most one room;
//! - a room entry is removed the moment its member set empties, and a
//!   lookup on an absent room yields the empty set;
//! - an unregistered client appears in no room set.

use std::collections::HashMap;

use crate::client::Client;
use crate::error::AppError;
use crate::room::Room;
use crate::types::ClientId;

/// In-memory session registry
#[derive(Debug, Default)]
pub struct Registry {
    /// All connected clients: ClientId -> Client
    clients: HashMap<ClientId, Client>,
    /// All non-empty rooms: name -> Room
    rooms: HashMap<String, Room>,
    /// Client to room mapping for fast lookup: ClientId -> room name
    client_rooms: HashMap<ClientId, String>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a newly accepted connection
    pub fn register(&mut self, client: Client) {
        self.clients.insert(client.id, client);
    }

    /// Remove a connection from every structure.
    ///
    /// Returns the removed client and the room it occupied, if any, so
    /// the caller can notify the remaining members. After this returns
    /// the nickname is free for reuse and no room set references the id.
    pub fn unregister(&mut self, client_id: ClientId) -> Option<(Client, Option<String>)> {
        let client = self.clients.remove(&client_id)?;
        let room = self.remove_from_room(client_id);
        Some((client, room))
    }

    /// Set or replace a client's nickname.
    ///
    /// Fails with `NicknameTaken` if another client holds the exact name.
    /// Re-asserting one's own current nickname succeeds. Returns the
    /// previous nickname on success.
    pub fn set_nickname(
        &mut self,
        client_id: ClientId,
        name: &str,
    ) -> Result<Option<String>, AppError> {
        let taken = self
            .clients
            .values()
            .any(|c| c.id != client_id && c.nickname.as_deref() == Some(name));
        if taken {
            return Err(AppError::NicknameTaken(name.to_string()));
        }
        // Unknown ids are a no-op; commands cannot outlive the registry
        // entry because each connection's handler stops first
        Ok(self
            .clients
            .get_mut(&client_id)
            .and_then(|c| c.set_nickname(name.to_string())))
    }

    /// Move a client into a room, leaving any current one first.
    ///
    /// Returns the room that was left, if any (it may equal the target:
    /// rejoining the current room is leave-then-join, as in `/join`).
    pub fn join_room(&mut self, client_id: ClientId, room: &str) -> Option<String> {
        if !self.clients.contains_key(&client_id) {
            return None;
        }
        let previous = self.remove_from_room(client_id);
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(client_id);
        self.client_rooms.insert(client_id, room.to_string());
        previous
    }

    /// Remove a client from its current room, if any.
    ///
    /// Returns the room that was left. A no-op for roomless clients.
    pub fn leave_current_room(&mut self, client_id: ClientId) -> Option<String> {
        self.remove_from_room(client_id)
    }

    /// Find a registered client by exact nickname
    pub fn lookup_by_nickname(&self, name: &str) -> Option<ClientId> {
        self.clients
            .values()
            .find(|c| c.nickname.as_deref() == Some(name))
            .map(|c| c.id)
    }

    /// The room a client currently occupies
    pub fn current_room(&self, client_id: ClientId) -> Option<&str> {
        self.client_rooms.get(&client_id).map(String::as_str)
    }

    /// Members of a room; an absent room is the empty set
    pub fn room_members(&self, room: &str) -> impl Iterator<Item = ClientId> + '_ {
        self.rooms.get(room).into_iter().flat_map(Room::members)
    }

    /// Look up a client by id
    pub fn client(&self, client_id: ClientId) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// All registered clients (the active set, for global broadcast)
    pub fn clients(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Number of live (non-empty) rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Helper: drop a client from its room and reap the room if emptied
    fn remove_from_room(&mut self, client_id: ClientId) -> Option<String> {
        let room_name = self.client_rooms.remove(&client_id)?;
        if let Some(room) = self.rooms.get_mut(&room_name) {
            room.remove(client_id);
            if room.is_empty() {
                self.rooms.remove(&room_name);
            }
        }
        Some(room_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn add_client(registry: &mut Registry) -> ClientId {
        let (tx, _rx) = mpsc::channel(32);
        let id = ClientId::new();
        // Registry tests never deliver messages, so the receiver can drop
        registry.register(Client::new(id, tx));
        id
    }

    #[test]
    fn test_nickname_uniqueness() {
        let mut registry = Registry::new();
        let a = add_client(&mut registry);
        let b = add_client(&mut registry);

        assert!(registry.set_nickname(a, "alice").is_ok());
        assert!(matches!(
            registry.set_nickname(b, "alice"),
            Err(AppError::NicknameTaken(_))
        ));
        // The loser keeps its (absent) nickname
        assert!(registry.client(b).unwrap().nickname.is_none());

        assert!(registry.set_nickname(b, "bob").is_ok());
        assert_eq!(registry.lookup_by_nickname("bob"), Some(b));
    }

    #[test]
    fn test_nickname_case_sensitive() {
        let mut registry = Registry::new();
        let a = add_client(&mut registry);
        let b = add_client(&mut registry);

        registry.set_nickname(a, "Alice").unwrap();
        assert!(registry.set_nickname(b, "alice").is_ok());
    }

    #[test]
    fn test_reassert_own_nickname() {
        let mut registry = Registry::new();
        let a = add_client(&mut registry);

        registry.set_nickname(a, "alice").unwrap();
        let old = registry.set_nickname(a, "alice").unwrap();
        assert_eq!(old.as_deref(), Some("alice"));
    }

    #[test]
    fn test_room_exclusivity() {
        let mut registry = Registry::new();
        let a = add_client(&mut registry);

        assert_eq!(registry.join_room(a, "red"), None);
        let previous = registry.join_room(a, "blue");
        assert_eq!(previous.as_deref(), Some("red"));

        assert_eq!(registry.current_room(a), Some("blue"));
        assert_eq!(registry.room_members("red").count(), 0);
        assert_eq!(registry.room_members("blue").count(), 1);
    }

    #[test]
    fn test_empty_room_is_reaped() {
        let mut registry = Registry::new();
        let a = add_client(&mut registry);

        registry.join_room(a, "lobby");
        assert_eq!(registry.room_count(), 1);

        assert_eq!(registry.leave_current_room(a).as_deref(), Some("lobby"));
        assert_eq!(registry.room_count(), 0);
        // Absent room reads as the empty set, not an error
        assert_eq!(registry.room_members("lobby").count(), 0);
    }

    #[test]
    fn test_leave_without_room_is_noop() {
        let mut registry = Registry::new();
        let a = add_client(&mut registry);
        assert_eq!(registry.leave_current_room(a), None);
    }

    #[test]
    fn test_unregister_cleans_everything() {
        let mut registry = Registry::new();
        let a = add_client(&mut registry);
        let b = add_client(&mut registry);

        registry.set_nickname(a, "alice").unwrap();
        registry.join_room(a, "lobby");
        registry.join_room(b, "lobby");

        let (client, room) = registry.unregister(a).unwrap();
        assert_eq!(client.nickname.as_deref(), Some("alice"));
        assert_eq!(room.as_deref(), Some("lobby"));

        assert!(registry.client(a).is_none());
        assert!(registry.room_members("lobby").all(|id| id != a));
        assert_eq!(registry.lookup_by_nickname("alice"), None);

        // The nickname is immediately reusable
        assert!(registry.set_nickname(b, "alice").is_ok());
    }

    #[test]
    fn test_unregister_unknown_is_none() {
        let mut registry = Registry::new();
        assert!(registry.unregister(ClientId::new()).is_none());
    }
}
