//! Room struct definition
//!
//! A set of member connections. Rooms exist implicitly: one is created
//! when the first client joins and reaped by the registry the moment its
//! member set empties. The name lives only as the registry's map key.

use std::collections::HashSet;

use crate::types::ClientId;

/// Chat room membership
///
/// Scopes only the JOINED/LEFT notifications; ordinary chat messages are
/// relayed globally regardless of membership.
#[derive(Debug, Default)]
pub struct Room {
    /// Current members
    members: HashSet<ClientId>,
}

impl Room {
    /// Create a new empty room
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. Returns false if already present.
    pub fn insert(&mut self, client_id: ClientId) -> bool {
        self.members.insert(client_id)
    }

    /// Remove a member. Returns true if they were present.
    pub fn remove(&mut self, client_id: ClientId) -> bool {
        self.members.remove(&client_id)
    }

    /// Check if a client is in this room
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.members.contains(&client_id)
    }

    /// Check if the room has no members (eligible for reaping)
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate over the members
    pub fn members(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.members.iter().copied()
    }

    /// Get the number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }
}
