//! Client struct definition
//!
//! Represents a connected client with their state and communication channel.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::ClientId;

/// Connected client information
///
/// Holds all state related to a connected client: their unique ID,
/// nickname (unset until a successful `/nick`), and the outbound
/// message channel drained by the connection's write task.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this client
    pub id: ClientId,
    /// Nickname (None while unregistered)
    pub nickname: Option<String>,
    /// Server → Client message channel
    pub sender: mpsc::Sender<ServerMessage>,
}

impl Client {
    /// Create a new client with the given ID and sender channel
    pub fn new(id: ClientId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            nickname: None,
            sender,
        }
    }

    /// Queue a message for this client without waiting.
    ///
    /// Delivery is best-effort: a closed channel means the client is
    /// already disconnecting, a full queue means the peer has stalled
    /// past its backpressure allowance.
    pub fn try_send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Closed(_) => SendError::ChannelClosed,
            TrySendError::Full(_) => SendError::QueueFull,
        })
    }

    /// Get the display name for this client
    ///
    /// Returns the nickname if set. `/join` does not require one, so room
    /// notifications about an unnamed member fall back to "anonymous".
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or("anonymous")
    }

    /// Check if this client has set their nickname
    pub fn has_nickname(&self) -> bool {
        self.nickname.is_some()
    }

    /// Set the client's nickname, returning the previous one
    pub fn set_nickname(&mut self, nickname: String) -> Option<String> {
        self.nickname.replace(nickname)
    }
}
