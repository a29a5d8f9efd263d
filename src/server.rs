//! ChatServer Actor implementation
//!
//! The central actor owning all mutable state through the session
//! registry. Commands arrive over an mpsc channel from the per-connection
//! handler tasks and are processed one at a time, so each command's
//! effects on the registry are atomic without locks.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::registry::Registry;
use crate::types::ClientId;

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New client connected
    Connect {
        client_id: ClientId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Client connection ended (EOF, transport error, or after /bye)
    Disconnect {
        client_id: ClientId,
    },
    /// `/nick <name>`
    Nick {
        client_id: ClientId,
        name: String,
    },
    /// `/join <room>`
    Join {
        client_id: ClientId,
        room: String,
    },
    /// `/leave`
    Leave {
        client_id: ClientId,
    },
    /// `/bye`
    Bye {
        client_id: ClientId,
    },
    /// `/priv <nick> <text>`
    Priv {
        client_id: ClientId,
        to: String,
        text: String,
    },
    /// Plain chat line
    Chat {
        client_id: ClientId,
        text: String,
    },
    /// Unknown command or malformed argument; answered with ERROR
    Invalid {
        client_id: ClientId,
    },
}

/// The main ChatServer actor
///
/// Drives the per-client protocol state machine (unregistered → named →
/// in-room) and the three delivery modes: global broadcast, room-scoped
/// notification, and single-recipient delivery.
pub struct ChatServer {
    registry: Registry,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            registry: Registry::new(),
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { client_id, sender } => {
                self.handle_connect(client_id, sender);
            }
            ServerCommand::Disconnect { client_id } => {
                self.handle_disconnect(client_id);
            }
            ServerCommand::Nick { client_id, name } => {
                self.handle_nick(client_id, name);
            }
            ServerCommand::Join { client_id, room } => {
                self.handle_join(client_id, room);
            }
            ServerCommand::Leave { client_id } => {
                self.handle_leave(client_id);
            }
            ServerCommand::Bye { client_id } => {
                self.handle_bye(client_id);
            }
            ServerCommand::Priv { client_id, to, text } => {
                self.handle_priv(client_id, to, text);
            }
            ServerCommand::Chat { client_id, text } => {
                self.handle_chat(client_id, text);
            }
            ServerCommand::Invalid { client_id } => {
                self.handle_invalid(client_id);
            }
        }
    }

    /// Handle new client connection
    fn handle_connect(&mut self, client_id: ClientId, sender: mpsc::Sender<ServerMessage>) {
        info!("Client {} connected", client_id);
        self.registry.register(Client::new(client_id, sender));
        debug!(
            "Total clients: {}, Total rooms: {}",
            self.registry.client_count(),
            self.registry.room_count()
        );
    }

    /// Handle client disconnection
    fn handle_disconnect(&mut self, client_id: ClientId) {
        self.teardown(client_id);
        debug!(
            "Total clients: {}, Total rooms: {}",
            self.registry.client_count(),
            self.registry.room_count()
        );
    }

    /// Handle `/nick`
    fn handle_nick(&mut self, client_id: ClientId, name: String) {
        if self.registry.client(client_id).is_none() {
            return;
        }

        let name = name.trim();
        if name.is_empty() {
            debug!("Client {} sent /nick without a name", client_id);
            self.send_to(client_id, AppError::EmptyArgument.into());
            return;
        }

        match self.registry.set_nickname(client_id, name) {
            Ok(old) => {
                info!("Client {} is now '{}'", client_id, name);
                self.send_to(client_id, ServerMessage::Ok);

                // Replacing an existing nickname is announced to everyone,
                // sender included. A first /nick or a no-op rename is not.
                if let Some(old) = old.filter(|old| old.as_str() != name) {
                    let stalled = self.broadcast_all(ServerMessage::NewNick {
                        old,
                        new: name.to_string(),
                    });
                    self.reap_stalled(stalled);
                }
            }
            Err(err) => {
                debug!("Client {} nick rejected: {}", client_id, err);
                self.send_to(client_id, err.into());
            }
        }
    }

    /// Handle `/join`
    ///
    /// A nickname is not required; room notifications fall back to the
    /// client's display name.
    fn handle_join(&mut self, client_id: ClientId, room: String) {
        let Some(client) = self.registry.client(client_id) else {
            return;
        };
        let nick = client.display_name().to_string();

        let room = room.trim().to_string();
        if room.is_empty() {
            debug!("Client {} sent /join without a room", client_id);
            self.send_to(client_id, AppError::EmptyArgument.into());
            return;
        }

        let previous = self.registry.join_room(client_id, &room);
        info!("Client {} joined room '{}'", client_id, room);
        self.send_to(client_id, ServerMessage::Ok);

        // Switching rooms notifies the old room's remaining members.
        if let Some(previous) = previous {
            let stalled = self.broadcast_room_except(
                &previous,
                client_id,
                ServerMessage::Left { nick: nick.clone() },
            );
            self.reap_stalled(stalled);
        }

        let stalled = self.broadcast_room_except(&room, client_id, ServerMessage::Joined { nick });
        self.reap_stalled(stalled);
    }

    /// Handle `/leave` (a no-op outside any room)
    fn handle_leave(&mut self, client_id: ClientId) {
        let Some(client) = self.registry.client(client_id) else {
            return;
        };
        let nick = client.display_name().to_string();

        let left = self.registry.leave_current_room(client_id);
        self.send_to(client_id, ServerMessage::Ok);

        if let Some(room) = left {
            info!("Client {} left room '{}'", client_id, room);
            let stalled =
                self.broadcast_room_except(&room, client_id, ServerMessage::Left { nick });
            self.reap_stalled(stalled);
        }
    }

    /// Handle `/bye`: reply BYE, then run the common teardown.
    ///
    /// Dropping the registry entry drops the client's sender; the write
    /// task drains the queue (BYE last) and closes the socket.
    fn handle_bye(&mut self, client_id: ClientId) {
        if self.registry.client(client_id).is_none() {
            return;
        }
        self.send_to(client_id, ServerMessage::Bye);
        self.teardown(client_id);
    }

    /// Handle `/priv`
    fn handle_priv(&mut self, client_id: ClientId, to: String, text: String) {
        let Some(sender) = self.registry.client(client_id) else {
            return;
        };
        let Some(from) = sender.nickname.clone() else {
            debug!("Client {} sent /priv before /nick", client_id);
            self.send_to(client_id, AppError::NicknameRequired.into());
            return;
        };

        match self.registry.lookup_by_nickname(&to) {
            Some(recipient) => {
                self.send_to(recipient, ServerMessage::Private { from, text });
                self.send_to(client_id, ServerMessage::Ok);
            }
            None => {
                debug!("Client {} sent /priv to unknown nick '{}'", client_id, to);
                self.send_to(client_id, AppError::RecipientNotFound(to).into());
            }
        }
    }

    /// Handle a plain chat line: global broadcast, sender included
    fn handle_chat(&mut self, client_id: ClientId, text: String) {
        let Some(client) = self.registry.client(client_id) else {
            return;
        };
        let Some(from) = client.nickname.clone() else {
            debug!("Client {} tried to chat before /nick", client_id);
            self.send_to(client_id, AppError::NicknameRequired.into());
            return;
        };

        let stalled = self.broadcast_all(ServerMessage::Message { from, text });
        self.reap_stalled(stalled);
    }

    /// Handle an unknown command or malformed argument
    fn handle_invalid(&mut self, client_id: ClientId) {
        debug!("Client {}: {}", client_id, AppError::UnknownCommand);
        self.send_to(client_id, ServerMessage::Error);
    }

    /// Common teardown: remove the client from every structure and tell
    /// its former room. Idempotent; later Disconnect commands for the
    /// same id find nothing.
    fn teardown(&mut self, client_id: ClientId) {
        let Some((client, room)) = self.registry.unregister(client_id) else {
            return;
        };
        info!("Client {} disconnected", client_id);

        if let Some(room) = room {
            let nick = client.display_name().to_string();
            // Best-effort; stalled members here are left to their next
            // broadcast rather than reaped recursively.
            for member_id in self.registry.room_members(&room) {
                if let Some(member) = self.registry.client(member_id) {
                    if let Err(err) = member.try_send(ServerMessage::Left { nick: nick.clone() }) {
                        debug!("Dropping LEFT to {}: {}", member_id, err);
                    }
                }
            }
        }
    }

    /// Deliver to one client, best-effort
    fn send_to(&self, client_id: ClientId, msg: ServerMessage) {
        if let Some(client) = self.registry.client(client_id) {
            if let Err(err) = client.try_send(msg) {
                debug!("Dropping delivery to {}: {}", client_id, err);
            }
        }
    }

    /// Deliver to every active client, sender included.
    ///
    /// Returns the clients whose outbound queue rejected the message so
    /// the caller can reap them after the pass, never mid-iteration.
    fn broadcast_all(&self, msg: ServerMessage) -> Vec<ClientId> {
        let mut stalled = Vec::new();
        for client in self.registry.clients() {
            if let Err(err) = client.try_send(msg.clone()) {
                debug!("Dropping broadcast to {}: {}", client.id, err);
                stalled.push(client.id);
            }
        }
        stalled
    }

    /// Deliver to a room's members, excluding one connection.
    ///
    /// An absent room is the empty set. Returns stalled recipients.
    fn broadcast_room_except(
        &self,
        room: &str,
        except: ClientId,
        msg: ServerMessage,
    ) -> Vec<ClientId> {
        let mut stalled = Vec::new();
        for member_id in self.registry.room_members(room) {
            if member_id == except {
                continue;
            }
            if let Some(member) = self.registry.client(member_id) {
                if let Err(err) = member.try_send(msg.clone()) {
                    debug!("Dropping notification to {}: {}", member_id, err);
                    stalled.push(member_id);
                }
            }
        }
        stalled
    }

    /// Disconnect clients whose queues overflowed during a dispatch pass
    fn reap_stalled(&mut self, stalled: Vec<ClientId>) {
        for client_id in stalled {
            warn!("Client {} stalled past its outbound queue, dropping", client_id);
            self.teardown(client_id);
        }
    }
}
