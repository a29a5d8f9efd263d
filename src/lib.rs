//! Line-oriented TCP chat relay
//!
//! A chat relay server speaking a newline-delimited text protocol:
//! clients pick nicknames, join named rooms, and exchange global chat,
//! room-scoped join/leave notifications, and private messages.
//!
//! # Protocol
//! - `/nick <name>` - set or replace the nickname (unique, case-sensitive)
//! - `/join <room>` - join a room, leaving any current one
//! - `/leave` - leave the current room
//! - `/bye` - disconnect (`BYE` is the last line sent)
//! - `/priv <nick> <text>` - private message
//! - `//...` - escape: say a line starting with `/`
//! - anything else - chat, relayed to every connected client
//!
//! Replies: `OK`, `ERROR`, `MESSAGE <nick> <text>`, `NEWNICK <old> <new>`,
//! `JOINED <nick>`, `LEFT <nick>`, `PRIVATE <nick> <text>`, `BYE`.
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the session registry
//! - Each connection has a handler task framing the stream into lines
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use relay_chat::{ChatServer, handle_connection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx));
//!     }
//! }
//! ```

pub mod client;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::Client;
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{ClientMessage, ServerMessage};
pub use registry::Registry;
pub use room::Room;
pub use server::{ChatServer, ServerCommand};
pub use types::ClientId;
