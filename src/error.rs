//! Error types for the relay server
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and protocol
/// errors (answered with the `ERROR` line, connection stays open).
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal for the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Nickname already held by another client
    #[error("Nickname '{0}' is already in use")]
    NicknameTaken(String),

    /// Command requires a non-empty argument
    #[error("Empty argument")]
    EmptyArgument,

    /// Private message recipient is not registered
    #[error("No client named '{0}'")]
    RecipientNotFound(String),

    /// Chat or private message attempted before /nick
    #[error("Nickname required")]
    NicknameRequired,

    /// Slash command not in the protocol
    #[error("Unknown command")]
    UnknownCommand,
}

/// Message send errors
///
/// Occurs when attempting to deliver to a client whose outbound
/// channel is closed or full.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The outbound queue is full (slow or stalled peer)
    #[error("Outbound queue full")]
    QueueFull,
}
