//! Error types for the live session client.

use thiserror::Error;

use super::types::SessionState;

/// Errors surfaced to callers of the public send operations.
///
/// Admission (`QueueFull`) and encode failures are local to one request;
/// `Connection`/`Closed` are fatal for the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("live session not initialized")]
    SessionNotInitialized,

    #[error("request queue is full (max: {max})")]
    QueueFull { max: usize },

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("session not ready (state: {0})")]
    NotReady(SessionState),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("connection closed: {0}")]
    Closed(String),
}

/// Errors from the underlying streaming transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket send failed: {0}")]
    Send(String),
}

/// Errors establishing a new live session.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),
}
