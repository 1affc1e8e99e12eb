//! Shared types for the live session actor and its handle.

use tokio::sync::oneshot;

use super::encode::{CapturedImage, CompressionQuality, EncodeError, ImageFormat};
use super::error::SendError;

/// Command channel capacity between the handle and the actor.
pub(crate) const CHANNEL_CAPACITY: usize = 32;
/// Buffer for tool-call notifications to the caller.
pub(crate) const TOOL_EVENT_CAPACITY: usize = 16;

/// Lifecycle of one live session connection.
///
/// `Ready` is the only state in which turns are sent. `Closed` and `Error`
/// are absorbing; a new session requires a new client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingSetupAck,
    Ready,
    Closing,
    Closed,
    Error,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Error)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingSetupAck => "awaiting_setup_ack",
            SessionState::Ready => "ready",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// A backend-initiated request for the caller to execute a named function.
#[derive(Debug, Clone)]
pub struct ToolCallEvent {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Completion handle for one queued request. Fires exactly once.
pub(crate) type ReplyTx = oneshot::Sender<Result<String, SendError>>;

/// Acknowledgment for fire-and-forget sends (realtime input, tool results).
pub(crate) type AckTx = oneshot::Sender<Result<(), SendError>>;

/// A request admitted to the queue but not yet dispatched.
pub(crate) struct QueuedRequest {
    pub payload: RequestPayload,
    pub reply: ReplyTx,
}

pub(crate) enum RequestPayload {
    Text(String),
    Image {
        image: CapturedImage,
        caption: Option<String>,
        quality: CompressionQuality,
        format: ImageFormat,
    },
}

/// Commands from the handle to the session actor.
pub(crate) enum Command {
    SendText {
        text: String,
        reply: ReplyTx,
    },
    SendImage {
        image: CapturedImage,
        caption: Option<String>,
        quality: CompressionQuality,
        format: ImageFormat,
        reply: ReplyTx,
    },
    RealtimeInput {
        data: String,
        mime_type: String,
        reply: AckTx,
    },
    FunctionResponse {
        name: String,
        response: serde_json::Value,
        reply: AckTx,
    },
    Close,
}

/// Result of a spawned image-encoding task, keyed back to its response id.
pub(crate) struct EncodeOutcome {
    pub response_id: u64,
    pub caption: Option<String>,
    pub format: ImageFormat,
    pub result: Result<String, EncodeError>,
}
