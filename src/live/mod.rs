//! Streaming session client for the Gemini Live API.
//!
//! A [`LiveClient`] opens one WebSocket session, performs the setup
//! handshake, and then accepts conversation turns. Turns are admitted into a
//! bounded queue and dispatched strictly one at a time; each send operation
//! resolves with the full accumulated model response for that turn.
//!
//! All session state lives in a spawned actor task. The client handle is
//! cheap to clone and communicates with the actor over channels only.

mod actor;
mod correlator;
mod encode;
mod error;
mod queue;
mod transport;
mod types;
mod wire;

pub use encode::{
    Base64ImageEncoder, CapturedImage, CompressionQuality, EncodeError, ImageEncoder, ImageFormat,
};
pub use error::{ConnectError, SendError, TransportError};
pub use transport::{LiveTransport, TransportEvent};
pub use types::{SessionState, ToolCallEvent};

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

use crate::config::LiveConfig;

use actor::SessionActor;
use types::Command;

/// Caller-facing event streams for one live session.
pub struct LiveEvents {
    /// Backend-initiated tool calls to execute.
    pub tool_calls: mpsc::Receiver<ToolCallEvent>,
    /// Session lifecycle transitions.
    pub state: watch::Receiver<SessionState>,
}

/// Handle to a live session actor.
#[derive(Clone)]
pub struct LiveClient {
    command_tx: mpsc::Sender<Command>,
}

impl LiveClient {
    /// Connect to the configured live endpoint and run the setup handshake
    /// in the background.
    ///
    /// Returns as soon as the WebSocket is established; the session becomes
    /// `Ready` once the backend acknowledges setup. Turns sent before then
    /// are queued and dispatched on acknowledgment.
    pub async fn connect(config: LiveConfig) -> Result<(Self, LiveEvents), ConnectError> {
        let url = config.endpoint_url();
        let (transport, transport_rx) = transport::connect_ws(&url).await?;
        info!(model = %config.model, "Live session connected");
        Ok(Self::spawn_with_transport(
            config,
            transport,
            transport_rx,
            Arc::new(Base64ImageEncoder),
        ))
    }

    /// Run a session over an already-open transport. This is the seam used
    /// by integration tests; production goes through [`LiveClient::connect`].
    pub fn spawn_with_transport<T: LiveTransport>(
        config: LiveConfig,
        transport: T,
        transport_rx: mpsc::Receiver<TransportEvent>,
        encoder: Arc<dyn ImageEncoder>,
    ) -> (Self, LiveEvents) {
        let (command_tx, state, tool_calls) =
            SessionActor::spawn(config, transport, transport_rx, encoder);
        (Self { command_tx }, LiveEvents { tool_calls, state })
    }

    /// Send a text turn and await the full model response.
    ///
    /// Fails fast with [`SendError::QueueFull`] when the admission bound is
    /// reached, and with the session's terminal reason after it has failed
    /// or closed.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<String, SendError> {
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::SendText {
            text: text.into(),
            reply,
        })
        .await?;
        Self::await_reply(rx).await
    }

    /// Send an image turn with an optional caption and await the full model
    /// response. Encoding runs on a worker task after the turn reaches the
    /// head of the queue; an encoding failure rejects only this turn.
    pub async fn send_image(
        &self,
        image: CapturedImage,
        caption: Option<String>,
        quality: CompressionQuality,
        format: ImageFormat,
    ) -> Result<String, SendError> {
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::SendImage {
            image,
            caption,
            quality,
            format,
            reply,
        })
        .await?;
        Self::await_reply(rx).await
    }

    /// Stream a raw media chunk outside the turn queue. Refused with
    /// [`SendError::NotReady`] unless the session is ready.
    pub async fn send_realtime_input(
        &self,
        data: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Result<(), SendError> {
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::RealtimeInput {
            data: data.into(),
            mime_type: mime_type.into(),
            reply,
        })
        .await?;
        Self::await_ack(rx).await
    }

    /// Reply to a backend tool call with the function's result.
    pub async fn send_function_response(
        &self,
        name: impl Into<String>,
        response: serde_json::Value,
    ) -> Result<(), SendError> {
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::FunctionResponse {
            name: name.into(),
            response,
            reply,
        })
        .await?;
        Self::await_ack(rx).await
    }

    /// Request an orderly shutdown. Outstanding turns are rejected once the
    /// peer confirms the close.
    pub async fn close(&self) -> Result<(), SendError> {
        self.send_command(Command::Close).await
    }

    async fn send_command(&self, command: Command) -> Result<(), SendError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SendError::SessionNotInitialized)
    }

    async fn await_reply(
        rx: oneshot::Receiver<Result<String, SendError>>,
    ) -> Result<String, SendError> {
        match rx.await {
            Ok(result) => result,
            // Actor dropped the reply without answering; session is gone.
            Err(_) => Err(SendError::SessionNotInitialized),
        }
    }

    async fn await_ack(rx: oneshot::Receiver<Result<(), SendError>>) -> Result<(), SendError> {
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(SendError::SessionNotInitialized),
        }
    }
}
