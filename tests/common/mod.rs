//! Common test utilities: an in-memory transport and a session harness.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use calpal::config::LiveConfig;
use calpal::live::{
    Base64ImageEncoder, CapturedImage, CompressionQuality, EncodeError, ImageEncoder, ImageFormat,
    LiveClient, LiveEvents, LiveTransport, SessionState, TransportError, TransportEvent,
};

/// Transport that records outbound frames and reports a peer close when the
/// client initiates shutdown.
pub struct MockTransport {
    sent_tx: mpsc::UnboundedSender<String>,
    event_tx: mpsc::Sender<TransportEvent>,
}

#[async_trait]
impl LiveTransport for MockTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.sent_tx
            .send(frame)
            .map_err(|_| TransportError::Send("mock receiver dropped".to_string()))
    }

    async fn close(&mut self) {
        let _ = self
            .event_tx
            .send(TransportEvent::Closed {
                reason: "closed by client".to_string(),
            })
            .await;
    }
}

/// Encoder that always fails, for testing the failure path of image turns.
pub struct FailingEncoder;

#[async_trait]
impl ImageEncoder for FailingEncoder {
    async fn encode(
        &self,
        _image: &CapturedImage,
        _quality: CompressionQuality,
        _format: ImageFormat,
    ) -> Result<String, EncodeError> {
        Err(EncodeError("mock encoder failure".to_string()))
    }
}

/// A live session wired to in-memory channels instead of a socket.
pub struct Harness {
    pub client: LiveClient,
    pub events: LiveEvents,
    /// Frames the session wrote to the transport, in send order.
    pub sent: mpsc::UnboundedReceiver<String>,
    /// Injects server traffic and connection events.
    pub server: mpsc::Sender<TransportEvent>,
}

impl Harness {
    pub fn connect() -> Self {
        Self::connect_with(test_config(), Arc::new(Base64ImageEncoder))
    }

    pub fn connect_with(config: LiveConfig, encoder: Arc<dyn ImageEncoder>) -> Self {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(64);

        let transport = MockTransport {
            sent_tx,
            event_tx: event_tx.clone(),
        };
        let (client, events) = LiveClient::spawn_with_transport(config, transport, event_rx, encoder);

        Self {
            client,
            events,
            sent: sent_rx,
            server: event_tx,
        }
    }

    /// Next outbound frame, parsed as JSON.
    pub async fn next_sent(&mut self) -> Value {
        let frame = self.sent.recv().await.expect("transport dropped");
        serde_json::from_str(&frame).expect("outbound frame is not JSON")
    }

    /// Inject a raw server frame.
    pub async fn inject(&self, frame: Value) {
        self.server
            .send(TransportEvent::Frame(frame.to_string()))
            .await
            .expect("session actor gone");
    }

    /// Complete the setup handshake: consume the setup frame and acknowledge.
    pub async fn ack_setup(&mut self) -> Value {
        let setup = self.next_sent().await;
        self.inject(json!({"setupComplete": {}})).await;
        self.wait_for_state(SessionState::Ready).await;
        setup
    }

    /// Inject a model turn carrying one text fragment.
    pub async fn inject_text(&self, text: &str, turn_complete: bool) {
        self.inject(json!({
            "serverContent": {
                "modelTurn": {"parts": [{"text": text}]},
                "turnComplete": turn_complete,
            }
        }))
        .await;
    }

    /// Block until the session reaches the given state.
    pub async fn wait_for_state(&mut self, state: SessionState) {
        loop {
            if *self.events.state.borrow() == state {
                return;
            }
            self.events
                .state
                .changed()
                .await
                .expect("state channel closed");
        }
    }
}

pub fn test_config() -> LiveConfig {
    LiveConfig {
        max_queue_size: 5,
        ..LiveConfig::default()
    }
}

/// Let spawned tasks (client sends, the session actor) make progress on the
/// current-thread test runtime.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
