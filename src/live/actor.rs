//! Session actor: owns the connection state machine, the request queue, and
//! the pending-response table, and serializes every mutation through one
//! `tokio::select!` loop.
//!
//! The dispatch discipline is strictly serial: a queued request is sent only
//! after the previous one reached a terminal outcome (full response, encode
//! failure, or session failure). That single-turn-in-flight invariant is
//! what makes the correlator's broadcast semantics safe.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::config::LiveConfig;

use super::correlator::ResponseCorrelator;
use super::encode::ImageEncoder;
use super::error::SendError;
use super::queue::RequestQueue;
use super::transport::{LiveTransport, TransportEvent};
use super::types::{
    Command, EncodeOutcome, QueuedRequest, RequestPayload, SessionState, ToolCallEvent,
    CHANNEL_CAPACITY, TOOL_EVENT_CAPACITY,
};
use super::wire::{
    ClientContentMessage, GenerationConfig, Part, RealtimeInputMessage, ServerMessage,
    SetupMessage, ToolResponseMessage,
};

pub(crate) struct SessionActor<T: LiveTransport> {
    config: LiveConfig,
    transport: T,
    transport_rx: mpsc::Receiver<TransportEvent>,
    transport_done: bool,
    command_rx: mpsc::Receiver<Command>,
    encoder: Arc<dyn ImageEncoder>,
    encode_tx: mpsc::Sender<EncodeOutcome>,
    encode_rx: mpsc::Receiver<EncodeOutcome>,
    queue: RequestQueue,
    correlator: ResponseCorrelator,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    tool_tx: mpsc::Sender<ToolCallEvent>,
    /// True while a dispatched request has not reached a terminal outcome.
    in_flight: bool,
    /// Set once the session reaches a terminal state; every later send is
    /// rejected with this reason.
    terminal_reason: Option<SendError>,
}

impl<T: LiveTransport> SessionActor<T> {
    /// Spawn the actor over an open transport.
    ///
    /// Returns the command sender plus the caller-facing event channels
    /// (state transitions and tool-call notifications).
    pub fn spawn(
        config: LiveConfig,
        transport: T,
        transport_rx: mpsc::Receiver<TransportEvent>,
        encoder: Arc<dyn ImageEncoder>,
    ) -> (
        mpsc::Sender<Command>,
        watch::Receiver<SessionState>,
        mpsc::Receiver<ToolCallEvent>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let (tool_tx, tool_rx) = mpsc::channel(TOOL_EVENT_CAPACITY);
        let (encode_tx, encode_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let max_queue_size = config.max_queue_size;

        let actor = Self {
            config,
            transport,
            transport_rx,
            transport_done: false,
            command_rx,
            encoder,
            encode_tx,
            encode_rx,
            queue: RequestQueue::new(max_queue_size),
            correlator: ResponseCorrelator::new(),
            state: SessionState::Connecting,
            state_tx,
            tool_tx,
            in_flight: false,
            terminal_reason: None,
        };

        tokio::spawn(actor.run());
        (command_tx, state_rx, tool_rx)
    }

    async fn run(mut self) {
        debug!(model = %self.config.model, "Live session actor started");
        self.send_session_setup().await;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            // All handles dropped; tear down the connection.
                            debug!("All client handles dropped, closing session");
                            if !self.state.is_terminal() {
                                self.transport.close().await;
                            }
                            break;
                        }
                    }
                }

                event = self.transport_rx.recv(), if !self.transport_done => {
                    match event {
                        Some(event) => self.handle_transport_event(event).await,
                        None => {
                            self.transport_done = true;
                            self.fail_session(SendError::Connection(
                                "transport task ended".to_string(),
                            ));
                        }
                    }
                }

                Some(outcome) = self.encode_rx.recv() => {
                    self.handle_encode_outcome(outcome).await;
                }
            }
        }

        debug!("Live session actor stopped");
    }

    // ------------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------------

    /// Send the session-setup control message and await the acknowledgment.
    async fn send_session_setup(&mut self) {
        let setup = SetupMessage::new(
            self.config.model.clone(),
            GenerationConfig {
                response_modalities: self.config.response_modalities.clone(),
                temperature: self.config.temperature,
            },
        );
        self.set_state(SessionState::AwaitingSetupAck);
        self.send_json(&setup).await;
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "Session state changed");
        self.state = state;
        let _ = self.state_tx.send(state);
    }

    /// Transition to a terminal state and reject all outstanding work:
    /// pending responses first, then never-dispatched queued requests in
    /// queue order. Fires at most once per session.
    fn fail_session(&mut self, reason: SendError) {
        if self.terminal_reason.is_some() {
            return;
        }

        let state = match &reason {
            SendError::Closed(_) => SessionState::Closed,
            _ => SessionState::Error,
        };
        self.set_state(state);

        let pending = self.correlator.fail_all(&reason);
        let queued = self.queue.drain();
        let queued_count = queued.len();
        for request in queued {
            let _ = request.reply.send(Err(reason.clone()));
        }
        self.in_flight = false;

        warn!(
            %reason,
            rejected_pending = pending,
            rejected_queued = queued_count,
            "Live session terminated, outstanding requests rejected"
        );
        self.terminal_reason = Some(reason);
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::SendText { text, reply } => {
                self.enqueue(QueuedRequest {
                    payload: RequestPayload::Text(text),
                    reply,
                })
                .await;
            }
            Command::SendImage {
                image,
                caption,
                quality,
                format,
                reply,
            } => {
                self.enqueue(QueuedRequest {
                    payload: RequestPayload::Image {
                        image,
                        caption,
                        quality,
                        format,
                    },
                    reply,
                })
                .await;
            }
            Command::RealtimeInput {
                data,
                mime_type,
                reply,
            } => {
                if self.state != SessionState::Ready {
                    warn!(state = %self.state, "Refusing realtime input, session not ready");
                    let _ = reply.send(Err(SendError::NotReady(self.state)));
                    return;
                }
                let message = RealtimeInputMessage::chunk(mime_type, data);
                let sent = self.send_json(&message).await;
                let _ = reply.send(self.ack_result(sent));
            }
            Command::FunctionResponse {
                name,
                response,
                reply,
            } => {
                if self.state != SessionState::Ready {
                    warn!(state = %self.state, %name, "Refusing function response, session not ready");
                    let _ = reply.send(Err(SendError::NotReady(self.state)));
                    return;
                }
                let message = ToolResponseMessage::single(name, response);
                let sent = self.send_json(&message).await;
                let _ = reply.send(self.ack_result(sent));
            }
            Command::Close => self.close().await,
        }
    }

    fn ack_result(&self, sent: bool) -> Result<(), SendError> {
        if sent {
            return Ok(());
        }
        Err(self
            .terminal_reason
            .clone()
            .unwrap_or_else(|| SendError::Connection("send failed".to_string())))
    }

    async fn enqueue(&mut self, request: QueuedRequest) {
        if let Some(reason) = &self.terminal_reason {
            let _ = request.reply.send(Err(reason.clone()));
            return;
        }

        match self.queue.push(request) {
            Ok(()) => {
                debug!(
                    queued = self.queue.len(),
                    max = self.queue.max(),
                    "Request queued"
                );
                self.maybe_dispatch().await;
            }
            Err(rejected) => {
                warn!(max = self.queue.max(), "Request queue full, rejecting");
                let _ = rejected.reply.send(Err(SendError::QueueFull {
                    max: self.queue.max(),
                }));
            }
        }
    }

    /// Idempotent close; the resulting transport close event performs the
    /// actual drain.
    async fn close(&mut self) {
        if self.state.is_terminal() || self.state == SessionState::Closing {
            return;
        }
        self.set_state(SessionState::Closing);
        self.transport.close().await;
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Pull the next queued request if the session is ready and nothing is
    /// in flight. Text turns go straight to the wire; image turns first run
    /// their encoding task, whose outcome re-enters the select loop.
    async fn maybe_dispatch(&mut self) {
        if self.in_flight || self.state != SessionState::Ready {
            return;
        }
        let Some(request) = self.queue.pop() else {
            return;
        };
        self.in_flight = true;

        let response_id = self.correlator.register(request.reply);
        match request.payload {
            RequestPayload::Text(text) => {
                debug!(response_id, "Dispatching text turn");
                let message = ClientContentMessage::user_turn(vec![Part::text(text)]);
                self.send_json(&message).await;
            }
            RequestPayload::Image {
                image,
                caption,
                quality,
                format,
            } => {
                debug!(response_id, "Dispatching image turn, encoding");
                let encoder = Arc::clone(&self.encoder);
                let encode_tx = self.encode_tx.clone();
                tokio::spawn(async move {
                    let result = encoder.encode(&image, quality, format).await;
                    let _ = encode_tx
                        .send(EncodeOutcome {
                            response_id,
                            caption,
                            format,
                            result,
                        })
                        .await;
                });
            }
        }
    }

    async fn handle_encode_outcome(&mut self, outcome: EncodeOutcome) {
        if !self.correlator.contains(outcome.response_id) {
            // Session failed while the encoder was running.
            debug!(
                response_id = outcome.response_id,
                "Discarding encode outcome for completed request"
            );
            return;
        }

        match outcome.result {
            Ok(data) => {
                let mut parts = Vec::new();
                if let Some(caption) = outcome.caption {
                    parts.push(Part::text(caption));
                }
                parts.push(Part::inline(outcome.format.mime_type(), data));
                let message = ClientContentMessage::user_turn(parts);
                self.send_json(&message).await;
            }
            Err(e) => {
                warn!(
                    response_id = outcome.response_id,
                    error = %e,
                    "Image encoding failed, advancing to next request"
                );
                self.correlator
                    .reject(outcome.response_id, SendError::Encode(e.to_string()));
                self.in_flight = false;
                self.maybe_dispatch().await;
            }
        }
    }

    /// Serialize and send a frame; a transport-level failure here is fatal
    /// for the whole session. Returns whether the frame went out.
    async fn send_json<M: serde::Serialize>(&mut self, message: &M) -> bool {
        let frame = match serde_json::to_string(message) {
            Ok(frame) => frame,
            Err(e) => {
                self.fail_session(SendError::Connection(format!(
                    "failed to serialize message: {e}"
                )));
                return false;
            }
        };
        if let Err(e) = self.transport.send(frame).await {
            self.fail_session(SendError::Connection(e.to_string()));
            return false;
        }
        true
    }

    // ------------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------------

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(raw) => self.handle_frame(&raw).await,
            TransportEvent::Closed { reason } => {
                self.fail_session(SendError::Closed(reason));
            }
            TransportEvent::Failed { reason } => {
                self.fail_session(SendError::Connection(reason));
            }
        }
    }

    async fn handle_frame(&mut self, raw: &str) {
        let message = match ServerMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                // Malformed server frames must not corrupt session state.
                debug!(error = %e, "Failed to parse server message, ignoring");
                return;
            }
        };

        if message.setup_complete.is_some() {
            if self.state == SessionState::AwaitingSetupAck {
                debug!("Session setup acknowledged");
                self.set_state(SessionState::Ready);
                self.maybe_dispatch().await;
            }
            return;
        }

        if let Some(content) = message.server_content {
            let text = content.text();
            debug!(
                pending = self.correlator.len(),
                chars = text.len(),
                turn_complete = content.turn_complete,
                "Response fragment"
            );
            let resolved = self.correlator.apply_fragment(&text, content.turn_complete);
            if content.turn_complete {
                debug!(resolved, "Model turn complete");
                self.in_flight = false;
                self.maybe_dispatch().await;
            }
            return;
        }

        if let Some(tool_call) = message.tool_call {
            for call in tool_call.function_calls {
                debug!(name = %call.name, "Tool call received");
                let event = ToolCallEvent {
                    name: call.name,
                    arguments: call.args,
                };
                if self.tool_tx.send(event).await.is_err() {
                    debug!("Tool call receiver dropped, discarding");
                }
            }
        }
    }
}
