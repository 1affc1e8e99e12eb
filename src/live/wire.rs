//! Wire message shapes for the Gemini Live protocol.
//!
//! Client messages serialize with snake_case keys (`client_content`,
//! `turn_complete`); server messages arrive with camelCase keys
//! (`serverContent`, `turnComplete`). Unknown server fields are ignored so a
//! protocol addition never breaks parsing.

use serde::{Deserialize, Serialize};

// ============================================================================
// Client Messages
// ============================================================================

/// Session setup, sent once immediately after the socket opens.
#[derive(Debug, Clone, Serialize)]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Clone, Serialize)]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    pub response_modalities: Vec<String>,
    pub temperature: f32,
}

impl SetupMessage {
    pub fn new(model: impl Into<String>, generation_config: GenerationConfig) -> Self {
        Self {
            setup: Setup {
                model: model.into(),
                generation_config,
            },
        }
    }
}

/// One complete client turn.
#[derive(Debug, Clone, Serialize)]
pub struct ClientContentMessage {
    pub client_content: ClientContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientContent {
    pub turns: Vec<Turn>,
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: String,
    pub parts: Vec<Part>,
}

/// A part of a turn: either plain text or inline binary data.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }
}

impl ClientContentMessage {
    /// Build a single user turn marked turn-complete.
    pub fn user_turn(parts: Vec<Part>) -> Self {
        Self {
            client_content: ClientContent {
                turns: vec![Turn {
                    role: "user".to_string(),
                    parts,
                }],
                turn_complete: true,
            },
        }
    }
}

/// Fire-and-forget streaming media chunk.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

impl RealtimeInputMessage {
    pub fn chunk(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            realtime_input: RealtimeInput {
                media_chunks: vec![MediaChunk {
                    mime_type: mime_type.into(),
                    data: data.into(),
                }],
            },
        }
    }
}

/// Result of a function call, sent back into the session.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponseMessage {
    pub tool_response: ToolResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: serde_json::Value,
}

impl ToolResponseMessage {
    pub fn single(name: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            tool_response: ToolResponse {
                function_responses: vec![FunctionResponse {
                    name: name.into(),
                    response,
                }],
            },
        }
    }
}

// ============================================================================
// Server Messages
// ============================================================================

/// An incoming server message. The variant is determined by which top-level
/// key is present; a message with none of them is a no-op for the client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub tool_call: Option<ToolCallPayload>,
}

impl ServerMessage {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub turn_complete: bool,
}

impl ServerContent {
    /// Concatenated text of all text parts in the model turn.
    pub fn text(&self) -> String {
        self.model_turn
            .as_ref()
            .map(|turn| {
                turn.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .concat()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<ServerPart>,
}

#[derive(Debug, Deserialize)]
pub struct ServerPart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPayload {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}
