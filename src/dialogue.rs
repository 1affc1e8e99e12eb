//! Clarification dialogue for collecting a daily calorie goal.
//!
//! The model is prompted with the running transcript and answers with a JSON
//! object carrying either a final numeric goal or a clarifying question. The
//! dialogue loops, feeding each user answer back into the transcript, until
//! a goal arrives or the round limit is hit.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Upper bound on clarification rounds before the dialogue gives up.
pub const DEFAULT_MAX_ROUNDS: usize = 5;

/// Parsed model verdict for one dialogue round.
///
/// Exactly one of the two fields is expected; a `clarify` question keeps the
/// dialogue going, a `goal` number ends it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GoalVerdict {
    pub goal: Option<f64>,
    pub clarify: Option<String>,
}

/// Text-in, text-out model endpoint used by the dialogue.
#[async_trait]
pub trait TextModel {
    async fn generate(&self, prompt: &str) -> Result<String, DialogueError>;
}

/// Source of user utterances, one per dialogue round.
#[async_trait]
pub trait PromptSource {
    /// Next user utterance, or `None` when input has ended.
    async fn next_input(&mut self) -> Option<String>;
}

#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("model request failed: {0}")]
    Model(String),

    #[error("could not parse model verdict: {0}")]
    Parse(String),

    #[error("user input ended before a goal was set")]
    InputEnded,

    #[error("no goal after {max} clarification rounds")]
    RoundLimit { max: usize },
}

/// Runs the goal-collection dialogue against a model.
pub struct GoalDialogue {
    prompt: String,
    max_rounds: usize,
}

impl GoalDialogue {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Collect a calorie goal, looping on clarification questions.
    ///
    /// The transcript tags user turns as `<USER>..</USER>` and the model's
    /// own clarification verdicts as `<YOU>..</YOU>`, so the model sees the
    /// full exchange on every round.
    pub async fn collect_goal<M, S>(
        &self,
        model: &M,
        source: &mut S,
    ) -> Result<f64, DialogueError>
    where
        M: TextModel + Sync,
        S: PromptSource + Send,
    {
        let mut transcript = String::new();

        for round in 0..self.max_rounds {
            let input = source.next_input().await.ok_or(DialogueError::InputEnded)?;
            transcript.push_str(&format!("<USER>{input}</USER>\n"));

            let full_prompt = format!("{}{}", self.prompt, transcript);
            let response = model.generate(&full_prompt).await?;
            debug!(round, response = %response, "Goal verdict received");

            let verdict = parse_verdict(&response)?;
            if let Some(goal) = verdict.goal {
                info!(goal, rounds = round + 1, "Calorie goal set");
                return Ok(goal);
            }

            match verdict.clarify {
                Some(question) => {
                    debug!(round, question = %question, "Clarification requested");
                    transcript.push_str(&format!(
                        "<YOU>{{\"clarify\":\"{question}\"}}</YOU>\n"
                    ));
                }
                None => {
                    return Err(DialogueError::Parse(
                        "verdict has neither goal nor clarify".to_string(),
                    ))
                }
            }
        }

        Err(DialogueError::RoundLimit {
            max: self.max_rounds,
        })
    }
}

/// Parse a model response into a verdict, tolerating markdown fences and
/// surrounding prose.
pub fn parse_verdict(response: &str) -> Result<GoalVerdict, DialogueError> {
    let json = extract_json_block(response)
        .ok_or_else(|| DialogueError::Parse("no JSON object in response".to_string()))?;
    serde_json::from_str(json).map_err(|e| DialogueError::Parse(e.to_string()))
}

/// Pull the JSON payload out of a response that may wrap it in a
/// ```` ```json ```` fence or bury it in prose.
fn extract_json_block(response: &str) -> Option<&str> {
    if let Some(start) = response.find("```json") {
        let body = &response[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }

    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&response[start..=end])
}
