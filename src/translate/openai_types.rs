//! Type definitions for the [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat).
//!
//! These are the gateway's public shapes: what clients send in and what they get
//! back, including streaming chunks and the flat error body.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Request types (what clients send TO the gateway)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[cfg(test)]
impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// An inbound chat completion request.
///
/// `n`, `stop`, the penalties, `logit_bias` and `user` are accepted so that
/// clients validating against the OpenAI schema keep working, but they are
/// never forwarded to the backend and never affect the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_n")]
    pub n: u32,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<serde_json::Value>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub presence_penalty: f64,
    #[serde(default)]
    pub frequency_penalty: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<HashMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    1.0
}

fn default_n() -> u32 {
    1
}

fn default_max_tokens() -> u32 {
    1024
}

// ---------------------------------------------------------------------------
// Response types (what the gateway sends back)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: ChatUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

// ---------------------------------------------------------------------------
// Streaming types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    /// Always serialized, as `null` while the stream is in progress.
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    pub content: String,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Flat error body: `{"detail": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req: ChatCompletionRequest = serde_json::from_str(
            r#"{"model":"gemini-2.0-flash","messages":[{"role":"user","content":"hi"}]}"#,
        )
        .unwrap();

        assert_eq!(req.temperature, 0.7);
        assert_eq!(req.top_p, 1.0);
        assert_eq!(req.n, 1);
        assert!(!req.stream);
        assert_eq!(req.max_tokens, 1024);
        assert_eq!(req.presence_penalty, 0.0);
        assert_eq!(req.frequency_penalty, 0.0);
        assert!(req.stop.is_none());
        assert!(req.logit_bias.is_none());
        assert!(req.user.is_none());
    }

    #[test]
    fn test_request_accepts_passthrough_fields() {
        let req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "model": "gemini-2.0-flash",
            "messages": [{"role": "system", "content": "be brief"}],
            "n": 3,
            "stop": ["\n\n", "END"],
            "presence_penalty": 0.5,
            "frequency_penalty": -0.5,
            "logit_bias": {"50256": -100.0},
            "user": "user-42"
        }))
        .unwrap();

        assert_eq!(req.n, 3);
        assert_eq!(req.stop, Some(serde_json::json!(["\n\n", "END"])));
        assert_eq!(req.logit_bias.unwrap().get("50256"), Some(&-100.0));
        assert_eq!(req.user.as_deref(), Some("user-42"));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result = serde_json::from_str::<ChatCompletionRequest>(
            r#"{"model":"m","messages":[{"role":"tool","content":"x"}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_chunk_serializes_null_finish_reason() {
        let chunk = ChatCompletionChunk {
            id: "chatcmpl-xxxx".to_string(),
            object: "chat.completion.chunk".to_string(),
            created: 0,
            model: "m".to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content: "Hi".to_string(),
                },
                finish_reason: None,
            }],
        };

        let value = serde_json::to_value(&chunk).unwrap();
        assert!(value["choices"][0]["finish_reason"].is_null());
        assert_eq!(value["choices"][0]["delta"]["content"], "Hi");
    }
}
