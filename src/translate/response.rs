use super::openai_types::{ChatCompletionResponse, ChatUsage, Choice, ChoiceMessage};
use super::vertex_types::{Candidate, GenerateContentResponse, UsageMetadata};
use crate::error::{GatewayError, Result};

pub const PLACEHOLDER_ID: &str = "chatcmpl-xxxx";
pub const PLACEHOLDER_CREATED: i64 = 0;

/// Identity fields shared by a response and every chunk of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionMeta {
    pub id: String,
    pub created: i64,
    pub model: String,
}

impl CompletionMeta {
    /// Fixed `chatcmpl-xxxx` / `0` identity, byte-compatible with older deployments.
    pub fn placeholder(model: &str) -> Self {
        Self {
            id: PLACEHOLDER_ID.to_string(),
            created: PLACEHOLDER_CREATED,
            model: model.to_string(),
        }
    }

    pub fn unique(model: &str) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
        }
    }
}

/// Translate a complete Vertex response into an OpenAI chat completion.
///
/// Only the first candidate is used; the response always has exactly one choice.
pub fn vertex_to_openai(
    resp: &GenerateContentResponse,
    meta: &CompletionMeta,
) -> Result<ChatCompletionResponse> {
    let candidate = resp
        .candidates
        .as_deref()
        .and_then(|candidates| candidates.first())
        .ok_or_else(GatewayError::no_candidates)?;

    let content = candidate_text(candidate);
    let finish_reason = map_finish_reason(candidate.finish_reason.as_deref());

    Ok(ChatCompletionResponse {
        id: meta.id.clone(),
        object: "chat.completion".to_string(),
        created: meta.created,
        model: meta.model.clone(),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage {
                role: "assistant".to_string(),
                content,
            },
            finish_reason,
        }],
        usage: map_usage(resp.usage_metadata.as_ref()),
    })
}

/// All text parts of a candidate, concatenated in order.
pub fn candidate_text(candidate: &Candidate) -> String {
    candidate
        .content
        .as_ref()
        .map(|c| {
            c.parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Map Vertex finishReason to OpenAI finish_reason
pub fn map_finish_reason(reason: Option<&str>) -> Option<String> {
    match reason {
        Some("STOP") => Some("stop".to_string()),
        Some("MAX_OUTPUT_TOKENS") => Some("length".to_string()),
        _ => None,
    }
}

pub fn map_usage(usage: Option<&UsageMetadata>) -> ChatUsage {
    usage.map_or_else(ChatUsage::default, |u| ChatUsage {
        prompt_tokens: u.prompt_token_count,
        completion_tokens: u.candidates_token_count,
        total_tokens: u.total_token_count,
    })
}
