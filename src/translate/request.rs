//! Translate OpenAI Chat Completions requests into Vertex AI `generateContent` requests.
//!
//! Vertex has no system role in `contents`, so system messages are carried
//! forward and prepended to the next user message. An assistant message in
//! between is emitted as-is and does not consume the pending system text.

use super::openai_types::{ChatCompletionRequest, ChatMessage, Role};
use super::vertex_types::{Content, ContentRole, GenerateContentRequest, GenerationConfig};

/// The translated form of one inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

impl TranslatedRequest {
    /// Body for a buffered `:generateContent` call.
    pub fn buffered_body(&self) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: self.contents.clone(),
            generation_config: Some(self.generation_config.clone()),
        }
    }

    /// Body for a `:streamGenerateContent` call. Only the contents are sent.
    pub fn streaming_body(&self) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: self.contents.clone(),
            generation_config: None,
        }
    }
}

/// Translate an OpenAI request into Vertex contents plus generation config.
/// Pure function: the same request always yields the same output.
pub fn openai_to_vertex(req: &ChatCompletionRequest) -> TranslatedRequest {
    TranslatedRequest {
        contents: translate_messages(&req.messages),
        generation_config: generation_config(req),
    }
}

/// Single pass over the messages, merging system text forward into the next
/// user message. Leftover system text becomes a trailing user content.
pub fn translate_messages(messages: &[ChatMessage]) -> Vec<Content> {
    let mut contents = Vec::with_capacity(messages.len());
    let mut pending_system = String::new();

    for msg in messages {
        match msg.role {
            Role::System => {
                pending_system.push_str(&msg.content);
                pending_system.push('\n');
            }
            Role::User => {
                if pending_system.is_empty() {
                    contents.push(Content::text(ContentRole::User, msg.content.as_str()));
                } else {
                    let mut text = std::mem::take(&mut pending_system);
                    text.push_str(&msg.content);
                    contents.push(Content::text(ContentRole::User, text));
                }
            }
            Role::Assistant => {
                contents.push(Content::text(ContentRole::Model, msg.content.as_str()));
            }
        }
    }

    if !pending_system.is_empty() {
        contents.push(Content::text(ContentRole::User, pending_system));
    }

    contents
}

/// Direct field rename; values are not clamped, the backend reports its own errors.
pub fn generation_config(req: &ChatCompletionRequest) -> GenerationConfig {
    GenerationConfig {
        temperature: req.temperature,
        top_p: req.top_p,
        max_output_tokens: req.max_tokens,
    }
}
