//! Re-framing of Vertex streaming increments as OpenAI SSE chunks.
//!
//! The [`ChunkFramer`] takes the raw data of one backend increment at a time and
//! returns the complete `data: {...}\n\n` frame to send, or `None` when the
//! increment carries no usable text. The stream always ends with [`DONE_FRAME`].

use super::openai_types::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
use super::response::CompletionMeta;
use super::vertex_types::GenerateContentResponse;

/// Literal end-of-stream sentinel, never a structured chunk.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Text of the first part of the first candidate, if it is there and non-empty.
pub fn increment_text(increment: &GenerateContentResponse) -> Option<&str> {
    increment
        .candidates
        .as_ref()?
        .first()?
        .content
        .as_ref()?
        .parts
        .first()?
        .text
        .as_deref()
        .filter(|text| !text.is_empty())
}

/// Wrap a serialized payload in a single SSE data frame.
pub fn sse_frame(payload: &str) -> String {
    format!("data: {payload}\n\n")
}

#[derive(Debug)]
pub struct ChunkFramer {
    meta: CompletionMeta,
    emitted: usize,
    skipped: usize,
}

impl ChunkFramer {
    pub fn new(meta: CompletionMeta) -> Self {
        Self {
            meta,
            emitted: 0,
            skipped: 0,
        }
    }

    /// Build the chunk for one piece of text.
    pub fn chunk(&self, text: &str) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.meta.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.meta.created,
            model: self.meta.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content: text.to_string(),
                },
                finish_reason: None,
            }],
        }
    }

    /// Frame one raw increment. Malformed or empty increments are counted and
    /// yield `None`; they never surface to the client.
    pub fn frame_increment(&mut self, data: &str) -> Option<String> {
        let framed = serde_json::from_str::<GenerateContentResponse>(data)
            .ok()
            .and_then(|increment| {
                let chunk = self.chunk(increment_text(&increment)?);
                serde_json::to_string(&chunk).ok()
            })
            .map(|json| sse_frame(&json));

        match framed {
            Some(_) => self.emitted += 1,
            None => self.skipped += 1,
        }
        framed
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn increment(text: &str) -> String {
        serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        })
        .to_string()
    }

    fn frame_payload(frame: &str) -> serde_json::Value {
        let json = frame
            .strip_prefix("data: ")
            .and_then(|f| f.strip_suffix("\n\n"))
            .expect("frame must be `data: ...\\n\\n`");
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_text_increment_framed() {
        let mut framer = ChunkFramer::new(CompletionMeta::placeholder("gemini-2.0-flash"));

        let frame = framer.frame_increment(&increment("Hel")).unwrap();
        let payload = frame_payload(&frame);

        assert_eq!(payload["id"], "chatcmpl-xxxx");
        assert_eq!(payload["object"], "chat.completion.chunk");
        assert_eq!(payload["created"], 0);
        assert_eq!(payload["model"], "gemini-2.0-flash");
        assert_eq!(payload["choices"][0]["index"], 0);
        assert_eq!(payload["choices"][0]["delta"]["content"], "Hel");
        assert!(payload["choices"][0]["finish_reason"].is_null());
        assert_eq!(framer.emitted(), 1);
    }

    #[test]
    fn test_only_first_part_used() {
        let mut framer = ChunkFramer::new(CompletionMeta::placeholder("m"));
        let data = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}]
        })
        .to_string();

        let frame = framer.frame_increment(&data).unwrap();
        assert_eq!(frame_payload(&frame)["choices"][0]["delta"]["content"], "a");
    }

    #[test]
    fn test_malformed_increments_skipped() {
        let mut framer = ChunkFramer::new(CompletionMeta::placeholder("m"));

        assert!(framer.frame_increment("not json").is_none());
        assert!(framer.frame_increment("{}").is_none());
        assert!(framer.frame_increment(r#"{"candidates":[]}"#).is_none());
        assert!(framer
            .frame_increment(r#"{"candidates":[{"finishReason":"STOP"}]}"#)
            .is_none());
        assert!(framer
            .frame_increment(r#"{"candidates":[{"content":{"parts":[]}}]}"#)
            .is_none());
        assert!(framer.frame_increment(&increment("")).is_none());

        assert_eq!(framer.skipped(), 6);
        assert_eq!(framer.emitted(), 0);
    }

    #[test]
    fn test_done_frame_literal() {
        assert_eq!(DONE_FRAME, "data: [DONE]\n\n");
        assert_eq!(sse_frame("[DONE]"), DONE_FRAME);
    }
}
