//! API translation between `OpenAI` Chat Completions and Vertex AI `generateContent`.
//!
//! The core of the gateway: converts requests, buffered responses, and streaming
//! increments between the two formats. All translation functions are pure (no I/O).

pub mod openai_types;
pub mod request;
pub mod response;
pub mod streaming;
pub mod vertex_types;
