use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::logging::{Outcome, SharedLogger};
use crate::server::AppState;
use crate::translate::openai_types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::translate::request::openai_to_vertex;
use crate::translate::response::vertex_to_openai;
use crate::translate::streaming::{ChunkFramer, DONE_FRAME};
use crate::translate::vertex_types::GenerateContentResponse;

use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::stream::Stream;
use futures::StreamExt;
use secrecy::ExposeSecret;
use std::convert::Infallible;
use std::pin::Pin;

const API_KEY_HEADER: &str = "X-Goog-Api-Key";

/// The outbound client. Only connecting is bounded; a slow but live response,
/// streamed or not, is never cut off by the gateway.
pub fn http_client(config: &GatewayConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.connect_timeout() {
        builder = builder.connect_timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| GatewayError::config(format!("Failed to build HTTP client: {e}")))
}

/// Framed SSE bytes ready to be written to the client, one frame per item.
pub type SseStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, Infallible>> + Send>>;

/// Run a buffered completion: one `:generateContent` call, translated back.
pub async fn complete(
    req: &ChatCompletionRequest,
    state: &AppState,
) -> Result<ChatCompletionResponse> {
    let url = state.config.backend_url(&req.model, "generateContent")?;
    let body = openai_to_vertex(req).buffered_body();

    state
        .logger
        .info("backend", format!("POST {} contents={}", url, body.contents.len()));

    let response = state
        .client
        .post(url)
        .header(API_KEY_HEADER, state.secrets.backend_api_key.expose_secret())
        .json(&body)
        .send()
        .await
        .map_err(|e| GatewayError::backend(format!("Request failed: {e}")))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| GatewayError::backend(format!("Failed to read response body: {e}")))?;

    state.logger.debug(
        "backend",
        format!("Response status={} body_len={}", status.as_u16(), text.len()),
    );

    if !status.is_success() {
        return Err(GatewayError::backend(format!(
            "Vertex AI returned status {}: {}",
            status.as_u16(),
            truncate(&text, 500)
        )));
    }

    let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
        GatewayError::backend(format!(
            "Failed to parse response: {}. Body: {}",
            e,
            truncate(&text, 300)
        ))
    })?;

    vertex_to_openai(&parsed, &state.config.response.ids.meta_for(&req.model))
}

/// Open a `:streamGenerateContent` call and return the client-facing SSE frames.
///
/// Failures before the backend starts streaming are returned as errors so they
/// can still be mapped to an HTTP status.
pub async fn open_stream(req: &ChatCompletionRequest, state: &AppState) -> Result<SseStream> {
    let mut url = state
        .config
        .backend_url(&req.model, "streamGenerateContent")?;
    url.set_query(Some("alt=sse"));
    let body = openai_to_vertex(req).streaming_body();

    state.logger.info(
        "backend",
        format!("POST {} contents={} (streaming)", url, body.contents.len()),
    );

    let response = state
        .client
        .post(url)
        .header(API_KEY_HEADER, state.secrets.backend_api_key.expose_secret())
        .json(&body)
        .send()
        .await
        .map_err(|e| GatewayError::backend(format!("Streaming request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(GatewayError::backend(format!(
            "Vertex AI returned status {}: {}",
            status.as_u16(),
            truncate(&text, 500)
        )));
    }

    let increments = response.bytes_stream().eventsource().map(|event| {
        event
            .map(|e| e.data)
            .map_err(|e| GatewayError::backend(format!("Stream error: {e}")))
    });

    let framer = ChunkFramer::new(state.config.response.ids.meta_for(&req.model));
    Ok(Box::pin(frame_increments(
        increments,
        framer,
        req.model.clone(),
        state.logger.clone(),
    )))
}

/// Turn raw increment payloads into SSE frames, in arrival order, then `[DONE]`.
///
/// Each frame is yielded before the next increment is awaited. A failing
/// increment source ends the stream early but still closes it with `[DONE]`.
pub fn frame_increments(
    increments: impl Stream<Item = Result<String>> + Send + 'static,
    mut framer: ChunkFramer,
    model: String,
    logger: SharedLogger,
) -> impl Stream<Item = std::result::Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        tokio::pin!(increments);

        while let Some(increment) = increments.next().await {
            let data = match increment {
                Ok(data) => data,
                Err(e) => {
                    logger.error("stream", format!("Backend stream failed: {e}"));
                    break;
                }
            };

            if let Some(frame) = framer.frame_increment(&data) {
                yield Ok(Bytes::from(frame));
            } else {
                logger.debug(
                    "stream",
                    format!("Skipping increment without text: {}", truncate(&data, 200)),
                );
            }
        }

        logger.request_finished(
            &model,
            true,
            Outcome::Streamed {
                chunks: framer.emitted(),
                skipped: framer.skipped(),
            },
        );

        yield Ok(Bytes::from_static(DONE_FRAME.as_bytes()));
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::response::CompletionMeta;
    use futures::stream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Sets its flag when dropped, to observe when the source stream goes away.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn logger() -> (tempfile::TempDir, SharedLogger) {
        let dir = tempfile::tempdir().unwrap();
        let logger = SharedLogger::new(dir.path().join("gateway.log")).unwrap();
        (dir, logger)
    }

    fn increment(text: &str) -> Result<String> {
        Ok(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        })
        .to_string())
    }

    fn framed(
        increments: impl Stream<Item = Result<String>> + Send + 'static,
        logger: SharedLogger,
    ) -> Pin<Box<impl Stream<Item = std::result::Result<Bytes, Infallible>> + Send>> {
        Box::pin(frame_increments(
            increments,
            ChunkFramer::new(CompletionMeta::placeholder("gemini-2.0-flash")),
            "gemini-2.0-flash".to_string(),
            logger,
        ))
    }

    fn collect(increments: Vec<Result<String>>, logger: SharedLogger) -> Vec<String> {
        let framer = ChunkFramer::new(CompletionMeta::placeholder("gemini-2.0-flash"));
        let frames = frame_increments(
            stream::iter(increments),
            framer,
            "gemini-2.0-flash".to_string(),
            logger,
        );
        tokio_test::block_on(frames.collect::<Vec<_>>())
            .into_iter()
            .map(|frame| String::from_utf8(frame.unwrap().to_vec()).unwrap())
            .collect()
    }

    fn delta(frame: &str) -> String {
        let json = frame.strip_prefix("data: ").unwrap().strip_suffix("\n\n").unwrap();
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        value["choices"][0]["delta"]["content"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_two_increments_then_done() {
        let (_dir, logger) = logger();
        let frames = collect(vec![increment("Hel"), increment("lo")], logger);

        assert_eq!(frames.len(), 3);
        assert_eq!(delta(&frames[0]), "Hel");
        assert_eq!(delta(&frames[1]), "lo");
        assert_eq!(frames[2], "data: [DONE]\n\n");
    }

    #[test]
    fn test_malformed_increments_are_skipped() {
        let (_dir, logger) = logger();
        let frames = collect(
            vec![
                increment("a"),
                Ok("{not json".to_string()),
                Ok(r#"{"candidates":[]}"#.to_string()),
                increment("b"),
            ],
            logger.clone(),
        );

        assert_eq!(frames.len(), 3);
        assert_eq!(delta(&frames[0]), "a");
        assert_eq!(delta(&frames[1]), "b");
        assert_eq!(frames[2], DONE_FRAME);

        let finished = logger
            .recent(10)
            .into_iter()
            .find(|e| e.component == "request")
            .unwrap();
        let context = finished.context.unwrap();
        assert_eq!(context["result"]["chunks"], 2);
        assert_eq!(context["result"]["skipped"], 2);
    }

    #[test]
    fn test_source_error_ends_with_done() {
        let (_dir, logger) = logger();
        let frames = collect(
            vec![
                increment("partial"),
                Err(GatewayError::backend("connection reset")),
                increment("never sent"),
            ],
            logger,
        );

        assert_eq!(frames.len(), 2);
        assert_eq!(delta(&frames[0]), "partial");
        assert_eq!(frames[1], DONE_FRAME);
    }

    #[test]
    fn test_empty_source_only_done() {
        let (_dir, logger) = logger();
        let frames = collect(Vec::new(), logger);
        assert_eq!(frames, vec![DONE_FRAME.to_string()]);
    }

    #[tokio::test]
    async fn test_frame_delivered_before_next_increment_arrives() {
        let (_dir, logger) = logger();
        let source = stream::iter(vec![increment("a")]).chain(stream::pending());
        let mut frames = framed(source, logger);

        let first = tokio::time::timeout(Duration::from_millis(500), frames.next())
            .await
            .expect("first frame held back while the source is still open")
            .unwrap()
            .unwrap();
        assert_eq!(delta(std::str::from_utf8(&first).unwrap()), "a");

        // Nothing more until the backend produces something.
        assert!(
            tokio::time::timeout(Duration::from_millis(50), frames.next())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_dropping_output_drops_source() {
        let (_dir, logger) = logger();
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let source = stream::iter(vec![increment("a")])
            .chain(stream::pending())
            .map(move |item| {
                let _keep = &flag;
                item
            });

        let mut frames = framed(source, logger);
        let _ = frames.next().await;
        assert!(!dropped.load(Ordering::SeqCst));

        drop(frames);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_connect_timeout_only_client_builds() {
        let mut config = GatewayConfig::default();
        assert!(http_client(&config).is_ok());

        config.connect_timeout_secs = 3;
        assert!(http_client(&config).is_ok());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 2), "he");
        assert_eq!(truncate("héllo", 2), "h");
    }
}
