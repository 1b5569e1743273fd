use crate::auth::authorize;
use crate::backend;
use crate::config::{GatewayConfig, Secrets};
use crate::error::GatewayError;
use crate::logging::{Outcome, SharedLogger};
use crate::translate::openai_types::ChatCompletionRequest;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Everything a request handler needs, built once at startup and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub secrets: Secrets,
    pub client: reqwest::Client,
    pub logger: SharedLogger,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = authorize(authorization, &state.secrets.gateway_api_key) {
        tracing::warn!("Rejected request with invalid gateway key");
        let reason = if authorization.is_some() {
            "key mismatch"
        } else {
            "no Authorization header"
        };
        state
            .logger
            .warn("auth", format!("Rejected request: {reason}"));
        return failure(&state, "", false, e);
    }

    let req: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            state
                .logger
                .error("server", format!("Failed to parse request: {e}"));
            return failure(&state, "", false, GatewayError::validation(e.to_string()));
        }
    };

    state.logger.info(
        "server",
        format!(
            "Request: model={} streaming={} messages={}",
            req.model,
            req.stream,
            req.messages.len()
        ),
    );

    if req.stream {
        handle_streaming(state, &req).await
    } else {
        handle_buffered(state, &req).await
    }
}

async fn handle_buffered(state: Arc<AppState>, req: &ChatCompletionRequest) -> Response {
    match backend::complete(req, &state).await {
        Ok(resp) => {
            state.logger.request_finished(
                &req.model,
                false,
                Outcome::Completed {
                    usage: resp.usage.clone(),
                },
            );
            Json(resp).into_response()
        }
        Err(e) => failure(&state, &req.model, false, e),
    }
}

async fn handle_streaming(state: Arc<AppState>, req: &ChatCompletionRequest) -> Response {
    let sse_stream = match backend::open_stream(req, &state).await {
        Ok(s) => s,
        Err(e) => return failure(&state, &req.model, true, e),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(sse_stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn failure(state: &AppState, model: &str, streaming: bool, err: GatewayError) -> Response {
    state.logger.request_finished(
        model,
        streaming,
        Outcome::Failed {
            status: err.status_code().as_u16(),
            detail: err.to_string(),
        },
    );
    err.into_response()
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
