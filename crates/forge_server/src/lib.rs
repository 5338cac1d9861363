//! HTTP surface for streaming component generation.
//!
//! `POST /api/generate` validates the request synchronously (400/500 with a
//! JSON `{"error": ...}` body) and otherwise answers with an event stream of
//! wire events for one generation session. Dropping the connection cancels
//! the session.

pub mod providers;

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use component_forge::{session, GenerationProvider, Prompt, ValidationError, WireEvent};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    provider: Arc<dyn GenerationProvider>,
}

impl AppState {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn GenerationProvider> {
        &self.provider
    }
}

/// Synchronous, pre-stream request failure.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(error) if error.is_server_fault() => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "rejecting generation request");
        } else {
            tracing::debug!(error = %self, "rejecting generation request");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    prompt: Option<Value>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate", post(generate))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until `shutdown` resolves; in-flight streams are drained first.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(body) = body.map_err(|rejection| ValidationError::InvalidBody(rejection.body_text()))?;
    let prompt = Prompt::parse(body.prompt.as_ref())?;
    state
        .provider
        .preflight()
        .map_err(|error| ValidationError::MissingCredential(error.message().to_string()))?;

    let stream = session::stream(Arc::clone(&state.provider), prompt);
    tracing::info!(session_id = %stream.id, "streaming generation");

    let events = ReceiverStream::new(stream.events)
        .map(|event| Ok::<_, Infallible>(sse_event(&event)));
    let mut response = Sse::new(events).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(response)
}

fn sse_event(event: &WireEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|error| {
        tracing::error!(%error, "failed to encode wire event");
        Event::default().data(r#"{"stage":"error","error":"Failed to encode event"}"#)
    })
}

async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let profile = state.provider.profile();
    Json(json!({
        "status": "ok",
        "provider": profile.provider_id,
        "model": profile.model_id,
    }))
}
