//! Session gateway: HTTP API and the real-time WebSocket channel.
//!
//! Routes:
//! - `GET  /health`
//! - `GET  /api/drawings`: every stored drawing, insertion order
//! - `POST /api/drawings`: submit a drawing
//! - `GET  /ws`: real-time channel (`state`, `eaten`, `newDrawing` frames)
//!
//! Handlers hold only a `ServerHandle`; all world state stays in the server
//! task.

use axum::{
    body::Bytes,
    extract::{
        rejection::BytesRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use fishfight_shared::{config::ServerConfig, net::Drawing};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{debug, info, warn};

use crate::{
    registry::{DrawingSubmission, RegistryError},
    server::ServerHandle,
};

#[derive(Clone)]
pub struct AppState {
    pub server: ServerHandle,
}

/// Builds the full router for a running server.
pub fn build_router(server: ServerHandle, cfg: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/api/drawings", get(list_drawings).post(submit_drawing))
        .route("/ws", get(ws_handler));

    if let Some(dir) = &cfg.static_dir {
        info!(dir = %dir, "Serving static files");
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(cfg.max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(AppState { server })
}

/// Errors surfaced to HTTP callers as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    InvalidPayload(RegistryError),
    /// Body could not be read, e.g. it exceeded `max_body_bytes`.
    Body(BytesRejection),
    Unavailable(anyhow::Error),
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        ApiError::InvalidPayload(e)
    }
}

impl From<BytesRejection> for ApiError {
    fn from(e: BytesRejection) -> Self {
        ApiError::Body(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidPayload(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Body(e) => (e.status(), e.body_text()),
            ApiError::Unavailable(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_drawings(State(state): State<AppState>) -> Result<Json<Vec<Drawing>>, ApiError> {
    let drawings = state
        .server
        .list_drawings()
        .await
        .map_err(ApiError::Unavailable)?;
    Ok(Json(drawings))
}

async fn submit_drawing(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = body.inspect_err(|e| {
        warn!(error = %e, "Could not read drawing submission body");
    })?;
    let submission = DrawingSubmission::from_json(&body).inspect_err(|e| {
        warn!(error = %e, "Rejected drawing submission");
    })?;
    let drawing = state
        .server
        .submit(submission)
        .await
        .map_err(ApiError::Unavailable)?;
    Ok(Json(json!({ "ok": true, "id": drawing.id })))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.server))
}

/// Pushes the initial snapshot, then relays every broadcast frame until either
/// side goes away. Send failures end this connection only.
async fn handle_socket(socket: WebSocket, server: ServerHandle) {
    let conn = match server.connect().await {
        Ok(conn) => conn,
        Err(e) => {
            warn!(error = %e, "Could not register client");
            return;
        }
    };
    let (mut sender, mut receiver) = socket.split();
    let mut updates = conn.updates;

    if let Err(e) = sender.send(Message::Text(conn.initial.to_string().into())).await {
        debug!(error = %e, "Initial snapshot send failed");
        return;
    }

    loop {
        tokio::select! {
            frame = updates.recv() => match frame {
                Ok(frame) => {
                    if let Err(e) = sender.send(Message::Text(frame.to_string().into())).await {
                        debug!(error = %e, "Client send failed; dropping connection");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Client lagging; skipped frames");
                }
                Err(RecvError::Closed) => break,
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }
    info!("Client disconnected");
}
