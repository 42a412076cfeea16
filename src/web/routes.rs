//! HTTP and WebSocket route handlers.

use super::templates;
use crate::control::{ControlError, ControlEvent, StatusSnapshot};
use crate::input::{NetworkNormalizer, Normalizer};
use crate::render::Frame;
use crate::render::viewer::ViewerFrame;
use axum::{
    Json,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub events: mpsc::Sender<ControlEvent>,
    pub status: watch::Receiver<StatusSnapshot>,
    pub frames: Option<watch::Receiver<Frame>>,
    pub media_dir: PathBuf,
}

/// GET /ws - Network control socket
pub async fn control_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let normalizer = NetworkNormalizer::new().with_media_dir(&state.media_dir);
    ws.on_upgrade(move |socket| control_session(socket, state.events, normalizer))
}

async fn control_session(
    mut socket: WebSocket,
    events: mpsc::Sender<ControlEvent>,
    mut normalizer: NetworkNormalizer,
) {
    tracing::info!("Control session opened");

    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Text(text)) => {
                let Some(event) = normalizer.normalize(&text) else {
                    continue;
                };
                if events.send(event).await.is_err() {
                    tracing::warn!("Controller gone, closing control session");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                ControlError::MalformedInput("binary frames are not supported".to_string())
                    .report();
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Control session error: {}", e);
                break;
            }
        }
    }

    tracing::info!("Control session closed");
}

/// GET /display - Viewer page
pub async fn viewer_page() -> Html<&'static str> {
    Html(templates::VIEWER_PAGE)
}

/// GET /display/ws - Frame stream for viewers
pub async fn viewer_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    match state.frames {
        Some(frames) => ws.on_upgrade(move |socket| viewer_session(socket, frames)),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn viewer_session(mut socket: WebSocket, mut frames: watch::Receiver<Frame>) {
    tracing::info!("Viewer connected");

    loop {
        // The current frame goes out first, so a new viewer starts in sync.
        let payload = {
            let frame = frames.borrow_and_update();
            let view = ViewerFrame::from(&*frame);
            serde_json::to_string(&view)
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode frame: {}", e);
                break;
            }
        };

        if socket.send(Message::Text(payload)).await.is_err() {
            break;
        }

        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            incoming = wait_for_close(&mut socket) => {
                if let Err(e) = incoming {
                    tracing::debug!("Viewer socket error: {}", e);
                }
                break;
            }
        }
    }

    tracing::info!("Viewer disconnected");
}

/// Drain viewer messages until the socket closes
async fn wait_for_close(socket: &mut WebSocket) -> Result<(), axum::Error> {
    while let Some(message) = socket.recv().await {
        if let Message::Close(_) = message? {
            break;
        }
    }
    Ok(())
}

/// GET /media/:name - Serve a file from the media directory
pub async fn media_file(Path(name): Path<String>, State(state): State<AppState>) -> Response {
    if !is_plain_file_name(&name) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = state.media_dir.join(&name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(&name))], bytes).into_response(),
        Err(e) => {
            tracing::debug!("Media file {} unavailable: {}", path.display(), e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// GET /status - Current display state
pub async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.borrow().clone())
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Reject anything that could leave the media directory
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
}

fn content_type(name: &str) -> &'static str {
    let extension = std::path::Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());

    match extension.as_deref() {
        Some("gif") => "image/gif",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
