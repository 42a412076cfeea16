//! Web server module.
//!
//! Hosts the network control socket, the browser viewer and its directive
//! stream, media file serving, and status endpoints using Axum.

pub mod routes;
pub mod templates;

use crate::control::{ControlEvent, StatusSnapshot};
use crate::render::Frame;
use axum::{Router, routing::get};
use routes::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, watch};

/// Web server errors
#[derive(Error, Debug)]
pub enum WebError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),

    #[error("Server error: {0}")]
    ServerError(String),
}

/// Web server
pub struct WebServer {
    state: AppState,
}

impl WebServer {
    /// Create a new web server
    ///
    /// `frames` is `None` when no viewer sink is running; the viewer routes
    /// are then left out.
    pub fn new(
        events: mpsc::Sender<ControlEvent>,
        status: watch::Receiver<StatusSnapshot>,
        frames: Option<watch::Receiver<Frame>>,
        media_dir: PathBuf,
    ) -> Self {
        Self {
            state: AppState {
                events,
                status,
                frames,
                media_dir,
            },
        }
    }

    /// Build the router with all routes
    fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/ws", get(routes::control_socket))
            .route("/status", get(routes::status))
            .route("/health", get(routes::health));

        if self.state.frames.is_some() {
            router = router
                .route("/", get(routes::viewer_page))
                .route("/display", get(routes::viewer_page))
                .route("/display/ws", get(routes::viewer_socket))
                .route("/media/:name", get(routes::media_file));
        }

        router.with_state(self.state.clone())
    }

    /// Bind the listening socket
    ///
    /// Done separately from serving so a bind failure is known at startup.
    pub async fn bind(port: u16) -> Result<TcpListener, WebError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Web server listening on http://{}", addr);
        Ok(listener)
    }

    /// Serve on `listener` until shutdown
    pub async fn run_with_shutdown(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), WebError> {
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Web server shutting down gracefully");
            })
            .await
            .map_err(|e| WebError::ServerError(e.to_string()))
    }
}
