//! Display control core.
//!
//! Every input source funnels normalized [`ControlEvent`]s into one queue.
//! The [`Controller`] is the only consumer: it owns the display state machine
//! and the render sink, so transitions never run concurrently and need no
//! locking.

pub mod error;
pub mod machine;
pub mod registry;
pub mod startup;

pub use error::{Channel, ControlError};
pub use machine::{DisplayStateMachine, Power};
pub use startup::ChannelTally;

use crate::render::RenderSink;
use serde::Serialize;
use std::fmt;
use tokio::sync::{broadcast, mpsc, watch};

/// Depth of the control event queue
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// Opaque media identifier (file path or URI)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MediaItem(String);

impl MediaItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized, source-agnostic control intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    PowerOn,
    PowerOff,
    Advance,
    ReloadRequested,
    SetAdded(MediaItem),
    SetRemoved(MediaItem),
    /// Replace the whole set in one step
    SetReplaced(Vec<MediaItem>),
    /// The media collaborator finished a full scan
    ScanCompleted,
    ChannelClosed(Channel),
}

/// Published view of the display state
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub power: Power,
    pub current_index: Option<usize>,
    pub shown: Option<MediaItem>,
    pub media_count: usize,
    pub updated_at: String,
}

/// Single consumer of the control event queue
pub struct Controller {
    machine: DisplayStateMachine,
    sink: Box<dyn RenderSink + Send>,
    events: mpsc::Receiver<ControlEvent>,
    rescan: Option<mpsc::Sender<()>>,
    status: watch::Sender<StatusSnapshot>,
}

impl Controller {
    /// Create a controller and the receiver its status snapshots go to
    pub fn new(
        machine: DisplayStateMachine,
        sink: Box<dyn RenderSink + Send>,
        events: mpsc::Receiver<ControlEvent>,
        rescan: Option<mpsc::Sender<()>>,
    ) -> (Self, watch::Receiver<StatusSnapshot>) {
        let (status, status_rx) = watch::channel(machine.snapshot());
        (
            Self {
                machine,
                sink,
                events,
                rescan,
                status,
            },
            status_rx,
        )
    }

    /// Run the event loop until shutdown or until every sender is gone
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Display controller started");

        for directive in self.machine.start() {
            self.sink.apply(&directive);
        }

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => {
                        tracing::info!("All control sources closed");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Display controller shutting down");
                    break;
                }
            }
        }
    }

    /// Apply one event to the state machine and forward its effects
    pub fn dispatch(&mut self, event: ControlEvent) {
        tracing::debug!("Control event: {:?}", event);
        let outcome = self.machine.apply(event);

        if let Some(notice) = &outcome.notice {
            notice.report();
        }

        for directive in &outcome.directives {
            self.sink.apply(directive);
        }

        if outcome.rescan {
            self.request_rescan();
        }

        self.status.send_replace(self.machine.snapshot());
    }

    fn request_rescan(&self) {
        let Some(rescan) = &self.rescan else {
            tracing::warn!("Reload requested but no media source is running");
            return;
        };

        match rescan.try_send(()) {
            Ok(()) => tracing::info!("Media rescan requested"),
            Err(mpsc::error::TrySendError::Full(())) => {
                tracing::debug!("Media rescan already pending")
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::warn!("Media source stopped, cannot rescan")
            }
        }
    }
}
