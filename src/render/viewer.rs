//! Sink that feeds browser viewers.
//!
//! The current [`Frame`] is published on a watch channel. Every viewer
//! connection renders the whole frame, so a newly connected viewer gets the
//! current state first and then each change.

use super::{ErrorDialog, Frame, RenderDirective, RenderSink};
use crate::control::MediaItem;
use serde::Serialize;
use std::path::Path;
use tokio::sync::watch;

pub struct ViewerSink {
    frame: Frame,
    frames: watch::Sender<Frame>,
}

impl ViewerSink {
    /// Create the sink and the receiver viewers subscribe through
    pub fn new() -> (Self, watch::Receiver<Frame>) {
        let (frames, rx) = watch::channel(Frame::default());
        (
            Self {
                frame: Frame::default(),
                frames,
            },
            rx,
        )
    }
}

impl RenderSink for ViewerSink {
    fn apply(&mut self, directive: &RenderDirective) {
        if !self.frame.apply(directive) {
            return;
        }
        tracing::debug!("Viewer frame changed by {:?}", directive);
        self.frames.send_replace(self.frame.clone());
    }
}

/// Wire form of a frame sent to viewers
#[derive(Debug, Serialize, PartialEq)]
pub struct ViewerFrame<'a> {
    pub hidden: bool,
    pub src: Option<String>,
    pub dialog: Option<&'a ErrorDialog>,
}

impl<'a> From<&'a Frame> for ViewerFrame<'a> {
    fn from(frame: &'a Frame) -> Self {
        Self {
            hidden: frame.hidden,
            src: frame.shown.as_ref().map(media_url),
            dialog: frame.dialog.as_ref(),
        }
    }
}

/// Map a media identifier to the URL a viewer loads it from
///
/// Remote URLs pass through; anything else is served from the media
/// directory by file name.
pub fn media_url(item: &MediaItem) -> String {
    let id = item.id();
    if id.starts_with("http://") || id.starts_with("https://") {
        return id.to_string();
    }

    let name = Path::new(id)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| id.to_string());
    format!("/media/{}", name)
}
