//! Render sinks.
//!
//! The display state machine emits [`RenderDirective`]s; a sink folds them
//! into a [`Frame`] and pushes the result to the presentation layer.

pub mod log;
pub mod viewer;

pub use log::LogSink;
pub use viewer::ViewerSink;

use crate::control::{Channel, MediaItem};
use serde::{Deserialize, Serialize};

/// Which sink the controller drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Browser viewer fed over WebSocket
    #[default]
    Web,
    /// Log only (headless)
    Log,
}

/// Kind of error dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    NoMedia,
    ChannelClosed,
}

/// A user-visible error dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDialog {
    pub kind: DialogKind,
    pub message: String,
}

impl ErrorDialog {
    pub fn no_media(message: impl Into<String>) -> Self {
        Self {
            kind: DialogKind::NoMedia,
            message: message.into(),
        }
    }

    pub fn channel_closed(channel: Channel) -> Self {
        Self {
            kind: DialogKind::ChannelClosed,
            message: format!(
                "Lost the {}. Controls from it no longer work, restart the frame.",
                channel
            ),
        }
    }
}

/// Presentation directive emitted by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderDirective {
    Hide,
    Unhide,
    ShowItem(MediaItem),
    ShowEmpty,
    ShowErrorDialog(ErrorDialog),
}

/// Consumer of render directives
///
/// Implementations must be idempotent: applying the same directive twice
/// in a row has the same observable effect as applying it once.
pub trait RenderSink {
    fn apply(&mut self, directive: &RenderDirective);
}

/// What the presentation layer currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub hidden: bool,
    pub shown: Option<MediaItem>,
    pub dialog: Option<ErrorDialog>,
}

impl Frame {
    /// Fold a directive into the frame, returning whether anything changed
    ///
    /// `ShowItem` replaces the shown item in a single step, so there is never
    /// a frame with zero or two items visible.
    pub fn apply(&mut self, directive: &RenderDirective) -> bool {
        match directive {
            RenderDirective::Hide => !std::mem::replace(&mut self.hidden, true),
            RenderDirective::Unhide => std::mem::replace(&mut self.hidden, false),
            RenderDirective::ShowItem(item) => {
                let cleared = self.clear_dialog(DialogKind::NoMedia);
                if self.shown.as_ref() == Some(item) {
                    return cleared;
                }
                self.shown = Some(item.clone());
                true
            }
            RenderDirective::ShowEmpty => self.shown.take().is_some(),
            RenderDirective::ShowErrorDialog(dialog) => {
                if self.dialog.as_ref() == Some(dialog) {
                    return false;
                }
                // A closed channel is terminal; a later "no media" does not cover it.
                if dialog.kind == DialogKind::NoMedia
                    && matches!(&self.dialog, Some(d) if d.kind == DialogKind::ChannelClosed)
                {
                    return false;
                }
                self.dialog = Some(dialog.clone());
                true
            }
        }
    }

    fn clear_dialog(&mut self, kind: DialogKind) -> bool {
        if matches!(&self.dialog, Some(d) if d.kind == kind) {
            self.dialog = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(id: &str) -> RenderDirective {
        RenderDirective::ShowItem(MediaItem::new(id))
    }

    #[test]
    fn repeated_directives_are_idempotent() {
        let mut frame = Frame::default();
        let directives = [
            RenderDirective::Hide,
            RenderDirective::Unhide,
            show("a.gif"),
            RenderDirective::ShowEmpty,
            RenderDirective::ShowErrorDialog(ErrorDialog::no_media("none")),
        ];

        for directive in &directives {
            frame.apply(directive);
            let once = frame.clone();
            assert!(!frame.apply(directive), "{:?} changed the frame twice", directive);
            assert_eq!(frame, once);
        }
    }

    #[test]
    fn show_item_swaps_in_one_step() {
        let mut frame = Frame::default();
        frame.apply(&show("a.gif"));
        assert!(frame.apply(&show("b.gif")));
        assert_eq!(frame.shown, Some(MediaItem::new("b.gif")));
    }

    #[test]
    fn show_item_clears_no_media_dialog_only() {
        let mut frame = Frame::default();
        frame.apply(&RenderDirective::ShowErrorDialog(ErrorDialog::no_media("none")));
        frame.apply(&show("a.gif"));
        assert_eq!(frame.dialog, None);

        let closed = ErrorDialog::channel_closed(Channel::Network);
        frame.apply(&RenderDirective::ShowErrorDialog(closed.clone()));
        frame.apply(&show("b.gif"));
        assert_eq!(frame.dialog, Some(closed));
    }

    #[test]
    fn no_media_does_not_cover_channel_closed() {
        let mut frame = Frame::default();
        let closed = ErrorDialog::channel_closed(Channel::Keyboard);
        frame.apply(&RenderDirective::ShowErrorDialog(closed.clone()));

        assert!(!frame.apply(&RenderDirective::ShowErrorDialog(ErrorDialog::no_media("none"))));
        assert_eq!(frame.dialog, Some(closed));
    }
}
