//! Headless sink that only logs frame changes.

use super::{Frame, RenderDirective, RenderSink};

#[derive(Debug, Default)]
pub struct LogSink {
    frame: Frame,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderSink for LogSink {
    fn apply(&mut self, directive: &RenderDirective) {
        if !self.frame.apply(directive) {
            tracing::debug!("Render: {:?} (unchanged)", directive);
            return;
        }

        match directive {
            RenderDirective::Hide => tracing::info!("Render: display hidden"),
            RenderDirective::Unhide => tracing::info!("Render: display visible"),
            RenderDirective::ShowItem(item) => tracing::info!("Render: showing {}", item),
            RenderDirective::ShowEmpty => tracing::info!("Render: showing nothing"),
            RenderDirective::ShowErrorDialog(dialog) => {
                tracing::warn!("Render: dialog {:?}: {}", dialog.kind, dialog.message)
            }
        }
    }
}
