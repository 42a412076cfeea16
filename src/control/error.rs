//! Control error taxonomy.
//!
//! None of these abort the event loop. Decode failures stay at the input
//! boundary, set-size notices are informational, and a closed channel is
//! surfaced once through the render sink.

use std::fmt;
use thiserror::Error;

/// A control source that can become unusable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Network,
    Keyboard,
    Gpio,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Network => "network control socket",
            Channel::Keyboard => "keyboard",
            Channel::Gpio => "GPIO buttons",
        };
        f.write_str(name)
    }
}

/// Control errors and notices
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("No media available")]
    EmptyMediaSet,

    #[error("Only one media item, nothing to advance to")]
    SingleItemSet,

    #[error("Control channel closed: {0}")]
    ChannelClosed(Channel),

    #[error("Startup failed: {0}")]
    FatalBootstrap(String),
}

impl ControlError {
    /// Log this error at the level its kind calls for
    pub fn report(&self) {
        match self {
            ControlError::MalformedInput(_) => tracing::warn!("{}", self),
            ControlError::EmptyMediaSet | ControlError::SingleItemSet => {
                tracing::info!("{}", self)
            }
            ControlError::ChannelClosed(_) | ControlError::FatalBootstrap(_) => {
                tracing::error!("{}", self)
            }
        }
    }
}
