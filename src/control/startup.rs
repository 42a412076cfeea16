//! Control channel bookkeeping during startup.

use super::{Channel, ControlError, ControlEvent};

/// Which control channels came up at startup
#[derive(Debug, Default)]
pub struct ChannelTally {
    up: usize,
    failed: Vec<Channel>,
}

impl ChannelTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn up(&mut self) {
        self.up += 1;
    }

    pub fn failed(&mut self, channel: Channel) {
        if !self.failed.contains(&channel) {
            self.failed.push(channel);
        }
    }

    /// Events announcing the failed channels
    ///
    /// With no channel up there is nothing left to control the frame with,
    /// which is fatal.
    pub fn finish(self) -> Result<Vec<ControlEvent>, ControlError> {
        if self.up == 0 {
            return Err(ControlError::FatalBootstrap(
                "no control channel could be established".to_string(),
            ));
        }

        Ok(self.failed.into_iter().map(ControlEvent::ChannelClosed).collect())
    }
}
