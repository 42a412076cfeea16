//! Control event normalization.
//!
//! Each input source owns its decode logic and turns raw signals into at most
//! one [`ControlEvent`]. Nothing past this boundary sees source-specific
//! payloads.
//!
//! Press-and-hold debouncing also lives here: a [`PressLatch`] lets one press
//! through and stays disarmed until the matching release re-arms it.

pub mod gpio;
pub mod keyboard;
pub mod network;

pub use gpio::{ButtonPins, GpioButtons};
pub use keyboard::KeyboardSource;
pub use network::NetworkNormalizer;

use crate::control::ControlEvent;
use serde::{Deserialize, Serialize};

/// Translate a source-specific signal into a normalized event
pub trait Normalizer {
    type Raw: ?Sized;

    /// Returns `None` for signals that carry no intent, and for malformed
    /// ones after logging them.
    fn normalize(&mut self, raw: &Self::Raw) -> Option<ControlEvent>;
}

/// Which button source feeds the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    /// GPIO on ARM boards, keyboard elsewhere
    #[default]
    Auto,
    Keyboard,
    Gpio,
    None,
}

impl InputSource {
    /// Resolve `Auto` for the architecture we are running on
    pub fn resolve(self) -> Self {
        let arch = std::env::consts::ARCH;
        match self {
            InputSource::Auto if arch == "arm" || arch == "aarch64" => InputSource::Gpio,
            InputSource::Auto => InputSource::Keyboard,
            other => other,
        }
    }
}

/// Debounce sub-state of one button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latch {
    Armed,
    Disarmed,
}

/// Collapses a press-and-hold into one press
#[derive(Debug, Clone, Copy)]
pub struct PressLatch {
    state: Latch,
}

impl PressLatch {
    pub fn new() -> Self {
        Self { state: Latch::Armed }
    }

    pub fn state(&self) -> Latch {
        self.state
    }

    /// Returns true if this press should take effect
    pub fn press(&mut self) -> bool {
        match self.state {
            Latch::Armed => {
                self.state = Latch::Disarmed;
                true
            }
            Latch::Disarmed => false,
        }
    }

    /// Re-arm; returns true if a press was outstanding
    pub fn release(&mut self) -> bool {
        match self.state {
            Latch::Disarmed => {
                self.state = Latch::Armed;
                true
            }
            Latch::Armed => false,
        }
    }
}

impl Default for PressLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Physical (or surrogate) button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Advance to the next image
    Toggle,
    /// Hold to blank the display
    Power,
}

/// Debounced button edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    Pressed(Button),
    Released(Button),
}

/// Shared button semantics for the keyboard and GPIO sources
///
/// Toggle: press advances once, release re-arms.
/// Power: press blanks the display, release turns it back on.
#[derive(Debug, Default)]
pub struct ButtonNormalizer {
    toggle: PressLatch,
    power: PressLatch,
}

impl ButtonNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power_latch(&self) -> Latch {
        self.power.state()
    }
}

impl Normalizer for ButtonNormalizer {
    type Raw = ButtonEdge;

    fn normalize(&mut self, raw: &ButtonEdge) -> Option<ControlEvent> {
        match *raw {
            ButtonEdge::Pressed(Button::Toggle) => {
                self.toggle.press().then_some(ControlEvent::Advance)
            }
            ButtonEdge::Released(Button::Toggle) => {
                self.toggle.release();
                None
            }
            ButtonEdge::Pressed(Button::Power) => {
                self.power.press().then_some(ControlEvent::PowerOff)
            }
            ButtonEdge::Released(Button::Power) => {
                self.power.release().then_some(ControlEvent::PowerOn)
            }
        }
    }
}
