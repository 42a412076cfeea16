//! GPIO button source.
//!
//! Two momentary buttons wired to ground with the internal pull-ups enabled:
//! - TOGGLE: GPIO 21, advance to the next image
//! - POWER: GPIO 20, hold to blank the display
//!
//! Pressing pulls the pin low, so a falling edge is a press and a rising
//! edge is a release.

use super::{Button, ButtonEdge, ButtonNormalizer, Normalizer};
use crate::control::ControlEvent;
use rppal::gpio::{Event, Gpio, InputPin, Trigger};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Default pin assignments (BCM numbering)
pub mod pins {
    pub const TOGGLE: u8 = 21; // Next image
    pub const POWER: u8 = 20;  // Blank while held
}

/// GPIO-related errors
#[derive(Error, Debug)]
pub enum GpioError {
    #[error("GPIO initialization failed: {0}")]
    InitError(#[from] rppal::gpio::Error),
}

/// Pin assignment and debounce for the two buttons
#[derive(Debug, Clone, Copy)]
pub struct ButtonPins {
    pub toggle: u8,
    pub power: u8,
    pub debounce: Duration,
}

impl Default for ButtonPins {
    fn default() -> Self {
        Self {
            toggle: pins::TOGGLE,
            power: pins::POWER,
            debounce: Duration::from_millis(10),
        }
    }
}

/// Map an interrupt trigger on a pull-up input to a button edge
fn edge_for(button: Button, trigger: Trigger) -> Option<ButtonEdge> {
    match trigger {
        Trigger::FallingEdge => Some(ButtonEdge::Pressed(button)),
        Trigger::RisingEdge => Some(ButtonEdge::Released(button)),
        _ => None,
    }
}

/// Interrupt-driven button watcher
///
/// Interrupts stay registered for as long as this value lives.
pub struct GpioButtons {
    _toggle: InputPin,
    _power: InputPin,
}

impl GpioButtons {
    /// Claim both pins and start forwarding button events
    pub fn start(pins: ButtonPins, events: mpsc::Sender<ControlEvent>) -> Result<Self, GpioError> {
        let gpio = Gpio::new()?;

        let toggle = watch_button(&gpio, pins.toggle, Button::Toggle, pins.debounce, events.clone())?;
        let power = watch_button(&gpio, pins.power, Button::Power, pins.debounce, events)?;

        tracing::info!(
            "GPIO buttons active: TOGGLE={}, POWER={}, debounce={:?}",
            pins.toggle,
            pins.power,
            pins.debounce
        );

        Ok(Self {
            _toggle: toggle,
            _power: power,
        })
    }
}

fn watch_button(
    gpio: &Gpio,
    pin: u8,
    button: Button,
    debounce: Duration,
    events: mpsc::Sender<ControlEvent>,
) -> Result<InputPin, GpioError> {
    let mut input = gpio.get(pin)?.into_input_pullup();

    // Each pin gets its own normalizer; the two buttons share no latch state.
    let mut normalizer = ButtonNormalizer::new();
    input.set_async_interrupt(Trigger::Both, Some(debounce), move |event: Event| {
        let Some(edge) = edge_for(button, event.trigger) else {
            return;
        };
        tracing::debug!("GPIO {} edge: {:?}", pin, edge);

        if let Some(control) = normalizer.normalize(&edge) {
            if events.blocking_send(control).is_err() {
                tracing::debug!("Controller gone, dropping GPIO event");
            }
        }
    })?;

    Ok(input)
}
