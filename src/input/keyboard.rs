//! Keyboard surrogate for the hardware buttons.
//!
//! Key mapping:
//! - Space: power button (held = display blanked)
//! - Right arrow: toggle button (advance once per press)
//! - `r`: reload the media directory
//! - Ctrl-C: quit
//!
//! Terminals that cannot report key releases get press-only semantics:
//! Right advances on every press and Space toggles power.

use super::{Button, ButtonEdge, ButtonNormalizer, Latch, Normalizer};
use crate::control::{Channel, ControlEvent};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{self, disable_raw_mode, enable_raw_mode};
use std::io;
use std::thread;
use thiserror::Error;
use tokio::sync::mpsc;

/// Keyboard source errors
#[derive(Error, Debug)]
pub enum KeyboardError {
    #[error("Terminal setup failed: {0}")]
    Terminal(#[from] io::Error),
}

/// Maps key events to control events
#[derive(Debug)]
pub struct KeyboardNormalizer {
    buttons: ButtonNormalizer,
    release_reporting: bool,
}

impl KeyboardNormalizer {
    pub fn new(release_reporting: bool) -> Self {
        Self {
            buttons: ButtonNormalizer::new(),
            release_reporting,
        }
    }

    fn edge(&mut self, edge: ButtonEdge) -> Option<ControlEvent> {
        self.buttons.normalize(&edge)
    }
}

impl Normalizer for KeyboardNormalizer {
    type Raw = KeyEvent;

    fn normalize(&mut self, key: &KeyEvent) -> Option<ControlEvent> {
        match (key.code, key.kind) {
            (_, KeyEventKind::Repeat) => None,
            (KeyCode::Right, KeyEventKind::Press) => {
                let event = self.edge(ButtonEdge::Pressed(Button::Toggle));
                if !self.release_reporting {
                    self.edge(ButtonEdge::Released(Button::Toggle));
                }
                event
            }
            (KeyCode::Right, KeyEventKind::Release) => {
                self.edge(ButtonEdge::Released(Button::Toggle))
            }
            (KeyCode::Char(' '), KeyEventKind::Press) => {
                if self.release_reporting || self.buttons.power_latch() == Latch::Armed {
                    self.edge(ButtonEdge::Pressed(Button::Power))
                } else {
                    self.edge(ButtonEdge::Released(Button::Power))
                }
            }
            (KeyCode::Char(' '), KeyEventKind::Release) => {
                self.edge(ButtonEdge::Released(Button::Power))
            }
            (KeyCode::Char('r') | KeyCode::Char('R'), KeyEventKind::Press) => {
                Some(ControlEvent::ReloadRequested)
            }
            _ => None,
        }
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Raw-mode terminal reader
///
/// Restores the terminal when dropped.
pub struct KeyboardSource {
    enhanced: bool,
}

impl KeyboardSource {
    /// Put the terminal in raw mode and start the reader thread
    ///
    /// Raw mode swallows Ctrl-C, so the reader forwards it on `quit`.
    pub fn start(
        events: mpsc::Sender<ControlEvent>,
        quit: mpsc::Sender<()>,
    ) -> Result<Self, KeyboardError> {
        enable_raw_mode()?;
        // From here on, dropping `source` restores the terminal
        let mut source = Self { enhanced: false };

        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            source.enhanced = true;
        } else {
            tracing::info!("Terminal does not report key releases, using press-only keys");
        }

        let mut normalizer = KeyboardNormalizer::new(source.enhanced);
        thread::spawn(move || {
            loop {
                match event::read() {
                    Ok(Event::Key(key)) if is_quit(&key) => {
                        let _ = quit.blocking_send(());
                        break;
                    }
                    Ok(Event::Key(key)) => {
                        if let Some(control) = normalizer.normalize(&key) {
                            if events.blocking_send(control).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("Keyboard read failed: {}", e);
                        let _ = events.blocking_send(ControlEvent::ChannelClosed(Channel::Keyboard));
                        break;
                    }
                }
            }
        });

        tracing::info!("Keyboard controls active: space = power, right = next, r = reload");
        Ok(source)
    }
}

impl Drop for KeyboardSource {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        let _ = disable_raw_mode();
        tracing::debug!("Terminal restored");
    }
}
