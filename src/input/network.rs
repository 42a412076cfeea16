//! Network control message decoding.
//!
//! One JSON text message per control intent:
//!
//! ```json
//! { "message": "LOAD_GIFS", "gifs": ["gifs/cat.gif", "gifs/dog.gif"] }
//! ```

use super::Normalizer;
use crate::control::{ControlError, ControlEvent, MediaItem};
use crate::media;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Message names accepted on the control socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireAction {
    PowerOn,
    PowerOff,
    ToggleGif,
    LoadGifs,
    NoGifs,
    Reload,
}

impl FromStr for WireAction {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "POWER_ON" => Ok(WireAction::PowerOn),
            "POWER_OFF" => Ok(WireAction::PowerOff),
            "TOGGLE_GIF" => Ok(WireAction::ToggleGif),
            "LOAD_GIFS" => Ok(WireAction::LoadGifs),
            "NO_GIFS" => Ok(WireAction::NoGifs),
            "RELOAD" => Ok(WireAction::Reload),
            other => Err(ControlError::MalformedInput(format!(
                "unknown message '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    message: Option<String>,
    #[serde(default)]
    gifs: Option<serde_json::Value>,
}

/// Decoder for the network control socket
#[derive(Debug, Default)]
pub struct NetworkNormalizer {
    media_dir: Option<PathBuf>,
}

impl NetworkNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `gifs` entries that name files in `dir` to the ids the media
    /// scan uses, so a `LOAD_GIFS` of a known file does not add it twice
    pub fn with_media_dir(mut self, dir: &Path) -> Self {
        self.media_dir = Some(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));
        self
    }

    /// Decode one text message
    pub fn decode(&self, text: &str) -> Result<ControlEvent, ControlError> {
        let wire: WireMessage = serde_json::from_str(text)
            .map_err(|e| ControlError::MalformedInput(format!("invalid JSON message: {}", e)))?;

        let name = wire
            .message
            .ok_or_else(|| ControlError::MalformedInput("missing 'message' field".to_string()))?;

        let event = match name.parse::<WireAction>()? {
            WireAction::PowerOn => ControlEvent::PowerOn,
            WireAction::PowerOff => ControlEvent::PowerOff,
            WireAction::ToggleGif => ControlEvent::Advance,
            WireAction::Reload => ControlEvent::ReloadRequested,
            WireAction::NoGifs => ControlEvent::SetReplaced(Vec::new()),
            WireAction::LoadGifs => {
                let items = parse_gifs(wire.gifs, self.media_dir.as_deref())?;
                if items.is_empty() {
                    tracing::debug!("LOAD_GIFS with an empty list, treating as NO_GIFS");
                }
                ControlEvent::SetReplaced(items)
            }
        };

        Ok(event)
    }
}

fn parse_gifs(
    gifs: Option<serde_json::Value>,
    media_dir: Option<&Path>,
) -> Result<Vec<MediaItem>, ControlError> {
    let Some(value) = gifs else {
        return Ok(Vec::new());
    };

    let serde_json::Value::Array(entries) = value else {
        return Err(ControlError::MalformedInput(
            "'gifs' must be an array of strings".to_string(),
        ));
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            serde_json::Value::String(id) => Ok(match media_dir {
                Some(dir) => media::resolve_item(dir, &id),
                None => MediaItem::new(id),
            }),
            other => Err(ControlError::MalformedInput(format!(
                "'gifs' entry is not a string: {}",
                other
            ))),
        })
        .collect()
}

impl Normalizer for NetworkNormalizer {
    type Raw = str;

    fn normalize(&mut self, raw: &str) -> Option<ControlEvent> {
        match self.decode(raw) {
            Ok(event) => Some(event),
            Err(e) => {
                e.report();
                None
            }
        }
    }
}
