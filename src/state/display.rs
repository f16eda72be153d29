/// Per-event display settings
///
/// This struct stores how an event's wall looks and rotates.
/// It is serialized to JSON and stored in the event row, so settings
/// edited from the moderation side reach every open display.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::color::Rgba;
use crate::error::{Error, Result};

/// Largest grid side length a display accepts (8x8 = 64 slots)
pub const MAX_GRID_COLUMNS: u32 = 8;

/// Cross-fade style used when a slot changes content
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    #[default]
    Fade,
    Slide,
    Zoom,
}

impl std::str::FromStr for Transition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fade" => Ok(Transition::Fade),
            "slide" => Ok(Transition::Slide),
            "zoom" => Ok(Transition::Zoom),
            other => Err(Error::InvalidConfig(format!("unknown transition: {other}"))),
        }
    }
}

/// All display settings for an event wall
///
/// Only `grid_columns` and `swap_interval` affect rotation; the rest
/// are rendering hints passed through to the wall.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayConfig {
    /// Grid side length; the wall shows `grid_columns²` slots
    pub grid_columns: u32,

    /// Seconds between scheduled swaps (>= 1)
    pub swap_interval: u64,

    /// Rendering hint for slot changes. Stored and validated; the iced wall
    /// swaps images without animation whatever its value.
    pub transition: Transition,

    /// CSS color behind the grid
    pub background_color: String,

    /// Show the attendee's name under their selfie
    pub show_names: bool,

    /// Show the attendee's message under their name
    pub show_messages: bool,

    /// Caption overlay opacity (0.0 to 1.0)
    pub overlay_opacity: f32,

    /// CSS color of each frame's border
    pub frame_border_color: String,

    /// Border width in logical pixels
    pub frame_border_width: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            grid_columns: 3,
            swap_interval: 6,
            transition: Transition::Fade,
            background_color: "#000000".to_string(),
            show_names: false,
            show_messages: false,
            overlay_opacity: 0.8,
            frame_border_color: "rgba(255,255,255,0.1)".to_string(),
            frame_border_width: 2.0,
        }
    }
}

impl DisplayConfig {
    /// Number of slots on the wall
    pub fn slot_count(&self) -> usize {
        let columns = self.grid_columns as usize;
        columns * columns
    }

    /// Time between two scheduled swap ticks
    pub fn swap_period(&self) -> Duration {
        Duration::from_secs(self.swap_interval.max(1))
    }

    pub fn background(&self) -> Rgba {
        Rgba::parse(&self.background_color).unwrap_or(Rgba::BLACK)
    }

    pub fn border(&self) -> Rgba {
        Rgba::parse(&self.frame_border_color).unwrap_or(Rgba { r: 1.0, g: 1.0, b: 1.0, a: 0.1 })
    }

    /// Check the settings a display relies on
    pub fn validate(&self) -> Result<()> {
        if self.grid_columns == 0 || self.grid_columns > MAX_GRID_COLUMNS {
            return Err(Error::InvalidConfig(format!(
                "gridColumns must be between 1 and {}, got {}",
                MAX_GRID_COLUMNS, self.grid_columns
            )));
        }
        if self.swap_interval == 0 {
            return Err(Error::InvalidConfig("swapInterval must be at least 1 second".into()));
        }
        if !(0.0..=1.0).contains(&self.overlay_opacity) {
            return Err(Error::InvalidConfig(format!(
                "overlayOpacity must be between 0 and 1, got {}",
                self.overlay_opacity
            )));
        }
        if !self.frame_border_width.is_finite() || self.frame_border_width < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "frameBorderWidth must be non-negative, got {}",
                self.frame_border_width
            )));
        }
        for (field, value) in [
            ("backgroundColor", &self.background_color),
            ("frameBorderColor", &self.frame_border_color),
        ] {
            if Rgba::parse(value).is_none() {
                return Err(Error::InvalidConfig(format!("{field} is not a color: {value}")));
            }
        }
        Ok(())
    }

    /// Convert to JSON string for database storage
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string (from database)
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
