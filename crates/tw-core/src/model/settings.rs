//! Presentation settings and their partial-update patch.
//!
//! The leader owns a single [`PresentationSettings`]. Admin callers send a
//! [`PresentationSettingsPatch`] in which only the fields they want to change
//! are present; [`PresentationSettingsPatch::apply`] copies exactly those.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TickerWallError;

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Rgba {
    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self { red, green, blue, alpha }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.red, self.green, self.blue, self.alpha)
    }
}

/// Parses `"r,g,b,a"`.
impl FromStr for Rgba {
    type Err = TickerWallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TickerWallError::Validation(format!("color '{s}': {e}")))?;
        match parts.as_slice() {
            [r, g, b, a] => Ok(Self::new(*r, *g, *b, *a)),
            _ => Err(TickerWallError::Validation(format!(
                "color '{s}' must have 4 components (red,green,blue,alpha)"
            ))),
        }
    }
}

/// Cluster-wide presentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationSettings {
    /// Milliseconds per scrolled pixel. Larger is slower.
    pub scroll_speed: i32,
    /// Pixel width of one ticker box on the tape.
    pub ticker_box_width: i32,
    /// Stream every trade (`true`) or once-per-second aggregates (`false`).
    pub per_tick_updates: bool,
    /// Announcement intro/outro animation length.
    pub animation_duration_ms: i32,
    pub show_logos: bool,
    pub up_color: Rgba,
    pub down_color: Rgba,
    pub font_color: Rgba,
    pub ticker_box_bg_color: Rgba,
    pub bg_color: Rgba,
}

impl Default for PresentationSettings {
    fn default() -> Self {
        Self {
            scroll_speed: 16,
            ticker_box_width: 1300,
            per_tick_updates: true,
            animation_duration_ms: 500,
            show_logos: true,
            up_color: Rgba::new(51, 255, 51, 255),
            down_color: Rgba::new(255, 51, 51, 255),
            font_color: Rgba::new(255, 255, 255, 255),
            ticker_box_bg_color: Rgba::new(20, 20, 20, 255),
            bg_color: Rgba::new(1, 1, 1, 255),
        }
    }
}

/// Same shape as [`PresentationSettings`] with every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresentationSettingsPatch {
    pub scroll_speed: Option<i32>,
    pub ticker_box_width: Option<i32>,
    pub per_tick_updates: Option<bool>,
    pub animation_duration_ms: Option<i32>,
    pub show_logos: Option<bool>,
    pub up_color: Option<Rgba>,
    pub down_color: Option<Rgba>,
    pub font_color: Option<Rgba>,
    pub ticker_box_bg_color: Option<Rgba>,
    pub bg_color: Option<Rgba>,
}

impl PresentationSettingsPatch {
    /// Overwrite each field of `settings` whose patch value is present.
    pub fn apply(&self, settings: &mut PresentationSettings) {
        if let Some(v) = self.scroll_speed {
            settings.scroll_speed = v;
        }
        if let Some(v) = self.ticker_box_width {
            settings.ticker_box_width = v;
        }
        if let Some(v) = self.per_tick_updates {
            settings.per_tick_updates = v;
        }
        if let Some(v) = self.animation_duration_ms {
            settings.animation_duration_ms = v;
        }
        if let Some(v) = self.show_logos {
            settings.show_logos = v;
        }
        if let Some(v) = self.up_color {
            settings.up_color = v;
        }
        if let Some(v) = self.down_color {
            settings.down_color = v;
        }
        if let Some(v) = self.font_color {
            settings.font_color = v;
        }
        if let Some(v) = self.ticker_box_bg_color {
            settings.ticker_box_bg_color = v;
        }
        if let Some(v) = self.bg_color {
            settings.bg_color = v;
        }
    }

    /// Reject values the layout engine or renderer cannot work with.
    pub fn validate(&self) -> Result<(), TickerWallError> {
        if matches!(self.ticker_box_width, Some(w) if w <= 0) {
            return Err(TickerWallError::Validation("ticker_box_width must be positive".into()));
        }
        if matches!(self.scroll_speed, Some(s) if s <= 0) {
            return Err(TickerWallError::Validation("scroll_speed must be positive".into()));
        }
        if matches!(self.animation_duration_ms, Some(d) if d < 0) {
            return Err(TickerWallError::Validation(
                "animation_duration_ms must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
