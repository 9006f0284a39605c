//! Screens and the cluster they form.
//!
//! Screens are laid edge-to-edge, left to right in ascending `index` order,
//! on one virtual strip. A screen's *global offset* is where its left edge
//! sits on that strip.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::settings::PresentationSettings;
use crate::error::{Result, TickerWallError};

/// One physical display in the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub uuid: Uuid,
    /// Pixel width.
    pub width: i64,
    /// Pixel height.
    pub height: i64,
    /// User-assigned left-to-right position. Expected, not enforced, unique.
    pub index: i32,
}

impl Screen {
    /// Create a screen with a fresh random UUID.
    pub fn new(width: i64, height: i64, index: i32) -> Self {
        Self { uuid: Uuid::new_v4(), width, height, index }
    }
}

/// Ordered set of screens plus the active presentation settings.
///
/// `screens` is always sorted ascending by `index`; every mutator here keeps
/// it that way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenCluster {
    pub screens: Vec<Screen>,
    pub settings: PresentationSettings,
}

impl ScreenCluster {
    pub fn new(settings: PresentationSettings) -> Self {
        Self { screens: Vec::new(), settings }
    }

    /// Insert a screen at its sorted position. Equal indices keep arrival order.
    pub fn insert(&mut self, screen: Screen) {
        self.screens.push(screen);
        self.screens.sort_by_key(|s| s.index);
    }

    /// Remove the screen with this UUID.
    pub fn remove(&mut self, uuid: Uuid) -> Result<Screen> {
        let pos = self
            .screens
            .iter()
            .position(|s| s.uuid == uuid)
            .ok_or(TickerWallError::UnknownScreen(uuid))?;
        Ok(self.screens.remove(pos))
    }

    /// Replace the screen sharing `screen.uuid`, re-sorting if its index moved.
    pub fn replace(&mut self, screen: Screen) -> Result<()> {
        let slot = self
            .screens
            .iter_mut()
            .find(|s| s.uuid == screen.uuid)
            .ok_or(TickerWallError::UnknownScreen(screen.uuid))?;
        *slot = screen;
        self.screens.sort_by_key(|s| s.index);
        Ok(())
    }

    pub fn screen(&self, uuid: Uuid) -> Option<&Screen> {
        self.screens.iter().find(|s| s.uuid == uuid)
    }

    pub fn contains(&self, uuid: Uuid) -> bool {
        self.screen(uuid).is_some()
    }

    /// Sum of the widths of all screens with a smaller `index` than the named
    /// screen. `None` if the screen is not a member.
    pub fn screen_offset(&self, uuid: Uuid) -> Option<i64> {
        let own = self.screen(uuid)?;
        Some(
            self.screens
                .iter()
                .filter(|s| s.index < own.index)
                .map(|s| s.width)
                .sum(),
        )
    }

    /// Total pixel width of the whole wall.
    pub fn viewport_size(&self) -> i64 {
        self.screens.iter().map(|s| s.width).sum()
    }

    pub fn number_of_screens(&self) -> usize {
        self.screens.len()
    }
}
