//! Announcements: short messages shown across the whole wall.
//!
//! An announcement is visible during `[show_at, show_at + lifespan + animation)`.
//! The leader never retracts one; followers drop it once that window closes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TickerWallError;

/// Color scheme of an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementKind {
    #[default]
    Info,
    Danger,
    Success,
}

/// Intro/outro easing of an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementAnimation {
    #[default]
    Elastic,
    Bounce,
    Ease,
    Back,
}

/// Unknown names fall back to [`AnnouncementKind::Info`].
impl FromStr for AnnouncementKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "danger" => Self::Danger,
            "success" => Self::Success,
            _ => Self::Info,
        })
    }
}

/// Unknown names fall back to [`AnnouncementAnimation::Elastic`].
impl FromStr for AnnouncementAnimation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "bounce" => Self::Bounce,
            "ease" => Self::Ease,
            "back" => Self::Back,
            _ => Self::Elastic,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub message: String,
    #[serde(default)]
    pub kind: AnnouncementKind,
    #[serde(default)]
    pub animation: AnnouncementAnimation,
    /// Set by the leader; any value sent by a caller is overwritten.
    #[serde(default)]
    pub show_at_timestamp_ms: i64,
    pub lifespan_ms: i64,
}

impl Announcement {
    pub fn new(message: impl Into<String>, lifespan_ms: i64) -> Self {
        Self {
            message: message.into(),
            kind: AnnouncementKind::default(),
            animation: AnnouncementAnimation::default(),
            show_at_timestamp_ms: 0,
            lifespan_ms,
        }
    }

    /// Exclusive end of the visible window.
    pub fn ends_at_ms(&self, animation_duration_ms: i64) -> i64 {
        self.show_at_timestamp_ms + self.lifespan_ms + animation_duration_ms
    }

    pub fn is_renderable(&self, now_ms: i64, animation_duration_ms: i64) -> bool {
        now_ms >= self.show_at_timestamp_ms && now_ms < self.ends_at_ms(animation_duration_ms)
    }

    pub fn is_expired(&self, now_ms: i64, animation_duration_ms: i64) -> bool {
        now_ms >= self.ends_at_ms(animation_duration_ms)
    }

    pub fn validate(&self) -> Result<(), TickerWallError> {
        if self.message.trim().is_empty() {
            return Err(TickerWallError::Validation("announcement message is empty".into()));
        }
        if self.lifespan_ms <= 0 {
            return Err(TickerWallError::Validation("lifespan_ms must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_window_is_half_open() {
        let t0 = 1_000_000;
        let a = Announcement { show_at_timestamp_ms: t0, ..Announcement::new("hi", 2000) };

        assert!(!a.is_renderable(t0 - 1, 500));
        assert!(a.is_renderable(t0, 500));
        assert!(a.is_renderable(t0 + 2499, 500));
        assert!(!a.is_renderable(t0 + 2500, 500));

        assert!(!a.is_expired(t0 + 2499, 500));
        assert!(a.is_expired(t0 + 2500, 500));
    }

    #[test]
    fn parse_names() {
        assert_eq!("danger".parse::<AnnouncementKind>().unwrap(), AnnouncementKind::Danger);
        assert_eq!("wat".parse::<AnnouncementKind>().unwrap(), AnnouncementKind::Info);
        assert_eq!("Back".parse::<AnnouncementAnimation>().unwrap(), AnnouncementAnimation::Back);
        assert_eq!("".parse::<AnnouncementAnimation>().unwrap(), AnnouncementAnimation::Elastic);
    }

    #[test]
    fn json_defaults() {
        let a: Announcement =
            serde_json::from_str(r#"{"message":"Market closes in 5","lifespan_ms":3000}"#).unwrap();
        assert_eq!(a.kind, AnnouncementKind::Info);
        assert_eq!(a.animation, AnnouncementAnimation::Elastic);
        assert!(a.validate().is_ok());
        assert!(Announcement::new("  ", 10).validate().is_err());
        assert!(Announcement::new("x", 0).validate().is_err());
    }
}
