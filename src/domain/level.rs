//! Monitored price levels.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::LevelwatchError;

/// Which side(s) of a level to watch, and whether the body or only a wick
/// must cross it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelDirection {
    Up,
    Down,
    Both,
    WickUp,
    WickDown,
    WickBoth,
}

impl LevelDirection {
    pub const ALL: [LevelDirection; 6] = [
        LevelDirection::Up,
        LevelDirection::Down,
        LevelDirection::Both,
        LevelDirection::WickUp,
        LevelDirection::WickDown,
        LevelDirection::WickBoth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LevelDirection::Up => "up",
            LevelDirection::Down => "down",
            LevelDirection::Both => "both",
            LevelDirection::WickUp => "wick_up",
            LevelDirection::WickDown => "wick_down",
            LevelDirection::WickBoth => "wick_both",
        }
    }

    pub fn watches_body_up(self) -> bool {
        matches!(self, LevelDirection::Up | LevelDirection::Both)
    }

    pub fn watches_body_down(self) -> bool {
        matches!(self, LevelDirection::Down | LevelDirection::Both)
    }

    pub fn watches_wick_up(self) -> bool {
        matches!(self, LevelDirection::WickUp | LevelDirection::WickBoth)
    }

    pub fn watches_wick_down(self) -> bool {
        matches!(self, LevelDirection::WickDown | LevelDirection::WickBoth)
    }
}

impl fmt::Display for LevelDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LevelDirection {
    type Err = LevelwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        LevelDirection::ALL
            .into_iter()
            .find(|d| d.as_str() == wanted)
            .ok_or_else(|| LevelwatchError::InvalidDirection {
                value: s.to_string(),
            })
    }
}

/// A persisted price level.
///
/// `direction` holds the stored text verbatim so that rows written by other
/// tools survive a round trip; use [`PriceLevel::parsed_direction`] to
/// interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub id: i64,
    pub pair: String,
    #[serde(rename = "level")]
    pub value: f64,
    pub direction: String,
    pub confirm_close: bool,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

impl PriceLevel {
    /// `None` when the stored direction is not one of the known values.
    pub fn parsed_direction(&self) -> Option<LevelDirection> {
        self.direction.parse().ok()
    }
}

/// Input for creating a level.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPriceLevel {
    pub pair: String,
    pub value: f64,
    pub direction: LevelDirection,
    pub confirm_close: bool,
}

impl NewPriceLevel {
    pub fn new(pair: &str, value: f64, direction: LevelDirection, confirm_close: bool) -> Self {
        Self {
            pair: normalize_pair(pair),
            value,
            direction,
            confirm_close,
        }
    }

    pub fn validate(&self) -> Result<(), LevelwatchError> {
        if self.pair.is_empty() {
            return Err(LevelwatchError::InvalidLevel {
                reason: "pair is required".into(),
            });
        }
        validate_value(self.value)
    }
}

/// Partial update of the mutable fields of a level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelUpdate {
    pub value: Option<f64>,
    pub direction: Option<LevelDirection>,
    pub confirm_close: Option<bool>,
}

impl LevelUpdate {
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.direction.is_none() && self.confirm_close.is_none()
    }

    pub fn validate(&self) -> Result<(), LevelwatchError> {
        match self.value {
            Some(v) => validate_value(v),
            None => Ok(()),
        }
    }

    pub fn apply(&self, level: &mut PriceLevel) {
        if let Some(v) = self.value {
            level.value = v;
        }
        if let Some(d) = self.direction {
            level.direction = d.as_str().to_string();
        }
        if let Some(c) = self.confirm_close {
            level.confirm_close = c;
        }
    }
}

/// Trim and upper-case a pair symbol, e.g. " btc/usdt " → "BTC/USDT".
pub fn normalize_pair(pair: &str) -> String {
    pair.trim().to_uppercase()
}

fn validate_value(value: f64) -> Result<(), LevelwatchError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(LevelwatchError::InvalidLevel {
            reason: format!("level must be a positive number, got {value}"),
        });
    }
    Ok(())
}
