//! Signal events and history queries.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::LevelwatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    LevelCrossUp,
    LevelCrossDown,
    LevelWickUp,
    LevelWickDown,
    AtrSurge,
}

impl SignalKind {
    pub const ALL: [SignalKind; 5] = [
        SignalKind::LevelCrossUp,
        SignalKind::LevelCrossDown,
        SignalKind::LevelWickUp,
        SignalKind::LevelWickDown,
        SignalKind::AtrSurge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::LevelCrossUp => "level_cross_up",
            SignalKind::LevelCrossDown => "level_cross_down",
            SignalKind::LevelWickUp => "level_wick_up",
            SignalKind::LevelWickDown => "level_wick_down",
            SignalKind::AtrSurge => "atr_surge",
        }
    }

    /// Human-readable title used in notifications.
    pub fn title(self) -> &'static str {
        match self {
            SignalKind::LevelCrossUp => "Level Cross UP",
            SignalKind::LevelCrossDown => "Level Cross DOWN",
            SignalKind::LevelWickUp => "Wick UP Liquidity Sweep",
            SignalKind::LevelWickDown => "Wick DOWN Liquidity Sweep",
            SignalKind::AtrSurge => "ATR Surge",
        }
    }

    pub fn is_level_kind(self) -> bool {
        !matches!(self, SignalKind::AtrSurge)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = LevelwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        SignalKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| LevelwatchError::InvalidSignalKind {
                value: s.to_string(),
            })
    }
}

/// A signal as produced by the detector, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSignalEvent {
    pub pair: String,
    pub kind: SignalKind,
    pub level_id: Option<i64>,
    pub level_value: Option<f64>,
    pub prev_price: f64,
    pub current_price: f64,
    pub atr_value: Option<f64>,
    pub timestamp: NaiveDateTime,
}

/// A stored signal history entry. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub id: i64,
    pub pair: String,
    #[serde(rename = "signal_type")]
    pub kind: SignalKind,
    pub level_id: Option<i64>,
    #[serde(rename = "level_price")]
    pub level_value: Option<f64>,
    pub prev_price: f64,
    pub current_price: f64,
    pub atr_value: Option<f64>,
    pub timestamp: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

/// Filter for history queries. Bounds are inclusive; `limit == 0` means
/// no limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalFilter {
    pub pair: Option<String>,
    pub kind: Option<SignalKind>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub limit: usize,
    pub offset: usize,
}

/// Page bookkeeping for paginated history listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total_count: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub per_page: usize,
}

impl Pagination {
    /// Clamp `page` into `[1, total_pages]` (page 1 when there are no rows).
    pub fn new(total_count: usize, page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let total_pages = total_count.div_ceil(per_page);
        let current_page = page.max(1).min(total_pages.max(1));
        Self {
            total_count,
            total_pages,
            current_page,
            per_page,
        }
    }

    pub fn offset(&self) -> usize {
        (self.current_page - 1) * self.per_page
    }
}

/// Human-readable notification for a detected event.
///
/// `atr_prev` is only used to report the ATR change of a surge.
pub fn notification_text(event: &NewSignalEvent, timeframe: &str, atr_prev: Option<f64>) -> String {
    let details = match (event.kind, event.level_value, event.level_id) {
        (SignalKind::AtrSurge, _, _) => {
            let change = match (event.atr_value, atr_prev) {
                (Some(atr), Some(prev)) if prev != 0.0 => (atr / prev - 1.0) * 100.0,
                _ => 0.0,
            };
            format!("- ATR change: {change:.2}%")
        }
        (_, Some(level), Some(id)) => format!("- Level: {level:.6} (ID: {id})"),
        (_, Some(level), None) => format!("- Level: {level:.6}"),
        _ => "- Level: unknown".to_string(),
    };
    let atr = event
        .atr_value
        .map(|a| format!("{a:.6}"))
        .unwrap_or_else(|| "n/a".to_string());

    format!(
        "{} on {} ({})\n{}\n- ATR: {}\n- Previous price: {:.6}\n- Current price: {:.6}",
        event.kind.title(),
        event.pair,
        timeframe,
        details,
        atr,
        event.prev_price,
        event.current_price
    )
}

/// Parse a start bound: `YYYY-MM-DD` (midnight), `YYYY-MM-DD HH:MM:SS` or
/// `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_start_bound(value: &str) -> Result<NaiveDateTime, LevelwatchError> {
    parse_bound(value, NaiveTime::MIN)
}

/// Parse an end bound. A date without a time covers the whole day.
pub fn parse_end_bound(value: &str) -> Result<NaiveDateTime, LevelwatchError> {
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    parse_bound(value, end_of_day)
}

fn parse_bound(value: &str, date_only_time: NaiveTime) -> Result<NaiveDateTime, LevelwatchError> {
    let trimmed = value.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|d| d.and_time(date_only_time))
        .map_err(|_| LevelwatchError::InvalidTimestamp {
            value: value.to_string(),
        })
}
