//! Level-cross detection.
//!
//! Compares the last two candles of a series against a snapshot of price
//! levels. Only the most recent candle is ever evaluated.
//!
//! # Crossing rules (level value `V`)
//!
//! - Body up (`up`/`both`): `prev.close < V` and the current close is above
//!   `V` (with `confirm_close`) or either the open or close is above `V`.
//! - Body down (`down`/`both`): mirror image of body up.
//! - Wick up (`wick_up`/`wick_both`): `prev.high < V < cur.high` while both
//!   `cur.open` and `cur.close` stay below `V`.
//! - Wick down (`wick_down`/`wick_both`): mirror image of wick up.
//!
//! Each level reports at most one kind per candle, checked in the order
//! cross up, cross down, wick up, wick down. Levels are independent of each
//! other.

use serde::Serialize;
use tracing::debug;

use crate::domain::candle::Candle;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::level::PriceLevel;
use crate::domain::signal::{NewSignalEvent, SignalKind};

/// Crossing annotations for a single candle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelFlags {
    pub level_cross_up: bool,
    pub level_cross_down: bool,
    pub level_wick_up: bool,
    pub level_wick_down: bool,
    pub level_id: Option<i64>,
    pub level_value: Option<f64>,
}

impl LevelFlags {
    pub fn any(&self) -> bool {
        self.level_cross_up || self.level_cross_down || self.level_wick_up || self.level_wick_down
    }

    fn set(&mut self, kind: SignalKind) {
        match kind {
            SignalKind::LevelCrossUp => self.level_cross_up = true,
            SignalKind::LevelCrossDown => self.level_cross_down = true,
            SignalKind::LevelWickUp => self.level_wick_up = true,
            SignalKind::LevelWickDown => self.level_wick_down = true,
            SignalKind::AtrSurge => {}
        }
    }
}

/// The first matching kind for one level on one candle pair.
pub fn evaluate_level(previous: &Candle, current: &Candle, level: &PriceLevel) -> Option<SignalKind> {
    let Some(direction) = level.parsed_direction() else {
        debug!(
            level_id = level.id,
            direction = %level.direction,
            "ignoring level with unknown direction"
        );
        return None;
    };
    let v = level.value;

    if direction.watches_body_up() && previous.close < v {
        let crossed = if level.confirm_close {
            current.close > v
        } else {
            current.open > v || current.close > v
        };
        if crossed {
            return Some(SignalKind::LevelCrossUp);
        }
    }

    if direction.watches_body_down() && previous.close > v {
        let crossed = if level.confirm_close {
            current.close < v
        } else {
            current.open < v || current.close < v
        };
        if crossed {
            return Some(SignalKind::LevelCrossDown);
        }
    }

    if direction.watches_wick_up()
        && previous.high < v
        && current.high > v
        && current.open < v
        && current.close < v
    {
        return Some(SignalKind::LevelWickUp);
    }

    if direction.watches_wick_down()
        && previous.low > v
        && current.low < v
        && current.open > v
        && current.close > v
    {
        return Some(SignalKind::LevelWickDown);
    }

    None
}

/// Evaluate every level against the last candle.
///
/// Returns one event per firing level, ordered by kind priority and then by
/// the order of `levels`. Returns nothing when there are fewer than two
/// candles, when either of the last two candles is malformed, or when
/// `levels` is empty.
pub fn detect(candles: &[Candle], levels: &[PriceLevel]) -> Vec<NewSignalEvent> {
    if levels.is_empty() || candles.len() < 2 {
        return Vec::new();
    }

    let current = &candles[candles.len() - 1];
    let previous = &candles[candles.len() - 2];

    if !current.is_well_formed() || !previous.is_well_formed() {
        debug!(timestamp = %current.timestamp, "skipping malformed candle");
        return Vec::new();
    }

    let mut events: Vec<NewSignalEvent> = levels
        .iter()
        .filter_map(|level| {
            let kind = evaluate_level(previous, current, level)?;
            debug!(
                pair = %level.pair,
                level_id = level.id,
                level = level.value,
                kind = %kind,
                "level crossed"
            );
            Some(NewSignalEvent {
                pair: level.pair.clone(),
                kind,
                level_id: Some(level.id),
                level_value: Some(level.value),
                prev_price: previous.close,
                current_price: current.close,
                atr_value: None,
                timestamp: current.timestamp,
            })
        })
        .collect();

    // stable: ties keep level order
    events.sort_by_key(|e| e.kind);
    events
}

/// Per-candle flags for the whole series; only the last entry can be set.
///
/// `level_id`/`level_value` on the last entry name the first event in
/// priority order.
pub fn annotate(candles: &[Candle], levels: &[PriceLevel]) -> Vec<LevelFlags> {
    let mut flags = vec![LevelFlags::default(); candles.len()];
    let events = detect(candles, levels);

    if let (Some(last), Some(first)) = (flags.last_mut(), events.first()) {
        for event in &events {
            last.set(event.kind);
        }
        last.level_id = first.level_id;
        last.level_value = first.level_value;
    }

    flags
}

/// ATR surge on the last candle: `atr[last] > atr[last-1] * threshold`.
pub fn detect_atr_surge(
    pair: &str,
    candles: &[Candle],
    atr: &IndicatorSeries,
    threshold: f64,
) -> Option<NewSignalEvent> {
    if candles.len() < 2 {
        return None;
    }
    let last = candles.len() - 1;
    let current = &candles[last];
    let previous = &candles[last - 1];
    if !current.is_well_formed() || !previous.is_well_formed() {
        return None;
    }

    let atr_now = atr.value_at(last)?;
    let atr_prev = atr.value_at(last - 1)?;

    if atr_now > atr_prev * threshold {
        debug!(pair, atr_now, atr_prev, threshold, "atr surge");
        Some(NewSignalEvent {
            pair: pair.to_string(),
            kind: SignalKind::AtrSurge,
            level_id: None,
            level_value: None,
            prev_price: previous.close,
            current_price: current.close,
            atr_value: Some(atr_now),
            timestamp: current.timestamp,
        })
    } else {
        None
    }
}
