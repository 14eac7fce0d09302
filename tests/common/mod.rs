#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use levelwatch::domain::candle::Candle;
use levelwatch::domain::error::LevelwatchError;
use levelwatch::domain::level::{normalize_pair, LevelUpdate, NewPriceLevel, PriceLevel};
use levelwatch::domain::signal::{NewSignalEvent, SignalEvent, SignalFilter};
use levelwatch::ports::level_port::LevelPort;
use levelwatch::ports::signal_port::SignalPort;
use std::sync::Mutex;

pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Candle `i` in a 15 minute series.
pub fn candle(i: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        timestamp: base_time() + Duration::minutes(15 * i),
        open,
        high,
        low,
        close,
        volume: 1.0,
    }
}

/// Two-candle series `[previous, current]`.
pub fn pair_of(previous: (f64, f64, f64, f64), current: (f64, f64, f64, f64)) -> Vec<Candle> {
    vec![
        candle(0, previous.0, previous.1, previous.2, previous.3),
        candle(1, current.0, current.1, current.2, current.3),
    ]
}

pub fn level(id: i64, value: f64, direction: &str, confirm_close: bool) -> PriceLevel {
    PriceLevel {
        id,
        pair: "BTC/USDT".into(),
        value,
        direction: direction.into(),
        confirm_close,
        active: true,
        created_at: base_time(),
    }
}

/// In-memory level and signal store with the same contract as the SQLite
/// store.
#[derive(Default)]
pub struct MemoryStore {
    pub levels: Mutex<Vec<PriceLevel>>,
    pub signals: Mutex<Vec<SignalEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_levels(levels: Vec<PriceLevel>) -> Self {
        Self {
            levels: Mutex::new(levels),
            signals: Mutex::new(Vec::new()),
        }
    }

    fn matches(filter: &SignalFilter, s: &SignalEvent) -> bool {
        filter
            .pair
            .as_ref()
            .is_none_or(|p| normalize_pair(p) == s.pair)
            && filter.kind.is_none_or(|k| k == s.kind)
            && filter.start.is_none_or(|start| s.timestamp >= start)
            && filter.end.is_none_or(|end| s.timestamp <= end)
    }
}

impl LevelPort for MemoryStore {
    fn list_active_levels(&self, pair: Option<&str>) -> Result<Vec<PriceLevel>, LevelwatchError> {
        let wanted = pair.map(normalize_pair);
        Ok(self
            .levels
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.active && wanted.as_ref().is_none_or(|p| *p == l.pair))
            .cloned()
            .collect())
    }

    fn get_level(&self, id: i64) -> Result<Option<PriceLevel>, LevelwatchError> {
        Ok(self.levels.lock().unwrap().iter().find(|l| l.id == id).cloned())
    }

    fn add_level(&self, level: &NewPriceLevel) -> Result<PriceLevel, LevelwatchError> {
        level.validate()?;
        let mut levels = self.levels.lock().unwrap();
        let stored = PriceLevel {
            id: levels.iter().map(|l| l.id).max().unwrap_or(0) + 1,
            pair: level.pair.clone(),
            value: level.value,
            direction: level.direction.as_str().to_string(),
            confirm_close: level.confirm_close,
            active: true,
            created_at: base_time(),
        };
        levels.push(stored.clone());
        Ok(stored)
    }

    fn update_level(&self, id: i64, update: &LevelUpdate) -> Result<PriceLevel, LevelwatchError> {
        update.validate()?;
        let mut levels = self.levels.lock().unwrap();
        let level = levels
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(LevelwatchError::LevelNotFound { id })?;
        update.apply(level);
        Ok(level.clone())
    }

    fn deactivate_level(&self, id: i64) -> Result<(), LevelwatchError> {
        let mut levels = self.levels.lock().unwrap();
        let level = levels
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(LevelwatchError::LevelNotFound { id })?;
        level.active = false;
        Ok(())
    }
}

impl SignalPort for MemoryStore {
    fn append_signal(&self, event: &NewSignalEvent) -> Result<SignalEvent, LevelwatchError> {
        if let Some(id) = event.level_id {
            if !self.levels.lock().unwrap().iter().any(|l| l.id == id) {
                return Err(LevelwatchError::LevelNotFound { id });
            }
        }
        let mut signals = self.signals.lock().unwrap();
        let stored = SignalEvent {
            id: signals.len() as i64 + 1,
            pair: normalize_pair(&event.pair),
            kind: event.kind,
            level_id: event.level_id,
            level_value: event.level_value,
            prev_price: event.prev_price,
            current_price: event.current_price,
            atr_value: event.atr_value,
            timestamp: event.timestamp,
            created_at: Utc::now().naive_utc(),
        };
        signals.push(stored.clone());
        Ok(stored)
    }

    fn list_signals(&self, filter: &SignalFilter) -> Result<Vec<SignalEvent>, LevelwatchError> {
        let mut rows: Vec<SignalEvent> = self
            .signals
            .lock()
            .unwrap()
            .iter()
            .filter(|s| Self::matches(filter, s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        let limit = if filter.limit == 0 { usize::MAX } else { filter.limit };
        Ok(rows.into_iter().skip(filter.offset).take(limit).collect())
    }

    fn count_signals(&self, filter: &SignalFilter) -> Result<usize, LevelwatchError> {
        Ok(self
            .signals
            .lock()
            .unwrap()
            .iter()
            .filter(|s| Self::matches(filter, s))
            .count())
    }
}
