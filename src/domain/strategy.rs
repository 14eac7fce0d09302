//! ATR + price-level signal strategy.
//!
//! Host-agnostic: builds a [`SignalFrame`] from candles and a level
//! snapshot, then marks entry and exit rows. Persistence and notification
//! belong to the caller.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::candle::Candle;
use crate::domain::detector::{annotate, LevelFlags};
use crate::domain::error::LevelwatchError;
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::level::PriceLevel;
use crate::ports::config_port::ConfigPort;

/// How the host is running the strategy. Level checks only happen when
/// trading against live data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Live,
    DryRun,
    Backtest,
}

impl RunMode {
    pub fn is_live_data(self) -> bool {
        matches!(self, RunMode::Live | RunMode::DryRun)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunMode::Live => "live",
            RunMode::DryRun => "dry_run",
            RunMode::Backtest => "backtest",
        };
        f.write_str(s)
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(RunMode::Live),
            "dry_run" | "dry-run" => Ok(RunMode::DryRun),
            "backtest" => Ok(RunMode::Backtest),
            other => Err(format!("unknown run mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub timeframe: String,
    pub atr_period: usize,
    pub atr_threshold: f64,
    pub check_level_crossing: bool,
    pub run_mode: RunMode,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            timeframe: "15m".into(),
            atr_period: 14,
            atr_threshold: 1.5,
            check_level_crossing: true,
            run_mode: RunMode::DryRun,
        }
    }
}

impl StrategyConfig {
    /// Read the `[strategy]` section, falling back to defaults for absent
    /// keys, and validate the result.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LevelwatchError> {
        let defaults = Self::default();

        let atr_period = config.get_int("strategy", "atr_period", defaults.atr_period as i64);
        if atr_period <= 0 {
            return Err(invalid("atr_period", "must be positive"));
        }

        let run_mode = match config.get_string("strategy", "run_mode") {
            Some(raw) => raw.parse().map_err(|reason: String| invalid("run_mode", &reason))?,
            None => defaults.run_mode,
        };

        let cfg = Self {
            timeframe: config
                .get_string("strategy", "timeframe")
                .unwrap_or(defaults.timeframe),
            atr_period: atr_period as usize,
            atr_threshold: config.get_double("strategy", "atr_threshold", defaults.atr_threshold),
            check_level_crossing: config.get_bool(
                "strategy",
                "check_level_crossing",
                defaults.check_level_crossing,
            ),
            run_mode,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), LevelwatchError> {
        if self.atr_period == 0 {
            return Err(invalid("atr_period", "must be positive"));
        }
        if !self.atr_threshold.is_finite() || self.atr_threshold <= 0.0 {
            return Err(invalid("atr_threshold", "must be a positive number"));
        }
        if self.timeframe.trim().is_empty() {
            return Err(invalid("timeframe", "must not be empty"));
        }
        Ok(())
    }

    /// Level crossing is evaluated for this configuration.
    pub fn levels_enabled(&self) -> bool {
        self.check_level_crossing && self.run_mode.is_live_data()
    }
}

fn invalid(key: &str, reason: &str) -> LevelwatchError {
    LevelwatchError::ConfigInvalid {
        section: "strategy".into(),
        key: key.into(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRow {
    pub candle: Candle,
    pub atr: Option<f64>,
    pub atr_prev: Option<f64>,
    pub close_prev: Option<f64>,
    pub flags: LevelFlags,
    pub enter_long: bool,
    pub exit_long: bool,
}

/// Candles plus derived columns, one row per candle.
#[derive(Debug, Clone)]
pub struct SignalFrame {
    pub pair: String,
    pub rows: Vec<FrameRow>,
    pub atr: IndicatorSeries,
}

impl SignalFrame {
    pub fn last(&self) -> Option<&FrameRow> {
        self.rows.last()
    }

    pub fn candles(&self) -> Vec<Candle> {
        self.rows.iter().map(|r| r.candle.clone()).collect()
    }
}

/// ATR, previous ATR, previous close and (when enabled) level flags.
pub fn populate_indicators(
    pair: &str,
    candles: &[Candle],
    levels: &[PriceLevel],
    config: &StrategyConfig,
) -> SignalFrame {
    let atr = calculate_atr(candles, config.atr_period);
    let flags = if config.levels_enabled() {
        annotate(candles, levels)
    } else {
        vec![LevelFlags::default(); candles.len()]
    };

    let rows = candles
        .iter()
        .zip(flags)
        .enumerate()
        .map(|(i, (candle, flags))| FrameRow {
            candle: candle.clone(),
            atr: atr.value_at(i),
            atr_prev: i.checked_sub(1).and_then(|p| atr.value_at(p)),
            close_prev: i.checked_sub(1).map(|p| candles[p].close),
            flags,
            enter_long: false,
            exit_long: false,
        })
        .collect();

    SignalFrame {
        pair: pair.to_string(),
        rows,
        atr,
    }
}

/// Enter on an ATR surge, an upward cross, or a wick sweep in either
/// direction.
pub fn populate_entry_trend(frame: &mut SignalFrame, config: &StrategyConfig) {
    for row in &mut frame.rows {
        let atr_increase = match (row.atr, row.atr_prev) {
            (Some(atr), Some(prev)) => atr > prev * config.atr_threshold,
            _ => false,
        };
        let level_entry = config.check_level_crossing
            && (row.flags.level_cross_up || row.flags.level_wick_up || row.flags.level_wick_down);
        row.enter_long = atr_increase || level_entry;
    }
}

/// Exit on a downward cross.
pub fn populate_exit_trend(frame: &mut SignalFrame, config: &StrategyConfig) {
    for row in &mut frame.rows {
        row.exit_long = config.check_level_crossing && row.flags.level_cross_down;
    }
}
