//! Strategy host adapter: runs the ATR/level strategy on each candle close.
//!
//! Holds the persistence and notification ports explicitly. The level set is
//! snapshotted once per invocation, so edits made while a candle is being
//! evaluated take effect on the next one.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::candle::Candle;
use crate::domain::detector::{detect, detect_atr_surge};
use crate::domain::level::PriceLevel;
use crate::domain::signal::{notification_text, NewSignalEvent, SignalEvent};
use crate::domain::strategy::{self, SignalFrame, StrategyConfig};
use crate::ports::level_port::LevelPort;
use crate::ports::notify_port::NotifyPort;
use crate::ports::signal_port::SignalPort;
use crate::ports::strategy_port::StrategyPort;

/// Result of evaluating one closed candle.
#[derive(Debug, Clone)]
pub struct CandleCloseOutcome {
    pub frame: SignalFrame,
    /// Events detected on the last candle, level events first.
    pub events: Vec<NewSignalEvent>,
    /// Events that were written to the history.
    pub recorded: Vec<SignalEvent>,
}

pub struct LevelSignalStrategy {
    levels: Arc<dyn LevelPort + Send + Sync>,
    signals: Arc<dyn SignalPort + Send + Sync>,
    notifier: Arc<dyn NotifyPort + Send + Sync>,
    config: StrategyConfig,
}

impl LevelSignalStrategy {
    pub fn new(
        levels: Arc<dyn LevelPort + Send + Sync>,
        signals: Arc<dyn SignalPort + Send + Sync>,
        notifier: Arc<dyn NotifyPort + Send + Sync>,
        config: StrategyConfig,
    ) -> Self {
        Self {
            levels,
            signals,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn snapshot_levels(&self, pair: &str) -> Vec<PriceLevel> {
        if !self.config.levels_enabled() {
            return Vec::new();
        }
        match self.levels.list_active_levels(Some(pair)) {
            Ok(levels) => {
                debug!(pair, count = levels.len(), "loaded active levels");
                levels
            }
            Err(e) => {
                error!(pair, error = %e, "failed to load price levels, continuing without them");
                Vec::new()
            }
        }
    }

    /// Run all callbacks for the newest candle, then record and notify every
    /// event found on it when running against live data.
    pub fn on_candle_close(&self, pair: &str, candles: &[Candle]) -> CandleCloseOutcome {
        let levels = self.snapshot_levels(pair);
        let mut frame = strategy::populate_indicators(pair, candles, &levels, &self.config);
        self.populate_entry_trend(&mut frame);
        self.populate_exit_trend(&mut frame);

        if !self.config.run_mode.is_live_data() {
            return CandleCloseOutcome {
                frame,
                events: Vec::new(),
                recorded: Vec::new(),
            };
        }

        let atr_now = frame.atr.last_value();
        let atr_prev = candles
            .len()
            .checked_sub(2)
            .and_then(|i| frame.atr.value_at(i));

        let mut events = detect(candles, &levels);
        for event in &mut events {
            event.atr_value = atr_now;
        }
        if let Some(surge) =
            detect_atr_surge(pair, candles, &frame.atr, self.config.atr_threshold)
        {
            events.push(surge);
        }

        let mut recorded = Vec::with_capacity(events.len());
        for event in &events {
            match self.signals.append_signal(event) {
                Ok(stored) => recorded.push(stored),
                Err(e) => error!(pair, kind = %event.kind, error = %e, "failed to record signal"),
            }

            let message = notification_text(event, &self.config.timeframe, atr_prev);
            if let Err(e) = self.notifier.send_message(&message) {
                warn!(pair, kind = %event.kind, error = %e, "failed to send notification");
            }
        }

        if !events.is_empty() {
            info!(
                pair,
                detected = events.len(),
                recorded = recorded.len(),
                "signals on candle close"
            );
        }

        CandleCloseOutcome {
            frame,
            events,
            recorded,
        }
    }
}

impl StrategyPort for LevelSignalStrategy {
    fn populate_indicators(&self, pair: &str, candles: &[Candle]) -> SignalFrame {
        let levels = self.snapshot_levels(pair);
        strategy::populate_indicators(pair, candles, &levels, &self.config)
    }

    fn populate_entry_trend(&self, frame: &mut SignalFrame) {
        strategy::populate_entry_trend(frame, &self.config);
    }

    fn populate_exit_trend(&self, frame: &mut SignalFrame) {
        strategy::populate_exit_trend(frame, &self.config);
    }
}
