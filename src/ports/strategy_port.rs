//! Host strategy callback port trait.
//!
//! The shape a candle-producing host expects from a strategy plugin: build
//! indicator columns, then mark entry and exit rows.

use crate::domain::candle::Candle;
use crate::domain::strategy::SignalFrame;

pub trait StrategyPort {
    fn populate_indicators(&self, pair: &str, candles: &[Candle]) -> SignalFrame;
    fn populate_entry_trend(&self, frame: &mut SignalFrame);
    fn populate_exit_trend(&self, frame: &mut SignalFrame);
}
