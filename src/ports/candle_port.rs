//! Candle data provider port trait.

use crate::domain::candle::Candle;
use crate::domain::error::LevelwatchError;

pub trait CandlePort {
    /// Closed candles for `pair` at `timeframe`, oldest first.
    fn fetch_candles(&self, pair: &str, timeframe: &str) -> Result<Vec<Candle>, LevelwatchError>;
}
