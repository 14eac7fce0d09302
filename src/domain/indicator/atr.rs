//! Average True Range indicator.
//!
//! TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|) for i >= 1 (bar 0 has no prior close).
//! Seed ATR[n] with the mean of TR[1..=n], then Wilder smoothing:
//! ATR[i] = (ATR[i-1]*(n-1) + TR[i]) / n.
//! Warmup: first n bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

pub fn calculate_atr(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 || candles.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Atr(period),
            values: Vec::new(),
        };
    }

    let n = period as f64;
    let mut values = Vec::with_capacity(candles.len());
    let mut tr_sum = 0.0;
    let mut atr = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        if i == 0 {
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: 0.0,
            });
            continue;
        }

        let tr = candle.true_range(candles[i - 1].close);
        if i < period {
            tr_sum += tr;
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: 0.0,
            });
        } else if i == period {
            tr_sum += tr;
            atr = tr_sum / n;
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: atr,
            });
        } else {
            atr = (atr * (n - 1.0) + tr) / n;
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: atr,
            });
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}
