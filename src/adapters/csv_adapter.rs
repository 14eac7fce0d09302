//! CSV file candle adapter.
//!
//! One file per pair and timeframe: `BTC/USDT` at `15m` lives in
//! `<base>/BTC_USDT_15m.csv` with columns
//! `timestamp,open,high,low,close,volume`.

use crate::domain::candle::{Candle, TIMESTAMP_FORMAT};
use crate::domain::error::LevelwatchError;
use crate::domain::level::normalize_pair;
use crate::ports::candle_port::CandlePort;
use chrono::NaiveDateTime;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};

pub struct CsvCandleAdapter {
    base_path: PathBuf,
}

impl CsvCandleAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, pair: &str, timeframe: &str) -> PathBuf {
        let stem = normalize_pair(pair).replace('/', "_");
        self.base_path.join(format!("{}_{}.csv", stem, timeframe))
    }
}

fn parse_field(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64, LevelwatchError> {
    record
        .get(idx)
        .ok_or_else(|| LevelwatchError::Database {
            reason: format!("missing {} column", name),
        })?
        .trim()
        .parse()
        .map_err(|e| LevelwatchError::Database {
            reason: format!("invalid {} value: {}", name, e),
        })
}

/// Blank or unparsable price cells read as NaN; the detector skips such candles.
fn parse_price(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64, LevelwatchError> {
    let raw = record.get(idx).ok_or_else(|| LevelwatchError::Database {
        reason: format!("missing {} column", name),
    })?;
    match raw.trim().parse::<f64>() {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(column = name, value = raw, error = %e, "unreadable price, treating as missing");
            Ok(f64::NAN)
        }
    }
}

impl CandlePort for CsvCandleAdapter {
    fn fetch_candles(&self, pair: &str, timeframe: &str) -> Result<Vec<Candle>, LevelwatchError> {
        let path = self.csv_path(pair, timeframe);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LevelwatchError::NoData {
                    pair: normalize_pair(pair),
                    timeframe: timeframe.to_string(),
                });
            }
            Err(e) => {
                return Err(LevelwatchError::Database {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| LevelwatchError::Database {
                reason: format!("CSV parse error: {}", e),
            })?;

            let ts_str = record.get(0).ok_or_else(|| LevelwatchError::Database {
                reason: "missing timestamp column".into(),
            })?;
            let timestamp =
                NaiveDateTime::parse_from_str(ts_str.trim(), TIMESTAMP_FORMAT).map_err(|e| {
                    LevelwatchError::Database {
                        reason: format!("invalid timestamp '{}': {}", ts_str, e),
                    }
                })?;

            // volume is optional in hand-made files
            let volume = match record.get(5) {
                Some(v) if !v.trim().is_empty() => parse_field(&record, 5, "volume")?,
                _ => 0.0,
            };

            candles.push(Candle {
                timestamp,
                open: parse_price(&record, 1, "open")?,
                high: parse_price(&record, 2, "high")?,
                low: parse_price(&record, 3, "low")?,
                close: parse_price(&record, 4, "close")?,
                volume,
            });
        }

        if candles.is_empty() {
            return Err(LevelwatchError::NoData {
                pair: normalize_pair(pair),
                timeframe: timeframe.to_string(),
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        debug!(path = %path.display(), count = candles.len(), "loaded candles");
        Ok(candles)
    }
}
