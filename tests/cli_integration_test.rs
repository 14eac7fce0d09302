#![cfg(feature = "sqlite")]
//! CLI integration tests with real INI, CSV and SQLite files on disk.
//!
//! Tests cover:
//! - Schema creation and migration of a legacy levels table
//! - Level administration commands
//! - Detection over CSV candles, with and without recording
//! - Strategy evaluation recording level and ATR events
//! - Exit codes for configuration, input and data errors

use clap::Parser;
use levelwatch::adapters::file_config_adapter::FileConfigAdapter;
use levelwatch::cli::{self, Cli};
use levelwatch::domain::signal::{SignalFilter, SignalKind};
use levelwatch::ports::level_port::LevelPort;
use levelwatch::ports::signal_port::SignalPort;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let ini = format!(
            "[sqlite]\npath = {}\n\n[data]\ncsv_dir = {}\n\n[strategy]\ntimeframe = 15m\natr_period = 3\natr_threshold = 1.5\nrun_mode = dry_run\n",
            dir.path().join("levels.db").display(),
            dir.path().display(),
        );
        fs::write(dir.path().join("levelwatch.ini"), ini).unwrap();
        Self { dir }
    }

    fn config_path(&self) -> String {
        self.dir.path().join("levelwatch.ini").display().to_string()
    }

    fn write_candles(&self, name: &str, rows: &[&str]) {
        let mut body = String::from("timestamp,open,high,low,close,volume\n");
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        fs::write(self.dir.path().join(name), body).unwrap();
    }

    fn run(&self, args: &[&str]) -> ExitCode {
        let config = self.config_path();
        let mut argv = vec!["levelwatch", "-c", config.as_str()];
        argv.extend_from_slice(args);
        cli::run(Cli::parse_from(argv))
    }

    fn stores(&self) -> cli::Stores {
        let config = FileConfigAdapter::from_file(self.config_path()).unwrap();
        cli::open_stores(&config).unwrap()
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn code(c: ExitCode) -> String {
    format!("{c:?}")
}

fn expect(c: ExitCode, value: u8) {
    assert_eq!(code(c), code(ExitCode::from(value)));
}

/// Quiet bars below 100, then a wide bar closing above it.
const CROSSING: &[&str] = &[
    "2024-01-01 00:00:00,99.0,99.4,98.6,99.0,10",
    "2024-01-01 00:15:00,99.0,99.4,98.6,99.0,10",
    "2024-01-01 00:30:00,99.0,99.4,98.6,99.0,10",
    "2024-01-01 00:45:00,99.0,99.4,98.6,99.0,10",
    "2024-01-01 01:00:00,99.0,99.4,98.6,99.0,10",
    "2024-01-01 01:15:00,99.1,102.5,99.0,102.0,25",
];

mod schema {
    use super::*;

    #[test]
    fn init_db_creates_schema() {
        let ws = Workspace::new();
        expect(ws.run(&["init-db"]), 0);
        assert!(ws.path().join("levels.db").exists());
        // second run is a no-op
        expect(ws.run(&["init-db"]), 0);
    }

    #[test]
    fn init_db_migrates_legacy_table() {
        let ws = Workspace::new();
        {
            let conn = rusqlite::Connection::open(ws.path().join("levels.db")).unwrap();
            conn.execute_batch(
                "CREATE TABLE price_levels (
                    id INTEGER PRIMARY KEY,
                    pair TEXT NOT NULL,
                    level REAL NOT NULL,
                    direction TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    active INTEGER NOT NULL DEFAULT 1
                );
                INSERT INTO price_levels (pair, level, direction, created_at)
                VALUES ('ETH/USDT', 3000.0, 'down', '2024-01-01 00:00:00');",
            )
            .unwrap();
        }

        expect(ws.run(&["init-db"]), 0);

        let levels = ws.stores().levels.list_active_levels(None).unwrap();
        assert_eq!(levels.len(), 1);
        assert!(!levels[0].confirm_close);
    }
}

mod levels {
    use super::*;

    #[test]
    fn add_update_delete() {
        let ws = Workspace::new();
        expect(
            ws.run(&["levels", "add", "--pair", "btc/usdt", "--level", "50000", "--direction", "up"]),
            0,
        );

        let stores = ws.stores();
        let levels = stores.levels.list_active_levels(Some("BTC/USDT")).unwrap();
        assert_eq!(levels.len(), 1);
        let id = levels[0].id.to_string();

        expect(
            ws.run(&["levels", "update", "--id", &id, "--level", "51000", "--confirm-close", "true"]),
            0,
        );
        let updated = stores.levels.get_level(levels[0].id).unwrap().unwrap();
        assert_eq!(updated.value, 51_000.0);
        assert!(updated.confirm_close);
        assert_eq!(updated.direction, "up");

        expect(ws.run(&["levels", "delete", "--id", &id]), 0);
        assert!(stores.levels.list_active_levels(None).unwrap().is_empty());
        expect(ws.run(&["levels", "list", "--json"]), 0);
    }

    #[test]
    fn invalid_input_exits_with_4() {
        let ws = Workspace::new();
        expect(
            ws.run(&["levels", "add", "--pair", "BTC/USDT", "--level", "1", "--direction", "sideways"]),
            4,
        );
        expect(
            ws.run(&["levels", "add", "--pair", "BTC/USDT", "--level", "0"]),
            4,
        );
        expect(ws.run(&["levels", "delete", "--id", "99"]), 4);
        expect(ws.run(&["levels", "update", "--id", "1"]), 4);
        expect(ws.run(&["signals", "list", "--start", "last week"]), 4);
    }
}

mod detection {
    use super::*;

    #[test]
    fn detect_prints_without_recording() {
        let ws = Workspace::new();
        ws.write_candles("BTC_USDT_15m.csv", CROSSING);
        expect(ws.run(&["levels", "add", "--pair", "BTC/USDT", "--level", "100"]), 0);

        expect(ws.run(&["detect", "--pair", "BTC/USDT"]), 0);
        let stores = ws.stores();
        assert_eq!(stores.signals.count_signals(&SignalFilter::default()).unwrap(), 0);

        expect(ws.run(&["detect", "--pair", "BTC/USDT", "--record"]), 0);
        let signals = stores.signals.list_signals(&SignalFilter::default()).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::LevelCrossUp);
        assert_eq!(signals[0].level_value, Some(100.0));
        assert_eq!(signals[0].atr_value, None);
    }

    #[test]
    fn evaluate_records_level_and_atr_events() {
        let ws = Workspace::new();
        ws.write_candles("BTC_USDT_15m.csv", CROSSING);
        expect(
            ws.run(&["levels", "add", "--pair", "BTC/USDT", "--level", "100", "--confirm-close"]),
            0,
        );

        expect(ws.run(&["evaluate", "--pair", "BTC/USDT"]), 0);

        let signals = ws
            .stores()
            .signals
            .list_signals(&SignalFilter::default())
            .unwrap();
        let mut kinds: Vec<_> = signals.iter().map(|s| s.kind).collect();
        kinds.sort();
        assert_eq!(kinds, vec![SignalKind::LevelCrossUp, SignalKind::AtrSurge]);
        assert!(signals.iter().all(|s| s.atr_value.is_some()));

        expect(ws.run(&["signals", "list", "--kind", "atr_surge", "--end", "2024-01-01"]), 0);
    }

    #[test]
    fn backtest_mode_records_nothing() {
        let ws = Workspace::new();
        let ini = fs::read_to_string(ws.path().join("levelwatch.ini"))
            .unwrap()
            .replace("run_mode = dry_run", "run_mode = backtest");
        fs::write(ws.path().join("levelwatch.ini"), ini).unwrap();
        ws.write_candles("BTC_USDT_15m.csv", CROSSING);
        expect(ws.run(&["levels", "add", "--pair", "BTC/USDT", "--level", "100"]), 0);

        expect(ws.run(&["evaluate", "--pair", "BTC/USDT"]), 0);
        assert_eq!(
            ws.stores()
                .signals
                .count_signals(&SignalFilter::default())
                .unwrap(),
            0
        );
    }

    #[test]
    fn blank_price_on_last_candle_is_skipped() {
        let ws = Workspace::new();
        ws.write_candles(
            "BTC_USDT_15m.csv",
            &[
                "2024-01-01 00:00:00,99.0,99.5,98.5,99.0,1",
                "2024-01-01 00:15:00,99.0,,98.5,101.0,1",
            ],
        );
        expect(ws.run(&["levels", "add", "--pair", "BTC/USDT", "--level", "100"]), 0);

        expect(ws.run(&["detect", "--pair", "BTC/USDT", "--record"]), 0);
        expect(ws.run(&["evaluate", "--pair", "BTC/USDT"]), 0);
        assert_eq!(
            ws.stores()
                .signals
                .count_signals(&SignalFilter::default())
                .unwrap(),
            0
        );
    }

    #[test]
    fn missing_candles_exit_with_5() {
        let ws = Workspace::new();
        expect(ws.run(&["detect", "--pair", "DOGE/USDT"]), 5);
        expect(ws.run(&["evaluate", "--pair", "DOGE/USDT", "--timeframe", "1h"]), 5);
    }
}

mod config_errors {
    use super::*;

    #[test]
    fn missing_config_file_exits_with_2() {
        let c = cli::run(Cli::parse_from(["levelwatch", "-c", "/nonexistent/levelwatch.ini", "init-db"]));
        expect(c, 2);
    }

    #[test]
    fn bad_strategy_value_exits_with_2() {
        let ws = Workspace::new();
        let ini = fs::read_to_string(ws.path().join("levelwatch.ini"))
            .unwrap()
            .replace("run_mode = dry_run", "run_mode = paper");
        fs::write(ws.path().join("levelwatch.ini"), ini).unwrap();
        ws.write_candles("BTC_USDT_15m.csv", CROSSING);

        expect(ws.run(&["detect", "--pair", "BTC/USDT"]), 2);
    }

    #[test]
    fn missing_sqlite_path_exits_with_2() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("levelwatch.ini");
        fs::write(&path, "[data]\ncsv_dir = .\n").unwrap();

        let c = cli::run(Cli::parse_from([
            "levelwatch",
            "-c",
            path.to_str().unwrap(),
            "levels",
            "list",
        ]));
        expect(c, 2);
    }
}
