//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

use crate::adapters::csv_adapter::CsvCandleAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::level_strategy::LevelSignalStrategy;
use crate::adapters::log_notifier::LogNotifier;
use crate::domain::detector::detect;
use crate::domain::error::LevelwatchError;
use crate::domain::level::{LevelDirection, LevelUpdate, NewPriceLevel, PriceLevel};
use crate::domain::signal::{
    parse_end_bound, parse_start_bound, NewSignalEvent, SignalEvent, SignalFilter, SignalKind,
};
use crate::domain::strategy::StrategyConfig;
use crate::logging;
use crate::ports::candle_port::CandlePort;
use crate::ports::config_port::ConfigPort;
use crate::ports::level_port::LevelPort;
use crate::ports::signal_port::SignalPort;

#[derive(Parser, Debug)]
#[command(name = "levelwatch", about = "Price level and ATR signal detector")]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long)]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or upgrade the database schema
    InitDb,
    /// Manage price levels
    Levels {
        #[command(subcommand)]
        action: LevelsCommand,
    },
    /// Browse the signal history
    Signals {
        #[command(subcommand)]
        action: SignalsCommand,
    },
    /// Run the level detector on the newest candle of a pair
    Detect {
        #[arg(long)]
        pair: String,
        #[arg(long)]
        timeframe: Option<String>,
        /// Append detected events to the signal history
        #[arg(long)]
        record: bool,
    },
    /// Run the full strategy for a pair as the host would on candle close
    Evaluate {
        #[arg(long)]
        pair: String,
        #[arg(long)]
        timeframe: Option<String>,
    },
    /// Start the JSON admin API
    Serve,
}

#[derive(Subcommand, Debug)]
pub enum LevelsCommand {
    /// List active levels
    List {
        #[arg(long)]
        pair: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Add a level
    Add {
        #[arg(long)]
        pair: String,
        #[arg(long)]
        level: f64,
        /// up, down, both, wick_up, wick_down or wick_both
        #[arg(long, default_value = "both")]
        direction: String,
        #[arg(long)]
        confirm_close: bool,
    },
    /// Change the value, direction or close confirmation of a level
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        level: Option<f64>,
        #[arg(long)]
        direction: Option<String>,
        #[arg(long)]
        confirm_close: Option<bool>,
    },
    /// Deactivate a level; its signal history is kept
    Delete {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum SignalsCommand {
    /// List recorded signals, newest first
    List {
        #[arg(long)]
        pair: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        /// YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or YYYY-MM-DDTHH:MM:SS
        #[arg(long)]
        start: Option<String>,
        /// A bare date covers the whole day
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        json: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match load_config(&cli.config) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let filter = config
        .get_string("logging", "filter")
        .unwrap_or_else(|| logging::DEFAULT_FILTER.to_string());
    logging::init(&filter);
    debug!(config = %cli.config.display(), "loaded config");

    let result = match cli.command {
        Command::InitDb => run_init_db(&config),
        Command::Levels { action } => run_levels(&config, action),
        Command::Signals { action } => run_signals(&config, action),
        Command::Detect {
            pair,
            timeframe,
            record,
        } => run_detect(&config, &pair, timeframe.as_deref(), record),
        Command::Evaluate { pair, timeframe } => {
            run_evaluate(&config, &pair, timeframe.as_deref())
        }
        Command::Serve => return run_serve(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn fail(err: LevelwatchError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Level and signal ports backed by the configured store.
pub struct Stores {
    pub levels: Arc<dyn LevelPort + Send + Sync>,
    pub signals: Arc<dyn SignalPort + Send + Sync>,
}

/// Open the configured store and make sure its schema is current.
pub fn open_stores(config: &dyn ConfigPort) -> Result<Stores, LevelwatchError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteStore;

        let store = Arc::new(SqliteStore::from_config(config)?);
        store.initialize_schema()?;
        Ok(Stores {
            levels: store.clone(),
            signals: store,
        })
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        Err(LevelwatchError::Database {
            reason: "built without the sqlite feature".into(),
        })
    }
}

/// Directory holding `<PAIR>_<timeframe>.csv` candle files.
pub fn candle_dir(config: &dyn ConfigPort) -> Result<PathBuf, LevelwatchError> {
    config
        .get_string("data", "csv_dir")
        .map(PathBuf::from)
        .ok_or_else(|| LevelwatchError::ConfigMissing {
            section: "data".into(),
            key: "csv_dir".into(),
        })
}

/// Build a history filter from command-line strings.
pub fn build_signal_filter(
    pair: Option<&str>,
    kind: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
    limit: usize,
    offset: usize,
) -> Result<SignalFilter, LevelwatchError> {
    Ok(SignalFilter {
        pair: pair.map(str::to_string),
        kind: kind.map(str::parse::<SignalKind>).transpose()?,
        start: start.map(parse_start_bound).transpose()?,
        end: end.map(parse_end_bound).transpose()?,
        limit,
        offset,
    })
}

pub fn format_level(level: &PriceLevel) -> String {
    format!(
        "{:>5}  {:<12} {:>16.6}  {:<10} {:<8} {}",
        level.id,
        level.pair,
        level.value,
        level.direction,
        if level.confirm_close { "close" } else { "touch" },
        level.created_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

pub fn format_event(event: &NewSignalEvent) -> String {
    let level = match (event.level_value, event.level_id) {
        (Some(v), Some(id)) => format!("level={v:.6} (ID {id})"),
        _ => match event.atr_value {
            Some(atr) => format!("atr={atr:.6}"),
            None => String::new(),
        },
    };
    format!(
        "{}  {:<12} {:<17} {:.6} -> {:.6}  {}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        event.pair,
        event.kind.as_str(),
        event.prev_price,
        event.current_price,
        level,
    )
    .trim_end()
    .to_string()
}

pub fn format_signal(signal: &SignalEvent) -> String {
    let event = NewSignalEvent {
        pair: signal.pair.clone(),
        kind: signal.kind,
        level_id: signal.level_id,
        level_value: signal.level_value,
        prev_price: signal.prev_price,
        current_price: signal.current_price,
        atr_value: signal.atr_value,
        timestamp: signal.timestamp,
    };
    format!("{:>6}  {}", signal.id, format_event(&event))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), LevelwatchError> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{text}");
    Ok(())
}

fn run_init_db(config: &dyn ConfigPort) -> Result<(), LevelwatchError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteStore;

        let store = SqliteStore::from_config(config)?;
        let added = store.initialize_schema()?;
        if added.is_empty() {
            println!("Schema is up to date");
        } else {
            for column in &added {
                println!("Added column {column}");
            }
        }
        Ok(())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        open_stores(config).map(|_| ())
    }
}

fn run_levels(config: &dyn ConfigPort, action: LevelsCommand) -> Result<(), LevelwatchError> {
    let stores = open_stores(config)?;

    match action {
        LevelsCommand::List { pair, json } => {
            let levels = stores.levels.list_active_levels(pair.as_deref())?;
            if json {
                return print_json(&levels);
            }
            if levels.is_empty() {
                eprintln!("No active price levels");
            }
            for level in &levels {
                println!("{}", format_level(level));
            }
        }
        LevelsCommand::Add {
            pair,
            level,
            direction,
            confirm_close,
        } => {
            let direction: LevelDirection = direction.parse()?;
            let added = stores
                .levels
                .add_level(&NewPriceLevel::new(&pair, level, direction, confirm_close))?;
            println!("Added level {}", added.id);
            println!("{}", format_level(&added));
        }
        LevelsCommand::Update {
            id,
            level,
            direction,
            confirm_close,
        } => {
            let update = LevelUpdate {
                value: level,
                direction: direction
                    .as_deref()
                    .map(str::parse::<LevelDirection>)
                    .transpose()?,
                confirm_close,
            };
            if update.is_empty() {
                return Err(LevelwatchError::InvalidLevel {
                    reason: "nothing to update; pass --level, --direction or --confirm-close".into(),
                });
            }
            let updated = stores.levels.update_level(id, &update)?;
            println!("{}", format_level(&updated));
        }
        LevelsCommand::Delete { id } => {
            stores.levels.deactivate_level(id)?;
            println!("Deactivated level {id}");
        }
    }
    Ok(())
}

fn run_signals(config: &dyn ConfigPort, action: SignalsCommand) -> Result<(), LevelwatchError> {
    let SignalsCommand::List {
        pair,
        kind,
        start,
        end,
        limit,
        offset,
        json,
    } = action;

    let filter = build_signal_filter(
        pair.as_deref(),
        kind.as_deref(),
        start.as_deref(),
        end.as_deref(),
        limit,
        offset,
    )?;
    let stores = open_stores(config)?;
    let signals = stores.signals.list_signals(&filter)?;

    if json {
        return print_json(&signals);
    }
    let total = stores.signals.count_signals(&filter)?;
    for signal in &signals {
        println!("{}", format_signal(signal));
    }
    eprintln!("{} of {} signals shown", signals.len(), total);
    Ok(())
}

fn run_detect(
    config: &dyn ConfigPort,
    pair: &str,
    timeframe: Option<&str>,
    record: bool,
) -> Result<(), LevelwatchError> {
    let strategy = StrategyConfig::from_config(config)?;
    let timeframe = timeframe.unwrap_or(&strategy.timeframe);

    let candles = CsvCandleAdapter::new(candle_dir(config)?).fetch_candles(pair, timeframe)?;
    let stores = open_stores(config)?;
    let levels = stores.levels.list_active_levels(Some(pair))?;

    let events = detect(&candles, &levels);
    info!(pair, timeframe, levels = levels.len(), events = events.len(), "detection finished");

    if events.is_empty() {
        eprintln!("No signals on the last candle");
        return Ok(());
    }
    for event in &events {
        println!("{}", format_event(event));
    }

    if record {
        for event in &events {
            let stored = stores.signals.append_signal(event)?;
            debug!(id = stored.id, "recorded");
        }
        eprintln!("Recorded {} signal(s)", events.len());
    }
    Ok(())
}

fn run_evaluate(
    config: &dyn ConfigPort,
    pair: &str,
    timeframe: Option<&str>,
) -> Result<(), LevelwatchError> {
    let mut strategy_config = StrategyConfig::from_config(config)?;
    if let Some(tf) = timeframe {
        strategy_config.timeframe = tf.to_string();
    }

    let candles = CsvCandleAdapter::new(candle_dir(config)?)
        .fetch_candles(pair, &strategy_config.timeframe)?;
    let stores = open_stores(config)?;

    let strategy = LevelSignalStrategy::new(
        stores.levels,
        stores.signals,
        Arc::new(LogNotifier),
        strategy_config,
    );
    let outcome = strategy.on_candle_close(pair, &candles);

    if let Some(row) = outcome.frame.last() {
        let atr = row
            .atr
            .map(|a| format!("{a:.6}"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{} {} @ {}: close={:.6} atr={} enter_long={} exit_long={}",
            outcome.frame.pair,
            strategy.config().timeframe,
            row.candle.timestamp.format("%Y-%m-%d %H:%M:%S"),
            row.candle.close,
            atr,
            row.enter_long,
            row.exit_long,
        );
    }
    for signal in &outcome.recorded {
        println!("{}", format_signal(signal));
    }
    if outcome.recorded.len() < outcome.events.len() {
        eprintln!(
            "{} of {} signal(s) could not be recorded",
            outcome.events.len() - outcome.recorded.len(),
            outcome.events.len()
        );
    }
    Ok(())
}

fn run_serve(config: &FileConfigAdapter) -> ExitCode {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::{serve, AppState, DEFAULT_LISTEN};
        use std::net::SocketAddr;

        let stores = match open_stores(config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };

        let listen = config
            .get_string("web", "listen")
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let addr: SocketAddr = match listen.parse() {
            Ok(a) => a,
            Err(e) => {
                return fail(LevelwatchError::ConfigInvalid {
                    section: "web".into(),
                    key: "listen".into(),
                    reason: format!("{listen}: {e}"),
                });
            }
        };

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(r) => r,
            Err(e) => return fail(e.into()),
        };

        let state = AppState {
            levels: stores.levels,
            signals: stores.signals,
        };
        match runtime.block_on(serve(state, addr)) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(e),
        }
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config;
        eprintln!("error: web feature is required for serve");
        ExitCode::from(1)
    }
}
