//! SQLite persistence adapter for price levels and signal history.

use chrono::{NaiveDateTime, Timelike, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};
use tracing::{debug, info};

use crate::domain::error::LevelwatchError;
use crate::domain::level::{normalize_pair, LevelUpdate, NewPriceLevel, PriceLevel};
use crate::domain::signal::{NewSignalEvent, SignalEvent, SignalFilter, SignalKind};
use crate::ports::config_port::ConfigPort;
use crate::ports::level_port::LevelPort;
use crate::ports::signal_port::SignalPort;

const STORE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
// also accepts fractional seconds written by older tools
const READ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const LEVEL_COLUMNS: &str = "id, pair, level, direction, confirm_close, active, created_at";
const SIGNAL_COLUMNS: &str = "id, pair, signal_type, level_id, level_price, prev_price, \
                              current_price, atr_value, timestamp, created_at";

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LevelwatchError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| LevelwatchError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path)
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| LevelwatchError::Database {
                    reason: e.to_string(),
                })?;

        debug!(path = %db_path, pool_size, "opened sqlite store");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, LevelwatchError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| LevelwatchError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    /// Create missing tables, add columns missing from older databases, then
    /// create indexes. Returns the `table.column` names that were added.
    pub fn initialize_schema(&self) -> Result<Vec<String>, LevelwatchError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS price_levels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pair TEXT NOT NULL,
                level REAL NOT NULL,
                direction TEXT NOT NULL,
                created_at TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                confirm_close INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS signal_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pair TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                level_id INTEGER REFERENCES price_levels(id),
                level_price REAL,
                prev_price REAL NOT NULL,
                current_price REAL NOT NULL,
                atr_value REAL,
                timestamp TEXT,
                created_at TEXT NOT NULL
            );",
        )
        .map_err(query_err)?;

        let mut added = Vec::new();
        let migrations: [(&str, &str, &str); 3] = [
            ("price_levels", "active", "INTEGER NOT NULL DEFAULT 1"),
            ("price_levels", "confirm_close", "INTEGER NOT NULL DEFAULT 0"),
            ("signal_history", "timestamp", "TEXT"),
        ];
        for (table, column, decl) in migrations {
            if !column_exists(&conn, table, column)? {
                conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl};"))
                    .map_err(query_err)?;
                info!(table, column, "added missing column");
                added.push(format!("{table}.{column}"));
            }
        }

        conn.execute_batch(
            "UPDATE signal_history SET timestamp = substr(created_at, 1, 19) WHERE timestamp IS NULL;
            CREATE INDEX IF NOT EXISTS idx_price_levels_pair ON price_levels(pair);
            CREATE INDEX IF NOT EXISTS idx_signal_history_pair ON signal_history(pair);
            CREATE INDEX IF NOT EXISTS idx_signal_history_type ON signal_history(signal_type);
            CREATE INDEX IF NOT EXISTS idx_signal_history_timestamp ON signal_history(timestamp);",
        )
        .map_err(query_err)?;

        Ok(added)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, LevelwatchError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| LevelwatchError::Database {
                reason: e.to_string(),
            })
    }
}

fn query_err(e: rusqlite::Error) -> LevelwatchError {
    LevelwatchError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(STORE_FORMAT).to_string()
}

fn parse_ts(raw: String, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&raw, READ_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn column_exists(
    conn: &rusqlite::Connection,
    table: &str,
    column: &str,
) -> Result<bool, LevelwatchError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(query_err)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(query_err)?;
    for name in names {
        if name.map_err(query_err)? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn level_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceLevel> {
    Ok(PriceLevel {
        id: row.get(0)?,
        pair: row.get(1)?,
        value: row.get(2)?,
        direction: row.get(3)?,
        confirm_close: row.get::<_, i64>(4)? != 0,
        active: row.get::<_, i64>(5)? != 0,
        created_at: parse_ts(row.get(6)?, 6)?,
    })
}

fn signal_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SignalEvent> {
    let kind_str: String = row.get(2)?;
    let kind: SignalKind = kind_str.parse().map_err(|e: LevelwatchError| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(SignalEvent {
        id: row.get(0)?,
        pair: row.get(1)?,
        kind,
        level_id: row.get(3)?,
        level_value: row.get(4)?,
        prev_price: row.get(5)?,
        current_price: row.get(6)?,
        atr_value: row.get(7)?,
        timestamp: parse_ts(row.get(8)?, 8)?,
        created_at: parse_ts(row.get(9)?, 9)?,
    })
}

fn fetch_level(
    conn: &rusqlite::Connection,
    id: i64,
) -> Result<Option<PriceLevel>, LevelwatchError> {
    conn.query_row(
        &format!("SELECT {LEVEL_COLUMNS} FROM price_levels WHERE id = ?1"),
        params![id],
        level_from_row,
    )
    .optional()
    .map_err(query_err)
}

/// WHERE clause and bound values for a signal filter.
fn signal_where(filter: &SignalFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(pair) = &filter.pair {
        clauses.push("pair = ?");
        values.push(Value::Text(normalize_pair(pair)));
    }
    if let Some(kind) = filter.kind {
        clauses.push("signal_type = ?");
        values.push(Value::Text(kind.as_str().to_string()));
    }
    if let Some(start) = &filter.start {
        clauses.push("timestamp >= ?");
        values.push(Value::Text(format_ts(start)));
    }
    if let Some(end) = &filter.end {
        clauses.push("timestamp <= ?");
        values.push(Value::Text(format_ts(end)));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

impl LevelPort for SqliteStore {
    fn list_active_levels(&self, pair: Option<&str>) -> Result<Vec<PriceLevel>, LevelwatchError> {
        let conn = self.conn()?;

        let mut sql = format!("SELECT {LEVEL_COLUMNS} FROM price_levels WHERE active = 1");
        let mut values = Vec::new();
        if let Some(p) = pair {
            sql.push_str(" AND pair = ?1");
            values.push(Value::Text(normalize_pair(p)));
        }
        sql.push_str(" ORDER BY id ASC");

        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), level_from_row)
            .map_err(query_err)?;

        let mut levels = Vec::new();
        for row in rows {
            levels.push(row.map_err(query_err)?);
        }
        Ok(levels)
    }

    fn get_level(&self, id: i64) -> Result<Option<PriceLevel>, LevelwatchError> {
        let conn = self.conn()?;
        fetch_level(&conn, id)
    }

    fn add_level(&self, level: &NewPriceLevel) -> Result<PriceLevel, LevelwatchError> {
        level.validate()?;
        let conn = self.conn()?;
        let created_at = now();

        conn.execute(
            "INSERT INTO price_levels (pair, level, direction, created_at, active, confirm_close)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![
                level.pair,
                level.value,
                level.direction.as_str(),
                format_ts(&created_at),
                level.confirm_close as i64
            ],
        )
        .map_err(query_err)?;

        let stored = PriceLevel {
            id: conn.last_insert_rowid(),
            pair: level.pair.clone(),
            value: level.value,
            direction: level.direction.as_str().to_string(),
            confirm_close: level.confirm_close,
            active: true,
            created_at,
        };
        info!(id = stored.id, pair = %stored.pair, level = stored.value, "added price level");
        Ok(stored)
    }

    fn update_level(&self, id: i64, update: &LevelUpdate) -> Result<PriceLevel, LevelwatchError> {
        update.validate()?;
        let conn = self.conn()?;

        let mut level = fetch_level(&conn, id)?.ok_or(LevelwatchError::LevelNotFound { id })?;
        update.apply(&mut level);

        conn.execute(
            "UPDATE price_levels SET level = ?1, direction = ?2, confirm_close = ?3 WHERE id = ?4",
            params![level.value, level.direction, level.confirm_close as i64, id],
        )
        .map_err(query_err)?;

        info!(id, level = level.value, direction = %level.direction, "updated price level");
        Ok(level)
    }

    fn deactivate_level(&self, id: i64) -> Result<(), LevelwatchError> {
        let conn = self.conn()?;
        let changed = conn
            .execute("UPDATE price_levels SET active = 0 WHERE id = ?1", params![id])
            .map_err(query_err)?;
        if changed == 0 {
            return Err(LevelwatchError::LevelNotFound { id });
        }
        info!(id, "deactivated price level");
        Ok(())
    }
}

impl SignalPort for SqliteStore {
    fn append_signal(&self, event: &NewSignalEvent) -> Result<SignalEvent, LevelwatchError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        if let Some(level_id) = event.level_id {
            let exists: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM price_levels WHERE id = ?1)",
                    params![level_id],
                    |row| row.get(0),
                )
                .map_err(query_err)?;
            if !exists {
                return Err(LevelwatchError::LevelNotFound { id: level_id });
            }
        }

        let created_at = now();
        let pair = normalize_pair(&event.pair);
        tx.execute(
            "INSERT INTO signal_history (pair, signal_type, level_id, level_price, prev_price,
                                         current_price, atr_value, timestamp, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                pair,
                event.kind.as_str(),
                event.level_id,
                event.level_value,
                event.prev_price,
                event.current_price,
                event.atr_value,
                format_ts(&event.timestamp),
                format_ts(&created_at)
            ],
        )
        .map_err(query_err)?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(query_err)?;

        debug!(id, pair = %pair, kind = %event.kind, "recorded signal");
        Ok(SignalEvent {
            id,
            pair,
            kind: event.kind,
            level_id: event.level_id,
            level_value: event.level_value,
            prev_price: event.prev_price,
            current_price: event.current_price,
            atr_value: event.atr_value,
            timestamp: event.timestamp.with_nanosecond(0).unwrap_or(event.timestamp),
            created_at,
        })
    }

    fn list_signals(&self, filter: &SignalFilter) -> Result<Vec<SignalEvent>, LevelwatchError> {
        let conn = self.conn()?;
        let (where_sql, mut values) = signal_where(filter);

        let limit = if filter.limit == 0 { -1 } else { filter.limit as i64 };
        values.push(Value::Integer(limit));
        values.push(Value::Integer(filter.offset as i64));

        let sql = format!(
            "SELECT {SIGNAL_COLUMNS} FROM signal_history{where_sql}
             ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), signal_from_row)
            .map_err(query_err)?;

        let mut signals = Vec::new();
        for row in rows {
            signals.push(row.map_err(query_err)?);
        }
        Ok(signals)
    }

    fn count_signals(&self, filter: &SignalFilter) -> Result<usize, LevelwatchError> {
        let conn = self.conn()?;
        let (where_sql, values) = signal_where(filter);
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM signal_history{where_sql}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .map_err(query_err)?;
        Ok(count as usize)
    }
}
