//! Domain error types.

/// Top-level error type for levelwatch.
#[derive(Debug, thiserror::Error)]
pub enum LevelwatchError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid direction '{value}' (expected one of: up, down, both, wick_up, wick_down, wick_both)")]
    InvalidDirection { value: String },

    #[error("invalid signal kind '{value}'")]
    InvalidSignalKind { value: String },

    #[error("invalid price level: {reason}")]
    InvalidLevel { reason: String },

    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },

    #[error("price level with ID {id} not found")]
    LevelNotFound { id: i64 },

    #[error("no candle data for {pair} ({timeframe})")]
    NoData { pair: String, timeframe: String },

    #[error("notification failed: {reason}")]
    Notify { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LevelwatchError {
    /// True for errors caused by caller input rather than the environment.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            LevelwatchError::InvalidDirection { .. }
                | LevelwatchError::InvalidSignalKind { .. }
                | LevelwatchError::InvalidLevel { .. }
                | LevelwatchError::InvalidTimestamp { .. }
                | LevelwatchError::LevelNotFound { .. }
        )
    }
}

impl From<&LevelwatchError> for std::process::ExitCode {
    fn from(err: &LevelwatchError) -> Self {
        let code: u8 = match err {
            LevelwatchError::Io(_) | LevelwatchError::Notify { .. } => 1,
            LevelwatchError::ConfigParse { .. }
            | LevelwatchError::ConfigMissing { .. }
            | LevelwatchError::ConfigInvalid { .. } => 2,
            LevelwatchError::Database { .. } | LevelwatchError::DatabaseQuery { .. } => 3,
            LevelwatchError::InvalidDirection { .. }
            | LevelwatchError::InvalidSignalKind { .. }
            | LevelwatchError::InvalidLevel { .. }
            | LevelwatchError::InvalidTimestamp { .. }
            | LevelwatchError::LevelNotFound { .. } => 4,
            LevelwatchError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
