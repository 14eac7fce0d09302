//! INI file configuration adapter.
//!
//! Recognised sections: `[sqlite]`, `[data]`, `[strategy]`, `[web]` and
//! `[logging]`. Keys are case-insensitive.

use crate::domain::error::LevelwatchError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LevelwatchError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| LevelwatchError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, LevelwatchError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| LevelwatchError::ConfigParse {
                file: "<string>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key).filter(|v| !v.trim().is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::{RunMode, StrategyConfig};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const FULL: &str = r#"
[sqlite]
path = /var/lib/levelwatch/levels.db
pool_size = 8

[data]
csv_dir = /var/lib/levelwatch/candles

[strategy]
timeframe = 1h
atr_period = 10
atr_threshold = 1.75
check_level_crossing = yes
run_mode = live

[web]
listen = 127.0.0.1:8081

[logging]
filter = levelwatch=debug
"#;

    #[test]
    fn reads_all_sections() {
        let adapter = FileConfigAdapter::from_string(FULL).unwrap();

        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("/var/lib/levelwatch/levels.db".to_string())
        );
        assert_eq!(adapter.get_int("sqlite", "pool_size", 4), 8);
        assert_eq!(
            adapter.get_string("data", "csv_dir"),
            Some("/var/lib/levelwatch/candles".to_string())
        );
        assert_eq!(
            adapter.get_string("web", "listen"),
            Some("127.0.0.1:8081".to_string())
        );
        assert_eq!(
            adapter.get_string("logging", "filter"),
            Some("levelwatch=debug".to_string())
        );
    }

    #[test]
    fn strategy_section_builds_config() {
        let adapter = FileConfigAdapter::from_string(FULL).unwrap();
        let cfg = StrategyConfig::from_config(&adapter).unwrap();

        assert_eq!(cfg.timeframe, "1h");
        assert_eq!(cfg.atr_period, 10);
        assert_eq!(cfg.atr_threshold, 1.75);
        assert!(cfg.check_level_crossing);
        assert_eq!(cfg.run_mode, RunMode::Live);
    }

    #[test]
    fn missing_and_blank_values() {
        let adapter = FileConfigAdapter::from_string("[sqlite]\npath =\n").unwrap();
        assert_eq!(adapter.get_string("sqlite", "path"), None);
        assert_eq!(adapter.get_string("sqlite", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn numeric_getters_fall_back_on_garbage() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\natr_period = abc\natr_threshold = x\n")
                .unwrap();
        assert_eq!(adapter.get_int("strategy", "atr_period", 14), 14);
        assert_eq!(adapter.get_double("strategy", "atr_threshold", 1.5), 1.5);
        assert_eq!(adapter.get_int("strategy", "missing", 42), 42);
    }

    #[test]
    fn bool_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\na = true\nb = yes\nc = 1\nd = off\ne = no\nf = 0\ng = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("strategy", "a", false));
        assert!(adapter.get_bool("strategy", "b", false));
        assert!(adapter.get_bool("strategy", "c", false));
        assert!(!adapter.get_bool("strategy", "d", true));
        assert!(!adapter.get_bool("strategy", "e", true));
        assert!(!adapter.get_bool("strategy", "f", true));
        assert!(adapter.get_bool("strategy", "g", true));
        assert!(!adapter.get_bool("strategy", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[data]\ncsv_dir = ./candles\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "csv_dir"),
            Some("./candles".to_string())
        );
    }

    #[test]
    fn from_file_missing_is_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/levelwatch.ini");
        assert!(matches!(
            result,
            Err(LevelwatchError::ConfigParse { file, .. }) if file.contains("levelwatch.ini")
        ));
    }
}
