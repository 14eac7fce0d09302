//! Concrete adapter implementations for ports.

#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod level_strategy;
pub mod log_notifier;
#[cfg(feature = "web")]
pub mod web;
