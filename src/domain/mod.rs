//! Core domain types and logic.

pub mod candle;
pub mod level;
pub mod signal;
pub mod indicator;
pub mod detector;
pub mod strategy;
pub mod error;
