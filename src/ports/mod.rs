//! Port traits: the seams between domain logic and the outside world.

pub mod candle_port;
pub mod config_port;
pub mod level_port;
pub mod notify_port;
pub mod signal_port;
pub mod strategy_port;
