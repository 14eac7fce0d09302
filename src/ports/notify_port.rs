//! Outbound notification port trait.

use crate::domain::error::LevelwatchError;

pub trait NotifyPort {
    fn send_message(&self, message: &str) -> Result<(), LevelwatchError>;
}
