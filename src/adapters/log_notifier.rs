//! Notification adapter that writes messages to the log.

use crate::domain::error::LevelwatchError;
use crate::ports::notify_port::NotifyPort;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotifyPort for LogNotifier {
    fn send_message(&self, message: &str) -> Result<(), LevelwatchError> {
        for line in message.lines() {
            info!(target: "levelwatch::notify", "{line}");
        }
        Ok(())
    }
}
