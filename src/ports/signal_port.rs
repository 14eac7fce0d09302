//! Signal history persistence port trait.

use crate::domain::error::LevelwatchError;
use crate::domain::signal::{NewSignalEvent, SignalEvent, SignalFilter};

pub trait SignalPort {
    /// Append to the history. A `level_id` must name an existing level.
    fn append_signal(&self, event: &NewSignalEvent) -> Result<SignalEvent, LevelwatchError>;

    /// Newest first, honouring the filter's limit and offset.
    fn list_signals(&self, filter: &SignalFilter) -> Result<Vec<SignalEvent>, LevelwatchError>;

    /// Rows matching the filter, ignoring limit and offset.
    fn count_signals(&self, filter: &SignalFilter) -> Result<usize, LevelwatchError>;
}
