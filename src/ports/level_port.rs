//! Price level persistence port trait.

use crate::domain::error::LevelwatchError;
use crate::domain::level::{LevelUpdate, NewPriceLevel, PriceLevel};

pub trait LevelPort {
    /// Active levels ordered by id, optionally restricted to one pair.
    fn list_active_levels(&self, pair: Option<&str>) -> Result<Vec<PriceLevel>, LevelwatchError>;

    /// Any level, active or not.
    fn get_level(&self, id: i64) -> Result<Option<PriceLevel>, LevelwatchError>;

    fn add_level(&self, level: &NewPriceLevel) -> Result<PriceLevel, LevelwatchError>;

    /// Fails with `LevelNotFound` for an unknown id.
    fn update_level(&self, id: i64, update: &LevelUpdate) -> Result<PriceLevel, LevelwatchError>;

    /// Logical delete: clears `active`, keeps the row for signal history.
    fn deactivate_level(&self, id: i64) -> Result<(), LevelwatchError>;
}
