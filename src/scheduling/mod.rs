//! Scheduling module for snapkeep.
//!
//! Validates cron expressions and turns operator shorthand into the canonical
//! 5-field form written to the scheduler file. Firing jobs is left to the
//! system cron daemon.

mod cron;
mod normalize;

pub use cron::{CronExpr, CronField, CronParseError, FieldKind};
pub use normalize::Schedule;
