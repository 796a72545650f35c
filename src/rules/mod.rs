//! Rule scheduling and evaluation engine
//!
//! Turns configured query rules into alert batches: the scheduler polls
//! for due rules, each rule projects its query result rows into label
//! maps, and every row becomes one alert.

pub mod labels;
pub mod projector;
pub mod rule;
pub mod scheduler;

pub use rule::{rules_from_files, ScheduledRule};
pub use scheduler::Scheduler;
