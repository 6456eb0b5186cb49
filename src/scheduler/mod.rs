//! Scheduler module
//!
//! Runs the daily update either once (for cron or a task scheduler) or as a
//! long-lived loop that wakes at the configured local time.

mod daily;

pub use daily::{duration_until_next_run, DailyScheduler};
