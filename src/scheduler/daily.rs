//! Daily price update scheduler
//!
//! Fires once a day at a wall-clock time in the configured timezone. The
//! job is whatever the caller hands in, normally a daily-mode sync run.

use crate::config::ScheduleConfig;
use crate::error::Result;
use crate::sync::RunSummary;
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Time left until the next `hour:minute` in `tz`, strictly after `now`
///
/// A target that falls into a DST gap moves forward by an hour; an ambiguous
/// one resolves to its first occurrence.
pub fn duration_until_next_run(now: DateTime<Utc>, hour: u32, minute: u32, tz: Tz) -> Duration {
    let Some(target_time) = NaiveTime::from_hms_opt(hour, minute, 0) else {
        return Duration::from_secs(24 * 3600);
    };

    let local_today = now.with_timezone(&tz).date_naive();
    for offset in 0..=2u64 {
        let Some(day) = local_today.checked_add_days(Days::new(offset)) else {
            break;
        };
        let naive = day.and_time(target_time);
        let target = tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + chrono::Duration::hours(1))).earliest());

        if let Some(target) = target {
            let target = target.with_timezone(&Utc);
            if target > now {
                return (target - now).to_std().unwrap_or_default();
            }
        }
    }

    Duration::from_secs(24 * 3600)
}

/// Runs a job at a fixed local time every day
pub struct DailyScheduler {
    hour: u32,
    minute: u32,
    tz: Tz,
}

impl DailyScheduler {
    pub fn new(config: &ScheduleConfig) -> Result<Self> {
        Ok(Self {
            hour: config.hour,
            minute: config.minute,
            tz: config.timezone()?,
        })
    }

    /// Duration until the next scheduled run from the current instant
    pub fn next_run_in(&self) -> Duration {
        duration_until_next_run(Utc::now(), self.hour, self.minute, self.tz)
    }

    /// Run `job` immediately with start and elapsed-time logging
    pub async fn run_once<F, Fut>(&self, job: F) -> Result<RunSummary>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RunSummary>>,
    {
        info!("Starting scheduled price update");
        let started = Instant::now();

        match job().await {
            Ok(summary) => {
                info!(
                    "Scheduled update completed successfully in {:.1?}",
                    started.elapsed()
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Error in scheduled update: {}", e);
                Err(e)
            }
        }
    }

    /// Wake daily and run `job` until `stop` resolves
    ///
    /// A failed run is logged and the loop waits for the next day.
    pub async fn run_forever<F, Fut, S>(&self, mut job: F, stop: S)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RunSummary>>,
        S: Future<Output = ()>,
    {
        tokio::pin!(stop);
        info!(
            "Daily scheduler started ({:02}:{:02} {})",
            self.hour, self.minute, self.tz
        );

        loop {
            let wait = self.next_run_in();
            info!(
                "Next scheduled update in {} hours {} minutes",
                wait.as_secs() / 3600,
                (wait.as_secs() % 3600) / 60
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut stop => {
                    info!("Daily scheduler stopped");
                    return;
                }
            }

            // Errors are already logged by run_once
            let _ = self.run_once(&mut job).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use chrono_tz::America::New_York;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_later_today() {
        // 12:00 EDT
        let wait = duration_until_next_run(utc("2024-06-03T16:00:00Z"), 18, 30, New_York);
        assert_eq!(wait, Duration::from_secs(6 * 3600 + 30 * 60));
    }

    #[test]
    fn test_already_passed_rolls_to_tomorrow() {
        // 19:00 EDT
        let wait = duration_until_next_run(utc("2024-06-03T23:00:00Z"), 18, 30, New_York);
        assert_eq!(wait, Duration::from_secs(23 * 3600 + 30 * 60));
    }

    #[test]
    fn test_exact_time_waits_a_full_day() {
        let wait = duration_until_next_run(utc("2024-06-03T22:30:00Z"), 18, 30, New_York);
        assert_eq!(wait, Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_dst_gap_moves_forward() {
        // 2024-03-10 02:30 does not exist in New York
        let wait = duration_until_next_run(utc("2024-03-10T05:00:00Z"), 2, 30, New_York);
        // 00:00 EST -> 03:30 EDT is 07:30 UTC
        assert_eq!(wait, Duration::from_secs(2 * 3600 + 30 * 60));
    }

    #[tokio::test]
    async fn test_run_once_passes_through() {
        let scheduler = DailyScheduler::new(&ScheduleConfig::default()).unwrap();

        let summary = scheduler
            .run_once(|| async { Ok(RunSummary::new("run-1", "daily")) })
            .await
            .unwrap();
        assert_eq!(summary.mode, "daily");

        let err = scheduler
            .run_once(|| async { Err(AppError::RegistryUnavailable("down".to_string())) })
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_run_forever_stops_on_signal() {
        let scheduler = DailyScheduler::new(&ScheduleConfig::default()).unwrap();
        let mut runs = 0;
        scheduler
            .run_forever(
                || {
                    runs += 1;
                    async { Ok(RunSummary::new("run", "daily")) }
                },
                async {},
            )
            .await;
        assert_eq!(runs, 0);
    }
}
