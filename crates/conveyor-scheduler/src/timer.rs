//! Cron-based pipeline timers.

use chrono::{DateTime, Utc};
use conveyor_core::{Error, Result};
use cron::Schedule;
use std::str::FromStr;

/// A parsed timer specification (`sec min hour day-of-month month day-of-week [year]`).
#[derive(Debug, Clone)]
pub struct TimerSchedule {
    spec: String,
    schedule: Schedule,
}

impl TimerSchedule {
    pub fn parse(spec: &str) -> Result<Self> {
        let schedule = Schedule::from_str(spec).map_err(|e| Error::InvalidTimer {
            spec: spec.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            spec: spec.to_string(),
            schedule,
        })
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Whether the timer fired in `(last_fired, now]`.
    pub fn due(&self, now: DateTime<Utc>, last_fired: DateTime<Utc>) -> bool {
        self.next_after(last_fired).is_some_and(|next| next <= now)
    }

    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}
