use chrono::{DateTime, Duration, Utc};
use common::config::PipelineConfig;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("window start ({start_days_ago} days ago) must precede its end ({end_days_ago} days ago)")]
pub struct WindowError {
    pub start_days_ago: u32,
    pub end_days_ago: u32,
}

/// Half-open creation-time filter `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    /// `[now - start_days_ago, now - end_days_ago)`. The defaults (3, 2) select one day
    /// ending two days ago, not the last 24 hours.
    pub fn days_ago(
        now: DateTime<Utc>,
        start_days_ago: u32,
        end_days_ago: u32,
    ) -> Result<Self, WindowError> {
        if start_days_ago <= end_days_ago {
            return Err(WindowError {
                start_days_ago,
                end_days_ago,
            });
        }
        Ok(Self {
            from: now - Duration::days(i64::from(start_days_ago)),
            to: now - Duration::days(i64::from(end_days_ago)),
        })
    }

    pub fn from_config(now: DateTime<Utc>, config: &PipelineConfig) -> Result<Self, WindowError> {
        Self::days_ago(now, config.window_start_days_ago, config.window_end_days_ago)
    }

    /// `fromdate` query parameter, whole Unix seconds.
    pub fn fromdate(&self) -> i64 {
        self.from.timestamp()
    }

    /// `todate` query parameter, whole Unix seconds.
    pub fn todate(&self) -> i64 {
        self.to.timestamp()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant < self.to
    }
}
