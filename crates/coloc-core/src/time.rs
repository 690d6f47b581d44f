//! Acquisition time windows and per-day path components.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive acquisition search window around a reference product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

/// Path components for one calendar day covered by a window.
///
/// Catalog trees are laid out by year and day-of-year, with filenames
/// carrying a compact `YYYYMMDD` date key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayScheme {
    /// Compact date key, e.g. `20240115`.
    pub date_key: String,
    /// Four-digit year, e.g. `2024`.
    pub year: String,
    /// Zero-padded day of year, e.g. `015`.
    pub day_of_year: String,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        Self { start, stop }
    }

    /// Expand a reference acquisition interval symmetrically by `delta`.
    ///
    /// `delta` must be non-negative; a negative delta is a programming
    /// error at the call site, not a runtime condition.
    pub fn derive(ref_start: DateTime<Utc>, ref_stop: DateTime<Utc>, delta: Duration) -> Self {
        debug_assert!(delta >= Duration::zero(), "delta_time must be non-negative");
        Self {
            start: ref_start - delta,
            stop: ref_stop + delta,
        }
    }

    /// True when `[start, stop]` intersects this window (inclusive bounds).
    pub fn intersects(&self, start: DateTime<Utc>, stop: DateTime<Utc>) -> bool {
        !(stop < self.start || start > self.stop)
    }

    /// Calendar days fully or partially covered by the window, in order.
    pub fn days(&self) -> Vec<DayScheme> {
        let mut schemes = Vec::new();
        let mut day = self.start.date_naive();
        let last = self.stop.date_naive();
        while day <= last {
            schemes.push(DayScheme {
                date_key: day.format("%Y%m%d").to_string(),
                year: format!("{:04}", day.year()),
                day_of_year: format!("{:03}", day.ordinal()),
            });
            day = day.succ_opt().expect("date overflow");
        }
        schemes
    }
}
