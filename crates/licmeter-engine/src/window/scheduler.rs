//! Window scheduler
//!
//! Decides per invocation whether to only count host sightings or to close
//! the window and publish.

use chrono::{DateTime, TimeZone, Timelike};
use licmeter_common::{DAY_MS, HOUR_MS};

/// Minimum window length before a reset may fire
pub const RESET_MIN_ELAPSED_MS: i64 = 59 * 60 * 1000;

/// Longest window one tick will account for
pub const MAX_ELAPSED_MS: i64 = DAY_MS;

/// Lag applied to the DDU query window
pub const DDU_QUERY_LAG_MS: i64 = 3 * 60 * 1000;

/// Kind of tick this invocation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    /// Count host sightings only
    Measure,
    /// Clear host state and publish the closed window
    Reset,
}

impl TickKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickKind::Measure => "measure",
            TickKind::Reset => "reset",
        }
    }
}

/// Time frame one tick works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    pub kind: TickKind,
    /// Invocation time (Unix millis)
    pub now_millis: i64,
    /// Start of the window, possibly pulled forward to stay within a day
    pub last_reset_millis: i64,
    /// `now_millis - last_reset_millis`, at most one day
    pub elapsed_ms: i64,
}

impl WindowPlan {
    /// Query frame for DEM billing metrics, lagged by an hour
    pub fn dem_window(&self) -> (i64, i64) {
        (self.last_reset_millis - HOUR_MS, self.now_millis - HOUR_MS)
    }

    /// Query frame for DDU billing metrics
    pub fn ddu_window(&self) -> (i64, i64) {
        (
            self.last_reset_millis - DDU_QUERY_LAG_MS,
            self.now_millis - DDU_QUERY_LAG_MS,
        )
    }

    /// Oldest last-seen time for entities that may carry attribution
    pub fn inventory_from(&self) -> i64 {
        self.last_reset_millis - DAY_MS
    }
}

/// Plan the tick for wall-clock `now` given the stored window start.
///
/// The minute-of-hour check uses `now`'s own time zone. A start after `now`
/// restarts the window at `now`.
pub fn plan_window<Tz: TimeZone>(now: &DateTime<Tz>, last_reset_millis: i64) -> WindowPlan {
    let now_millis = now.timestamp_millis();
    let mut last_reset_millis = last_reset_millis;
    let mut elapsed_ms = now_millis.saturating_sub(last_reset_millis);

    if elapsed_ms < 0 {
        elapsed_ms = 0;
        last_reset_millis = now_millis;
    } else if elapsed_ms > MAX_ELAPSED_MS {
        elapsed_ms = MAX_ELAPSED_MS;
        last_reset_millis = now_millis - MAX_ELAPSED_MS;
    }

    let kind = if elapsed_ms >= RESET_MIN_ELAPSED_MS && now.minute() == 0 {
        TickKind::Reset
    } else {
        TickKind::Measure
    };

    WindowPlan {
        kind,
        now_millis,
        last_reset_millis,
        elapsed_ms,
    }
}
