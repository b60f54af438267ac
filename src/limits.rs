use chrono::Duration;

/// Hard cap on occurrences generated for one series. Expansion truncates
/// silently at the cap; a far-future end date is not an error.
pub const MAX_OCCURRENCES_PER_SERIES: usize = 100;

/// Recurrence interval bounds (inclusive).
pub const MIN_RECURRENCE_INTERVAL: u32 = 1;
pub const MAX_RECURRENCE_INTERVAL: u32 = 30;

pub const MAX_PURPOSE_LEN: usize = 500;

/// Widest single reservation window accepted.
pub fn max_span_duration() -> Duration {
    Duration::days(365)
}

/// Accepted timestamp range. Anything outside is malformed input.
pub const MIN_VALID_YEAR: i32 = 1970;
pub const MAX_VALID_YEAR: i32 = 2200;

/// Calendar-day padding applied to the coarse conflict candidate window.
pub const CONFLICT_WINDOW_PAD_DAYS: i64 = 1;
