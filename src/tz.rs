use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::engine::EngineError;
use crate::model::Span;

/// Canonical boundary between presentation wall-clock time and storage UTC.
/// All intervals are normalized to UTC before any comparison; conversion back
/// to local happens only for display data.
///
/// DST policy: an ambiguous wall time (clocks fell back) resolves to the
/// earlier instant; a nonexistent wall time (clocks sprang forward) is a
/// validation error rather than a silent shift.
#[derive(Debug, Clone, Copy)]
pub struct TzConverter {
    zone: Tz,
}

impl TzConverter {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    pub fn utc() -> Self {
        Self { zone: Tz::UTC }
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn to_utc(&self, local: NaiveDateTime) -> Result<DateTime<Utc>, EngineError> {
        match self.zone.from_local_datetime(&local) {
            LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earlier, _) => Ok(earlier.with_timezone(&Utc)),
            LocalResult::None => Err(EngineError::Validation(
                "local time does not exist (DST gap)",
            )),
        }
    }

    pub fn to_local(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        utc.with_timezone(&self.zone).naive_local()
    }

    /// Convert a local wall-clock window to a UTC span.
    pub fn span_to_utc(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Span, EngineError> {
        let start = self.to_utc(start)?;
        let end = self.to_utc(end)?;
        if end <= start {
            return Err(EngineError::Validation("end time must be after start time"));
        }
        Ok(Span::new(start, end))
    }

    /// Format for an HTML `datetime-local` input.
    pub fn format_input(&self, utc: DateTime<Utc>) -> String {
        self.to_local(utc).format("%Y-%m-%dT%H:%M").to_string()
    }

    pub fn format_display(&self, utc: DateTime<Utc>) -> String {
        self.to_local(utc).format("%b %d, %Y %H:%M").to_string()
    }
}
