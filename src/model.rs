use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open interval `[start, end)` in UTC — the only comparison domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Span {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// The one overlap predicate. End-exclusive: back-to-back spans do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    /// Same duration, relocated to a new start.
    pub fn with_start(&self, start: DateTime<Utc>) -> Span {
        Span {
            start,
            end: start + self.duration(),
        }
    }
}

/// How a recurring series steps from one occurrence to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrenceFreq {
    Daily,
    Weekly,
    Monthly,
}

/// Recurrence rule carried by a series head. `until` is inclusive: an
/// occurrence starting exactly at `until` is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub freq: RecurrenceFreq,
    pub interval: u32,
    pub until: DateTime<Utc>,
}

/// A claim on one resource for one time window. Cancelled reservations are
/// retained for history but never participate in conflict checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub owner_id: String,
    pub span: Span,
    pub purpose: String,
    pub cancelled: bool,
    /// Head id for children of a series. The head itself carries `None` and is
    /// identified by its children pointing at it.
    pub series_id: Option<Ulid>,
    /// Present on series heads only.
    pub recurrence: Option<Recurrence>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        !self.cancelled
    }

    pub fn is_series_head(&self) -> bool {
        self.series_id.is_none() && self.recurrence.is_some()
    }

    /// Lifecycle phase relative to `now` (for reporting callers).
    pub fn status_at(&self, now: DateTime<Utc>) -> ReservationStatus {
        if self.cancelled {
            ReservationStatus::Cancelled
        } else if self.span.end <= now {
            ReservationStatus::Completed
        } else if self.span.start <= now {
            ReservationStatus::InProgress
        } else {
            ReservationStatus::Upcoming
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStatus {
    Upcoming,
    InProgress,
    Completed,
    Cancelled,
}

/// A proposed booking, already normalized to UTC by the caller (see `tz`).
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub resource_id: Ulid,
    pub owner_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub purpose: String,
    pub recurrence: Option<Recurrence>,
}

/// Field changes propagated across a series by `bulk_update`. Child start
/// dates are never shifted; a duration change moves each child's end only.
#[derive(Debug, Clone, Default)]
pub struct SeriesUpdate {
    pub purpose: Option<String>,
    pub duration: Option<Duration>,
}

/// One existing reservation that blocks a proposed window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDetail {
    pub id: Ulid,
    pub span: Span,
    pub purpose: String,
}

impl From<&Reservation> for ConflictDetail {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id,
            span: r.span,
            purpose: r.purpose.clone(),
        }
    }
}

/// Per-occurrence conflict report for a proposed batch. `siblings` lists
/// other occurrences of the same request that collide with this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceConflicts {
    pub occurrence: Span,
    pub existing: Vec<ConflictDetail>,
    pub siblings: Vec<Span>,
}

impl OccurrenceConflicts {
    pub fn is_clean(&self) -> bool {
        self.existing.is_empty() && self.siblings.is_empty()
    }
}

/// Outbound notification payloads. Best-effort: delivery failures never
/// affect the reservation they describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationEvent {
    Committed(Reservation),
    Cancelled(Reservation),
}

/// Observable state of a committed series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStatus {
    /// Head and all children active.
    Committed,
    /// At least one occurrence individually cancelled.
    PartiallyCancelled,
    /// All children removed (head may remain, cancelled or not).
    Deleted,
}
