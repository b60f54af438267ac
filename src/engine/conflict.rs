use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use ulid::Ulid;

use crate::limits::*;
use crate::model::{ConflictDetail, OccurrenceConflicts, Span};
use crate::observability;

use super::{Engine, EngineError};

pub(crate) fn validate_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Span, EngineError> {
    if end <= start {
        return Err(EngineError::Validation("end time must be after start time"));
    }
    if start.year() < MIN_VALID_YEAR || end.year() > MAX_VALID_YEAR {
        return Err(EngineError::Validation("timestamp out of range"));
    }
    if end - start > max_span_duration() {
        return Err(EngineError::Validation("reservation window too wide"));
    }
    Ok(Span::new(start, end))
}

/// Coarse candidate window: whole calendar days, padded one day either side.
/// Deliberately conservative — it must never exclude a true conflict. Any
/// reservation overlapping `span` also overlaps this superset, so the precise
/// predicate applied afterwards sees every candidate it needs.
pub(crate) fn candidate_window(span: &Span) -> Span {
    let pad = Duration::days(CONFLICT_WINDOW_PAD_DAYS);
    let start = Utc
        .from_utc_datetime(&span.start.date_naive().and_hms_opt(0, 0, 0).expect("midnight"))
        - pad;
    let end = Utc
        .from_utc_datetime(&span.end.date_naive().and_hms_opt(0, 0, 0).expect("midnight"))
        + pad
        + Duration::days(1);
    Span::new(start, end)
}

impl Engine {
    /// All active reservations on `resource_id` overlapping `span`. Two-phase:
    /// a bounded date-window fetch from the store, then the exact half-open
    /// overlap test on the candidates. `exclude` lets an edit skip the
    /// reservation being edited.
    pub async fn find_conflicts(
        &self,
        resource_id: Ulid,
        span: &Span,
        exclude: Option<Ulid>,
    ) -> Result<Vec<ConflictDetail>, EngineError> {
        metrics::counter!(observability::CONFLICT_CHECKS_TOTAL).increment(1);
        let window = candidate_window(span);
        let candidates = self
            .store
            .query_active(resource_id, window, exclude)
            .await?;
        let conflicts: Vec<ConflictDetail> = candidates
            .iter()
            .filter(|r| r.span.overlaps(span))
            .map(ConflictDetail::from)
            .collect();
        if !conflicts.is_empty() {
            metrics::counter!(observability::CONFLICTS_FOUND_TOTAL).increment(1);
            tracing::warn!(
                resource = %resource_id,
                start = %span.start,
                end = %span.end,
                count = conflicts.len(),
                "conflict detected"
            );
        }
        Ok(conflicts)
    }

    /// Batch check for a proposed series: every occurrence against the store
    /// AND against its sibling occurrences. Returns the dirty entries only;
    /// an empty result means the whole batch is committable.
    pub(super) async fn check_batch(
        &self,
        resource_id: Ulid,
        occurrences: &[Span],
        exclude: Option<Ulid>,
    ) -> Result<Vec<OccurrenceConflicts>, EngineError> {
        let mut report = Vec::new();
        for (i, occ) in occurrences.iter().enumerate() {
            let existing = self.find_conflicts(resource_id, occ, exclude).await?;
            let siblings: Vec<Span> = occurrences
                .iter()
                .enumerate()
                .filter(|&(j, other)| j != i && occ.overlaps(other))
                .map(|(_, other)| *other)
                .collect();
            if !existing.is_empty() || !siblings.is_empty() {
                report.push(OccurrenceConflicts {
                    occurrence: *occ,
                    existing,
                    siblings,
                });
            }
        }
        Ok(report)
    }
}
