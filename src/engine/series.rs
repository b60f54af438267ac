use chrono::{DateTime, Duration, Utc};
use ulid::Ulid;

use crate::limits::*;
use crate::model::{
    BookingRequest, OccurrenceConflicts, Recurrence, Reservation, ReservationEvent, SeriesUpdate,
    Span,
};
use crate::observability;

use super::conflict::validate_window;
use super::recurrence;
use super::{Engine, EngineError};

impl Engine {
    /// Single entry point for booking requests. Non-recurring requests commit
    /// one reservation; recurring requests materialize the whole series or
    /// nothing. Returns every committed reservation, head first.
    pub async fn book(&self, request: BookingRequest) -> Result<Vec<Reservation>, EngineError> {
        let span = validate_window(request.start, request.end)?;
        if request.purpose.len() > MAX_PURPOSE_LEN {
            return Err(EngineError::Validation("purpose too long"));
        }
        match request.recurrence {
            Some(rule) => self.materialize(&request, span, rule).await,
            None => Ok(vec![self.create_single(&request, span).await?]),
        }
    }

    async fn create_single(
        &self,
        request: &BookingRequest,
        span: Span,
    ) -> Result<Reservation, EngineError> {
        let existing = self.find_conflicts(request.resource_id, &span, None).await?;
        if !existing.is_empty() {
            return Err(EngineError::Conflict(vec![OccurrenceConflicts {
                occurrence: span,
                existing,
                siblings: Vec::new(),
            }]));
        }

        let reservation = Reservation {
            id: Ulid::new(),
            resource_id: request.resource_id,
            owner_id: request.owner_id.clone(),
            span,
            purpose: request.purpose.clone(),
            cancelled: false,
            series_id: None,
            recurrence: None,
            created_at: self.clock.now_utc(),
        };
        self.store
            .insert_many(std::slice::from_ref(&reservation))
            .await?;
        tracing::info!(
            id = %reservation.id,
            resource = %reservation.resource_id,
            start = %span.start,
            "reservation committed"
        );
        self.notify.send(
            reservation.resource_id,
            &ReservationEvent::Committed(reservation.clone()),
        );
        Ok(reservation)
    }

    /// Expand, conflict-check, and persist a recurring series. The head id is
    /// assigned up front so children can reference it in the same atomic
    /// `insert_many` batch — no half-written series is ever observable.
    async fn materialize(
        &self,
        request: &BookingRequest,
        anchor: Span,
        rule: Recurrence,
    ) -> Result<Vec<Reservation>, EngineError> {
        recurrence::validate_rule(&anchor, &rule)?;
        let occurrences = recurrence::expand(&anchor, &rule);
        metrics::histogram!(observability::OCCURRENCES_EXPANDED)
            .record(occurrences.len() as f64);

        let report = self
            .check_batch(request.resource_id, &occurrences, None)
            .await?;
        if !report.is_empty() {
            metrics::counter!(observability::SERIES_REJECTED_TOTAL).increment(1);
            tracing::warn!(
                resource = %request.resource_id,
                occurrences = occurrences.len(),
                blocked = report.len(),
                "series rejected"
            );
            return Err(EngineError::Conflict(report));
        }

        let now = self.clock.now_utc();
        let head_id = Ulid::new();
        let batch: Vec<Reservation> = occurrences
            .iter()
            .enumerate()
            .map(|(i, occ)| Reservation {
                id: if i == 0 { head_id } else { Ulid::new() },
                resource_id: request.resource_id,
                owner_id: request.owner_id.clone(),
                span: *occ,
                purpose: request.purpose.clone(),
                cancelled: false,
                series_id: (i > 0).then_some(head_id),
                recurrence: (i == 0).then_some(rule),
                created_at: now,
            })
            .collect();

        self.store.insert_many(&batch).await?;
        metrics::counter!(observability::SERIES_COMMITTED_TOTAL).increment(1);
        tracing::info!(
            series = %head_id,
            resource = %request.resource_id,
            occurrences = batch.len(),
            "series committed"
        );
        self.notify.send(
            request.resource_id,
            &ReservationEvent::Committed(batch[0].clone()),
        );
        Ok(batch)
    }

    /// Cancel one reservation. Logical deletion only; never cascades to
    /// series siblings. Idempotent: cancelling twice is a no-op.
    pub async fn cancel(&self, id: Ulid) -> Result<(), EngineError> {
        let mut reservation = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if reservation.cancelled {
            return Ok(());
        }
        reservation.cancelled = true;
        self.store.update(&reservation).await?;
        tracing::info!(id = %id, resource = %reservation.resource_id, "reservation cancelled");
        self.notify.send(
            reservation.resource_id,
            &ReservationEvent::Cancelled(reservation),
        );
        Ok(())
    }

    /// Edit a single reservation's window and/or purpose, conflict-checked
    /// against everything except itself.
    pub async fn edit(
        &self,
        id: Ulid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        purpose: Option<String>,
    ) -> Result<Reservation, EngineError> {
        let span = validate_window(start, end)?;
        if let Some(p) = &purpose
            && p.len() > MAX_PURPOSE_LEN {
                return Err(EngineError::Validation("purpose too long"));
            }
        let mut reservation = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if reservation.cancelled {
            return Err(EngineError::Validation("cannot edit a cancelled reservation"));
        }

        let existing = self
            .find_conflicts(reservation.resource_id, &span, Some(id))
            .await?;
        if !existing.is_empty() {
            return Err(EngineError::Conflict(vec![OccurrenceConflicts {
                occurrence: span,
                existing,
                siblings: Vec::new(),
            }]));
        }

        reservation.span = span;
        if let Some(p) = purpose {
            reservation.purpose = p;
        }
        self.store.update(&reservation).await?;
        tracing::info!(id = %id, start = %span.start, "reservation updated");
        Ok(reservation)
    }

    /// Cancel exactly one occurrence of a series, leaving every sibling
    /// untouched. The occurrence is addressed by its start instant and may be
    /// the head or any child. Idempotent; a start matching no occurrence is a
    /// series-integrity error.
    pub async fn add_exception(
        &self,
        head_id: Ulid,
        occurrence_start: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let head = self.series_head(head_id).await?;
        let mut members = vec![head];
        members.extend(self.store.children_of(head_id).await?);

        let mut target = members
            .into_iter()
            .find(|r| r.span.start == occurrence_start)
            .ok_or_else(|| {
                EngineError::SeriesIntegrity(format!(
                    "series {head_id} has no occurrence starting at {occurrence_start}"
                ))
            })?;
        if target.cancelled {
            return Ok(());
        }
        target.cancelled = true;
        self.store.update(&target).await?;
        tracing::info!(
            series = %head_id,
            occurrence = %occurrence_start,
            "series exception added"
        );
        self.notify
            .send(target.resource_id, &ReservationEvent::Cancelled(target));
        Ok(())
    }

    /// Propagate purpose and/or duration to all non-cancelled children.
    /// Child start dates are never shifted. Duration changes are gated
    /// through the conflict resolver; any conflict rejects the whole update
    /// and nothing is written. Returns the number of children updated.
    pub async fn bulk_update(
        &self,
        head_id: Ulid,
        changes: SeriesUpdate,
    ) -> Result<usize, EngineError> {
        let _head = self.series_head(head_id).await?;
        if changes.purpose.is_none() && changes.duration.is_none() {
            return Err(EngineError::Validation("series update carries no changes"));
        }
        if let Some(p) = &changes.purpose
            && p.len() > MAX_PURPOSE_LEN {
                return Err(EngineError::Validation("purpose too long"));
            }
        if let Some(d) = changes.duration
            && d <= Duration::zero() {
                return Err(EngineError::Validation("duration must be positive"));
            }

        let children: Vec<Reservation> = self
            .store
            .children_of(head_id)
            .await?
            .into_iter()
            .filter(Reservation::is_active)
            .collect();

        if let Some(d) = changes.duration {
            // Starts never move, so each child's new span only has to be
            // checked against stored state (siblings included) minus itself.
            let mut report = Vec::new();
            for child in &children {
                let new_span = Span::new(child.span.start, child.span.start + d);
                let existing = self
                    .find_conflicts(child.resource_id, &new_span, Some(child.id))
                    .await?;
                if !existing.is_empty() {
                    report.push(OccurrenceConflicts {
                        occurrence: new_span,
                        existing,
                        siblings: Vec::new(),
                    });
                }
            }
            if !report.is_empty() {
                return Err(EngineError::Conflict(report));
            }
        }

        let mut batch = Vec::with_capacity(children.len());
        for mut child in children {
            if let Some(p) = &changes.purpose {
                child.purpose = p.clone();
            }
            if let Some(d) = changes.duration {
                child.span = Span::new(child.span.start, child.span.start + d);
            }
            batch.push(child);
        }
        // One atomic store write; a backend failure updates nothing.
        self.store.update_many(&batch).await?;
        tracing::info!(series = %head_id, updated = batch.len(), "series bulk update");
        Ok(batch.len())
    }

    /// Physically remove all children of a series. The head is untouched —
    /// cancelling or removing it is a separate administrative decision.
    /// Returns the number of children removed.
    pub async fn bulk_delete(&self, head_id: Ulid) -> Result<usize, EngineError> {
        let _head = self.series_head(head_id).await?;
        let children = self.store.children_of(head_id).await?;
        let ids: Vec<Ulid> = children.iter().map(|c| c.id).collect();
        self.store.delete_many(&ids).await?;
        tracing::info!(series = %head_id, removed = ids.len(), "series children deleted");
        Ok(ids.len())
    }

    pub(super) async fn series_head(&self, head_id: Ulid) -> Result<Reservation, EngineError> {
        let head = self
            .store
            .get(head_id)
            .await?
            .ok_or(EngineError::NotFound(head_id))?;
        if head.series_id.is_some() {
            return Err(EngineError::SeriesIntegrity(format!(
                "{head_id} is a series child, not a head"
            )));
        }
        Ok(head)
    }
}
