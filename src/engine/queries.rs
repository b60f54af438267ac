use ulid::Ulid;

use crate::model::{Reservation, SeriesStatus, Span};

use super::{Engine, EngineError};

impl Engine {
    pub async fn get_reservation(&self, id: Ulid) -> Result<Option<Reservation>, EngineError> {
        Ok(self.store.get(id).await?)
    }

    /// Every member of a series: head first, then children ordered by start.
    pub async fn series_members(&self, head_id: Ulid) -> Result<Vec<Reservation>, EngineError> {
        let head = self.series_head(head_id).await?;
        let mut members = vec![head];
        members.extend(self.store.children_of(head_id).await?);
        Ok(members)
    }

    /// Observable state of a committed series, derived from the store.
    pub async fn series_status(&self, head_id: Ulid) -> Result<SeriesStatus, EngineError> {
        let head = self.series_head(head_id).await?;
        let children = self.store.children_of(head_id).await?;
        if children.is_empty() {
            return Ok(SeriesStatus::Deleted);
        }
        if head.cancelled || children.iter().any(|c| c.cancelled) {
            return Ok(SeriesStatus::PartiallyCancelled);
        }
        Ok(SeriesStatus::Committed)
    }

    /// Active reservations on a resource overlapping `window`, sorted by
    /// start. The precise predicate is applied on top of the store's coarse
    /// window fetch, same as conflict checking.
    pub async fn list_active(
        &self,
        resource_id: Ulid,
        window: Span,
    ) -> Result<Vec<Reservation>, EngineError> {
        let mut rows = self.store.query_active(resource_id, window, None).await?;
        rows.retain(|r| r.span.overlaps(&window));
        rows.sort_by_key(|r| r.span.start);
        Ok(rows)
    }

    /// True when no active reservation overlaps `span`.
    pub async fn is_window_free(
        &self,
        resource_id: Ulid,
        span: &Span,
    ) -> Result<bool, EngineError> {
        Ok(self.find_conflicts(resource_id, span, None).await?.is_empty())
    }
}
