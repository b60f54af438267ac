use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::{Reservation, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Write rejected by the no-overlap exclusion constraint; carries the id
    /// of the reservation already holding the window. This is the correctness
    /// backstop for concurrent check-then-act races.
    Constraint(Ulid),
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Constraint(id) => {
                write!(f, "exclusion constraint: window held by {id}")
            }
            StoreError::Backend(msg) => write!(f, "backend: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence boundary. The engine owns decision logic and sequencing; the
/// store owns rows. `insert_many` must be atomic — either every reservation
/// in the batch lands or none do.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Non-cancelled reservations on `resource_id` whose span overlaps
    /// `window`, minus `exclude` if given. This is the coarse fetch of the
    /// two-phase conflict check; callers still apply the precise predicate.
    async fn query_active(
        &self,
        resource_id: Ulid,
        window: Span,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Reservation>, StoreError>;

    async fn get(&self, id: Ulid) -> Result<Option<Reservation>, StoreError>;

    /// Atomic multi-row insert (one transaction in SQL-backed impls).
    async fn insert_many(&self, reservations: &[Reservation]) -> Result<(), StoreError>;

    async fn update(&self, reservation: &Reservation) -> Result<(), StoreError>;

    /// Atomic multi-row update — either every replacement lands or none do.
    /// Series-wide mutations go through this so a backend failure cannot
    /// leave a series half-updated.
    async fn update_many(&self, reservations: &[Reservation]) -> Result<(), StoreError>;

    async fn delete_many(&self, ids: &[Ulid]) -> Result<(), StoreError>;

    /// All children of a series head, sorted by start.
    async fn children_of(&self, head_id: Ulid) -> Result<Vec<Reservation>, StoreError>;
}

type ResourceRows = Arc<RwLock<Vec<Reservation>>>;

/// Reference store: per-resource row vectors sorted by start, with the
/// exclusion constraint enforced under the resource's write lock. Suitable
/// for tests and single-process embedding; a SQL store replaces it in
/// production deployments.
pub struct MemoryStore {
    resources: DashMap<Ulid, ResourceRows>,
    /// Reservation id → resource id.
    index: DashMap<Ulid, Ulid>,
    /// Head id → child reservation ids.
    children: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            index: DashMap::new(),
            children: DashMap::new(),
        }
    }

    fn rows_for(&self, resource_id: Ulid) -> ResourceRows {
        self.resources
            .entry(resource_id)
            .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
            .value()
            .clone()
    }

    /// Insert maintaining sort order by span start.
    fn insert_sorted(rows: &mut Vec<Reservation>, reservation: Reservation) {
        let pos = rows
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        rows.insert(pos, reservation);
    }

    /// The exclusion constraint: an active row may not overlap any other
    /// active row on the same resource.
    fn check_constraint(rows: &[Reservation], candidate: &Reservation) -> Result<(), StoreError> {
        if candidate.cancelled {
            return Ok(());
        }
        for existing in rows {
            if existing.cancelled || existing.id == candidate.id {
                continue;
            }
            if existing.span.overlaps(&candidate.span) {
                return Err(StoreError::Constraint(existing.id));
            }
        }
        Ok(())
    }

    fn link_series(&self, reservation: &Reservation) {
        if let Some(head) = reservation.series_id {
            let mut kids = self.children.entry(head).or_default();
            if !kids.contains(&reservation.id) {
                kids.push(reservation.id);
            }
        }
    }

    fn unlink_series(&self, id: Ulid, head: Option<Ulid>) {
        if let Some(head) = head
            && let Some(mut kids) = self.children.get_mut(&head) {
                kids.retain(|c| *c != id);
            }
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn query_active(
        &self,
        resource_id: Ulid,
        window: Span,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = match self.resources.get(&resource_id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(Vec::new()),
        };
        let guard = rows.read().await;
        Ok(guard
            .iter()
            .filter(|r| r.is_active() && r.span.overlaps(&window) && Some(r.id) != exclude)
            .cloned()
            .collect())
    }

    async fn get(&self, id: Ulid) -> Result<Option<Reservation>, StoreError> {
        let resource_id = match self.index.get(&id) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        let rows = self.rows_for(resource_id);
        let guard = rows.read().await;
        Ok(guard.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_many(&self, reservations: &[Reservation]) -> Result<(), StoreError> {
        if reservations.is_empty() {
            return Ok(());
        }

        // Acquire resource locks in sorted order to prevent deadlocks.
        let mut resource_ids: Vec<Ulid> = reservations.iter().map(|r| r.resource_id).collect();
        resource_ids.sort();
        resource_ids.dedup();

        let mut guards = Vec::with_capacity(resource_ids.len());
        for rid in &resource_ids {
            let rows = self.rows_for(*rid);
            guards.push((*rid, rows.write_owned().await));
        }

        // Validate the whole batch before touching any row: against stored
        // rows and pairwise within the batch.
        for r in reservations {
            if self.index.contains_key(&r.id) {
                return Err(StoreError::Backend(format!("duplicate id {}", r.id)));
            }
            let (_, guard) = guards
                .iter()
                .find(|(rid, _)| *rid == r.resource_id)
                .expect("guard acquired for every batch resource");
            Self::check_constraint(guard, r)?;
        }
        for (i, a) in reservations.iter().enumerate() {
            for b in reservations.iter().skip(i + 1) {
                if a.resource_id == b.resource_id
                    && a.is_active()
                    && b.is_active()
                    && a.span.overlaps(&b.span)
                {
                    return Err(StoreError::Constraint(a.id));
                }
            }
        }

        for r in reservations {
            let (_, guard) = guards
                .iter_mut()
                .find(|(rid, _)| *rid == r.resource_id)
                .expect("guard acquired for every batch resource");
            Self::insert_sorted(guard, r.clone());
            self.index.insert(r.id, r.resource_id);
            self.link_series(r);
        }
        Ok(())
    }

    async fn update(&self, reservation: &Reservation) -> Result<(), StoreError> {
        self.update_many(std::slice::from_ref(reservation)).await
    }

    async fn update_many(&self, reservations: &[Reservation]) -> Result<(), StoreError> {
        if reservations.is_empty() {
            return Ok(());
        }

        for r in reservations {
            let resource_id = match self.index.get(&r.id) {
                Some(entry) => *entry.value(),
                None => {
                    return Err(StoreError::Backend(format!(
                        "update of unknown reservation {}",
                        r.id
                    )));
                }
            };
            if resource_id != r.resource_id {
                return Err(StoreError::Backend(
                    "reservations cannot move between resources".into(),
                ));
            }
        }

        // Same lock discipline as insert_many: sorted resource order, then
        // validate every replacement before touching any row.
        let mut resource_ids: Vec<Ulid> = reservations.iter().map(|r| r.resource_id).collect();
        resource_ids.sort();
        resource_ids.dedup();

        let mut guards = Vec::with_capacity(resource_ids.len());
        for rid in &resource_ids {
            let rows = self.rows_for(*rid);
            guards.push((*rid, rows.write_owned().await));
        }

        // Constraint check against stored rows, ignoring the old versions of
        // batch members (they are being replaced), plus pairwise within the
        // batch.
        for r in reservations {
            let (_, guard) = guards
                .iter()
                .find(|(rid, _)| *rid == r.resource_id)
                .expect("guard acquired for every batch resource");
            if !guard.iter().any(|row| row.id == r.id) {
                return Err(StoreError::Backend(format!("row vanished for {}", r.id)));
            }
            if r.cancelled {
                continue;
            }
            for existing in guard.iter() {
                if existing.cancelled
                    || existing.id == r.id
                    || reservations.iter().any(|b| b.id == existing.id)
                {
                    continue;
                }
                if existing.span.overlaps(&r.span) {
                    return Err(StoreError::Constraint(existing.id));
                }
            }
        }
        for (i, a) in reservations.iter().enumerate() {
            for b in reservations.iter().skip(i + 1) {
                if a.resource_id == b.resource_id
                    && a.is_active()
                    && b.is_active()
                    && a.span.overlaps(&b.span)
                {
                    return Err(StoreError::Constraint(a.id));
                }
            }
        }

        for r in reservations {
            let (_, guard) = guards
                .iter_mut()
                .find(|(rid, _)| *rid == r.resource_id)
                .expect("guard acquired for every batch resource");
            let pos = guard
                .iter()
                .position(|row| row.id == r.id)
                .expect("presence validated before apply");
            let previous = guard.remove(pos);
            if previous.series_id != r.series_id {
                self.unlink_series(previous.id, previous.series_id);
                self.link_series(r);
            }
            Self::insert_sorted(guard, r.clone());
        }
        Ok(())
    }

    async fn delete_many(&self, ids: &[Ulid]) -> Result<(), StoreError> {
        for id in ids {
            let resource_id = match self.index.remove(id) {
                Some((_, rid)) => rid,
                None => continue, // already gone
            };
            let rows = self.rows_for(resource_id);
            let mut guard = rows.write().await;
            if let Some(pos) = guard.iter().position(|r| r.id == *id) {
                let removed = guard.remove(pos);
                self.unlink_series(removed.id, removed.series_id);
            }
            self.children.remove(id);
        }
        Ok(())
    }

    async fn children_of(&self, head_id: Ulid) -> Result<Vec<Reservation>, StoreError> {
        let ids = self
            .children
            .get(&head_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(r) = self.get(id).await? {
                out.push(r);
            }
        }
        out.sort_by_key(|r| r.span.start);
        Ok(out)
    }
}
