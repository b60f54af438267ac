mod conflict;
mod error;
mod queries;
mod recurrence;
mod series;
mod store;

pub use error::EngineError;
pub use recurrence::expand;
pub use store::{MemoryStore, ReservationStore, StoreError};

use std::sync::Arc;

use crate::clock::Clock;
use crate::notify::NotifyHub;

/// The reservation engine: owns the decision logic (expansion, conflict
/// resolution, series sequencing) and delegates row ownership to the store.
/// Concurrent requests are serialized by the store's write-time constraint,
/// not by this struct — the conflict resolver is a pre-flight check.
pub struct Engine {
    pub(super) store: Arc<dyn ReservationStore>,
    pub(super) clock: Arc<dyn Clock>,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        clock: Arc<dyn Clock>,
        notify: Arc<NotifyHub>,
    ) -> Self {
        Self {
            store,
            clock,
            notify,
        }
    }

    pub fn store(&self) -> &Arc<dyn ReservationStore> {
        &self.store
    }
}
