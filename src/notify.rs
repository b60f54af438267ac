use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::ReservationEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for reservation commit/cancel notifications, keyed by
/// resource. Delivery is best-effort: a send with no listeners (or a lagging
/// listener) never fails the operation that produced the event.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<ReservationEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for a resource. Creates the channel if needed.
    pub fn subscribe(&self, resource_id: Ulid) -> broadcast::Receiver<ReservationEvent> {
        let sender = self
            .channels
            .entry(resource_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, resource_id: Ulid, event: &ReservationEvent) {
        if let Some(sender) = self.channels.get(&resource_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel (e.g. when a resource is retired).
    pub fn remove(&self, resource_id: &Ulid) {
        self.channels.remove(resource_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Reservation, Span};
    use chrono::{TimeZone, Utc};

    fn reservation(resource_id: Ulid) -> Reservation {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 2, 11, 0, 0).unwrap();
        Reservation {
            id: Ulid::new(),
            resource_id,
            owner_id: "u1".into(),
            span: Span::new(start, end),
            purpose: "standup".into(),
            cancelled: false,
            series_id: None,
            recurrence: None,
            created_at: start,
        }
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let rid = Ulid::new();
        let mut rx = hub.subscribe(rid);

        let event = ReservationEvent::Committed(reservation(rid));
        hub.send(rid, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let rid = Ulid::new();
        // No subscriber — should not panic
        hub.send(rid, &ReservationEvent::Cancelled(reservation(rid)));
    }
}
