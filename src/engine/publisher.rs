use tokio::sync::broadcast;
use tracing::debug;

use crate::models::event::FulfillmentEvent;

/// Outbound sink for fulfillment events. Publishing never fails the caller.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: FulfillmentEvent);
}

/// Fans events out to every subscriber of a broadcast channel.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<FulfillmentEvent>,
}

impl BroadcastPublisher {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FulfillmentEvent> {
        self.tx.subscribe()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: FulfillmentEvent) {
        if self.tx.send(event.clone()).is_err() {
            debug!(
                order_id = %event.order_id,
                event_type = ?event.event_type,
                "no subscribers for fulfillment event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{BroadcastPublisher, EventPublisher};
    use crate::models::event::{EventType, FulfillmentEvent};
    use crate::models::order::OrderStatus;

    fn event() -> FulfillmentEvent {
        FulfillmentEvent {
            event_type: EventType::StatusChanged,
            order_id: Uuid::new_v4(),
            status: OrderStatus::Confirmed,
            version: 2,
            actor_id: "v1".to_string(),
            timestamp: Utc::now(),
            personnel_id: None,
            item_id: None,
            note: None,
        }
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let publisher = BroadcastPublisher::new(4);
        publisher.publish(event());
    }

    #[test]
    fn subscribers_receive_published_events() {
        let publisher = BroadcastPublisher::new(4);
        let mut rx = publisher.subscribe();
        let sent = event();

        publisher.publish(sent.clone());

        assert_eq!(rx.try_recv().unwrap(), sent);
    }

    #[test]
    fn wire_shape_uses_camel_case() {
        let json = serde_json::to_value(event()).unwrap();

        assert_eq!(json["eventType"], "StatusChanged");
        assert_eq!(json["status"], "confirmed");
        assert_eq!(json["actorId"], "v1");
        assert!(json.get("itemId").is_none());
    }
}
