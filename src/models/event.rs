use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::OrderStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    StatusChanged,
    PickerAssigned,
    RiderAssigned,
    PackingUpdated,
}

/// Outbound fulfillment event. Delivery is at-least-once, so consumers dedupe on
/// `(orderId, version, eventType)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentEvent {
    pub event_type: EventType,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub version: u64,
    pub actor_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personnel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
