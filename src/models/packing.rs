use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemProgress {
    pub ordered_quantity: u32,
    pub picked_quantity: u32,
    pub packed: bool,
    pub note: Option<String>,
}

/// Quantity-level pick/pack progress for one order, keyed by product id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackingState {
    pub order_id: Uuid,
    pub item_progress: BTreeMap<String, ItemProgress>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortfall {
    pub item_id: String,
    pub ordered_quantity: u32,
    pub picked_quantity: u32,
    pub packed: bool,
}
