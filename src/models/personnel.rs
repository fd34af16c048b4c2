use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::ActorRole;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Busy,
    Offline,
}

/// Written by an external ratings system; read-only input to candidate ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub rating: f64,
    pub completed_count: u64,
}

/// A picker or rider. Both roles share one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Personnel {
    pub id: String,
    pub name: String,
    pub role: ActorRole,
    pub availability: Availability,
    pub active_order_ids: BTreeSet<Uuid>,
    pub performance_stats: PerformanceStats,
    pub updated_at: DateTime<Utc>,
}

impl Personnel {
    pub fn load(&self) -> usize {
        self.active_order_ids.len()
    }

    pub fn can_accept(&self, max_concurrency: usize) -> bool {
        self.availability == Availability::Available && self.load() < max_concurrency
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPersonnel {
    pub id: String,
    pub name: String,
    pub role: ActorRole,
    #[serde(default)]
    pub availability: Option<Availability>,
    #[serde(default)]
    pub performance_stats: Option<PerformanceStats>,
}
