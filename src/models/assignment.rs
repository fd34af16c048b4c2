use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::ActorRole;

/// Ranking inputs captured at the moment a candidate was chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateScore {
    pub load: usize,
    pub capacity: usize,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    pub id: Uuid,
    pub order_id: Uuid,
    pub personnel_id: String,
    pub role: ActorRole,
    pub score: CandidateScore,
    pub attempts: u32,
    pub assigned_at: DateTime<Utc>,
}
