use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One per (reviewer, reviewee, request) triple, allowed only once the
/// request has delivered. Mean rating per reviewee feeds the matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub request: Uuid,
    pub reviewer: Uuid,
    pub reviewee: Uuid,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
