use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FraudStatus {
    Pending,
    Reviewed,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudReport {
    pub id: Uuid,
    pub reported_by: Uuid,
    pub request: Uuid,
    pub description: String,
    pub status: FraudStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
