use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conversation between the two parties of a delivery request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub request: Uuid,
    pub from: Uuid,
    pub to: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
