use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TripStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelerTrip {
    pub id: Uuid,
    pub traveler: Uuid,
    pub origin: String,
    pub destination: String,
    pub travel_date: DateTime<Utc>,
    pub max_weight_kg: f64,
    /// Remaining capacity. Invariant: `max_weight_kg - available_weight_kg`
    /// equals the summed weight of requests bound to this trip in
    /// Approved/PickedUp/InTransit.
    pub available_weight_kg: f64,
    pub cost_per_kg: i64,
    pub description: Option<String>,
    pub status: TripStatus,
    /// Count of bound, not-yet-settled requests. Reaches zero again when the
    /// last one delivers or is cancelled.
    pub in_flight: u32,
    pub created_at: DateTime<Utc>,
}

impl TravelerTrip {
    pub fn has_capacity_for(&self, weight_kg: f64) -> bool {
        self.status == TripStatus::Active && self.available_weight_kg >= weight_kg
    }
}
