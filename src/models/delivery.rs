use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle stages in strict forward order. `Cancelled` is a terminal
/// outcome reachable from any pre-`Delivered` stage, not part of the order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryStatus {
    Posted,
    Requested,
    Approved,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    /// The only legal forward step from this stage.
    pub fn successor(self) -> Option<DeliveryStatus> {
        match self {
            DeliveryStatus::Posted => Some(DeliveryStatus::Requested),
            DeliveryStatus::Requested => Some(DeliveryStatus::Approved),
            DeliveryStatus::Approved => Some(DeliveryStatus::PickedUp),
            DeliveryStatus::PickedUp => Some(DeliveryStatus::InTransit),
            DeliveryStatus::InTransit => Some(DeliveryStatus::Delivered),
            DeliveryStatus::Delivered | DeliveryStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }
}

/// Negotiation sub-state between a sender and an interested traveler.
/// Independent of the lifecycle order; gates whether a traveler may be bound.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestStatus {
    None,
    Requested,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusTimestamps {
    pub posted: Option<DateTime<Utc>>,
    pub requested: Option<DateTime<Utc>>,
    pub approved: Option<DateTime<Utc>>,
    pub picked_up: Option<DateTime<Utc>>,
    pub in_transit: Option<DateTime<Utc>>,
    pub delivered: Option<DateTime<Utc>>,
    pub cancelled: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    pub fn stamp(&mut self, status: DeliveryStatus, at: DateTime<Utc>) {
        let slot = match status {
            DeliveryStatus::Posted => &mut self.posted,
            DeliveryStatus::Requested => &mut self.requested,
            DeliveryStatus::Approved => &mut self.approved,
            DeliveryStatus::PickedUp => &mut self.picked_up,
            DeliveryStatus::InTransit => &mut self.in_transit,
            DeliveryStatus::Delivered => &mut self.delivered,
            DeliveryStatus::Cancelled => &mut self.cancelled,
        };
        *slot = Some(at);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CheckpointStatus {
    Pending,
    InTransit,
    Delivered,
}

/// A point along the planned route with its offset from departure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathCheckpoint {
    pub location: String,
    pub eta_minutes: u32,
    pub status: CheckpointStatus,
}

/// Where the money for this request currently sits. Denormalized from the
/// wallet ledger so double release/refund is a cheap local check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SettlementState {
    None,
    Held,
    Released,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub id: Uuid,
    /// User-facing tracking identifier, distinct from the storage key.
    pub tracking_id: String,
    pub sender: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub origin: String,
    pub origin_address: Option<String>,
    pub destination: String,
    pub destination_address: Option<String>,
    pub weight_kg: f64,
    pub deadline: DateTime<Utc>,
    pub cost: i64,
    pub status: DeliveryStatus,
    pub request_status: RequestStatus,
    pub requested_by: Option<Uuid>,
    pub traveler: Option<Uuid>,
    pub trip: Option<Uuid>,
    pub status_timestamps: StatusTimestamps,
    pub path: Vec<PathCheckpoint>,
    pub total_estimated_minutes: u32,
    pub settlement: SettlementState,
    pub created_at: DateTime<Utc>,
}

/// Default planned route: origin, two generic waypoints, destination,
/// evenly spaced across [`DEFAULT_TOTAL_MINUTES`].
pub const DEFAULT_TOTAL_MINUTES: u32 = 90;

pub fn default_path(origin: &str, destination: &str) -> Vec<PathCheckpoint> {
    let step = DEFAULT_TOTAL_MINUTES / 3;
    [
        (origin.to_string(), 0),
        (format!("{origin} dispatch hub"), step),
        (format!("{destination} dispatch hub"), step * 2),
        (destination.to_string(), DEFAULT_TOTAL_MINUTES),
    ]
    .into_iter()
    .map(|(location, eta_minutes)| PathCheckpoint {
        location,
        eta_minutes,
        status: CheckpointStatus::Pending,
    })
    .collect()
}

pub fn new_tracking_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..16].to_string()
}

impl DeliveryRequest {
    /// Whether the given user is one of the two parties (sender or bound
    /// traveler) of this request.
    pub fn is_party(&self, user: Uuid) -> bool {
        self.sender == user || self.traveler == Some(user)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.deadline < now
    }
}
