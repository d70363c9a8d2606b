use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::delivery::DeliveryRequest;
use crate::models::fraud::FraudReport;
use crate::models::message::Message;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::review::Review;
use crate::models::trip::TravelerTrip;
use crate::models::wallet::Wallet;
use crate::observability::metrics::Metrics;

/// Shared in-memory stores. Per-entry `get_mut` scopes are the per-entity
/// lock; cross-entity operations acquire guards in the fixed order
/// requests -> trips -> wallets and never hold a guard while iterating the
/// same map.
pub struct AppState {
    pub requests: DashMap<Uuid, DeliveryRequest>,
    pub trips: DashMap<Uuid, TravelerTrip>,
    pub wallets: DashMap<Uuid, Wallet>,
    pub notifications: DashMap<Uuid, Notification>,
    pub reviews: DashMap<Uuid, Review>,
    pub fraud_reports: DashMap<Uuid, FraudReport>,
    pub messages: DashMap<Uuid, Message>,
    pub notification_events_tx: broadcast::Sender<Notification>,
    pub metrics: Metrics,
    pub platform_fee_bps: u32,
}

impl AppState {
    pub fn new(event_buffer_size: usize, platform_fee_bps: u32) -> Self {
        let (notification_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            requests: DashMap::new(),
            trips: DashMap::new(),
            wallets: DashMap::new(),
            notifications: DashMap::new(),
            reviews: DashMap::new(),
            fraud_reports: DashMap::new(),
            messages: DashMap::new(),
            notification_events_tx,
            metrics: Metrics::new(),
            platform_fee_bps,
        }
    }

    /// Fire-and-forget notification to a user. Failure to deliver over the
    /// event channel never affects the operation that raised it.
    pub fn notify(
        &self,
        user: Uuid,
        title: &str,
        message: String,
        kind: NotificationKind,
        request: Option<Uuid>,
    ) {
        let notification = Notification {
            id: Uuid::new_v4(),
            user,
            title: title.to_string(),
            message,
            kind,
            read: false,
            request,
            created_at: Utc::now(),
        };

        self.notifications
            .insert(notification.id, notification.clone());
        let _ = self.notification_events_tx.send(notification);
    }
}
