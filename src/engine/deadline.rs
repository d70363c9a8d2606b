use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::models::notification::NotificationKind;
use crate::state::AppState;

/// Advisory overdue sweep. Raises a one-time notification to the sender once
/// a request passes its deadline without delivering; never transitions state,
/// so the refund path keeps its audit trail.
pub async fn run_deadline_monitor(state: Arc<AppState>, interval: Duration) {
    info!("deadline monitor started");

    let mut flagged: HashSet<Uuid> = HashSet::new();
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        let now = Utc::now();
        let overdue: Vec<(Uuid, Uuid, String)> = state
            .requests
            .iter()
            .filter(|entry| entry.value().is_overdue(now) && !flagged.contains(entry.key()))
            .map(|entry| {
                let request = entry.value();
                (request.id, request.sender, request.title.clone())
            })
            .collect();

        for (request_id, sender, title) in overdue {
            flagged.insert(request_id);
            state.notify(
                sender,
                "Delivery overdue",
                format!("\"{title}\" passed its deadline without being delivered"),
                NotificationKind::System,
                Some(request_id),
            );
            info!(request_id = %request_id, "overdue delivery flagged");
        }
    }
}
