use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::notification::Notification;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", post(mark_read))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Json<Vec<Notification>> {
    let mut notifications: Vec<Notification> = state
        .notifications
        .iter()
        .filter(|entry| entry.value().user == actor.id)
        .map(|entry| entry.value().clone())
        .collect();
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Json(notifications)
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let mut notification = state
        .notifications
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("notification {id} not found")))?;

    if notification.user != actor.id {
        return Err(AppError::Authorization(
            "not your notification".to_string(),
        ));
    }

    notification.read = true;
    Ok(Json(notification.clone()))
}
