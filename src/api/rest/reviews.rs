use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::delivery::DeliveryStatus;
use crate::models::review::Review;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reviews", post(create_review))
        .route("/reviews/:user_id", get(list_reviews_for_user))
}

#[derive(Deserialize)]
pub struct CreateReviewRequest {
    pub request_id: Uuid,
    pub rating: u8,
    pub comment: Option<String>,
}

/// One review per (reviewer, reviewee, request), parties only, and only once
/// the delivery has landed.
async fn create_review(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<Json<Review>, AppError> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    let (sender, traveler, status) = {
        let request = state.requests.get(&payload.request_id).ok_or_else(|| {
            AppError::NotFound(format!("delivery request {} not found", payload.request_id))
        })?;
        (request.sender, request.traveler, request.status)
    };

    if status != DeliveryStatus::Delivered {
        return Err(AppError::Conflict(
            "only delivered requests can be reviewed".to_string(),
        ));
    }

    let traveler = traveler.ok_or_else(|| {
        AppError::Internal("delivered request without a bound traveler".to_string())
    })?;

    let reviewee = if actor.id == sender {
        traveler
    } else if actor.id == traveler {
        sender
    } else {
        return Err(AppError::Authorization(
            "not a party to this delivery".to_string(),
        ));
    };

    let already_reviewed = state.reviews.iter().any(|entry| {
        let review = entry.value();
        review.request == payload.request_id && review.reviewer == actor.id
    });
    if already_reviewed {
        return Err(AppError::Conflict(
            "you have already reviewed this delivery".to_string(),
        ));
    }

    let review = Review {
        id: Uuid::new_v4(),
        request: payload.request_id,
        reviewer: actor.id,
        reviewee,
        rating: payload.rating,
        comment: payload.comment,
        created_at: Utc::now(),
    };

    state.reviews.insert(review.id, review.clone());
    Ok(Json(review))
}

async fn list_reviews_for_user(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(user_id): Path<Uuid>,
) -> Json<Vec<Review>> {
    let mut reviews: Vec<Review> = state
        .reviews
        .iter()
        .filter(|entry| entry.value().reviewee == user_id)
        .map(|entry| entry.value().clone())
        .collect();
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Json(reviews)
}
