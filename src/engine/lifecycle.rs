use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::engine::{matching, settlement};
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::delivery::{
    self, CheckpointStatus, DeliveryRequest, DeliveryStatus, PathCheckpoint, RequestStatus,
    SettlementState, StatusTimestamps,
};
use crate::models::fraud::{FraudReport, FraudStatus};
use crate::models::notification::NotificationKind;
use crate::models::trip::TripStatus;
use crate::state::AppState;

pub struct NewRequest {
    pub title: String,
    pub description: Option<String>,
    pub origin: String,
    pub origin_address: Option<String>,
    pub destination: String,
    pub destination_address: Option<String>,
    pub weight_kg: f64,
    pub deadline: DateTime<Utc>,
    pub cost: i64,
}

pub fn create_request(
    state: &AppState,
    actor: &Actor,
    input: NewRequest,
) -> Result<DeliveryRequest, AppError> {
    if actor.role != Role::Sender && !actor.is_admin() {
        return Err(AppError::Authorization(
            "only senders may post delivery requests".to_string(),
        ));
    }
    if input.title.trim().is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }
    if input.origin.trim().is_empty() || input.destination.trim().is_empty() {
        return Err(AppError::Validation(
            "origin and destination are required".to_string(),
        ));
    }
    if !(input.weight_kg > 0.0) {
        return Err(AppError::Validation("weight must be positive".to_string()));
    }
    if input.cost <= 0 {
        return Err(AppError::Validation("cost must be positive".to_string()));
    }

    let now = Utc::now();
    if input.deadline <= now {
        return Err(AppError::Validation(
            "deadline must be in the future".to_string(),
        ));
    }

    let mut status_timestamps = StatusTimestamps::default();
    status_timestamps.stamp(DeliveryStatus::Posted, now);

    let request = DeliveryRequest {
        id: Uuid::new_v4(),
        tracking_id: delivery::new_tracking_id(),
        sender: actor.id,
        title: input.title,
        description: input.description,
        path: delivery::default_path(&input.origin, &input.destination),
        origin: input.origin,
        origin_address: input.origin_address,
        destination: input.destination,
        destination_address: input.destination_address,
        weight_kg: input.weight_kg,
        deadline: input.deadline,
        cost: input.cost,
        status: DeliveryStatus::Posted,
        request_status: RequestStatus::None,
        requested_by: None,
        traveler: None,
        trip: None,
        status_timestamps,
        total_estimated_minutes: delivery::DEFAULT_TOTAL_MINUTES,
        settlement: SettlementState::None,
        created_at: now,
    };

    state.requests.insert(request.id, request.clone());
    state.metrics.open_requests.inc();
    state
        .metrics
        .transitions_total
        .with_label_values(&[stage_label(DeliveryStatus::Posted)])
        .inc();

    info!(
        request_id = %request.id,
        tracking_id = %request.tracking_id,
        "delivery request posted"
    );

    Ok(request)
}

/// A traveler offers to carry an open request.
pub fn request_traveler(
    state: &AppState,
    actor: &Actor,
    request_id: Uuid,
) -> Result<DeliveryRequest, AppError> {
    if actor.role != Role::Traveler && !actor.is_admin() {
        return Err(AppError::Authorization(
            "only travelers may offer to carry a delivery".to_string(),
        ));
    }

    let snapshot = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| not_found(request_id))?;

        if request.sender == actor.id {
            return Err(AppError::Conflict(
                "cannot offer to carry your own delivery".to_string(),
            ));
        }
        if request.status != DeliveryStatus::Posted
            || request.request_status != RequestStatus::None
        {
            return Err(AppError::Conflict(
                "delivery is not open for traveler requests".to_string(),
            ));
        }

        request.request_status = RequestStatus::Requested;
        request.requested_by = Some(actor.id);
        request.clone()
    };

    state.notify(
        snapshot.sender,
        "Traveler interested",
        format!("A traveler offered to carry \"{}\"", snapshot.title),
        NotificationKind::Delivery,
        Some(request_id),
    );
    info!(request_id = %request_id, traveler = %actor.id, "traveler requested delivery");

    Ok(snapshot)
}

/// The owning sender approves the pending traveler. Binds the trip, reserves
/// its capacity, and places the cost hold as one failure unit: if the debit
/// fails, the capacity reservation is returned and the request is untouched.
pub fn approve_traveler(
    state: &AppState,
    actor: &Actor,
    request_id: Uuid,
    trip_id: Option<Uuid>,
) -> Result<DeliveryRequest, AppError> {
    let (snapshot, traveler) = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| not_found(request_id))?;

        if request.sender != actor.id && !actor.is_admin() {
            return Err(AppError::Authorization(
                "only the sender may approve a traveler".to_string(),
            ));
        }
        if request.status != DeliveryStatus::Posted
            || request.request_status != RequestStatus::Requested
        {
            return Err(AppError::Conflict(
                "no pending traveler request to approve".to_string(),
            ));
        }

        let traveler = request.requested_by.ok_or_else(|| {
            AppError::Internal("requested state without a requesting traveler".to_string())
        })?;

        let trip_id = match trip_id {
            Some(id) => id,
            None => pick_trip_for(state, traveler, &request)?,
        };

        // Capacity is re-checked under the trip guard, closing the race
        // between senders approving against the same trip.
        {
            let mut trip = state.trips.get_mut(&trip_id).ok_or_else(|| {
                AppError::NotFound(format!("trip {trip_id} not found"))
            })?;

            if trip.traveler != traveler {
                return Err(AppError::Conflict(
                    "trip does not belong to the requesting traveler".to_string(),
                ));
            }
            if trip.status != TripStatus::Active {
                return Err(AppError::Conflict("trip is not active".to_string()));
            }
            if trip.available_weight_kg < request.weight_kg {
                return Err(AppError::InsufficientCapacity(format!(
                    "trip has {:.1}kg left, delivery needs {:.1}kg",
                    trip.available_weight_kg, request.weight_kg
                )));
            }

            trip.available_weight_kg -= request.weight_kg;
            trip.in_flight += 1;
        }

        if let Err(err) = settlement::hold(
            state,
            request.sender,
            request.cost,
            request.id,
            &request.tracking_id,
        ) {
            if let Some(mut trip) = state.trips.get_mut(&trip_id) {
                trip.available_weight_kg += request.weight_kg;
                trip.in_flight -= 1;
            }
            return Err(err);
        }

        let now = Utc::now();
        request.status_timestamps.stamp(DeliveryStatus::Requested, now);
        request.status_timestamps.stamp(DeliveryStatus::Approved, now);
        request.status = DeliveryStatus::Approved;
        request.request_status = RequestStatus::Approved;
        request.traveler = Some(traveler);
        request.trip = Some(trip_id);
        request.settlement = SettlementState::Held;

        (request.clone(), traveler)
    };

    state.metrics.open_requests.dec();
    for stage in [DeliveryStatus::Requested, DeliveryStatus::Approved] {
        state
            .metrics
            .transitions_total
            .with_label_values(&[stage_label(stage)])
            .inc();
    }
    state.notify(
        traveler,
        "Delivery approved",
        format!("You are confirmed to carry \"{}\"", snapshot.title),
        NotificationKind::Delivery,
        Some(request_id),
    );
    info!(
        request_id = %request_id,
        traveler = %traveler,
        trip_id = ?snapshot.trip,
        cost = snapshot.cost,
        "delivery approved, hold placed"
    );

    Ok(snapshot)
}

/// The sole transition primitive for the transit progress stages.
/// `target` must be exactly the successor of the current status.
pub fn advance_status(
    state: &AppState,
    actor: &Actor,
    request_id: Uuid,
    target: DeliveryStatus,
) -> Result<DeliveryRequest, AppError> {
    if !matches!(
        target,
        DeliveryStatus::PickedUp | DeliveryStatus::InTransit | DeliveryStatus::Delivered
    ) {
        return Err(AppError::InvalidTransition(format!(
            "{target:?} is not a transit progress stage"
        )));
    }

    let snapshot = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| not_found(request_id))?;

        if request.status.successor() != Some(target) {
            return Err(AppError::InvalidTransition(format!(
                "cannot move from {:?} to {:?}",
                request.status, target
            )));
        }
        if request.traveler != Some(actor.id) && !actor.is_admin() {
            return Err(AppError::Authorization(
                "only the assigned traveler may advance this delivery".to_string(),
            ));
        }

        if target == DeliveryStatus::Delivered {
            let traveler = request.traveler.ok_or_else(|| {
                AppError::Internal("delivering request without a bound traveler".to_string())
            })?;

            // Weight leaves the trip; the last in-flight delivery completes it.
            if let Some(trip_id) = request.trip {
                if let Some(mut trip) = state.trips.get_mut(&trip_id) {
                    trip.available_weight_kg =
                        (trip.available_weight_kg + request.weight_kg).min(trip.max_weight_kg);
                    trip.in_flight = trip.in_flight.saturating_sub(1);
                    if trip.in_flight == 0 {
                        trip.status = TripStatus::Completed;
                    }
                }
            }

            let payout = settlement::payout_after_fee(request.cost, state.platform_fee_bps);
            if payout > 0 {
                settlement::release(state, traveler, payout, request.id, &request.tracking_id)?;
            }
            request.settlement = SettlementState::Released;
        }

        let now = Utc::now();
        request.status = target;
        request.status_timestamps.stamp(target, now);
        update_path(&mut request.path, target);

        request.clone()
    };

    state
        .metrics
        .transitions_total
        .with_label_values(&[stage_label(target)])
        .inc();

    let (title, message) = match target {
        DeliveryStatus::PickedUp => (
            "Parcel picked up",
            format!("\"{}\" was picked up by your traveler", snapshot.title),
        ),
        DeliveryStatus::InTransit => (
            "Parcel in transit",
            format!("\"{}\" is on its way", snapshot.title),
        ),
        _ => (
            "Parcel delivered",
            format!("\"{}\" was delivered", snapshot.title),
        ),
    };
    state.notify(
        snapshot.sender,
        title,
        message,
        NotificationKind::Delivery,
        Some(request_id),
    );

    if target == DeliveryStatus::Delivered {
        if let Some(traveler) = snapshot.traveler {
            state.notify(
                traveler,
                "Payment released",
                format!("Payout for \"{}\" was credited to your wallet", snapshot.title),
                NotificationKind::Payment,
                Some(request_id),
            );
        }
    }

    info!(request_id = %request_id, status = ?target, "delivery status advanced");

    Ok(snapshot)
}

/// Either party backs out of a not-yet-approved negotiation. No wallet or
/// capacity effect; the request returns to the open pool.
pub fn reject_request(
    state: &AppState,
    actor: &Actor,
    request_id: Uuid,
) -> Result<DeliveryRequest, AppError> {
    let (snapshot, counterpart) = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| not_found(request_id))?;

        if request.status != DeliveryStatus::Posted
            || request.request_status != RequestStatus::Requested
        {
            return Err(AppError::Conflict(
                "no pending traveler request to reject".to_string(),
            ));
        }

        let requester = request.requested_by.ok_or_else(|| {
            AppError::Internal("requested state without a requesting traveler".to_string())
        })?;

        let allowed = actor.id == request.sender || actor.id == requester || actor.is_admin();
        if !allowed {
            return Err(AppError::Authorization(
                "only the sender or the requesting traveler may reject".to_string(),
            ));
        }

        request.request_status = RequestStatus::None;
        request.requested_by = None;

        let counterpart = if actor.id == request.sender {
            requester
        } else {
            request.sender
        };
        (request.clone(), counterpart)
    };

    state.notify(
        counterpart,
        "Traveler request withdrawn",
        format!("The match for \"{}\" was declined", snapshot.title),
        NotificationKind::Delivery,
        Some(request_id),
    );
    info!(request_id = %request_id, "traveler request rejected");

    Ok(snapshot)
}

/// Terminal cancellation. A held request refunds the sender and returns its
/// weight to the trip; an open one simply closes. Delivered requests cannot
/// be cancelled.
pub fn cancel_request(
    state: &AppState,
    actor: &Actor,
    request_id: Uuid,
) -> Result<DeliveryRequest, AppError> {
    let (snapshot, was_open) = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| not_found(request_id))?;

        if request.sender != actor.id && !actor.is_admin() {
            return Err(AppError::Authorization(
                "only the sender may cancel a delivery".to_string(),
            ));
        }
        match request.status {
            DeliveryStatus::Delivered => {
                return Err(AppError::InvalidTransition(
                    "delivered requests cannot be cancelled".to_string(),
                ));
            }
            DeliveryStatus::Cancelled => {
                return Err(AppError::InvalidTransition(
                    "request is already cancelled".to_string(),
                ));
            }
            _ => {}
        }

        let was_open = request.status == DeliveryStatus::Posted;

        if request.settlement == SettlementState::Held {
            if let Some(trip_id) = request.trip {
                if let Some(mut trip) = state.trips.get_mut(&trip_id) {
                    trip.available_weight_kg =
                        (trip.available_weight_kg + request.weight_kg).min(trip.max_weight_kg);
                    trip.in_flight = trip.in_flight.saturating_sub(1);
                }
            }
            settlement::refund(
                state,
                request.sender,
                request.cost,
                request.id,
                &request.tracking_id,
            )?;
            request.settlement = SettlementState::Refunded;
        }

        let now = Utc::now();
        request.status = DeliveryStatus::Cancelled;
        request.status_timestamps.stamp(DeliveryStatus::Cancelled, now);

        (request.clone(), was_open)
    };

    if was_open {
        state.metrics.open_requests.dec();
    }
    state
        .metrics
        .transitions_total
        .with_label_values(&[stage_label(DeliveryStatus::Cancelled)])
        .inc();

    if let Some(traveler) = snapshot.traveler {
        state.notify(
            traveler,
            "Delivery cancelled",
            format!("\"{}\" was cancelled by the sender", snapshot.title),
            NotificationKind::Delivery,
            Some(request_id),
        );
    }
    info!(request_id = %request_id, refunded = ?snapshot.settlement, "delivery cancelled");

    Ok(snapshot)
}

/// Hard delete, allowed only for an unmatched posted request. Anything past
/// that point keeps its audit trail and must go through cancellation.
pub fn delete_request(state: &AppState, actor: &Actor, request_id: Uuid) -> Result<(), AppError> {
    {
        let request = state
            .requests
            .get(&request_id)
            .ok_or_else(|| not_found(request_id))?;

        if request.sender != actor.id && !actor.is_admin() {
            return Err(AppError::Authorization(
                "only the sender may delete a delivery".to_string(),
            ));
        }
        if request.status != DeliveryStatus::Posted || request.traveler.is_some() {
            return Err(AppError::Conflict(
                "only unmatched posted requests can be deleted".to_string(),
            ));
        }
    }

    let removed = state.requests.remove_if(&request_id, |_, request| {
        request.status == DeliveryStatus::Posted && request.traveler.is_none()
    });

    match removed {
        Some(_) => {
            state.metrics.open_requests.dec();
            info!(request_id = %request_id, "delivery request deleted");
            Ok(())
        }
        None => Err(AppError::Conflict(
            "delivery request changed state during deletion".to_string(),
        )),
    }
}

/// Admin resolution of a fraud report. Resolving in the sender's favor runs
/// the cancel/refund path on the linked request before the report is marked,
/// so a failed refund leaves the report untouched.
pub fn resolve_fraud_report(
    state: &AppState,
    actor: &Actor,
    report_id: Uuid,
    status: FraudStatus,
    refund_sender: bool,
) -> Result<FraudReport, AppError> {
    if !actor.is_admin() {
        return Err(AppError::Authorization(
            "only admins may resolve fraud reports".to_string(),
        ));
    }

    let request_id = {
        let report = state
            .fraud_reports
            .get(&report_id)
            .ok_or_else(|| AppError::NotFound(format!("fraud report {report_id} not found")))?;
        report.request
    };

    if refund_sender && status == FraudStatus::Resolved {
        cancel_request(state, actor, request_id)?;
    }

    let snapshot = {
        let mut report = state
            .fraud_reports
            .get_mut(&report_id)
            .ok_or_else(|| AppError::NotFound(format!("fraud report {report_id} not found")))?;
        report.status = status;
        report.updated_at = Some(Utc::now());
        report.clone()
    };

    info!(report_id = %report_id, status = ?status, refund_sender, "fraud report resolved");

    Ok(snapshot)
}

/// The requesting traveler's earliest active trip that can carry the request.
fn pick_trip_for(
    state: &AppState,
    traveler: Uuid,
    request: &DeliveryRequest,
) -> Result<Uuid, AppError> {
    let mut best: Option<(DateTime<Utc>, Uuid)> = None;

    for entry in state.trips.iter() {
        let trip = entry.value();
        if trip.traveler != traveler || trip.status != TripStatus::Active {
            continue;
        }
        if !matching::is_candidate(request, trip) {
            continue;
        }
        let key = (trip.travel_date, trip.id);
        if best.is_none_or(|current| key < current) {
            best = Some(key);
        }
    }

    best.map(|(_, id)| id).ok_or_else(|| {
        AppError::Conflict("traveler has no suitable active trip for this delivery".to_string())
    })
}

fn update_path(path: &mut [PathCheckpoint], stage: DeliveryStatus) {
    match stage {
        DeliveryStatus::PickedUp => {
            if let Some(first) = path.first_mut() {
                first.status = CheckpointStatus::Delivered;
            }
        }
        DeliveryStatus::InTransit => {
            let last = path.len().saturating_sub(1);
            for checkpoint in path.iter_mut().take(last).skip(1) {
                checkpoint.status = CheckpointStatus::InTransit;
            }
        }
        DeliveryStatus::Delivered => {
            for checkpoint in path.iter_mut() {
                checkpoint.status = CheckpointStatus::Delivered;
            }
        }
        _ => {}
    }
}

fn stage_label(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Posted => "posted",
        DeliveryStatus::Requested => "requested",
        DeliveryStatus::Approved => "approved",
        DeliveryStatus::PickedUp => "picked_up",
        DeliveryStatus::InTransit => "in_transit",
        DeliveryStatus::Delivered => "delivered",
        DeliveryStatus::Cancelled => "cancelled",
    }
}

fn not_found(request_id: Uuid) -> AppError {
    AppError::NotFound(format!("delivery request {request_id} not found"))
}
