use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use easy_delivery::api::rest::router;
use easy_delivery::state::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;

const SENDER: &str = "00000000-0000-0000-0000-000000000001";
const TRAVELER: &str = "00000000-0000-0000-0000-000000000002";
const ADMIN: &str = "00000000-0000-0000-0000-00000000000a";

fn setup() -> axum::Router {
    router(Arc::new(AppState::new(1024, 0)))
}

fn json_request(method: &str, uri: &str, user: &str, role: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", user)
        .header("x-user-role", role)
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str, user: &str, role: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-user-id", user)
        .header("x-user-role", role)
        .body(Body::empty())
        .unwrap()
}

fn bare_get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn delivery_payload(weight_kg: f64, cost: i64) -> Value {
    json!({
        "title": "Documents",
        "origin": "Dhaka",
        "destination": "Sylhet",
        "weight_kg": weight_kg,
        "deadline": (Utc::now() + Duration::days(3)).to_rfc3339(),
        "cost": cost
    })
}

fn trip_payload(max_weight_kg: f64) -> Value {
    json!({
        "origin": "Dhaka",
        "destination": "Sylhet",
        "travel_date": (Utc::now() + Duration::days(1)).to_rfc3339(),
        "max_weight_kg": max_weight_kg,
        "cost_per_kg": 10
    })
}

async fn top_up(app: &axum::Router, user: &str, amount: i64) {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/wallet/transactions",
            user,
            "sender",
            json!({ "kind": "Credit", "amount": amount, "description": "top up" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

async fn create_delivery(app: &axum::Router, payload: Value) -> Value {
    let res = app
        .clone()
        .oneshot(json_request("POST", "/deliveries", SENDER, "sender", payload))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await
}

async fn create_trip(app: &axum::Router, payload: Value) -> Value {
    let res = app
        .clone()
        .oneshot(json_request("POST", "/trips", TRAVELER, "traveler", payload))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(bare_get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["requests"], 0);
    assert_eq!(body["trips"], 0);
    assert_eq!(body["wallets"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(bare_get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("open_requests"));
}

#[tokio::test]
async fn missing_identity_headers_returns_403() {
    let app = setup();
    let response = app.oneshot(bare_get("/deliveries")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "authorization");
}

#[tokio::test]
async fn create_delivery_starts_posted() {
    let app = setup();
    let delivery = create_delivery(&app, delivery_payload(5.0, 50)).await;

    assert_eq!(delivery["status"], "Posted");
    assert_eq!(delivery["request_status"], "None");
    assert_eq!(delivery["tracking_id"].as_str().unwrap().len(), 16);
    assert_eq!(delivery["path"].as_array().unwrap().len(), 4);
    assert_eq!(delivery["total_estimated_minutes"], 90);
    assert!(delivery["traveler"].is_null());
}

#[tokio::test]
async fn create_delivery_with_bad_input_returns_422() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/deliveries",
            SENDER,
            "sender",
            delivery_payload(0.0, 50),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
async fn trip_with_zero_weight_returns_422() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/trips",
            TRAVELER,
            "traveler",
            trip_payload(0.0),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn matcher_finds_the_compatible_trip() {
    let app = setup();
    create_delivery(&app, delivery_payload(5.0, 50)).await;
    let trip = create_trip(&app, trip_payload(20.0)).await;

    let response = app
        .clone()
        .oneshot(get_request("/matches", SENDER, "sender"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let matches = body_json(response).await;
    let list = matches.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["trip_id"], trip["id"]);
    assert_eq!(list[0]["score"], 100.0);
}

#[tokio::test]
async fn matcher_ordering_is_stable_across_calls() {
    let app = setup();
    create_delivery(&app, delivery_payload(5.0, 50)).await;
    create_trip(&app, trip_payload(20.0)).await;
    create_trip(&app, trip_payload(10.0)).await;

    let first = body_json(
        app.clone()
            .oneshot(get_request("/matches", ADMIN, "admin"))
            .await
            .unwrap(),
    )
    .await;
    let second = body_json(
        app.clone()
            .oneshot(get_request("/matches", ADMIN, "admin"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first, second);
    assert_eq!(first.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn full_delivery_flow_settles_both_wallets() {
    let app = setup();
    top_up(&app, SENDER, 50).await;

    let delivery = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();
    let trip = create_trip(&app, trip_payload(20.0)).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/request"),
            TRAVELER,
            "traveler",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/approve"),
            SENDER,
            "sender",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let approved = body_json(res).await;
    assert_eq!(approved["status"], "Approved");
    assert_eq!(approved["settlement"], "Held");

    // The hold emptied the sender's wallet and reserved trip capacity.
    let wallet = body_json(
        app.clone()
            .oneshot(get_request("/wallet", SENDER, "sender"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(wallet["balance"], 0);

    let trip = body_json(
        app.clone()
            .oneshot(get_request(&format!("/trips/{trip_id}"), SENDER, "sender"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(trip["available_weight_kg"], 15.0);

    for target in ["PickedUp", "InTransit", "Delivered"] {
        let res = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                &format!("/deliveries/{delivery_id}/status"),
                TRAVELER,
                "traveler",
                json!({ "target": target }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let wallet = body_json(
        app.clone()
            .oneshot(get_request("/wallet", TRAVELER, "traveler"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(wallet["balance"], 50);
    assert_eq!(wallet["reward_points"], 5);

    let trip = body_json(
        app.clone()
            .oneshot(get_request(&format!("/trips/{trip_id}"), SENDER, "sender"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(trip["status"], "Completed");
    assert_eq!(trip["available_weight_kg"], 20.0);

    let tracking = body_json(
        app.clone()
            .oneshot(get_request(
                &format!("/deliveries/{delivery_id}/tracking"),
                SENDER,
                "sender",
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(tracking["status"], "Delivered");
    assert!(
        tracking["path"]
            .as_array()
            .unwrap()
            .iter()
            .all(|c| c["status"] == "Delivered")
    );
}

#[tokio::test]
async fn skipping_stages_returns_invalid_transition() {
    let app = setup();
    top_up(&app, SENDER, 50).await;
    let delivery = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/deliveries/{delivery_id}/status"),
            TRAVELER,
            "traveler",
            json!({ "target": "Delivered" }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = body_json(res).await;
    assert_eq!(body["error"]["kind"], "invalid_transition");
}

#[tokio::test]
async fn approving_without_funds_returns_402_and_changes_nothing() {
    let app = setup();
    top_up(&app, SENDER, 10).await;
    let delivery = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();
    let trip = create_trip(&app, trip_payload(20.0)).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/request"),
            TRAVELER,
            "traveler",
            json!({}),
        ))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/approve"),
            SENDER,
            "sender",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(res).await;
    assert_eq!(body["error"]["kind"], "insufficient_balance");

    let delivery = body_json(
        app.clone()
            .oneshot(get_request(
                &format!("/deliveries/{delivery_id}"),
                SENDER,
                "sender",
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(delivery["status"], "Posted");
    assert_eq!(delivery["request_status"], "Requested");

    let trip = body_json(
        app.clone()
            .oneshot(get_request(&format!("/trips/{trip_id}"), SENDER, "sender"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(trip["available_weight_kg"], 20.0);
}

#[tokio::test]
async fn second_approval_beyond_capacity_returns_409() {
    let app = setup();
    top_up(&app, SENDER, 100).await;

    let first = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let second = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let trip = create_trip(&app, trip_payload(5.0)).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    for delivery in [&first, &second] {
        let id = delivery["id"].as_str().unwrap();
        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/deliveries/{id}/request"),
                TRAVELER,
                "traveler",
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let first_id = first["id"].as_str().unwrap();
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{first_id}/approve"),
            SENDER,
            "sender",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let second_id = second["id"].as_str().unwrap();
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{second_id}/approve"),
            SENDER,
            "sender",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let body = body_json(res).await;
    assert_eq!(body["error"]["kind"], "insufficient_capacity");
}

#[tokio::test]
async fn non_owner_cannot_approve() {
    let app = setup();
    let delivery = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();
    create_trip(&app, trip_payload(20.0)).await;

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/request"),
            TRAVELER,
            "traveler",
            json!({}),
        ))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/approve"),
            "00000000-0000-0000-0000-0000000000ff",
            "sender",
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cancel_after_approval_refunds_the_sender() {
    let app = setup();
    top_up(&app, SENDER, 50).await;
    let delivery = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();
    let trip = create_trip(&app, trip_payload(20.0)).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/request"),
            TRAVELER,
            "traveler",
            json!({}),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/approve"),
            SENDER,
            "sender",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/cancel"),
            SENDER,
            "sender",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let cancelled = body_json(res).await;
    assert_eq!(cancelled["status"], "Cancelled");
    assert_eq!(cancelled["settlement"], "Refunded");

    let wallet = body_json(
        app.clone()
            .oneshot(get_request("/wallet", SENDER, "sender"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(wallet["balance"], 50);

    let trip = body_json(
        app.clone()
            .oneshot(get_request(&format!("/trips/{trip_id}"), SENDER, "sender"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(trip["available_weight_kg"], 20.0);
}

#[tokio::test]
async fn review_requires_delivery_and_is_unique() {
    let app = setup();
    top_up(&app, SENDER, 50).await;
    let delivery = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();
    let trip = create_trip(&app, trip_payload(20.0)).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    // Not delivered yet.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/reviews",
            SENDER,
            "sender",
            json!({ "request_id": delivery_id, "rating": 5 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/request"),
            TRAVELER,
            "traveler",
            json!({}),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/approve"),
            SENDER,
            "sender",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();
    for target in ["PickedUp", "InTransit", "Delivered"] {
        app.clone()
            .oneshot(json_request(
                "PATCH",
                &format!("/deliveries/{delivery_id}/status"),
                TRAVELER,
                "traveler",
                json!({ "target": target }),
            ))
            .await
            .unwrap();
    }

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/reviews",
            SENDER,
            "sender",
            json!({ "request_id": delivery_id, "rating": 5, "comment": "fast" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let review = body_json(res).await;
    assert_eq!(review["reviewee"], TRAVELER);

    // Second review by the same party is rejected.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/reviews",
            SENDER,
            "sender",
            json!({ "request_id": delivery_id, "rating": 4 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .clone()
        .oneshot(get_request(&format!("/reviews/{TRAVELER}"), SENDER, "sender"))
        .await
        .unwrap();
    let reviews = body_json(res).await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn fraud_resolution_refunds_the_sender() {
    let app = setup();
    top_up(&app, SENDER, 50).await;
    let delivery = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();
    let trip = create_trip(&app, trip_payload(20.0)).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/request"),
            TRAVELER,
            "traveler",
            json!({}),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/approve"),
            SENDER,
            "sender",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/fraud-reports",
            SENDER,
            "sender",
            json!({ "request_id": delivery_id, "description": "parcel never moved" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report = body_json(res).await;
    let report_id = report["id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/fraud-reports/{report_id}"),
            ADMIN,
            "admin",
            json!({ "status": "Resolved", "refund_sender": true }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let wallet = body_json(
        app.clone()
            .oneshot(get_request("/wallet", SENDER, "sender"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(wallet["balance"], 50);
}

#[tokio::test]
async fn lifecycle_transitions_raise_notifications() {
    let app = setup();
    let delivery = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/request"),
            TRAVELER,
            "traveler",
            json!({}),
        ))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(get_request("/notifications", SENDER, "sender"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let notifications = body_json(res).await;
    let list = notifications.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Traveler interested");
    assert_eq!(list[0]["read"], false);
}

#[tokio::test]
async fn messages_flow_between_the_two_parties() {
    let app = setup();
    top_up(&app, SENDER, 50).await;
    let delivery = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();
    let trip = create_trip(&app, trip_payload(20.0)).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    // No counterpart before a traveler is bound.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/messages",
            SENDER,
            "sender",
            json!({ "request_id": delivery_id, "body": "anyone there?" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/request"),
            TRAVELER,
            "traveler",
            json!({}),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/approve"),
            SENDER,
            "sender",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/messages",
            SENDER,
            "sender",
            json!({ "request_id": delivery_id, "body": "handle with care" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(get_request(
            &format!("/messages/{delivery_id}"),
            TRAVELER,
            "traveler",
        ))
        .await
        .unwrap();
    let messages = body_json(res).await;
    let list = messages.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["body"], "handle with care");
    assert_eq!(list[0]["to"], TRAVELER);
}

#[tokio::test]
async fn admin_analytics_reports_counts_and_volume() {
    let app = setup();
    top_up(&app, SENDER, 50).await;
    let delivery = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();
    let trip = create_trip(&app, trip_payload(20.0)).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/request"),
            TRAVELER,
            "traveler",
            json!({}),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/approve"),
            SENDER,
            "sender",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();
    for target in ["PickedUp", "InTransit", "Delivered"] {
        app.clone()
            .oneshot(json_request(
                "PATCH",
                &format!("/deliveries/{delivery_id}/status"),
                TRAVELER,
                "traveler",
                json!({ "target": target }),
            ))
            .await
            .unwrap();
    }

    // Non-admins are turned away.
    let res = app
        .clone()
        .oneshot(get_request("/admin/analytics", SENDER, "sender"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .clone()
        .oneshot(get_request("/admin/analytics", ADMIN, "admin"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let analytics = body_json(res).await;
    assert_eq!(analytics["requests_total"], 1);
    assert_eq!(analytics["requests_by_status"]["delivered"], 1);
    assert_eq!(analytics["volume_released"], 50);
    assert_eq!(analytics["trips_total"], 1);
}

#[tokio::test]
async fn deleting_a_matched_delivery_is_rejected() {
    let app = setup();
    top_up(&app, SENDER, 50).await;
    let delivery = create_delivery(&app, delivery_payload(5.0, 50)).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();
    let trip = create_trip(&app, trip_payload(20.0)).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/request"),
            TRAVELER,
            "traveler",
            json!({}),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/approve"),
            SENDER,
            "sender",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/deliveries/{delivery_id}"))
                .header("x-user-id", SENDER)
                .header("x-user-role", "sender")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CONFLICT);
}
