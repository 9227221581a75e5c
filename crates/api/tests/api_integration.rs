//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Amount, UserId};
use domain::ItemId;
use duel_store::InMemoryDuelStore;
use metrics_exporter_prometheus::PrometheusHandle;
use scheduler::InMemoryScheduler;
use serde_json::{Value, json};
use tower::ServiceExt;

type TestState = Arc<api::routes::duels::AppState<InMemoryDuelStore, InMemoryScheduler>>;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, TestState, InMemoryScheduler) {
    let scheduler = InMemoryScheduler::new();
    let state = api::create_state(InMemoryDuelStore::new(), scheduler.clone());
    let app = api::create_app(state.clone(), get_metrics_handle());

    deposit(&state, "creator-gift", 1, "5.75");
    deposit(&state, "joiner-gift", 2, "6.00");
    deposit(&state, "cheap-gift", 2, "1.00");

    (app, state, scheduler)
}

fn deposit(state: &TestState, item_id: &str, owner: i64, value: &str) {
    state.custody.deposit(
        ItemId::new(item_id).unwrap(),
        UserId::new(owner).unwrap(),
        format!("Gift {item_id}"),
        item_id,
        value.parse::<Amount>().unwrap(),
    );
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    user_id: Option<i64>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header("x-user-id", user_id.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create_duel(app: &axum::Router) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/duels",
        Some(1),
        Some(json!({
            "max_players": 2,
            "max_gifts": 3,
            "item_ids": ["creator-gift"],
            "photo_url": "https://example.com/1.png",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["id"].as_str().unwrap().to_string()
}

async fn join_duel(app: &axum::Router, duel_id: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        &format!("/duels/{duel_id}/join"),
        Some(2),
        Some(json!({ "item_ids": ["joiner-gift"] })),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = setup();

    let (status, json) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_duel() {
    let (app, state, _) = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/duels",
        Some(1),
        Some(json!({ "max_players": 2, "max_gifts": 1, "item_ids": ["creator-gift"] })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "waiting_for_opponent");
    assert_eq!(json["display_number"], 1);
    assert_eq!(json["total_stake_value"], "5.75");
    assert_eq!(json["participants"].as_array().unwrap().len(), 1);
    assert_eq!(json["participants"][0]["is_creator"], true);
    assert_eq!(json["stakes"][0]["item"]["id"], "creator-gift");

    let topics: Vec<String> = state
        .publisher
        .messages()
        .into_iter()
        .map(|m| m.topic)
        .collect();
    assert_eq!(topics, vec!["duel.created".to_string()]);
}

#[tokio::test]
async fn test_create_duel_requires_caller() {
    let (app, _, _) = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/duels",
        None,
        Some(json!({ "max_players": 2, "max_gifts": 1, "item_ids": ["creator-gift"] })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "unauthorized");
}

#[tokio::test]
async fn test_create_duel_rejects_invalid_params() {
    let (app, _, _) = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/duels",
        Some(1),
        Some(json!({ "max_players": 5, "max_gifts": 1, "item_ids": ["creator-gift"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation_error");

    let (status, json) = send(
        &app,
        "POST",
        "/duels",
        Some(1),
        Some(json!({ "max_players": 2, "max_gifts": 1, "item_ids": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "invalid_items");
}

#[tokio::test]
async fn test_join_starts_full_duel() {
    let (app, _, scheduler) = setup();
    let duel_id = create_duel(&app).await;

    let (status, json) = join_duel(&app, &duel_id).await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["status"], "in_progress");
    assert_eq!(json["rounds"][0]["round_number"], 1);
    assert!(json["next_roll_deadline"].is_string());
    assert_eq!(scheduler.task_count().await, 1);
}

#[tokio::test]
async fn test_join_rejects_stake_out_of_range() {
    let (app, state, _) = setup();
    let duel_id = create_duel(&app).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/duels/{duel_id}/join"),
        Some(2),
        Some(json!({ "item_ids": ["cheap-gift"] })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "stake_out_of_range");
    assert_eq!(
        state.publisher.released_items(),
        vec![ItemId::new("cheap-gift").unwrap()]
    );
}

#[tokio::test]
async fn test_join_unknown_duel() {
    let (app, _, _) = setup();

    let (status, json) = join_duel(&app, "missing-duel").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "duel_not_found");
}

#[tokio::test]
async fn test_roll_until_round_resolves() {
    let (app, _, _) = setup();
    let duel_id = create_duel(&app).await;
    join_duel(&app, &duel_id).await;

    let (status, json) = send(&app, "POST", &format!("/duels/{duel_id}/roll"), Some(1), None).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["outcome"], "pending");
    let face = json["roll"]["dice_value"].as_u64().unwrap();
    assert!((1..=6).contains(&face));
    assert_eq!(json["roll"]["is_auto_rolled"], false);

    let (status, json) = send(&app, "POST", &format!("/duels/{duel_id}/roll"), Some(1), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "already_rolled");

    let (status, json) = send(&app, "POST", &format!("/duels/{duel_id}/roll"), Some(2), None).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    let outcome = json["outcome"].as_str().unwrap();
    assert!(outcome == "completed" || outcome == "next_round", "{outcome}");
}

#[tokio::test]
async fn test_roll_by_outsider_is_rejected() {
    let (app, _, _) = setup();
    let duel_id = create_duel(&app).await;
    join_duel(&app, &duel_id).await;

    let (status, json) = send(&app, "POST", &format!("/duels/{duel_id}/roll"), Some(3), None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "participant_not_found");
}

#[tokio::test]
async fn test_roll_before_start_conflicts() {
    let (app, _, _) = setup();
    let duel_id = create_duel(&app).await;

    let (status, json) = send(&app, "POST", &format!("/duels/{duel_id}/roll"), Some(1), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "duel_not_in_progress");
}

#[tokio::test]
async fn test_cancel_duel_releases_items() {
    let (app, state, _) = setup();
    let duel_id = create_duel(&app).await;

    let (status, json) =
        send(&app, "POST", &format!("/duels/{duel_id}/cancel"), Some(2), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "not_creator");

    let (status, json) =
        send(&app, "POST", &format!("/duels/{duel_id}/cancel"), Some(1), None).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["status"], "cancelled");
    assert!(
        state
            .custody
            .reserved_for(&ItemId::new("creator-gift").unwrap())
            .is_none()
    );
}

#[tokio::test]
async fn test_get_duel() {
    let (app, _, _) = setup();
    let duel_id = create_duel(&app).await;

    let (status, json) = send(&app, "GET", &format!("/duels/{duel_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], duel_id.as_str());
    assert_eq!(json["max_gifts"], 3);

    let (status, json) = send(&app, "GET", "/duels/missing-duel", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");
}

#[tokio::test]
async fn test_list_duels_paginates() {
    let (app, state, _) = setup();
    for n in 0..3 {
        deposit(&state, &format!("extra-{n}"), 1, "2.00");
    }
    create_duel(&app).await;
    for n in 0..3 {
        let (status, _) = send(
            &app,
            "POST",
            "/duels",
            Some(1),
            Some(json!({ "max_players": 2, "max_gifts": 1, "item_ids": [format!("extra-{n}")] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = send(&app, "GET", "/duels?page=2&page_size=3", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 4);
    assert_eq!(json["page"], 2);
    assert_eq!(json["total_pages"], 2);
    assert_eq!(json["duels"].as_array().unwrap().len(), 1);
    assert_eq!(json["duels"][0]["display_number"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _, _) = setup();
    create_duel(&app).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}
