//! Integration tests for the redose HTTP API.
//!
//! These drive the full request/response cycle against an in-memory store
//! and a manually advanced clock.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration as StdDuration,
};

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Duration;
use serde_json::{json, Value};

use redose::{
    create_router,
    services::{AlertEngine, AlertError, AlertSink, MemoryStore, Subscription, TriggerChannel, WakeLock},
    state::{AppState, Services},
    utils::ManualClock,
};

#[derive(Default)]
struct Beeps(AtomicUsize);

impl AlertSink for Beeps {
    fn name(&self) -> &'static str {
        "test"
    }

    fn pulse(&self) -> Result<(), AlertError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct TestApp {
    server: TestServer,
    state: Arc<AppState>,
    clock: Arc<ManualClock>,
    beeps: Arc<Beeps>,
    _subscription: Subscription,
}

fn create_test_app() -> TestApp {
    let clock = Arc::new(ManualClock::at_epoch_millis(1_700_000_000_000));
    let beeps = Arc::new(Beeps::default());
    let services = Services {
        clock: clock.clone(),
        store: Arc::new(MemoryStore::new()),
        alerts: AlertEngine::new(vec![beeps.clone() as Arc<dyn AlertSink>], StdDuration::from_secs(10)),
        trigger: TriggerChannel::new(),
        wake_lock: WakeLock::disabled(),
    };
    let state = Arc::new(AppState::new(services, "127.0.0.1".to_string(), 0));
    let subscription = state.attach_trigger();
    let server = TestServer::new(create_router(Arc::clone(&state))).unwrap();

    TestApp {
        server,
        state,
        clock,
        beeps,
        _subscription: subscription,
    }
}

async fn start_timer(app: &TestApp, body: Value) -> String {
    let response = app.server.post("/timers").json(&body).await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["timer"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_empty_status() {
    let app = create_test_app();
    let body: Value = app.server.get("/timers").await.json();
    assert_eq!(body["timers"], json!([]));
    assert_eq!(body["any_due"], false);
    assert_eq!(body["alert_cadence_active"], false);
}

#[tokio::test]
async fn test_rocuronium_bolus_then_top_up() {
    let app = create_test_app();
    let id = start_timer(&app, json!({ "agent": "rocuronium" })).await;

    let body: Value = app.server.get("/timers").await.json();
    assert_eq!(body["timers"][0]["title"], "Rocuronium — Bolus");
    assert_eq!(body["timers"][0]["remaining"], "31:00");

    app.clock.advance(Duration::minutes(10));
    let response = app.server.post(&format!("/timers/{}/top-up", id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["timer"]["title"], "Rocuronium — Maintenance");
    assert_eq!(body["timer"]["remaining"], "17:00");
    assert_eq!(body["timer"]["top_up_count"], 1);
    assert_eq!(app.beeps.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_custom_minute_timer_goes_overdue() {
    let app = create_test_app();
    start_timer(&app, json!({ "agent": "vecuronium", "minutes": 1 })).await;

    app.clock.advance(Duration::seconds(61));
    app.state.tick();

    let body: Value = app.server.get("/timers").await.json();
    assert_eq!(body["timers"][0]["due"], true);
    assert_eq!(body["timers"][0]["remaining"], "-00:01");
    assert_eq!(body["any_due"], true);
    assert_eq!(body["alert_cadence_active"], true);
}

#[tokio::test]
async fn test_out_of_range_minutes_are_clamped() {
    let app = create_test_app();
    start_timer(&app, json!({ "agent": "atracurium", "minutes": 999 })).await;
    start_timer(&app, json!({ "agent": "atracurium", "minutes": -5 })).await;

    let body: Value = app.server.get("/timers").await.json();
    assert_eq!(body["timers"][0]["target_minutes"], 1);
    assert_eq!(body["timers"][1]["target_minutes"], 240);
}

#[tokio::test]
async fn test_nudge_up_and_down() {
    let app = create_test_app();
    let id = start_timer(&app, json!({ "agent": "cisatracurium" })).await;

    let up: Value = app
        .server
        .post(&format!("/timers/{}/nudge", id))
        .json(&json!({ "delta_minutes": 2 }))
        .await
        .json();
    assert_eq!(up["timer"]["target_minutes"], 62);

    let down: Value = app
        .server
        .post(&format!("/timers/{}/nudge", id))
        .json(&json!({ "delta_minutes": -2 }))
        .await
        .json();
    assert_eq!(down["timer"]["target_minutes"], 60);
}

#[tokio::test]
async fn test_silence_and_remove_stop_cadence() {
    let app = create_test_app();
    let a = start_timer(&app, json!({ "agent": "rocuronium", "minutes": 1 })).await;
    let b = start_timer(&app, json!({ "agent": "atracurium", "minutes": 1 })).await;
    app.clock.advance(Duration::minutes(2));
    app.state.tick();
    assert!(app.state.alerts.is_cadence_running());

    app.server
        .post(&format!("/timers/{}/silence", a))
        .await
        .assert_status_ok();
    assert!(app.state.alerts.is_cadence_running());

    app.server
        .delete(&format!("/timers/{}", b))
        .await
        .assert_status_ok();
    assert!(!app.state.alerts.is_cadence_running());
}

#[tokio::test]
async fn test_give_starts_then_restarts() {
    let app = create_test_app();

    let first: Value = app.server.post("/give/atracurium").await.json();
    assert_eq!(first["delivered"], 1);
    assert_eq!(first["timer"]["phase"], "bolus");

    app.clock.advance(Duration::minutes(41));
    let second: Value = app.server.post("/give/atracurium").await.json();
    assert_eq!(second["timer"]["phase"], "maintenance");
    assert_eq!(second["timer"]["id"], first["timer"]["id"]);
    assert_eq!(second["timer"]["remaining"], "20:00");
}

#[tokio::test]
async fn test_unknown_agent_and_stale_timer() {
    let app = create_test_app();
    app.server
        .post("/give/sux")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .post("/timers/nope/silence")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .delete("/timers/nope")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stale_timer_leaves_last_action() {
    let app = create_test_app();
    start_timer(&app, json!({ "agent": "vecuronium" })).await;
    app.server
        .post("/timers/nope/top-up")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let body: Value = app.server.get("/timers").await.json();
    assert_eq!(body["last_action"], "start");
    assert_eq!(body["timers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_pause_and_resume() {
    let app = create_test_app();
    let id = start_timer(&app, json!({ "agent": "rocuronium", "minutes": 10 })).await;

    app.clock.advance(Duration::minutes(1));
    let paused: Value = app.server.post(&format!("/timers/{}/pause", id)).await.json();
    assert_eq!(paused["timer"]["paused"], true);

    app.clock.advance(Duration::minutes(5));
    let body: Value = app.server.get("/timers").await.json();
    assert_eq!(body["timers"][0]["remaining"], "09:00");

    let resumed: Value = app.server.post(&format!("/timers/{}/resume", id)).await.json();
    assert_eq!(resumed["timer"]["paused"], false);
    assert_eq!(resumed["timer"]["remaining"], "09:00");
}

#[tokio::test]
async fn test_dose_suggestion_needs_patient() {
    let app = create_test_app();
    let empty: Value = app.server.get("/agents/rocuronium/dose").await.json();
    assert_eq!(empty["suggestion"], Value::Null);

    app.server
        .put("/patient")
        .json(&json!({ "weightKg": 80 }))
        .await
        .assert_status_ok();

    let dose: Value = app.server.get("/agents/rocuronium/dose").await.json();
    assert_eq!(dose["suggestion"]["low_mg"], 8.0);
    assert_eq!(dose["suggestion"]["high_mg"], 16.0);
    assert_eq!(dose["suggestion"]["lean_body_weight_kg"], Value::Null);

    app.server
        .put("/patient")
        .json(&json!({ "weightKg": 80, "heightCm": 175, "sex": "F" }))
        .await
        .assert_status_ok();
    let dose: Value = app.server.get("/agents/rocuronium/dose").await.json();
    assert!(dose["suggestion"]["lean_body_weight_kg"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_agents_catalog() {
    let app = create_test_app();
    let agents: Value = app.server.get("/agents").await.json();
    assert_eq!(agents.as_array().unwrap().len(), 4);
    assert_eq!(agents[0]["key"], "rocuronium");
    assert_eq!(agents[0]["bolus_minutes_default"], 31);
    assert_eq!(agents[0]["maint_minutes_default"], 17);
}
