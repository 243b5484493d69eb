//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{error, info, warn};

use crate::{
    catalog::{self, AgentInfo, AgentKey},
    patient::{maintenance_dose, Patient},
    state::{AppState, Timer, TimerError, TimerId},
};
use super::responses::{
    whole_minutes, ApiResponse, DoseResponse, GiveResponse, HealthResponse, NudgeRequest,
    StartRequest, StatusResponse, TimerView, TopUpRequest,
};

/// Parse an agent path segment; an unknown key is a wiring defect
fn parse_agent(raw: &str) -> Result<AgentKey, StatusCode> {
    raw.parse().map_err(|e| {
        error!("{}", e);
        StatusCode::NOT_FOUND
    })
}

/// Wrap a timer action result, mapping stale ids to 404
fn timer_response(
    state: &AppState,
    message: &str,
    result: Result<Timer, TimerError>,
) -> Result<Json<ApiResponse>, StatusCode> {
    match result {
        Ok(timer) => Ok(Json(ApiResponse::ok(
            message.to_string(),
            TimerView::new(&timer, state.now()),
        ))),
        Err(e) => {
            warn!("{}: {}", message, e);
            Err(StatusCode::NOT_FOUND)
        }
    }
}

/// Handle GET /timers - All timers with their current remaining time
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let now = state.now();
    let timers: Vec<TimerView> = state
        .timers()
        .iter()
        .map(|timer| TimerView::new(timer, now))
        .collect();
    let (last_action, last_action_time) = state.get_last_action();

    Json(StatusResponse {
        now,
        any_due: timers.iter().any(|t| t.due),
        timers,
        alert_cadence_active: state.alerts.is_cadence_running(),
        wake_lock_held: state.wake_lock.is_held(),
        uptime: state.get_uptime(),
        last_action,
        last_action_time,
    })
}

/// Handle POST /timers - Start a bolus timer
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let timer = state.start(request.agent, whole_minutes(request.minutes));
    (
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            format!("{} bolus timer started", timer.agent.info().label),
            TimerView::new(&timer, state.now()),
        )),
    )
}

/// Handle POST /give/:agent - Publish a give event for the agent
pub async fn give_handler(
    State(state): State<Arc<AppState>>,
    Path(agent): Path<String>,
) -> Result<Json<GiveResponse>, StatusCode> {
    let agent = parse_agent(&agent)?;
    let (event, delivered) = state.publish_give(agent);
    if delivered == 0 {
        warn!("Give event for {} was not delivered, timers not listening", agent);
    } else {
        info!("Give event for {} delivered to {} subscriber(s)", agent, delivered);
    }

    let now = state.now();
    let timer = state
        .timers()
        .iter()
        .find(|t| t.agent == agent)
        .map(|t| TimerView::new(t, now));
    Ok(Json(GiveResponse { event, delivered, timer }))
}

/// Handle POST /timers/:id/top-up - Switch to maintenance and restart
pub async fn top_up_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<TopUpRequest>>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let minutes = body.and_then(|Json(request)| whole_minutes(request.minutes));
    let result = state.top_up_and_restart(&TimerId::from(id), minutes);
    timer_response(&state, "Topped up and restarted", result)
}

/// Handle POST /timers/:id/nudge - Adjust the target duration
pub async fn nudge_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<NudgeRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let delta = whole_minutes(Some(request.delta_minutes)).unwrap_or(0);
    let result = state.nudge(&TimerId::from(id), delta);
    timer_response(&state, "Target adjusted", result)
}

/// Handle POST /timers/:id/silence - Stop repeat alerts for this due period
pub async fn silence_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let result = state.silence(&TimerId::from(id));
    timer_response(&state, "Silenced", result)
}

/// Handle POST /timers/:id/pause
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let result = state.pause(&TimerId::from(id));
    timer_response(&state, "Paused", result)
}

/// Handle POST /timers/:id/resume
pub async fn resume_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let result = state.resume(&TimerId::from(id));
    timer_response(&state, "Resumed", result)
}

/// Handle DELETE /timers/:id - Remove a timer permanently
pub async fn remove_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, StatusCode> {
    match state.remove(&TimerId::from(id)) {
        Ok(timer) => Ok(Json(ApiResponse::removed(format!("Timer {} removed", timer.id)))),
        Err(e) => {
            warn!("Remove: {}", e);
            Err(StatusCode::NOT_FOUND)
        }
    }
}

/// Handle GET /agents - Agent catalog
pub async fn agents_handler() -> Json<&'static [AgentInfo]> {
    Json(catalog::all())
}

/// Handle GET /agents/:agent/dose - Maintenance dose for the stored patient
pub async fn dose_handler(
    State(state): State<Arc<AppState>>,
    Path(agent): Path<String>,
) -> Result<Json<DoseResponse>, StatusCode> {
    let info = parse_agent(&agent)?.info();
    let patient = state.patient();
    Ok(Json(DoseResponse {
        agent: info.key,
        label: info.label,
        maint_dose_range_mg_per_kg: info.maint_dose_range_mg_per_kg,
        suggestion: maintenance_dose(info, patient.as_ref()),
    }))
}

/// Handle PUT /patient - Store the patient record
pub async fn patient_handler(
    State(state): State<Arc<AppState>>,
    Json(patient): Json<Patient>,
) -> Json<Patient> {
    state.set_patient(&patient);
    info!("Patient record updated");
    Json(patient)
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
