//! HTTP API over the cycle scheduler
//!
//! | Route                                | Method  |
//! |--------------------------------------|---------|
//! | `/health`                            | GET     |
//! | `/api/v1/cycle`                      | GET     |
//! | `/api/v1/cycle/run`                  | POST    |
//! | `/api/v1/cycle/blunders`             | GET     |
//! | `/api/v1/flights`                    | PUT     |
//! | `/api/v1/flights/:id/trajectory`     | GET     |
//! | `/api/v1/config/parameters`          | GET/PUT |
//! | `/api/v1/config/bounds`              | GET/PUT |

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use flight_conformance::{loader, Bounds, Flight, Parameters, Trajectory};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::scheduler::{CycleSnapshot, Scheduler};

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No cycle has been computed yet")]
    NoCycle,
    #[error("No bounds configured")]
    NoBounds,
    #[error("Flight {0} has no trajectory in the latest cycle")]
    NoTrajectory(String),
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NoCycle | ApiError::NoBounds | ApiError::NoTrajectory(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::InvalidParameters(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ========== Response Types ==========

#[derive(Serialize)]
pub struct BlunderInfo {
    pub id: String,
    pub residual: Option<f64>,
}

#[derive(Serialize)]
pub struct BlundersResponse {
    pub cycle_id: Uuid,
    pub sequence: u64,
    pub blunders: Vec<BlunderInfo>,
}

#[derive(Serialize)]
pub struct TrajectoryResponse {
    pub id: String,
    pub cycle_id: Uuid,
    pub blundering: bool,
    pub trajectory: Trajectory,
}

#[derive(Serialize)]
pub struct FlightsAccepted {
    pub accepted: usize,
    pub skipped: usize,
}

// ========== Route Handlers ==========

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let latest = state.scheduler.latest();
    Json(serde_json::json!({
        "status": "healthy",
        "service": "conformance-gateway",
        "flights": state.scheduler.flight_count().await,
        "last_sequence": latest.as_ref().map(|s| s.sequence),
        "last_cycle_at": latest.as_ref().map(|s| s.computed_at),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Latest published cycle
async fn get_cycle(State(state): State<AppState>) -> ApiResult<CycleSnapshot> {
    let latest = state.scheduler.latest().ok_or(ApiError::NoCycle)?;
    Ok(Json(latest.as_ref().clone()))
}

/// Run a cycle immediately instead of waiting for the next tick
async fn run_cycle(State(state): State<AppState>) -> ApiResult<CycleSnapshot> {
    let snapshot = state.scheduler.run_once().await.ok_or(ApiError::NoBounds)?;
    Ok(Json(snapshot.as_ref().clone()))
}

async fn list_blunders(State(state): State<AppState>) -> ApiResult<BlundersResponse> {
    let latest = state.scheduler.latest().ok_or(ApiError::NoCycle)?;

    let blunders = latest
        .result
        .blunders()
        .iter()
        .map(|id| BlunderInfo {
            id: id.clone(),
            residual: latest.result.conformance().get(id).map(|r| r.residual),
        })
        .collect();

    Ok(Json(BlundersResponse {
        cycle_id: latest.cycle_id,
        sequence: latest.sequence,
        blunders,
    }))
}

async fn get_trajectory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TrajectoryResponse> {
    let latest = state.scheduler.latest().ok_or(ApiError::NoCycle)?;
    let trajectory = latest
        .result
        .trajectory(&id)
        .cloned()
        .ok_or_else(|| ApiError::NoTrajectory(id.clone()))?;

    Ok(Json(TrajectoryResponse {
        blundering: latest.result.is_blundering(&id),
        cycle_id: latest.cycle_id,
        id,
        trajectory,
    }))
}

/// Replace the whole flight snapshot used by subsequent cycles
async fn put_flights(
    State(state): State<AppState>,
    Json(flights): Json<Vec<Flight>>,
) -> Json<FlightsAccepted> {
    let (flights, skipped) = loader::sanitize_flights(flights);
    if skipped > 0 {
        warn!("Rejected {} flights with invalid coordinates", skipped);
    }

    let accepted = flights.len();
    state.scheduler.replace_flights(flights).await;

    Json(FlightsAccepted { accepted, skipped })
}

async fn get_parameters(State(state): State<AppState>) -> Json<Parameters> {
    Json(state.scheduler.parameters().await)
}

async fn put_parameters(
    State(state): State<AppState>,
    Json(parameters): Json<Parameters>,
) -> ApiResult<Parameters> {
    parameters
        .validate()
        .map_err(|e| ApiError::InvalidParameters(e.to_string()))?;
    state.scheduler.set_parameters(parameters.clone()).await;
    Ok(Json(parameters))
}

async fn get_bounds(State(state): State<AppState>) -> ApiResult<Bounds> {
    state.scheduler.bounds().await.map(Json).ok_or(ApiError::NoBounds)
}

/// Bounds are validated while deserializing; bad windows never reach the handler
async fn put_bounds(State(state): State<AppState>, Json(bounds): Json<Bounds>) -> Json<Bounds> {
    state.scheduler.set_bounds(bounds).await;
    Json(bounds)
}

// ========== Router ==========

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/cycle", get(get_cycle))
        .route("/api/v1/cycle/run", post(run_cycle))
        .route("/api/v1/cycle/blunders", get(list_blunders))
        .route("/api/v1/flights", put(put_flights))
        .route("/api/v1/flights/:id/trajectory", get(get_trajectory))
        .route(
            "/api/v1/config/parameters",
            get(get_parameters).put(put_parameters),
        )
        .route("/api/v1/config/bounds", get(get_bounds).put(put_bounds))
        .with_state(state)
}
