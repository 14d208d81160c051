//! Flight Conformance Core
//!
//! Per-cycle route conformance monitoring and short-horizon trajectory
//! prediction for flights tracked inside an operator-chosen window.
//!
//! # Pipeline
//!
//! ```text
//! Flight ──► RouteTracker ──► ConformanceMonitor ──┬─ blundering ─► dead reckoning
//!                                                  └─ conforming ─► route following
//! ```
//!
//! # Residual Model
//!
//! ```text
//! residual = mean(dev_i / threshold_i) over enabled factors i
//! ```
//!
//! | Factor   | Deviation                               | Threshold            |
//! |----------|-----------------------------------------|----------------------|
//! | lateral  | planar distance to the route track (m)  | `lateral_threshold`  |
//! | vertical | altitude difference                     | `vertical_threshold` |
//! | angular  | heading difference (rad)                | `angular_threshold`  |
//! | speed    | altitude difference (default), see [`SpeedDeviation`] | `speed_threshold` |
//!
//! A flight is blundering when the residual reaches `residual_threshold`.

use thiserror::Error;

pub mod cycle;
pub mod loader;
pub mod model;
pub mod monitor;
pub mod params;
pub mod route_tracker;
pub mod source;
pub mod synthesizer;

pub use cycle::{ComputationCycle, CycleResult, FaultPolicy};
pub use flight_geometry::{Bounds, CoordinateTransform, GeoPoint, GeometryError, PlanarPoint};
pub use model::{
    Fix, Flight, FlightPlan, FlightTrack, Route, RouteTrack, Trajectory, TrajectoryPoint,
};
pub use monitor::{ConformanceMonitor, ConformanceReport};
pub use params::{Parameters, SpeedDeviation};
pub use route_tracker::RouteTracker;
pub use source::{FlightSource, SnapshotStore};
pub use synthesizer::TrajectorySynthesizer;

#[derive(Error, Debug)]
pub enum ConformanceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("Degenerate route: next fix {0} not found in route")]
    DegenerateRoute(String),
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, ConformanceError>;
