//! One conformance and prediction pass over the tracked population

use crate::model::{Flight, FlightPlan, FlightTrack, Trajectory};
use crate::monitor::{ConformanceMonitor, ConformanceReport};
use crate::params::Parameters;
use crate::route_tracker::RouteTracker;
use crate::synthesizer::TrajectorySynthesizer;
use crate::Result;
use flight_geometry::{Bounds, CoordinateTransform};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// What to do with a flight whose route cannot be followed
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Predict by straight-line extrapolation instead
    #[default]
    DeadReckon,
    /// Leave the flight without a trajectory
    Omit,
}

/// Immutable outcome of one cycle, keyed by flight id
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CycleResult {
    flights: BTreeMap<String, Flight>,
    blunders: BTreeSet<String>,
    trajectories: BTreeMap<String, Trajectory>,
    conformance: BTreeMap<String, ConformanceReport>,
    faults: BTreeMap<String, String>,
}

impl CycleResult {
    pub fn flights(&self) -> &BTreeMap<String, Flight> {
        &self.flights
    }

    pub fn blunders(&self) -> &BTreeSet<String> {
        &self.blunders
    }

    pub fn trajectories(&self) -> &BTreeMap<String, Trajectory> {
        &self.trajectories
    }

    /// Residual breakdown for every planned flight that was evaluated
    pub fn conformance(&self) -> &BTreeMap<String, ConformanceReport> {
        &self.conformance
    }

    /// Isolated per-flight faults, by flight id
    pub fn faults(&self) -> &BTreeMap<String, String> {
        &self.faults
    }

    pub fn is_blundering(&self, id: &str) -> bool {
        self.blunders.contains(id)
    }

    pub fn trajectory(&self, id: &str) -> Option<&Trajectory> {
        self.trajectories.get(id)
    }

    pub fn flight_count(&self) -> usize {
        self.flights.len()
    }
}

/// Orchestrates the per-flight pipeline. Holds no state between runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputationCycle {
    tracker: RouteTracker,
    monitor: ConformanceMonitor,
    synthesizer: TrajectorySynthesizer,
    fault_policy: FaultPolicy,
}

/// Per-flight outcome before aggregation
enum Prediction {
    Untracked,
    DeadReckoned(Trajectory),
    Evaluated {
        report: ConformanceReport,
        trajectory: Result<Trajectory>,
    },
}

impl ComputationCycle {
    /// All components share one projection
    pub fn new(transform: CoordinateTransform) -> Self {
        Self::from_components(
            RouteTracker::new(transform),
            ConformanceMonitor::new(transform),
            TrajectorySynthesizer::new(transform),
        )
    }

    pub fn from_components(
        tracker: RouteTracker,
        monitor: ConformanceMonitor,
        synthesizer: TrajectorySynthesizer,
    ) -> Self {
        Self {
            tracker,
            monitor,
            synthesizer,
            fault_policy: FaultPolicy::default(),
        }
    }

    pub fn with_fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }

    pub fn run<'a>(
        &self,
        flights: impl IntoIterator<Item = &'a Flight>,
        bounds: &Bounds,
        params: &Parameters,
    ) -> CycleResult {
        let mut result = CycleResult::default();

        for flight in flights {
            if result.flights.contains_key(&flight.id) {
                warn!("Duplicate flight {} in cycle input, keeping first", flight.id);
                continue;
            }
            result.flights.insert(flight.id.clone(), flight.clone());

            match self.predict(flight, bounds, params) {
                Prediction::Untracked => {
                    debug!("Flight {} has no track, no trajectory", flight.id);
                }
                Prediction::DeadReckoned(trajectory) => {
                    result.trajectories.insert(flight.id.clone(), trajectory);
                }
                Prediction::Evaluated { report, trajectory } => {
                    if report.blundering {
                        result.blunders.insert(flight.id.clone());
                    }
                    result.conformance.insert(flight.id.clone(), report);

                    self.settle(&mut result, flight, trajectory, bounds, params);
                }
            }
        }

        info!(
            "Cycle complete: {} flights, {} blundering, {} trajectories, {} faults",
            result.flights.len(),
            result.blunders.len(),
            result.trajectories.len(),
            result.faults.len()
        );

        result
    }

    /// Record a route-following outcome, applying the fault policy on error
    fn settle(
        &self,
        result: &mut CycleResult,
        flight: &Flight,
        trajectory: Result<Trajectory>,
        bounds: &Bounds,
        params: &Parameters,
    ) {
        let e = match trajectory {
            Ok(trajectory) => {
                result.trajectories.insert(flight.id.clone(), trajectory);
                return;
            }
            Err(e) => e,
        };

        warn!("Flight {}: {} ({:?})", flight.id, e, self.fault_policy);
        result.faults.insert(flight.id.clone(), e.to_string());

        if let (FaultPolicy::DeadReckon, Some(track)) = (self.fault_policy, flight.track.as_ref()) {
            let fallback = self.synthesizer.dead_reckon(track, params.time_horizon, bounds);
            result.trajectories.insert(flight.id.clone(), fallback);
        }
    }

    fn predict(&self, flight: &Flight, bounds: &Bounds, params: &Parameters) -> Prediction {
        let Some(track) = flight.track.as_ref() else {
            return Prediction::Untracked;
        };

        match flight.plan.as_ref() {
            None => {
                debug!("Flight {} has no plan, dead reckoning", flight.id);
                Prediction::DeadReckoned(self.synthesizer.dead_reckon(
                    track,
                    params.time_horizon,
                    bounds,
                ))
            }
            Some(plan) => self.evaluate(&flight.id, track, plan, bounds, params),
        }
    }

    fn evaluate(
        &self,
        id: &str,
        track: &FlightTrack,
        plan: &FlightPlan,
        bounds: &Bounds,
        params: &Parameters,
    ) -> Prediction {
        let route_track = self.tracker.find_route_track(track, plan, bounds);
        let report = self.monitor.assess(track, &route_track.track, params, bounds);

        let trajectory = if report.blundering {
            debug!("Flight {} blundering (residual {:.3})", id, report.residual);
            Ok(self.synthesizer.dead_reckon(track, params.time_horizon, bounds))
        } else {
            debug!("Flight {} conforming (residual {:.3})", id, report.residual);
            self.synthesizer
                .route_follow(&route_track, &plan.route, params, bounds)
        };

        Prediction::Evaluated { report, trajectory }
    }
}

/// Export predicted trajectories to GeoJSON, one LineString per flight
pub fn to_geojson(result: &CycleResult) -> serde_json::Value {
    let features: Vec<serde_json::Value> = result
        .trajectories
        .iter()
        .map(|(id, trajectory)| {
            let coordinates: Vec<[f64; 3]> = trajectory
                .points()
                .iter()
                .map(|p| [p.longitude, p.latitude, p.altitude])
                .collect();
            let times: Vec<String> = trajectory
                .points()
                .iter()
                .map(|p| p.time.to_rfc3339())
                .collect();

            serde_json::json!({
                "type": "Feature",
                "geometry": {
                    "type": "LineString",
                    "coordinates": coordinates
                },
                "properties": {
                    "id": id,
                    "blundering": result.is_blundering(id),
                    "residual": result.conformance.get(id).map(|r| r.residual),
                    "times": times
                }
            })
        })
        .collect();

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
        "metadata": {
            "flights": result.flights.len(),
            "blunders": result.blunders
        }
    })
}
