//! Short-horizon trajectory prediction
//!
//! Conforming flights walk their route forward at the assigned speed; anything
//! else is extrapolated in a straight line along its current heading.

use crate::model::{FlightTrack, Route, RouteTrack, Trajectory, TrajectoryPoint};
use crate::params::{duration_to_secs, secs_to_duration, Parameters};
use crate::{ConformanceError, Result};
use chrono::{DateTime, Duration, Utc};
use flight_geometry::{Bounds, CoordinateTransform};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct TrajectorySynthesizer {
    transform: CoordinateTransform,
}

impl TrajectorySynthesizer {
    pub fn new(transform: CoordinateTransform) -> Self {
        Self { transform }
    }

    /// Current state plus the point reached after `horizon` of straight flight.
    /// A zero horizon yields the current state alone.
    pub fn dead_reckon(&self, track: &FlightTrack, horizon: Duration, bounds: &Bounds) -> Trajectory {
        let mut trajectory = Trajectory::starting_at(TrajectoryPoint::from(track));

        let secs = duration_to_secs(horizon);
        if secs > 0.0 {
            let destination = self.transform.destination(
                track.position(),
                track.heading,
                track.ground_speed.max(0.0) * secs,
                bounds,
            );
            trajectory.push(TrajectoryPoint::at(
                destination,
                track.altitude,
                offset(track.timestamp, horizon),
            ));
        }

        trajectory
    }

    /// Walk the route from `route_track.next_fix` until the horizon runs out.
    ///
    /// Fixes whose arrival time stays strictly under the horizon are emitted. The
    /// first leg that would reach the horizon is cut short with a dead-reckoned
    /// point toward the unreached fix, timed at exactly `start + horizon`. An
    /// exhausted route ends at its last fix.
    pub fn route_follow(
        &self,
        route_track: &RouteTrack,
        route: &Route,
        params: &Parameters,
        bounds: &Bounds,
    ) -> Result<Trajectory> {
        let track = &route_track.track;

        if route.is_empty() {
            return Ok(self.dead_reckon(track, params.time_horizon, bounds));
        }

        let start_index = self.locate_next_fix(route_track, route)?;
        let speed = track.ground_speed;
        let horizon_secs = params.time_horizon_secs();

        let mut trajectory = Trajectory::starting_at(TrajectoryPoint::from(track));
        let mut current = self.transform.to_planar(track.latitude, track.longitude, bounds);
        let mut elapsed = 0.0;

        for fix in &route.fixes()[start_index..] {
            let target = self.transform.to_planar(fix.latitude(), fix.longitude(), bounds);
            let leg = self.transform.distance(current, target);
            let leg_secs = leg_seconds(leg, speed);

            if elapsed + leg_secs < horizon_secs {
                elapsed += leg_secs;
                if leg > 0.0 {
                    trajectory.push(TrajectoryPoint::at(
                        fix.position(),
                        track.altitude,
                        offset(track.timestamp, secs_to_duration(elapsed)),
                    ));
                }
                current = target;
                continue;
            }

            let remaining = horizon_secs - elapsed;
            if remaining > 0.0 {
                let heading = self.transform.bearing(current, target);
                let reached = self.transform.advance(current, heading, speed.max(0.0) * remaining);
                trajectory.push(TrajectoryPoint::at(
                    self.transform.planar_to_geo(reached, bounds),
                    track.altitude,
                    offset(track.timestamp, params.time_horizon),
                ));
            }

            debug!(
                "Horizon reached {:.1}s short of fix {}",
                leg_secs - remaining,
                fix.id()
            );
            return Ok(trajectory);
        }

        debug!("Route exhausted after {:.1}s", elapsed);
        Ok(trajectory)
    }

    fn locate_next_fix(&self, route_track: &RouteTrack, route: &Route) -> Result<usize> {
        let Some(next) = route_track.next_fix.as_ref() else {
            return Err(ConformanceError::DegenerateRoute(
                "<none> (route track carries no bracketing fix)".to_string(),
            ));
        };

        match route_track.next_index() {
            Some(i) if route.get(i) == Some(next) => Ok(i),
            _ => route
                .position_of(next)
                .ok_or_else(|| ConformanceError::DegenerateRoute(next.id().to_string())),
        }
    }
}

/// `start + by`, pinned to the last representable instant instead of overflowing
fn offset(start: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    start
        .checked_add_signed(by)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Seconds to fly `distance` meters; unreachable when the speed is not positive.
fn leg_seconds(distance: f64, speed: f64) -> f64 {
    if distance == 0.0 {
        0.0
    } else if speed > 0.0 && speed.is_finite() {
        distance / speed
    } else {
        f64::INFINITY
    }
}
