//! Flight, plan and trajectory value types

use chrono::{DateTime, Utc};
use flight_geometry::GeoPoint;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Named waypoint. Identity is the upper-cased id; coordinates do not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawFix")]
pub struct Fix {
    id: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawFix {
    id: String,
    latitude: f64,
    longitude: f64,
}

impl From<RawFix> for Fix {
    fn from(raw: RawFix) -> Self {
        Fix::new(raw.id, raw.latitude, raw.longitude)
    }
}

impl Fix {
    pub fn new(id: impl AsRef<str>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.as_ref().trim().to_uppercase(),
            latitude,
            longitude,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

impl PartialEq for Fix {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Fix {}

impl Hash for Fix {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Ordered fix sequence. Zero, one or many fixes are all legal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Route {
    fixes: Vec<Fix>,
}

impl Route {
    pub fn new(fixes: Vec<Fix>) -> Self {
        Self { fixes }
    }

    pub fn fixes(&self) -> &[Fix] {
        &self.fixes
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn first(&self) -> Option<&Fix> {
        self.fixes.first()
    }

    pub fn last(&self) -> Option<&Fix> {
        self.fixes.last()
    }

    pub fn get(&self, index: usize) -> Option<&Fix> {
        self.fixes.get(index)
    }

    /// Index of the first occurrence of `fix`
    pub fn position_of(&self, fix: &Fix) -> Option<usize> {
        self.fixes.iter().position(|f| f == fix)
    }

    /// Consecutive (previous, next) pairs in traversal order
    pub fn segments(&self) -> impl Iterator<Item = (&Fix, &Fix)> {
        self.fixes.windows(2).map(|pair| (&pair[0], &pair[1]))
    }
}

impl FromIterator<Fix> for Route {
    fn from_iter<I: IntoIterator<Item = Fix>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Observed surveillance state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FlightTrack {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub timestamp: DateTime<Utc>,
    /// Meters per second
    pub ground_speed: f64,
    /// Radians, 0 = east, counter-clockwise, [0, 2π)
    pub heading: f64,
}

impl FlightTrack {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightPlan {
    /// Meters per second
    pub assigned_speed: f64,
    pub assigned_altitude: f64,
    #[serde(default)]
    pub route: Route,
}

impl FlightPlan {
    pub fn new(assigned_speed: f64, assigned_altitude: f64, route: Route) -> Self {
        Self {
            assigned_speed,
            assigned_altitude,
            route,
        }
    }

    pub fn with_assigned_speed(&self, assigned_speed: f64) -> Self {
        Self {
            assigned_speed,
            ..self.clone()
        }
    }

    pub fn with_assigned_altitude(&self, assigned_altitude: f64) -> Self {
        Self {
            assigned_altitude,
            ..self.clone()
        }
    }

    pub fn with_route(&self, route: Route) -> Self {
        Self {
            route,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flight {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<FlightTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<FlightPlan>,
}

impl Flight {
    pub fn new(id: impl Into<String>, track: Option<FlightTrack>, plan: Option<FlightPlan>) -> Self {
        Self {
            id: id.into(),
            track,
            plan,
        }
    }
}

/// A track snapped onto its route, with the bracketing segment.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTrack {
    pub track: FlightTrack,
    pub prev_fix: Option<Fix>,
    pub next_fix: Option<Fix>,
    /// Route index of `next_fix`; disambiguates routes that revisit a fix
    pub(crate) next_index: Option<usize>,
}

impl RouteTrack {
    pub fn unbracketed(track: FlightTrack) -> Self {
        Self {
            track,
            prev_fix: None,
            next_fix: None,
            next_index: None,
        }
    }

    pub fn bracketed(track: FlightTrack, prev_fix: Fix, next_fix: Fix, next_index: usize) -> Self {
        Self {
            track,
            prev_fix: Some(prev_fix),
            next_fix: Some(next_fix),
            next_index: Some(next_index),
        }
    }

    pub fn next_index(&self) -> Option<usize> {
        self.next_index
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrajectoryPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub time: DateTime<Utc>,
}

impl TrajectoryPoint {
    pub fn at(position: GeoPoint, altitude: f64, time: DateTime<Utc>) -> Self {
        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            altitude,
            time,
        }
    }
}

impl From<&FlightTrack> for TrajectoryPoint {
    fn from(track: &FlightTrack) -> Self {
        Self {
            latitude: track.latitude,
            longitude: track.longitude,
            altitude: track.altitude,
            time: track.timestamp,
        }
    }
}

/// Predicted 4-D path. Never empty; only the synthesizer can extend it.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct Trajectory {
    points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    pub(crate) fn starting_at(start: TrajectoryPoint) -> Self {
        Self {
            points: vec![start],
        }
    }

    pub(crate) fn push(&mut self, point: TrajectoryPoint) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    pub fn start(&self) -> &TrajectoryPoint {
        &self.points[0]
    }

    pub fn end(&self) -> &TrajectoryPoint {
        &self.points[self.points.len() - 1]
    }
}
