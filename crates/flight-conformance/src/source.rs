//! Where each cycle's flight population comes from

use crate::model::Flight;
use flight_geometry::Bounds;
use tracing::debug;

/// Spatial store queried once per cycle
pub trait FlightSource {
    /// Flights whose current track lies inside `bounds`.
    ///
    /// A flight without a track has no position and is never returned, so the
    /// cycle only sees untracked flights when a caller hands them over directly.
    fn flights_within(&self, bounds: &Bounds) -> Vec<Flight>;
}

/// In-memory source fed by whole surveillance snapshots.
///
/// Flights without a track have no position and are never returned.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    flights: Vec<Flight>,
}

impl SnapshotStore {
    pub fn new(flights: Vec<Flight>) -> Self {
        Self { flights }
    }

    /// Swap in a new snapshot, returning the previous one
    pub fn replace(&mut self, flights: Vec<Flight>) -> Vec<Flight> {
        debug!("Snapshot replaced: {} -> {} flights", self.flights.len(), flights.len());
        std::mem::replace(&mut self.flights, flights)
    }

    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

impl FlightSource for SnapshotStore {
    fn flights_within(&self, bounds: &Bounds) -> Vec<Flight> {
        self.flights
            .iter()
            .filter(|f| {
                f.track
                    .as_ref()
                    .is_some_and(|t| bounds.contains(t.latitude, t.longitude))
            })
            .cloned()
            .collect()
    }
}
