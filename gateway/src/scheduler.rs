//! Periodic Cycle Scheduler
//!
//! Runs one computation cycle per tick over the flights currently inside the
//! configured window and publishes the result to every subscriber.
//!
//! - At most one cycle runs at a time; ticks that arrive late are skipped
//! - Bounds, parameters and the flight snapshot may be replaced between cycles
//! - Each published [`CycleSnapshot`] carries its own id and a sequence number

use chrono::{DateTime, Utc};
use flight_conformance::{
    loader::Snapshot, Bounds, ComputationCycle, CycleResult, Flight, FlightSource, Parameters,
    SnapshotStore,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use uuid::Uuid;

/// One published cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleSnapshot {
    pub cycle_id: Uuid,
    pub sequence: u64,
    pub computed_at: DateTime<Utc>,
    pub bounds: Bounds,
    pub parameters: Parameters,
    pub result: CycleResult,
}

/// Operator configuration applied at the start of each cycle
#[derive(Debug, Clone, Default)]
struct CycleConfig {
    bounds: Option<Bounds>,
    parameters: Parameters,
}

pub struct Scheduler {
    cycle: ComputationCycle,
    config: RwLock<CycleConfig>,
    store: RwLock<SnapshotStore>,
    /// Held for the whole cycle; guards the sequence counter
    sequence: Mutex<u64>,
    latest: watch::Sender<Option<Arc<CycleSnapshot>>>,
}

impl Scheduler {
    pub fn new(cycle: ComputationCycle) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            cycle,
            config: RwLock::new(CycleConfig::default()),
            store: RwLock::new(SnapshotStore::default()),
            sequence: Mutex::new(0),
            latest,
        }
    }

    /// Seed bounds, parameters and flights from a loaded snapshot file
    pub async fn load(&self, snapshot: Snapshot) {
        {
            let mut config = self.config.write().await;
            config.bounds = Some(snapshot.bounds);
            config.parameters = snapshot.parameters;
        }
        self.replace_flights(snapshot.flights).await;
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<CycleSnapshot>>> {
        self.latest.subscribe()
    }

    pub fn latest(&self) -> Option<Arc<CycleSnapshot>> {
        self.latest.borrow().clone()
    }

    pub async fn bounds(&self) -> Option<Bounds> {
        self.config.read().await.bounds
    }

    pub async fn set_bounds(&self, bounds: Bounds) {
        info!(
            "Bounds set to lat [{}, {}] lon [{}, {}]",
            bounds.min_lat(),
            bounds.max_lat(),
            bounds.min_lon(),
            bounds.max_lon()
        );
        self.config.write().await.bounds = Some(bounds);
    }

    pub async fn parameters(&self) -> Parameters {
        self.config.read().await.parameters.clone()
    }

    /// Callers validate first; the cycle trusts its parameters
    pub async fn set_parameters(&self, parameters: Parameters) {
        info!(
            "Parameters updated: {} factors enabled, horizon {:.0}s",
            parameters.enabled_factor_count(),
            parameters.time_horizon_secs()
        );
        self.config.write().await.parameters = parameters;
    }

    pub async fn replace_flights(&self, flights: Vec<Flight>) {
        let count = flights.len();
        self.store.write().await.replace(flights);
        debug!("Flight snapshot now holds {} flights", count);
    }

    pub async fn flight_count(&self) -> usize {
        self.store.read().await.len()
    }

    /// Run one cycle now. Returns `None` while no bounds are configured.
    pub async fn run_once(&self) -> Option<Arc<CycleSnapshot>> {
        let mut sequence = self.sequence.lock().await;

        let CycleConfig { bounds, parameters } = self.config.read().await.clone();
        let Some(bounds) = bounds else {
            debug!("No bounds configured, cycle skipped");
            return None;
        };

        let flights = self.store.read().await.flights_within(&bounds);
        let result = self.cycle.run(&flights, &bounds, &parameters);

        *sequence += 1;
        let snapshot = Arc::new(CycleSnapshot {
            cycle_id: Uuid::new_v4(),
            sequence: *sequence,
            computed_at: Utc::now(),
            bounds,
            parameters,
            result,
        });

        info!(
            "Cycle {} ({}) published: {} flights, {} blundering",
            snapshot.sequence,
            snapshot.cycle_id,
            snapshot.result.flight_count(),
            snapshot.result.blunders().len()
        );

        self.latest.send_replace(Some(snapshot.clone()));
        Some(snapshot)
    }

    /// Start the periodic loop
    pub fn start(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                self.run_once().await;
            }
        })
    }
}
