use anyhow::Result;
use flight_conformance::{loader, ComputationCycle, FaultPolicy};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod routes;
mod scheduler;

use routes::AppState;
use scheduler::Scheduler;

const DEFAULT_PORT: &str = "21600";
const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "conformance_gateway=debug,flight_conformance=info,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let fault_policy = match std::env::var("CONFORMANCE_FAULT_POLICY").as_deref() {
        Ok("omit") => FaultPolicy::Omit,
        _ => FaultPolicy::DeadReckon,
    };
    let cycle = ComputationCycle::default().with_fault_policy(fault_policy);
    tracing::info!("   Fault policy: {:?}", cycle.fault_policy());
    let scheduler = Arc::new(Scheduler::new(cycle));

    // Optional initial bounds, parameters and flights
    if let Ok(path) = std::env::var("CONFORMANCE_SNAPSHOT_PATH") {
        let snapshot = loader::load_snapshot(&path)?;
        tracing::info!("   Seeded {} flights from {}", snapshot.flights.len(), path);
        scheduler.load(snapshot).await;
    } else {
        tracing::warn!("   No snapshot configured - PUT /api/v1/config/bounds to start cycling");
    }

    let interval_secs = std::env::var("CONFORMANCE_CYCLE_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_CYCLE_INTERVAL_SECS);
    let _cycle_task = scheduler.clone().start(Duration::from_secs(interval_secs));

    // Surface blunders in the service log as each cycle lands
    let mut updates = scheduler.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let latest = updates.borrow_and_update().clone();
            if let Some(snapshot) = latest {
                for id in snapshot.result.blunders() {
                    tracing::warn!("Cycle {}: flight {} blundering", snapshot.sequence, id);
                }
            }
        }
    });

    let app = routes::api_routes(AppState { scheduler }).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let port = std::env::var("CONFORMANCE_GATEWAY_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| DEFAULT_PORT.to_string());
    let addr = format!("0.0.0.0:{}", port);

    tracing::info!("Conformance Gateway starting on {}", addr);
    tracing::info!("   Cycle interval: {}s", interval_secs);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
