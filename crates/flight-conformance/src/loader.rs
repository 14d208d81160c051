//! Cycle snapshot loading and result output

use crate::cycle::{to_geojson, CycleResult};
use crate::model::{Flight, FlightTrack};
use crate::params::Parameters;
use crate::Result;
use flight_geometry::{normalize_angle, Bounds};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info, warn};

/// Everything one cycle needs: the window, tunables and the tracked population
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub bounds: Bounds,
    pub parameters: Parameters,
    pub flights: Vec<Flight>,
}

/// Snapshot as found on disk; parameters are optional
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    bounds: RawWindow,
    parameters: Option<Parameters>,
    #[serde(default)]
    flights: Vec<Flight>,
}

#[derive(Debug, Deserialize)]
struct RawWindow {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

/// Sanitize ID to prevent injection (alphanumeric, dash, underscore only)
fn sanitize_id(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect()
}

fn valid_track(track: &FlightTrack) -> bool {
    track.position().validate().is_ok()
        && track.altitude.is_finite()
        && track.ground_speed.is_finite()
        && track.heading.is_finite()
}

/// Drop flights with unusable coordinates and normalize the rest.
///
/// Ids are sanitized (flights left without one get `flight-<index>`) and headings
/// are wrapped into [0, 2π). Distinct ids that sanitize to the same string get a
/// `-<n>` suffix; repeats of the same raw id are left for the cycle to resolve.
/// Returns the kept flights and the number skipped.
pub fn sanitize_flights(flights: Vec<Flight>) -> (Vec<Flight>, usize) {
    let mut kept = Vec::with_capacity(flights.len());
    let mut skipped = 0;
    // sanitized id -> raw id that first claimed it
    let mut claimed: HashMap<String, String> = HashMap::new();

    for (i, mut flight) in flights.into_iter().enumerate() {
        if let Some(track) = flight.track.as_mut() {
            if !valid_track(track) {
                debug!("Skipping flight {}: invalid track", flight.id);
                skipped += 1;
                continue;
            }
            track.heading = normalize_angle(track.heading);
        }

        if let Some(plan) = flight.plan.as_ref() {
            let fixes_ok = plan
                .route
                .fixes()
                .iter()
                .all(|f| f.position().validate().is_ok());
            if !fixes_ok || !plan.assigned_speed.is_finite() || !plan.assigned_altitude.is_finite()
            {
                debug!("Skipping flight {}: invalid plan", flight.id);
                skipped += 1;
                continue;
            }
        }

        let raw_id = std::mem::take(&mut flight.id);
        let mut id = sanitize_id(&raw_id);
        if id.is_empty() {
            id = format!("flight-{}", i);
        }
        if claimed.get(&id).is_some_and(|owner| *owner != raw_id) {
            let base = id;
            let mut n = 2;
            id = loop {
                let candidate = format!("{}-{}", base, n);
                if !claimed.contains_key(&candidate) {
                    break candidate;
                }
                n += 1;
            };
            warn!(
                "Flight id {:?} collides with {} after sanitizing, renamed to {}",
                raw_id, base, id
            );
        }
        claimed.entry(id.clone()).or_insert(raw_id);
        flight.id = id;
        kept.push(flight);
    }

    (kept, skipped)
}

/// Load a cycle snapshot from a JSON file
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Snapshot> {
    let path = path.as_ref();
    info!("Loading snapshot from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let raw: RawSnapshot = serde_json::from_reader(reader)?;

    from_raw(raw)
}

/// Parse a cycle snapshot from a JSON string
pub fn parse_snapshot(json: &str) -> Result<Snapshot> {
    from_raw(serde_json::from_str(json)?)
}

fn from_raw(raw: RawSnapshot) -> Result<Snapshot> {
    let RawWindow {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    } = raw.bounds;
    let bounds = Bounds::new(min_lat, max_lat, min_lon, max_lon)?;

    let parameters = raw.parameters.unwrap_or_default();
    parameters.validate()?;

    let total = raw.flights.len();
    let (flights, skipped) = sanitize_flights(raw.flights);

    info!(
        "Loaded {} of {} flights ({} skipped for invalid coordinates)",
        flights.len(),
        total,
        skipped
    );

    Ok(Snapshot {
        bounds,
        parameters,
        flights,
    })
}

/// Write a cycle result as pretty JSON
pub fn write_result(path: impl AsRef<Path>, result: &CycleResult) -> Result<()> {
    let path = path.as_ref();
    info!("Writing cycle result to {:?}", path);

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, result)?;
    Ok(())
}

/// Write predicted trajectories as a GeoJSON FeatureCollection
pub fn write_geojson(path: impl AsRef<Path>, result: &CycleResult) -> Result<()> {
    let path = path.as_ref();
    info!("Writing GeoJSON to {:?}", path);

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &to_geojson(result))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::ComputationCycle;
    use crate::ConformanceError;
    use chrono::{TimeZone, Utc};
    use flight_geometry::GeometryError;
    use std::f64::consts::PI;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SNAPSHOT: &str = r#"{
        "bounds": {"min_lat": -1.0, "max_lat": 2.0, "min_lon": -1.0, "max_lon": 2.0},
        "parameters": {"time_horizon_secs": 60.0},
        "flights": [
            {
                "id": "UAL 123",
                "track": {"latitude": 0.0005, "longitude": 0.098, "altitude": 11000.0,
                          "timestamp": "2024-05-01T12:00:00Z", "ground_speed": 100.0,
                          "heading": -6.283185307179586},
                "plan": {"assigned_speed": 100.0, "assigned_altitude": 11000.0,
                         "route": [{"id": "a", "latitude": 0.0, "longitude": 0.0},
                                   {"id": "b", "latitude": 0.0, "longitude": 0.1}]}
            },
            {
                "id": "BAD1",
                "track": {"latitude": 95.0, "longitude": 0.0, "altitude": 11000.0,
                          "timestamp": "2024-05-01T12:00:00Z", "ground_speed": 100.0,
                          "heading": 0.0}
            },
            {
                "id": "BAD2",
                "track": {"latitude": 0.5, "longitude": 0.5, "altitude": 11000.0,
                          "timestamp": "2024-05-01T12:00:00Z", "ground_speed": 100.0,
                          "heading": 0.0},
                "plan": {"assigned_speed": 100.0, "assigned_altitude": 11000.0,
                         "route": [{"id": "X", "latitude": 0.0, "longitude": 200.0}]}
            },
            {"id": "", "plan": {"assigned_speed": 90.0, "assigned_altitude": 3000.0}}
        ]
    }"#;

    fn write_temp(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_snapshot() {
        let file = write_temp(SNAPSHOT);

        let snapshot = load_snapshot(file.path()).unwrap();
        assert_eq!(snapshot.flights.len(), 2);
        assert_eq!(snapshot.flights[0].id, "UAL123");
        assert_eq!(snapshot.flights[1].id, "flight-3");
        assert_eq!(snapshot.parameters.time_horizon_secs(), 60.0);
        assert_eq!(snapshot.bounds.min_lat(), -1.0);

        let plan = snapshot.flights[0].plan.as_ref().unwrap();
        assert_eq!(plan.route.first().map(|f| f.id()), Some("A"));
        assert!(snapshot.flights[1].plan.as_ref().unwrap().route.is_empty());
    }

    #[test]
    fn test_heading_is_normalized() {
        let snapshot = parse_snapshot(SNAPSHOT).unwrap();
        let heading = snapshot.flights[0].track.unwrap().heading;
        assert!((0.0..2.0 * PI).contains(&heading));
        assert!(heading.abs() < 1e-9);
    }

    fn tracked(id: &str) -> Flight {
        let track = FlightTrack {
            latitude: 0.5,
            longitude: 0.5,
            altitude: 11_000.0,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            ground_speed: 100.0,
            heading: 0.0,
        };
        Flight::new(id, Some(track), None)
    }

    #[test]
    fn test_sanitized_id_collision_is_renamed() {
        let (kept, skipped) = sanitize_flights(vec![
            tracked("UAL 123"),
            tracked("UAL123"),
            tracked("UAL123-2"),
        ]);
        assert_eq!(skipped, 0);
        let ids: Vec<&str> = kept.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["UAL123", "UAL123-2", "UAL123-2-2"]);

        let bounds = Bounds::new(0.0, 1.0, 0.0, 1.0).unwrap();
        let result = ComputationCycle::default().run(&kept, &bounds, &Parameters::default());
        assert_eq!(result.flight_count(), 3);
    }

    #[test]
    fn test_repeated_raw_id_is_left_alone() {
        let (kept, _) = sanitize_flights(vec![tracked("DAL7"), tracked("DAL7")]);
        assert_eq!(kept[0].id, "DAL7");
        assert_eq!(kept[1].id, "DAL7");
    }

    #[test]
    fn test_missing_parameters_use_defaults() {
        let json = r#"{"bounds": {"min_lat": 0.0, "max_lat": 1.0, "min_lon": 0.0, "max_lon": 1.0}}"#;
        let snapshot = parse_snapshot(json).unwrap();
        assert_eq!(snapshot.parameters, Parameters::default());
        assert!(snapshot.flights.is_empty());
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let json = r#"{"bounds": {"min_lat": 1.0, "max_lat": 0.0, "min_lon": 0.0, "max_lon": 1.0}}"#;
        assert!(matches!(
            parse_snapshot(json),
            Err(ConformanceError::Geometry(GeometryError::InvalidBounds(_)))
        ));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let json = r#"{
            "bounds": {"min_lat": 0.0, "max_lat": 1.0, "min_lon": 0.0, "max_lon": 1.0},
            "parameters": {"residual_threshold": -1.0}
        }"#;
        assert!(matches!(
            parse_snapshot(json),
            Err(ConformanceError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_snapshot(dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConformanceError::Io(_))));
    }

    #[test]
    fn test_write_result_and_geojson() {
        let snapshot = parse_snapshot(SNAPSHOT).unwrap();
        let result =
            ComputationCycle::default().run(&snapshot.flights, &snapshot.bounds, &snapshot.parameters);

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("result.json");
        write_result(&out, &result).unwrap();
        let written: serde_json::Value =
            serde_json::from_reader(File::open(&out).unwrap()).unwrap();
        assert!(written["trajectories"]["UAL123"].is_array());

        let geo = dir.path().join("result.geojson");
        write_geojson(&geo, &result).unwrap();
        let written: serde_json::Value =
            serde_json::from_reader(File::open(&geo).unwrap()).unwrap();
        assert_eq!(written["type"], "FeatureCollection");
    }
}
