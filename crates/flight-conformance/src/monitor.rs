//! Conformance scoring
//!
//! Each enabled factor contributes `deviation / threshold`; the residual is the
//! mean of those contributions and trips the blunder flag at
//! `residual_threshold`.

use crate::model::FlightTrack;
use crate::params::{Parameters, SpeedDeviation};
use flight_geometry::{Bounds, CoordinateTransform};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Normalized factor contributions; `None` for disabled factors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConformanceReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lateral: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angular: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    pub residual: f64,
    pub blundering: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConformanceMonitor {
    transform: CoordinateTransform,
}

impl ConformanceMonitor {
    pub fn new(transform: CoordinateTransform) -> Self {
        Self { transform }
    }

    pub fn assess(
        &self,
        observed: &FlightTrack,
        expected: &FlightTrack,
        params: &Parameters,
        bounds: &Bounds,
    ) -> ConformanceReport {
        let lateral = params.lateral_weight_on.then(|| {
            let o = self.transform.to_planar(observed.latitude, observed.longitude, bounds);
            let e = self.transform.to_planar(expected.latitude, expected.longitude, bounds);
            self.transform.distance(o, e) / params.lateral_threshold
        });

        let vertical = params
            .vertical_weight_on
            .then(|| (observed.altitude - expected.altitude).abs() / params.vertical_threshold);

        // Raw difference, no wrap-around at 2π
        let angular = params
            .angular_weight_on
            .then(|| (observed.heading - expected.heading).abs() / params.angular_threshold);

        let speed = params.speed_weight_on.then(|| {
            let deviation = match params.speed_deviation {
                SpeedDeviation::AltitudeDifference => (observed.altitude - expected.altitude).abs(),
                SpeedDeviation::GroundSpeedDifference => {
                    (observed.ground_speed - expected.ground_speed).abs()
                }
            };
            deviation / params.speed_threshold
        });

        let enabled: Vec<f64> = [lateral, vertical, angular, speed].into_iter().flatten().collect();
        let residual = if enabled.is_empty() {
            0.0
        } else {
            enabled.iter().sum::<f64>() / enabled.len() as f64
        };

        // With no factors there is nothing to deviate from
        let blundering = !enabled.is_empty() && residual >= params.residual_threshold;

        debug!(
            "Residual {:.3} (lat={:?}, vert={:?}, ang={:?}, spd={:?}) blundering={}",
            residual, lateral, vertical, angular, speed, blundering
        );

        ConformanceReport {
            lateral,
            vertical,
            angular,
            speed,
            residual,
            blundering,
        }
    }

    pub fn residual(
        &self,
        observed: &FlightTrack,
        expected: &FlightTrack,
        params: &Parameters,
        bounds: &Bounds,
    ) -> f64 {
        self.assess(observed, expected, params, bounds).residual
    }

    pub fn is_blundering(
        &self,
        observed: &FlightTrack,
        expected: &FlightTrack,
        params: &Parameters,
        bounds: &Bounds,
    ) -> bool {
        self.assess(observed, expected, params, bounds).blundering
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bounds() -> Bounds {
        Bounds::new(36.0, 39.0, -124.0, -120.0).unwrap()
    }

    fn expected() -> FlightTrack {
        FlightTrack {
            latitude: 37.5,
            longitude: -122.0,
            altitude: 11_000.0,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            ground_speed: 230.0,
            heading: 1.0,
        }
    }

    fn params() -> Parameters {
        Parameters {
            lateral_threshold: 1000.0,
            vertical_threshold: 500.0,
            angular_threshold: 0.5,
            speed_threshold: 1000.0,
            residual_threshold: 1.0,
            ..Parameters::default()
        }
    }

    #[test]
    fn test_on_route_is_conforming() {
        let monitor = ConformanceMonitor::default();
        let report = monitor.assess(&expected(), &expected(), &params(), &bounds());
        assert_eq!(report.residual, 0.0);
        assert!(!report.blundering);
    }

    #[test]
    fn test_residual_is_mean_of_enabled_factors() {
        let monitor = ConformanceMonitor::default();
        let observed = FlightTrack {
            altitude: 12_000.0,
            heading: 1.25,
            ..expected()
        };

        let report = monitor.assess(&observed, &expected(), &params(), &bounds());
        assert_eq!(report.lateral, Some(0.0));
        assert_eq!(report.vertical, Some(2.0));
        assert_eq!(report.angular, Some(0.5));
        // speed factor measures the altitude delta by default
        assert_eq!(report.speed, Some(1.0));
        assert!((report.residual - 3.5 / 4.0).abs() < 1e-12);
        assert!(!report.blundering);
    }

    #[test]
    fn test_disabled_factors_are_excluded() {
        let monitor = ConformanceMonitor::default();
        let observed = FlightTrack {
            altitude: 12_000.0,
            ..expected()
        };
        let p = Parameters {
            lateral_weight_on: false,
            angular_weight_on: false,
            speed_weight_on: false,
            ..params()
        };

        let report = monitor.assess(&observed, &expected(), &p, &bounds());
        assert_eq!(report.lateral, None);
        assert_eq!(report.residual, 2.0);
        assert!(report.blundering);
    }

    #[test]
    fn test_zero_factors_never_blunder() {
        let monitor = ConformanceMonitor::default();
        let observed = FlightTrack {
            latitude: 38.9,
            altitude: 40_000.0,
            heading: 5.0,
            ..expected()
        };
        let p = params().without_factors();

        assert_eq!(monitor.residual(&observed, &expected(), &p, &bounds()), 0.0);
        assert!(!monitor.is_blundering(&observed, &expected(), &p, &bounds()));
    }

    #[test]
    fn test_lateral_offset_trips_threshold() {
        let monitor = ConformanceMonitor::default();
        let ct = CoordinateTransform::default();
        // ~2 km north of the route track
        let observed = FlightTrack {
            latitude: 37.5 + 2000.0 / ct.meters_per_degree_lat(),
            ..expected()
        };
        let p = Parameters {
            vertical_weight_on: false,
            angular_weight_on: false,
            speed_weight_on: false,
            ..params()
        };

        let report = monitor.assess(&observed, &expected(), &p, &bounds());
        assert!((report.residual - 2.0).abs() < 1e-6);
        assert!(monitor.is_blundering(&observed, &expected(), &p, &bounds()));
    }

    #[test]
    fn test_ground_speed_deviation_opt_in() {
        let monitor = ConformanceMonitor::default();
        let observed = FlightTrack {
            ground_speed: 330.0,
            ..expected()
        };
        let only_speed = Parameters {
            lateral_weight_on: false,
            vertical_weight_on: false,
            angular_weight_on: false,
            speed_threshold: 50.0,
            ..params()
        };

        let legacy = monitor.assess(&observed, &expected(), &only_speed, &bounds());
        assert_eq!(legacy.speed, Some(0.0));

        let corrected = Parameters {
            speed_deviation: SpeedDeviation::GroundSpeedDifference,
            ..only_speed
        };
        let report = monitor.assess(&observed, &expected(), &corrected, &bounds());
        assert_eq!(report.speed, Some(2.0));
        assert!(report.blundering);
    }
}
