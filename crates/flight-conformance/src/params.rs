//! Per-cycle tunables

use crate::{ConformanceError, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// One nautical mile, meters
pub const DEFAULT_LATERAL_THRESHOLD: f64 = 1852.0;
/// Feet
pub const DEFAULT_VERTICAL_THRESHOLD: f64 = 500.0;
/// 15 degrees
pub const DEFAULT_ANGULAR_THRESHOLD: f64 = 0.261_799_387_799;
pub const DEFAULT_SPEED_THRESHOLD: f64 = 500.0;
pub const DEFAULT_RESIDUAL_THRESHOLD: f64 = 1.0;
pub const DEFAULT_TIME_HORIZON_SECS: i64 = 300;
/// Longest accepted prediction horizon, roughly 31 years
pub const MAX_TIME_HORIZON_SECS: i64 = 1_000_000_000;

/// Source of the speed factor's deviation.
///
/// `AltitudeDifference` reproduces the established detector, which feeds the
/// altitude delta into the speed factor. `GroundSpeedDifference` compares observed
/// ground speed with the assigned speed and must be opted into explicitly, since it
/// changes blunder sensitivity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpeedDeviation {
    #[default]
    AltitudeDifference,
    GroundSpeedDifference,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Parameters {
    pub lateral_weight_on: bool,
    pub vertical_weight_on: bool,
    pub angular_weight_on: bool,
    pub speed_weight_on: bool,

    /// Meters
    pub lateral_threshold: f64,
    pub vertical_threshold: f64,
    /// Radians
    pub angular_threshold: f64,
    pub speed_threshold: f64,

    pub residual_threshold: f64,

    #[serde(rename = "time_horizon_secs", with = "duration_secs")]
    pub time_horizon: Duration,

    pub speed_deviation: SpeedDeviation,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            lateral_weight_on: true,
            vertical_weight_on: true,
            angular_weight_on: true,
            speed_weight_on: true,
            lateral_threshold: DEFAULT_LATERAL_THRESHOLD,
            vertical_threshold: DEFAULT_VERTICAL_THRESHOLD,
            angular_threshold: DEFAULT_ANGULAR_THRESHOLD,
            speed_threshold: DEFAULT_SPEED_THRESHOLD,
            residual_threshold: DEFAULT_RESIDUAL_THRESHOLD,
            time_horizon: Duration::seconds(DEFAULT_TIME_HORIZON_SECS),
            speed_deviation: SpeedDeviation::default(),
        }
    }
}

impl Parameters {
    pub fn with_time_horizon(mut self, time_horizon: Duration) -> Self {
        self.time_horizon = time_horizon;
        self
    }

    /// All four factors switched off
    pub fn without_factors(mut self) -> Self {
        self.lateral_weight_on = false;
        self.vertical_weight_on = false;
        self.angular_weight_on = false;
        self.speed_weight_on = false;
        self
    }

    pub fn enabled_factor_count(&self) -> usize {
        [
            self.lateral_weight_on,
            self.vertical_weight_on,
            self.angular_weight_on,
            self.speed_weight_on,
        ]
        .iter()
        .filter(|on| **on)
        .count()
    }

    pub fn time_horizon_secs(&self) -> f64 {
        duration_to_secs(self.time_horizon)
    }

    /// Thresholds divide deviations, so they must be finite and positive.
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("lateral_threshold", self.lateral_threshold),
            ("vertical_threshold", self.vertical_threshold),
            ("angular_threshold", self.angular_threshold),
            ("speed_threshold", self.speed_threshold),
            ("residual_threshold", self.residual_threshold),
        ];

        for (name, value) in thresholds {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConformanceError::InvalidParameters(format!(
                    "{} must be finite and positive, got {}",
                    name, value
                )));
            }
        }

        if self.time_horizon < Duration::zero() {
            return Err(ConformanceError::InvalidParameters(format!(
                "time horizon must not be negative, got {}s",
                self.time_horizon_secs()
            )));
        }
        if self.time_horizon > Duration::seconds(MAX_TIME_HORIZON_SECS) {
            return Err(ConformanceError::InvalidParameters(format!(
                "time horizon must not exceed {}s, got {}s",
                MAX_TIME_HORIZON_SECS,
                self.time_horizon_secs()
            )));
        }

        Ok(())
    }
}

pub(crate) fn duration_to_secs(d: Duration) -> f64 {
    match d.num_nanoseconds() {
        Some(ns) => ns as f64 / 1e9,
        None => d.num_milliseconds() as f64 / 1e3,
    }
}

pub(crate) fn secs_to_duration(secs: f64) -> Duration {
    Duration::nanoseconds((secs * 1e9).round() as i64)
}

mod duration_secs {
    use super::{duration_to_secs, secs_to_duration, MAX_TIME_HORIZON_SECS};
    use chrono::Duration;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration_to_secs(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        // Keep well inside the nanosecond range of i64
        if !secs.is_finite() || secs.abs() > MAX_TIME_HORIZON_SECS as f64 {
            return Err(de::Error::custom(format!("invalid time horizon: {}", secs)));
        }
        Ok(secs_to_duration(secs))
    }
}
