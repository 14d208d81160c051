//! Flight Geometry Library
//!
//! Local equirectangular projection anchored at an operator-chosen bounding
//! region, with planar distance and bearing for conformance monitoring.
//!
//! # Conventions
//!
//! - Latitude/longitude in degrees
//! - Planar x/y in meters, x east, y north, origin at (min lat, min lon)
//! - Longitude scaled by cos of the window's centre latitude
//! - Bearings in radians, 0 = east, counter-clockwise positive, range [0, 2π)

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use thiserror::Error;

pub use projection::CoordinateTransform;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

pub type Result<T> = std::result::Result<T, GeometryError>;

/// Mean earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_latitude(self.latitude) || !is_valid_longitude(self.longitude) {
            return Err(GeometryError::InvalidCoordinates(format!(
                "({}, {})",
                self.latitude, self.longitude
            )));
        }
        Ok(())
    }
}

/// Point in the local projection (meters)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_vector(self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn from_vector(v: Vector2<f64>) -> Self {
        Self { x: v.x, y: v.y }
    }
}

/// Geographic window a cycle operates on. The south-west corner anchors the projection
/// and the centre latitude fixes its longitude scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawBounds")]
pub struct Bounds {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

#[derive(Deserialize)]
struct RawBounds {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl TryFrom<RawBounds> for Bounds {
    type Error = GeometryError;

    fn try_from(raw: RawBounds) -> Result<Self> {
        Bounds::new(raw.min_lat, raw.max_lat, raw.min_lon, raw.max_lon)
    }
}

impl Bounds {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
        // Poles are excluded: meters per degree of longitude vanishes there
        let lat_ok = |lat: f64| lat.is_finite() && lat > -90.0 && lat < 90.0;
        if !lat_ok(min_lat) || !lat_ok(max_lat) {
            return Err(GeometryError::InvalidBounds(format!(
                "latitude range [{}, {}] must lie strictly inside (-90, 90)",
                min_lat, max_lat
            )));
        }
        if !is_valid_longitude(min_lon) || !is_valid_longitude(max_lon) {
            return Err(GeometryError::InvalidBounds(format!(
                "longitude range [{}, {}] must lie inside [-180, 180]",
                min_lon, max_lon
            )));
        }
        if min_lat >= max_lat || min_lon >= max_lon {
            return Err(GeometryError::InvalidBounds(format!(
                "min must be below max: lat [{}, {}], lon [{}, {}]",
                min_lat, max_lat, min_lon, max_lon
            )));
        }

        Ok(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    /// Projection origin
    pub fn anchor(&self) -> GeoPoint {
        GeoPoint::new(self.min_lat, self.min_lon)
    }

    /// Latitude whose cosine scales every longitude in this window
    pub fn reference_latitude(&self) -> f64 {
        (self.min_lat + self.max_lat) / 2.0
    }

    /// Inclusive containment test
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lon..=self.max_lon).contains(&longitude)
    }
}

pub fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

pub fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon) && lon.is_finite()
}

/// Wrap an angle into [0, 2π)
pub fn normalize_angle(radians: f64) -> f64 {
    let wrapped = radians.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

pub mod projection {
    use super::*;

    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
    pub struct CoordinateTransform {
        earth_radius_m: f64,
    }

    impl Default for CoordinateTransform {
        fn default() -> Self {
            Self {
                earth_radius_m: EARTH_RADIUS_M,
            }
        }
    }

    impl CoordinateTransform {
        pub fn new(earth_radius_m: f64) -> Self {
            Self { earth_radius_m }
        }

        pub fn earth_radius_m(&self) -> f64 {
            self.earth_radius_m
        }

        pub fn meters_per_degree_lat(&self) -> f64 {
            self.earth_radius_m * PI / 180.0
        }

        /// Shrinks toward the poles with cos(latitude)
        pub fn meters_per_degree_lon(&self, latitude: f64) -> f64 {
            self.meters_per_degree_lat() * (latitude * PI / 180.0).cos()
        }

        /// Meters per degree of longitude used for every point in `bounds`
        pub fn longitude_scale(&self, bounds: &Bounds) -> f64 {
            self.meters_per_degree_lon(bounds.reference_latitude())
        }

        /// Equirectangular projection: both axes scale linearly, so meridians stay
        /// vertical and parallels horizontal across the whole window.
        pub fn to_planar(&self, latitude: f64, longitude: f64, bounds: &Bounds) -> PlanarPoint {
            let anchor = bounds.anchor();
            PlanarPoint {
                x: (longitude - anchor.longitude) * self.longitude_scale(bounds),
                y: (latitude - anchor.latitude) * self.meters_per_degree_lat(),
            }
        }

        pub fn geo_to_planar(&self, point: GeoPoint, bounds: &Bounds) -> PlanarPoint {
            self.to_planar(point.latitude, point.longitude, bounds)
        }

        pub fn to_geo(&self, x: f64, y: f64, bounds: &Bounds) -> GeoPoint {
            let anchor = bounds.anchor();
            GeoPoint {
                latitude: anchor.latitude + y / self.meters_per_degree_lat(),
                longitude: anchor.longitude + x / self.longitude_scale(bounds),
            }
        }

        pub fn planar_to_geo(&self, point: PlanarPoint, bounds: &Bounds) -> GeoPoint {
            self.to_geo(point.x, point.y, bounds)
        }

        /// Planar Euclidean distance in meters
        pub fn distance(&self, p1: PlanarPoint, p2: PlanarPoint) -> f64 {
            (p2.to_vector() - p1.to_vector()).norm()
        }

        /// Bearing from `p1` to `p2` in the planar frame, in [0, 2π).
        ///
        /// Vertical offsets resolve to π/2 (north, or coincident points) and 3π/2 (south).
        pub fn bearing(&self, p1: PlanarPoint, p2: PlanarPoint) -> f64 {
            let dx = p2.x - p1.x;
            let dy = p2.y - p1.y;

            if dx == 0.0 {
                return if dy < 0.0 { 3.0 * FRAC_PI_2 } else { FRAC_PI_2 };
            }

            let theta = (dy / dx).atan();
            let bearing = if dx < 0.0 {
                theta + PI
            } else if dy < 0.0 {
                theta + TAU
            } else {
                theta
            };

            if bearing >= TAU {
                bearing - TAU
            } else {
                bearing
            }
        }

        /// Displace `origin` by `distance_m` along `bearing` in the planar frame
        pub fn destination(
            &self,
            origin: GeoPoint,
            bearing: f64,
            distance_m: f64,
            bounds: &Bounds,
        ) -> GeoPoint {
            let start = self.geo_to_planar(origin, bounds);
            self.planar_to_geo(self.advance(start, bearing, distance_m), bounds)
        }

        /// Planar displacement along `bearing`
        pub fn advance(&self, from: PlanarPoint, bearing: f64, distance_m: f64) -> PlanarPoint {
            let step = Vector2::new(bearing.cos(), bearing.sin()) * distance_m;
            PlanarPoint::from_vector(from.to_vector() + step)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bay_area() -> Bounds {
        Bounds::new(36.0, 39.0, -124.0, -120.0).unwrap()
    }

    fn equator() -> Bounds {
        Bounds::new(-1.0, 1.0, -1.0, 1.0).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let ct = CoordinateTransform::default();
        let bounds = bay_area();

        let p = ct.to_planar(37.6189, -122.3750, &bounds);
        let g = ct.to_geo(p.x, p.y, &bounds);

        assert!((g.latitude - 37.6189).abs() < 1e-9);
        assert!((g.longitude - -122.3750).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_is_origin() {
        let ct = CoordinateTransform::default();
        let bounds = bay_area();

        let p = ct.to_planar(36.0, -124.0, &bounds);
        assert_eq!(p, PlanarPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_meridians_stay_vertical() {
        let ct = CoordinateTransform::default();
        let bounds = bay_area();

        let south = ct.to_planar(37.0, -122.0, &bounds);
        let north = ct.to_planar(38.0, -122.0, &bounds);
        assert_eq!(south.x, north.x);
        assert_eq!(ct.bearing(south, north), FRAC_PI_2);

        let dest = ct.destination(GeoPoint::new(37.0, -122.0), FRAC_PI_2, 69_000.0, &bounds);
        assert!((dest.longitude - -122.0).abs() < 1e-9);
        assert!((dest.latitude - (37.0 + 69_000.0 / ct.meters_per_degree_lat())).abs() < 1e-9);
    }

    #[test]
    fn test_longitude_scale_uses_window_centre() {
        let ct = CoordinateTransform::default();
        let bounds = bay_area();
        assert_eq!(bounds.reference_latitude(), 37.5);
        assert_eq!(ct.longitude_scale(&bounds), ct.meters_per_degree_lon(37.5));

        let p = ct.to_planar(38.5, -121.0, &bounds);
        assert!((p.x - 3.0 * ct.meters_per_degree_lon(37.5)).abs() < 1e-6);
    }

    #[test]
    fn test_custom_radius_scales_distances() {
        let earth = CoordinateTransform::default();
        let mars = CoordinateTransform::new(3_389_500.0);
        assert_eq!(mars.earth_radius_m(), 3_389_500.0);

        let bounds = equator();
        let a = earth.to_planar(0.5, 0.5, &bounds);
        let b = mars.to_planar(0.5, 0.5, &bounds);
        assert!((b.y / a.y - 3_389_500.0 / EARTH_RADIUS_M).abs() < 1e-12);
    }

    #[test]
    fn test_geo_point_validate() {
        assert!(GeoPoint::new(37.0, -122.0).validate().is_ok());
        assert!(matches!(
            GeoPoint::new(91.0, 0.0).validate(),
            Err(GeometryError::InvalidCoordinates(_))
        ));
        assert!(GeoPoint::new(0.0, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_longitude_scale_shrinks_with_latitude() {
        let ct = CoordinateTransform::default();
        assert!(ct.meters_per_degree_lon(60.0) < ct.meters_per_degree_lon(30.0));
        assert!((ct.meters_per_degree_lon(60.0) - ct.meters_per_degree_lat() * 0.5).abs() < 1e-6);
        assert!((ct.meters_per_degree_lon(0.0) - ct.meters_per_degree_lat()).abs() < 1e-9);
    }

    #[test]
    fn test_distance() {
        let ct = CoordinateTransform::default();
        let d = ct.distance(PlanarPoint::new(0.0, 0.0), PlanarPoint::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_bearing_quadrants() {
        let ct = CoordinateTransform::default();
        let o = PlanarPoint::new(0.0, 0.0);

        assert_eq!(ct.bearing(o, PlanarPoint::new(1.0, 0.0)), 0.0);
        assert_eq!(ct.bearing(o, PlanarPoint::new(0.0, 1.0)), FRAC_PI_2);
        assert_eq!(ct.bearing(o, PlanarPoint::new(0.0, -1.0)), 3.0 * FRAC_PI_2);
        assert!((ct.bearing(o, PlanarPoint::new(-1.0, 0.0)) - PI).abs() < 1e-12);
        assert!((ct.bearing(o, PlanarPoint::new(1.0, 1.0)) - PI / 4.0).abs() < 1e-12);
        assert!((ct.bearing(o, PlanarPoint::new(-1.0, 1.0)) - 3.0 * PI / 4.0).abs() < 1e-12);
        assert!((ct.bearing(o, PlanarPoint::new(-1.0, -1.0)) - 5.0 * PI / 4.0).abs() < 1e-12);
        assert!((ct.bearing(o, PlanarPoint::new(1.0, -1.0)) - 7.0 * PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_bearing_coincident_points() {
        let ct = CoordinateTransform::default();
        let p = PlanarPoint::new(10.0, 10.0);
        assert_eq!(ct.bearing(p, p), FRAC_PI_2);
    }

    #[test]
    fn test_destination_east() {
        let ct = CoordinateTransform::default();
        let bounds = equator();

        let dest = ct.destination(GeoPoint::new(0.0, 0.0), 0.0, 6000.0, &bounds);
        let expected_lon = 6000.0 / ct.longitude_scale(&bounds);

        assert!(dest.latitude.abs() < 1e-12);
        assert!((dest.longitude - expected_lon).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_validation() {
        assert!(Bounds::new(10.0, 5.0, 0.0, 1.0).is_err());
        assert!(Bounds::new(0.0, 1.0, 1.0, 1.0).is_err());
        assert!(Bounds::new(0.0, 90.0, 0.0, 1.0).is_err());
        assert!(Bounds::new(0.0, 1.0, -181.0, 1.0).is_err());
        assert!(Bounds::new(f64::NAN, 1.0, 0.0, 1.0).is_err());
        assert!(Bounds::new(0.0, 1.0, 0.0, 1.0).is_ok());
    }

    #[test]
    fn test_bounds_deserialize_validates() {
        let ok: std::result::Result<Bounds, _> =
            serde_json::from_str(r#"{"min_lat": 0.0, "max_lat": 1.0, "min_lon": 0.0, "max_lon": 1.0}"#);
        assert!(ok.is_ok());

        let bad: std::result::Result<Bounds, _> =
            serde_json::from_str(r#"{"min_lat": 2.0, "max_lat": 1.0, "min_lon": 0.0, "max_lon": 1.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert!((normalize_angle(-FRAC_PI_2) - 3.0 * FRAC_PI_2).abs() < 1e-12);
        assert!((normalize_angle(TAU + 1.0) - 1.0).abs() < 1e-12);
        assert!(normalize_angle(TAU) < TAU);
    }
}
