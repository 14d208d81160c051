//! Snapping observed positions onto the filed route
//!
//! Each segment's closest point comes from intersecting the segment's line
//! with its perpendicular through the flight. Intersections outside the segment
//! fall back to the nearer endpoint. The route-wide minimum wins; equidistant
//! segments resolve to the first one in traversal order, which is an arbitrary
//! but stable choice.

use crate::model::{Fix, FlightPlan, FlightTrack, RouteTrack};
use flight_geometry::{Bounds, CoordinateTransform, PlanarPoint};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct RouteTracker {
    transform: CoordinateTransform,
}

/// Closest point found on one segment
#[derive(Debug, Clone, Copy)]
struct SegmentSnap<'a> {
    index: usize,
    prev: &'a Fix,
    next: &'a Fix,
    point: PlanarPoint,
    distance: f64,
}

impl RouteTracker {
    pub fn new(transform: CoordinateTransform) -> Self {
        Self { transform }
    }

    pub fn find_route_track(
        &self,
        track: &FlightTrack,
        plan: &FlightPlan,
        bounds: &Bounds,
    ) -> RouteTrack {
        let fixes = plan.route.fixes();

        match fixes {
            [] => RouteTrack::unbracketed(*track),
            [only] => RouteTrack::bracketed(*track, only.clone(), only.clone(), 0),
            _ => self.snap_to_route(track, plan, bounds),
        }
    }

    fn snap_to_route(
        &self,
        track: &FlightTrack,
        plan: &FlightPlan,
        bounds: &Bounds,
    ) -> RouteTrack {
        let position = self.transform.to_planar(track.latitude, track.longitude, bounds);

        let best = plan
            .route
            .segments()
            .enumerate()
            .map(|(index, (prev, next))| {
                let a = self.planar(prev, bounds);
                let b = self.planar(next, bounds);
                let point = self.closest_point_on_segment(position, a, b);
                SegmentSnap {
                    index,
                    prev,
                    next,
                    point,
                    distance: self.transform.distance(position, point),
                }
            })
            .fold(None, |best: Option<SegmentSnap>, candidate| match best {
                // strict comparison keeps the earlier segment on ties
                Some(current) if !(candidate.distance < current.distance) => Some(current),
                _ => Some(candidate),
            });

        let Some(best) = best else {
            return RouteTrack::unbracketed(*track);
        };

        let SegmentSnap { prev, next, .. } = best;
        let heading = self
            .transform
            .bearing(self.planar(prev, bounds), self.planar(next, bounds));
        let snapped = self.transform.planar_to_geo(best.point, bounds);

        debug!(
            "Snapped to segment {}->{} at ({:.6}, {:.6}), offset {:.1} m",
            prev.id(),
            next.id(),
            snapped.latitude,
            snapped.longitude,
            best.distance
        );

        let route_track = FlightTrack {
            latitude: snapped.latitude,
            longitude: snapped.longitude,
            altitude: plan.assigned_altitude,
            timestamp: track.timestamp,
            ground_speed: plan.assigned_speed,
            heading,
        };

        RouteTrack::bracketed(route_track, prev.clone(), next.clone(), best.index + 1)
    }

    /// Closest point to `p` on segment `a`-`b`, all in the planar frame.
    ///
    /// Horizontal and vertical segments skip the slope form: the intersection is
    /// read off directly and only the varying coordinate is range-checked.
    pub fn closest_point_on_segment(
        &self,
        p: PlanarPoint,
        a: PlanarPoint,
        b: PlanarPoint,
    ) -> PlanarPoint {
        if a == b {
            return a;
        }

        let (intersection, check_x, check_y) = if a.y == b.y {
            (PlanarPoint::new(p.x, a.y), true, false)
        } else if a.x == b.x {
            (PlanarPoint::new(a.x, p.y), false, true)
        } else {
            let m = (b.y - a.y) / (b.x - a.x);
            let c = a.y - m * a.x;
            let m_perp = -1.0 / m;
            let c_perp = p.y - m_perp * p.x;
            // m and m_perp have opposite signs, so the denominator never vanishes
            let x = (c_perp - c) / (m - m_perp);
            (PlanarPoint::new(x, m * x + c), true, true)
        };

        let within_x = !check_x || strictly_between(intersection.x, a.x, b.x);
        let within_y = !check_y || strictly_between(intersection.y, a.y, b.y);

        if within_x && within_y {
            intersection
        } else if self.transform.distance(p, b) < self.transform.distance(p, a) {
            b
        } else {
            a
        }
    }

    fn planar(&self, fix: &Fix, bounds: &Bounds) -> PlanarPoint {
        self.transform.to_planar(fix.latitude(), fix.longitude(), bounds)
    }
}

fn strictly_between(v: f64, e1: f64, e2: f64) -> bool {
    v > e1.min(e2) && v < e1.max(e2)
}
