use crate::conversion::types::Coordinate;
use geo::{Distance, Geodesic, Point};

/// Geodesic distance in meters on the WGS84 ellipsoid.
///
/// Coincident points yield exactly 0; a non-finite result (which the
/// ellipsoidal solver should never produce for valid coordinates) is
/// reported as 0 rather than poisoning the running total.
pub fn geodesic_distance(from: Coordinate, to: Coordinate) -> f64 {
    if from == to {
        return 0.0;
    }

    let meters = Geodesic::distance(
        Point::new(from.longitude, from.latitude),
        Point::new(to.longitude, to.latitude),
    );

    if meters.is_finite() { meters.max(0.0) } else { 0.0 }
}

/// Returns `(increment, new_total)` for stepping from `previous` to `current`.
pub fn accumulate(
    previous: Option<Coordinate>,
    current: Coordinate,
    running_total: f64,
) -> (f64, f64) {
    let increment = previous
        .map(|previous| geodesic_distance(previous, current))
        .unwrap_or(0.0);
    (increment, running_total + increment)
}

/// Traversal state threaded through the whole file: the last coordinate seen
/// and the cumulative distance up to it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistanceAccumulator {
    previous: Option<Coordinate>,
    total: f64,
}

impl DistanceAccumulator {
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Consume one coordinate, returning the increment and the next state.
    pub fn advance(self, current: Coordinate) -> (f64, Self) {
        let (increment, total) = accumulate(self.previous, current, self.total);
        (
            increment,
            Self {
                previous: Some(current),
                total,
            },
        )
    }
}
