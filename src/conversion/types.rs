use chrono::{DateTime, Utc};

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A single GPS fix as read from the track file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub coordinate: Coordinate,
    /// Elevation in meters.
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    pub points: Vec<TrackPoint>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub name: Option<String>,
    pub segments: Vec<Segment>,
}

/// Parsed GPS track file: optional file-level time plus its tracks in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsFile {
    pub time: Option<DateTime<Utc>>,
    pub tracks: Vec<Track>,
}

impl GpsFile {
    pub fn point_count(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|track| &track.segments)
            .map(|segment| segment.points.len())
            .sum()
    }
}

/// One normalized per-point output entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub position: Coordinate,
    /// Cumulative distance in meters since the first point of the file.
    pub distance: f64,
    pub elevation: Option<f64>,
    pub timestamp_ms: i64,
}

/// Aggregates for one track, shared by its lap, session and activity messages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSummary {
    pub start: Coordinate,
    pub end: Coordinate,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub elapsed_seconds: f64,
    pub total_distance: f64,
}

/// Location of a point inside the parsed file, used for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointLocation {
    pub track: usize,
    pub segment: usize,
    pub point: usize,
}

impl std::fmt::Display for PointLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "track {}, segment {}, point {}",
            self.track, self.segment, self.point
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Invalid GPX: {0}")]
    InvalidGpx(String),
    #[error("Invalid coordinate at {location}: {reason}")]
    InvalidCoordinate {
        location: PointLocation,
        reason: String,
    },
    #[error("Missing timestamp at {0}")]
    MissingTimestamp(PointLocation),
    #[error("Track {track} has no segments")]
    EmptyTrack { track: usize },
    #[error("Track {track} starts with an empty segment")]
    EmptySegment { track: usize },
    #[error("Failed to encode FIT file: {0}")]
    Encode(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
