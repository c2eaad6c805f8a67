use crate::conversion::types::{ConvertError, PointLocation, Track, TrackSummary};
use chrono::{DateTime, Utc};

/// Derive the lap/session/activity aggregates for one track.
///
/// Start, end and elapsed time come from the first segment only; later
/// segments contribute solely through `total_distance`, the running distance
/// after the track's last record.
pub fn summarize_track(
    track: &Track,
    track_index: usize,
    total_distance: f64,
) -> Result<TrackSummary, ConvertError> {
    let first_segment = track
        .segments
        .first()
        .ok_or(ConvertError::EmptyTrack { track: track_index })?;

    let (start, end) = match (first_segment.points.first(), first_segment.points.last()) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(ConvertError::EmptySegment { track: track_index }),
    };

    let start_time = start.time.ok_or(ConvertError::MissingTimestamp(PointLocation {
        track: track_index,
        segment: 0,
        point: 0,
    }))?;
    let end_time = end.time.ok_or(ConvertError::MissingTimestamp(PointLocation {
        track: track_index,
        segment: 0,
        point: first_segment.points.len() - 1,
    }))?;

    Ok(TrackSummary {
        start: start.coordinate,
        end: end.coordinate,
        start_time_ms: start_time.timestamp_millis(),
        end_time_ms: end_time.timestamp_millis(),
        elapsed_seconds: elapsed_seconds(start_time, end_time),
        total_distance,
    })
}

fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let micros = end.timestamp_micros() - start.timestamp_micros();
    micros as f64 / 1_000_000.0
}
