use crate::conversion::distance::DistanceAccumulator;
use crate::conversion::types::{ConvertError, PointLocation, Record, Track, TrackPoint};

/// Project one track's points into records, continuing from `state`.
///
/// The accumulator is never reset here: segment and track boundaries keep the
/// previous coordinate, so the gap between them counts toward the distance.
pub fn project_track(
    track: &Track,
    track_index: usize,
    state: DistanceAccumulator,
) -> Result<(Vec<Record>, DistanceAccumulator), ConvertError> {
    let capacity = track.segments.iter().map(|s| s.points.len()).sum::<usize>();

    track.segments.iter().enumerate().try_fold(
        (Vec::with_capacity(capacity), state),
        |acc, (segment_index, segment)| {
            segment
                .points
                .iter()
                .enumerate()
                .try_fold(acc, |(mut records, state), (point_index, point)| {
                    let location = PointLocation {
                        track: track_index,
                        segment: segment_index,
                        point: point_index,
                    };
                    let (record, state) = project_point(point, location, state)?;
                    records.push(record);
                    Ok::<_, ConvertError>((records, state))
                })
        },
    )
}

fn project_point(
    point: &TrackPoint,
    location: PointLocation,
    state: DistanceAccumulator,
) -> Result<(Record, DistanceAccumulator), ConvertError> {
    let time = point.time.ok_or(ConvertError::MissingTimestamp(location))?;
    let (_, state) = state.advance(point.coordinate);

    Ok((
        Record {
            position: point.coordinate,
            distance: state.total(),
            elevation: point.elevation,
            timestamp_ms: time.timestamp_millis(),
        },
        state,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::types::{Coordinate, Segment};
    use chrono::{DateTime, Utc};

    fn point(lat: f64, lon: f64, seconds: i64) -> TrackPoint {
        TrackPoint {
            coordinate: Coordinate::new(lat, lon),
            elevation: Some(100.0 + seconds as f64),
            time: DateTime::<Utc>::from_timestamp(1_700_000_000 + seconds, 0),
        }
    }

    fn project_all(tracks: &[Track]) -> Result<Vec<Record>, ConvertError> {
        let mut state = DistanceAccumulator::default();
        let mut records = Vec::new();
        for (index, track) in tracks.iter().enumerate() {
            let (projected, next) = project_track(track, index, state)?;
            records.extend(projected);
            state = next;
        }
        Ok(records)
    }

    fn track(segments: Vec<Vec<TrackPoint>>) -> Track {
        Track {
            name: None,
            segments: segments
                .into_iter()
                .map(|points| Segment { points })
                .collect(),
        }
    }

    #[test]
    fn records_follow_input_order_with_millisecond_timestamps() {
        let tracks = vec![track(vec![vec![point(0.0, 0.0, 0), point(0.0, 0.001, 1)]])];
        let records = project_all(&tracks).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].distance, 0.0);
        assert_eq!(records[0].timestamp_ms, 1_700_000_000_000);
        assert_eq!(records[1].timestamp_ms, 1_700_000_001_000);
        assert_eq!(records[1].elevation, Some(101.0));
        assert_eq!(records[1].position, Coordinate::new(0.0, 0.001));
    }

    #[test]
    fn distance_carries_across_segments_and_tracks() {
        let tracks = vec![
            track(vec![
                vec![point(0.0, 0.0, 0), point(0.0, 0.01, 1)],
                vec![point(0.0, 0.02, 2)],
            ]),
            track(vec![vec![point(0.0, 0.03, 3)]]),
        ];
        let records = project_all(&tracks).unwrap();

        assert_eq!(records.len(), 4);
        assert!(records.windows(2).all(|pair| pair[1].distance > pair[0].distance));
        // Each hop is the same 0.01 degree step along the equator.
        let hop = records[1].distance;
        assert!((records[3].distance - 3.0 * hop).abs() < 1e-3);
    }

    #[test]
    fn missing_timestamp_names_the_point() {
        let mut broken = point(0.0, 0.0, 5);
        broken.time = None;
        let tracks = vec![
            track(vec![vec![point(0.0, 0.0, 0)]]),
            track(vec![vec![], vec![point(0.0, 0.0, 1), broken]]),
        ];

        match project_all(&tracks) {
            Err(ConvertError::MissingTimestamp(location)) => assert_eq!(
                location,
                PointLocation {
                    track: 1,
                    segment: 1,
                    point: 1
                }
            ),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn project_track_resumes_from_given_state() {
        let first = track(vec![vec![point(0.0, 0.0, 0)]]);
        let second = track(vec![vec![point(0.0, 0.01, 1)]]);

        let (_, state) = project_track(&first, 0, DistanceAccumulator::default()).unwrap();
        let (records, state) = project_track(&second, 1, state).unwrap();

        assert!(records[0].distance > 0.0);
        assert_eq!(records[0].distance, state.total());
    }
}
