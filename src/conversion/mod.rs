pub mod distance;
pub mod project;
pub mod sequence;
pub mod summary;
pub mod types;

use crate::config::ConversionOptions;
use crate::fit::{encode_fit, to_csv};
use crate::gpx::parse_gpx;
use distance::DistanceAccumulator;
use project::project_track;
use sequence::{DeviceIdentity, FileIdentity, MessageSequencer};
use summary::summarize_track;

pub use sequence::{ActivityMessage, ActivityStream, MessageKind};
pub use types::{
    ConvertError, Coordinate, GpsFile, PointLocation, Record, Segment, Track, TrackPoint,
    TrackSummary,
};

/// Result of converting one GPX payload.
#[derive(Debug, Clone)]
pub struct ConvertedActivity {
    pub stream: ActivityStream,
    /// One summary per input track, in input order.
    pub summaries: Vec<TrackSummary>,
    /// Encoded FIT file.
    pub fit_bytes: Vec<u8>,
    /// FitCSVTool-style dump of the same messages.
    pub csv: String,
}

/// Parse a GPX payload, build the activity message stream, and encode it.
///
/// The function performs three stages:
/// 1. [`parse_gpx`] reads tracks, segments and points from the XML.
/// 2. [`build_activity`] projects records, summarizes each track and
///    sequences every message in file order.
/// 3. [`encode_fit`] and [`to_csv`] serialize the finished stream.
///
/// Nothing is returned unless every stage succeeds.
pub fn convert_gpx_bytes(
    bytes: &[u8],
    options: &ConversionOptions,
) -> Result<ConvertedActivity, ConvertError> {
    let file = parse_gpx(bytes)?;
    let (stream, summaries) = build_activity_with_summaries(&file, options)?;

    let fit_bytes = encode_fit(&stream)?;
    let csv = to_csv(&stream)?;

    tracing::info!(
        tracks = summaries.len(),
        records = stream.count(MessageKind::Record),
        bytes = fit_bytes.len(),
        "converted GPX to FIT"
    );

    Ok(ConvertedActivity {
        stream,
        summaries,
        fit_bytes,
        csv,
    })
}

/// Build the ordered activity message stream for a parsed file.
pub fn build_activity(
    file: &GpsFile,
    options: &ConversionOptions,
) -> Result<ActivityStream, ConvertError> {
    build_activity_with_summaries(file, options).map(|(stream, _)| stream)
}

fn build_activity_with_summaries(
    file: &GpsFile,
    options: &ConversionOptions,
) -> Result<(ActivityStream, Vec<TrackSummary>), ConvertError> {
    // Summaries need the distance as of each track's end, so records and
    // summaries are computed together and emitted in separate blocks.
    let (records, summaries, _) = file.tracks.iter().enumerate().try_fold(
        (
            Vec::<Record>::with_capacity(file.point_count()),
            Vec::<TrackSummary>::with_capacity(file.tracks.len()),
            DistanceAccumulator::default(),
        ),
        |(mut records, mut summaries, state), (track_index, track)| {
            let (projected, state) = project_track(track, track_index, state)?;
            let summary = summarize_track(track, track_index, state.total())?;
            tracing::debug!(
                track = track_index,
                name = track.name.as_deref().unwrap_or(""),
                records = projected.len(),
                distance = summary.total_distance,
                elapsed = summary.elapsed_seconds,
                "summarized track"
            );
            records.extend(projected);
            summaries.push(summary);
            Ok::<_, ConvertError>((records, summaries, state))
        },
    )?;

    // Every record is timestamped by now, so the start is only absent for a
    // file with no records and no metadata time.
    let start_ms = file
        .time
        .map(|time| time.timestamp_millis())
        .or_else(|| records.first().map(|record| record.timestamp_ms));
    let stop_ms = records
        .last()
        .map(|record| record.timestamp_ms)
        .or(start_ms);

    let file_id = FileIdentity {
        manufacturer: options.device.manufacturer,
        product: options.device.product,
        serial_number: options.device.serial_number,
        time_created_ms: start_ms,
    };

    let sequencer = summaries.iter().fold(
        MessageSequencer::new(file_id, DeviceIdentity::from(&options.device))
            .start_timer(start_ms),
        |sequencer, summary| sequencer.track_summary(summary, options.sport, options.sub_sport),
    );
    let stream = sequencer.records(records).stop_timer(stop_ms);

    Ok((stream, summaries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn point(lat: f64, lon: f64, seconds: i64) -> TrackPoint {
        TrackPoint {
            coordinate: Coordinate::new(lat, lon),
            elevation: Some(12.5),
            time: DateTime::<Utc>::from_timestamp(1_577_836_800 + seconds, 0),
        }
    }

    fn file(tracks: Vec<Vec<Vec<TrackPoint>>>) -> GpsFile {
        GpsFile {
            time: None,
            tracks: tracks
                .into_iter()
                .map(|segments| Track {
                    name: None,
                    segments: segments
                        .into_iter()
                        .map(|points| Segment { points })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn equator_walk_produces_one_summary_triple() {
        let input = file(vec![vec![vec![
            point(0.0, 0.0, 0),
            point(0.0, 1.0, 1),
            point(0.0, 2.0, 2),
        ]]]);

        let stream = build_activity(&input, &ConversionOptions::default()).unwrap();
        let records: Vec<_> = stream.records().collect();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].distance, 0.0);
        assert!((records[1].distance - 111_319.49).abs() < 1.0);
        assert!((records[2].distance - 222_638.98).abs() < 2.0);

        assert_eq!(stream.count(MessageKind::Lap), 1);
        assert_eq!(stream.count(MessageKind::Session), 1);
        assert_eq!(stream.count(MessageKind::Activity), 1);

        let lap = stream
            .messages()
            .iter()
            .find_map(|msg| match msg {
                ActivityMessage::Lap(lap) => Some(lap),
                _ => None,
            })
            .unwrap();
        assert_eq!(lap.total_elapsed_time, 2.0);
        assert_eq!(lap.total_distance, records[2].distance);
    }

    #[test]
    fn zero_tracks_emit_only_framing() {
        let mut input = file(Vec::new());
        input.time = DateTime::<Utc>::from_timestamp(1_577_836_800, 0);

        let stream = build_activity(&input, &ConversionOptions::default()).unwrap();
        let kinds: Vec<_> = stream.messages().iter().map(ActivityMessage::kind).collect();

        assert_eq!(
            kinds,
            vec![
                MessageKind::FileId,
                MessageKind::DeviceInfo,
                MessageKind::TimerStart,
                MessageKind::TimerStop
            ]
        );
    }

    #[test]
    fn zero_tracks_without_any_time_leave_timestamps_unset() {
        let stream = build_activity(&file(Vec::new()), &ConversionOptions::default()).unwrap();

        assert_eq!(stream.messages().len(), 4);
        match (&stream.messages()[0], &stream.messages()[2], &stream.messages()[3]) {
            (
                ActivityMessage::FileId(file_id),
                ActivityMessage::TimerStart(start),
                ActivityMessage::TimerStop(stop),
            ) => {
                assert_eq!(file_id.time_created_ms, None);
                assert_eq!(start.timestamp_ms, None);
                assert_eq!(stop.timestamp_ms, None);
            }
            other => panic!("unexpected framing: {other:?}"),
        }
    }

    #[test]
    fn untimed_points_report_their_location() {
        let mut untimed = point(0.0, 0.0, 0);
        untimed.time = None;
        let input = file(vec![vec![vec![untimed]]]);

        match build_activity(&input, &ConversionOptions::default()) {
            Err(ConvertError::MissingTimestamp(location)) => assert_eq!(
                location,
                PointLocation {
                    track: 0,
                    segment: 0,
                    point: 0
                }
            ),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn metadata_time_wins_for_file_creation() {
        let mut input = file(vec![vec![vec![point(0.0, 0.0, 60)]]]);
        input.time = DateTime::<Utc>::from_timestamp(1_577_836_800, 0);

        let stream = build_activity(&input, &ConversionOptions::default()).unwrap();
        match &stream.messages()[0] {
            ActivityMessage::FileId(file_id) => {
                assert_eq!(file_id.time_created_ms, Some(1_577_836_800_000))
            }
            other => panic!("unexpected first message: {other:?}"),
        }
    }

    #[test]
    fn timer_stop_uses_last_record_time() {
        let input = file(vec![
            vec![vec![point(0.0, 0.0, 0), point(0.0, 0.1, 30)]],
            vec![vec![point(0.0, 0.2, 90)]],
        ]);

        let stream = build_activity(&input, &ConversionOptions::default()).unwrap();
        match (&stream.messages()[2], stream.messages().last()) {
            (ActivityMessage::TimerStart(start), Some(ActivityMessage::TimerStop(stop))) => {
                assert_eq!(start.timestamp_ms, Some(1_577_836_800_000));
                assert_eq!(stop.timestamp_ms, Some(1_577_836_890_000));
            }
            other => panic!("unexpected timer events: {other:?}"),
        }
    }

    #[test]
    fn last_track_summary_matches_final_record_distance() {
        let input = file(vec![
            vec![vec![point(0.0, 0.0, 0), point(0.0, 0.1, 30)]],
            vec![
                vec![point(0.0, 0.2, 60)],
                vec![point(0.1, 0.2, 90), point(0.2, 0.2, 120)],
            ],
        ]);

        let (stream, summaries) =
            build_activity_with_summaries(&input, &ConversionOptions::default()).unwrap();
        let last_record = stream.records().last().unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].total_distance, last_record.distance);
        // Second track's bounds come from its one-point first segment.
        assert_eq!(summaries[1].elapsed_seconds, 0.0);
        assert_eq!(summaries[1].end, Coordinate::new(0.0, 0.2));
    }

    #[test]
    fn empty_first_segment_aborts_the_build() {
        let input = file(vec![
            vec![vec![point(0.0, 0.0, 0)]],
            vec![vec![], vec![point(0.0, 0.1, 10)]],
        ]);

        assert!(matches!(
            build_activity(&input, &ConversionOptions::default()),
            Err(ConvertError::EmptySegment { track: 1 })
        ));
    }

    #[test]
    fn repeated_builds_are_identical() {
        let input = file(vec![vec![vec![point(10.0, 10.0, 0), point(10.01, 10.02, 5)]]]);
        let options = ConversionOptions::default();

        let first = build_activity(&input, &options).unwrap();
        let second = build_activity(&input, &options).unwrap();
        assert_eq!(first, second);
        assert_eq!(encode_fit(&first).unwrap(), encode_fit(&second).unwrap());
    }
}
