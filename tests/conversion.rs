use fitparser::profile::MesgNum;
use fitparser::{FitDataRecord, Value, from_bytes};
use gpx2fit::config::{ConversionOptions, Sport, SubSport};
use gpx2fit::conversion::{ActivityMessage, ConvertError, MessageKind, convert_gpx_bytes};
use gpx2fit::output::write_outputs;

const EQUATOR_WALK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="tests" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata><time>2020-01-01T00:00:00Z</time></metadata>
  <trk>
    <name>Equator</name>
    <trkseg>
      <trkpt lat="0.0" lon="0.0"><ele>10</ele><time>2020-01-01T00:00:00Z</time></trkpt>
      <trkpt lat="0.0" lon="1.0"><ele>11</ele><time>2020-01-01T00:00:01Z</time></trkpt>
      <trkpt lat="0.0" lon="2.0"><time>2020-01-01T00:00:02Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

const TWO_TRACKS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="tests">
  <trk>
    <trkseg>
      <trkpt lat="47.0" lon="8.0"><time>2021-06-01T08:00:00Z</time></trkpt>
      <trkpt lat="47.001" lon="8.001"><time>2021-06-01T08:00:10Z</time></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="47.002" lon="8.002"><time>2021-06-01T08:00:20Z</time></trkpt>
    </trkseg>
  </trk>
  <trk>
    <trkseg>
      <trkpt lat="47.003" lon="8.003"><time>2021-06-01T08:05:00Z</time></trkpt>
      <trkpt lat="47.003" lon="8.003"><time>2021-06-01T08:05:05Z</time></trkpt>
      <trkpt lat="47.004" lon="8.004"><time>2021-06-01T08:05:15Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

fn numeric(record: &FitDataRecord, name: &str) -> Option<f64> {
    record
        .fields()
        .iter()
        .find(|field| field.name() == name)
        .and_then(|field| match field.value() {
            Value::Timestamp(time) => Some(time.timestamp() as f64),
            Value::UInt32z(raw) => Some(f64::from(*raw)),
            other => other.clone().try_into().ok(),
        })
}

fn of_kind(records: &[FitDataRecord], kind: MesgNum) -> Vec<&FitDataRecord> {
    records
        .iter()
        .filter(|record| record.kind() == kind)
        .collect()
}

fn decode(gpx: &str) -> Vec<FitDataRecord> {
    let converted = convert_gpx_bytes(gpx.as_bytes(), &ConversionOptions::default())
        .expect("conversion should succeed");
    from_bytes(&converted.fit_bytes).expect("encoded file should decode")
}

#[test]
fn equator_walk_decodes_in_file_order() {
    let records = decode(EQUATOR_WALK);
    let kinds: Vec<MesgNum> = records.iter().map(FitDataRecord::kind).collect();

    assert_eq!(
        kinds,
        vec![
            MesgNum::FileId,
            MesgNum::DeviceInfo,
            MesgNum::Event,
            MesgNum::Lap,
            MesgNum::Session,
            MesgNum::Activity,
            MesgNum::Record,
            MesgNum::Record,
            MesgNum::Record,
            MesgNum::Event,
        ]
    );
}

#[test]
fn equator_walk_records_carry_distance_and_position() {
    let records = decode(EQUATOR_WALK);
    let points = of_kind(&records, MesgNum::Record);

    let distances: Vec<f64> = points
        .iter()
        .map(|record| numeric(record, "distance").expect("distance present"))
        .collect();
    assert_eq!(distances[0], 0.0);
    assert!((distances[1] - 111_319.49).abs() < 0.02);
    assert!((distances[2] - 222_638.98).abs() < 0.02);

    let longitude = numeric(points[1], "position_long").expect("longitude present");
    assert!((longitude * 180.0 / 2f64.powi(31) - 1.0).abs() < 1e-6);

    assert_eq!(numeric(points[0], "timestamp"), Some(1_577_836_800.0));
    assert_eq!(numeric(points[2], "timestamp"), Some(1_577_836_802.0));

    // Decoders may surface altitude through its enhanced component.
    let altitude = |record: &FitDataRecord| {
        numeric(record, "enhanced_altitude").or_else(|| numeric(record, "altitude"))
    };
    assert!((altitude(points[0]).unwrap() - 10.0).abs() < 0.01);
    assert_eq!(altitude(points[2]), None);
}

#[test]
fn equator_walk_summaries_cover_the_whole_track() {
    let records = decode(EQUATOR_WALK);

    let lap = of_kind(&records, MesgNum::Lap)[0];
    assert_eq!(numeric(lap, "total_elapsed_time"), Some(2.0));
    assert_eq!(numeric(lap, "total_timer_time"), Some(2.0));
    assert!((numeric(lap, "total_distance").unwrap() - 222_638.98).abs() < 0.02);
    assert_eq!(numeric(lap, "start_time"), Some(1_577_836_800.0));

    let session = of_kind(&records, MesgNum::Session)[0];
    assert_eq!(numeric(session, "num_laps"), Some(1.0));
    assert_eq!(numeric(session, "timestamp"), Some(1_577_836_802.0));

    let activity = of_kind(&records, MesgNum::Activity)[0];
    assert_eq!(numeric(activity, "num_sessions"), Some(1.0));
}

#[test]
fn every_track_gets_its_own_summary_triple() {
    let records = decode(TWO_TRACKS);

    assert_eq!(of_kind(&records, MesgNum::Lap).len(), 2);
    assert_eq!(of_kind(&records, MesgNum::Session).len(), 2);
    assert_eq!(of_kind(&records, MesgNum::Activity).len(), 2);
    assert_eq!(of_kind(&records, MesgNum::Record).len(), 6);

    let distances: Vec<f64> = of_kind(&records, MesgNum::Record)
        .iter()
        .filter_map(|record| numeric(record, "distance"))
        .collect();
    assert_eq!(distances.len(), 6);
    assert_eq!(distances[0], 0.0);
    assert!(distances.windows(2).all(|pair| pair[1] >= pair[0]));
    // Repeated coordinate adds nothing.
    assert_eq!(distances[3], distances[4]);

    let last_lap = of_kind(&records, MesgNum::Lap)[1];
    let total = numeric(last_lap, "total_distance").unwrap();
    assert!((total - distances[5]).abs() < 0.02);
}

#[test]
fn summaries_only_span_the_first_segment() {
    let converted =
        convert_gpx_bytes(TWO_TRACKS.as_bytes(), &ConversionOptions::default()).unwrap();

    let first = &converted.summaries[0];
    assert_eq!(first.elapsed_seconds, 10.0);
    assert_eq!(first.end.latitude, 47.001);

    let records: Vec<_> = converted.stream.records().collect();
    // Distance is still taken from the accumulator after the whole track.
    assert_eq!(first.total_distance, records[2].distance);
}

#[test]
fn empty_first_segment_is_rejected() {
    let gpx = r#"<gpx version="1.1">
      <trk>
        <trkseg></trkseg>
        <trkseg><trkpt lat="1" lon="1"><time>2021-06-01T08:00:00Z</time></trkpt></trkseg>
      </trk>
    </gpx>"#;

    let err = convert_gpx_bytes(gpx.as_bytes(), &ConversionOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::EmptySegment { track: 0 }));
}

#[test]
fn point_without_time_is_rejected() {
    let gpx = r#"<gpx version="1.1">
      <metadata><time>2021-06-01T08:00:00Z</time></metadata>
      <trk><trkseg>
        <trkpt lat="1" lon="1"><time>2021-06-01T08:00:00Z</time></trkpt>
        <trkpt lat="1" lon="2"></trkpt>
      </trkseg></trk>
    </gpx>"#;

    let err = convert_gpx_bytes(gpx.as_bytes(), &ConversionOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::MissingTimestamp(location) if location.point == 1));
}

#[test]
fn file_without_tracks_still_decodes() {
    let gpx = r#"<gpx version="1.1"><metadata><time>2021-06-01T08:00:00Z</time></metadata></gpx>"#;
    let records = decode(gpx);
    let kinds: Vec<MesgNum> = records.iter().map(FitDataRecord::kind).collect();

    assert_eq!(
        kinds,
        vec![
            MesgNum::FileId,
            MesgNum::DeviceInfo,
            MesgNum::Event,
            MesgNum::Event
        ]
    );
}

#[test]
fn empty_document_decodes_without_times() {
    let records = decode(r#"<gpx version="1.1" creator="tests"></gpx>"#);
    let kinds: Vec<MesgNum> = records.iter().map(FitDataRecord::kind).collect();

    assert_eq!(
        kinds,
        vec![
            MesgNum::FileId,
            MesgNum::DeviceInfo,
            MesgNum::Event,
            MesgNum::Event
        ]
    );
    assert_eq!(numeric(&records[0], "time_created"), None);
    assert_eq!(numeric(&records[2], "timestamp"), None);
}

#[test]
fn untimed_track_names_the_first_point() {
    let gpx = r#"<gpx version="1.1">
      <trk><trkseg><trkpt lat="1" lon="1"/><trkpt lat="1" lon="2"/></trkseg></trk>
    </gpx>"#;

    let err = convert_gpx_bytes(gpx.as_bytes(), &ConversionOptions::default()).unwrap_err();
    match err {
        ConvertError::MissingTimestamp(location) => {
            assert_eq!((location.track, location.segment, location.point), (0, 0, 0))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn cdata_times_are_honored() {
    let gpx = r#"<gpx version="1.1">
      <trk><trkseg>
        <trkpt lat="1" lon="1"><time><![CDATA[2021-06-01T08:00:00Z]]></time></trkpt>
      </trkseg></trk>
    </gpx>"#;

    let records = decode(gpx);
    let point = of_kind(&records, MesgNum::Record)[0];
    assert_eq!(numeric(point, "timestamp"), Some(1_622_534_400.0));
}

#[test]
fn options_flow_into_summaries_and_identity() {
    let mut options = ConversionOptions {
        sport: Sport::Cycling,
        sub_sport: SubSport::Road,
        ..Default::default()
    };
    options.device.serial_number = 42;

    let converted = convert_gpx_bytes(EQUATOR_WALK.as_bytes(), &options).unwrap();
    let session = converted
        .stream
        .messages()
        .iter()
        .find_map(|message| match message {
            ActivityMessage::Session(session) => Some(session),
            _ => None,
        })
        .unwrap();
    assert_eq!(session.sport, Sport::Cycling);
    assert_eq!(session.sub_sport, SubSport::Road);

    let records = from_bytes(&converted.fit_bytes).unwrap();
    let file_id = of_kind(&records, MesgNum::FileId)[0];
    assert_eq!(numeric(file_id, "serial_number"), Some(42.0));
}

#[test]
fn conversions_are_byte_identical() {
    let options = ConversionOptions::default();
    let first = convert_gpx_bytes(TWO_TRACKS.as_bytes(), &options).unwrap();
    let second = convert_gpx_bytes(TWO_TRACKS.as_bytes(), &options).unwrap();

    assert_eq!(first.fit_bytes, second.fit_bytes);
    assert_eq!(first.csv, second.csv);
}

#[test]
fn outputs_land_on_disk() {
    let converted =
        convert_gpx_bytes(EQUATOR_WALK.as_bytes(), &ConversionOptions::default()).unwrap();
    let dir = std::env::temp_dir().join(format!("gpx2fit-it-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let fit = dir.join("walk.fit");
    let csv = dir.join("walk.csv");

    write_outputs(&[
        (fit.as_path(), converted.fit_bytes.as_slice()),
        (csv.as_path(), converted.csv.as_bytes()),
    ])
    .unwrap();

    let written = std::fs::read(&fit).unwrap();
    assert_eq!(written, converted.fit_bytes);
    assert_eq!(from_bytes(&written).unwrap().len(), 10);

    let dump = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(
        dump.lines()
            .filter(|line| line.starts_with("Data,") && line.contains(",record,"))
            .count(),
        converted.stream.count(MessageKind::Record)
    );
    std::fs::remove_dir_all(dir).unwrap();
}
