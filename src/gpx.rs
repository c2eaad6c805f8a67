//! Streaming GPX reader producing the track/segment/point model.
//!
//! Only track data is read: `<metadata><time>` (or the GPX 1.0 top-level
//! `<time>`), `<trk>`, `<trkseg>` and `<trkpt>` with its `<ele>` and
//! `<time>` children. Routes and waypoints are skipped. Element names are
//! matched on their local name so namespaced documents parse the same way.

use crate::conversion::types::{
    ConvertError, Coordinate, GpsFile, PointLocation, Segment, Track, TrackPoint,
};
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

pub fn parse_gpx(bytes: &[u8]) -> Result<GpsFile, ConvertError> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut state = GpxState::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e)?;
                state.open(&name, &e)?;
                state.path.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e)?;
                state.open(&name, &e)?;
                state.close(&name)?;
            }
            Ok(Event::End(_)) => {
                if let Some(name) = state.path.pop() {
                    state.close(&name)?;
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| ConvertError::InvalidGpx(e.to_string()))?;
                state.text(&text)?;
            }
            Ok(Event::CData(e)) => {
                let text = std::str::from_utf8(&e.into_inner())
                    .map_err(|e| ConvertError::InvalidGpx(e.to_string()))?
                    .to_string();
                state.text(&text)?;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ConvertError::InvalidGpx(format!(
                    "error at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if !state.seen_root {
        return Err(ConvertError::InvalidGpx("missing <gpx> root element".into()));
    }

    Ok(state.file)
}

#[derive(Default)]
struct GpxState {
    file: GpsFile,
    path: Vec<String>,
    point: Option<TrackPoint>,
    seen_root: bool,
}

impl GpxState {
    fn open(&mut self, name: &str, element: &BytesStart<'_>) -> Result<(), ConvertError> {
        match name {
            "gpx" if self.path.is_empty() => self.seen_root = true,
            "trk" if self.seen_root => self.file.tracks.push(Track::default()),
            "trkseg" => {
                if let Some(track) = self.file.tracks.last_mut() {
                    track.segments.push(Segment::default());
                }
            }
            "trkpt" if !self.file.tracks.is_empty() => {
                let coordinate = read_coordinate(element, self.next_location())?;
                self.point = Some(TrackPoint {
                    coordinate,
                    elevation: None,
                    time: None,
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), ConvertError> {
        if name != "trkpt" {
            return Ok(());
        }
        if let (Some(point), Some(track)) = (self.point.take(), self.file.tracks.last_mut()) {
            if track.segments.is_empty() {
                track.segments.push(Segment::default());
            }
            if let Some(segment) = track.segments.last_mut() {
                segment.points.push(point);
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ConvertError> {
        let depth = self.path.len();
        let (parent, element) = match depth {
            0 | 1 => return Ok(()),
            _ => (self.path[depth - 2].as_str(), self.path[depth - 1].as_str()),
        };

        match (parent, element) {
            ("trkpt", "ele") => {
                let elevation = text.trim().parse::<f64>().map_err(|_| {
                    ConvertError::InvalidGpx(format!(
                        "invalid elevation '{text}' at {}",
                        self.next_location()
                    ))
                })?;
                if let Some(point) = self.point.as_mut() {
                    point.elevation = Some(elevation);
                }
            }
            ("trkpt", "time") => {
                let time = parse_time(text).ok_or_else(|| {
                    ConvertError::InvalidGpx(format!(
                        "invalid time '{text}' at {}",
                        self.next_location()
                    ))
                })?;
                if let Some(point) = self.point.as_mut() {
                    point.time = Some(time);
                }
            }
            ("metadata", "time") | ("gpx", "time") => {
                let time = parse_time(text).ok_or_else(|| {
                    ConvertError::InvalidGpx(format!("invalid file time '{text}'"))
                })?;
                self.file.time = Some(time);
            }
            ("trk", "name") => {
                if let Some(track) = self.file.tracks.last_mut() {
                    track.name = Some(text.to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Location the point currently being read will occupy once closed.
    fn next_location(&self) -> PointLocation {
        let track = self.file.tracks.len().saturating_sub(1);
        let segments = self
            .file
            .tracks
            .last()
            .map(|track| track.segments.as_slice())
            .unwrap_or_default();
        PointLocation {
            track,
            segment: segments.len().saturating_sub(1),
            point: segments.last().map(|s| s.points.len()).unwrap_or(0),
        }
    }
}

fn local_name(element: &BytesStart<'_>) -> Result<String, ConvertError> {
    std::str::from_utf8(element.local_name().as_ref())
        .map(str::to_string)
        .map_err(|e| ConvertError::InvalidGpx(e.to_string()))
}

fn read_coordinate(
    element: &BytesStart<'_>,
    location: PointLocation,
) -> Result<Coordinate, ConvertError> {
    let invalid = |reason: String| ConvertError::InvalidCoordinate { location, reason };

    let mut latitude = None;
    let mut longitude = None;

    for attr in element.attributes() {
        let attr = attr.map_err(|e| ConvertError::InvalidGpx(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| ConvertError::InvalidGpx(e.to_string()))?;
        match attr.key.local_name().as_ref() {
            b"lat" => latitude = Some(parse_degrees(&value, 90.0).map_err(&invalid)?),
            b"lon" => longitude = Some(parse_degrees(&value, 180.0).map_err(&invalid)?),
            _ => {}
        }
    }

    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Ok(Coordinate::new(latitude, longitude)),
        (None, _) => Err(invalid("missing lat attribute".into())),
        (_, None) => Err(invalid("missing lon attribute".into())),
    }
}

fn parse_degrees(raw: &str, limit: f64) -> Result<f64, String> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if !value.is_finite() || value.abs() > limit {
        return Err(format!("{value} is outside ±{limit}"));
    }
    Ok(value)
}

fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|time| time.with_timezone(&Utc))
        .ok()
}
