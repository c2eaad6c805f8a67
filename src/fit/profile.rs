//! The slice of the FIT global profile this crate writes.
//!
//! Every [`ActivityMessage`] maps onto one FIT message with a fixed local
//! message number and a fixed field layout. Values are converted from
//! physical units (degrees, meters, seconds, epoch milliseconds) into the raw
//! integers the profile prescribes here, so the framing code in
//! [`super::encode`] only ever deals with bytes.

use crate::config::{Sport, SubSport};
use crate::conversion::sequence::ActivityMessage;
use crate::conversion::types::{ConvertError, Coordinate};

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;

const SEMICIRCLES_PER_DEGREE: f64 = 2_147_483_648.0 / 180.0;

mod mesg_num {
    pub const FILE_ID: u16 = 0;
    pub const SESSION: u16 = 18;
    pub const LAP: u16 = 19;
    pub const RECORD: u16 = 20;
    pub const EVENT: u16 = 21;
    pub const DEVICE_INFO: u16 = 23;
    pub const ACTIVITY: u16 = 34;
}

const FILE_TYPE_ACTIVITY: i64 = 4;
const EVENT_TIMER: i64 = 0;
const EVENT_SESSION: i64 = 8;
const EVENT_LAP: i64 = 9;
const EVENT_ACTIVITY: i64 = 26;
const EVENT_TYPE_START: i64 = 0;
const EVENT_TYPE_STOP: i64 = 1;
const TIMER_TRIGGER_MANUAL: i64 = 0;
const LAP_TRIGGER_SESSION_END: i64 = 7;
const SESSION_TRIGGER_ACTIVITY_END: i64 = 0;
const ACTIVITY_TYPE_MANUAL: i64 = 0;
const SOURCE_TYPE_LOCAL: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Enum,
    UInt8,
    UInt16,
    SInt32,
    UInt32,
    UInt32z,
}

impl BaseType {
    pub fn id(self) -> u8 {
        match self {
            BaseType::Enum => 0x00,
            BaseType::UInt8 => 0x02,
            BaseType::UInt16 => 0x84,
            BaseType::SInt32 => 0x85,
            BaseType::UInt32 => 0x86,
            BaseType::UInt32z => 0x8C,
        }
    }

    pub fn size(self) -> u8 {
        match self {
            BaseType::Enum | BaseType::UInt8 => 1,
            BaseType::UInt16 => 2,
            BaseType::SInt32 | BaseType::UInt32 | BaseType::UInt32z => 4,
        }
    }

    fn invalid(self) -> i64 {
        match self {
            BaseType::Enum | BaseType::UInt8 => 0xFF,
            BaseType::UInt16 => 0xFFFF,
            BaseType::SInt32 => 0x7FFF_FFFF,
            BaseType::UInt32 => 0xFFFF_FFFF,
            BaseType::UInt32z => 0,
        }
    }

    /// Valid raw range, excluding the invalid sentinel.
    fn range(self) -> (i64, i64) {
        match self {
            BaseType::Enum | BaseType::UInt8 => (0, 0xFE),
            BaseType::UInt16 => (0, 0xFFFE),
            BaseType::SInt32 => (i32::MIN as i64, 0x7FFF_FFFE),
            BaseType::UInt32 => (0, 0xFFFF_FFFE),
            BaseType::UInt32z => (1, 0xFFFF_FFFF),
        }
    }

    /// Append `raw` (or the invalid sentinel) in little-endian order.
    pub fn write(self, raw: Option<i64>, out: &mut Vec<u8>) {
        let value = raw.unwrap_or_else(|| self.invalid());
        let bytes = value.to_le_bytes();
        out.extend_from_slice(&bytes[..self.size() as usize]);
    }
}

/// One field of an outgoing message, already converted to its raw value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub number: u8,
    pub name: &'static str,
    pub base_type: BaseType,
    pub units: &'static str,
    pub scale: f64,
    pub offset: f64,
    pub raw: Option<i64>,
}

impl FieldValue {
    fn new(number: u8, name: &'static str, base_type: BaseType) -> Self {
        Self {
            number,
            name,
            base_type,
            units: "",
            scale: 1.0,
            offset: 0.0,
            raw: None,
        }
    }

    fn units(mut self, units: &'static str) -> Self {
        self.units = units;
        self
    }

    fn scaled(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    /// Store an already-raw integer; out-of-range values become invalid.
    fn raw(mut self, raw: i64) -> Self {
        let (min, max) = self.base_type.range();
        self.raw = (min..=max).contains(&raw).then_some(raw);
        self
    }

    /// Store a physical value through the field's scale and offset.
    fn value(self, physical: f64) -> Self {
        let raw = ((physical + self.offset) * self.scale).round();
        if raw.is_finite() {
            self.raw(raw as i64)
        } else {
            self
        }
    }

    fn optional(self, physical: Option<f64>) -> Self {
        match physical {
            Some(physical) => self.value(physical),
            None => self,
        }
    }

    /// Physical value as shown in tabular dumps.
    pub fn physical(&self) -> Option<f64> {
        self.raw.map(|raw| raw as f64 / self.scale - self.offset)
    }
}

/// A message ready for framing.
#[derive(Debug, Clone, PartialEq)]
pub struct FitMessage {
    pub global: u16,
    pub local: u8,
    pub name: &'static str,
    pub fields: Vec<FieldValue>,
}

impl FitMessage {
    /// `(field number, size, base type)` triples as written in a definition.
    pub fn layout(&self) -> Vec<(u8, u8, u8)> {
        self.fields
            .iter()
            .map(|field| (field.number, field.base_type.size(), field.base_type.id()))
            .collect()
    }
}

pub fn fit_timestamp(timestamp_ms: i64) -> Result<i64, ConvertError> {
    let seconds = timestamp_ms.div_euclid(1000) - FIT_EPOCH_OFFSET;
    if !(0..=0xFFFF_FFFE).contains(&seconds) {
        return Err(ConvertError::Encode(format!(
            "timestamp {timestamp_ms} ms is outside the FIT date range"
        )));
    }
    Ok(seconds)
}

pub fn semicircles(degrees: f64) -> i64 {
    (degrees * SEMICIRCLES_PER_DEGREE)
        .round()
        .clamp(i32::MIN as f64, (i32::MAX - 1) as f64) as i64
}

pub fn sport_code(sport: Sport) -> i64 {
    match sport {
        Sport::Generic => 0,
        Sport::Running => 1,
        Sport::Cycling => 2,
        Sport::Swimming => 5,
        Sport::Walking => 11,
        Sport::Hiking => 17,
    }
}

pub fn sub_sport_code(sub_sport: SubSport) -> i64 {
    match sub_sport {
        SubSport::Generic => 0,
        SubSport::Treadmill => 1,
        SubSport::Street => 2,
        SubSport::Trail => 3,
        SubSport::Track => 4,
        SubSport::IndoorCycling => 6,
        SubSport::Road => 7,
        SubSport::Mountain => 8,
    }
}

fn timestamp_field(
    number: u8,
    name: &'static str,
    timestamp_ms: i64,
) -> Result<FieldValue, ConvertError> {
    Ok(FieldValue::new(number, name, BaseType::UInt32)
        .units("s")
        .raw(fit_timestamp(timestamp_ms)?))
}

/// Like [`timestamp_field`], but an absent time is written as invalid.
fn optional_timestamp_field(
    number: u8,
    name: &'static str,
    timestamp_ms: Option<i64>,
) -> Result<FieldValue, ConvertError> {
    match timestamp_ms {
        Some(timestamp_ms) => timestamp_field(number, name, timestamp_ms),
        None => Ok(FieldValue::new(number, name, BaseType::UInt32).units("s")),
    }
}

fn position_fields(
    lat: (u8, &'static str),
    long: (u8, &'static str),
    at: Coordinate,
) -> [FieldValue; 2] {
    [
        FieldValue::new(lat.0, lat.1, BaseType::SInt32)
            .units("semicircles")
            .raw(semicircles(at.latitude)),
        FieldValue::new(long.0, long.1, BaseType::SInt32)
            .units("semicircles")
            .raw(semicircles(at.longitude)),
    ]
}

fn elapsed_field(number: u8, name: &'static str, seconds: f64) -> FieldValue {
    FieldValue::new(number, name, BaseType::UInt32)
        .units("s")
        .scaled(1000.0, 0.0)
        .value(seconds)
}

fn distance_field(number: u8, name: &'static str, meters: f64) -> FieldValue {
    FieldValue::new(number, name, BaseType::UInt32)
        .units("m")
        .scaled(100.0, 0.0)
        .value(meters)
}

fn enum_field(number: u8, name: &'static str, value: i64) -> FieldValue {
    FieldValue::new(number, name, BaseType::Enum).raw(value)
}

/// Translate one activity message into its FIT representation.
pub fn describe(message: &ActivityMessage) -> Result<FitMessage, ConvertError> {
    let described = match message {
        ActivityMessage::FileId(file_id) => FitMessage {
            global: mesg_num::FILE_ID,
            local: 0,
            name: "file_id",
            fields: vec![
                enum_field(0, "type", FILE_TYPE_ACTIVITY),
                FieldValue::new(1, "manufacturer", BaseType::UInt16)
                    .raw(file_id.manufacturer.into()),
                FieldValue::new(2, "product", BaseType::UInt16).raw(file_id.product.into()),
                FieldValue::new(3, "serial_number", BaseType::UInt32z)
                    .raw(file_id.serial_number.into()),
                optional_timestamp_field(4, "time_created", file_id.time_created_ms)?,
            ],
        },
        ActivityMessage::DeviceInfo(device) => FitMessage {
            global: mesg_num::DEVICE_INFO,
            local: 1,
            name: "device_info",
            fields: vec![
                FieldValue::new(0, "device_index", BaseType::UInt8)
                    .raw(device.device_index.into()),
                FieldValue::new(2, "manufacturer", BaseType::UInt16)
                    .raw(device.manufacturer.into()),
                FieldValue::new(3, "serial_number", BaseType::UInt32z)
                    .raw(device.serial_number.into()),
                FieldValue::new(4, "product", BaseType::UInt16).raw(device.product.into()),
                FieldValue::new(5, "software_version", BaseType::UInt16)
                    .scaled(100.0, 0.0)
                    .value(device.software_version),
                enum_field(25, "source_type", SOURCE_TYPE_LOCAL),
            ],
        },
        ActivityMessage::TimerStart(event) | ActivityMessage::TimerStop(event) => {
            let event_type = if matches!(message, ActivityMessage::TimerStart(_)) {
                EVENT_TYPE_START
            } else {
                EVENT_TYPE_STOP
            };
            FitMessage {
                global: mesg_num::EVENT,
                local: 2,
                name: "event",
                fields: vec![
                    optional_timestamp_field(253, "timestamp", event.timestamp_ms)?,
                    enum_field(0, "event", EVENT_TIMER),
                    enum_field(1, "event_type", event_type),
                    FieldValue::new(3, "timer_trigger", BaseType::UInt32)
                        .raw(TIMER_TRIGGER_MANUAL),
                    FieldValue::new(4, "event_group", BaseType::UInt8).raw(0),
                ],
            }
        }
        ActivityMessage::Record(record) => {
            let [lat, long] =
                position_fields((0, "position_lat"), (1, "position_long"), record.position);
            FitMessage {
                global: mesg_num::RECORD,
                local: 3,
                name: "record",
                fields: vec![
                    timestamp_field(253, "timestamp", record.timestamp_ms)?,
                    lat,
                    long,
                    FieldValue::new(2, "altitude", BaseType::UInt16)
                        .units("m")
                        .scaled(5.0, 500.0)
                        .optional(record.elevation),
                    distance_field(5, "distance", record.distance),
                ],
            }
        }
        ActivityMessage::Lap(lap) => {
            let [start_lat, start_long] = position_fields(
                (3, "start_position_lat"),
                (4, "start_position_long"),
                lap.start,
            );
            let [end_lat, end_long] =
                position_fields((5, "end_position_lat"), (6, "end_position_long"), lap.end);
            FitMessage {
                global: mesg_num::LAP,
                local: 4,
                name: "lap",
                fields: vec![
                    FieldValue::new(254, "message_index", BaseType::UInt16)
                        .raw(lap.message_index.into()),
                    timestamp_field(253, "timestamp", lap.timestamp_ms)?,
                    enum_field(0, "event", EVENT_LAP),
                    enum_field(1, "event_type", EVENT_TYPE_STOP),
                    timestamp_field(2, "start_time", lap.start_time_ms)?,
                    start_lat,
                    start_long,
                    end_lat,
                    end_long,
                    elapsed_field(7, "total_elapsed_time", lap.total_elapsed_time),
                    elapsed_field(8, "total_timer_time", lap.total_timer_time),
                    distance_field(9, "total_distance", lap.total_distance),
                    enum_field(24, "lap_trigger", LAP_TRIGGER_SESSION_END),
                    enum_field(25, "sport", sport_code(lap.sport)),
                    enum_field(39, "sub_sport", sub_sport_code(lap.sub_sport)),
                ],
            }
        }
        ActivityMessage::Session(session) => {
            let [start_lat, start_long] = position_fields(
                (3, "start_position_lat"),
                (4, "start_position_long"),
                session.start,
            );
            let [end_lat, end_long] = position_fields(
                (38, "end_position_lat"),
                (39, "end_position_long"),
                session.end,
            );
            FitMessage {
                global: mesg_num::SESSION,
                local: 5,
                name: "session",
                fields: vec![
                    FieldValue::new(254, "message_index", BaseType::UInt16)
                        .raw(session.message_index.into()),
                    timestamp_field(253, "timestamp", session.timestamp_ms)?,
                    enum_field(0, "event", EVENT_SESSION),
                    enum_field(1, "event_type", EVENT_TYPE_STOP),
                    timestamp_field(2, "start_time", session.start_time_ms)?,
                    start_lat,
                    start_long,
                    enum_field(5, "sport", sport_code(session.sport)),
                    enum_field(6, "sub_sport", sub_sport_code(session.sub_sport)),
                    elapsed_field(7, "total_elapsed_time", session.total_elapsed_time),
                    elapsed_field(8, "total_timer_time", session.total_timer_time),
                    distance_field(9, "total_distance", session.total_distance),
                    FieldValue::new(25, "first_lap_index", BaseType::UInt16)
                        .raw(session.first_lap_index.into()),
                    FieldValue::new(26, "num_laps", BaseType::UInt16)
                        .raw(session.num_laps.into()),
                    enum_field(28, "trigger", SESSION_TRIGGER_ACTIVITY_END),
                    end_lat,
                    end_long,
                ],
            }
        }
        ActivityMessage::Activity(activity) => FitMessage {
            global: mesg_num::ACTIVITY,
            local: 6,
            name: "activity",
            fields: vec![
                timestamp_field(253, "timestamp", activity.timestamp_ms)?,
                elapsed_field(0, "total_timer_time", activity.total_timer_time),
                FieldValue::new(1, "num_sessions", BaseType::UInt16)
                    .raw(activity.num_sessions.into()),
                enum_field(2, "type", ACTIVITY_TYPE_MANUAL),
                enum_field(3, "event", EVENT_ACTIVITY),
                enum_field(4, "event_type", EVENT_TYPE_STOP),
            ],
        },
    };
    Ok(described)
}
