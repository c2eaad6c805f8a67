//! Typed output messages and the order in which they are emitted.
//!
//! An activity file is always laid out as
//!
//! ```text
//! FileId, DeviceInfo, TimerStart, (Lap, Session, Activity)*, Record*, TimerStop
//! ```
//!
//! [`MessageSequencer`] is a typestate builder: each stage only exposes the
//! transitions that are legal from it, so an out-of-order stream cannot be
//! constructed.

use crate::config::{DeviceProfile, Sport, SubSport};
use crate::conversion::types::{Coordinate, Record, TrackSummary};
use std::marker::PhantomData;

/// One variant per kind of message the activity file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    FileId,
    DeviceInfo,
    TimerStart,
    Lap,
    Session,
    Activity,
    Record,
    TimerStop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileIdentity {
    pub manufacturer: u16,
    pub product: u16,
    pub serial_number: u32,
    /// `None` when the file carries no time at all (no metadata time and no
    /// records); encoded as the FIT invalid value.
    pub time_created_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIdentity {
    pub manufacturer: u16,
    pub product: u16,
    pub serial_number: u32,
    pub software_version: f64,
    pub device_index: u8,
}

impl From<&DeviceProfile> for DeviceIdentity {
    fn from(profile: &DeviceProfile) -> Self {
        Self {
            manufacturer: profile.manufacturer,
            product: profile.product,
            serial_number: profile.serial_number,
            software_version: profile.software_version,
            device_index: 0,
        }
    }
}

/// Manually triggered timer start or stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerEvent {
    pub timestamp_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LapSummary {
    pub message_index: u16,
    pub timestamp_ms: i64,
    pub start_time_ms: i64,
    pub start: Coordinate,
    pub end: Coordinate,
    pub total_elapsed_time: f64,
    pub total_timer_time: f64,
    pub total_distance: f64,
    pub sport: Sport,
    pub sub_sport: SubSport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub message_index: u16,
    pub timestamp_ms: i64,
    pub start_time_ms: i64,
    pub start: Coordinate,
    pub end: Coordinate,
    pub total_elapsed_time: f64,
    pub total_timer_time: f64,
    pub total_distance: f64,
    pub sport: Sport,
    pub sub_sport: SubSport,
    pub first_lap_index: u16,
    pub num_laps: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySummary {
    pub timestamp_ms: i64,
    pub total_timer_time: f64,
    pub num_sessions: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActivityMessage {
    FileId(FileIdentity),
    DeviceInfo(DeviceIdentity),
    TimerStart(TimerEvent),
    Lap(LapSummary),
    Session(SessionSummary),
    Activity(ActivitySummary),
    Record(Record),
    TimerStop(TimerEvent),
}

impl ActivityMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ActivityMessage::FileId(_) => MessageKind::FileId,
            ActivityMessage::DeviceInfo(_) => MessageKind::DeviceInfo,
            ActivityMessage::TimerStart(_) => MessageKind::TimerStart,
            ActivityMessage::Lap(_) => MessageKind::Lap,
            ActivityMessage::Session(_) => MessageKind::Session,
            ActivityMessage::Activity(_) => MessageKind::Activity,
            ActivityMessage::Record(_) => MessageKind::Record,
            ActivityMessage::TimerStop(_) => MessageKind::TimerStop,
        }
    }
}

/// The finished, ordered message list handed to the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityStream {
    messages: Vec<ActivityMessage>,
}

impl ActivityStream {
    pub fn messages(&self) -> &[ActivityMessage] {
        &self.messages
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.messages.iter().filter(|msg| msg.kind() == kind).count()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.messages.iter().filter_map(|msg| match msg {
            ActivityMessage::Record(record) => Some(record),
            _ => None,
        })
    }
}

impl<'a> IntoIterator for &'a ActivityStream {
    type Item = &'a ActivityMessage;
    type IntoIter = std::slice::Iter<'a, ActivityMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// Stage markers for [`MessageSequencer`].
pub mod stage {
    /// File and device identity written; waiting for the timer to start.
    #[derive(Debug)]
    pub struct Identified;
    /// Timer running; per-track summaries may be appended.
    #[derive(Debug)]
    pub struct Summarizing;
    /// Record block written; only the timer stop remains.
    #[derive(Debug)]
    pub struct Recorded;
}

#[derive(Debug)]
pub struct MessageSequencer<S> {
    messages: Vec<ActivityMessage>,
    stage: PhantomData<S>,
}

impl<S> MessageSequencer<S> {
    fn into_stage<T>(self) -> MessageSequencer<T> {
        MessageSequencer {
            messages: self.messages,
            stage: PhantomData,
        }
    }
}

impl MessageSequencer<stage::Identified> {
    pub fn new(file_id: FileIdentity, device: DeviceIdentity) -> Self {
        Self {
            messages: vec![
                ActivityMessage::FileId(file_id),
                ActivityMessage::DeviceInfo(device),
            ],
            stage: PhantomData,
        }
    }

    pub fn start_timer(
        mut self,
        timestamp_ms: Option<i64>,
    ) -> MessageSequencer<stage::Summarizing> {
        self.messages
            .push(ActivityMessage::TimerStart(TimerEvent { timestamp_ms }));
        self.into_stage()
    }
}

impl MessageSequencer<stage::Summarizing> {
    /// Append the lap, session and activity messages describing one track.
    pub fn track_summary(
        mut self,
        summary: &TrackSummary,
        sport: Sport,
        sub_sport: SubSport,
    ) -> Self {
        self.messages.push(ActivityMessage::Lap(LapSummary {
            message_index: 0,
            timestamp_ms: summary.end_time_ms,
            start_time_ms: summary.start_time_ms,
            start: summary.start,
            end: summary.end,
            total_elapsed_time: summary.elapsed_seconds,
            total_timer_time: summary.elapsed_seconds,
            total_distance: summary.total_distance,
            sport,
            sub_sport,
        }));
        self.messages.push(ActivityMessage::Session(SessionSummary {
            message_index: 0,
            timestamp_ms: summary.end_time_ms,
            start_time_ms: summary.start_time_ms,
            start: summary.start,
            end: summary.end,
            total_elapsed_time: summary.elapsed_seconds,
            total_timer_time: summary.elapsed_seconds,
            total_distance: summary.total_distance,
            sport,
            sub_sport,
            first_lap_index: 0,
            num_laps: 1,
        }));
        self.messages.push(ActivityMessage::Activity(ActivitySummary {
            timestamp_ms: summary.end_time_ms,
            total_timer_time: summary.elapsed_seconds,
            num_sessions: 1,
        }));
        self
    }

    pub fn records(
        mut self,
        records: impl IntoIterator<Item = Record>,
    ) -> MessageSequencer<stage::Recorded> {
        self.messages
            .extend(records.into_iter().map(ActivityMessage::Record));
        self.into_stage()
    }
}

impl MessageSequencer<stage::Recorded> {
    pub fn stop_timer(mut self, timestamp_ms: Option<i64>) -> ActivityStream {
        self.messages
            .push(ActivityMessage::TimerStop(TimerEvent { timestamp_ms }));
        ActivityStream {
            messages: self.messages,
        }
    }
}
