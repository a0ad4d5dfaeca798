//! Lifecycle events emitted by the tracker.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::track::{KindGuess, Side, Track};
use crate::Bbox;

/// What happened to a track on a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Spawn,
    Update,
    Disappear,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Spawn => "spawn",
            EventKind::Update => "update",
            EventKind::Disappear => "disappear",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable lifecycle record.
///
/// The serialized form always carries `event`, `frame`, `t`, `track_id`,
/// `bbox` and `source` (`t` may be `null`). Every other field is omitted
/// entirely when absent, which keeps "not applicable" distinct from zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "event")]
    pub kind: EventKind,

    pub frame: u64,

    /// Frame time in seconds.
    #[serde(rename = "t", default)]
    pub timestamp: Option<f64>,

    pub track_id: u64,

    pub bbox: Bbox,

    pub source: String,

    /// Overlap with the matched box. Absent for first-sighting spawns and
    /// disappears.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iou: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,

    #[serde(rename = "missed", default, skip_serializing_if = "Option::is_none")]
    pub missed_frames: Option<u32>,

    /// Centroid `[x, y]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<[f64; 2]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind_guess: Option<KindGuess>,

    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl Event {
    /// Bare event with only the always-present fields set.
    pub fn new(
        kind: EventKind,
        frame: u64,
        timestamp: Option<f64>,
        track_id: u64,
        bbox: Bbox,
        source: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            frame,
            timestamp,
            track_id,
            bbox,
            source: source.into(),
            iou: None,
            age: None,
            missed_frames: None,
            center: None,
            side: None,
            kind_guess: None,
            meta: None,
        }
    }

    /// Event describing `track` as it stands after this frame's bookkeeping.
    pub(crate) fn for_track(
        kind: EventKind,
        frame: u64,
        timestamp: Option<f64>,
        track: &Track,
        source: &str,
        iou: Option<f64>,
        split_y: Option<i32>,
    ) -> Self {
        let mut event = Self::new(kind, frame, timestamp, track.track_id, track.bbox, source);
        event.iou = iou;
        event.age = Some(track.age);
        event.missed_frames = Some(track.missed_frames);
        event.center = track.last_center.map(|c| [c.x, c.y]);
        event.side = Side::infer(track.last_center, split_y);
        event.kind_guess = Some(track.kind_guess);
        event
    }

    /// Attach metadata, replacing any existing map.
    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn center_point(&self) -> Option<Point2<f64>> {
        self.center.map(|[x, y]| Point2::new(x, y))
    }

    /// Map the event to its JSON record.
    pub fn to_record(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
