//! Confirmed tracks, unconfirmed candidates and their per-object heuristics.

use nalgebra::{distance, Point2};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Bbox;

/// Heuristic classification of a track from its early-life displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindGuess {
    /// Not enough frames observed yet.
    #[default]
    Unknown,
    /// Moving object.
    Unit,
    /// Stationary area effect.
    AreaSpell,
}

impl KindGuess {
    /// Classify from the track age and accumulated centroid displacement.
    pub fn classify(age: u32, dist_sum: f64, kind_window: u32, kind_move_thresh: f64) -> Self {
        if age < kind_window {
            KindGuess::Unknown
        } else if dist_sum <= kind_move_thresh {
            KindGuess::AreaSpell
        } else {
            KindGuess::Unit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KindGuess::Unknown => "unknown",
            KindGuess::Unit => "unit",
            KindGuess::AreaSpell => "area_spell",
        }
    }
}

impl fmt::Display for KindGuess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Board side of an object relative to a horizontal split line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Enemy,
    Friendly,
}

impl Side {
    /// Label a centroid: `Enemy` above `split_y`, `Friendly` on or below it.
    /// No split line, no label.
    pub fn infer(center: Option<Point2<f64>>, split_y: Option<i32>) -> Option<Self> {
        let (center, split_y) = (center?, split_y?);
        if center.y < f64::from(split_y) {
            Some(Side::Enemy)
        } else {
            Some(Side::Friendly)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Enemy => "enemy",
            Side::Friendly => "friendly",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A confirmed, identity-bearing object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    /// Session-unique id, assigned from 1 and never reused.
    pub track_id: u64,

    /// Most recently matched box.
    pub bbox: Bbox,

    /// Frame index of the most recent match.
    pub last_seen_frame: u64,

    /// Frames since creation, including the creation frame.
    pub age: u32,

    /// Consecutive frames without a match.
    pub missed_frames: u32,

    /// Last observed centroid.
    pub last_center: Option<Point2<f64>>,

    /// Centroid displacement accumulated while `age <= kind_window`.
    pub dist_sum: f64,

    pub kind_guess: KindGuess,
}

impl Track {
    pub(crate) fn new(track_id: u64, bbox: Bbox, frame_index: u64) -> Self {
        Self {
            track_id,
            bbox,
            last_seen_frame: frame_index,
            age: 1,
            missed_frames: 0,
            last_center: None,
            dist_sum: 0.0,
            kind_guess: KindGuess::Unknown,
        }
    }

    /// Record a newly observed centroid.
    ///
    /// Displacement is only accumulated while the track is within its first
    /// `kind_window` frames, so the verdict freezes afterwards.
    pub(crate) fn observe_center(&mut self, center: Point2<f64>, kind_window: u32, kind_move_thresh: f64) {
        if let Some(prev) = self.last_center {
            if self.age <= kind_window {
                self.dist_sum += distance(&prev, &center);
            }
        }
        self.last_center = Some(center);
        self.refresh_kind(kind_window, kind_move_thresh);
    }

    /// Recompute `kind_guess` from the current age and `dist_sum`.
    pub(crate) fn refresh_kind(&mut self, kind_window: u32, kind_move_thresh: f64) {
        self.kind_guess = KindGuess::classify(self.age, self.dist_sum, kind_window, kind_move_thresh);
    }

    /// Apply a successful match.
    pub(crate) fn hit(&mut self, bbox: Bbox, frame_index: u64, kind_window: u32, kind_move_thresh: f64) {
        self.bbox = bbox;
        self.last_seen_frame = frame_index;
        self.missed_frames = 0;
        self.age += 1;
        self.observe_center(bbox.center(), kind_window, kind_move_thresh);
    }

    /// Apply a frame without a match. No displacement is added.
    pub(crate) fn miss(&mut self, kind_window: u32, kind_move_thresh: f64) {
        self.missed_frames += 1;
        self.age += 1;
        self.refresh_kind(kind_window, kind_move_thresh);
    }
}

/// An unconfirmed detection accumulating consecutive-match evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub bbox: Bbox,
    pub last_seen_frame: u64,
    /// Consecutive frames matched since creation, starting at 1.
    pub streak: u32,
}

impl Candidate {
    pub(crate) fn new(bbox: Bbox, frame_index: u64) -> Self {
        Self { bbox, last_seen_frame: frame_index, streak: 1 }
    }

    pub(crate) fn hit(&mut self, bbox: Bbox, frame_index: u64) {
        self.bbox = bbox;
        self.last_seen_frame = frame_index;
        self.streak += 1;
    }
}
