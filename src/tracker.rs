//! Main tracker implementation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

use crate::event::{Event, EventKind};
use crate::matching::{assign, unmatched};
use crate::track::{Candidate, Track};
use crate::{Bbox, Error, Result};

/// Configuration for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum IoU for a valid match, in `[0, 1]`.
    pub iou_thresh: f64,

    /// Consecutive sightings needed before a candidate becomes a track.
    /// `0` and `1` both spawn on first sighting.
    pub confirm_frames: u32,

    /// Consecutive missed frames a track survives; one more and it disappears.
    pub max_missed: u32,

    /// Frames over which displacement is accumulated for the kind guess.
    pub kind_window: u32,

    /// Displacement (pixels) at or below which a track is an area effect.
    pub kind_move_thresh: f64,

    /// Tag copied into every emitted event.
    pub source: String,
}

impl TrackerConfig {
    /// Create a tracker configuration with the default settings.
    pub fn new() -> Self {
        Self {
            iou_thresh: 0.3,
            confirm_frames: 2,
            max_missed: 5,
            kind_window: 6,
            kind_move_thresh: 10.0,
            source: "diff".to_string(),
        }
    }

    /// Check the configuration, coercing values that have an obvious repair.
    fn validated(mut self) -> Result<Self> {
        if !self.iou_thresh.is_finite() || !(0.0..=1.0).contains(&self.iou_thresh) {
            return Err(Error::InvalidConfig(format!(
                "iou_thresh must be within [0, 1], got {}",
                self.iou_thresh
            )));
        }

        if !self.kind_move_thresh.is_finite() || self.kind_move_thresh < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "kind_move_thresh must be finite and non-negative, got {}",
                self.kind_move_thresh
            )));
        }

        if self.kind_window < 1 {
            warn!("kind_window of 0 coerced to 1");
            self.kind_window = 1;
        }

        Ok(self)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-video tracking session.
///
/// Holds confirmed tracks and unconfirmed candidates. Call
/// [`advance`](Tracker::advance) once per frame with strictly increasing frame
/// indices; each call returns the events emitted on that frame.
#[derive(Debug, Clone)]
pub struct Tracker {
    config: TrackerConfig,

    /// Confirmed tracks keyed by id. Ids are monotonic, so key order is
    /// creation order.
    tracks: BTreeMap<u64, Track>,

    /// Unconfirmed candidates, in creation order.
    candidates: Vec<Candidate>,

    next_id: u64,

    last_frame: Option<u64>,
}

impl Tracker {
    /// Create a new tracker with the given configuration.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        let config = config.validated()?;
        Ok(Self {
            config,
            tracks: BTreeMap::new(),
            candidates: Vec::new(),
            next_id: 1,
            last_frame: None,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Process one frame of detections.
    ///
    /// # Arguments
    /// * `frame_index` - Index of this frame; must increase between calls
    /// * `detections` - Boxes found on this frame, in the differencer's order
    /// * `timestamp` - Optional frame time in seconds, copied into events
    /// * `split_y` - Optional board split line used for side labels
    ///
    /// # Returns
    /// Events in emission order: track updates, disappears, then spawns.
    pub fn advance(
        &mut self,
        frame_index: u64,
        detections: &[Bbox],
        timestamp: Option<f64>,
        split_y: Option<i32>,
    ) -> Vec<Event> {
        if let Some(last) = self.last_frame {
            if frame_index <= last {
                warn!(frame_index, last, "frame index did not increase");
            }
        }
        self.last_frame = Some(frame_index);

        let mut events = Vec::new();

        // STAGE 1: match confirmed tracks against all detections
        let track_ids: Vec<u64> = self.tracks.keys().copied().collect();
        let track_bboxes: Vec<Bbox> = self.tracks.values().map(|t| t.bbox).collect();
        let matches = assign(&track_bboxes, detections, self.config.iou_thresh);

        let mut track_matched = vec![false; track_ids.len()];
        for m in &matches {
            track_matched[m.index_a] = true;
            if let Some(track) = self.tracks.get_mut(&track_ids[m.index_a]) {
                track.hit(
                    detections[m.index_b],
                    frame_index,
                    self.config.kind_window,
                    self.config.kind_move_thresh,
                );
                events.push(Event::for_track(
                    EventKind::Update,
                    frame_index,
                    timestamp,
                    track,
                    &self.config.source,
                    Some(m.iou),
                    split_y,
                ));
            }
        }

        // STAGE 2: age unmatched tracks and drop the expired ones
        for (idx, track_id) in track_ids.iter().enumerate() {
            if track_matched[idx] {
                continue;
            }
            let expired = match self.tracks.get_mut(track_id) {
                Some(track) => {
                    track.miss(self.config.kind_window, self.config.kind_move_thresh);
                    track.missed_frames > self.config.max_missed
                }
                None => false,
            };
            if expired {
                if let Some(track) = self.tracks.remove(track_id) {
                    debug!(track_id, frame_index, age = track.age, "track disappeared");
                    events.push(Event::for_track(
                        EventKind::Disappear,
                        frame_index,
                        timestamp,
                        &track,
                        &self.config.source,
                        None,
                        split_y,
                    ));
                }
            }
        }

        // STAGE 3: detections no track claimed
        let leftover: Vec<Bbox> = unmatched(detections.len(), matches.iter().map(|m| m.index_b))
            .into_iter()
            .map(|i| detections[i])
            .collect();

        // STAGE 4: match candidates against the leftovers, promoting on a full streak
        let candidate_bboxes: Vec<Bbox> = self.candidates.iter().map(|c| c.bbox).collect();
        let cand_matches = assign(&candidate_bboxes, &leftover, self.config.iou_thresh);

        let mut keep = vec![false; self.candidates.len()];
        for m in &cand_matches {
            let bbox = leftover[m.index_b];
            let cand = &mut self.candidates[m.index_a];
            cand.hit(bbox, frame_index);
            if cand.streak >= self.config.confirm_frames {
                let event = self.spawn(frame_index, bbox, timestamp, Some(m.iou), split_y);
                events.push(event);
            } else {
                keep[m.index_a] = true;
            }
        }

        // STAGE 5: unconfirmed candidates get no grace period
        let mut kept = keep.into_iter();
        self.candidates.retain(|_| kept.next().unwrap_or(false));

        // STAGE 6: remaining leftovers spawn immediately or start a candidate
        for i in unmatched(leftover.len(), cand_matches.iter().map(|m| m.index_b)) {
            let bbox = leftover[i];
            if self.config.confirm_frames <= 1 {
                let event = self.spawn(frame_index, bbox, timestamp, None, split_y);
                events.push(event);
            } else {
                self.candidates.push(Candidate::new(bbox, frame_index));
            }
        }

        trace!(
            frame_index,
            detections = detections.len(),
            tracks = self.tracks.len(),
            candidates = self.candidates.len(),
            events = events.len(),
            "frame processed"
        );

        events
    }

    /// Copy of the current confirmed tracks, in creation order.
    pub fn snapshot_tracks(&self) -> Vec<Track> {
        self.tracks.values().cloned().collect()
    }

    /// Copy of the current unconfirmed candidates.
    pub fn snapshot_candidates(&self) -> Vec<Candidate> {
        self.candidates.clone()
    }

    /// Look up a live track by id.
    pub fn track(&self, track_id: u64) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    /// Get the total number of track ids issued so far.
    pub fn total_object_count(&self) -> u64 {
        self.next_id - 1
    }

    /// Get the current number of live tracks.
    pub fn current_object_count(&self) -> usize {
        self.tracks.len()
    }

    // Internal: allocate a new track and build its spawn event
    fn spawn(
        &mut self,
        frame_index: u64,
        bbox: Bbox,
        timestamp: Option<f64>,
        iou: Option<f64>,
        split_y: Option<i32>,
    ) -> Event {
        let track_id = self.next_id;
        self.next_id += 1;

        let mut track = Track::new(track_id, bbox, frame_index);
        track.observe_center(bbox.center(), self.config.kind_window, self.config.kind_move_thresh);
        debug!(track_id, frame_index, %bbox, "track spawned");

        let event = Event::for_track(
            EventKind::Spawn,
            frame_index,
            timestamp,
            &track,
            &self.config.source,
            iou,
            split_y,
        );
        self.tracks.insert(track_id, track);
        event
    }
}
