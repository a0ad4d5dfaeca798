//! # rtb-tracker - motion-box tracking engine
//!
//! Turns per-frame motion-detection bounding boxes into a stable set of
//! tracked objects and a stream of lifecycle events (`spawn`, `update`,
//! `disappear`).
//!
//! ## Features
//!
//! - Greedy IoU assignment between tracks and detections
//! - Two-stage confirmation (candidate -> track) with immediate expiry of
//!   unconfirmed candidates
//! - Kind guess (stationary area effect vs. moving unit) and board side label
//! - JSON-lines event sink
//! - Grayscale frame differencer (`imageproc`) producing the input boxes
//!
//! ## Example
//!
//! ```rust
//! use rtb_tracker::{Bbox, Tracker, TrackerConfig};
//!
//! let mut config = TrackerConfig::new();
//! config.confirm_frames = 1;
//! let mut tracker = Tracker::new(config).unwrap();
//!
//! let events = tracker.advance(0, &[Bbox::new(0, 0, 10, 10)], None, Some(50));
//! assert_eq!(events.len(), 1);
//! ```

pub mod bbox;
pub mod diff;
pub mod event;
pub mod io;
pub mod matching;
pub mod track;
pub mod tracker;
pub mod window;

// Re-exports for convenience
pub use bbox::Bbox;
pub use diff::{extract_diff_bboxes, load_gray_frame, DiffConfig, GrayFrame};
pub use event::{Event, EventKind};
pub use io::{
    list_frame_images, read_detections_jsonl, read_events_jsonl, write_events_jsonl, EventWriter, FrameDetections,
};
pub use matching::{assign, overlap_score, Match};
pub use track::{Candidate, KindGuess, Side, Track};
pub use tracker::{Tracker, TrackerConfig};
pub use window::FrameWindow;

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the tracking crate
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid bounding box: {0}")]
        InvalidBbox(String),

        #[error("Invalid frame: {0}")]
        InvalidFrame(String),

        #[error("Serialization error: {0}")]
        Serialization(#[from] serde_json::Error),

        #[error("Image error: {0}")]
        Image(#[from] image::ImageError),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for tracking operations
    pub type Result<T> = std::result::Result<T, Error>;
}
