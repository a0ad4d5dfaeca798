//! Sliding window of recent frames for differencing.

use std::collections::VecDeque;

use crate::{Error, Result};

/// Keeps the last `diff_step + 1` frames so each new frame can be diffed
/// against the one `diff_step` frames earlier.
#[derive(Debug, Clone)]
pub struct FrameWindow<T> {
    frames: VecDeque<T>,
    diff_step: usize,
}

impl<T> FrameWindow<T> {
    /// Create a window comparing frames `diff_step` apart (1 = previous frame).
    pub fn new(diff_step: usize) -> Result<Self> {
        if diff_step < 1 {
            return Err(Error::InvalidConfig("diff_step must be >= 1".to_string()));
        }
        Ok(Self {
            frames: VecDeque::with_capacity(diff_step + 1),
            diff_step,
        })
    }

    pub fn diff_step(&self) -> usize {
        self.diff_step
    }

    /// Add the newest frame, evicting the oldest once the window is full.
    pub fn push(&mut self, frame: T) {
        if self.frames.len() > self.diff_step {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// `(older, newest)` frames to diff, or `None` until enough frames arrived.
    pub fn pair(&self) -> Option<(&T, &T)> {
        if self.frames.len() <= self.diff_step {
            return None;
        }
        Some((self.frames.front()?, self.frames.back()?))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
