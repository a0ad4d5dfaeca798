//! JSON-lines readers and writers for events and per-frame detections, plus
//! frame-directory listing for the differencer input.
//!
//! One JSON object per line, UTF-8, `\n` terminated.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{Bbox, Event, Result};

/// Boxes produced by the differencer for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub frame: u64,

    /// Frame time in seconds.
    #[serde(rename = "t", default)]
    pub timestamp: Option<f64>,

    #[serde(default)]
    pub bboxes: Vec<Bbox>,
}

/// Write events to `writer`, one JSON record per line.
pub fn write_events_jsonl<W: Write>(writer: &mut W, events: &[Event]) -> Result<()> {
    for event in events {
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Read events back from JSON lines. Blank lines are skipped.
pub fn read_events_jsonl<R: BufRead>(reader: R) -> Result<Vec<Event>> {
    read_jsonl(reader)
}

/// Read per-frame detections from JSON lines. Blank lines are skipped.
pub fn read_detections_jsonl<R: BufRead>(reader: R) -> Result<Vec<FrameDetections>> {
    read_jsonl(reader)
}

fn read_jsonl<R: BufRead, T: for<'de> Deserialize<'de>>(reader: R) -> Result<Vec<T>> {
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        items.push(serde_json::from_str(line)?);
    }
    Ok(items)
}

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

/// Image files in `dir`, sorted by file name. Frame `i` is the `i`-th entry.
pub fn list_frame_images<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_frame = path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_frame {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Buffered event sink backed by a file.
pub struct EventWriter {
    writer: BufWriter<File>,
    written: usize,
}

impl EventWriter {
    /// Create (or truncate) the events file, creating parent directories.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Append one frame's events.
    pub fn write(&mut self, events: &[Event]) -> Result<()> {
        write_events_jsonl(&mut self.writer, events)?;
        self.written += events.len();
        Ok(())
    }

    /// Number of events written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
