//! rtb-track CLI
//!
//! Runs the tracker over either a directory of frame images (differenced
//! pairwise into motion boxes) or a JSON-lines file of precomputed boxes, and
//! writes `events.jsonl` to the output directory.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rtb_tracker::io::{list_frame_images, read_detections_jsonl, FrameDetections};
use rtb_tracker::{
    extract_diff_bboxes, load_gray_frame, Candidate, DiffConfig, Event, EventWriter, FrameWindow, Track, Tracker,
    TrackerConfig,
};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rtb-track")]
#[command(about = "Track motion boxes and emit spawn/update/disappear events", long_about = None)]
struct Args {
    /// Directory of frame images, processed in file-name order
    #[arg(long, required_unless_present = "detections", conflicts_with = "detections")]
    frames: Option<PathBuf>,

    /// JSON-lines file of per-frame detections
    #[arg(short, long)]
    detections: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    out: PathBuf,

    /// First frame index to process
    #[arg(long, default_value = "0")]
    start: u64,

    /// Frame index to stop at (exclusive)
    #[arg(long)]
    end: Option<u64>,

    /// Dump per-frame track/candidate snapshots to <out>/debug
    #[arg(long)]
    debug: bool,

    /// Frame rate used to derive `t`; missing or non-positive leaves `t` null
    #[arg(long)]
    fps: Option<f64>,

    /// Frame height in pixels for side labels when reading detections
    #[arg(long)]
    frame_height: Option<u32>,

    /// Board split ratio to infer enemy/friendly side
    #[arg(long, default_value = "0.5")]
    side_split: f64,

    /// Diff threshold
    #[arg(long, default_value = "25")]
    diff_threshold: u8,

    /// Gaussian blur kernel size (0 disables)
    #[arg(long, default_value = "0")]
    blur: i32,

    /// Frame step for diff (1 compares to previous frame)
    #[arg(long, default_value = "1")]
    diff_step: usize,

    /// Morphology kernel size
    #[arg(long, default_value = "3")]
    kernel_size: usize,

    /// Min bbox area
    #[arg(long, default_value = "100")]
    min_area: i64,

    /// ROI top ratio
    #[arg(long, default_value = "0.14")]
    roi_top: f64,

    /// ROI bottom ratio
    #[arg(long, default_value = "0.74")]
    roi_bottom: f64,

    /// ROI left ratio
    #[arg(long, default_value = "0.0")]
    roi_left: f64,

    /// ROI right ratio
    #[arg(long, default_value = "1.0")]
    roi_right: f64,

    /// Tracker configuration JSON; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// IoU threshold
    #[arg(long)]
    iou_thresh: Option<f64>,

    /// Frames to confirm spawn
    #[arg(long)]
    confirm_frames: Option<u32>,

    /// Max missed frames
    #[arg(long)]
    max_missed: Option<u32>,

    /// Frames to accumulate movement for kind_guess
    #[arg(long)]
    kind_window: Option<u32>,

    /// Movement threshold to infer area_spell vs unit
    #[arg(long)]
    kind_move_thresh: Option<f64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct DebugFrame<'a> {
    frame: u64,
    detections: &'a FrameDetections,
    tracks: Vec<Track>,
    candidates: Vec<Candidate>,
    events: &'a [Event],
}

/// Tracker plus its sinks for one run.
struct Session {
    tracker: Tracker,
    writer: EventWriter,
    debug_dir: Option<PathBuf>,
    processed: usize,
}

impl Session {
    fn step(&mut self, detections: &FrameDetections, split_y: Option<i32>) -> Result<()> {
        let events = self
            .tracker
            .advance(detections.frame, &detections.bboxes, detections.timestamp, split_y);
        self.writer.write(&events)?;
        self.processed += 1;

        if !events.is_empty() {
            debug!(frame = detections.frame, events = events.len(), "events emitted");
        }

        if let Some(dir) = &self.debug_dir {
            let snapshot = DebugFrame {
                frame: detections.frame,
                detections,
                tracks: self.tracker.snapshot_tracks(),
                candidates: self.tracker.snapshot_candidates(),
                events: &events,
            };
            write_debug_frame(dir, &snapshot)?;
        }
        Ok(())
    }
}

fn load_config(args: &Args) -> Result<TrackerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("failed to open config {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => TrackerConfig::default(),
    };

    if let Some(v) = args.iou_thresh {
        config.iou_thresh = v;
    }
    if let Some(v) = args.confirm_frames {
        config.confirm_frames = v;
    }
    if let Some(v) = args.max_missed {
        config.max_missed = v;
    }
    if let Some(v) = args.kind_window {
        config.kind_window = v;
    }
    if let Some(v) = args.kind_move_thresh {
        config.kind_move_thresh = v;
    }
    Ok(config)
}

fn diff_config(args: &Args) -> DiffConfig {
    DiffConfig {
        threshold: args.diff_threshold,
        min_area: args.min_area,
        kernel_size: args.kernel_size,
        blur_ksize: args.blur,
        roi_top: args.roi_top,
        roi_bottom: args.roi_bottom,
        roi_left: args.roi_left,
        roi_right: args.roi_right,
    }
}

fn timestamp(frame_index: u64, fps: Option<f64>) -> Option<f64> {
    fps.filter(|fps| *fps > 0.0).map(|fps| frame_index as f64 / fps)
}

fn in_range(args: &Args, frame_index: u64) -> bool {
    frame_index >= args.start && args.end.map_or(true, |end| frame_index < end)
}

fn write_debug_frame(dir: &Path, snapshot: &DebugFrame<'_>) -> Result<()> {
    let path = dir.join(format!("frame_{:06}.json", snapshot.frame));
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}

fn run_frames(args: &Args, dir: &Path, session: &mut Session) -> Result<()> {
    let config = diff_config(args);
    config.validate()?;
    info!(?config, diff_step = args.diff_step, "differencer configuration");

    let mut window = FrameWindow::new(args.diff_step)?;
    let paths = list_frame_images(dir).with_context(|| format!("failed to list frames in {}", dir.display()))?;
    if paths.is_empty() {
        warn!("no frame images found in {}", dir.display());
    }

    for (index, path) in paths.iter().enumerate() {
        let frame_index = index as u64;
        if frame_index < args.start {
            continue;
        }
        if !in_range(args, frame_index) {
            break;
        }

        let image = load_gray_frame(path).with_context(|| format!("failed to load frame {}", path.display()))?;
        window.push(image);
        let Some((prev, curr)) = window.pair() else {
            continue;
        };

        let bboxes = extract_diff_bboxes(prev, curr, &config)
            .with_context(|| format!("failed to diff frame {}", path.display()))?;
        let split_y = Some((f64::from(curr.height()) * args.side_split) as i32);
        let detections = FrameDetections {
            frame: frame_index,
            timestamp: timestamp(frame_index, args.fps),
            bboxes,
        };
        session.step(&detections, split_y)?;
    }
    Ok(())
}

fn run_detections(args: &Args, path: &Path, session: &mut Session) -> Result<()> {
    let input = File::open(path).with_context(|| format!("failed to open detections {}", path.display()))?;
    let mut frames = read_detections_jsonl(BufReader::new(input))?;
    frames.sort_by_key(|f| f.frame);

    let split_y = args.frame_height.map(|h| (f64::from(h) * args.side_split) as i32);
    for mut frame in frames {
        if frame.frame < args.start {
            continue;
        }
        if !in_range(args, frame.frame) {
            break;
        }
        frame.timestamp = frame.timestamp.or_else(|| timestamp(frame.frame, args.fps));
        session.step(&frame, split_y)?;
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    if !args.side_split.is_finite() {
        bail!("--side-split must be finite, got {}", args.side_split);
    }

    let config = load_config(&args)?;
    info!(?config, "tracker configuration");
    let tracker = Tracker::new(config)?;

    fs::create_dir_all(&args.out).with_context(|| format!("failed to create {}", args.out.display()))?;
    let debug_dir = if args.debug {
        let dir = args.out.join("debug");
        fs::create_dir_all(&dir)?;
        Some(dir)
    } else {
        None
    };

    let events_path = args.out.join("events.jsonl");
    let mut session = Session {
        tracker,
        writer: EventWriter::create(&events_path)?,
        debug_dir,
        processed: 0,
    };

    match (&args.frames, &args.detections) {
        (Some(dir), _) => run_frames(&args, dir, &mut session)?,
        (None, Some(path)) => run_detections(&args, path, &mut session)?,
        (None, None) => bail!("one of --frames or --detections is required"),
    }

    session.writer.flush()?;
    info!(
        frames = session.processed,
        events = session.writer.written(),
        tracks = session.tracker.total_object_count(),
        "done, events written to {}",
        events_path.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    run(args)
}
