//! Frame differencer: two grayscale frames in, motion bounding boxes out.
//!
//! Pipeline: crop to the region of interest, optional Gaussian blur, absolute
//! difference, binary threshold, morphological open + close, then one box per
//! 8-connected blob. Image work is done with `imageproc` on `image::GrayImage`.

use image::imageops::crop_imm;
use image::{GrayImage, Luma};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, open};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::{Bbox, Error, Result};

/// 8-bit grayscale frame.
pub type GrayFrame = GrayImage;

/// Configuration for the differencer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Pixels whose absolute difference exceeds this value are motion.
    pub threshold: u8,

    /// Boxes with `width * height` below this are dropped.
    pub min_area: i64,

    /// Side of the square morphology kernel; `<= 1` disables open/close.
    pub kernel_size: usize,

    /// Gaussian blur kernel size; `<= 0` disables, even sizes round up.
    pub blur_ksize: i32,

    /// Region of interest as frame ratios.
    pub roi_top: f64,
    pub roi_bottom: f64,
    pub roi_left: f64,
    pub roi_right: f64,
}

impl DiffConfig {
    pub fn new() -> Self {
        Self {
            threshold: 25,
            min_area: 100,
            kernel_size: 3,
            blur_ksize: 0,
            roi_top: 0.14,
            roi_bottom: 0.74,
            roi_left: 0.0,
            roi_right: 1.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("roi_top", self.roi_top),
            ("roi_bottom", self.roi_bottom),
            ("roi_left", self.roi_left),
            ("roi_right", self.roi_right),
        ] {
            if !value.is_finite() {
                return Err(Error::InvalidConfig(format!("{} must be finite, got {}", name, value)));
            }
        }
        Ok(())
    }

    /// Pixel bounds of the region of interest for a `width x height` frame.
    pub fn roi_bounds(&self, width: usize, height: usize) -> Bbox {
        compute_roi_bounds(
            width,
            height,
            self.roi_top,
            self.roi_bottom,
            self.roi_left,
            self.roi_right,
        )
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert ROI ratios to a pixel box, sorted and clamped to the frame.
pub fn compute_roi_bounds(
    width: usize,
    height: usize,
    roi_top: f64,
    roi_bottom: f64,
    roi_left: f64,
    roi_right: f64,
) -> Bbox {
    let w = width as f64;
    let h = height as f64;
    let (mut x1, mut x2) = ((w * roi_left) as i64, (w * roi_right) as i64);
    let (mut y1, mut y2) = ((h * roi_top) as i64, (h * roi_bottom) as i64);
    if x2 < x1 {
        std::mem::swap(&mut x1, &mut x2);
    }
    if y2 < y1 {
        std::mem::swap(&mut y1, &mut y2);
    }
    let clamp_x = |v: i64| v.clamp(0, width as i64) as i32;
    let clamp_y = |v: i64| v.clamp(0, height as i64) as i32;
    Bbox::new(clamp_x(x1), clamp_y(y1), clamp_x(x2), clamp_y(y2))
}

/// Shift a box found inside the ROI back to frame coordinates.
pub fn apply_roi_offset(bbox: Bbox, roi_x1: i32, roi_y1: i32) -> Bbox {
    bbox.offset(roi_x1, roi_y1)
}

/// Gaussian kernels must be odd: `<= 0` disables blurring, even sizes round up.
pub fn normalize_blur_ksize(blur_ksize: i32) -> usize {
    if blur_ksize <= 0 {
        0
    } else if blur_ksize % 2 == 0 {
        (blur_ksize + 1) as usize
    } else {
        blur_ksize as usize
    }
}

/// Load an image file and convert it to luma.
pub fn load_gray_frame<P: AsRef<Path>>(path: P) -> Result<GrayFrame> {
    Ok(image::open(path)?.to_luma8())
}

/// Sigma OpenCV derives for a Gaussian kernel of odd size `ksize`.
fn blur_sigma(ksize: usize) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Find motion boxes between two frames of equal size.
///
/// Boxes are in full-frame coordinates, ordered by the first pixel of each
/// blob in row-major scan order.
pub fn extract_diff_bboxes(prev: &GrayFrame, curr: &GrayFrame, config: &DiffConfig) -> Result<Vec<Bbox>> {
    if prev.dimensions() != curr.dimensions() {
        return Err(Error::InvalidFrame(format!(
            "frame sizes differ: {:?} vs {:?}",
            prev.dimensions(),
            curr.dimensions()
        )));
    }

    let (width, height) = prev.dimensions();
    let roi = config.roi_bounds(width as usize, height as usize);
    if roi.x2 <= roi.x1 || roi.y2 <= roi.y1 {
        return Ok(Vec::new());
    }

    let (x, y) = (roi.x1 as u32, roi.y1 as u32);
    let (w, h) = (roi.width() as u32, roi.height() as u32);
    let mut prev_crop = crop_imm(prev, x, y, w, h).to_image();
    let mut curr_crop = crop_imm(curr, x, y, w, h).to_image();

    let ksize = normalize_blur_ksize(config.blur_ksize);
    if ksize > 1 {
        let sigma = blur_sigma(ksize);
        prev_crop = gaussian_blur_f32(&prev_crop, sigma);
        curr_crop = gaussian_blur_f32(&curr_crop, sigma);
    }

    let diff = GrayImage::from_fn(w, h, |px, py| {
        Luma([prev_crop.get_pixel(px, py)[0].abs_diff(curr_crop.get_pixel(px, py)[0])])
    });
    let mut mask = threshold(&diff, config.threshold, ThresholdType::Binary);

    if config.kernel_size > 1 {
        // Square kernel of side 2 * radius + 1
        let radius = u8::try_from(config.kernel_size / 2).unwrap_or(u8::MAX);
        mask = open(&mask, Norm::LInf, radius);
        mask = close(&mask, Norm::LInf, radius);
    }

    Ok(blob_bboxes(&mask)
        .into_iter()
        .filter(|b| b.area() >= config.min_area)
        .map(|b| apply_roi_offset(b, roi.x1, roi.y1))
        .collect())
}

/// Bounding box of every 8-connected blob of non-zero pixels.
fn blob_bboxes(mask: &GrayImage) -> Vec<Bbox> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let mut slots: HashMap<u32, usize> = HashMap::new();
    let mut boxes: Vec<Bbox> = Vec::new();

    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let (x, y) = (x as i32, y as i32);
        match slots.get(&label) {
            Some(&slot) => {
                let b = &mut boxes[slot];
                b.x1 = b.x1.min(x);
                b.y1 = b.y1.min(y);
                b.x2 = b.x2.max(x + 1);
                b.y2 = b.y2.max(y + 1);
            }
            None => {
                slots.insert(label, boxes.len());
                boxes.push(Bbox::new(x, y, x + 1, y + 1));
            }
        }
    }

    boxes
}
