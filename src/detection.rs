//! Object detection results and non-maximum suppression.

use crate::image::Rect;

/// An object found in a frame by an object detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedObject {
    label: String,
    bounding_box: Rect,
    confidence: f32,
}

impl DetectedObject {
    pub fn new(label: impl Into<String>, bounding_box: Rect, confidence: f32) -> Self {
        Self {
            label: label.into(),
            bounding_box,
            confidence,
        }
    }

    /// Returns the name of the object class.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the axis-aligned bounding box, in frame pixel coordinates.
    #[inline]
    pub fn bounding_box(&self) -> Rect {
        self.bounding_box
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Types that have a confidence score and a bounding rectangle, and can thus be filtered with
/// [`NonMaxSuppression`].
pub trait Suppressible {
    fn confidence(&self) -> f32;
    fn bounding_rect(&self) -> Rect;
}

impl Suppressible for DetectedObject {
    fn confidence(&self) -> f32 {
        self.confidence
    }

    fn bounding_rect(&self) -> Rect {
        self.bounding_box
    }
}

/// Non-maximum suppression.
///
/// Detectors typically produce several overlapping detections per object. This removes every
/// detection that overlaps a detection with higher confidence by at least the IOU threshold.
#[derive(Debug, Clone)]
pub struct NonMaxSuppression {
    iou_thresh: f32,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
        }
    }

    /// Filters `detections`, returning the survivors by descending confidence.
    pub fn process<T: Suppressible>(&self, mut detections: Vec<T>) -> Vec<T> {
        // Sort by ascending confidence, process highest confidence first by starting at the back.
        detections.sort_unstable_by(|a, b| a.confidence().total_cmp(&b.confidence()));

        let mut out = Vec::new();
        while let Some(seed) = detections.pop() {
            let seed_rect = seed.bounding_rect();
            detections.retain(|other| seed_rect.iou(&other.bounding_rect()) < self.iou_thresh);
            out.push(seed);
        }
        out
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}
