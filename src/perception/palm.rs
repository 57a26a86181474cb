//! Palm detection with the MediaPipe palm detection network.
//!
//! The network is a Single Shot MultiBox Detector (SSD) that regresses one box with 7 keypoints
//! per anchor. Anchor generation here is limited to what that network needs.

use std::{f32::consts::FRAC_PI_2, ops::Index, path::Path};

use anyhow::bail;

use crate::{
    detection::{NonMaxSuppression, Suppressible},
    image::{Image, Rect, Resolution},
    nn::{Cnn, CnnInputFormat, CnnInputShape, Outputs, Roi},
};

/// Number of keypoints regressed per palm.
pub const NUM_KEYPOINTS: usize = 7;

const BOX_PARAMS: usize = 4 + NUM_KEYPOINTS * 2;

const INPUT_RES: Resolution = Resolution::new(192, 192);

const SCORE_CLIPPING_THRESH: f32 = 100.0;

/// Named palm keypoints, in the order the network outputs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalmKeypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

/// An anchor of an SSD network.
#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    // values range from 0 to 1
    x_center: f32,
    y_center: f32,
}

/// Describes an output layer of an SSD network.
pub struct LayerInfo {
    /// Number of anchors per feature map cell. Must be non-zero.
    boxes_per_cell: u32,
    /// Feature map resolution of this layer.
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a new SSD layer description.
    ///
    /// # Parameters
    ///
    /// - `boxes_per_cell`: the number of boxes associated with each cell in this feature map.
    /// - `width`/`height`: size of this layer's feature map, in output cells.
    pub const fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert!(boxes_per_cell != 0);
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

/// The output layers of the palm detection network.
const PALM_LAYERS: &[LayerInfo] = &[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)];

pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    /// Computes the anchors of an SSD with the given output layers.
    ///
    /// All anchors of a cell share the cell's center; the network uses fixed anchor sizes.
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        let mut anchors = Vec::new();

        for layer in layers {
            let height = layer.resolution.height();
            let width = layer.resolution.width();

            for y in 0..height {
                for x in 0..width {
                    let x_center = (x as f32 + 0.5) / width as f32;
                    let y_center = (y as f32 + 0.5) / height as f32;
                    for _ in 0..layer.boxes_per_cell {
                        anchors.push(Anchor { x_center, y_center });
                    }
                }
            }
        }

        Self { anchors }
    }

    /// Returns the total number of SSD anchors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}

/// A palm found by [`PalmDetector`], in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Palm {
    rect: Rect,
    confidence: f32,
    keypoints: [(f32, f32); NUM_KEYPOINTS],
}

impl Palm {
    pub fn keypoint(&self, kp: PalmKeypoint) -> (f32, f32) {
        self.keypoints[kp as usize]
    }

    /// Computes the region of the frame to feed to the hand landmark network.
    ///
    /// The region is rotated so that the fingers point up, shifted towards the fingers and
    /// enlarged to contain the whole hand.
    pub fn hand_roi(&self) -> Roi {
        const SHIFT_Y: f32 = -0.5;
        const SCALE: f32 = 2.6;

        let (x0, y0) = self.keypoint(PalmKeypoint::Wrist);
        let (x1, y1) = self.keypoint(PalmKeypoint::MiddleFingerMcp);
        let rotation = normalize_radians(FRAC_PI_2 - (-(y1 - y0)).atan2(x1 - x0));

        let (w, h) = (self.rect.width(), self.rect.height());
        let (sin, cos) = rotation.sin_cos();
        let x_center = self.rect.x_center() - h * SHIFT_Y * sin;
        let y_center = self.rect.y_center() + h * SHIFT_Y * cos;
        let size = w.max(h) * SCALE;

        Roi::new(x_center, y_center, size, size, rotation)
    }
}

impl Suppressible for Palm {
    fn confidence(&self) -> f32 {
        self.confidence
    }

    fn bounding_rect(&self) -> Rect {
        self.rect
    }
}

/// Normalizes an angle to `-PI..PI`.
fn normalize_radians(angle: f32) -> f32 {
    use std::f32::consts::PI;
    angle - 2.0 * PI * ((angle + PI) / (2.0 * PI)).floor()
}

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

pub struct PalmDetector {
    cnn: Cnn,
    anchors: Anchors,
    nms: NonMaxSuppression,
    min_score: f32,
}

impl PalmDetector {
    pub const DEFAULT_MIN_SCORE: f32 = 0.5;

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let cnn = Cnn::load(
            path,
            INPUT_RES,
            CnnInputShape::NCHW,
            CnnInputFormat::F32(0.0..=1.0),
        )?;
        if cnn.num_outputs() != 2 {
            bail!(
                "palm detection network must have 2 outputs, this one has {}",
                cnn.num_outputs()
            );
        }
        Ok(Self {
            cnn,
            anchors: Anchors::calculate(PALM_LAYERS),
            nms: NonMaxSuppression::new(),
            min_score: Self::DEFAULT_MIN_SCORE,
        })
    }

    /// Detects palms in `image`, by descending confidence.
    pub fn detect(&self, image: &Image) -> anyhow::Result<Vec<Palm>> {
        let roi = Roi::letterbox(image.resolution());
        let outputs = self.cnn.estimate(image, &roi)?;
        let palms = decode(&outputs, &self.anchors, &roi, self.min_score)?;
        Ok(self.nms.process(palms))
    }
}

/// Decodes the raw network outputs into palms, mapping them through `roi` to frame coordinates.
fn decode(
    outputs: &Outputs,
    anchors: &Anchors,
    roi: &Roi,
    min_score: f32,
) -> anyhow::Result<Vec<Palm>> {
    let count = anchors.anchor_count();
    let boxes = &outputs[0];
    let scores = &outputs[1];
    if boxes.shape() != [1, count, BOX_PARAMS] || scores.shape() != [1, count, 1] {
        bail!(
            "unexpected palm detection output shapes {:?} and {:?}",
            boxes.shape(),
            scores.shape()
        );
    }

    let (in_w, in_h) = (INPUT_RES.width() as f32, INPUT_RES.height() as f32);
    let mut palms = Vec::new();
    for (index, (params, &score)) in boxes
        .as_slice()
        .chunks_exact(BOX_PARAMS)
        .zip(scores.as_slice())
        .enumerate()
    {
        let confidence = sigmoid(score.clamp(-SCORE_CLIPPING_THRESH, SCORE_CLIPPING_THRESH));
        if confidence < min_score {
            continue;
        }

        let anchor = anchors[index];
        let x_center = params[0] / in_w + anchor.x_center;
        let y_center = params[1] / in_h + anchor.y_center;
        let width = params[2] / in_w;
        let height = params[3] / in_h;

        let (x, y) = roi.to_frame(x_center, y_center);
        let rect = Rect::from_center(x, y, width * roi.width(), height * roi.height());

        let mut keypoints = [(0.0, 0.0); NUM_KEYPOINTS];
        for (i, kp) in keypoints.iter_mut().enumerate() {
            let kx = params[4 + i * 2] / in_w + anchor.x_center;
            let ky = params[5 + i * 2] / in_h + anchor.y_center;
            *kp = roi.to_frame(kx, ky);
        }

        palms.push(Palm {
            rect,
            confidence,
            keypoints,
        });
    }

    Ok(palms)
}
