//! Object detection with a COCO-trained SSD.
//!
//! The network is expected to be a TensorFlow Object Detection API export converted to ONNX, which
//! takes a `u8` NHWC image and already performs box decoding and non-maximum suppression. Its four
//! outputs are, in order:
//!
//! - `detection_boxes`: `[1, N, 4]`, normalized `ymin, xmin, ymax, xmax`
//! - `detection_classes`: `[1, N]`, COCO class ids
//! - `detection_scores`: `[1, N]`
//! - `num_detections`: `[1]`, number of valid entries in the other outputs

use std::path::PathBuf;

use anyhow::bail;
use itertools::Itertools;

use crate::{
    detection::DetectedObject,
    image::{Image, Rect, Resolution},
    nn::{Cnn, CnnInputFormat, CnnInputShape, Outputs, Roi},
    timer::Timer,
};

use super::ObjectDetector;

/// Options for loading a [`SsdObjectDetector`].
#[derive(Debug, Clone)]
pub struct SsdOptions {
    model: PathBuf,
    input_res: Resolution,
    score_threshold: f32,
    max_detections: usize,
}

impl SsdOptions {
    pub const DEFAULT_INPUT_RES: Resolution = Resolution::new(300, 300);
    pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;
    pub const DEFAULT_MAX_DETECTIONS: usize = 20;

    pub fn new<P: Into<PathBuf>>(model: P) -> Self {
        Self {
            model: model.into(),
            input_res: Self::DEFAULT_INPUT_RES,
            score_threshold: Self::DEFAULT_SCORE_THRESHOLD,
            max_detections: Self::DEFAULT_MAX_DETECTIONS,
        }
    }

    /// Sets the input resolution the network is fixed to.
    pub fn input_res(self, input_res: Resolution) -> Self {
        Self { input_res, ..self }
    }

    /// Sets the minimum score of reported detections.
    pub fn score_threshold(self, score_threshold: f32) -> Self {
        Self {
            score_threshold,
            ..self
        }
    }

    pub fn max_detections(self, max_detections: usize) -> Self {
        Self {
            max_detections,
            ..self
        }
    }
}

pub struct SsdObjectDetector {
    cnn: Cnn,
    score_threshold: f32,
    max_detections: usize,
    timers: [Timer; 1],
}

impl SsdObjectDetector {
    pub fn load(options: SsdOptions) -> anyhow::Result<Self> {
        let cnn = Cnn::load(
            &options.model,
            options.input_res,
            CnnInputShape::NHWC,
            CnnInputFormat::U8,
        )?;
        if cnn.num_outputs() != 4 {
            bail!(
                "object detection network must have 4 outputs, this one has {}",
                cnn.num_outputs()
            );
        }

        Ok(Self {
            cnn,
            score_threshold: options.score_threshold,
            max_detections: options.max_detections,
            timers: [Timer::new("objects")],
        })
    }
}

impl ObjectDetector for SsdObjectDetector {
    fn detect_objects(&mut self, frame: &Image) -> anyhow::Result<Vec<DetectedObject>> {
        let res = frame.resolution();
        let outputs = self.timers[0].time(|| self.cnn.estimate(frame, &Roi::stretch(res)))?;
        decode(&outputs, res, self.score_threshold, self.max_detections)
    }

    fn timers(&self) -> &[Timer] {
        &self.timers
    }
}

fn decode(
    outputs: &Outputs,
    res: Resolution,
    score_threshold: f32,
    max_detections: usize,
) -> anyhow::Result<Vec<DetectedObject>> {
    let boxes = &outputs[0];
    let classes = &outputs[1];
    let scores = &outputs[2];
    let num = &outputs[3];

    let n = match *boxes.shape() {
        [1, n, 4] => n,
        _ => bail!("unexpected `detection_boxes` shape {:?}", boxes.shape()),
    };
    if classes.shape() != [1, n] || scores.shape() != [1, n] || num.shape() != [1] {
        bail!(
            "unexpected object detection output shapes {:?}, {:?} and {:?}",
            classes.shape(),
            scores.shape(),
            num.shape()
        );
    }

    let valid = (num.as_slice()[0].max(0.0) as usize).min(n);
    let (w, h) = (res.width() as f32, res.height() as f32);

    let objects = boxes
        .as_slice()
        .chunks_exact(4)
        .zip(classes.as_slice())
        .zip(scores.as_slice())
        .take(valid)
        .filter(|&(_, &score)| score >= score_threshold)
        .filter_map(|((bbox, &class), &score)| {
            let Some(label) = coco_label(class as u32) else {
                log::trace!("ignoring detection with unknown class id {class}");
                return None;
            };
            let rect = Rect::from_corners(bbox[1], bbox[0], bbox[3], bbox[2]).scale_axes(w, h);
            Some(DetectedObject::new(label, rect, score))
        })
        .sorted_by(|a, b| b.confidence().total_cmp(&a.confidence()))
        .take(max_detections)
        .collect();
    Ok(objects)
}

/// Maps a COCO class id, as used by the TensorFlow Object Detection API, to its display name.
pub fn coco_label(id: u32) -> Option<&'static str> {
    Some(match id {
        1 => "person",
        2 => "bicycle",
        3 => "car",
        4 => "motorcycle",
        5 => "airplane",
        6 => "bus",
        7 => "train",
        8 => "truck",
        9 => "boat",
        10 => "traffic light",
        11 => "fire hydrant",
        13 => "stop sign",
        14 => "parking meter",
        15 => "bench",
        16 => "bird",
        17 => "cat",
        18 => "dog",
        19 => "horse",
        20 => "sheep",
        21 => "cow",
        22 => "elephant",
        23 => "bear",
        24 => "zebra",
        25 => "giraffe",
        27 => "backpack",
        28 => "umbrella",
        31 => "handbag",
        32 => "tie",
        33 => "suitcase",
        34 => "frisbee",
        35 => "skis",
        36 => "snowboard",
        37 => "sports ball",
        38 => "kite",
        39 => "baseball bat",
        40 => "baseball glove",
        41 => "skateboard",
        42 => "surfboard",
        43 => "tennis racket",
        44 => "bottle",
        46 => "wine glass",
        47 => "cup",
        48 => "fork",
        49 => "knife",
        50 => "spoon",
        51 => "bowl",
        52 => "banana",
        53 => "apple",
        54 => "sandwich",
        55 => "orange",
        56 => "broccoli",
        57 => "carrot",
        58 => "hot dog",
        59 => "pizza",
        60 => "donut",
        61 => "cake",
        62 => "chair",
        63 => "couch",
        64 => "potted plant",
        65 => "bed",
        67 => "dining table",
        70 => "toilet",
        72 => "tv",
        73 => "laptop",
        74 => "mouse",
        75 => "remote",
        76 => "keyboard",
        77 => "cell phone",
        78 => "microwave",
        79 => "oven",
        80 => "toaster",
        81 => "sink",
        82 => "refrigerator",
        84 => "book",
        85 => "clock",
        86 => "vase",
        87 => "scissors",
        88 => "teddy bear",
        89 => "hair drier",
        90 => "toothbrush",
        _ => return None,
    })
}
