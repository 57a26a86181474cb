//! Hand landmark estimation with the MediaPipe hand pipeline.
//!
//! Palms are detected in the whole frame first. Every palm is then turned into a rotated region of
//! interest that contains the whole hand, which is fed to the landmark network.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use crate::{
    image::{Image, Resolution},
    landmark::Hand,
    nn::{Cnn, CnnInputFormat, CnnInputShape, Outputs, Roi},
    timer::Timer,
};

use super::{palm::PalmDetector, HandEstimator};

const LANDMARK_INPUT_RES: Resolution = Resolution::new(224, 224);

/// Options for loading [`MediaPipeHands`].
#[derive(Debug, Clone)]
pub struct HandOptions {
    palm_model: PathBuf,
    landmark_model: PathBuf,
    max_hands: usize,
    min_presence: f32,
}

impl HandOptions {
    pub const DEFAULT_MAX_HANDS: usize = 1;
    pub const DEFAULT_MIN_PRESENCE: f32 = 0.5;

    pub fn new<P: Into<PathBuf>, L: Into<PathBuf>>(palm_model: P, landmark_model: L) -> Self {
        Self {
            palm_model: palm_model.into(),
            landmark_model: landmark_model.into(),
            max_hands: Self::DEFAULT_MAX_HANDS,
            min_presence: Self::DEFAULT_MIN_PRESENCE,
        }
    }

    /// Sets the maximum number of hands to estimate landmarks for.
    ///
    /// Palms are processed by descending detection confidence.
    pub fn max_hands(self, max_hands: usize) -> Self {
        Self { max_hands, ..self }
    }

    /// Sets the minimum presence score a landmark estimation must have to be reported as a hand.
    pub fn min_presence(self, min_presence: f32) -> Self {
        Self {
            min_presence,
            ..self
        }
    }
}

/// Palm detection followed by hand landmark estimation.
pub struct MediaPipeHands {
    palms: PalmDetector,
    landmarker: Cnn,
    max_hands: usize,
    min_presence: f32,
    timers: [Timer; 2],
}

impl MediaPipeHands {
    pub fn load(options: HandOptions) -> anyhow::Result<Self> {
        let palms = PalmDetector::load(&options.palm_model)?;
        let landmarker = load_landmarker(&options.landmark_model).with_context(|| {
            format!(
                "failed to load hand landmark model from '{}'",
                options.landmark_model.display()
            )
        })?;

        Ok(Self {
            palms,
            landmarker,
            max_hands: options.max_hands,
            min_presence: options.min_presence,
            timers: [Timer::new("palms"), Timer::new("landmarks")],
        })
    }
}

fn load_landmarker(path: &Path) -> anyhow::Result<Cnn> {
    let cnn = Cnn::load(
        path,
        LANDMARK_INPUT_RES,
        CnnInputShape::NCHW,
        CnnInputFormat::F32(0.0..=1.0),
    )?;
    if cnn.num_outputs() != 4 {
        bail!(
            "hand landmark network must have 4 outputs, this one has {}",
            cnn.num_outputs()
        );
    }
    Ok(cnn)
}

impl HandEstimator for MediaPipeHands {
    fn detect_hands(&mut self, frame: &Image) -> anyhow::Result<Vec<Hand>> {
        let [t_palms, t_landmarks] = &self.timers;
        let palms = t_palms.time(|| self.palms.detect(frame))?;

        let mut hands = Vec::new();
        for palm in palms.iter().take(self.max_hands) {
            let roi = palm.hand_roi();
            let outputs = t_landmarks.time(|| self.landmarker.estimate(frame, &roi))?;
            if let Some(hand) = decode_landmarks(&outputs, &roi, self.min_presence)? {
                hands.push(hand);
            }
        }

        Ok(hands)
    }

    fn timers(&self) -> &[Timer] {
        &self.timers
    }
}

/// Turns the landmark network's outputs into a [`Hand`] in frame coordinates.
///
/// Returns `Ok(None)` if the presence score is below `min_presence`.
fn decode_landmarks(
    outputs: &Outputs,
    roi: &Roi,
    min_presence: f32,
) -> anyhow::Result<Option<Hand>> {
    // Outputs 2 and 3 (handedness, world coordinates) are unused.
    let screen_landmarks = &outputs[0];
    let presence = &outputs[1];
    let coords = Hand::NUM_LANDMARKS * 3;
    if screen_landmarks.shape() != [1, coords] || presence.shape() != [1, 1] {
        bail!(
            "unexpected hand landmark output shapes {:?} and {:?}",
            screen_landmarks.shape(),
            presence.shape()
        );
    }

    let presence = presence.as_slice()[0];
    if presence.is_nan() || presence < min_presence {
        return Ok(None);
    }

    let (in_w, in_h) = (
        LANDMARK_INPUT_RES.width() as f32,
        LANDMARK_INPUT_RES.height() as f32,
    );
    let positions = screen_landmarks
        .as_slice()
        .chunks_exact(3)
        .map(|c| {
            let (x, y) = roi.to_frame(c[0] / in_w, c[1] / in_h);
            [x, y, c[2]]
        })
        .collect::<Vec<_>>();

    Ok(Hand::from_positions(&positions))
}
