use std::{path::PathBuf, time::Duration};

use clap::Parser;

use gesturecam::{
    gui,
    image::Resolution,
    perception::{
        hands::{HandOptions, MediaPipeHands},
        objects::{SsdObjectDetector, SsdOptions},
        Perception,
    },
    sampler::{LoopOptions, SamplingLoop},
    slot::slot,
    video::{webcam::WebcamOptions, CaptureThread},
};

/// Shows the webcam feed with detected objects, hand landmarks and the recognized hand gesture.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ONNX object detection model (COCO SSD)
    #[arg(long)]
    object_model: PathBuf,

    /// ONNX palm detection model
    #[arg(long)]
    palm_model: PathBuf,

    /// ONNX hand landmark model
    #[arg(long)]
    landmark_model: PathBuf,

    /// Name of the webcam to open (overrides `GESTURES_WEBCAM_NAME`)
    #[arg(long)]
    camera: Option<String>,

    /// Minimum camera image width
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Minimum camera image height
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Minimum camera frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Interval at which new camera frames are processed, in milliseconds
    #[arg(long, default_value_t = 10)]
    period_ms: u64,

    /// Minimum confidence of reported objects
    #[arg(long, default_value_t = SsdOptions::DEFAULT_SCORE_THRESHOLD)]
    score_threshold: f32,

    /// Maximum number of hands to track
    #[arg(long, default_value_t = HandOptions::DEFAULT_MAX_HANDS)]
    max_hands: usize,
}

impl Args {
    fn webcam_options(&self) -> WebcamOptions {
        let mut options = WebcamOptions::default();
        if let Some(name) = &self.camera {
            options = options.name(name);
        }
        if let (Some(w), Some(h)) = (self.width, self.height) {
            options = options.resolution(Resolution::new(w, h));
        }
        if let Some(fps) = self.fps {
            options = options.fps(fps);
        }
        options
    }
}

fn main() -> anyhow::Result<()> {
    gesturecam::init_logger!();
    let args = Args::parse();

    let objects = SsdObjectDetector::load(
        SsdOptions::new(&args.object_model).score_threshold(args.score_threshold),
    )?;
    let hands = MediaPipeHands::load(
        HandOptions::new(&args.palm_model, &args.landmark_model).max_hands(args.max_hands),
    )?;
    log::info!("models loaded");

    let camera = CaptureThread::spawn(args.webcam_options())?;
    let (gestures_tx, gestures) = slot();
    let (presenter, display) = gui::display("gesturecam", gestures);

    let sampler = SamplingLoop::new(
        camera,
        Perception::new(objects, hands),
        presenter,
        gestures_tx,
        LoopOptions::new().period(Duration::from_millis(args.period_ms)),
    )
    .spawn()?;

    display.run()?;
    sampler.stop();
    Ok(())
}
