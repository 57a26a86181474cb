//! Webcam object detection and static hand gesture recognition.
//!
//! Frames from a webcam are run through an object detection network and a hand landmark pipeline.
//! Detected objects and hand landmarks are drawn onto an overlay, and the first hand's landmarks
//! are classified into one of a handful of static [gestures](gesture::Gesture).
//!
//! # Coordinates
//!
//! All 2D coordinates are in frame pixels, with X pointing right and Y pointing *down*. The Z
//! coordinate of hand landmarks is the network's relative depth, passed through unchanged.
//!
//! # Environment Variables
//!
//! * `GESTURES_WEBCAM_NAME`: Selects the webcam device to use when none is configured explicitly.
//!   If unset, the first device that supports a compatible image format is used.
//! * `RUST_LOG`: Overrides the default log filter (see [`env_logger`]).

use log::LevelFilter;

pub mod detection;
pub mod gesture;
pub mod gui;
pub mod image;
pub mod landmark;
pub mod nn;
pub mod perception;
pub mod render;
pub mod sampler;
pub mod slot;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library log at *debug* level unless `RUST_LOG` says otherwise.
///
/// If a global logger is already registered, this macro does nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
