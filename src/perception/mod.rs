//! Perception adapter.
//!
//! Object detection and hand landmark estimation are performed by independently loaded pretrained
//! networks. Both are hidden behind a trait ([`ObjectDetector`] and [`HandEstimator`]), and the
//! [`Perception`] type bundles one implementation of each, so that the rest of the crate does not
//! depend on which networks are in use.
//!
//! Failures of the underlying networks are propagated to the caller unchanged. There is no retry
//! logic here.

pub mod hands;
pub mod objects;
pub mod palm;

use crate::detection::DetectedObject;
use crate::image::Image;
use crate::landmark::Hand;
use crate::timer::Timer;

/// Detects objects in camera frames.
pub trait ObjectDetector: Send {
    /// Returns the objects found in `frame`, with bounding boxes in frame pixel coordinates.
    fn detect_objects(&mut self, frame: &Image) -> anyhow::Result<Vec<DetectedObject>>;

    /// Returns profiling timers, for inclusion in FPS logs.
    fn timers(&self) -> &[Timer] {
        &[]
    }
}

/// Estimates hand landmarks in camera frames.
pub trait HandEstimator: Send {
    /// Returns the hands found in `frame`.
    ///
    /// Landmark X/Y coordinates are in frame pixel coordinates.
    fn detect_hands(&mut self, frame: &Image) -> anyhow::Result<Vec<Hand>>;

    /// Returns profiling timers, for inclusion in FPS logs.
    fn timers(&self) -> &[Timer] {
        &[]
    }
}

impl<T: ObjectDetector + ?Sized> ObjectDetector for Box<T> {
    fn detect_objects(&mut self, frame: &Image) -> anyhow::Result<Vec<DetectedObject>> {
        (**self).detect_objects(frame)
    }

    fn timers(&self) -> &[Timer] {
        (**self).timers()
    }
}

impl<T: HandEstimator + ?Sized> HandEstimator for Box<T> {
    fn detect_hands(&mut self, frame: &Image) -> anyhow::Result<Vec<Hand>> {
        (**self).detect_hands(frame)
    }

    fn timers(&self) -> &[Timer] {
        (**self).timers()
    }
}

/// The pair of perception models used for every frame.
///
/// The models are loaded once, before being passed to [`Perception::new`], and reused for every
/// frame afterwards.
pub struct Perception {
    objects: Box<dyn ObjectDetector>,
    hands: Box<dyn HandEstimator>,
}

impl Perception {
    pub fn new<O, H>(objects: O, hands: H) -> Self
    where
        O: ObjectDetector + 'static,
        H: HandEstimator + 'static,
    {
        Self {
            objects: Box::new(objects),
            hands: Box::new(hands),
        }
    }

    /// Runs the object detection network on `frame`.
    pub fn detect_objects(&mut self, frame: &Image) -> anyhow::Result<Vec<DetectedObject>> {
        let objects = self.objects.detect_objects(frame)?;
        log::trace!("objects: {:?}", objects);
        Ok(objects)
    }

    /// Runs the hand landmark pipeline on `frame`.
    pub fn detect_hands(&mut self, frame: &Image) -> anyhow::Result<Vec<Hand>> {
        let hands = self.hands.detect_hands(frame)?;
        log::trace!("hands: {:?}", hands);
        Ok(hands)
    }

    /// Returns the profiling timers of both models.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        self.objects.timers().iter().chain(self.hands.timers())
    }
}
