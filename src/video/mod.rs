//! Camera frame sources.

pub mod webcam;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crate::{
    image::Image,
    slot::{slot, Closed, Publisher, Subscriber},
    timer::{FpsCounter, Timer},
};

use self::webcam::{Webcam, WebcamOptions};

/// Result of polling a [`FrameSource`].
#[derive(Debug)]
pub enum FramePoll {
    /// The source is not initialized yet, or no new frame has arrived since the last poll.
    Pending,
    /// A new frame is available.
    Ready(Image),
    /// The source has stopped and will not produce any more frames.
    Closed,
}

/// A source of camera frames that can be polled without blocking.
pub trait FrameSource: Send {
    fn poll(&mut self) -> FramePoll;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn poll(&mut self) -> FramePoll {
        (**self).poll()
    }
}

/// Reads a [`Webcam`] on a background thread, keeping only the newest frame.
///
/// The webcam is opened on the background thread, so that opening it does not delay startup.
/// Until it is open (or if opening it fails) polling yields [`FramePoll::Pending`], and
/// [`FramePoll::Closed`] respectively. The thread also gives up, closing the source, when
/// [`CaptureThread::MAX_CONSECUTIVE_ERRORS`] reads in a row fail.
pub struct CaptureThread {
    frames: Subscriber<Image>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureThread {
    pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

    pub fn spawn(options: WebcamOptions) -> anyhow::Result<Self> {
        let (publisher, frames) = slot();
        let stop = Arc::new(AtomicBool::new(false));

        let handle = thread::Builder::new().name("capture".into()).spawn({
            let stop = stop.clone();
            move || {
                let mut webcam = match Webcam::open(options) {
                    Ok(webcam) => webcam,
                    Err(e) => {
                        log::error!("failed to open webcam: {e:#}");
                        return;
                    }
                };

                let fps = FpsCounter::new(format!("webcam '{}'", webcam.name()));
                capture(&mut webcam, &publisher, &stop, fps);
                log::trace!("capture thread exiting");
            }
        })?;

        Ok(Self {
            frames,
            stop,
            handle: Some(handle),
        })
    }
}

trait FrameReader {
    fn read(&mut self) -> anyhow::Result<Image>;
    fn timers(&self) -> &[Timer];
}

impl FrameReader for Webcam {
    fn read(&mut self) -> anyhow::Result<Image> {
        Webcam::read(self)
    }

    fn timers(&self) -> &[Timer] {
        Webcam::timers(self)
    }
}

/// Publishes frames from `reader` until `stop` is set or reading keeps failing.
fn capture<R: FrameReader>(
    reader: &mut R,
    publisher: &Publisher<Image>,
    stop: &AtomicBool,
    mut fps: FpsCounter,
) {
    let mut errors = 0;
    while !stop.load(Ordering::Relaxed) {
        match reader.read() {
            Ok(image) => {
                errors = 0;
                publisher.publish(image);
            }
            Err(e) => {
                errors += 1;
                if errors >= CaptureThread::MAX_CONSECUTIVE_ERRORS {
                    log::error!("giving up after {errors} failed reads: {e:#}");
                    return;
                }
                log::warn!("{e:#}");
            }
        }
        fps.tick_with(reader.timers());
    }
}

impl FrameSource for CaptureThread {
    fn poll(&mut self) -> FramePoll {
        match self.frames.take() {
            Ok(Some(image)) => FramePoll::Ready(image),
            Ok(None) => FramePoll::Pending,
            Err(Closed) => FramePoll::Closed,
        }
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            // The thread finishes its current blocking read first.
            if handle.join().is_err() {
                log::error!("capture thread panicked");
            }
        }
    }
}
