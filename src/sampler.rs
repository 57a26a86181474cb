//! The sampling loop.
//!
//! A [`SamplingLoop`] periodically polls a [`FrameSource`] and, whenever a new frame is ready, runs
//! both perception models on it, renders the results onto an overlay, classifies the gesture of the
//! first hand, and hands everything to a [`Presenter`].
//!
//! Ticks are delivered by a periodic channel with room for a single pending tick. A tick that
//! comes due while the previous one is still being processed is dropped, so processing never
//! overlaps and never builds up a backlog.

use std::{
    panic::resume_unwind,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{self, select, Receiver, Sender};

use crate::{
    gesture::{self, Gesture},
    image::Image,
    perception::Perception,
    render::{self, Canvas},
    slot::Publisher,
    timer::FpsCounter,
    video::{FramePoll, FrameSource},
};

/// Options for the [`SamplingLoop`].
#[derive(Debug, Clone)]
pub struct LoopOptions {
    period: Duration,
}

impl LoopOptions {
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(10);

    pub fn new() -> Self {
        Self {
            period: Self::DEFAULT_PERIOD,
        }
    }

    /// Sets the interval at which the frame source is polled.
    pub fn period(self, period: Duration) -> Self {
        Self { period }
    }
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives the camera frame and the rendered overlay after every processed tick.
pub trait Presenter: Send {
    fn present(&mut self, frame: Image, overlay: &Image);
}

/// Outcome of a single [`SamplingLoop::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// No frame was ready, nothing was done.
    NotReady,
    /// A frame was processed and the resulting gesture published.
    Processed(Gesture),
    /// The frame source has closed.
    Closed,
}

/// Creates a connected [`CancelHandle`] and [`CancelToken`].
pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (sender, recv) = channel::bounded(1);
    (CancelHandle { sender }, CancelToken { recv })
}

/// Stops a running [`SamplingLoop`]. Dropping the handle stops the loop too.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Sender<()>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.try_send(()).ok();
    }
}

/// Observed by [`SamplingLoop::run`] to know when to stop.
#[derive(Debug)]
pub struct CancelToken {
    recv: Receiver<()>,
}

pub struct SamplingLoop<S: FrameSource, P: Presenter> {
    source: S,
    perception: Perception,
    presenter: P,
    gestures: Publisher<Gesture>,
    overlay: Image,
    period: Duration,
    fps: FpsCounter,
}

impl<S: FrameSource, P: Presenter> SamplingLoop<S, P> {
    /// Creates a sampling loop.
    ///
    /// The models in `perception` must already be loaded. Recognized gestures are published to
    /// `gestures`.
    pub fn new(
        source: S,
        perception: Perception,
        presenter: P,
        gestures: Publisher<Gesture>,
        options: LoopOptions,
    ) -> Self {
        Self {
            source,
            perception,
            presenter,
            gestures,
            overlay: Image::new(0, 0),
            period: options.period,
            fps: FpsCounter::new("sampling loop"),
        }
    }

    /// Performs a single tick.
    ///
    /// Errors from the perception models are returned as-is. In that case nothing is drawn,
    /// published or presented, and the loop can continue with the next tick.
    pub fn tick(&mut self) -> anyhow::Result<Tick> {
        let frame = match self.source.poll() {
            FramePoll::Pending => return Ok(Tick::NotReady),
            FramePoll::Closed => return Ok(Tick::Closed),
            FramePoll::Ready(frame) => frame,
        };

        self.overlay.resize(frame.width(), frame.height());
        let objects = self.perception.detect_objects(&frame)?;
        let hands = self.perception.detect_hands(&frame)?;
        render::render(&mut self.overlay, &objects, &hands);

        let gesture = gesture::classify_hands(&hands);
        if !gesture.is_none() {
            log::trace!("gesture: {gesture}");
        }
        self.gestures.publish(gesture);
        self.presenter.present(frame, &self.overlay);

        self.fps.tick_with(self.perception.timers());
        Ok(Tick::Processed(gesture))
    }

    /// Runs the loop until `cancel` is triggered or the frame source closes.
    ///
    /// A tick that fails is logged and skipped.
    pub fn run(&mut self, cancel: &CancelToken) {
        log::debug!("sampling every {:?}", self.period);
        let ticker = channel::tick(self.period);
        loop {
            select! {
                recv(ticker) -> _ => {}
                recv(cancel.recv) -> _ => {
                    log::debug!("sampling loop cancelled");
                    return;
                }
            }

            match self.tick() {
                Ok(Tick::Closed) => {
                    log::info!("frame source closed, stopping");
                    return;
                }
                Ok(Tick::NotReady | Tick::Processed(_)) => {}
                Err(e) => log::error!("skipping frame: {e:#}"),
            }
        }
    }
}

impl<S, P> SamplingLoop<S, P>
where
    S: FrameSource + 'static,
    P: Presenter + 'static,
{
    /// Runs the loop on a new thread.
    pub fn spawn(mut self) -> anyhow::Result<LoopHandle> {
        let (cancel, token) = cancellation();
        let handle = thread::Builder::new()
            .name("sampling loop".into())
            .spawn(move || self.run(&token))?;
        Ok(LoopHandle {
            cancel,
            handle: Some(handle),
        })
    }
}

/// Handle to a [`SamplingLoop`] running on its own thread.
///
/// Dropping the handle stops the loop and waits for it to exit.
pub struct LoopHandle {
    cancel: CancelHandle,
    handle: Option<JoinHandle<()>>,
}

impl LoopHandle {
    /// Returns whether the loop has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stops the loop and waits for it to exit.
    pub fn stop(mut self) {
        self.join();
    }

    fn join(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(payload) = handle.join() {
                if !thread::panicking() {
                    resume_unwind(payload);
                }
            }
        }
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests;
