use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::bail;

use super::*;
use crate::{
    detection::DetectedObject,
    image::{Color, Rect},
    landmark::{Hand, Landmark, LandmarkIdx},
    perception::{HandEstimator, ObjectDetector},
    slot::{slot, Subscriber},
};

struct Frames(VecDeque<FramePoll>);

impl FrameSource for Frames {
    fn poll(&mut self) -> FramePoll {
        self.0.pop_front().unwrap_or(FramePoll::Closed)
    }
}

#[derive(Clone, Default)]
struct Calls(Arc<AtomicUsize>);

impl Calls {
    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeObjects {
    calls: Calls,
    fail: bool,
}

impl ObjectDetector for FakeObjects {
    fn detect_objects(&mut self, _: &Image) -> anyhow::Result<Vec<DetectedObject>> {
        self.calls.bump();
        if self.fail {
            bail!("object model failed");
        }
        Ok(vec![DetectedObject::new(
            "cup",
            Rect::from_top_left(2.0, 2.0, 10.0, 10.0),
            0.9,
        )])
    }
}

struct FakeHands {
    calls: Calls,
    hands: Vec<Hand>,
}

impl HandEstimator for FakeHands {
    fn detect_hands(&mut self, _: &Image) -> anyhow::Result<Vec<Hand>> {
        self.calls.bump();
        Ok(self.hands.clone())
    }
}

#[derive(Clone, Default)]
struct Presented(Arc<Mutex<Vec<(Image, Image)>>>);

impl Presenter for Presented {
    fn present(&mut self, frame: Image, overlay: &Image) {
        self.0.lock().unwrap().push((frame, overlay.clone()));
    }
}

fn peace_hand() -> Hand {
    let mut landmarks = [Landmark::new([20.0, 20.0, 0.0]); Hand::NUM_LANDMARKS];
    landmarks[LandmarkIdx::ThumbTip as usize] = Landmark::new([20.0, 30.0, 0.0]);
    landmarks[LandmarkIdx::IndexFingerTip as usize] = Landmark::new([20.0, 20.0, 0.0]);
    landmarks[LandmarkIdx::MiddleFingerTip as usize] = Landmark::new([20.0, 20.0, 0.5]);
    landmarks[LandmarkIdx::RingFingerTip as usize] = Landmark::new([20.0, 20.0, 0.9]);
    landmarks[LandmarkIdx::PinkyTip as usize] = Landmark::new([20.0, 20.0, 0.8]);
    Hand::new(landmarks)
}

struct Harness {
    sampler: SamplingLoop<Frames, Presented>,
    object_calls: Calls,
    hand_calls: Calls,
    presented: Presented,
    gestures: Subscriber<Gesture>,
}

fn harness(frames: Vec<FramePoll>, fail_objects: bool, hands: Vec<Hand>) -> Harness {
    let object_calls = Calls::default();
    let hand_calls = Calls::default();
    let presented = Presented::default();
    let (publisher, gestures) = slot();

    let perception = Perception::new(
        FakeObjects {
            calls: object_calls.clone(),
            fail: fail_objects,
        },
        FakeHands {
            calls: hand_calls.clone(),
            hands,
        },
    );
    let sampler = SamplingLoop::new(
        Frames(frames.into()),
        perception,
        presented.clone(),
        publisher,
        LoopOptions::new().period(Duration::from_millis(1)),
    );

    Harness {
        sampler,
        object_calls,
        hand_calls,
        presented,
        gestures,
    }
}

fn frame() -> FramePoll {
    FramePoll::Ready(Image::new(64, 48))
}

#[test]
fn not_ready_is_a_noop() {
    let mut h = harness(vec![FramePoll::Pending], false, vec![peace_hand()]);
    assert_eq!(h.sampler.tick().unwrap(), Tick::NotReady);
    assert_eq!(h.object_calls.get(), 0);
    assert_eq!(h.hand_calls.get(), 0);
    assert!(h.presented.0.lock().unwrap().is_empty());
    assert_eq!(h.gestures.take(), Ok(None));
}

#[test]
fn processes_ready_frame() {
    let mut h = harness(vec![frame()], false, vec![peace_hand()]);
    assert_eq!(h.sampler.tick().unwrap(), Tick::Processed(Gesture::Peace));
    assert_eq!(h.object_calls.get(), 1);
    assert_eq!(h.hand_calls.get(), 1);
    assert_eq!(h.gestures.take(), Ok(Some(Gesture::Peace)));

    let presented = h.presented.0.lock().unwrap();
    assert_eq!(presented.len(), 1);
    let (frame, overlay) = &presented[0];
    assert_eq!(overlay.resolution(), frame.resolution());
    // Landmark dot at (20, 20).
    assert_ne!(overlay.get(20, 20), Color::NULL);
    assert_eq!(overlay.get(60, 45), Color::NULL);
}

#[test]
fn no_hands_publishes_none() {
    let mut h = harness(vec![frame()], false, Vec::new());
    assert_eq!(h.sampler.tick().unwrap(), Tick::Processed(Gesture::None));
    assert_eq!(h.gestures.take(), Ok(Some(Gesture::None)));
}

#[test]
fn failing_detector_skips_tick() {
    let mut h = harness(vec![frame(), FramePoll::Pending], true, vec![peace_hand()]);
    assert!(h.sampler.tick().is_err());
    assert_eq!(h.object_calls.get(), 1);
    assert_eq!(h.hand_calls.get(), 0);
    assert_eq!(h.gestures.take(), Ok(None));
    assert!(h.presented.0.lock().unwrap().is_empty());
    assert!(h.sampler.overlay.pixels().all(|px| px == Color::NULL));

    // The next tick runs normally.
    assert_eq!(h.sampler.tick().unwrap(), Tick::NotReady);
}

#[test]
fn overlay_follows_frame_size() {
    let mut h = harness(vec![frame(), FramePoll::Ready(Image::new(32, 32))], false, Vec::new());
    h.sampler.tick().unwrap();
    h.sampler.tick().unwrap();

    let presented = h.presented.0.lock().unwrap();
    let (_, overlay) = &presented[1];
    assert_eq!((overlay.width(), overlay.height()), (32, 32));
    // top edge of the object box
    assert_ne!(overlay.get(7, 2), Color::NULL);
    assert_eq!(overlay.get(20, 20), Color::NULL);
}

#[test]
fn run_stops_when_source_closes() {
    let mut h = harness(
        vec![FramePoll::Pending, frame(), FramePoll::Pending, frame()],
        false,
        vec![peace_hand()],
    );
    let (_cancel, token) = cancellation();
    h.sampler.run(&token);
    assert_eq!(h.object_calls.get(), 2);
    assert_eq!(h.presented.0.lock().unwrap().len(), 2);
}

#[test]
fn run_continues_after_errors() {
    let mut h = harness(vec![frame(), frame(), frame()], true, Vec::new());
    let (_cancel, token) = cancellation();
    h.sampler.run(&token);
    assert_eq!(h.object_calls.get(), 3);
    assert!(h.presented.0.lock().unwrap().is_empty());
}

#[test]
fn run_can_be_cancelled() {
    let frames = (0..1000).map(|_| FramePoll::Pending).collect();
    let h = harness(frames, false, Vec::new());
    let handle = h.sampler.spawn().unwrap();
    handle.stop();
    assert_eq!(h.object_calls.get(), 0);
}

#[test]
fn dropped_cancel_handle_stops_run() {
    let frames = (0..1000).map(|_| FramePoll::Pending).collect();
    let mut h = harness(frames, false, Vec::new());
    let (cancel, token) = cancellation();
    drop(cancel);
    h.sampler.run(&token);
}

/// Always has a new frame.
struct Endless;

impl FrameSource for Endless {
    fn poll(&mut self) -> FramePoll {
        FramePoll::Ready(Image::new(8, 8))
    }
}

/// Has a single frame, and records when it is polled.
#[derive(Clone, Default)]
struct OneShot(Arc<Mutex<Vec<Instant>>>);

impl FrameSource for OneShot {
    fn poll(&mut self) -> FramePoll {
        let mut polls = self.0.lock().unwrap();
        polls.push(Instant::now());
        if polls.len() == 1 {
            FramePoll::Ready(Image::new(8, 8))
        } else {
            FramePoll::Pending
        }
    }
}

struct SlowObjects {
    calls: Calls,
    delay: Duration,
}

impl ObjectDetector for SlowObjects {
    fn detect_objects(&mut self, _: &Image) -> anyhow::Result<Vec<DetectedObject>> {
        self.calls.bump();
        thread::sleep(self.delay);
        Ok(Vec::new())
    }
}

fn slow_perception(calls: &Calls) -> Perception {
    Perception::new(
        SlowObjects {
            calls: calls.clone(),
            delay: Duration::from_millis(50),
        },
        FakeHands {
            calls: Calls::default(),
            hands: Vec::new(),
        },
    )
}

#[test]
fn slow_detector_is_called_once_per_delay() {
    let calls = Calls::default();
    let (publisher, _gestures) = slot();

    let start = Instant::now();
    let handle = SamplingLoop::new(
        Endless,
        slow_perception(&calls),
        Presented::default(),
        publisher,
        LoopOptions::new().period(Duration::from_millis(10)),
    )
    .spawn()
    .unwrap();
    thread::sleep(Duration::from_millis(500));
    handle.stop();
    let elapsed = start.elapsed().as_millis() as usize;

    let calls = calls.get();
    assert!(calls >= 3, "only {calls} calls in {elapsed} ms");
    assert!(calls <= elapsed / 50 + 2, "{calls} calls in {elapsed} ms");
}

#[test]
fn missed_ticks_are_dropped() {
    let source = OneShot::default();
    let (publisher, _gestures) = slot();
    let handle = SamplingLoop::new(
        source.clone(),
        slow_perception(&Calls::default()),
        Presented::default(),
        publisher,
        LoopOptions::new().period(Duration::from_millis(10)),
    )
    .spawn()
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while source.0.lock().unwrap().len() < 3 {
        assert!(Instant::now() < deadline, "sampling loop stalled");
        thread::sleep(Duration::from_millis(1));
    }
    handle.stop();

    // The 50 ms detection misses four ticks. Only one of them is delivered right away, the
    // next poll waits for a full period.
    let polls = source.0.lock().unwrap();
    let gap = polls[2] - polls[1];
    assert!(gap >= Duration::from_millis(5), "polled again after {gap:?}");
}
