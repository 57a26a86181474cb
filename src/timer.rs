//! Performance measurement tools.

use std::{
    fmt, iter, mem,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use itertools::Itertools;

const EMA_ALPHA: f32 = 0.3;

/// A timer that can measure and average the time an operation takes.
///
/// Collected timings are averaged and reset when the timer is displayed using `{}`
/// ([`std::fmt::Display`]).
pub struct Timer {
    name: &'static str,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// Exponential moving average of the recorded times, in seconds.
    avg: Option<f32>,
    /// The number of time measurements that contributed to the current `avg`.
    count: usize,
}

impl State {
    fn record(&mut self, secs: f32) {
        self.avg = Some(match self.avg {
            Some(avg) => avg + EMA_ALPHA * (secs - avg),
            None => secs,
        });
        self.count += 1;
    }
}

impl Timer {
    /// Creates a new timer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State::default()),
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation using a drop guard.
    ///
    /// When the returned [`TimerGuard`] is dropped, the time between the call to `start` and the
    /// drop is measured and recorded.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    /// Returns the number of measurements recorded since the timer was last displayed.
    pub fn count(&self) -> usize {
        self.lock().count
    }

    fn stop(&self, start: Instant) {
        let duration = start.elapsed();
        self.lock().record(duration.as_secs_f32());
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // The state stays consistent even if a panic happened while it was locked.
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// Displays the average recorded time and resets it.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = mem::take(&mut *self.lock());
        let avg_ms = state.avg.unwrap_or(0.0) * 1000.0;
        let len = state.count;

        write!(f, "{}: {len}x{avg_ms:.01}ms", self.name)
    }
}

/// Cloning a timer resets its collected timings.
impl Clone for Timer {
    fn clone(&self) -> Self {
        Self::new(self.name)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer").field("name", &self.name).finish()
    }
}

/// Guard returned by [`Timer::start`]. Stops timing the operation when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop(self.start);
    }
}

/// Counts processed frames and logs the rate once per second.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Counts a frame.
    pub fn tick(&mut self) {
        self.tick_with(iter::empty::<&Timer>());
    }

    /// Counts a frame. When the rate is logged, the `extra` items are appended to the message.
    ///
    /// `extra` is only iterated when a log message is emitted, so passing [`Timer`]s here resets
    /// them once per second.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        self.frames += 1;
        if self.start.elapsed() < Duration::from_secs(1) {
            return;
        }

        let extra = extra.into_iter().join(", ");
        if extra.is_empty() {
            log::debug!("{}: {} FPS", self.name, self.frames);
        } else {
            log::debug!("{}: {} FPS ({extra})", self.name, self.frames);
        }

        self.frames = 0;
        self.start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_resets() {
        let timer = Timer::new("infer");
        timer.time(|| {});
        timer.time(|| {});
        assert_eq!(timer.count(), 2);

        let shown = timer.to_string();
        assert!(shown.starts_with("infer: 2x"), "{shown}");
        assert_eq!(timer.count(), 0);
        assert_eq!(timer.to_string(), "infer: 0x0.0ms");
    }

    #[test]
    fn ema() {
        let mut state = State::default();
        state.record(1.0);
        assert_eq!(state.avg, Some(1.0));
        state.record(2.0);
        assert_eq!(state.avg, Some(1.0 + EMA_ALPHA));
    }

    #[test]
    fn time_returns_value() {
        let timer = Timer::new("t");
        assert_eq!(timer.time(|| 42), 42);
        assert_eq!(timer.clone().count(), 0);
    }

    #[test]
    fn fps_counter_resets_after_a_second() {
        let mut fps = FpsCounter::new("test");
        fps.tick();
        fps.tick();
        assert_eq!(fps.frames, 2);

        fps.start -= Duration::from_secs(2);
        let timer = Timer::new("t");
        timer.time(|| {});
        fps.tick_with([&timer]);
        assert_eq!(fps.frames, 0);
        assert_eq!(timer.count(), 0);
    }
}
