//! The display window.
//!
//! The window shows the latest camera frame with the detection overlay composited on top, and the
//! name of the currently recognized gesture in its title bar. It must run on the main thread; the
//! sampling loop sends it frames through a [`WindowPresenter`].

use std::time::Duration;

use anyhow::anyhow;
use minifb::{Key, Window, WindowOptions};

use crate::{
    gesture::Gesture,
    image::{Image, Resolution},
    sampler::Presenter,
    slot::{slot, Closed, Publisher, Subscriber},
};

const UPDATE_INTERVAL: Duration = Duration::from_micros(16_600);

/// Creates a connected [`WindowPresenter`] and [`Display`].
pub fn display(
    title: impl Into<String>,
    gestures: Subscriber<Gesture>,
) -> (WindowPresenter, Display) {
    let (frames_tx, frames) = slot();
    (
        WindowPresenter { frames: frames_tx },
        Display {
            title: title.into(),
            frames,
            gestures,
        },
    )
}

/// A [`Presenter`] that forwards composited frames to a [`Display`].
pub struct WindowPresenter {
    frames: Publisher<Image>,
}

impl Presenter for WindowPresenter {
    fn present(&mut self, mut frame: Image, overlay: &Image) {
        frame.overlay(overlay);
        self.frames.publish(frame);
    }
}

/// The window showing the camera feed.
pub struct Display {
    title: String,
    frames: Subscriber<Image>,
    gestures: Subscriber<Gesture>,
}

impl Display {
    /// Runs the window until it is closed or the [`WindowPresenter`] is dropped.
    ///
    /// The window opens once the first frame arrives, and is recreated whenever the frame
    /// resolution changes. Pressing Escape closes it.
    pub fn run(self) -> anyhow::Result<()> {
        let mut window: Option<(Window, Resolution)> = None;
        let mut buffer = Vec::new();
        let mut gesture = Gesture::None;

        loop {
            let frame = match &window {
                // Block until the first frame, there's nothing to show before that.
                None => match self.frames.wait() {
                    Ok(frame) => Some(frame),
                    Err(Closed) => return Ok(()),
                },
                Some(_) => match self.frames.take() {
                    Ok(frame) => frame,
                    Err(Closed) => return Ok(()),
                },
            };

            let title_changed = match self.gestures.take() {
                Ok(Some(new)) if new != gesture => {
                    gesture = new;
                    true
                }
                _ => false,
            };

            if let Some(frame) = &frame {
                let res = frame.resolution();
                if window.as_ref().map_or(true, |(_, r)| *r != res) {
                    log::debug!("opening {res} window");
                    window = Some((open_window(&window_title(&self.title, gesture), res)?, res));
                }
                fill_0rgb(frame, &mut buffer);
            }

            let Some((win, res)) = &mut window else {
                continue;
            };
            if !win.is_open() || win.is_key_down(Key::Escape) {
                log::debug!("window closed");
                return Ok(());
            }
            if title_changed {
                win.set_title(&window_title(&self.title, gesture));
            }

            if frame.is_some() {
                win.update_with_buffer(&buffer, res.width() as usize, res.height() as usize)
                    .map_err(|e| anyhow!("failed to update window: {e}"))?;
            } else {
                win.update();
            }
        }
    }
}

fn open_window(title: &str, res: Resolution) -> anyhow::Result<Window> {
    let mut window = Window::new(
        title,
        res.width() as usize,
        res.height() as usize,
        WindowOptions::default(),
    )
    .map_err(|e| anyhow!("failed to open window: {e}"))?;
    window.limit_update_rate(Some(UPDATE_INTERVAL));
    Ok(window)
}

/// Returns the window title showing `gesture`.
///
/// [`Gesture::None`] is not shown.
fn window_title(base: &str, gesture: Gesture) -> String {
    if gesture.is_none() {
        base.to_string()
    } else {
        format!("{base} - {gesture}")
    }
}

/// Converts `image` to the `0RGB` pixel format the window expects.
fn fill_0rgb(image: &Image, buffer: &mut Vec<u32>) {
    buffer.clear();
    buffer.extend(image.pixels().map(|px| px.to_0rgb()));
}
