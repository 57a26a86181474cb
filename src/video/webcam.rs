//! V4L2 webcam access.
//!
//! Only `VIDEO_CAPTURE` devices that can deliver JFIF JPEG or Motion JPEG frames are supported.

use std::env;

use anyhow::{bail, Context};
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{
    image::{Image, Resolution},
    timer::Timer,
};

/// Environment variable selecting the webcam by name, if [`WebcamOptions::name`] isn't used.
pub const ENV_VAR_WEBCAM_NAME: &str = "GESTURES_WEBCAM_NAME";

/// Which capture parameter to keep when the camera can't deliver both.
///
/// Defaults to [`ParamPreference::Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPreference {
    #[default]
    Resolution,
    Framerate,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct FormatPrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    prefer: ParamPreference,
}

impl FormatPrefs {
    /// Drops the least important remaining constraint. Returns `false` if there was none left.
    ///
    /// The preferred parameter is kept for as long as possible.
    fn relax(&mut self) -> bool {
        match self.prefer {
            ParamPreference::Resolution => {
                self.fps.take().is_some() || self.resolution.take().is_some()
            }
            ParamPreference::Framerate => {
                self.resolution.take().is_some() || self.fps.take().is_some()
            }
        }
    }
}

/// Options for opening a [`Webcam`].
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    prefs: FormatPrefs,
}

impl WebcamOptions {
    /// Only opens the webcam with this device name.
    ///
    /// If no such webcam exists, [`Webcam::open`] fails.
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the minimum desired resolution.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.prefs.resolution = Some(resolution);
        self
    }

    /// Sets the minimum desired frame rate.
    pub fn fps(mut self, fps: u32) -> Self {
        self.prefs.fps = Some(fps);
        self
    }

    pub fn prefer(mut self, prefer: ParamPreference) -> Self {
        self.prefs.prefer = prefer;
        self
    }
}

#[derive(Clone, Copy)]
struct Candidate {
    resolution: Resolution,
    interval: Fract,
}

impl Candidate {
    fn fps(&self) -> u32 {
        (1.0 / self.interval.as_f32()).round() as u32
    }

    fn satisfies(&self, prefs: &FormatPrefs) -> bool {
        let res_ok = prefs.resolution.map_or(true, |res| {
            self.resolution.width() >= res.width() && self.resolution.height() >= res.height()
        });
        let fps_ok = prefs.fps.map_or(true, |fps| self.fps() >= fps);
        res_ok && fps_ok
    }
}

/// Picks the best candidate format, relaxing `prefs` until one qualifies.
fn pick_format(candidates: &[Candidate], mut prefs: FormatPrefs) -> Option<Candidate> {
    loop {
        let best = candidates
            .iter()
            .filter(|c| c.satisfies(&prefs))
            .max_by_key(|c| match prefs.prefer {
                ParamPreference::Resolution => (c.resolution.num_pixels(), u64::from(c.fps())),
                ParamPreference::Framerate => (u64::from(c.fps()), c.resolution.num_pixels()),
            });
        if let Some(best) = best {
            return Some(*best);
        }

        if !prefs.relax() {
            return None;
        }
        log::debug!("no webcam format matches, relaxing to {:?}", prefs);
    }
}

fn list_candidates(device: &Device, pixel_format: Pixelformat) -> anyhow::Result<Vec<Candidate>> {
    let sizes = match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => sizes,
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    };

    let mut candidates = Vec::new();
    for size in sizes {
        let intervals = match device.frame_intervals(pixel_format, size.width(), size.height())? {
            FrameIntervals::Discrete(intervals) => intervals,
            FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                bail!("stepwise or continuous frame rates are not supported")
            }
        };
        for rate in intervals {
            candidates.push(Candidate {
                resolution: Resolution::new(size.width(), size.height()),
                interval: *rate.fract(),
            });
        }
    }
    Ok(candidates)
}

fn negotiate(device: &Device, prefs: FormatPrefs) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if matches!(format.pixelformat(), Pixelformat::JPEG | Pixelformat::MJPG) {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }
    let Some(pixel_format) = pixel_format else {
        bail!("device does not support JPEG output");
    };

    let candidates = list_candidates(device, pixel_format)?;
    let Some(format) = pick_format(&candidates, prefs) else {
        bail!("failed to negotiate a webcam format");
    };
    let res = format.resolution;
    Ok((
        PixFormat::new(res.width(), res.height(), pixel_format),
        format.interval,
    ))
}

/// A webcam yielding decoded frames.
pub struct Webcam {
    name: String,
    stream: ReadStream,
    timers: [Timer; 2],
}

impl Webcam {
    /// Opens the first supported webcam matching `options`.
    ///
    /// This can block for hundreds of milliseconds while the device initializes.
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        let name = options.name.clone().or_else(|| env::var(ENV_VAR_WEBCAM_NAME).ok());
        if let Some(name) = &name {
            log::debug!("looking for webcam '{name}'");
        }

        for dev in linuxvideo::list()? {
            let dev = match dev {
                Ok(dev) => dev,
                Err(e) => {
                    log::warn!("{e}");
                    continue;
                }
            };
            match Self::open_device(dev, name.as_deref(), options.prefs) {
                Ok(Some(webcam)) => return Ok(webcam),
                Ok(None) => {}
                Err(e) => log::debug!("{e:#}"),
            }
        }

        match name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam found"),
        }
    }

    fn open_device(
        dev: Device,
        name: Option<&str>,
        prefs: FormatPrefs,
    ) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if name.map_or(false, |name| caps.card() != name) {
            return Ok(None);
        }

        let path = dev.path()?;
        let flags = caps.device_capabilities();
        log::debug!("device {} ({}): {:?}", caps.card(), path.display(), flags);
        if !flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, interval) = negotiate(&dev, prefs)
            .with_context(|| format!("cannot use webcam '{}'", caps.card()))?;
        let capture = dev.video_capture(pixfmt)?;
        let actual = capture.set_frame_interval(interval)?;
        let format = capture.format();

        log::info!(
            "opened {} ({}), {}x{} @ {:.1}Hz",
            caps.card(),
            path.display(),
            format.width(),
            format.height(),
            1.0 / actual.as_f32(),
        );

        Ok(Some(Self {
            name: caps.card().to_string(),
            stream: capture.into_stream(2)?,
            timers: [Timer::new("dequeue"), Timer::new("decode")],
        }))
    }

    /// Returns the device name of the webcam.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blocks until the next frame arrives and decodes it.
    ///
    /// Webcams occasionally deliver corrupted JPEG data; those frames result in an error, but the
    /// webcam stays usable.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let [t_dequeue, t_decode] = &self.timers;
        let guard = t_dequeue.start();
        let image = self.stream.dequeue(|buf| {
            drop(guard);
            Ok(t_decode.time(|| Image::decode_jpeg(&buf)))
        })?;
        image.context("failed to decode webcam frame")
    }

    /// Returns profiling timers for frame dequeuing and decoding.
    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }
}
