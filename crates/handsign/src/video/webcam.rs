//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::{cmp::Reverse, io};

use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{
    error::CameraError,
    image::{Image, Resolution},
    timer::Timer,
    video::FrameSource,
};

/// Indicates whether to prefer a higher resolution or frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPreference {
    /// Prefer increased resolution over higher frame rates.
    #[default]
    Resolution,
    /// Prefer higher frame rate over higher image resolution.
    Framerate,
}

#[derive(Debug, Default, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Format negotiation options.
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Sets the name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the desired image resolution.
    ///
    /// A lower resolution might be selected if the webcam cannot deliver it.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Selects which of resolution and frame rate to keep when the camera can't deliver both.
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

fn negotiate_format(
    device: &Device,
    prefs: FramePrefs,
) -> Result<(PixFormat, Fract), CameraError> {
    let stream_err = |source: io::Error| CameraError::Stream { source };

    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format.map_err(stream_err)?;
        if format.pixelformat() == Pixelformat::JPEG || format.pixelformat() == Pixelformat::MJPG {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        return Err(CameraError::unavailable("no supported pixel format found"));
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format).map_err(stream_err)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals = match device
                    .frame_intervals(pixel_format, size.width(), size.height())
                    .map_err(stream_err)?
                {
                    FrameIntervals::Discrete(intervals) => intervals,
                    FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                        return Err(CameraError::unavailable(
                            "stepwise or continuous frame rates are not supported",
                        ));
                    }
                };
                for rate in intervals {
                    formats.push(FrameFormat {
                        resolution: Resolution::new(size.width(), size.height()),
                        frame_interval: *rate.fract(),
                    });
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            return Err(CameraError::unavailable(
                "stepwise or continuous resolutions are not supported",
            ));
        }
    }

    let fmt = negotiate_with_fallback(&formats, prefs)
        .ok_or_else(|| CameraError::unavailable("failed to negotiate a webcam format"))?;
    Ok((
        PixFormat::new(
            fmt.resolution.width(),
            fmt.resolution.height(),
            pixel_format,
        ),
        fmt.frame_interval,
    ))
}

/// Picks a format, dropping the less preferred constraint (then the other one) if nothing matches.
fn negotiate_with_fallback(formats: &[FrameFormat], mut prefs: FramePrefs) -> Option<FrameFormat> {
    loop {
        if let Some(fmt) = negotiate_format_step(formats, prefs) {
            return Some(fmt);
        }

        log::debug!("failed to negotiate format with prefs {:?}", prefs);
        let relaxed = match prefs.pref {
            ParamPreference::Resolution => {
                prefs.fps.take().is_some() || prefs.resolution.take().is_some()
            }
            ParamPreference::Framerate => {
                prefs.resolution.take().is_some() || prefs.fps.take().is_some()
            }
        };
        if !relaxed {
            return None;
        }
        log::debug!("retrying with new prefs {:?}", prefs);
    }
}

fn negotiate_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut formats = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs.fps.map_or(true, |fps| {
                (1.0 / fmt.frame_interval.as_f32()).round() >= fps as f32
            })
        })
        .copied()
        .collect::<Vec<_>>();
    match prefs.pref {
        ParamPreference::Resolution => {
            formats.sort_by_key(|fmt| (fmt.resolution.num_pixels(), Reverse(fmt.frame_interval)))
        }
        ParamPreference::Framerate => {
            formats.sort_by_key(|fmt| (Reverse(fmt.frame_interval), fmt.resolution.num_pixels()))
        }
    }
    formats.last().copied()
}

/// A webcam yielding a stream of [`Image`]s.
///
/// The capture stream is stopped and the device closed when the [`Webcam`] is dropped.
pub struct Webcam {
    stream: ReadStream,
    resolution: Resolution,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam found.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    ///
    /// If no device could be opened and at least one failed because of missing permissions,
    /// [`CameraError::PermissionDenied`] is returned. Otherwise the error is
    /// [`CameraError::DeviceUnavailable`].
    pub fn open(options: WebcamOptions) -> Result<Self, CameraError> {
        if let Some(name) = &options.name {
            log::debug!("looking for webcam '{}'", name);
        }

        let devices = linuxvideo::list().map_err(classify_open_error)?;
        let mut denied = None;
        for res in devices {
            let result = res.and_then(|dev| Self::open_impl(dev, &options).map_err(into_io));
            match result {
                Ok(Some(webcam)) => return Ok(webcam),
                Ok(None) => {}
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    log::warn!("{}", e);
                    denied = Some(e);
                }
                Err(e) => {
                    log::debug!("{}", e);
                }
            }
        }

        match denied {
            Some(source) => Err(CameraError::PermissionDenied { source }),
            None => Err(CameraError::unavailable("no supported webcam device found")),
        }
    }

    fn open_impl(dev: Device, options: &WebcamOptions) -> Result<Option<Self>, CameraError> {
        let stream_err = |source: io::Error| CameraError::Stream { source };

        let caps = dev.capabilities().map_err(stream_err)?;
        if let Some(name) = &options.name {
            if caps.card() != name.as_str() {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path().map_err(stream_err)?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, fract) = negotiate_format(&dev, options.frame)?;

        let capture = dev.video_capture(pixfmt).map_err(stream_err)?;
        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());
        let actual = capture.set_frame_interval(fract).map_err(stream_err)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream(2).map_err(stream_err)?;

        Ok(Some(Self {
            stream,
            resolution,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Returns the negotiated frame resolution.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Reads the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is. Corrupted frames are
    /// logged and replaced with a blank image.
    pub fn read(&mut self) -> Result<Image, CameraError> {
        let resolution = self.resolution;
        let t_decode = &self.t_decode;
        let stream = &mut self.stream;
        self.t_dequeue
            .time(|| {
                stream.dequeue(|buf| {
                    let image = match t_decode.time(|| Image::decode_jpeg(&buf)) {
                        Ok(image) => image,
                        Err(e) => {
                            // Even good webcams occasionally produce corrupted MJPG frames.
                            log::error!("webcam decode error: {}", e);
                            Image::new(resolution.width(), resolution.height())
                        }
                    };
                    Ok(image)
                })
            })
            .map_err(|source| CameraError::Stream { source })
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        log::debug!("releasing webcam ({})", self.resolution);
    }
}

impl FrameSource for Webcam {
    fn read_frame(&mut self) -> Result<Image, CameraError> {
        self.read()
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}

fn classify_open_error(source: io::Error) -> CameraError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        CameraError::PermissionDenied { source }
    } else {
        CameraError::Stream { source }
    }
}

fn into_io(err: CameraError) -> io::Error {
    match err {
        CameraError::PermissionDenied { source } | CameraError::Stream { source } => source,
        CameraError::DeviceUnavailable { reason } => io::Error::new(io::ErrorKind::NotFound, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(width: u32, height: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(width, height),
            frame_interval: Fract::new(1, fps),
        }
    }

    fn formats() -> Vec<FrameFormat> {
        vec![
            format(640, 480, 30),
            format(640, 480, 60),
            format(1280, 720, 30),
            format(1920, 1080, 15),
        ]
    }

    #[test]
    fn prefers_resolution() {
        let prefs = FramePrefs::default();
        assert_eq!(negotiate_format_step(&formats(), prefs), Some(format(1920, 1080, 15)));
    }

    #[test]
    fn prefers_framerate() {
        let prefs = FramePrefs {
            pref: ParamPreference::Framerate,
            ..Default::default()
        };
        assert_eq!(negotiate_format_step(&formats(), prefs), Some(format(640, 480, 60)));
    }

    #[test]
    fn fps_constraint() {
        let prefs = FramePrefs {
            fps: Some(30),
            ..Default::default()
        };
        assert_eq!(negotiate_format_step(&formats(), prefs), Some(format(1280, 720, 30)));
    }

    #[test]
    fn fallback_drops_fps_first() {
        let prefs = FramePrefs {
            resolution: Some(Resolution::new(1920, 1080)),
            fps: Some(60),
            pref: ParamPreference::Resolution,
        };
        assert_eq!(negotiate_format_step(&formats(), prefs), None);
        assert_eq!(
            negotiate_with_fallback(&formats(), prefs),
            Some(format(1920, 1080, 15))
        );
    }

    #[test]
    fn fallback_drops_resolution_first() {
        let prefs = FramePrefs {
            resolution: Some(Resolution::new(1920, 1080)),
            fps: Some(60),
            pref: ParamPreference::Framerate,
        };
        assert_eq!(
            negotiate_with_fallback(&formats(), prefs),
            Some(format(640, 480, 60))
        );
    }

    #[test]
    fn nothing_to_negotiate() {
        assert_eq!(negotiate_with_fallback(&[], FramePrefs::default()), None);
    }
}
