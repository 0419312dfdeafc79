use std::fs::File;
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, GrayImage, ImageEncoder, RgbImage};
use tracing::{debug, info};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

use crate::errors::{AppError, AppResult};

/// Formats we can turn into a grayscale frame, tried in order when the
/// configured one is not offered by the device.
const FALLBACK_PIXEL_FORMATS: [&str; 3] = ["YUYV", "GREY", "Y16"];

const STREAM_BUFFERS: u32 = 4;

/// Anything that yields frames for the pipeline. `Ok(None)` means the
/// source ran out (end of a file-backed stream); a live camera either
/// yields a frame or fails.
pub trait FrameSource {
    fn next_frame(&mut self) -> AppResult<Option<GrayImage>>;
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub device: DeviceLocator,
    pub pixel_format: String,
    pub warmup_frames: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceLocator {
    Index(u32),
    Path(PathBuf),
}

impl DeviceLocator {
    /// Interprets a CLI/config value: a bare integer selects by index,
    /// anything else is a device path. `None` falls back to index 0.
    pub fn from_option(value: Option<String>) -> Self {
        match value {
            Some(raw) => match raw.parse::<u32>() {
                Ok(index) => Self::Index(index),
                Err(_) => Self::Path(PathBuf::from(raw)),
            },
            None => Self::Index(0),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Index(index) => format!("/dev/video{index}"),
            Self::Path(path) => path.display().to_string(),
        }
    }

    pub fn open(&self) -> AppResult<Device> {
        let device = match self {
            Self::Index(index) => Device::new(*index as usize),
            Self::Path(path) => Device::with_path(path),
        };
        device.map_err(|source| AppError::DeviceOpen {
            device: self.display(),
            source,
        })
    }
}

pub struct OpenedDevice {
    pub device: Device,
    pub format: Format,
    pub logs: Vec<String>,
}

/// Opens the device, verifies it can stream video and applies a usable
/// grayscale-convertible pixel format.
pub fn open_video_device(settings: &CaptureSettings) -> AppResult<OpenedDevice> {
    let device = settings.device.open()?;
    ensure_capture_capabilities(&device, &settings.device)?;

    let mut logs = Vec::new();
    let format = negotiate_pixel_format(&device, settings, &mut logs)?;
    info!(
        device = %settings.device.display(),
        format = %fourcc_to_string(format.fourcc),
        width = format.width,
        height = format.height,
        "video device ready"
    );
    logs.push(format!(
        "Using {} at {}x{} ({})",
        settings.device.display(),
        format.width,
        format.height,
        fourcc_to_string(format.fourcc)
    ));

    Ok(OpenedDevice {
        device,
        format,
        logs,
    })
}

fn ensure_capture_capabilities(device: &Device, locator: &DeviceLocator) -> AppResult<()> {
    let caps = device.query_caps().map_err(|source| AppError::DeviceOpen {
        device: locator.display(),
        source,
    })?;

    let mut reasons = Vec::new();
    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        reasons.push("missing VIDEO_CAPTURE capability");
    }
    if !caps.capabilities.intersects(Flags::READ_WRITE | Flags::STREAMING) {
        reasons.push("supports neither read/write nor streaming I/O");
    }
    if reasons.is_empty() {
        Ok(())
    } else {
        Err(AppError::Capability(format!(
            "{} ({})",
            reasons.join("; "),
            caps.card
        )))
    }
}

fn negotiate_pixel_format(
    device: &Device,
    settings: &CaptureSettings,
    logs: &mut Vec<String>,
) -> AppResult<Format> {
    let offered: Vec<FourCC> = device
        .enum_formats()
        .map_err(|source| AppError::DeviceOpen {
            device: settings.device.display(),
            source,
        })?
        .into_iter()
        .map(|description| description.fourcc)
        .collect();

    let requested = settings.pixel_format.as_str();
    let chosen = std::iter::once(requested)
        .chain(
            FALLBACK_PIXEL_FORMATS
                .iter()
                .copied()
                .filter(|fallback| *fallback != requested),
        )
        .find(|candidate| offered.contains(&parse_fourcc(candidate)))
        .ok_or_else(|| {
            AppError::UnsupportedFormat(format!(
                "{requested} not offered by {}; available: {}",
                settings.device.display(),
                offered
                    .iter()
                    .map(|fourcc| fourcc_to_string(*fourcc))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

    if chosen != requested {
        debug!(requested, chosen, "requested pixel format unavailable");
        logs.push(format!(
            "Pixel format {requested} unavailable; falling back to {chosen}"
        ));
    }

    let mut format = device.format().map_err(|source| AppError::DeviceOpen {
        device: settings.device.display(),
        source,
    })?;
    format.fourcc = parse_fourcc(chosen);
    let applied = device
        .set_format(&format)
        .map_err(|source| AppError::Capability(format!("failed to set pixel format {chosen}: {source}")))?;
    if applied.fourcc != parse_fourcc(chosen) {
        return Err(AppError::UnsupportedFormat(format!(
            "device ignored request for {chosen} and kept {}",
            fourcc_to_string(applied.fourcc)
        )));
    }
    Ok(applied)
}

/// Live camera frame source over a memory-mapped capture stream. The stream
/// borrows the opened device, so the device must outlive the source.
pub struct V4lFrameSource<'a> {
    stream: Stream<'a>,
    format: Format,
}

impl<'a> V4lFrameSource<'a> {
    pub fn open(
        device: &'a Device,
        locator: &DeviceLocator,
        format: Format,
        warmup_frames: u32,
    ) -> AppResult<Self> {
        let mut stream = Stream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|source| AppError::DeviceOpen {
                device: locator.display(),
                source,
            })?;

        // Early frames from a cold sensor tend to be black or half-exposed.
        for _ in 0..warmup_frames {
            stream.next().map_err(|source| {
                AppError::FrameProcessing(format!("failed to read warmup frame: {source}"))
            })?;
        }

        Ok(Self { stream, format })
    }
}

impl FrameSource for V4lFrameSource<'_> {
    fn next_frame(&mut self) -> AppResult<Option<GrayImage>> {
        let (data, _meta) = self.stream.next().map_err(|source| {
            AppError::FrameProcessing(format!("failed to read frame: {source}"))
        })?;
        convert_frame_to_image(data, &self.format).map(Some)
    }
}

/// Converts a raw frame buffer to 8-bit grayscale according to its pixel
/// format. YUYV keeps the luma bytes, GREY passes through and Y16 takes the
/// high byte of each little-endian sample.
pub fn convert_frame_to_image(data: &[u8], format: &Format) -> AppResult<GrayImage> {
    let width = format.width;
    let height = format.height;
    let pixel_count = (width as usize) * (height as usize);

    let pixels = match fourcc_to_string(format.fourcc).as_str() {
        "YUYV" => {
            ensure_frame_len(data.len(), pixel_count * 2)?;
            let mut luma = Vec::with_capacity(pixel_count);
            for chunk in data.chunks_exact(4) {
                luma.push(chunk[0]);
                luma.push(chunk[2]);
            }
            luma
        }
        "GREY" | "Y8" | "Y08" => {
            ensure_frame_len(data.len(), pixel_count)?;
            data[..pixel_count].to_vec()
        }
        "Y16" => {
            ensure_frame_len(data.len(), pixel_count * 2)?;
            data.chunks_exact(2).map(|sample| sample[1]).collect()
        }
        other => {
            return Err(AppError::UnsupportedFormat(format!(
                "cannot convert {other} frames to grayscale"
            )))
        }
    };

    GrayImage::from_raw(width, height, pixels).ok_or_else(|| {
        AppError::FrameProcessing(format!(
            "frame buffer does not match {width}x{height}"
        ))
    })
}

fn ensure_frame_len(actual: usize, expected: usize) -> AppResult<()> {
    if actual < expected {
        return Err(AppError::FrameProcessing(format!(
            "frame buffer too small: {actual} bytes, expected {expected}"
        )));
    }
    Ok(())
}

/// Expands a grayscale frame to RGB for the face models.
pub fn to_rgb(frame: &GrayImage) -> RgbImage {
    DynamicImage::ImageLuma8(frame.clone()).to_rgb8()
}

/// Writes a frame as an 8-bit grayscale PNG.
pub fn write_frame(image: &GrayImage, path: &Path) -> AppResult<()> {
    let file = File::create(path)?;
    PngEncoder::new(file)
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::L8)
        .map_err(|err| AppError::FrameProcessing(format!("failed to encode PNG: {err}")))
}

pub fn parse_fourcc(pixel_format: &str) -> FourCC {
    let mut repr = [b' '; 4];
    for (i, byte) in pixel_format.bytes().take(4).enumerate() {
        repr[i] = byte;
    }
    FourCC::new(&repr)
}

pub fn fourcc_to_string(fourcc: FourCC) -> String {
    String::from_utf8_lossy(&fourcc.repr)
        .trim_end_matches(['\0', ' '])
        .to_string()
}

/// Scripted frame source for tests: pops programmed results and reports end
/// of stream once the script runs out.
#[cfg(test)]
pub(crate) struct ScriptedFrames {
    frames: std::collections::VecDeque<AppResult<Option<GrayImage>>>,
}

#[cfg(test)]
impl ScriptedFrames {
    pub(crate) fn new() -> Self {
        Self {
            frames: std::collections::VecDeque::new(),
        }
    }

    pub(crate) fn blank_frames(count: usize) -> Self {
        let mut source = Self::new();
        for _ in 0..count {
            source.push_frame();
        }
        source
    }

    pub(crate) fn push_frame(&mut self) {
        self.frames.push_back(Ok(Some(GrayImage::new(4, 4))));
    }

    pub(crate) fn push_error(&mut self, err: AppError) {
        self.frames.push_back(Err(err));
    }
}

#[cfg(test)]
impl FrameSource for ScriptedFrames {
    fn next_frame(&mut self) -> AppResult<Option<GrayImage>> {
        self.frames.pop_front().unwrap_or(Ok(None))
    }
}
