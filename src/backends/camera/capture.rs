// SPDX-License-Identifier: GPL-3.0-only

//! Still frame acquisition
//!
//! Calibration and snapshots need a single RGB frame. The live view owns the
//! camera node while it streams, so [`GstFrameGrabber`] opens its own short
//! lived pipeline and must only be used while the live view is stopped.
//! [`ImageFileSource`] reads a still image instead of the camera.

use super::types::{CaptureConfig, SourceFormat};
use crate::constants::timing;
use crate::errors::CaptureError;
use gstreamer::prelude::*;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anything that can hand out a single RGB frame
pub trait FrameSource: Send {
    /// Acquire one frame
    fn grab_frame(&mut self) -> Result<RgbImage, CaptureError>;
}

/// Grabs frames from the V4L2 device through a temporary appsink pipeline
#[derive(Debug, Clone)]
pub struct GstFrameGrabber {
    device_path: String,
    source_format: SourceFormat,
    config: CaptureConfig,
    warmup_frames: u32,
    timeout: Duration,
}

impl GstFrameGrabber {
    pub fn new(device_path: &str, source_format: SourceFormat, config: CaptureConfig) -> Self {
        Self {
            device_path: device_path.to_string(),
            source_format,
            config,
            warmup_frames: timing::CALIBRATION_WARMUP_FRAMES,
            timeout: timing::CALIBRATION_SAMPLE_TIMEOUT,
        }
    }

    /// Number of frames dropped while the sensor settles exposure
    pub fn with_warmup_frames(mut self, frames: u32) -> Self {
        self.warmup_frames = frames;
        self
    }

    /// Wait per sample before giving up
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn pipeline_description(&self) -> String {
        let decode = match self.source_format {
            SourceFormat::Raw => "",
            SourceFormat::Mjpeg => "jpegdec ! ",
        };
        format!(
            "v4l2src device=\"{}\" num-buffers={} ! {},width={},height={} ! {}\
             videoconvert ! video/x-raw,format=RGB ! \
             appsink name=sink max-buffers=1 sync=false",
            self.device_path,
            self.warmup_frames + 1,
            self.source_format.media_type(),
            self.config.width,
            self.config.height,
            decode
        )
    }

    fn build(&self) -> Result<(gstreamer::Pipeline, gstreamer_app::AppSink), CaptureError> {
        gstreamer::init().map_err(|e| CaptureError::Pipeline(e.to_string()))?;

        let description = self.pipeline_description();
        debug!(pipeline = %description, "Creating frame capture pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| CaptureError::Pipeline(format!("Failed to create pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| CaptureError::Pipeline("Failed to downcast to Pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CaptureError::Pipeline("Failed to find appsink".into()))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| CaptureError::Pipeline("Failed to downcast to AppSink".into()))?;

        Ok((pipeline, appsink))
    }

    fn pull_frame(&self, appsink: &gstreamer_app::AppSink) -> Result<RgbImage, CaptureError> {
        let timeout = gstreamer::ClockTime::from_mseconds(self.timeout.as_millis() as u64);

        for skipped in 0..self.warmup_frames {
            if appsink.try_pull_sample(timeout).is_none() {
                warn!(skipped, "Camera stopped delivering during warm-up");
                return Err(CaptureError::NoFrame);
            }
        }

        let sample = appsink.try_pull_sample(timeout).ok_or(CaptureError::NoFrame)?;
        rgb_image_from_sample(&sample)
    }
}

impl FrameSource for GstFrameGrabber {
    fn grab_frame(&mut self) -> Result<RgbImage, CaptureError> {
        info!(
            device = %self.device_path,
            resolution = %self.config,
            warmup = self.warmup_frames,
            "Capturing still frame"
        );

        let (pipeline, appsink) = self.build()?;

        pipeline.set_state(gstreamer::State::Playing).map_err(|e| {
            let _ = pipeline.set_state(gstreamer::State::Null);
            CaptureError::Pipeline(format!("Failed to start pipeline: {:?}", e))
        })?;

        let result = self.pull_frame(&appsink);

        // Release the device before the live view reopens it
        let _ = pipeline.set_state(gstreamer::State::Null);
        let _ = pipeline.state(gstreamer::ClockTime::from_seconds(timing::STOP_TIMEOUT_SECS));

        match &result {
            Ok(frame) => debug!(width = frame.width(), height = frame.height(), "Still frame captured"),
            Err(e) => warn!(error = %e, "Still frame capture failed"),
        }
        result
    }
}

/// Copy an RGB sample into a tightly packed image, dropping row padding
fn rgb_image_from_sample(sample: &gstreamer::Sample) -> Result<RgbImage, CaptureError> {
    let caps = sample
        .caps()
        .ok_or_else(|| CaptureError::Pipeline("No caps on sample".into()))?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| CaptureError::Pipeline(format!("Unusable caps: {}", e)))?;

    let buffer = sample.buffer().ok_or(CaptureError::NoFrame)?;
    let map = buffer
        .map_readable()
        .map_err(|_| CaptureError::Pipeline("Failed to map buffer".into()))?;

    let width = info.width() as usize;
    let height = info.height() as usize;
    let stride = info.stride()[0] as usize;
    let row_bytes = width * 3;
    let data = map.as_slice();

    if stride < row_bytes || data.len() < stride * height.saturating_sub(1) + row_bytes {
        return Err(CaptureError::Pipeline(format!(
            "Buffer of {} bytes too small for {}x{} (stride {})",
            data.len(),
            width,
            height,
            stride
        )));
    }

    let mut packed = Vec::with_capacity(row_bytes * height);
    for row in data.chunks(stride).take(height) {
        packed.extend_from_slice(&row[..row_bytes]);
    }

    RgbImage::from_raw(info.width(), info.height(), packed)
        .ok_or_else(|| CaptureError::Pipeline("Frame size mismatch".into()))
}

/// Frame source reading a still image from disk on every grab
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrameSource for ImageFileSource {
    fn grab_frame(&mut self) -> Result<RgbImage, CaptureError> {
        info!(path = %self.path.display(), "Loading still image");
        load_rgb_image(&self.path)
    }
}

/// Decode an image file into RGB
pub fn load_rgb_image(path: &Path) -> Result<RgbImage, CaptureError> {
    let img = image::open(path).map_err(|e| {
        CaptureError::Image(format!("Failed to load image '{}': {}", path.display(), e))
    })?;
    Ok(img.to_rgb8())
}

/// Default directory for snapshots
pub fn default_snapshot_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Timestamped file name, e.g. `IMG_20240101_120000.jpg`
pub fn snapshot_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("IMG_{}.jpg", now.format("%Y%m%d_%H%M%S"))
}

/// Encode `frame` as JPEG at `path`, creating parent directories
pub fn save_jpeg(frame: &RgbImage, path: &Path) -> Result<(), CaptureError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    frame
        .save_with_format(path, image::ImageFormat::Jpeg)
        .map_err(|e| CaptureError::Image(format!("Failed to save '{}': {}", path.display(), e)))?;
    info!(path = %path.display(), "Snapshot saved");
    Ok(())
}

/// Save `frame` under `dir` with a timestamped name and return the path
pub fn save_snapshot(frame: &RgbImage, dir: &Path) -> Result<PathBuf, CaptureError> {
    let path = dir.join(snapshot_file_name(chrono::Local::now()));
    save_jpeg(frame, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pipeline_description_raw() {
        let grabber = GstFrameGrabber::new("/dev/video2", SourceFormat::Raw, CaptureConfig::new(640, 480))
            .with_warmup_frames(2);
        let desc = grabber.pipeline_description();
        assert!(desc.starts_with("v4l2src device=\"/dev/video2\" num-buffers=3"));
        assert!(desc.contains("video/x-raw,width=640,height=480"));
        assert!(!desc.contains("jpegdec"));
    }

    #[test]
    fn test_pipeline_description_mjpeg() {
        let grabber = GstFrameGrabber::new("/dev/video0", SourceFormat::Mjpeg, CaptureConfig::default());
        let desc = grabber.pipeline_description();
        assert!(desc.contains("image/jpeg,width=1280,height=720 ! jpegdec ! videoconvert"));
    }

    #[test]
    fn test_snapshot_file_name() {
        let now = chrono::Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(snapshot_file_name(now), "IMG_20240309_140507.jpg");
    }

    #[test]
    fn test_missing_image_is_error() {
        let mut source = ImageFileSource::new("/nonexistent/frame.jpg");
        assert!(matches!(source.grab_frame(), Err(CaptureError::Image(_))));
    }

    #[test]
    fn test_save_and_reload_snapshot() {
        let dir = std::env::temp_dir().join(format!("mivonix-snapshot-{}", std::process::id()));
        let frame = RgbImage::from_pixel(8, 4, image::Rgb([200, 120, 40]));

        let path = save_snapshot(&frame, &dir).unwrap();
        let loaded = load_rgb_image(&path).unwrap();
        assert_eq!(loaded.dimensions(), (8, 4));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
