// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 GStreamer pipeline for the live view
//!
//! Element wiring:
//!
//! ```text
//! v4l2src ! capsfilter [! jpegdec] ! videocrop ! videoconvert ! <sink>
//! ```
//!
//! The wiring is created once and kept for the lifetime of the pipeline.
//! Geometry (caps and crop margins) is only changed while the pipeline is
//! not streaming.

use super::types::{CaptureConfig, CropWindow, SourceFormat, TransportState};
use crate::constants::timing;
use crate::errors::PipelineError;
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

/// Primitive operations the pipeline controller needs from a video pipeline
pub trait VideoPipeline: Send {
    /// Apply capture resolution and crop margins.
    ///
    /// Must reject geometry it cannot honor with
    /// [`PipelineError::ConfigRejected`], leaving the previous geometry intact.
    fn apply_geometry(
        &mut self,
        config: &CaptureConfig,
        crop: &CropWindow,
    ) -> Result<(), PipelineError>;

    /// Request a transport state
    fn set_transport(&mut self, state: TransportState) -> Result<(), PipelineError>;
}

/// Settings used to build the live view pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub device_path: String,
    pub source_format: SourceFormat,
    pub sink: String,
}

/// Live view pipeline built from individual GStreamer elements
pub struct GstVideoPipeline {
    pipeline: gstreamer::Pipeline,
    capsfilter: gstreamer::Element,
    crop: gstreamer::Element,
    source_format: SourceFormat,
}

impl GstVideoPipeline {
    /// Create and link the pipeline elements.
    ///
    /// Fails with [`PipelineError::ElementCreation`] when GStreamer or one of
    /// the required plugins is missing.
    pub fn new(settings: &PipelineSettings) -> Result<Self, PipelineError> {
        info!(
            device = %settings.device_path,
            format = ?settings.source_format,
            sink = %settings.sink,
            "Creating video pipeline"
        );

        gstreamer::init().map_err(|e| PipelineError::ElementCreation(e.to_string()))?;

        let pipeline = gstreamer::Pipeline::with_name("video-pipeline");

        let source = make_element("v4l2src", "source")?;
        source.set_property("device", settings.device_path.as_str());
        let capsfilter = make_element("capsfilter", "capsfilter")?;
        let crop = make_element("videocrop", "crop")?;
        let convert = make_element("videoconvert", "convert")?;
        let sink = make_element(&settings.sink, "sink")?;

        let mut chain = vec![source, capsfilter.clone()];
        if settings.source_format == SourceFormat::Mjpeg {
            chain.push(make_element("jpegdec", "jpegdec")?);
        }
        chain.extend([crop.clone(), convert, sink]);

        pipeline.add_many(&chain).map_err(|e| {
            PipelineError::ElementCreation(format!("Failed to add elements: {}", e))
        })?;
        gstreamer::Element::link_many(&chain).map_err(|e| {
            PipelineError::ElementCreation(format!("Failed to link elements: {}", e))
        })?;

        debug!(elements = chain.len(), "Video pipeline linked");

        Ok(Self {
            pipeline,
            capsfilter,
            crop,
            source_format: settings.source_format,
        })
    }
}

fn make_element(factory: &str, name: &str) -> Result<gstreamer::Element, PipelineError> {
    gstreamer::ElementFactory::make(factory)
        .name(name)
        .build()
        .map_err(|e| {
            warn!(factory, error = %e, "Failed to create element");
            PipelineError::ElementCreation(format!("{}: {}", factory, e))
        })
}

/// Convert a pixel count into the `gint` GStreamer properties expect
fn to_gint(value: u32, what: &str) -> Result<i32, PipelineError> {
    i32::try_from(value)
        .map_err(|_| PipelineError::ConfigRejected(format!("{} {} is out of range", what, value)))
}

impl VideoPipeline for GstVideoPipeline {
    fn apply_geometry(
        &mut self,
        config: &CaptureConfig,
        crop: &CropWindow,
    ) -> Result<(), PipelineError> {
        if config.width == 0 || config.height == 0 {
            return Err(PipelineError::ConfigRejected(format!(
                "resolution {} is empty",
                config
            )));
        }
        if !crop.fits(config) {
            return Err(PipelineError::ConfigRejected(format!(
                "crop {:?} leaves no picture at {}",
                crop, config
            )));
        }

        // Validate everything before touching the elements
        let width = to_gint(config.width, "width")?;
        let height = to_gint(config.height, "height")?;
        let left = to_gint(crop.left, "left margin")?;
        let right = to_gint(crop.right, "right margin")?;
        let top = to_gint(crop.top, "top margin")?;
        let bottom = to_gint(crop.bottom, "bottom margin")?;

        let caps = gstreamer::Caps::builder(self.source_format.media_type())
            .field("width", width)
            .field("height", height)
            .build();
        self.capsfilter.set_property("caps", &caps);

        self.crop.set_property("left", left);
        self.crop.set_property("right", right);
        self.crop.set_property("top", top);
        self.crop.set_property("bottom", bottom);

        info!(resolution = %config, ?crop, "Pipeline geometry applied");
        Ok(())
    }

    fn set_transport(&mut self, state: TransportState) -> Result<(), PipelineError> {
        debug!(%state, "Setting pipeline state");
        self.pipeline.set_state(state.into()).map_err(|e| {
            PipelineError::StateChange(format!(
                "{:?} -> {}: {}",
                self.pipeline.current_state(),
                state,
                e
            ))
        })?;

        if state == TransportState::Null {
            // Wait for the device to be released before anything else opens it
            let (result, current, _) = self
                .pipeline
                .state(gstreamer::ClockTime::from_seconds(timing::STOP_TIMEOUT_SECS));
            if let Err(e) = result {
                debug!(error = ?e, state = ?current, "Pipeline stop had issues");
            }
        }

        Ok(())
    }
}

impl Drop for GstVideoPipeline {
    fn drop(&mut self) {
        info!("Dropping video pipeline - releasing device");
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}
