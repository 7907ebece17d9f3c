//! Viewport capture: render the map surface and encode it as PNG.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use rtumap_core::CapturePayload;

use crate::error::CaptureError;
use crate::surface::{MapSurface, RenderedFrame};

/// Lowest device pixel ratio a capture is rendered at.
pub const MIN_CAPTURE_SCALE: f32 = 2.0;

pub const CAPTURE_FILE_NAME: &str = "map_screenshot.png";
pub const CAPTURE_MIME_TYPE: &str = "image/png";

/// A rendered viewport, already PNG-encoded.
///
/// Only [`CapturePipeline::capture_viewport`] builds these, so every value
/// holds a valid encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    png: Vec<u8>,
}

impl RasterImage {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }
}

/// Renders viewports at a fixed scale of at least [`MIN_CAPTURE_SCALE`].
#[derive(Debug, Clone, Copy)]
pub struct CapturePipeline {
    scale: f32,
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self::new(MIN_CAPTURE_SCALE)
    }
}

impl CapturePipeline {
    /// Scales below the minimum (or non-finite) are raised to it.
    #[must_use]
    pub fn new(scale: f32) -> Self {
        let scale = if scale.is_finite() {
            scale.max(MIN_CAPTURE_SCALE)
        } else {
            MIN_CAPTURE_SCALE
        };
        Self { scale }
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// # Errors
    ///
    /// - [`CaptureError::Detached`] if the surface has been torn down.
    /// - [`CaptureError::Render`] if the surface fails to render.
    /// - [`CaptureError::EmptyFrame`] / [`CaptureError::InconsistentFrame`]
    ///   if the rendered pixels are unusable.
    /// - [`CaptureError::Encode`] if PNG encoding fails.
    pub async fn capture_viewport(
        &self,
        surface: &dyn MapSurface,
    ) -> Result<RasterImage, CaptureError> {
        if !surface.is_attached() {
            return Err(CaptureError::Detached);
        }

        let frame = surface.render_viewport(self.scale).await?;
        validate_frame(&frame)?;
        tracing::debug!(
            width = frame.width,
            height = frame.height,
            scale = self.scale,
            "viewport rendered"
        );

        tokio::task::spawn_blocking(move || encode_png(frame))
            .await
            .map_err(|e| CaptureError::Render {
                reason: format!("encoder task failed: {e}"),
            })?
    }
}

/// Wraps an encoded capture as a multipart-ready payload.
#[must_use]
pub fn to_submittable_payload(image: &RasterImage) -> CapturePayload {
    CapturePayload {
        file_name: CAPTURE_FILE_NAME.to_string(),
        mime_type: CAPTURE_MIME_TYPE.to_string(),
        bytes: image.png.clone(),
    }
}

fn validate_frame(frame: &RenderedFrame) -> Result<(), CaptureError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(CaptureError::EmptyFrame {
            width: frame.width,
            height: frame.height,
        });
    }
    let expected = usize::try_from(u64::from(frame.width) * u64::from(frame.height) * 4)
        .unwrap_or(usize::MAX);
    if frame.rgba.len() != expected {
        return Err(CaptureError::InconsistentFrame {
            width: frame.width,
            height: frame.height,
            expected,
            actual: frame.rgba.len(),
        });
    }
    Ok(())
}

fn encode_png(frame: RenderedFrame) -> Result<RasterImage, CaptureError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        &frame.rgba,
        frame.width,
        frame.height,
        ExtendedColorType::Rgba8,
    )?;
    Ok(RasterImage {
        width: frame.width,
        height: frame.height,
        png,
    })
}
