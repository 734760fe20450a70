//! Frame containers handed from sources to detectors.
//!
//! - `RawFrame`: owned pixel buffer plus the source-reported frame index.
//! - `InferenceView`: read-only view detectors receive for one call.
//!
//! Frames live for exactly one orchestrator step. Nothing in the engine keeps a
//! frame (or anything derived from one) past the step that produced it.

use anyhow::{anyhow, Result};

/// Bytes per pixel of every frame buffer (packed RGB).
pub const CHANNELS: usize = 3;

/// Byte length of a packed RGB buffer, or an error if it overflows `usize`.
fn buffer_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(CHANNELS))
        .ok_or_else(|| anyhow!("frame size {}x{} is too large", width, height))
}

// ----------------------------------------------------------------------------
// RawFrame: one decoded frame
// ----------------------------------------------------------------------------

/// Decoded frame. Pixel data is packed RGB, row-major.
pub struct RawFrame {
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Position reported by the source. Monotonic, but may skip values.
    pub frame_index: u64,
}

impl RawFrame {
    /// Wrap decoded pixels. Fails when the buffer does not match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, frame_index: u64) -> Result<Self> {
        let expected = buffer_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame {}: expected {} bytes for {}x{}, got {}",
                frame_index,
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            frame_index,
        })
    }

    /// Black frame of the given size.
    pub fn blank(frame_index: u64, width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            data: vec![0u8; buffer_len(width, height)?],
            width,
            height,
            frame_index,
        })
    }

    /// Detectors get a read-only view for the duration of one call.
    pub fn inference_view(&self) -> InferenceView<'_> {
        InferenceView { frame: self }
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Copy into an `image` buffer for annotation rendering.
    #[cfg(feature = "render-jpeg")]
    pub fn to_rgb_image(&self) -> Result<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame {}: buffer size mismatch", self.frame_index))
    }
}

// ----------------------------------------------------------------------------
// InferenceView: what detectors see
// ----------------------------------------------------------------------------

/// Read-only view of a frame for inference.
pub struct InferenceView<'a> {
    frame: &'a RawFrame,
}

impl<'a> InferenceView<'a> {
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn frame_index(&self) -> u64 {
        self.frame.frame_index
    }

    pub fn pixels(&self) -> &'a [u8] {
        &self.frame.data
    }
}
