//! Generic `Camera` trait and supporting types for the forward-facing view.

use skyloop_types::SkyError;

/// A raw RGB24 image frame returned by a camera driver.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Row-major RGB24 pixel data, `width * height * 3` bytes.
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// Number of bytes a well-formed RGB24 frame of this size must hold.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// `true` when the buffer length matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }
}

/// A camera rendering the vehicle's forward view.
pub trait Camera: Send + Sync {
    /// Stable identifier for this camera, e.g. `"forward_rgb"`.
    fn id(&self) -> &str;

    /// Render and return a single still frame at `width × height`.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::HardwareFault`] if the frame cannot be captured
    /// (e.g. the render target is unavailable).
    fn capture(&mut self, width: u32, height: u32) -> Result<CameraFrame, SkyError>;
}
