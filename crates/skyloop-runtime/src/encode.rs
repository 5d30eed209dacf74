//! Frame → JPEG → base64, the transport form of a captured view.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use skyloop_hal::CameraFrame;

use crate::perception_loop::PerceptionError;

/// Compress an RGB24 frame to JPEG at `quality` (clamped to `1..=100`).
///
/// # Errors
///
/// [`PerceptionError::BadFrame`] if the buffer does not match the declared
/// size, [`PerceptionError::Encode`] if the encoder rejects it.
pub fn encode_jpeg(frame: &CameraFrame, quality: u8) -> Result<Vec<u8>, PerceptionError> {
    if !frame.is_well_formed() {
        return Err(PerceptionError::BadFrame(format!(
            "{}x{} frame carries {} bytes, expected {}",
            frame.width,
            frame.height,
            frame.data.len(),
            frame.expected_len()
        )));
    }
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100));
    encoder.encode(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)?;
    Ok(jpeg)
}

/// JPEG-compress `frame` and return it base64-encoded (standard alphabet,
/// padded).
pub fn encode_frame(frame: &CameraFrame, quality: u8) -> Result<String, PerceptionError> {
    Ok(STANDARD.encode(encode_jpeg(frame, quality)?))
}
