//! Still-image loading.

use crate::error::{ErrorKind, Result};
use binscan_capture::Frame;
use exn::{OptionExt, ResultExt};

/// Decode an encoded image (PNG or JPEG, depending on enabled features) into
/// a greyscale [`Frame`].
///
/// # Errors
/// [`InvalidImage`](ErrorKind::InvalidImage) if the bytes aren't an image in
/// a supported format.
pub fn load_frame(bytes: &[u8]) -> Result<Frame> {
    if bytes.is_empty() {
        exn::bail!(ErrorKind::InvalidImage);
    }
    let image = image::load_from_memory(bytes).or_raise(|| ErrorKind::InvalidImage)?;
    let luma = image.to_luma8();
    let (width, height) = luma.dimensions();
    tracing::debug!(width, height, bytes = bytes.len(), "Loaded still image");
    Frame::new(width, height, luma.into_raw()).ok_or_raise(|| ErrorKind::InvalidImage)
}
