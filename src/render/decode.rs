use anyhow::Context;

use crate::foundation::error::{CoverError, CoverResult};

/// Decode encoded image bytes (format sniffed from content) into straight-alpha RGBA8.
pub fn decode_image(bytes: &[u8]) -> CoverResult<image::RgbaImage> {
    let format = image::guess_format(bytes)
        .map_err(|e| CoverError::decode(format!("unrecognized image data: {e}")))?;
    let dyn_img = image::load_from_memory_with_format(bytes, format)
        .with_context(|| format!("decode {format:?} image from memory"))
        .map_err(|e| CoverError::decode(format!("{e:#}")))?;
    let rgba = dyn_img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(CoverError::decode("image has zero width or height"));
    }
    Ok(rgba)
}
