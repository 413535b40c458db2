//! Inline `data:` URLs for uploaded image files.
//!
//! Uploaded files never leave the process: their bytes are embedded in the cell value as a
//! base64 `data:` URL and decoded again at load time.

use std::path::Path;

use anyhow::Context as _;
use base64::Engine as _;

use crate::foundation::error::{CoverError, CoverResult};

const DATA_PREFIX: &str = "data:";
const BASE64_SUFFIX: &str = ";base64";

/// Read an image file from disk and encode it as a `data:image/...;base64,` URL.
///
/// Returns the URL and the file name component of `path`.
pub fn encode_file(path: &Path) -> CoverResult<(String, Option<String>)> {
    let bytes = std::fs::read(path).with_context(|| format!("read upload '{}'", path.display()))?;
    let url = encode_image_bytes(&bytes)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    Ok((url, file_name))
}

/// Encode raw image bytes, sniffing the mime type from the content.
pub fn encode_image_bytes(bytes: &[u8]) -> CoverResult<String> {
    let format = image::guess_format(bytes)
        .map_err(|e| CoverError::validation(format!("upload is not a supported image: {e}")))?;
    let mime = format.to_mime_type();
    Ok(encode(mime, bytes))
}

pub fn encode(mime: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("{DATA_PREFIX}{mime}{BASE64_SUFFIX},{payload}")
}

pub fn is_data_url(value: &str) -> bool {
    value.starts_with(DATA_PREFIX)
}

/// `true` for the inline values accepted as cell sources.
pub fn is_image_data_url(value: &str) -> bool {
    value.starts_with("data:image/")
}

/// Decode a base64 `data:` URL into its mime type and bytes.
pub fn decode(value: &str) -> CoverResult<(String, Vec<u8>)> {
    let rest = value
        .strip_prefix(DATA_PREFIX)
        .ok_or_else(|| CoverError::decode("not a data url"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| CoverError::decode("data url has no payload separator"))?;
    let mime = header
        .strip_suffix(BASE64_SUFFIX)
        .ok_or_else(|| CoverError::decode("only base64 data urls are supported"))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| CoverError::decode(format!("invalid base64 in data url: {e}")))?;
    Ok((mime.to_string(), bytes))
}
