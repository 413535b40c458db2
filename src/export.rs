use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use image::RgbaImage;

use crate::foundation::{
    core::{ContentType, GridSize},
    error::{CoverError, CoverResult},
};

pub fn encode_png(raster: &RgbaImage) -> CoverResult<Vec<u8>> {
    let mut buf = Vec::new();
    raster
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| CoverError::export(format!("png encode failed: {e}")))?;
    Ok(buf)
}

/// `spotify-cover-{type}-{size}-{resolution}px-{epochMillis}.png`
pub fn download_filename(
    content_type: ContentType,
    grid: GridSize,
    resolution: u32,
    epoch_millis: i64,
) -> String {
    format!("spotify-cover-{content_type}-{grid}-{resolution}px-{epoch_millis}.png")
}

/// Encode `raster` and write it as `dir/file_name`, creating `dir` if needed.
pub fn write_png(dir: &Path, file_name: &str, raster: &RgbaImage) -> CoverResult<PathBuf> {
    let png = encode_png(raster)?;
    std::fs::create_dir_all(dir)
        .map_err(|e| CoverError::export(format!("create '{}': {e}", dir.display())))?;
    let path = dir.join(file_name);
    std::fs::write(&path, &png)
        .map_err(|e| CoverError::export(format!("write '{}': {e}", path.display())))?;
    Ok(path)
}

/// Image-typed clipboard payload: straight RGBA pixels, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipboardImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl ClipboardImage {
    pub fn from_raster(raster: &RgbaImage) -> Self {
        Self {
            width: raster.width(),
            height: raster.height(),
            rgba: raster.as_raw().clone(),
        }
    }

    /// Encode as a PNG blob, for sinks that take image files rather than pixels.
    pub fn to_png(&self) -> CoverResult<Vec<u8>> {
        let raster = RgbaImage::from_raw(self.width, self.height, self.rgba.clone())
            .ok_or_else(|| CoverError::export("clipboard pixels do not match their size"))?;
        encode_png(&raster)
    }
}

/// Destination for copied images.
pub trait ClipboardSink {
    fn set_image(&mut self, image: &ClipboardImage) -> CoverResult<()>;
}

/// The platform clipboard.
#[cfg(feature = "clipboard")]
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

#[cfg(feature = "clipboard")]
impl SystemClipboard {
    pub fn new() -> CoverResult<Self> {
        let inner = arboard::Clipboard::new()
            .map_err(|e| CoverError::export(format!("clipboard unavailable: {e}")))?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "clipboard")]
impl ClipboardSink for SystemClipboard {
    fn set_image(&mut self, image: &ClipboardImage) -> CoverResult<()> {
        let data = arboard::ImageData {
            width: image.width as usize,
            height: image.height as usize,
            bytes: std::borrow::Cow::Borrowed(&image.rgba),
        };
        self.inner
            .set_image(data)
            .map_err(|e| CoverError::export(format!("clipboard write failed: {e}")))
    }
}
