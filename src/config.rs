use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context as _;

use crate::{
    foundation::core::GridSize,
    foundation::error::{CoverError, CoverResult},
};

/// Endpoint of the public image resolution service.
pub const DEFAULT_SERVICE_URL: &str =
    "https://zxrmbmuklh.execute-api.ap-northeast-1.amazonaws.com/getimage";

/// Arithmetic sequence of selectable output resolutions.
///
/// The upper bound depends on the grid size: `floor(640 * n / 100) * 100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResolutionPolicy {
    pub min: u32,
    pub step: u32,
}

impl ResolutionPolicy {
    /// Stepped carousel wizard: 500, 1000, ...
    pub const CAROUSEL: Self = Self {
        min: 500,
        step: 500,
    };

    /// Single-page form: 300, 400, ...
    pub const FORM: Self = Self { min: 300, step: 100 };

    pub fn max_for(grid: GridSize) -> u32 {
        (640 * u32::from(grid.get()) / 100) * 100
    }

    /// Valid resolutions for `grid`, ascending.
    ///
    /// `max_for(grid)` is only part of the domain when the stepping lands on it exactly.
    pub fn domain(&self, grid: GridSize) -> Vec<u32> {
        let max = Self::max_for(grid);
        let mut out = Vec::new();
        if self.step == 0 {
            return out;
        }
        let mut r = self.min;
        while r <= max {
            out.push(r);
            r = match r.checked_add(self.step) {
                Some(next) => next,
                None => break,
            };
        }
        out
    }

    pub fn contains(&self, grid: GridSize, resolution: u32) -> bool {
        resolution >= self.min
            && resolution <= Self::max_for(grid)
            && self.step != 0
            && (resolution - self.min).is_multiple_of(self.step)
    }

    pub fn validate(&self) -> CoverResult<()> {
        if self.min == 0 || self.step == 0 {
            return Err(CoverError::validation(
                "resolution min and step must be > 0",
            ));
        }
        let largest = u32::from(GridSize::MAX);
        if self.min < largest {
            return Err(CoverError::validation(format!(
                "resolution min {} leaves cells without pixels on a {largest}x{largest} grid",
                self.min
            )));
        }
        let smallest = GridSize::all()
            .next()
            .ok_or_else(|| CoverError::validation("no grid sizes available"))?;
        if self.domain(smallest).is_empty() {
            return Err(CoverError::validation(format!(
                "resolution min {} exceeds the {}px limit of a {smallest}x{smallest} grid",
                self.min,
                Self::max_for(smallest)
            )));
        }
        Ok(())
    }
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self::CAROUSEL
    }
}

/// How a source image is placed into its cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawPolicy {
    /// Uniform scale so the image covers the cell, centered, overflow cropped.
    #[default]
    Cover,
    /// Independent x/y scale to exactly fill the cell.
    Stretch,
}

/// Resampling filter used when scaling a source image into a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResampleFilter> for image::imageops::FilterType {
    fn from(f: ResampleFilter) -> Self {
        match f {
            ResampleFilter::Nearest => Self::Nearest,
            ResampleFilter::Triangle => Self::Triangle,
            ResampleFilter::CatmullRom => Self::CatmullRom,
            ResampleFilter::Lanczos3 => Self::Lanczos3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    pub service_url: String,
    pub resolution: ResolutionPolicy,
    pub draw: DrawPolicy,
    pub filter: ResampleFilter,
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            resolution: ResolutionPolicy::default(),
            draw: DrawPolicy::default(),
            filter: ResampleFilter::default(),
            request_timeout_ms: 30_000,
            user_agent: concat!("covergrid/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl CoverConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_path(path: &Path) -> CoverResult<Self> {
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CoverResult<()> {
        self.resolution.validate()?;
        url::Url::parse(&self.service_url).map_err(|e| {
            CoverError::validation(format!("invalid service_url '{}': {e}", self.service_url))
        })?;
        if self.request_timeout_ms == 0 {
            return Err(CoverError::validation("request_timeout_ms must be > 0"));
        }
        Ok(())
    }
}
