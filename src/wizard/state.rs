use std::path::Path;

use crate::{
    config::ResolutionPolicy,
    foundation::core::{CellIndex, ContentType, GridSize},
    foundation::error::CoverResult,
    source,
    wizard::steps::{FieldError, Step},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Remote share link, resolved by the image service.
    #[default]
    Url,
    /// Uploaded file embedded as a `data:` URL.
    File,
}

/// Where one cell's pixels come from.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub value: String,
    #[serde(
        rename = "fileName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub file_name: Option<String>,
}

impl ImageSource {
    /// Empty URL-type entry; the initial value of every cell.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn url(value: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Url,
            value: value.into().trim().to_string(),
            file_name: None,
        }
    }

    /// Read an image file and embed it inline.
    pub fn from_upload(path: &Path) -> CoverResult<Self> {
        let (value, file_name) = source::encode_file(path)?;
        Ok(Self {
            kind: SourceKind::File,
            value,
            file_name,
        })
    }

    pub fn from_upload_bytes(bytes: &[u8], file_name: Option<String>) -> CoverResult<Self> {
        Ok(Self {
            kind: SourceKind::File,
            value: source::encode_image_bytes(bytes)?,
            file_name,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub fn is_valid(&self) -> bool {
        is_http_link(&self.value) || source::is_image_data_url(&self.value)
    }
}

/// `true` for absolute `http`/`https` URLs.
pub fn is_http_link(value: &str) -> bool {
    url::Url::parse(value.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

/// Row-major `n × n` collection of cell sources.
///
/// Either unallocated (no grid size chosen yet) or exactly `n²` long.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellGrid {
    grid: Option<GridSize>,
    cells: Vec<ImageSource>,
}

impl CellGrid {
    pub fn empty(grid: GridSize) -> Self {
        Self {
            grid: Some(grid),
            cells: vec![ImageSource::empty(); grid.cell_count()],
        }
    }

    /// Build a grid from row-major sources. `None` unless exactly `n²` are given.
    pub fn from_sources(grid: GridSize, cells: Vec<ImageSource>) -> Option<Self> {
        (cells.len() == grid.cell_count()).then_some(Self {
            grid: Some(grid),
            cells,
        })
    }

    pub fn grid(&self) -> Option<GridSize> {
        self.grid
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: CellIndex) -> Option<&ImageSource> {
        let grid = self.grid?;
        index
            .is_within(grid)
            .then(|| &self.cells[index.to_linear(grid)])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageSource> {
        self.cells.iter()
    }

    fn set(&mut self, index: CellIndex, source: ImageSource) -> bool {
        let Some(grid) = self.grid else {
            return false;
        };
        if !index.is_within(grid) {
            return false;
        }
        let slot = &mut self.cells[index.to_linear(grid)];
        if *slot == source {
            return false;
        }
        *slot = source;
        true
    }
}

/// Content-type specific source payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sources {
    Playlist { url: String },
    Track { cells: CellGrid },
}

impl Sources {
    fn empty_for(content_type: ContentType, grid: Option<GridSize>) -> Self {
        match content_type {
            ContentType::Playlist => Sources::Playlist { url: String::new() },
            ContentType::Track => Sources::Track {
                cells: grid.map(CellGrid::empty).unwrap_or_default(),
            },
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Sources::Playlist { .. } => ContentType::Playlist,
            Sources::Track { .. } => ContentType::Track,
        }
    }
}

/// In-progress wizard selection.
///
/// Mutated only through the setters below. Each setter returns `true` when it changed the
/// state and never fails; invalid input is rejected as a no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WizardState {
    sources: Option<Sources>,
    grid: Option<GridSize>,
    resolution: Option<u32>,
    step: Step,
    policy: ResolutionPolicy,
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new(ResolutionPolicy::default())
    }
}

impl WizardState {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            sources: None,
            grid: None,
            resolution: None,
            step: Step::default(),
            policy,
        }
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.sources.as_ref().map(Sources::content_type)
    }

    pub fn grid(&self) -> Option<GridSize> {
        self.grid
    }

    pub fn resolution(&self) -> Option<u32> {
        self.resolution
    }

    pub fn sources(&self) -> Option<&Sources> {
        self.sources.as_ref()
    }

    pub fn cells(&self) -> Option<&CellGrid> {
        match &self.sources {
            Some(Sources::Track { cells }) => Some(cells),
            _ => None,
        }
    }

    pub fn playlist_url(&self) -> Option<&str> {
        match &self.sources {
            Some(Sources::Playlist { url }) => Some(url),
            _ => None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Selectable resolutions for the current grid size (empty while unset).
    pub fn resolutions(&self) -> Vec<u32> {
        self.grid
            .map(|g| self.policy.domain(g))
            .unwrap_or_default()
    }

    pub fn set_content_type(&mut self, content_type: ContentType) -> bool {
        if self.content_type() == Some(content_type) {
            return false;
        }
        self.sources = Some(Sources::empty_for(content_type, self.grid));
        true
    }

    pub fn set_grid_size(&mut self, grid: GridSize) -> bool {
        if self.grid == Some(grid) {
            return false;
        }
        self.grid = Some(grid);
        self.resolution = None;
        if let Some(Sources::Track { cells }) = &mut self.sources
            && cells.len() != grid.cell_count()
        {
            *cells = CellGrid::empty(grid);
        }
        true
    }

    pub fn set_resolution(&mut self, resolution: u32) -> bool {
        let Some(grid) = self.grid else {
            tracing::warn!(resolution, "resolution rejected: no grid size chosen");
            return false;
        };
        if !self.policy.contains(grid, resolution) {
            tracing::warn!(resolution, %grid, "resolution rejected: outside the valid domain");
            return false;
        }
        if self.resolution == Some(resolution) {
            return false;
        }
        self.resolution = Some(resolution);
        true
    }

    pub fn set_cell_source(&mut self, index: CellIndex, source: ImageSource) -> bool {
        let Some(Sources::Track { cells }) = &mut self.sources else {
            tracing::warn!(%index, "cell source ignored: content type is not track");
            return false;
        };
        let in_range = cells.grid().is_some_and(|g| index.is_within(g));
        debug_assert!(in_range, "cell index {index} out of range");
        if !in_range {
            tracing::error!(%index, "cell index out of range");
            return false;
        }
        cells.set(index, source)
    }

    /// Reset one cell back to an empty URL entry.
    pub fn clear_cell(&mut self, index: CellIndex) -> bool {
        self.set_cell_source(index, ImageSource::empty())
    }

    pub fn set_playlist_url(&mut self, value: impl Into<String>) -> bool {
        let Some(Sources::Playlist { url }) = &mut self.sources else {
            tracing::warn!("playlist url ignored: content type is not playlist");
            return false;
        };
        let value = value.into().trim().to_string();
        if *url == value {
            return false;
        }
        *url = value;
        true
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.policy);
    }

    /// Move to the next step if the current one is complete.
    pub fn advance(&mut self) -> Result<Step, FieldError> {
        self.validate_step(self.step)?;
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        Ok(self.step)
    }

    /// Go back one step. Never clears anything.
    pub fn back(&mut self) -> Step {
        if let Some(prev) = self.step.prev() {
            self.step = prev;
        }
        self.step
    }

    pub fn validate_step(&self, step: Step) -> Result<(), FieldError> {
        match step {
            Step::ContentType if self.content_type().is_none() => {
                Err(FieldError::MissingContentType)
            }
            Step::GridSize if self.grid.is_none() => Err(FieldError::MissingGridSize),
            Step::Resolution if self.resolution.is_none() => Err(FieldError::MissingResolution),
            Step::ContentType | Step::GridSize | Step::Resolution => Ok(()),
            Step::Sources => {
                self.validate_step(Step::ContentType)?;
                self.validate_step(Step::GridSize)?;
                match self.source_errors().into_iter().next() {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
            Step::Generate => Ok(()),
        }
    }

    /// Every field error, in step order.
    pub fn validate_all(&self) -> Vec<FieldError> {
        let mut errors: Vec<FieldError> = [Step::ContentType, Step::GridSize, Step::Resolution]
            .into_iter()
            .filter_map(|s| self.validate_step(s).err())
            .collect();
        errors.extend(self.source_errors());
        errors
    }

    /// Errors of the source fields alone; missing type or grid are reported by their own steps.
    fn source_errors(&self) -> Vec<FieldError> {
        match &self.sources {
            None => Vec::new(),
            Some(Sources::Playlist { url }) => {
                if url.is_empty() {
                    vec![FieldError::MissingPlaylistUrl]
                } else if !is_http_link(url) {
                    vec![FieldError::InvalidPlaylistUrl]
                } else {
                    Vec::new()
                }
            }
            Some(Sources::Track { cells }) => {
                let Some(grid) = cells.grid() else {
                    return Vec::new();
                };
                cells
                    .iter()
                    .enumerate()
                    .filter_map(|(i, cell)| {
                        let CellIndex { row, col } = CellIndex::from_linear(i, grid);
                        if cell.is_empty() {
                            Some(FieldError::EmptyCell { row, col })
                        } else if !cell.is_valid() {
                            Some(FieldError::InvalidCell { row, col })
                        } else {
                            None
                        }
                    })
                    .collect()
            }
        }
    }
}
