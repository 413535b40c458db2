use std::{fmt, str::FromStr};

use crate::foundation::error::{CoverError, CoverResult};

/// What the cover is for. Decides the shape of the image sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// One playlist link, expanded server-side into `n²` images.
    Playlist,
    /// One source per grid cell.
    Track,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Playlist => "playlist",
            Self::Track => "track",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = CoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "playlist" => Ok(Self::Playlist),
            "track" => Ok(Self::Track),
            other => Err(CoverError::validation(format!(
                "unknown content type '{other}' (expected 'playlist' or 'track')"
            ))),
        }
    }
}

/// Side length `n` of the `n × n` cell grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(into = "u8")]
pub struct GridSize(u8);

impl GridSize {
    pub const MIN: u8 = 2;
    pub const MAX: u8 = 5;

    pub fn new(n: u8) -> CoverResult<Self> {
        if !(Self::MIN..=Self::MAX).contains(&n) {
            return Err(CoverError::validation(format!(
                "grid size must be within {}..={}, got {n}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(n))
    }

    /// Every valid grid size, smallest first.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Number of cells, `n²`.
    pub fn cell_count(self) -> usize {
        usize::from(self.0) * usize::from(self.0)
    }
}

impl From<GridSize> for u8 {
    fn from(g: GridSize) -> Self {
        g.0
    }
}

impl<'de> serde::Deserialize<'de> for GridSize {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let n = u8::deserialize(d)?;
        GridSize::new(n).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 0-based `(row, col)` address of a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellIndex {
    pub row: usize,
    pub col: usize,
}

impl CellIndex {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Row-major position within a grid of `grid` columns.
    pub fn to_linear(self, grid: GridSize) -> usize {
        self.row * usize::from(grid.get()) + self.col
    }

    pub fn from_linear(index: usize, grid: GridSize) -> Self {
        let n = usize::from(grid.get());
        Self {
            row: index / n,
            col: index % n,
        }
    }

    pub fn is_within(self, grid: GridSize) -> bool {
        let n = usize::from(grid.get());
        self.row < n && self.col < n
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}
