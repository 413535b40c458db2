use std::fmt;

/// Wizard steps in presentation order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    #[default]
    ContentType,
    GridSize,
    Resolution,
    Sources,
    Generate,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::ContentType,
        Step::GridSize,
        Step::Resolution,
        Step::Sources,
        Step::Generate,
    ];

    pub fn next(self) -> Option<Step> {
        match self {
            Step::ContentType => Some(Step::GridSize),
            Step::GridSize => Some(Step::Resolution),
            Step::Resolution => Some(Step::Sources),
            Step::Sources => Some(Step::Generate),
            Step::Generate => None,
        }
    }

    pub fn prev(self) -> Option<Step> {
        match self {
            Step::ContentType => None,
            Step::GridSize => Some(Step::ContentType),
            Step::Resolution => Some(Step::GridSize),
            Step::Sources => Some(Step::Resolution),
            Step::Generate => Some(Step::Sources),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::ContentType => "Choose a content type",
            Step::GridSize => "Choose a grid size",
            Step::Resolution => "Choose a resolution",
            Step::Sources => "Enter image sources",
            Step::Generate => "Generate cover",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Inline validation failure for a single wizard field.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum FieldError {
    #[error("choose a content type")]
    MissingContentType,
    #[error("choose a grid size")]
    MissingGridSize,
    #[error("choose a resolution")]
    MissingResolution,
    #[error("enter a playlist share link")]
    MissingPlaylistUrl,
    #[error("enter a valid playlist URL")]
    InvalidPlaylistUrl,
    #[error("cell ({row}, {col}) is empty")]
    EmptyCell { row: usize, col: usize },
    #[error("cell ({row}, {col}) is not a valid URL or image upload")]
    InvalidCell { row: usize, col: usize },
}

impl FieldError {
    /// Step on which this error is shown.
    pub fn step(&self) -> Step {
        match self {
            FieldError::MissingContentType => Step::ContentType,
            FieldError::MissingGridSize => Step::GridSize,
            FieldError::MissingResolution => Step::Resolution,
            FieldError::MissingPlaylistUrl
            | FieldError::InvalidPlaylistUrl
            | FieldError::EmptyCell { .. }
            | FieldError::InvalidCell { .. } => Step::Sources,
        }
    }
}
