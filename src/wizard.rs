//! Step-by-step selection state: content type, grid size, resolution, sources.

pub mod state;
pub mod steps;

pub use state::{CellGrid, ImageSource, SourceKind, Sources, WizardState, is_http_link};
pub use steps::{FieldError, Step};
