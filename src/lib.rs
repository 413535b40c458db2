#![forbid(unsafe_code)]

pub mod config;
pub mod export;
pub mod foundation;
pub mod loader;
pub mod notify;
pub mod render;
pub mod service;
pub mod session;
pub mod source;
pub mod wizard;

pub use config::{CoverConfig, DrawPolicy, ResampleFilter, ResolutionPolicy};
pub use export::{ClipboardImage, ClipboardSink, download_filename, encode_png};
#[cfg(feature = "clipboard")]
pub use export::SystemClipboard;
pub use foundation::core::{CellIndex, ContentType, GridSize};
pub use foundation::error::{CoverError, CoverResult};
pub use loader::{HttpImageLoader, ImageLoader};
pub use notify::{Notice, NoticeLevel};
pub use render::{CellLayout, Compositor, DrawOutcome, RenderState, RenderStatus, RenderTicket};
pub use service::{CoverService, HttpCoverService, ResolveRequest};
pub use session::{CoverSession, RenderJob, RenderOutcome};
pub use wizard::{CellGrid, FieldError, ImageSource, SourceKind, Sources, Step, WizardState};
