//! Grid compositing: placement math, decoding and the raster surface state machine.

pub mod compositor;
pub mod decode;
pub mod geometry;

pub use compositor::{Compositor, DrawOutcome, RenderState, RenderStatus, RenderTicket};
pub use decode::decode_image;
pub use geometry::{CellLayout, PixelRect, source_crop};
