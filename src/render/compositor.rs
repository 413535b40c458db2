use image::{RgbaImage, imageops};

use crate::{
    config::{DrawPolicy, ResampleFilter},
    foundation::error::{CoverError, CoverResult},
    render::geometry::{CellLayout, source_crop},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderState {
    #[default]
    Idle,
    Loading,
    Initialized,
    Failed,
}

/// Handle for one render invocation. Completions carry it back so superseded work is detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTicket {
    pub generation: u64,
    pub layout: CellLayout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderStatus {
    pub state: RenderState,
    pub generation: u64,
}

impl RenderStatus {
    pub fn loading(&self) -> bool {
        self.state == RenderState::Loading
    }

    pub fn initialized(&self) -> bool {
        self.state == RenderState::Initialized
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Ticket superseded or render no longer loading; nothing was touched.
    Stale,
    Drawn { remaining: usize },
    /// Last cell drawn; the surface is now initialized.
    Complete,
}

/// Sole writer of the output raster.
///
/// Tracks `Idle → Loading → (Initialized | Failed)`. Every [`begin`](Self::begin) and
/// [`invalidate`](Self::invalidate) bumps the generation, so tickets from earlier renders go stale.
#[derive(Debug)]
pub struct Compositor {
    draw: DrawPolicy,
    filter: ResampleFilter,
    generation: u64,
    state: RenderState,
    layout: Option<CellLayout>,
    surface: Option<RgbaImage>,
    drawn: Vec<bool>,
    remaining: usize,
}

impl Compositor {
    pub fn new(draw: DrawPolicy, filter: ResampleFilter) -> Self {
        Self {
            draw,
            filter,
            generation: 0,
            state: RenderState::Idle,
            layout: None,
            surface: None,
            drawn: Vec::new(),
            remaining: 0,
        }
    }

    /// Start a render: resize and clear the surface now, before any load is issued.
    pub fn begin(&mut self, layout: CellLayout) -> RenderTicket {
        self.generation += 1;
        self.state = RenderState::Loading;
        self.layout = Some(layout);
        self.surface = Some(RgbaImage::new(layout.resolution, layout.resolution));
        self.drawn = vec![false; layout.cell_count()];
        self.remaining = layout.cell_count();
        tracing::debug!(
            generation = self.generation,
            resolution = layout.resolution,
            grid = %layout.grid,
            "render started"
        );
        RenderTicket {
            generation: self.generation,
            layout,
        }
    }

    pub fn is_current(&self, ticket: &RenderTicket) -> bool {
        ticket.generation == self.generation && self.state == RenderState::Loading
    }

    /// Draw the image for cell `index` (row-major) into the surface.
    pub fn draw_cell(
        &mut self,
        ticket: &RenderTicket,
        index: usize,
        image: &RgbaImage,
    ) -> CoverResult<DrawOutcome> {
        if !self.is_current(ticket) {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                index,
                "discarding stale cell draw"
            );
            return Ok(DrawOutcome::Stale);
        }
        if index >= ticket.layout.cell_count() {
            return Err(CoverError::validation(format!(
                "cell index {index} outside a {} grid",
                ticket.layout.grid
            )));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(CoverError::decode("image has zero width or height"));
        }
        let Some(surface) = self.surface.as_mut() else {
            return Ok(DrawOutcome::Stale);
        };

        let cell = ticket.layout.cell_rect(index);
        if cell.width == 0 || cell.height == 0 {
            return Err(CoverError::validation(format!(
                "cell {index} has no pixels at {}px on a {} grid",
                ticket.layout.resolution, ticket.layout.grid
            )));
        }
        let crop = source_crop(self.draw, image.width(), image.height(), cell);
        let visible = imageops::crop_imm(image, crop.x, crop.y, crop.width, crop.height).to_image();
        let scaled = if visible.dimensions() == (cell.width, cell.height) {
            visible
        } else {
            imageops::resize(&visible, cell.width, cell.height, self.filter.into())
        };
        imageops::overlay(surface, &scaled, i64::from(cell.x), i64::from(cell.y));

        if !std::mem::replace(&mut self.drawn[index], true) {
            self.remaining -= 1;
        }
        tracing::debug!(index, remaining = self.remaining, "cell drawn");

        if self.remaining == 0 {
            self.state = RenderState::Initialized;
            tracing::debug!(generation = self.generation, "render initialized");
            return Ok(DrawOutcome::Complete);
        }
        Ok(DrawOutcome::Drawn {
            remaining: self.remaining,
        })
    }

    /// Abort the render. The surface is left cleared. Returns `false` for a stale ticket.
    pub fn fail(&mut self, ticket: &RenderTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.state = RenderState::Failed;
        if let Some(surface) = self.surface.as_mut() {
            surface.fill(0);
        }
        true
    }

    /// Drop back to idle; pending completions become stale.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        if self.state != RenderState::Idle {
            tracing::debug!(generation = self.generation, "render invalidated");
        }
        self.state = RenderState::Idle;
        self.layout = None;
        self.surface = None;
        self.drawn.clear();
        self.remaining = 0;
    }

    pub fn status(&self) -> RenderStatus {
        RenderStatus {
            state: self.state,
            generation: self.generation,
        }
    }

    pub fn layout(&self) -> Option<CellLayout> {
        self.layout
    }

    /// The finished raster; `None` unless initialized.
    pub fn raster(&self) -> Option<&RgbaImage> {
        match self.state {
            RenderState::Initialized => self.surface.as_ref(),
            _ => None,
        }
    }

    /// Current surface contents in any state.
    pub fn surface(&self) -> Option<&RgbaImage> {
        self.surface.as_ref()
    }
}
