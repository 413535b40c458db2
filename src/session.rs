//! Application context: wizard state, compositor and the async render driver.
//!
//! Everything here runs on one thread. State lives in `RefCell`s so the driver and UI-side
//! mutators can interleave at await points; no borrow is ever held across an await.

use std::{
    cell::{Ref, RefCell},
    path::{Path, PathBuf},
};

use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::{
    config::CoverConfig,
    export::{self, ClipboardImage, ClipboardSink},
    foundation::{
        core::{CellIndex, ContentType, GridSize},
        error::{CoverError, CoverResult},
    },
    loader::{HttpImageLoader, ImageLoader},
    notify::Notice,
    render::{CellLayout, Compositor, DrawOutcome, RenderStatus, RenderTicket, decode_image},
    service::{self, CoverService, HttpCoverService, ResolveRequest},
    wizard::{CellGrid, FieldError, ImageSource, Sources, Step, WizardState},
};

/// Everything a render needs, captured from a complete wizard state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderJob {
    pub layout: CellLayout,
    pub sources: Sources,
}

impl RenderJob {
    /// `None` while any step is incomplete or any source is invalid.
    pub fn from_state(state: &WizardState) -> Option<Self> {
        let grid = state.grid()?;
        let resolution = state.resolution()?;
        let sources = state.sources()?.clone();
        if !state.validate_all().is_empty() {
            return None;
        }
        Some(Self {
            layout: CellLayout::new(resolution, grid),
            sources,
        })
    }

    pub fn content_type(&self) -> ContentType {
        self.sources.content_type()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Inputs incomplete; nothing was started.
    Idle,
    Initialized,
    Failed,
    /// Inputs changed (or a newer render began) before this one finished.
    Superseded,
}

pub struct CoverSession<S, L> {
    service: S,
    loader: L,
    wizard: RefCell<WizardState>,
    compositor: RefCell<Compositor>,
    notices: RefCell<Vec<Notice>>,
}

impl CoverSession<HttpCoverService, HttpImageLoader> {
    /// Session backed by the HTTP service and loader, sharing one client.
    pub fn connect(config: &CoverConfig) -> CoverResult<Self> {
        config.validate()?;
        let http = service::build_http_client(config)?;
        Ok(Self::new(
            config,
            HttpCoverService::with_client(http.clone(), config.service_url.clone()),
            HttpImageLoader::with_client(http),
        ))
    }
}

impl<S: CoverService, L: ImageLoader> CoverSession<S, L> {
    pub fn new(config: &CoverConfig, service: S, loader: L) -> Self {
        Self {
            service,
            loader,
            wizard: RefCell::new(WizardState::new(config.resolution)),
            compositor: RefCell::new(Compositor::new(config.draw, config.filter)),
            notices: RefCell::new(Vec::new()),
        }
    }

    pub fn wizard(&self) -> Ref<'_, WizardState> {
        self.wizard.borrow()
    }

    pub fn status(&self) -> RenderStatus {
        self.compositor.borrow().status()
    }

    /// Copy of the finished raster, if initialized.
    pub fn raster(&self) -> Option<image::RgbaImage> {
        self.compositor.borrow().raster().cloned()
    }

    /// Copy of the surface in any state; a failed render leaves it cleared.
    pub fn surface(&self) -> Option<image::RgbaImage> {
        self.compositor.borrow().surface().cloned()
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.borrow_mut())
    }

    fn notify(&self, notice: Notice) {
        self.notices.borrow_mut().push(notice);
    }

    /// Apply a wizard mutation; an accepted change invalidates any render.
    fn mutate(&self, f: impl FnOnce(&mut WizardState) -> bool) -> bool {
        let changed = f(&mut *self.wizard.borrow_mut());
        if changed {
            self.compositor.borrow_mut().invalidate();
        }
        changed
    }

    pub fn set_content_type(&self, content_type: ContentType) -> bool {
        self.mutate(|w| w.set_content_type(content_type))
    }

    pub fn set_grid_size(&self, grid: GridSize) -> bool {
        self.mutate(|w| w.set_grid_size(grid))
    }

    pub fn set_resolution(&self, resolution: u32) -> bool {
        self.mutate(|w| w.set_resolution(resolution))
    }

    pub fn set_cell_source(&self, index: CellIndex, source: ImageSource) -> bool {
        self.mutate(|w| w.set_cell_source(index, source))
    }

    pub fn clear_cell(&self, index: CellIndex) -> bool {
        self.mutate(|w| w.clear_cell(index))
    }

    pub fn set_playlist_url(&self, url: impl Into<String>) -> bool {
        let url = url.into();
        self.mutate(|w| w.set_playlist_url(url))
    }

    pub fn reset(&self) {
        self.wizard.borrow_mut().reset();
        self.compositor.borrow_mut().invalidate();
    }

    pub fn advance(&self) -> Result<Step, FieldError> {
        self.wizard.borrow_mut().advance()
    }

    pub fn back(&self) -> Step {
        self.wizard.borrow_mut().back()
    }

    pub fn validate_all(&self) -> Vec<FieldError> {
        self.wizard.borrow().validate_all()
    }

    /// Render the current selection.
    ///
    /// Resolves sources, then loads every cell concurrently and draws each one as soon as it
    /// arrives. The first failure aborts the render with exactly one error notice; completions
    /// that land after the inputs changed are dropped without a notice.
    #[tracing::instrument(skip(self))]
    pub async fn generate(&self) -> RenderOutcome {
        let job = RenderJob::from_state(&self.wizard.borrow());
        let Some(job) = job else {
            self.compositor.borrow_mut().invalidate();
            tracing::debug!("render skipped: selection incomplete");
            return RenderOutcome::Idle;
        };

        let ticket = self.compositor.borrow_mut().begin(job.layout);
        tracing::info!(
            generation = ticket.generation,
            content_type = %job.content_type(),
            grid = %job.layout.grid,
            resolution = job.layout.resolution,
            "generating cover"
        );

        match self.run(&job, &ticket).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if self.compositor.borrow_mut().fail(&ticket) {
                    tracing::warn!(error = %err, "render failed");
                    self.notify(Notice::render_failed(&err));
                    RenderOutcome::Failed
                } else {
                    tracing::debug!(error = %err, "ignoring failure of superseded render");
                    RenderOutcome::Superseded
                }
            }
        }
    }

    async fn run(&self, job: &RenderJob, ticket: &RenderTicket) -> CoverResult<RenderOutcome> {
        let locations = self.resolve_locations(job).await?;
        if !self.compositor.borrow().is_current(ticket) {
            return Ok(RenderOutcome::Superseded);
        }

        let loader = &self.loader;
        let mut loads: FuturesUnordered<_> = locations
            .iter()
            .enumerate()
            .map(|(index, location)| async move { (index, loader.fetch(location).await) })
            .collect();

        while let Some((index, fetched)) = loads.next().await {
            if !self.compositor.borrow().is_current(ticket) {
                tracing::debug!(index, "load landed after render was superseded");
                return Ok(RenderOutcome::Superseded);
            }
            let image = decode_image(&fetched?)?;
            let outcome = self
                .compositor
                .borrow_mut()
                .draw_cell(ticket, index, &image)?;
            match outcome {
                DrawOutcome::Stale => return Ok(RenderOutcome::Superseded),
                DrawOutcome::Drawn { .. } => {}
                DrawOutcome::Complete => {
                    tracing::info!(generation = ticket.generation, "cover ready");
                    return Ok(RenderOutcome::Initialized);
                }
            }
        }

        Err(CoverError::Other(anyhow::anyhow!(
            "render ended with undrawn cells"
        )))
    }

    async fn resolve_locations(&self, job: &RenderJob) -> CoverResult<Vec<String>> {
        let grid = job.layout.grid;
        match &job.sources {
            Sources::Playlist { url } => {
                let request = ResolveRequest::for_playlist(grid, url);
                let resolved = self.service.resolve(&request).await?;
                if resolved.len() != grid.cell_count() {
                    return Err(CoverError::transport(format!(
                        "service returned {} image(s), expected {}",
                        resolved.len(),
                        grid.cell_count()
                    )));
                }
                Ok(resolved)
            }
            Sources::Track { cells } => {
                let request = ResolveRequest::for_track(grid, cells);
                let resolved = if request.urls.is_empty() {
                    Vec::new()
                } else {
                    self.service.resolve(&request).await?
                };
                service::merge_locations(cells, &resolved)
            }
        }
    }

    /// Write the finished cover into `dir`. No-op (returns `None`) unless initialized.
    pub fn download(&self, dir: &Path) -> Option<PathBuf> {
        let compositor = self.compositor.borrow();
        let raster = compositor.raster()?;
        let layout = compositor.layout()?;
        let content_type = self.wizard.borrow().content_type()?;

        let millis = chrono::Utc::now().timestamp_millis();
        let name = export::download_filename(content_type, layout.grid, layout.resolution, millis);
        match export::write_png(dir, &name, raster) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "cover downloaded");
                Some(path)
            }
            Err(err) => {
                self.notify(Notice::download_failed(&err));
                None
            }
        }
    }

    /// Put the finished cover on `sink`. Silent no-op unless initialized.
    pub fn copy_to_clipboard(&self, sink: &mut impl ClipboardSink) -> bool {
        let payload = {
            let compositor = self.compositor.borrow();
            let Some(raster) = compositor.raster() else {
                return false;
            };
            ClipboardImage::from_raster(raster)
        };
        match sink.set_image(&payload) {
            Ok(()) => {
                self.notify(Notice::copied());
                true
            }
            Err(err) => {
                self.notify(Notice::copy_failed(&err));
                false
            }
        }
    }

    /// Cells of the current track selection, if any.
    pub fn cells(&self) -> Option<CellGrid> {
        self.wizard.borrow().cells().cloned()
    }
}
