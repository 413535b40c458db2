use std::{
    cell::Cell,
    collections::{HashMap, HashSet},
    path::PathBuf,
    rc::Rc,
};

use covergrid::{
    CellIndex, ClipboardImage, ClipboardSink, ContentType, CoverConfig, CoverError, CoverResult,
    CoverService, CoverSession, DrawPolicy, GridSize, ImageLoader, ImageSource, NoticeLevel,
    RenderOutcome, RenderState, ResampleFilter, ResolveRequest, encode_png,
};
use image::{Rgba, RgbaImage};
use sha2::Digest as _;
use tokio::sync::Notify;

#[derive(Default)]
struct FakeService {
    /// Maps each request url to the locations it resolves to.
    answers: HashMap<String, Vec<String>>,
    reject: Option<CoverError>,
}

impl CoverService for FakeService {
    async fn resolve(&self, request: &ResolveRequest) -> CoverResult<Vec<String>> {
        if let Some(err) = &self.reject {
            return Err(match err {
                CoverError::Service { status, message } => CoverError::service(*status, message.clone()),
                other => CoverError::transport(other.to_string()),
            });
        }
        Ok(request
            .urls
            .iter()
            .flat_map(|u| self.answers.get(u).cloned().unwrap_or_default())
            .collect())
    }
}

#[derive(Default)]
struct Gate {
    open: Cell<bool>,
    notify: Notify,
}

impl Gate {
    fn release(&self) {
        self.open.set(true);
        self.notify.notify_waiters();
    }
}

#[derive(Default)]
struct FakeLoader {
    images: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    gate: Option<Rc<Gate>>,
}

impl ImageLoader for FakeLoader {
    async fn fetch(&self, location: &str) -> CoverResult<Vec<u8>> {
        if let Some(gate) = &self.gate
            && !gate.open.get()
        {
            gate.notify.notified().await;
        }
        if covergrid::source::is_data_url(location) {
            let (_, bytes) = covergrid::source::decode(location)?;
            return Ok(bytes);
        }
        if self.failing.contains(location) {
            return Err(CoverError::transport(format!("GET {location}: HTTP 404")));
        }
        self.images
            .get(location)
            .cloned()
            .ok_or_else(|| CoverError::transport(format!("unknown location {location}")))
    }
}

#[derive(Default)]
struct RecordingSink {
    images: Vec<ClipboardImage>,
    fail: bool,
}

impl ClipboardSink for RecordingSink {
    fn set_image(&mut self, image: &ClipboardImage) -> CoverResult<()> {
        if self.fail {
            return Err(CoverError::export("clipboard is locked"));
        }
        self.images.push(image.clone());
        Ok(())
    }
}

fn g(n: u8) -> GridSize {
    GridSize::new(n).unwrap()
}

fn color(i: usize) -> [u8; 4] {
    [(i * 37 % 256) as u8, (200 - i * 5) as u8, (i * 11 % 256) as u8, 255]
}

fn png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    encode_png(&RgbaImage::from_pixel(w, h, Rgba(rgba))).unwrap()
}

fn config(draw: DrawPolicy) -> CoverConfig {
    CoverConfig {
        draw,
        filter: ResampleFilter::Nearest,
        ..Default::default()
    }
}

fn share(i: usize) -> String {
    format!("https://open.example/track/{i}")
}

fn resolved(i: usize) -> String {
    format!("https://img.example/{i}.jpg")
}

/// Service and loader for an `n×n` grid of share links, cell `i` a solid `color(i)` image.
fn track_fakes(n: u8) -> (FakeService, FakeLoader) {
    let count = usize::from(n) * usize::from(n);
    let mut service = FakeService::default();
    let mut loader = FakeLoader::default();
    for i in 0..count {
        service.answers.insert(share(i), vec![resolved(i)]);
        let (w, h) = (40 + i as u32 * 7, 25 + i as u32 * 3);
        loader.images.insert(resolved(i), png(w, h, color(i)));
    }
    (service, loader)
}

fn select_track<S: CoverService, L: ImageLoader>(
    session: &CoverSession<S, L>,
    n: u8,
    resolution: u32,
) {
    assert!(session.set_content_type(ContentType::Track));
    assert!(session.set_grid_size(g(n)));
    assert!(session.set_resolution(resolution));
    for i in 0..usize::from(n) * usize::from(n) {
        session.set_cell_source(CellIndex::from_linear(i, g(n)), ImageSource::url(share(i)));
    }
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("covergrid_tests").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[tokio::test(flavor = "current_thread")]
async fn cell_centers_match_their_sources_for_both_policies() {
    for draw in [DrawPolicy::Cover, DrawPolicy::Stretch] {
        for (n, res) in [(2u8, 1000u32), (3, 1500), (5, 500)] {
            let (service, loader) = track_fakes(n);
            let session = CoverSession::new(&config(draw), service, loader);
            select_track(&session, n, res);

            assert_eq!(session.generate().await, RenderOutcome::Initialized);
            let raster = session.raster().unwrap();
            assert_eq!(raster.dimensions(), (res, res));

            let n = u32::from(n);
            let cell = res / n;
            for i in 0..(n * n) {
                let (row, col) = (i / n, i % n);
                let (x, y) = (col * cell + cell / 2, row * cell + cell / 2);
                assert_eq!(
                    raster.get_pixel(x, y).0,
                    color(i as usize),
                    "{draw:?} n={n} cell=({row},{col})"
                );
            }
        }
    }
}

#[tokio::test(flavor = "current_thread")]
async fn two_failed_loads_fail_the_render_and_clear_the_surface() {
    let (service, mut loader) = track_fakes(2);
    loader.failing.insert(resolved(1));
    loader.failing.insert(resolved(2));
    let session = CoverSession::new(&config(DrawPolicy::Cover), service, loader);
    select_track(&session, 2, 500);

    assert_eq!(session.generate().await, RenderOutcome::Failed);
    assert_eq!(session.status().state, RenderState::Failed);
    assert!(session.raster().is_none());

    let surface = session.surface().unwrap();
    assert_eq!(surface.dimensions(), (500, 500));
    assert!(surface.pixels().all(|p| p.0 == [0, 0, 0, 0]));

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].title, "Failed to generate the image");
}

#[tokio::test(flavor = "current_thread")]
async fn changing_resolution_mid_render_discards_late_draws() {
    let gate = Rc::new(Gate::default());
    let (service, mut loader) = track_fakes(2);
    loader.gate = Some(gate.clone());
    let session = CoverSession::new(&config(DrawPolicy::Cover), service, loader);
    select_track(&session, 2, 500);

    let interfere = async {
        tokio::task::yield_now().await;
        assert!(session.status().loading());
        assert!(session.set_resolution(1000));
        gate.release();
    };
    let (outcome, ()) = tokio::join!(session.generate(), interfere);

    assert_eq!(outcome, RenderOutcome::Superseded);
    assert_eq!(session.status().state, RenderState::Idle);
    assert!(session.surface().is_none());
    assert!(session.take_notices().is_empty());

    assert_eq!(session.generate().await, RenderOutcome::Initialized);
    let raster = session.raster().unwrap();
    assert_eq!(raster.dimensions(), (1000, 1000));
    assert_eq!(raster.get_pixel(750, 750).0, color(3));
}

#[tokio::test(flavor = "current_thread")]
async fn a_newer_render_supersedes_a_pending_one() {
    let gate = Rc::new(Gate::default());
    let (service, mut loader) = track_fakes(2);
    loader.gate = Some(gate.clone());
    let session = CoverSession::new(&config(DrawPolicy::Stretch), service, loader);
    select_track(&session, 2, 1000);

    let second = async {
        tokio::task::yield_now().await;
        gate.release();
        session.generate().await
    };
    let (first, second) = tokio::join!(session.generate(), second);

    assert_eq!(first, RenderOutcome::Superseded);
    assert_eq!(second, RenderOutcome::Initialized);
    assert!(session.status().initialized());
}

#[tokio::test(flavor = "current_thread")]
async fn incomplete_selection_stays_idle_without_fetching() {
    let (service, loader) = track_fakes(2);
    let session = CoverSession::new(&config(DrawPolicy::Cover), service, loader);
    session.set_content_type(ContentType::Track);
    session.set_grid_size(g(2));
    session.set_resolution(500);
    session.set_cell_source(CellIndex::new(0, 0), ImageSource::url(share(0)));

    assert_eq!(session.generate().await, RenderOutcome::Idle);
    assert_eq!(session.status().state, RenderState::Idle);
    assert!(session.take_notices().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn uploads_are_drawn_verbatim_and_never_sent() {
    let (service, loader) = track_fakes(2);
    let session = CoverSession::new(&config(DrawPolicy::Cover), service, loader);
    select_track(&session, 2, 500);

    let upload = ImageSource::from_upload_bytes(&png(9, 9, [1, 2, 3, 255]), Some("me.png".into()))
        .unwrap();
    session.set_cell_source(CellIndex::new(0, 1), upload.clone());
    session.set_cell_source(CellIndex::new(1, 0), upload);

    assert_eq!(session.generate().await, RenderOutcome::Initialized);
    let raster = session.raster().unwrap();
    assert_eq!(raster.get_pixel(375, 125).0, [1, 2, 3, 255]);
    assert_eq!(raster.get_pixel(125, 375).0, [1, 2, 3, 255]);
    assert_eq!(raster.get_pixel(375, 375).0, color(3));
}

#[tokio::test(flavor = "current_thread")]
async fn all_uploads_skip_the_service() {
    let service = FakeService {
        reject: Some(CoverError::service(500, None)),
        ..Default::default()
    };
    let session = CoverSession::new(&config(DrawPolicy::Cover), service, FakeLoader::default());
    session.set_content_type(ContentType::Track);
    session.set_grid_size(g(2));
    session.set_resolution(500);
    for i in 0..4 {
        let src = ImageSource::from_upload_bytes(&png(4, 4, color(i)), None).unwrap();
        session.set_cell_source(CellIndex::from_linear(i, g(2)), src);
    }

    assert_eq!(session.generate().await, RenderOutcome::Initialized);
}

#[tokio::test(flavor = "current_thread")]
async fn playlist_resolves_one_link_into_the_whole_grid() {
    let mut service = FakeService::default();
    let mut loader = FakeLoader::default();
    let playlist = "https://open.example/playlist/mix";
    service
        .answers
        .insert(playlist.to_string(), (0..9).map(resolved).collect());
    for i in 0..9 {
        loader.images.insert(resolved(i), png(64, 64, color(i)));
    }
    let session = CoverSession::new(&config(DrawPolicy::Cover), service, loader);
    session.set_content_type(ContentType::Playlist);
    session.set_grid_size(g(3));
    session.set_resolution(1500);
    session.set_playlist_url(playlist);

    assert_eq!(session.generate().await, RenderOutcome::Initialized);
    let raster = session.raster().unwrap();
    assert_eq!(raster.get_pixel(1250, 250).0, color(2));
}

#[tokio::test(flavor = "current_thread")]
async fn service_rejection_surfaces_its_message() {
    let service = FakeService {
        reject: Some(CoverError::service(400, Some("playlist is private".into()))),
        ..Default::default()
    };
    let session = CoverSession::new(&config(DrawPolicy::Cover), service, FakeLoader::default());
    session.set_content_type(ContentType::Playlist);
    session.set_grid_size(g(2));
    session.set_resolution(500);
    session.set_playlist_url("https://open.example/playlist/secret");

    assert_eq!(session.generate().await, RenderOutcome::Failed);
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].description.as_deref(), Some("playlist is private"));
}

#[tokio::test(flavor = "current_thread")]
async fn download_is_a_noop_until_initialized() {
    let dir = temp_dir("download_noop");
    let (service, loader) = track_fakes(2);
    let session = CoverSession::new(&config(DrawPolicy::Cover), service, loader);
    select_track(&session, 2, 500);

    assert_eq!(session.download(&dir), None);
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    assert!(session.take_notices().is_empty());

    assert_eq!(session.generate().await, RenderOutcome::Initialized);
    let path = session.download(&dir).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("spotify-cover-track-2-500px-"), "{name}");
    assert!(name.ends_with(".png"));

    let saved = image::open(&path).unwrap().to_rgba8();
    assert_eq!(saved, session.raster().unwrap());

    session.set_resolution(1000);
    assert_eq!(session.download(&dir), None);
}

#[tokio::test(flavor = "current_thread")]
async fn copy_reports_each_outcome_once() {
    let (service, loader) = track_fakes(2);
    let session = CoverSession::new(&config(DrawPolicy::Cover), service, loader);
    select_track(&session, 2, 500);

    let mut sink = RecordingSink::default();
    assert!(!session.copy_to_clipboard(&mut sink));
    assert!(sink.images.is_empty());
    assert!(session.take_notices().is_empty());

    session.generate().await;
    assert!(session.copy_to_clipboard(&mut sink));
    let copied = &sink.images[0];
    assert_eq!((copied.width, copied.height), (500, 500));
    let decoded = image::load_from_memory(&copied.to_png().unwrap()).unwrap().to_rgba8();
    assert_eq!(decoded, session.raster().unwrap());
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Success);

    let mut broken = RecordingSink {
        fail: true,
        ..Default::default()
    };
    assert!(!session.copy_to_clipboard(&mut broken));
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title, "Failed to copy to the clipboard");
    assert!(session.status().initialized());
}

#[tokio::test(flavor = "current_thread")]
async fn repeated_renders_are_byte_identical() {
    let mut digests = Vec::new();
    for _ in 0..2 {
        let (service, loader) = track_fakes(4);
        let session = CoverSession::new(&config(DrawPolicy::Cover), service, loader);
        select_track(&session, 4, 2500);
        assert_eq!(session.generate().await, RenderOutcome::Initialized);
        let bytes = encode_png(&session.raster().unwrap()).unwrap();
        digests.push(sha2::Sha256::digest(&bytes));
    }
    assert_eq!(digests[0], digests[1]);
}

#[tokio::test(flavor = "current_thread")]
async fn reset_clears_selection_and_render() {
    let (service, loader) = track_fakes(2);
    let session = CoverSession::new(&config(DrawPolicy::Cover), service, loader);
    select_track(&session, 2, 500);
    session.generate().await;
    assert!(session.status().initialized());

    session.reset();
    assert_eq!(session.status().state, RenderState::Idle);
    assert_eq!(session.wizard().content_type(), None);
    assert_eq!(session.wizard().grid(), None);
    assert_eq!(session.generate().await, RenderOutcome::Idle);
}
