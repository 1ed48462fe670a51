use super::*;
use crate::tiles::test_helpers::png_bytes;
use bytes::Bytes;
use std::collections::VecDeque;
use tokio::sync::oneshot;

// =============================================================================
// MOCKS
// =============================================================================

enum Reply {
    Ready(Result<Bytes, TileError>),
    Gated(oneshot::Receiver<Result<Bytes, TileError>>),
}

struct MockSource {
    replies: Mutex<VecDeque<Reply>>,
    queries: Mutex<Vec<TileQuery>>,
}

impl MockSource {
    fn new() -> Self {
        Self { replies: Mutex::new(VecDeque::new()), queries: Mutex::new(Vec::new()) }
    }

    fn push_err(&self, status: u16) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Ready(Err(TileError::Status { status })));
    }

    fn push_gated(&self) -> oneshot::Sender<Result<Bytes, TileError>> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().push_back(Reply::Gated(rx));
        tx
    }

    fn queries(&self) -> Vec<TileQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TileSource for MockSource {
    async fn fetch_tile(&self, query: &TileQuery) -> Result<Bytes, TileError> {
        self.queries.lock().unwrap().push(query.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Ready(result)) => result,
            Some(Reply::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(TileError::Request("gate dropped".into()))),
            None => Ok(png_bytes(2, 2, [0, 0, 0, 255])),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Loading(bool),
    Mapped(u64),
    Disposed(u64),
    Status(TileStatus),
    Survey(String),
    Alert(String),
    ResetCamera,
}

struct MockSurface {
    direction: Mutex<DVec3>,
    events: Mutex<Vec<Event>>,
}

impl MockSurface {
    fn new() -> Self {
        Self { direction: Mutex::new(DVec3::new(-1.0, 0.0, 0.0)), events: Mutex::new(Vec::new()) }
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn mapped(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| if let Event::Mapped(id) = e { Some(id) } else { None })
            .collect()
    }

    fn disposed(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| if let Event::Disposed(id) = e { Some(id) } else { None })
            .collect()
    }

    fn statuses(&self) -> Vec<TileStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| if let Event::Status(s) = e { Some(s) } else { None })
            .collect()
    }

    fn alerts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| if let Event::Alert(m) = e { Some(m) } else { None })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl SkySurface for MockSurface {
    fn camera_direction(&self) -> DVec3 {
        *self.direction.lock().unwrap()
    }

    fn reset_camera(&self) {
        self.push(Event::ResetCamera);
    }

    fn map_texture(&self, texture: &SkyTexture) {
        self.push(Event::Mapped(texture.id));
    }

    fn dispose_texture(&self, texture: SkyTexture) {
        self.push(Event::Disposed(texture.id));
    }

    fn set_loading(&self, loading: bool) {
        self.push(Event::Loading(loading));
    }

    fn show_status(&self, status: &TileStatus) {
        self.push(Event::Status(status.clone()));
    }

    fn show_survey(&self, survey: &str) {
        self.push(Event::Survey(survey.to_string()));
    }

    fn alert(&self, message: &str) {
        self.push(Event::Alert(message.to_string()));
    }
}

fn setup() -> (TileController, Arc<MockSource>, Arc<MockSurface>) {
    let source = Arc::new(MockSource::new());
    let surface = Arc::new(MockSurface::new());
    let controller = TileController::new(source.clone(), surface.clone(), ViewerSettings::default());
    (controller, source, surface)
}

async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}

// =============================================================================
// DEBOUNCE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn burst_of_schedules_yields_one_fetch_with_last_state() {
    let (controller, source, surface) = setup();

    controller.camera_moved();
    controller.zoom_in();
    controller.zoom_in();

    advance_ms(DEFAULT_DEBOUNCE_MS - 1).await;
    assert!(source.queries().is_empty());

    advance_ms(10).await;
    let queries = source.queries();
    assert_eq!(queries.len(), 1);
    assert!((queries[0].width_deg - 20.0 / 1.6 / 1.6).abs() < 1e-9);
    assert_eq!(queries[0].pixels, controller.view().pixels);
    assert_eq!(surface.mapped(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn forced_update_fires_immediately_and_cancels_pending_timer() {
    let (controller, source, _surface) = setup();

    controller.camera_moved();
    controller.schedule_texture_update(true);

    advance_ms(1).await;
    assert_eq!(source.queries().len(), 1);

    advance_ms(2 * DEFAULT_DEBOUNCE_MS).await;
    assert_eq!(source.queries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn query_center_follows_camera_direction() {
    let (controller, source, surface) = setup();
    *surface.direction.lock().unwrap() = DVec3::new(0.0, 0.0, 1.0);

    controller.start();
    advance_ms(1).await;

    let query = &source.queries()[0];
    assert!((query.center.ra - 90.0).abs() < 1e-9);
    assert!(query.center.dec.abs() < 1e-9);
    assert_eq!(query.projection, "Car");
}

// =============================================================================
// SINGLE FLIGHT + STALE SUPPRESSION
// =============================================================================

#[tokio::test(start_paused = true)]
async fn stale_response_is_discarded_and_latest_view_is_fetched() {
    let (controller, source, surface) = setup();
    let gate = source.push_gated();

    controller.start();
    advance_ms(1).await;
    assert!(controller.is_loading());
    assert_eq!(source.queries().len(), 1);

    // Camera settles elsewhere while the first tile is still loading.
    *surface.direction.lock().unwrap() = DVec3::new(0.0, 0.0, 1.0);
    controller.camera_moved();
    advance_ms(DEFAULT_DEBOUNCE_MS + 10).await;
    assert_eq!(source.queries().len(), 1, "update must be refused while loading");

    gate.send(Ok(png_bytes(4, 4, [255, 0, 0, 255]))).unwrap();
    settle().await;
    advance_ms(1).await;

    let queries = source.queries();
    assert_eq!(queries.len(), 2);
    assert!((queries[1].center.ra - 90.0).abs() < 1e-9);

    assert_eq!(surface.mapped(), vec![1]);
    let statuses = surface.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].center, queries[1].center);
    assert!(surface.alerts().is_empty());
    assert!(!controller.is_loading());
}

#[tokio::test(start_paused = true)]
async fn stale_failure_raises_no_alert() {
    let (controller, source, surface) = setup();
    let gate = source.push_gated();

    controller.start();
    advance_ms(1).await;
    controller.camera_moved();
    advance_ms(DEFAULT_DEBOUNCE_MS + 10).await;

    gate.send(Err(TileError::Status { status: 503 })).unwrap();
    settle().await;
    advance_ms(1).await;

    assert!(surface.alerts().is_empty());
    assert_eq!(source.queries().len(), 2);
    assert_eq!(surface.mapped(), vec![1]);
    assert!(!controller.is_loading());
}

#[tokio::test(start_paused = true)]
async fn direct_update_while_loading_is_noop() {
    let (controller, source, _surface) = setup();
    let _gate = source.push_gated();

    controller.start();
    advance_ms(1).await;
    assert!(controller.is_loading());

    controller.update_sky_texture().await;
    assert_eq!(source.queries().len(), 1);
}

// =============================================================================
// RESULTS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn failure_alerts_and_clears_loading() {
    let (controller, source, surface) = setup();
    source.push_err(503);

    controller.start();
    advance_ms(1).await;

    assert_eq!(surface.alerts(), vec![TILE_FAILURE_ALERT.to_string()]);
    assert!(!controller.is_loading());
    assert!(surface.mapped().is_empty());

    let events = surface.events();
    assert_eq!(events.first(), Some(&Event::Loading(true)));
    assert_eq!(events.last(), Some(&Event::Loading(false)));
}

#[tokio::test(start_paused = true)]
async fn undecodable_tile_alerts() {
    let (controller, source, surface) = setup();
    source
        .replies
        .lock()
        .unwrap()
        .push_back(Reply::Ready(Ok(Bytes::from_static(b"<html>oops</html>"))));

    controller.start();
    advance_ms(1).await;

    assert_eq!(surface.alerts().len(), 1);
    assert!(!controller.is_loading());
}

#[tokio::test(start_paused = true)]
async fn new_texture_disposes_previous() {
    let (controller, _source, surface) = setup();

    controller.start();
    advance_ms(1).await;
    controller.camera_moved();
    advance_ms(DEFAULT_DEBOUNCE_MS + 1).await;

    assert_eq!(surface.mapped(), vec![1, 2]);
    assert_eq!(surface.disposed(), vec![1]);
    assert_eq!(controller.current_texture_id(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn success_updates_status_labels() {
    let (controller, _source, surface) = setup();

    controller.start();
    advance_ms(1).await;

    let statuses = surface.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].center_label(), "Center RA/Dec: 0.00°, 0.00°");
    assert_eq!(statuses[0].zoom_label(), "FoV: 20.00°");
}

// =============================================================================
// ACTIONS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn reset_restores_defaults_and_forces_update() {
    let (controller, source, surface) = setup();

    controller.zoom_in();
    controller.zoom_in();
    controller.reset();
    advance_ms(1).await;

    let queries = source.queries();
    assert_eq!(queries.len(), 1);
    assert!((queries[0].width_deg - 20.0).abs() < 1e-12);
    assert_eq!(queries[0].pixels, 1024);
    assert!(surface.events().contains(&Event::ResetCamera));
    assert_eq!(controller.view(), ViewState::default());
}

#[tokio::test(start_paused = true)]
async fn survey_change_is_immediate() {
    let (controller, source, surface) = setup();

    controller.set_survey("WISE 3.4");
    advance_ms(1).await;

    let queries = source.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].survey, "WISE 3.4");
    assert!(surface.events().contains(&Event::Survey("WISE 3.4".into())));
}

#[tokio::test(start_paused = true)]
async fn zoom_out_is_debounced() {
    let (controller, source, _surface) = setup();

    controller.zoom_out();
    advance_ms(1).await;
    assert!(source.queries().is_empty());

    advance_ms(DEFAULT_DEBOUNCE_MS).await;
    let queries = source.queries();
    assert_eq!(queries.len(), 1);
    assert!((queries[0].width_deg - 32.0).abs() < 1e-9);
    assert_eq!(queries[0].pixels, 787);
}
