//! Tile controller — debounced, single-flight sky texture updates.
//!
//! DESIGN
//! ======
//! Camera drags arrive as bursts of events; only the settled orientation
//! matters. Every `schedule_texture_update` bumps a request token, aborts
//! the pending timer and arms a new one (zero delay when forced). When a
//! timer fires it runs `update_sky_texture`, which is single-flight: while a
//! fetch is loading further updates are refused and remembered, and one
//! forced update runs as soon as the in-flight fetch settles.
//!
//! A completed fetch is applied only if its captured token is still the
//! current one, so a superseded response never touches the texture or the
//! status labels. In-flight fetches are never aborted.
//!
//! OWNERSHIP
//! =========
//! The controller exclusively owns the mapped `SkyTexture`: the surface
//! borrows it for mapping and receives the previous one back for disposal
//! right after the replacement is mapped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use glam::DVec3;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{SkyTexture, TileError, TileQuery, TileSource, decode_tile_off_runtime};
use crate::sky::{RaDec, ViewState, ZoomSettings, direction_to_ra_dec, format_angle};

pub const DEFAULT_DEBOUNCE_MS: u64 = 450;

pub const TILE_FAILURE_ALERT: &str = "Could not retrieve imagery from NASA SkyView. \
Check your network connection and that the backend server is running.";

// =============================================================================
// SETTINGS
// =============================================================================

/// Tunables for the panoramic viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSettings {
    /// Delay between the last interaction and the tile fetch.
    pub debounce: Duration,
    pub zoom: ZoomSettings,
    /// View restored by `reset`.
    pub initial_view: ViewState,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            zoom: ZoomSettings::default(),
            initial_view: ViewState::default(),
        }
    }
}

// =============================================================================
// SURFACE
// =============================================================================

/// Labels shown after a tile has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TileStatus {
    pub center: RaDec,
    pub fov_deg: f64,
}

impl TileStatus {
    #[must_use]
    pub fn center_label(&self) -> String {
        format!("Center RA/Dec: {}, {}", format_angle(self.center.ra), format_angle(self.center.dec))
    }

    #[must_use]
    pub fn zoom_label(&self) -> String {
        format!("FoV: {}", format_angle(self.fov_deg))
    }
}

/// The 3D scene the controller drives: camera, sky-sphere material and the
/// surrounding controls.
pub trait SkySurface: Send + Sync {
    /// Camera forward vector in world space.
    fn camera_direction(&self) -> DVec3;

    fn reset_camera(&self);

    fn map_texture(&self, texture: &SkyTexture);

    /// Release GPU resources of a texture that is no longer mapped.
    fn dispose_texture(&self, texture: SkyTexture);

    /// Toggle the busy overlay and disable the view controls.
    fn set_loading(&self, loading: bool);

    fn show_status(&self, status: &TileStatus);

    fn show_survey(&self, _survey: &str) {}

    /// Blocking user-visible notification.
    fn alert(&self, message: &str);
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Handle to the tile controller. Clones share the same state.
#[derive(Clone)]
pub struct TileController {
    shared: Arc<Shared>,
}

struct Shared {
    source: Arc<dyn TileSource>,
    surface: Arc<dyn SkySurface>,
    settings: ViewerSettings,
    state: Mutex<ControllerState>,
}

struct ControllerState {
    view: ViewState,
    /// A fetch is in flight.
    loading: bool,
    /// Bumped on every scheduled update.
    token: u64,
    timer: Option<PendingTimer>,
    /// An update was refused while loading.
    rerun: bool,
    texture: Option<SkyTexture>,
    next_texture_id: u64,
}

struct PendingTimer {
    token: u64,
    handle: JoinHandle<()>,
}

impl TileController {
    #[must_use]
    pub fn new(source: Arc<dyn TileSource>, surface: Arc<dyn SkySurface>, settings: ViewerSettings) -> Self {
        let state = ControllerState {
            view: settings.initial_view.clone(),
            loading: false,
            token: 0,
            timer: None,
            rerun: false,
            texture: None,
            next_texture_id: 0,
        };
        Self { shared: Arc::new(Shared { source, surface, settings, state: Mutex::new(state) }) }
    }

    /// Kick off the first load.
    pub fn start(&self) {
        self.schedule_texture_update(true);
    }

    /// Arm the debounce timer, replacing any pending one. Must be called
    /// from within a tokio runtime.
    pub fn schedule_texture_update(&self, force: bool) {
        self.shared.schedule(force);
    }

    /// Fetch and apply a tile for the current camera direction, unless one
    /// is already loading.
    pub async fn update_sky_texture(&self) {
        self.shared.update().await;
    }

    /// Camera controls finished a drag.
    pub fn camera_moved(&self) {
        self.schedule_texture_update(false);
    }

    pub fn zoom_in(&self) {
        {
            let mut state = self.shared.lock();
            state.view.zoom_in(&self.shared.settings.zoom);
        }
        self.schedule_texture_update(false);
    }

    pub fn zoom_out(&self) {
        {
            let mut state = self.shared.lock();
            state.view.zoom_out(&self.shared.settings.zoom);
        }
        self.schedule_texture_update(false);
    }

    pub fn reset(&self) {
        {
            let mut state = self.shared.lock();
            state.view = self.shared.settings.initial_view.clone();
        }
        self.shared.surface.reset_camera();
        self.schedule_texture_update(true);
    }

    pub fn set_survey(&self, survey: &str) {
        {
            let mut state = self.shared.lock();
            state.view.set_survey(survey);
        }
        self.shared.surface.show_survey(survey);
        self.schedule_texture_update(true);
    }

    #[must_use]
    pub fn view(&self) -> ViewState {
        self.shared.lock().view.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.shared.lock().loading
    }

    /// Id of the texture currently mapped on the surface.
    #[must_use]
    pub fn current_texture_id(&self) -> Option<u64> {
        self.shared.lock().texture.as_ref().map(|t| t.id)
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule(self: &Arc<Self>, force: bool) {
        let delay = if force { Duration::ZERO } else { self.settings.debounce };

        let mut state = self.lock();
        state.token += 1;
        let token = state.token;
        if let Some(previous) = state.timer.take() {
            previous.handle.abort();
        }

        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // EDGE: a reschedule may land after the sleep but before this
            // task is polled again; only the current timer may proceed.
            if shared.take_timer(token) {
                shared.update().await;
            }
        });
        state.timer = Some(PendingTimer { token, handle });
        debug!(token, delay_ms = delay.as_millis(), "tile update scheduled");
    }

    fn take_timer(&self, token: u64) -> bool {
        let mut state = self.lock();
        if state.timer.as_ref().is_some_and(|t| t.token == token) {
            state.timer = None;
            true
        } else {
            false
        }
    }

    async fn update(self: &Arc<Self>) {
        let direction = self.surface.camera_direction();
        let (query, token) = {
            let mut state = self.lock();
            if state.loading {
                state.rerun = true;
                debug!("tile fetch in flight; deferring update");
                return;
            }
            state.loading = true;
            (TileQuery::new(direction_to_ra_dec(direction), &state.view), state.token)
        };

        self.surface.set_loading(true);
        let guard = LoadingGuard { shared: self };

        info!(
            survey = %query.survey,
            ra = query.center.ra,
            dec = query.center.dec,
            width = query.width_deg,
            pixels = query.pixels,
            "requesting sky tile"
        );
        let started = Instant::now();

        match self.fetch_texture(&query).await {
            Ok(image) => self.apply_texture(token, &query, image, started),
            Err(e) => self.report_failure(token, &e),
        }

        drop(guard);

        let rerun = std::mem::take(&mut self.lock().rerun);
        if rerun {
            self.schedule(true);
        }
    }

    async fn fetch_texture(&self, query: &TileQuery) -> Result<image::RgbaImage, TileError> {
        let bytes = self.source.fetch_tile(query).await?;
        decode_tile_off_runtime(bytes).await
    }

    fn apply_texture(&self, token: u64, query: &TileQuery, image: image::RgbaImage, started: Instant) {
        let texture = {
            let mut state = self.lock();
            if state.token != token {
                debug!(token, current = state.token, "discarding stale sky tile");
                return;
            }
            state.next_texture_id += 1;
            SkyTexture { id: state.next_texture_id, image }
        };

        self.surface.map_texture(&texture);
        let previous = self.lock().texture.replace(texture);
        if let Some(old) = previous {
            self.surface.dispose_texture(old);
        }

        self.surface.show_status(&TileStatus { center: query.center, fov_deg: query.width_deg });
        info!(elapsed_ms = started.elapsed().as_millis(), "sky tile applied");
    }

    fn report_failure(&self, token: u64, err: &TileError) {
        if self.lock().token != token {
            debug!(error = %err, "ignoring failure of stale sky tile request");
            return;
        }
        error!(error = %err, retryable = err.retryable(), "sky tile request failed");
        self.surface.alert(TILE_FAILURE_ALERT);
    }
}

/// Clears the in-flight flag and busy indicator on every exit path.
struct LoadingGuard<'a> {
    shared: &'a Shared,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.shared.lock().loading = false;
        self.shared.surface.set_loading(false);
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
