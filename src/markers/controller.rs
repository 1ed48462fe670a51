//! Marker placement controller.
//!
//! STATE MACHINE
//! =============
//! ```text
//! Idle    --start_placement-->          Armed
//! Armed   --start_placement / cancel--> Idle
//! Armed   --map_clicked(position)-->    Pending   (form opens)
//! Pending --submit_marker-->            Idle      (marker appended)
//! Pending --cancel_form / Escape-->     Idle
//! ```
//!
//! Input that does not match the current mode is ignored without side
//! effects. Leaving `Pending` always closes the form and re-enables the
//! placement trigger, whatever happened on the surface.
//!
//! REMOVAL
//! =======
//! `remove_latest` pops the newest record and walks `REMOVAL_ORDER` from the
//! finest to the coarsest capability until one succeeds. Clearing the whole
//! layer also resets the local list so both sides stay in sync.

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::icon::{DEFAULT_ICON_DIAMETER, MarkerColor, MarkerIcon};
use super::{LayerId, MarkerForm, MarkerMode, MarkerRecord, MarkerSurface, MarkerUi, SurfaceError, extract_position};
use crate::sky::RaDec;

pub const MARKER_LAYER_NAME: &str = "Markers";
pub const PLACEMENT_HINT: &str = "Click on the map to place a marker (Esc to cancel).";

/// Removal capabilities, finest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalStrategy {
    RemoveSource,
    RemoveById,
    ClearLayer,
}

pub const REMOVAL_ORDER: [RemovalStrategy; 3] =
    [RemovalStrategy::RemoveSource, RemovalStrategy::RemoveById, RemovalStrategy::ClearLayer];

pub struct MarkerController<S, U> {
    surface: S,
    ui: U,
    mode: MarkerMode,
    layer: Option<LayerId>,
    pending: Option<RaDec>,
    markers: Vec<MarkerRecord>,
}

impl<S: MarkerSurface, U: MarkerUi> MarkerController<S, U> {
    pub fn new(surface: S, ui: U) -> Self {
        Self { surface, ui, mode: MarkerMode::Idle, layer: None, pending: None, markers: Vec::new() }
    }

    #[must_use]
    pub fn mode(&self) -> MarkerMode {
        self.mode
    }

    #[must_use]
    pub fn markers(&self) -> &[MarkerRecord] {
        &self.markers
    }

    /// Position captured by the last accepted click, while `Pending`.
    #[must_use]
    pub fn pending_position(&self) -> Option<RaDec> {
        self.pending
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[must_use]
    pub fn ui(&self) -> &U {
        &self.ui
    }

    /// Arm placement, or disarm when already armed.
    pub fn start_placement(&mut self) -> MarkerMode {
        match self.mode {
            MarkerMode::Armed => {
                self.cancel();
            }
            MarkerMode::Pending => {
                debug!("placement trigger ignored while the marker form is open");
            }
            MarkerMode::Idle => {
                if !self.surface.is_ready() {
                    warn!("map is not initialised yet; marker placement unavailable");
                    return self.mode;
                }
                if self.ensure_layer().is_none() {
                    return self.mode;
                }
                self.mode = MarkerMode::Armed;
                self.ui.show_hint(PLACEMENT_HINT);
            }
        }
        self.mode
    }

    /// Disarm placement without creating a marker.
    pub fn cancel(&mut self) {
        if self.mode == MarkerMode::Armed {
            self.mode = MarkerMode::Idle;
            self.ui.clear_hint();
        }
    }

    /// Handle a click on the map. Only acts while armed.
    pub fn map_clicked(&mut self, payload: &Value) {
        if self.mode != MarkerMode::Armed {
            return;
        }
        let Some(position) = extract_position(payload) else {
            debug!(%payload, "map click without usable coordinates");
            return;
        };

        self.pending = Some(position);
        self.mode = MarkerMode::Pending;
        self.ui.clear_hint();
        self.ui.set_placement_enabled(false);
        self.ui.open_form(position);
    }

    /// Create a marker from the submitted form. Only acts while pending.
    pub fn submit_marker(&mut self, form: &MarkerForm) -> Option<&MarkerRecord> {
        if self.mode != MarkerMode::Pending {
            return None;
        }
        let position = self.pending.take()?;

        let title = match form.title.trim() {
            "" => format!("Marker {}", self.markers.len() + 1),
            t => t.to_string(),
        };
        let color = resolve_color(&form.color);
        let record = MarkerRecord {
            id: Uuid::new_v4(),
            position,
            title,
            description: form.description.trim().to_string(),
            color,
        };

        if let Some(layer) = self.layer {
            self.add_to_surface(layer, &record);
        } else {
            warn!(title = %record.title, "no marker layer; marker kept locally only");
        }
        info!(title = %record.title, ra = position.ra, dec = position.dec, "marker placed");
        self.markers.push(record);

        self.close_form();
        self.markers.last()
    }

    /// Dismiss the form without creating a marker.
    pub fn cancel_form(&mut self) {
        if self.mode == MarkerMode::Pending {
            self.pending = None;
            self.close_form();
        }
    }

    /// Keyboard input while the page has focus. Returns whether it was handled.
    pub fn handle_key(&mut self, key: &str) -> bool {
        match (key, self.mode) {
            ("Escape", MarkerMode::Pending) => {
                self.cancel_form();
                true
            }
            ("Escape", MarkerMode::Armed) => {
                self.cancel();
                true
            }
            _ => false,
        }
    }

    /// Remove the most recently placed marker.
    pub fn remove_latest(&mut self) -> Option<MarkerRecord> {
        let record = self.markers.pop()?;
        let Some(layer) = self.layer else {
            return Some(record);
        };

        for strategy in REMOVAL_ORDER {
            match self.try_remove(strategy, layer, &record) {
                Ok(()) => {
                    if strategy == RemovalStrategy::ClearLayer {
                        self.markers.clear();
                    }
                    debug!(?strategy, title = %record.title, "marker removed");
                    return Some(record);
                }
                Err(SurfaceError::Unsupported(capability)) => {
                    debug!(capability, "marker removal capability unavailable");
                }
                Err(e) => {
                    warn!(?strategy, error = %e, "marker removal failed; trying coarser fallback");
                }
            }
        }

        warn!(title = %record.title, "no removal capability succeeded; marker may remain on the map");
        Some(record)
    }

    fn try_remove(&self, strategy: RemovalStrategy, layer: LayerId, record: &MarkerRecord) -> Result<(), SurfaceError> {
        match strategy {
            RemovalStrategy::RemoveSource => self.surface.remove_source(layer, record),
            RemovalStrategy::RemoveById => self.surface.remove_by_id(layer, record.id),
            RemovalStrategy::ClearLayer => self.surface.clear_layer(layer),
        }
    }

    fn ensure_layer(&mut self) -> Option<LayerId> {
        if self.layer.is_none() {
            match self.surface.create_layer(MARKER_LAYER_NAME) {
                Ok(layer) => self.layer = Some(layer),
                Err(e) => warn!(error = %e, "failed to create marker layer"),
            }
        }
        self.layer
    }

    fn add_to_surface(&self, layer: LayerId, record: &MarkerRecord) {
        let icon = MarkerIcon::filled_circle(&record.color, DEFAULT_ICON_DIAMETER);
        let Err(e) = self.surface.add_marker(layer, record, Some(&icon)) else {
            return;
        };
        warn!(error = %e, "custom marker icon unavailable; using default marker");

        if let Err(e) = self.surface.add_marker(layer, record, None) {
            warn!(error = %e, title = %record.title, "failed to add marker to the map");
        }
    }

    fn close_form(&mut self) {
        self.ui.close_form();
        self.ui.set_placement_enabled(true);
        self.mode = MarkerMode::Idle;
    }
}

fn resolve_color(input: &str) -> MarkerColor {
    if input.trim().is_empty() {
        return MarkerColor::default();
    }
    MarkerColor::parse(input).unwrap_or_else(|| {
        warn!(color = input, "unparsable marker color; using default");
        MarkerColor::default()
    })
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
