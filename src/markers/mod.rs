//! Annotated markers placed on the sky map.
//!
//! DESIGN
//! ======
//! Click payloads from the map widget come in several shapes; positions are
//! extracted through fixed, ordered alias lists rather than probing fields
//! ad hoc. The widget's marker layer is reached through `MarkerSurface`,
//! whose removal methods are optional capabilities with "unsupported"
//! defaults so the controller can rank them.

pub mod controller;
pub mod icon;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::sky::RaDec;

pub use controller::{MarkerController, RemovalStrategy};
pub use icon::{MarkerColor, MarkerIcon};

/// Longitude field names, highest priority first.
pub const RA_ALIASES: [&str; 4] = ["ra", "lon", "lng", "alpha"];

/// Latitude field names, highest priority first.
pub const DEC_ALIASES: [&str; 3] = ["dec", "lat", "beta"];

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerMode {
    Idle,
    /// Waiting for a map click.
    Armed,
    /// Click captured, entry form open.
    Pending,
}

/// A placed marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub id: Uuid,
    pub position: RaDec,
    pub title: String,
    pub description: String,
    pub color: MarkerColor,
}

/// Raw values submitted from the marker entry form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MarkerForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
}

/// Opaque handle to a marker layer created on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

// =============================================================================
// SURFACE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// The surface does not expose this capability.
    #[error("unsupported capability: {0}")]
    Unsupported(&'static str),

    /// The surface call itself failed.
    #[error("surface call failed: {0}")]
    Failed(String),
}

/// Map widget operations used by the marker controller.
pub trait MarkerSurface {
    /// The widget has finished its asynchronous initialisation.
    fn is_ready(&self) -> bool;

    /// # Errors
    ///
    /// Returns an error if the widget cannot create or attach the layer.
    fn create_layer(&self, name: &str) -> Result<LayerId, SurfaceError>;

    /// Add a marker, drawn with `icon` when given.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Unsupported`] when custom icons are not
    /// available, or a failure from the widget.
    fn add_marker(&self, layer: LayerId, marker: &MarkerRecord, icon: Option<&MarkerIcon>) -> Result<(), SurfaceError>;

    /// # Errors
    ///
    /// Unsupported unless the widget can remove a single source object.
    fn remove_source(&self, _layer: LayerId, _marker: &MarkerRecord) -> Result<(), SurfaceError> {
        Err(SurfaceError::Unsupported("remove_source"))
    }

    /// # Errors
    ///
    /// Unsupported unless the widget can remove sources by id.
    fn remove_by_id(&self, _layer: LayerId, _id: Uuid) -> Result<(), SurfaceError> {
        Err(SurfaceError::Unsupported("remove_by_id"))
    }

    /// # Errors
    ///
    /// Unsupported unless the widget can clear a whole layer.
    fn clear_layer(&self, _layer: LayerId) -> Result<(), SurfaceError> {
        Err(SurfaceError::Unsupported("clear_layer"))
    }
}

/// Page controls around the map: hint line, placement trigger, entry form.
pub trait MarkerUi {
    fn show_hint(&self, message: &str);
    fn clear_hint(&self);
    fn set_placement_enabled(&self, enabled: bool);
    fn open_form(&self, position: RaDec);
    fn close_form(&self);
}

// =============================================================================
// COORDINATE EXTRACTION
// =============================================================================

/// Extract a sky position from a map click payload.
///
/// Each component is looked up through its alias list in order; the first
/// alias holding a finite number wins. Returns `None` if either component
/// is missing.
#[must_use]
pub fn extract_position(payload: &Value) -> Option<RaDec> {
    let ra = first_finite(payload, &RA_ALIASES)?;
    let dec = first_finite(payload, &DEC_ALIASES)?;
    Some(RaDec::new(ra, dec))
}

fn first_finite(payload: &Value, aliases: &[&str]) -> Option<f64> {
    aliases
        .iter()
        .filter_map(|key| payload.get(*key).and_then(Value::as_f64))
        .find(|v| v.is_finite())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
