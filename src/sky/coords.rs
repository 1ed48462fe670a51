//! Camera direction → equatorial coordinates.
//!
//! DESIGN
//! ======
//! The viewer sits at the centre of an inward-facing sky sphere. Longitude
//! is measured with `atan2(z, -x)` and normalised to [0, 360); latitude is
//! the arcsine of the clamped y-component. Directions need not be unit
//! length; degenerate or non-finite vectors collapse to the zero vector and
//! still yield finite coordinates.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Equatorial position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaDec {
    pub ra: f64,
    pub dec: f64,
}

impl RaDec {
    #[must_use]
    pub const fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.ra.is_finite() && self.dec.is_finite()
    }
}

/// Convert a camera forward vector into (RA, Dec).
#[must_use]
pub fn direction_to_ra_dec(direction: DVec3) -> RaDec {
    let dir = direction.normalize_or_zero();

    let mut ra = dir.z.atan2(-dir.x).to_degrees();
    if ra < 0.0 {
        ra += 360.0;
    }
    // EDGE: a tiny negative angle plus 360 rounds to exactly 360.
    if ra >= 360.0 {
        ra -= 360.0;
    }

    let dec = dir.y.clamp(-1.0, 1.0).asin().to_degrees();
    RaDec { ra, dec }
}

/// Render an angle for status labels, e.g. `12.35°`.
#[must_use]
pub fn format_angle(value: f64) -> String {
    format!("{value:.2}°")
}

#[cfg(test)]
#[path = "coords_test.rs"]
mod tests;
