//! Field of view, tile resolution and survey selection.
//!
//! DESIGN
//! ======
//! Zooming scales the angular size geometrically and the pixel resolution
//! inversely by a smaller ratio, so tiles get sharper as the field narrows.
//! Every mutation re-clamps: width and height stay equal within
//! [`MIN_FOV_DEG`, `MAX_FOV_DEG`] and pixels within [`MIN_PIXELS`, `MAX_PIXELS`].

use serde::{Deserialize, Serialize};

pub const MIN_FOV_DEG: f64 = 0.5;
pub const MAX_FOV_DEG: f64 = 360.0;
pub const MIN_PIXELS: u32 = 384;
pub const MAX_PIXELS: u32 = 2048;

pub const DEFAULT_FOV_DEG: f64 = 20.0;
pub const DEFAULT_PIXELS: u32 = 1024;
pub const DEFAULT_SURVEY: &str = "DSS2 Red";

pub const DEFAULT_FOV_ZOOM_RATIO: f64 = 1.6;
pub const DEFAULT_PIXEL_ZOOM_RATIO: f64 = 1.3;

/// Zoom step ratios. Tuned values, kept configurable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomSettings {
    pub fov_ratio: f64,
    pub pixel_ratio: f64,
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self { fov_ratio: DEFAULT_FOV_ZOOM_RATIO, pixel_ratio: DEFAULT_PIXEL_ZOOM_RATIO }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub width_deg: f64,
    pub height_deg: f64,
    pub pixels: u32,
    pub survey: String,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(DEFAULT_FOV_DEG, DEFAULT_PIXELS, DEFAULT_SURVEY)
    }
}

impl ViewState {
    /// Build a clamped view state with a square field of view.
    #[must_use]
    pub fn new(fov_deg: f64, pixels: u32, survey: impl Into<String>) -> Self {
        let fov = clamp_fov(fov_deg);
        Self { width_deg: fov, height_deg: fov, pixels: pixels.clamp(MIN_PIXELS, MAX_PIXELS), survey: survey.into() }
    }

    pub fn zoom_in(&mut self, zoom: &ZoomSettings) {
        let fov = clamp_fov(self.width_deg / zoom.fov_ratio);
        self.width_deg = fov;
        self.height_deg = fov;
        self.pixels = clamp_pixels((f64::from(self.pixels) * zoom.pixel_ratio).round());
    }

    pub fn zoom_out(&mut self, zoom: &ZoomSettings) {
        let fov = clamp_fov(self.width_deg * zoom.fov_ratio);
        self.width_deg = fov;
        self.height_deg = fov;
        self.pixels = clamp_pixels((f64::from(self.pixels) / zoom.pixel_ratio).floor());
    }

    pub fn set_survey(&mut self, survey: impl Into<String>) {
        self.survey = survey.into();
    }
}

fn clamp_fov(value: f64) -> f64 {
    if value.is_nan() {
        return DEFAULT_FOV_DEG;
    }
    value.clamp(MIN_FOV_DEG, MAX_FOV_DEG)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_pixels(value: f64) -> u32 {
    // Saturating float → int cast; the clamp keeps it in range afterwards.
    (value as u32).clamp(MIN_PIXELS, MAX_PIXELS)
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
