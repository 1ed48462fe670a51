//! `/tile` handler — SkyView cutouts as PNG.
//!
//! ERROR HANDLING
//! ==============
//! Bad query parameters answer 422 and upstream or disk failures answer 500,
//! both as `{"detail": "..."}`.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::skyview::{CutoutRequest, DEFAULT_SURVEY};
use crate::state::AppState;
use crate::tiles::TILE_PROJECTION;

pub const DEFAULT_TILE_WIDTH_DEG: f64 = 60.0;
pub const DEFAULT_TILE_PIXELS: u32 = 1024;
pub const MIN_TILE_PIXELS_EXCLUSIVE: u32 = 32;
pub const MAX_TILE_PIXELS: u32 = 8192;

#[derive(Debug, Clone, Deserialize)]
pub struct TileParams {
    pub target: Option<String>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    #[serde(default = "default_width")]
    pub width: f64,
    pub height: Option<f64>,
    #[serde(default = "default_pixels")]
    pub pixels: u32,
    #[serde(default = "default_survey")]
    pub survey: String,
    #[serde(default = "default_projection")]
    pub projection: String,
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
}

fn default_width() -> f64 {
    DEFAULT_TILE_WIDTH_DEG
}

fn default_pixels() -> u32 {
    DEFAULT_TILE_PIXELS
}

fn default_survey() -> String {
    DEFAULT_SURVEY.to_string()
}

fn default_projection() -> String {
    TILE_PROJECTION.to_string()
}

fn default_overwrite() -> bool {
    true
}

impl TileParams {
    /// Check ranges and build the upstream request.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message for out-of-range or missing parameters.
    pub fn into_request(self) -> Result<CutoutRequest, String> {
        let has_target = self.target.as_deref().is_some_and(|t| !t.trim().is_empty());
        if !has_target && (self.ra.is_none() || self.dec.is_none()) {
            return Err("Provide either target or (ra, dec)".into());
        }
        if !has_target && !(self.ra.is_some_and(f64::is_finite) && self.dec.is_some_and(f64::is_finite)) {
            return Err("ra and dec must be finite numbers".into());
        }
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err("width must be greater than 0".into());
        }
        if self.height.is_some_and(|h| !(h.is_finite() && h > 0.0)) {
            return Err("height must be greater than 0".into());
        }
        if self.pixels <= MIN_TILE_PIXELS_EXCLUSIVE || self.pixels > MAX_TILE_PIXELS {
            return Err(format!(
                "pixels must be greater than {MIN_TILE_PIXELS_EXCLUSIVE} and at most {MAX_TILE_PIXELS}"
            ));
        }

        Ok(CutoutRequest {
            target: self.target.filter(|_| has_target),
            ra: self.ra,
            dec: self.dec,
            survey: self.survey,
            width_deg: self.width,
            height_deg: self.height,
            pixels: self.pixels,
            projection: self.projection,
            overwrite: self.overwrite,
            include_fits: false,
        })
    }
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

/// Render (or reuse) a SkyView cutout and stream the PNG back.
pub async fn get_tile(State(state): State<AppState>, params: Result<Query<TileParams>, QueryRejection>) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return detail(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text()),
    };
    let request = match params.into_request() {
        Ok(request) => request,
        Err(message) => return detail(StatusCode::UNPROCESSABLE_ENTITY, message),
    };

    info!(
        survey = %request.survey,
        target = request.target.as_deref().unwrap_or("(RA/Dec)"),
        ra = request.ra,
        dec = request.dec,
        width = request.width_deg,
        height = request.height_deg,
        pixels = request.pixels,
        "requesting tile"
    );

    let product = match state.cutouts.fetch_cutout(&request).await {
        Ok(product) => product,
        Err(e) if e.is_invalid_input() => return detail(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        Err(e) => {
            error!(error = %e, "SkyView tile request failed");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    info!(path = %product.png_path.display(), cached = product.cached, "tile ready");
    (StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], product.png).into_response()
}

#[cfg(test)]
#[path = "tile_test.rs"]
mod tests;
