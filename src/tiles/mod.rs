//! Tiles — query building, fetching and decoding of sky imagery.
//!
//! DESIGN
//! ======
//! The tile endpoint is an opaque `GET /tile?...` returning image bytes.
//! `TileSource` is the seam the controller fetches through; the HTTP
//! implementation lives here and tests substitute their own.

pub mod controller;

use std::time::Duration;

use bytes::Bytes;
use image::RgbaImage;
use serde::Serialize;

use crate::sky::{RaDec, ViewState};

pub use controller::{SkySurface, TileController, TileStatus, ViewerSettings};

/// Projection requested for panoramic tiles (plate carrée).
pub const TILE_PROJECTION: &str = "Car";
pub const DEFAULT_TILE_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TILE_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TILE_CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TileError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("tile request failed: {0}")]
    Request(String),

    /// The tile endpoint answered with a non-success status.
    #[error("tile request failed ({status})")]
    Status { status: u16 },

    /// The response body is not a decodable image.
    #[error("tile decode failed: {0}")]
    Decode(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl TileError {
    /// Transient failures worth retrying by re-triggering the same action.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { status: 408 | 429 | 500..=599 })
    }
}

// =============================================================================
// QUERY
// =============================================================================

/// Parameters of a single tile request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileQuery {
    pub center: RaDec,
    pub width_deg: f64,
    pub height_deg: f64,
    pub pixels: u32,
    pub survey: String,
    pub projection: &'static str,
}

impl TileQuery {
    #[must_use]
    pub fn new(center: RaDec, view: &ViewState) -> Self {
        Self {
            center,
            width_deg: view.width_deg,
            height_deg: view.height_deg,
            pixels: view.pixels,
            survey: view.survey.clone(),
            projection: TILE_PROJECTION,
        }
    }

    /// Query-string pairs in the order the tile endpoint documents them.
    #[must_use]
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ra", format!("{:.6}", self.center.ra)),
            ("dec", format!("{:.6}", self.center.dec)),
            ("width", format!("{:.4}", self.width_deg)),
            ("height", format!("{:.4}", self.height_deg)),
            ("pixels", self.pixels.to_string()),
            ("survey", self.survey.clone()),
            ("projection", self.projection.to_string()),
        ]
    }
}

// =============================================================================
// SOURCE
// =============================================================================

/// Anything that can turn a [`TileQuery`] into encoded image bytes.
#[async_trait::async_trait]
pub trait TileSource: Send + Sync {
    async fn fetch_tile(&self, query: &TileQuery) -> Result<Bytes, TileError>;
}

/// Tile source backed by the `/tile` HTTP endpoint.
pub struct HttpTileSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTileSource {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, request_timeout: Duration, connect_timeout: Duration) -> Result<Self, TileError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TileError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_defaults(base_url: &str) -> Result<Self, TileError> {
        Self::new(
            base_url,
            Duration::from_secs(DEFAULT_TILE_REQUEST_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_TILE_CONNECT_TIMEOUT_SECS),
        )
    }

    #[must_use]
    pub fn tile_url(&self) -> String {
        format!("{}/tile", self.base_url)
    }
}

#[async_trait::async_trait]
impl TileSource for HttpTileSource {
    async fn fetch_tile(&self, query: &TileQuery) -> Result<Bytes, TileError> {
        let response = self
            .http
            .get(self.tile_url())
            .query(&query.to_params())
            .send()
            .await
            .map_err(|e| TileError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TileError::Status { status: status.as_u16() });
        }

        response
            .bytes()
            .await
            .map_err(|e| TileError::Request(e.to_string()))
    }
}

// =============================================================================
// TEXTURE
// =============================================================================

/// A decoded tile bitmap ready to be mapped onto the sky sphere.
#[derive(Debug, Clone)]
pub struct SkyTexture {
    /// Monotonic per-controller id, used by surfaces to track disposal.
    pub id: u64,
    pub image: RgbaImage,
}

/// Decode encoded tile bytes (PNG/JPEG) into an RGBA bitmap.
///
/// # Errors
///
/// Returns [`TileError::Decode`] if the bytes are not a supported image.
pub fn decode_tile(bytes: &[u8]) -> Result<RgbaImage, TileError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| TileError::Decode(e.to_string()))
}

/// Bodies up to this size decode in place; larger ones go to the blocking pool.
pub const INLINE_DECODE_LIMIT: usize = 64 * 1024;

/// [`decode_tile`] without stalling the async runtime on large tiles.
///
/// # Errors
///
/// Returns [`TileError::Decode`] if the bytes are not a supported image or the
/// decode task is cancelled.
pub async fn decode_tile_off_runtime(bytes: Bytes) -> Result<RgbaImage, TileError> {
    if bytes.len() <= INLINE_DECODE_LIMIT {
        return decode_tile(&bytes);
    }
    tokio::task::spawn_blocking(move || decode_tile(&bytes))
        .await
        .map_err(|e| TileError::Decode(e.to_string()))?
}


#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
