//! SkyView — upstream cutout client for NASA SkyView.
//!
//! DESIGN
//! ======
//! Cutouts are rendered by SkyView's `runquery.pl` and written to an output
//! directory under [`cutout_stem`] (`.png`, plus `.fits` when requested). The
//! stem carries the signed coordinates, survey, size, pixels and projection,
//! so two files share a name only when SkyView would render the same image.
//! With `overwrite` disabled an existing PNG is served from disk without
//! contacting SkyView.
//!
//! Files are written to a unique `.part` file and renamed into place, and the
//! product carries the PNG bytes it reports. Concurrent requests for the same
//! stem never observe a half-written tile.
//!
//! ERROR HANDLING
//! ==============
//! Invalid requests are rejected before any network call. Upstream failures
//! carry enough detail to be surfaced verbatim to the caller.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::info;

pub use crate::sky::view::DEFAULT_SURVEY;

pub const DEFAULT_SKYVIEW_URL: &str = "https://skyview.gsfc.nasa.gov/current/cgi/runquery.pl";
pub const DEFAULT_CUTOUT_WIDTH_DEG: f64 = 0.5;
pub const DEFAULT_CUTOUT_PIXELS: u32 = 600;
pub const DEFAULT_CUTOUT_PROJECTION: &str = "Tan";
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";
pub const DEFAULT_SKYVIEW_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SKYVIEW_CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SkyViewError {
    #[error("Provide either target or (ra, dec)")]
    MissingPosition,

    #[error("invalid cutout request: {0}")]
    InvalidRequest(String),

    #[error("SkyView request failed: {0}")]
    Request(String),

    #[error("SkyView request failed ({status})")]
    Status { status: u16 },

    #[error("SkyView returned no image for {position} in {survey}")]
    Empty { position: String, survey: String },

    #[error("cutout file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl SkyViewError {
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { status: 408 | 429 | 500..=599 })
    }

    /// Errors caused by the request itself rather than the upstream service.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::MissingPosition | Self::InvalidRequest(_))
    }
}

// =============================================================================
// REQUEST / PRODUCT
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CutoutRequest {
    /// Named target resolvable by SIMBAD/NED, e.g. `M51`.
    pub target: Option<String>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    pub survey: String,
    pub width_deg: f64,
    /// Falls back to `width_deg`.
    pub height_deg: Option<f64>,
    pub pixels: u32,
    pub projection: String,
    pub overwrite: bool,
    /// Also download the raw FITS file.
    pub include_fits: bool,
}

impl Default for CutoutRequest {
    fn default() -> Self {
        Self {
            target: None,
            ra: None,
            dec: None,
            survey: DEFAULT_SURVEY.into(),
            width_deg: DEFAULT_CUTOUT_WIDTH_DEG,
            height_deg: None,
            pixels: DEFAULT_CUTOUT_PIXELS,
            projection: DEFAULT_CUTOUT_PROJECTION.into(),
            overwrite: true,
            include_fits: false,
        }
    }
}

impl CutoutRequest {
    /// The `Position` string sent to SkyView.
    ///
    /// # Errors
    ///
    /// Returns [`SkyViewError::MissingPosition`] without a target or a full
    /// RA/Dec pair.
    pub fn position(&self) -> Result<String, SkyViewError> {
        if let Some(target) = self.target.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Ok(target.to_string());
        }
        match (self.ra, self.dec) {
            (Some(ra), Some(dec)) => Ok(format!("{ra} {dec}")),
            _ => Err(SkyViewError::MissingPosition),
        }
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.height_deg.unwrap_or(self.width_deg)
    }

    /// # Errors
    ///
    /// Returns an error for missing positions, non-positive sizes or
    /// non-finite coordinates.
    pub fn validate(&self) -> Result<String, SkyViewError> {
        let position = self.position()?;
        if self.pixels == 0 {
            return Err(SkyViewError::InvalidRequest("pixels must be positive".into()));
        }
        let (width, height) = (self.width_deg, self.height());
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(SkyViewError::InvalidRequest("width/height must be positive".into()));
        }
        let named = self.target.as_deref().is_some_and(|t| !t.trim().is_empty());
        if !named && !self.ra.zip(self.dec).is_some_and(|(r, d)| r.is_finite() && d.is_finite()) {
            return Err(SkyViewError::InvalidRequest("ra/dec must be finite".into()));
        }
        Ok(position)
    }
}

/// Files produced for one cutout request.
#[derive(Debug, Clone, PartialEq)]
pub struct CutoutProduct {
    pub png_path: PathBuf,
    pub fits_path: Option<PathBuf>,
    pub position: String,
    pub survey: String,
    pub width_deg: f64,
    pub height_deg: f64,
    pub pixels: u32,
    /// Served from disk without contacting SkyView.
    pub cached: bool,
    /// Contents of `png_path` as written or reused by this request.
    pub png: Bytes,
}

/// Lowercase, collapse every run of non-alphanumerics to `-`, trim dashes.
#[must_use]
pub fn safe_slug(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for ch in value.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() { "skyview".to_string() } else { slug.to_string() }
}

/// File stem for the cutout of `request` at the resolved `position`.
///
/// Coordinates keep their sign and decimal point (`p10.000000_m20.000000`);
/// named targets are slugged.
#[must_use]
pub fn cutout_stem(request: &CutoutRequest, position: &str) -> String {
    let named = request.target.as_deref().is_some_and(|t| !t.trim().is_empty());
    let place = match (request.ra, request.dec) {
        (Some(ra), Some(dec)) if !named => format!("{}_{}", signed_key(ra), signed_key(dec)),
        _ => safe_slug(position),
    };
    format!(
        "{place}-{}-{:.4}x{:.4}-{}px-{}",
        safe_slug(&request.survey),
        request.width_deg,
        request.height(),
        request.pixels,
        safe_slug(&request.projection)
    )
}

fn signed_key(value: f64) -> String {
    format!("{value:+.6}").replace('+', "p").replace('-', "m")
}

/// Write `body` next to `path` and rename it into place.
async fn write_atomic(path: &Path, body: &[u8]) -> Result<(), SkyViewError> {
    let part = path.with_extension(format!("{}.part", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&part, body).await?;
    if let Err(e) = tokio::fs::rename(&part, path).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(e.into());
    }
    Ok(())
}

// =============================================================================
// PROVIDER
// =============================================================================

#[async_trait::async_trait]
pub trait CutoutProvider: Send + Sync {
    async fn fetch_cutout(&self, request: &CutoutRequest) -> Result<CutoutProduct, SkyViewError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReturnFormat {
    Png,
    Fits,
}

impl ReturnFormat {
    fn as_str(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Fits => "FITS",
        }
    }
}

pub struct SkyViewClient {
    http: reqwest::Client,
    base_url: String,
    output_dir: PathBuf,
}

impl SkyViewClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        output_dir: impl Into<PathBuf>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, SkyViewError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SkyViewError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.to_string(), output_dir: output_dir.into() })
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn download(
        &self,
        request: &CutoutRequest,
        position: &str,
        format: ReturnFormat,
    ) -> Result<Bytes, SkyViewError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&query_params(request, position, format))
            .send()
            .await
            .map_err(|e| SkyViewError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SkyViewError::Status { status: status.as_u16() });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SkyViewError::Request(e.to_string()))?;
        if body.is_empty() {
            return Err(SkyViewError::Empty { position: position.to_string(), survey: request.survey.clone() });
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl CutoutProvider for SkyViewClient {
    async fn fetch_cutout(&self, request: &CutoutRequest) -> Result<CutoutProduct, SkyViewError> {
        let position = request.validate()?;
        let stem = cutout_stem(request, &position);
        let png_path = self.output_dir.join(format!("{stem}.png"));
        let fits_path = request.include_fits.then(|| self.output_dir.join(format!("{stem}.fits")));

        let product = |png: Bytes, cached: bool| CutoutProduct {
            png_path: png_path.clone(),
            fits_path: fits_path.clone(),
            position: position.clone(),
            survey: request.survey.clone(),
            width_deg: request.width_deg,
            height_deg: request.height(),
            pixels: request.pixels,
            cached,
            png,
        };

        if !request.overwrite {
            match tokio::fs::read(&png_path).await {
                Ok(body) => {
                    info!(path = %png_path.display(), "reusing cached cutout");
                    return Ok(product(Bytes::from(body), true));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        let start = Instant::now();
        info!(
            survey = %request.survey,
            position = %position,
            width_deg = request.width_deg,
            height_deg = request.height(),
            pixels = request.pixels,
            projection = %request.projection,
            "requesting SkyView cutout"
        );

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let png = self.download(request, &position, ReturnFormat::Png).await?;
        write_atomic(&png_path, &png).await?;

        if let Some(fits_path) = &fits_path {
            let fits = self.download(request, &position, ReturnFormat::Fits).await?;
            write_atomic(fits_path, &fits).await?;
        }

        info!(
            elapsed_ms = start.elapsed().as_millis(),
            png = %png_path.display(),
            "SkyView cutout saved"
        );
        Ok(product(png, false))
    }
}

fn query_params(request: &CutoutRequest, position: &str, format: ReturnFormat) -> Vec<(&'static str, String)> {
    vec![
        ("Position", position.to_string()),
        ("Survey", request.survey.clone()),
        ("Coordinates", "J2000".to_string()),
        ("Pixels", request.pixels.to_string()),
        ("Size", format!("{},{}", request.width_deg, request.height())),
        ("Projection", request.projection.clone()),
        ("Return", format.as_str().to_string()),
    ]
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
