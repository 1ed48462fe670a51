//! FITS loader — displays FITS sources on the sky-viewer widget.
//!
//! DESIGN
//! ======
//! The widget reports success/failure of `displayFITS` through callbacks;
//! `FitsViewer::display_fits` folds both into a single `FitsOutcome`. Each
//! `load` takes a fresh request id and only the newest request may touch
//! the status line, the error box or the view.
//!
//! A slow load is reported once the timeout elapses, but the load itself
//! keeps going and can still succeed afterwards. The optional cleanup hook
//! (e.g. revoking a local object URL) runs exactly once per load.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Url;
use tracing::{error, warn};

pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_COLORMAP: &str = "magma";
pub const DEFAULT_STRETCH: &str = "sqrt";
pub const MIN_VIEW_FOV_DEG: f64 = 0.01;
pub const MAX_VIEW_FOV_DEG: f64 = 60.0;

pub const READY_STATUS: &str = "Ready to load a FITS image.";
pub const EMPTY_URL_MESSAGE: &str = "Please enter a FITS file URL.";
pub const INVALID_URL_MESSAGE: &str = "The URL appears to be invalid. Please double-check and try again.";
pub const SLOW_LOAD_MESSAGE: &str =
    "The FITS file is taking longer than expected to respond. Please try again or use a different source.";
pub const LOAD_FAILED_MESSAGE: &str = "Unable to load the FITS data. Please verify the file or URL and try again.";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FitsError {
    #[error("no FITS URL given")]
    EmptyUrl,

    #[error("invalid FITS URL: {0}")]
    InvalidUrl(String),
}

/// Where the FITS data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FitsSource {
    Url(Url),
    /// A local file exposed to the widget through an object URL.
    LocalFile { name: String, object_url: String },
}

impl FitsSource {
    /// Human-readable label used in the status line.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Url(url) => url.host_str().map_or_else(|| url.to_string(), str::to_string),
            Self::LocalFile { name, .. } => format!("Local file: {name}"),
        }
    }
}

/// Uniform result of a `display_fits` call.
#[derive(Debug, Clone, PartialEq)]
pub enum FitsOutcome {
    Displayed { ra: f64, dec: f64, fov: f64, image: FitsImage },
    Failed { error: String },
}

/// Handle to the image layer the widget created for a FITS source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitsImage {
    pub id: String,
}

pub struct LoadOptions {
    /// Overrides the label derived from the source.
    pub label: Option<String>,
    pub colormap: Option<String>,
    pub timeout: Duration,
    pub on_cleanup: Option<Box<dyn FnOnce() + Send>>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            label: None,
            colormap: None,
            timeout: Duration::from_secs(DEFAULT_LOAD_TIMEOUT_SECS),
            on_cleanup: None,
        }
    }
}

// =============================================================================
// COLLABORATORS
// =============================================================================

/// The sky-viewer widget.
#[async_trait::async_trait]
pub trait FitsViewer: Send + Sync {
    /// The widget finished its asynchronous initialisation.
    fn is_ready(&self) -> bool;

    async fn display_fits(&self, source: &FitsSource) -> FitsOutcome;

    fn goto_ra_dec(&self, ra: f64, dec: f64);

    fn set_fov(&self, fov_deg: f64);

    /// # Errors
    ///
    /// Returns a description if the image rejects the colormap.
    fn set_colormap(&self, image: &FitsImage, colormap: &str, stretch: &str) -> Result<(), String>;
}

/// Status line and error box next to the viewer.
pub trait FitsStatus: Send + Sync {
    fn set_status(&self, text: &str);
    fn show_error(&self, message: &str);
    fn clear_error(&self);
}

/// Status line text for a loaded source.
#[must_use]
pub fn format_status(label: Option<&str>, fov: Option<f64>) -> String {
    let mut parts = Vec::new();
    if let Some(label) = label {
        parts.push(format!("Source: {label}"));
    }
    if let Some(fov) = fov.filter(|f| f.is_finite()) {
        parts.push(format!("FoV ≈ {:.2}°", (fov * 2.0).max(MIN_VIEW_FOV_DEG)));
    }
    if parts.is_empty() {
        READY_STATUS.to_string()
    } else {
        parts.join(" · ")
    }
}

/// Field of view to show for an image reporting half-width `fov`.
#[must_use]
pub fn view_fov(fov: f64) -> f64 {
    (fov * 2.0).clamp(MIN_VIEW_FOV_DEG, MAX_VIEW_FOV_DEG)
}

// =============================================================================
// LOADER
// =============================================================================

pub struct FitsLoader {
    viewer: Arc<dyn FitsViewer>,
    status: Arc<dyn FitsStatus>,
    current: AtomicU64,
}

impl FitsLoader {
    #[must_use]
    pub fn new(viewer: Arc<dyn FitsViewer>, status: Arc<dyn FitsStatus>) -> Self {
        Self { viewer, status, current: AtomicU64::new(0) }
    }

    /// Validate a user-typed URL and load it.
    ///
    /// # Errors
    ///
    /// Returns an error (and shows it) if the input is empty or not a URL;
    /// nothing is requested in that case.
    pub async fn load_url(&self, input: &str) -> Result<(), FitsError> {
        let input = input.trim();
        if input.is_empty() {
            self.status.show_error(EMPTY_URL_MESSAGE);
            return Err(FitsError::EmptyUrl);
        }
        let url = Url::parse(input).map_err(|e| {
            self.status.show_error(INVALID_URL_MESSAGE);
            FitsError::InvalidUrl(e.to_string())
        })?;

        let options = LoadOptions { label: Some(input.to_string()), ..LoadOptions::default() };
        self.load(FitsSource::Url(url), options).await;
        Ok(())
    }

    /// Display a FITS source, superseding any load still in progress.
    pub async fn load(&self, source: FitsSource, mut options: LoadOptions) {
        let _cleanup = CleanupGuard(options.on_cleanup.take());
        if !self.viewer.is_ready() {
            warn!("sky viewer not initialised; FITS load skipped");
            return;
        }

        let request_id = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let label = options.label.clone().unwrap_or_else(|| source.label());

        self.status.clear_error();
        self.status.set_status(&format!("Loading {label}…"));

        let display = self.viewer.display_fits(&source);
        tokio::pin!(display);
        let outcome = match tokio::time::timeout(options.timeout, &mut display).await {
            Ok(outcome) => outcome,
            Err(_) => {
                if self.is_current(request_id) {
                    warn!(%label, "FITS load timed out");
                    self.status.show_error(SLOW_LOAD_MESSAGE);
                }
                display.await
            }
        };

        if !self.is_current(request_id) {
            return;
        }

        match outcome {
            FitsOutcome::Displayed { ra, dec, fov, image } => {
                let colormap = options.colormap.as_deref().unwrap_or(DEFAULT_COLORMAP);
                if let Err(e) = self.viewer.set_colormap(&image, colormap, DEFAULT_STRETCH) {
                    warn!(error = %e, colormap, "unable to update the FITS colormap");
                }
                self.focus(ra, dec, fov);
                self.status.set_status(&format_status(Some(&label), Some(fov)));
            }
            FitsOutcome::Failed { error } => {
                error!(%label, %error, "failed to load FITS data");
                self.status.show_error(LOAD_FAILED_MESSAGE);
            }
        }
    }

    fn is_current(&self, request_id: u64) -> bool {
        self.current.load(Ordering::SeqCst) == request_id
    }

    fn focus(&self, ra: f64, dec: f64, fov: f64) {
        if ra.is_finite() && dec.is_finite() {
            self.viewer.goto_ra_dec(ra, dec);
        }
        if fov.is_finite() {
            self.viewer.set_fov(view_fov(fov));
        }
    }
}

struct CleanupGuard(Option<Box<dyn FnOnce() + Send>>);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.0.take() {
            cleanup();
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
