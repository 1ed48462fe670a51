//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. The
//! cutout provider sits behind a trait object so handlers can be exercised
//! without reaching NASA SkyView.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::skyview::CutoutProvider;

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub cutouts: Arc<dyn CutoutProvider>,
    /// Static prototype UI served under `/app`.
    pub web_dir: PathBuf,
}

impl AppState {
    #[must_use]
    pub fn new(cutouts: Arc<dyn CutoutProvider>, config: &ServerConfig) -> Self {
        Self { cutouts, web_dir: config.web_dir.clone() }
    }

    #[must_use]
    pub fn favicon_path(&self) -> PathBuf {
        self.web_dir.join("favicon.ico")
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
