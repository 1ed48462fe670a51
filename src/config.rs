//! Configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::sky::ZoomSettings;
use crate::sky::view::{DEFAULT_FOV_ZOOM_RATIO, DEFAULT_PIXEL_ZOOM_RATIO};
use crate::skyview::{
    DEFAULT_OUTPUT_DIR, DEFAULT_SKYVIEW_CONNECT_TIMEOUT_SECS, DEFAULT_SKYVIEW_REQUEST_TIMEOUT_SECS, DEFAULT_SKYVIEW_URL,
};
use crate::tiles::DEFAULT_TILE_BASE_URL;
use crate::tiles::ViewerSettings;
use crate::tiles::controller::DEFAULT_DEBOUNCE_MS;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_WEB_DIR: &str = "web";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkyViewTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl SkyViewTimeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

/// Tile proxy server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub skyview_url: String,
    pub output_dir: PathBuf,
    pub web_dir: PathBuf,
    pub timeouts: SkyViewTimeouts,
}

impl ServerConfig {
    /// Build server config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 8000
    /// - `SKYVIEW_URL`: SkyView `runquery.pl` endpoint
    /// - `TILE_OUTPUT_DIR`: default `outputs`
    /// - `WEB_DIR`: default `web`
    /// - `SKYVIEW_REQUEST_TIMEOUT_SECS`: default 120
    /// - `SKYVIEW_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is set but is not a valid port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::Invalid { key: "PORT", reason: e.to_string() })?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            skyview_url: env_string("SKYVIEW_URL", DEFAULT_SKYVIEW_URL),
            output_dir: PathBuf::from(env_string("TILE_OUTPUT_DIR", DEFAULT_OUTPUT_DIR)),
            web_dir: PathBuf::from(env_string("WEB_DIR", DEFAULT_WEB_DIR)),
            timeouts: SkyViewTimeouts {
                request_secs: env_parse("SKYVIEW_REQUEST_TIMEOUT_SECS", DEFAULT_SKYVIEW_REQUEST_TIMEOUT_SECS),
                connect_secs: env_parse("SKYVIEW_CONNECT_TIMEOUT_SECS", DEFAULT_SKYVIEW_CONNECT_TIMEOUT_SECS),
            },
        })
    }
}

/// Panoramic viewer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub tile_base_url: String,
    pub settings: ViewerSettings,
}

impl ViewerConfig {
    /// Build viewer config from environment variables.
    ///
    /// Optional:
    /// - `COSMOVIEW_TILE_BASE_URL`: default `http://127.0.0.1:8000`
    /// - `COSMOVIEW_DEBOUNCE_MS`: default 450
    /// - `COSMOVIEW_FOV_ZOOM_RATIO`: default 1.6, must be > 1
    /// - `COSMOVIEW_PIXEL_ZOOM_RATIO`: default 1.3, must be > 1
    ///
    /// # Errors
    ///
    /// Returns an error if a zoom ratio is not a finite number above 1.
    pub fn from_env() -> Result<Self, ConfigError> {
        let tile_base_url = env_string("COSMOVIEW_TILE_BASE_URL", DEFAULT_TILE_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let zoom = ZoomSettings {
            fov_ratio: zoom_ratio("COSMOVIEW_FOV_ZOOM_RATIO", DEFAULT_FOV_ZOOM_RATIO)?,
            pixel_ratio: zoom_ratio("COSMOVIEW_PIXEL_ZOOM_RATIO", DEFAULT_PIXEL_ZOOM_RATIO)?,
        };
        let settings = ViewerSettings {
            debounce: Duration::from_millis(env_parse("COSMOVIEW_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)),
            zoom,
            ..ViewerSettings::default()
        };
        Ok(Self { tile_base_url, settings })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn zoom_ratio(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    let ratio = env_parse(key, default);
    if ratio.is_finite() && ratio > 1.0 {
        Ok(ratio)
    } else {
        Err(ConfigError::Invalid { key, reason: format!("zoom ratio must be greater than 1, got {ratio}") })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
