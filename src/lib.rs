//! CosmoView — panoramic sky viewer orchestration and SkyView tile proxy.
//!
//! ARCHITECTURE
//! ============
//! The viewer side (`tiles::controller`, `markers::controller`, `fits`) drives
//! external rendering surfaces through traits and owns all of its state
//! explicitly. The server side (`routes`, `skyview`, `state`) serves the
//! `/tile` endpoint those controllers consume.

pub mod config;
pub mod fits;
pub mod markers;
pub mod routes;
pub mod sky;
pub mod skyview;
pub mod state;
pub mod tiles;
