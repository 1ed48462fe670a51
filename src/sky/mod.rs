//! Sky geometry shared by the viewer controllers.

pub mod coords;
pub mod view;

pub use coords::{RaDec, direction_to_ra_dec, format_angle};
pub use view::{ViewState, ZoomSettings};
