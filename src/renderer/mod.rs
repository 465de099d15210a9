//! 2D map rendering with egui
//!
//! Handles the base-map texture and marker painting.

mod map_view;
mod textures;

pub use map_view::*;
pub use textures::*;
