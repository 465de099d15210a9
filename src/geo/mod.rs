//! Map georeferencing and Earth geometry

pub mod geodesy;
mod transform;

pub use transform::*;
