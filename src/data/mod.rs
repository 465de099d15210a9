//! Tracked objects and the element catalog they come from

mod loader;
mod tracked_object;

pub use loader::*;
pub use tracked_object::*;
