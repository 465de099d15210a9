//! UI components

mod panels;

pub use panels::*;
