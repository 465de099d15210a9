//! Orbital propagation collaborator
//!
//! The session only needs a [`Propagate`] implementation that turns a tracked
//! object and an instant into a subpoint, an Earth-fixed position and a
//! velocity. [`Sgp4Propagator`] does this from TLEs with satkit's SGP4;
//! [`DeadlinePropagator`] bounds how long a single query may take.

mod deadline;
mod propagator;

pub use deadline::*;
pub use propagator::*;
