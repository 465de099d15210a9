//! Speed and range telemetry for a tracked object

use std::sync::Arc;

use satkit::Instant;

use crate::data::TrackedObject;
use crate::error::PropagationUnavailable;
use crate::geo::geodesy::geodetic_to_ecef_km;
use crate::propagation::{Propagate, PropagatedState, Subpoint};

/// Kilometers per second to miles per second
pub const KM_PER_S_TO_MI_PER_S: f64 = 0.621_371;

/// Derived readings for the selected object at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    /// Geocentric speed in miles per second
    pub speed_mi_s: f64,
    /// Slant range in km from an observer at the object's own subpoint
    pub distance_km: f64,
    pub subpoint: Subpoint,
}

impl Telemetry {
    pub fn from_state(state: &PropagatedState) -> Self {
        Self {
            speed_mi_s: speed_of(state),
            distance_km: distance_of(state),
            subpoint: state.subpoint,
        }
    }
}

/// Speed of a propagated state in miles per second
pub fn speed_of(state: &PropagatedState) -> f64 {
    state.velocity_km_s.norm() * KM_PER_S_TO_MI_PER_S
}

/// Range from a ground observer placed at the state's own subpoint
///
/// The observer sits on the ellipsoid directly below the object, so the
/// result tracks the object's height rather than a fixed station's range.
pub fn distance_of(state: &PropagatedState) -> f64 {
    let observer = geodetic_to_ecef_km(
        state.subpoint.latitude_deg,
        state.subpoint.longitude_deg,
        0.0,
    );
    (state.position_ecef_km - observer).norm()
}

/// Computes telemetry by querying the propagation collaborator
pub struct TelemetryDeriver {
    propagator: Arc<dyn Propagate>,
}

impl TelemetryDeriver {
    pub fn new(propagator: Arc<dyn Propagate>) -> Self {
        Self { propagator }
    }

    pub fn speed(
        &self,
        object: &TrackedObject,
        instant: &Instant,
    ) -> Result<f64, PropagationUnavailable> {
        Ok(speed_of(&self.propagator.propagate(object, instant)?))
    }

    pub fn distance(
        &self,
        object: &TrackedObject,
        instant: &Instant,
    ) -> Result<f64, PropagationUnavailable> {
        Ok(distance_of(&self.propagator.propagate(object, instant)?))
    }

    /// Readings from a state already propagated for this instant
    pub fn derive_from(&self, state: &PropagatedState) -> Telemetry {
        Telemetry::from_state(state)
    }

    /// Both readings from a single propagation
    pub fn derive(
        &self,
        object: &TrackedObject,
        instant: &Instant,
    ) -> Result<Telemetry, PropagationUnavailable> {
        Ok(Telemetry::from_state(&self.propagator.propagate(object, instant)?))
    }
}
