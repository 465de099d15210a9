//! SGP4 propagation using satkit

use std::collections::HashMap;

use nalgebra::Vector3;
use satkit::sgp4::sgp4;
use satkit::Instant;

use crate::data::{ElementCatalog, ElementSet, ObjectId, TrackedObject};
use crate::error::PropagationUnavailable;
use crate::geo::geodesy::{
    ecef_to_geodetic, greenwich_mean_sidereal_time, inertial_to_earth_fixed, SECONDS_PER_DAY,
};

/// Point on the ground directly beneath an object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subpoint {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    /// Height of the object above the ellipsoid at this point
    pub altitude_km: f64,
}

/// Propagation result for a single object at a single instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropagatedState {
    pub subpoint: Subpoint,
    /// Position in the Earth-fixed frame (km)
    pub position_ecef_km: Vector3<f64>,
    /// Geocentric inertial velocity (km/s)
    pub velocity_km_s: Vector3<f64>,
}

/// Source of object positions at an instant
///
/// Implementations may block; the scheduler calls them off the UI thread.
pub trait Propagate: Send + Sync {
    fn propagate(
        &self,
        object: &TrackedObject,
        instant: &Instant,
    ) -> Result<PropagatedState, PropagationUnavailable>;
}

/// Default maximum element set age before positions are refused
pub const DEFAULT_MAX_ELEMENT_AGE_DAYS: f64 = 30.0;

/// Propagates TLEs with SGP4, keyed by object id
pub struct Sgp4Propagator {
    tles: HashMap<ObjectId, satkit::TLE>,
    max_element_age_days: f64,
}

impl Sgp4Propagator {
    pub fn new(max_element_age_days: f64) -> Self {
        Self {
            tles: HashMap::new(),
            max_element_age_days,
        }
    }

    pub fn from_catalog(catalog: &ElementCatalog, max_element_age_days: f64) -> Self {
        let mut propagator = Self::new(max_element_age_days);
        propagator.load_catalog(catalog);
        propagator
    }

    /// Load TLEs from an element catalog
    pub fn load_catalog(&mut self, catalog: &ElementCatalog) {
        self.tles.clear();

        for set in catalog.sets() {
            if let Some(tle) = parse_tle(set) {
                self.tles.insert(ObjectId::new(&set.name), tle);
            }
        }

        log::info!("Loaded {} TLEs for propagation", self.tles.len());
    }

    pub fn tle_count(&self) -> usize {
        self.tles.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tles.contains_key(id)
    }

    /// Epoch of the element set behind `id`
    pub fn element_epoch(&self, id: &str) -> Option<Instant> {
        self.tles.get(id).map(|tle| tle.epoch)
    }

    /// Days between the element epoch of `id` and `instant`
    pub fn element_age_days(&self, id: &str, instant: &Instant) -> Option<f64> {
        self.element_epoch(id)
            .map(|epoch| ((*instant - epoch).as_seconds() / SECONDS_PER_DAY).abs())
    }
}

impl Propagate for Sgp4Propagator {
    fn propagate(
        &self,
        object: &TrackedObject,
        instant: &Instant,
    ) -> Result<PropagatedState, PropagationUnavailable> {
        let tle = self
            .tles
            .get(&object.id)
            .ok_or_else(|| PropagationUnavailable::NotFound(object.id.clone()))?;

        let age_days = ((*instant - tle.epoch).as_seconds() / SECONDS_PER_DAY).abs();
        if age_days > self.max_element_age_days {
            return Err(PropagationUnavailable::Stale {
                id: object.id.clone(),
                age_days,
            });
        }

        let mut tle = tle.clone();
        let result = sgp4(&mut tle, &[*instant]).map_err(|_| PropagationUnavailable::Failed {
            id: object.id.clone(),
            message: "SGP4 propagation error".to_string(),
        })?;

        // TEME position and velocity, meters and m/s
        let pos = result.pos.column(0);
        let vel = result.vel.column(0);
        let pos_km = Vector3::new(pos[0], pos[1], pos[2]) / 1000.0;
        let vel_kms = Vector3::new(vel[0], vel[1], vel[2]) / 1000.0;

        if pos_km.iter().chain(vel_kms.iter()).any(|v| !v.is_finite()) {
            return Err(PropagationUnavailable::Failed {
                id: object.id.clone(),
                message: "non-finite state vector".to_string(),
            });
        }

        let gmst = greenwich_mean_sidereal_time(instant.as_unixtime());
        let position_ecef_km = inertial_to_earth_fixed(&pos_km, gmst);
        let geodetic = ecef_to_geodetic(&position_ecef_km);

        Ok(PropagatedState {
            subpoint: Subpoint {
                latitude_deg: geodetic.latitude_deg,
                longitude_deg: geodetic.longitude_deg,
                altitude_km: geodetic.height_km,
            },
            position_ecef_km,
            velocity_km_s: vel_kms,
        })
    }
}

/// Parse an element set into a satkit TLE
fn parse_tle(set: &ElementSet) -> Option<satkit::TLE> {
    match satkit::TLE::load_2line(&set.line1, &set.line2) {
        Ok(tle) => Some(tle),
        Err(e) => {
            log::warn!("Failed to parse TLE for {:?}: {}", set.name, e);
            None
        }
    }
}
