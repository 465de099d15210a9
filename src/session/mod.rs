//! The live map session
//!
//! [`MapSession`] owns everything one map window needs: the projector for the
//! base map, the shared marker registry, the click resolver and the refresh
//! scheduler. Presentation code reads [`Frame`]s from the receiver returned by
//! [`MapSession::start`] and forwards pointer clicks to [`MapSession::click`].

mod markers;
mod scheduler;
mod selection;
mod telemetry;

pub use markers::*;
pub use scheduler::*;
pub use selection::*;
pub use telemetry::*;

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SessionConfig;
use crate::data::{ObjectId, TrackedObject};
use crate::error::SessionError;
use crate::geo::{BaseMap, GeoProjector, PixelPos};
use crate::propagation::{DeadlinePropagator, Propagate};

pub struct MapSession {
    objects: Arc<[TrackedObject]>,
    base_map: BaseMap,
    projector: GeoProjector,
    registry: SharedRegistry,
    resolver: SelectionResolver,
    scheduler: RefreshScheduler,
    propagation_timeout: Option<Duration>,
}

impl MapSession {
    /// Validate the map and object set and build the idle session
    pub fn new(
        objects: Vec<TrackedObject>,
        base_map: &BaseMap,
        config: &SessionConfig,
    ) -> Result<Self, SessionError> {
        let projector = GeoProjector::for_base_map(base_map)?;
        let registry =
            MarkerRegistry::initialize(&objects, config.default_object.as_deref())?.into_shared();

        if !(config.marker_radius_px > 0.0) {
            return Err(SessionError::Configuration(format!(
                "marker radius must be positive, got {}",
                config.marker_radius_px
            )));
        }

        log::info!(
            "Session over {}x{} map tracking {} objects, selected {}",
            base_map.image_width,
            base_map.image_height,
            objects.len(),
            registry.read().selected()
        );

        Ok(Self {
            objects: objects.into(),
            base_map: *base_map,
            projector,
            registry,
            resolver: SelectionResolver::new(*base_map, config.marker_radius_px),
            scheduler: RefreshScheduler::new(config.refresh_interval()),
            propagation_timeout: config.propagation_timeout(),
        })
    }

    /// Start periodic refresh; frames arrive on the returned receiver
    pub fn start(
        &mut self,
        propagator: Arc<dyn Propagate>,
        clock: Arc<dyn Clock>,
    ) -> Result<Receiver<Frame>, SessionError> {
        let propagator: Arc<dyn Propagate> = match self.propagation_timeout {
            Some(timeout) => Arc::new(DeadlinePropagator::new(propagator, timeout)),
            None => propagator,
        };

        let cycle = RefreshCycle::new(
            Arc::clone(&self.objects),
            Arc::clone(&self.registry),
            self.projector,
            propagator,
            clock,
        );

        let (frame_tx, frame_rx) = mpsc::sync_channel(FRAME_BACKLOG);
        self.scheduler.start(cycle, frame_tx)?;
        Ok(frame_rx)
    }

    /// Select the marker under `pointer`, if any, and refresh right away
    pub fn click(&self, pointer: PixelPos) -> Option<ObjectId> {
        self.click_with_radius(pointer, self.resolver.hit_radius())
    }

    pub fn click_with_radius(&self, pointer: PixelPos, hit_radius: f64) -> Option<ObjectId> {
        let hit = self
            .resolver
            .click_with_radius(&self.registry, pointer, hit_radius)?;
        self.scheduler.refresh_now();
        Some(hit)
    }

    pub fn select(&self, id: &str) -> Result<(), SessionError> {
        self.registry.write().select(id)?;
        self.scheduler.refresh_now();
        Ok(())
    }

    pub fn selected(&self) -> ObjectId {
        self.registry.read().selected().clone()
    }

    /// Snapshot of every marker in canonical order
    pub fn markers(&self) -> Vec<Marker> {
        self.registry.read().markers().to_vec()
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn objects(&self) -> &[TrackedObject] {
        &self.objects
    }

    pub fn base_map(&self) -> &BaseMap {
        &self.base_map
    }

    pub fn projector(&self) -> &GeoProjector {
        &self.projector
    }

    pub fn hit_radius(&self) -> f64 {
        self.resolver.hit_radius()
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Stop refreshing; no tick runs after this returns
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PropagationUnavailable;
    use crate::geo::GeoTransform;
    use crate::propagation::{PropagatedState, Subpoint};
    use nalgebra::Vector3;
    use satkit::Instant;

    /// Parks each object at a fixed subpoint
    struct ParkedPropagator {
        spots: Vec<(&'static str, f64, f64)>,
    }

    impl Propagate for ParkedPropagator {
        fn propagate(
            &self,
            object: &TrackedObject,
            _instant: &Instant,
        ) -> Result<PropagatedState, PropagationUnavailable> {
            let (_, lat, lon) = self
                .spots
                .iter()
                .find(|(name, _, _)| *name == object.name())
                .ok_or_else(|| PropagationUnavailable::NotFound(object.id.clone()))?;
            Ok(PropagatedState {
                subpoint: Subpoint {
                    latitude_deg: *lat,
                    longitude_deg: *lon,
                    altitude_km: 420.0,
                },
                position_ecef_km: crate::geo::geodesy::geodetic_to_ecef_km(*lat, *lon, 420.0),
                velocity_km_s: Vector3::new(7.66, 0.0, 0.0),
            })
        }
    }

    fn scenario_map() -> BaseMap {
        BaseMap::new(
            1000,
            1000,
            GeoTransform::new(0.36, 0.0, -180.0, 0.0, 0.18, -90.0),
        )
    }

    fn objects(names: &[&str]) -> Vec<TrackedObject> {
        names.iter().map(|n| TrackedObject::new(*n, None)).collect()
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(
            Instant::from_datetime(2026, 1, 29, 12, 0, 0.0).unwrap(),
        ))
    }

    fn recv(frames: &Receiver<Frame>) -> Frame {
        frames.recv_timeout(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_object_set() {
        let result = MapSession::new(Vec::new(), &scenario_map(), &SessionConfig::default());
        assert!(matches!(result, Err(SessionError::Configuration(_))));
    }

    #[test]
    fn test_new_rejects_singular_transform() {
        let map = BaseMap::new(10, 10, GeoTransform::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0));
        let result = MapSession::new(objects(&["A"]), &map, &SessionConfig::default());
        assert!(matches!(result, Err(SessionError::Configuration(_))));
    }

    #[test]
    fn test_default_object_selected_at_start() {
        let config = SessionConfig {
            default_object: Some("B".to_string()),
            ..SessionConfig::default()
        };
        let session = MapSession::new(objects(&["A", "B"]), &scenario_map(), &config).unwrap();
        assert_eq!(session.selected().as_str(), "B");

        // Falls back to the first object
        let session =
            MapSession::new(objects(&["A", "B"]), &scenario_map(), &SessionConfig::default())
                .unwrap();
        assert_eq!(session.selected().as_str(), "A");
    }

    #[test]
    fn test_click_selects_projected_marker() {
        let config = SessionConfig {
            refresh_interval_ms: 10_000,
            ..SessionConfig::default()
        };
        let mut session =
            MapSession::new(objects(&["ISS", "HST"]), &scenario_map(), &config).unwrap();
        let propagator = Arc::new(ParkedPropagator {
            spots: vec![("HST", 45.0, 90.0), ("ISS", 0.0, 0.0)],
        });
        let frames = session.start(propagator, clock()).unwrap();

        let first = recv(&frames);
        assert_eq!(first.selected.as_str(), "ISS");
        let iss = first.marker("ISS").unwrap().position.unwrap();
        assert!((iss.col - 500.0).abs() < 1e-9);
        assert!((iss.row - 500.0).abs() < 1e-9);

        // Raw row 750 for lat 45 flips to 250
        let hst = first.marker("HST").unwrap().position.unwrap();
        assert!((hst.col - 750.0).abs() < 1e-9);
        assert!((hst.row - 250.0).abs() < 1e-9);

        assert_eq!(
            session.click(PixelPos::new(751.0, 252.0)).map(|id| id.to_string()),
            Some("HST".to_string())
        );
        // The click triggers a tick well before the 10 s interval
        let second = recv(&frames);
        assert_eq!(second.selected.as_str(), "HST");
        assert_eq!(second.telemetry.unwrap().subpoint.latitude_deg, 45.0);

        assert_eq!(
            session.click(PixelPos::new(502.0, 498.0)).map(|id| id.to_string()),
            Some("ISS".to_string())
        );

        session.stop();
        assert_eq!(session.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_missed_click_keeps_selection() {
        let mut session =
            MapSession::new(objects(&["A", "B"]), &scenario_map(), &SessionConfig::default())
                .unwrap();
        let propagator = Arc::new(ParkedPropagator {
            spots: vec![("A", -72.0, -144.0), ("B", 72.0, 144.0)],
        });
        let frames = session.start(propagator, clock()).unwrap();
        recv(&frames);

        assert_eq!(session.click_with_radius(PixelPos::new(500.0, 500.0), 50.0), None);
        assert_eq!(session.click(PixelPos::new(-3.0, 500.0)), None);
        assert_eq!(session.selected().as_str(), "A");
    }

    #[test]
    fn test_select_unknown_object() {
        let session =
            MapSession::new(objects(&["A"]), &scenario_map(), &SessionConfig::default()).unwrap();
        assert_eq!(
            session.select("Z"),
            Err(SessionError::UnknownObject(ObjectId::new("Z")))
        );
        assert_eq!(session.selected().as_str(), "A");
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut session =
            MapSession::new(objects(&["A"]), &scenario_map(), &SessionConfig::default()).unwrap();
        let propagator: Arc<dyn Propagate> = Arc::new(ParkedPropagator {
            spots: vec![("A", 0.0, 0.0)],
        });
        let _frames = session.start(Arc::clone(&propagator), clock()).unwrap();
        assert!(matches!(
            session.start(propagator, clock()),
            Err(SessionError::InvalidTransition { .. })
        ));
    }
}
