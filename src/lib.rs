//! SatMap - live satellite positions on a world map
//!
//! The library holds the map session: projecting satellite subpoints onto a
//! georeferenced raster, keeping one marker per tracked object, resolving
//! pointer clicks to a selection and driving the periodic refresh that keeps
//! markers and the selected object's telemetry up to date.
//!
//! # Example
//!
//! ```ignore
//! use satmap::{BaseMap, MapSession, SessionConfig, SystemClock};
//!
//! let config = SessionConfig::default();
//! let base_map = BaseMap::plate_carree(2048, 1024);
//! let mut session = MapSession::new(objects, &base_map, &config)?;
//! let frames = session.start(propagator, Arc::new(SystemClock))?;
//! let frame = frames.recv()?;
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod geo;
pub mod propagation;
pub mod session;

pub use config::SessionConfig;
pub use data::{ObjectId, TrackedObject};
pub use error::{PropagationUnavailable, SessionError};
pub use geo::{BaseMap, GeoProjector, GeoTransform, PixelPos};
pub use propagation::{Propagate, PropagatedState, Subpoint};
pub use session::{
    Clock, Frame, ManualClock, MapSession, Marker, SchedulerState, SystemClock, Telemetry,
};
