//! Error taxonomy for the map session

use std::time::Duration;

use crate::data::ObjectId;
use crate::session::SchedulerState;

/// Errors raised by the session itself
///
/// `Configuration` is fatal at start-up; the others reject a single request
/// and leave the session unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown object: {0}")]
    UnknownObject(ObjectId),

    #[error("cannot {action} a scheduler in state {from:?}")]
    InvalidTransition {
        from: SchedulerState,
        action: &'static str,
    },
}

/// Why a position could not be produced for one object at one instant
///
/// Always recoverable: the scheduler skips the object for that tick.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropagationUnavailable {
    #[error("no orbital elements for {0}")]
    NotFound(ObjectId),

    #[error("orbital elements for {id} are {age_days:.1} days old")]
    Stale { id: ObjectId, age_days: f64 },

    #[error("propagation failed for {id}: {message}")]
    Failed { id: ObjectId, message: String },

    #[error("propagation for {id} timed out after {after:?}")]
    TimedOut { id: ObjectId, after: Duration },
}

impl PropagationUnavailable {
    /// Object the failure refers to
    pub fn object_id(&self) -> &ObjectId {
        match self {
            Self::NotFound(id) => id,
            Self::Stale { id, .. } => id,
            Self::Failed { id, .. } => id,
            Self::TimedOut { id, .. } => id,
        }
    }
}
