//! Tracked objects and the element sets they are built from

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Unique key of a tracked object (its catalog name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(Arc<str>);

impl ObjectId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ObjectId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A satellite followed by the session
///
/// The orbital state behind it is owned by the propagation collaborator and
/// looked up by `id`; the session never mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedObject {
    pub id: ObjectId,
    /// NORAD catalog number, when the element set carried one
    pub catalog_number: Option<u32>,
}

impl TrackedObject {
    pub fn new(id: impl Into<ObjectId>, catalog_number: Option<u32>) -> Self {
        Self {
            id: id.into(),
            catalog_number,
        }
    }

    pub fn name(&self) -> &str {
        self.id.as_str()
    }
}

/// Two-Line Element set with its title line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSet {
    pub name: String,
    pub line1: String,
    pub line2: String,
}

impl ElementSet {
    /// NORAD catalog number from columns 3-7 of line 1
    pub fn catalog_number(&self) -> Option<u32> {
        self.line1.get(2..7)?.trim().parse().ok()
    }

    pub fn tracked_object(&self) -> TrackedObject {
        TrackedObject::new(self.name.as_str(), self.catalog_number())
    }
}
