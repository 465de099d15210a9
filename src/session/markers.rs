//! Per-object map markers and the current selection

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::data::{ObjectId, TrackedObject};
use crate::error::SessionError;
use crate::geo::PixelPos;

/// Registry shared between the refresh worker and pointer handling
pub type SharedRegistry = Arc<RwLock<MarkerRegistry>>;

/// Visual state of one tracked object
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: ObjectId,
    pub label: String,
    /// RGBA, fixed for the session
    pub color: [f32; 4],
    /// `None` until the first successful tick
    pub position: Option<PixelPos>,
}

/// Placed marker, as used for hit-testing
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerPosition {
    pub id: ObjectId,
    pub position: PixelPos,
}

/// One marker per tracked object plus the selected object
///
/// Markers keep the order of the initial collection; that order is the
/// canonical ordering used for tie-breaks. The selection is stored as an
/// index, so it always names a tracked object.
#[derive(Debug, Clone)]
pub struct MarkerRegistry {
    markers: Vec<Marker>,
    index: HashMap<ObjectId, usize>,
    selected: usize,
}

impl MarkerRegistry {
    /// Build markers for `objects` and pick the initial selection
    ///
    /// The selection is `default_selection` when it is tracked, otherwise the
    /// first object.
    pub fn initialize(
        objects: &[TrackedObject],
        default_selection: Option<&str>,
    ) -> Result<Self, SessionError> {
        if objects.is_empty() {
            return Err(SessionError::Configuration(
                "no objects to track".to_string(),
            ));
        }

        let palette = marker_palette(objects.len());
        let mut markers = Vec::with_capacity(objects.len());
        let mut index = HashMap::with_capacity(objects.len());

        for (i, (object, color)) in objects.iter().zip(palette).enumerate() {
            if index.insert(object.id.clone(), i).is_some() {
                return Err(SessionError::Configuration(format!(
                    "object {} is listed twice",
                    object.id
                )));
            }
            markers.push(Marker {
                id: object.id.clone(),
                label: object.name().to_string(),
                color,
                position: None,
            });
        }

        let selected = match default_selection {
            Some(name) => match index.get(name) {
                Some(&i) => i,
                None => {
                    log::warn!(
                        "Default object {:?} is not tracked, selecting {}",
                        name,
                        markers[0].id
                    );
                    0
                }
            },
            None => 0,
        };

        Ok(Self {
            markers,
            index,
            selected,
        })
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Overwrite a marker's pixel position
    pub fn update_position(&mut self, id: &str, position: PixelPos) -> Result<(), SessionError> {
        let i = self.position_of(id)?;
        self.markers[i].position = Some(position);
        Ok(())
    }

    /// Placed markers in canonical order
    pub fn positions(&self) -> Vec<MarkerPosition> {
        self.markers
            .iter()
            .filter_map(|m| {
                m.position.map(|position| MarkerPosition {
                    id: m.id.clone(),
                    position,
                })
            })
            .collect()
    }

    pub fn select(&mut self, id: &str) -> Result<(), SessionError> {
        self.selected = self.position_of(id)?;
        Ok(())
    }

    pub fn selected(&self) -> &ObjectId {
        &self.markers[self.selected].id
    }

    pub fn selected_marker(&self) -> &Marker {
        &self.markers[self.selected]
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn get(&self, id: &str) -> Option<&Marker> {
        self.index.get(id).map(|&i| &self.markers[i])
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    fn position_of(&self, id: &str) -> Result<usize, SessionError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| SessionError::UnknownObject(ObjectId::new(id)))
    }
}

/// Distinct marker colors, one per object
///
/// Hues are spread evenly around the color wheel starting at red.
pub fn marker_palette(count: usize) -> Vec<[f32; 4]> {
    (0..count)
        .map(|i| hsv_to_rgba(i as f32 / count.max(1) as f32, 0.85, 1.0))
        .collect()
}

fn hsv_to_rgba(hue: f32, saturation: f32, value: f32) -> [f32; 4] {
    let h = (hue.rem_euclid(1.0)) * 6.0;
    let c = value * saturation;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let m = value - c;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [r + m, g + m, b + m, 1.0]
}
