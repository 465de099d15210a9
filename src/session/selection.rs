//! Resolving pointer clicks to the nearest marker

use crate::data::ObjectId;
use crate::geo::{BaseMap, PixelPos};

use super::markers::{MarkerPosition, SharedRegistry};

/// Nearest marker within `hit_radius` of `pointer`
///
/// Ties on distance go to the marker earliest in `markers`, which is the
/// canonical object order.
pub fn resolve_click(
    pointer: PixelPos,
    markers: &[MarkerPosition],
    hit_radius: f64,
) -> Option<ObjectId> {
    let mut best: Option<(f64, &ObjectId)> = None;

    for marker in markers {
        let distance = pointer.distance_to(&marker.position);
        if !(distance <= hit_radius) {
            continue;
        }
        match best {
            Some((best_distance, _)) if distance >= best_distance => {}
            _ => best = Some((distance, &marker.id)),
        }
    }

    best.map(|(_, id)| id.clone())
}

/// Click handling bound to one map
#[derive(Debug, Clone, Copy)]
pub struct SelectionResolver {
    base_map: BaseMap,
    hit_radius: f64,
}

impl SelectionResolver {
    /// `hit_radius` should equal the drawn marker radius in image pixels
    pub fn new(base_map: BaseMap, hit_radius: f64) -> Self {
        Self {
            base_map,
            hit_radius,
        }
    }

    pub fn hit_radius(&self) -> f64 {
        self.hit_radius
    }

    /// Resolve a click and apply it to the registry
    ///
    /// Hit-testing and the selection change happen under one write lock.
    /// Clicks off the map or away from every marker return `None` and leave
    /// the selection alone.
    pub fn click(&self, registry: &SharedRegistry, pointer: PixelPos) -> Option<ObjectId> {
        self.click_with_radius(registry, pointer, self.hit_radius)
    }

    /// As [`click`](Self::click), with a radius for the current zoom level
    pub fn click_with_radius(
        &self,
        registry: &SharedRegistry,
        pointer: PixelPos,
        hit_radius: f64,
    ) -> Option<ObjectId> {
        if !self.base_map.contains(&pointer) {
            return None;
        }

        let mut registry = registry.write();
        let hit = resolve_click(pointer, &registry.positions(), hit_radius)?;
        match registry.select(hit.as_str()) {
            Ok(()) => {
                log::debug!("Selected {} at ({:.1}, {:.1})", hit, pointer.col, pointer.row);
                Some(hit)
            }
            Err(e) => {
                log::warn!("Click resolved to an untracked marker: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TrackedObject;
    use crate::session::markers::MarkerRegistry;

    fn marker(id: &str, col: f64, row: f64) -> MarkerPosition {
        MarkerPosition {
            id: ObjectId::new(id),
            position: PixelPos::new(col, row),
        }
    }

    fn registry(markers: &[(&str, f64, f64)]) -> SharedRegistry {
        let objects: Vec<TrackedObject> = markers
            .iter()
            .map(|(id, _, _)| TrackedObject::new(*id, None))
            .collect();
        let mut registry = MarkerRegistry::initialize(&objects, None).unwrap();
        for (id, col, row) in markers {
            registry
                .update_position(id, PixelPos::new(*col, *row))
                .unwrap();
        }
        registry.into_shared()
    }

    #[test]
    fn test_nearest_marker_wins() {
        let markers = [marker("A", 10.0, 10.0), marker("B", 13.0, 10.0)];
        let hit = resolve_click(PixelPos::new(12.0, 10.0), &markers, 5.0);
        assert_eq!(hit, Some(ObjectId::new("B")));
    }

    #[test]
    fn test_equal_distance_prefers_canonical_order() {
        let markers = [
            marker("A", 10.0, 10.0),
            marker("B", 14.0, 10.0),
            marker("C", 12.0, 12.0),
        ];
        for _ in 0..10 {
            let hit = resolve_click(PixelPos::new(12.0, 10.0), &markers, 5.0);
            assert_eq!(hit, Some(ObjectId::new("A")));
        }

        let reversed = [marker("B", 14.0, 10.0), marker("A", 10.0, 10.0)];
        let hit = resolve_click(PixelPos::new(12.0, 10.0), &reversed, 5.0);
        assert_eq!(hit, Some(ObjectId::new("B")));
    }

    #[test]
    fn test_radius_boundary_is_inclusive() {
        let markers = [marker("A", 0.0, 0.0)];
        assert!(resolve_click(PixelPos::new(3.0, 4.0), &markers, 5.0).is_some());
        assert!(resolve_click(PixelPos::new(3.0, 4.1), &markers, 5.0).is_none());
        assert!(resolve_click(PixelPos::new(f64::NAN, 0.0), &markers, 5.0).is_none());
    }

    #[test]
    fn test_click_selects_marker_near_center() {
        let shared = registry(&[("OTHER", 100.0, 100.0), ("ISS", 500.0, 500.0)]);
        let resolver = SelectionResolver::new(BaseMap::plate_carree(1000, 1000), 5.0);

        let hit = resolver.click(&shared, PixelPos::new(502.0, 498.0));
        assert_eq!(hit, Some(ObjectId::new("ISS")));
        assert_eq!(shared.read().selected().as_str(), "ISS");
    }

    #[test]
    fn test_click_between_markers_is_no_hit() {
        let shared = registry(&[("A", 100.0, 100.0), ("B", 900.0, 900.0)]);
        let resolver = SelectionResolver::new(BaseMap::plate_carree(1000, 1000), 50.0);
        shared.write().select("B").unwrap();

        assert_eq!(resolver.click(&shared, PixelPos::new(500.0, 500.0)), None);
        assert_eq!(shared.read().selected().as_str(), "B");
    }

    #[test]
    fn test_click_off_map_is_ignored() {
        let shared = registry(&[("A", 0.0, 0.0), ("B", 10.0, 10.0)]);
        let resolver = SelectionResolver::new(BaseMap::plate_carree(100, 100), 5.0);
        shared.write().select("B").unwrap();

        // Within radius of A but outside the image
        assert_eq!(resolver.click(&shared, PixelPos::new(-1.0, -1.0)), None);
        assert_eq!(shared.read().selected().as_str(), "B");

        let hit = resolver.click_with_radius(&shared, PixelPos::new(1.0, 1.0), 2.0);
        assert_eq!(hit, Some(ObjectId::new("A")));
    }
}
