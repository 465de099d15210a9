//! Drawing the map and its markers into an egui rect

use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Stroke};

use satmap::{Frame, PixelPos};

/// Smallest on-screen marker radius, so markers stay clickable when zoomed out
pub const MIN_MARKER_RADIUS_SCREEN: f32 = 3.0;

/// Placement of the base image inside the available screen area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub rect: Rect,
    /// Screen points per image pixel
    pub scale: f32,
    image_height: f32,
}

impl MapView {
    /// Largest aspect-preserving fit of a `width` x `height` image, centered
    pub fn fit(available: Rect, width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        let scale = (available.width() / w).min(available.height() / h).max(f32::EPSILON);
        let rect = Rect::from_center_size(available.center(), egui::vec2(w * scale, h * scale));
        Self {
            rect,
            scale,
            image_height: h,
        }
    }

    /// Map pixel (rows counted from the bottom) to screen position
    pub fn to_screen(&self, pos: &PixelPos) -> Pos2 {
        egui::pos2(
            self.rect.left() + pos.col as f32 * self.scale,
            self.rect.top() + (self.image_height - pos.row as f32) * self.scale,
        )
    }

    /// Screen position back to map pixel
    pub fn to_pixel(&self, screen: Pos2) -> PixelPos {
        PixelPos::new(
            ((screen.x - self.rect.left()) / self.scale) as f64,
            (self.image_height - (screen.y - self.rect.top()) / self.scale) as f64,
        )
    }

    /// On-screen radius for a marker of `radius_px` image pixels
    pub fn marker_radius(&self, radius_px: f64) -> f32 {
        (radius_px as f32 * self.scale).max(MIN_MARKER_RADIUS_SCREEN)
    }

    /// Hit radius in image pixels matching the drawn marker
    pub fn hit_radius(&self, radius_px: f64) -> f64 {
        (self.marker_radius(radius_px) / self.scale) as f64
    }
}

pub fn color32(rgba: [f32; 4]) -> Color32 {
    Color32::from_rgba_unmultiplied(
        (rgba[0].clamp(0.0, 1.0) * 255.0) as u8,
        (rgba[1].clamp(0.0, 1.0) * 255.0) as u8,
        (rgba[2].clamp(0.0, 1.0) * 255.0) as u8,
        (rgba[3].clamp(0.0, 1.0) * 255.0) as u8,
    )
}

/// Draw every placed marker, with a ring around the selected one
pub fn paint_markers(painter: &Painter, view: &MapView, frame: &Frame, radius_px: f64) {
    let radius = view.marker_radius(radius_px);

    for marker in &frame.markers {
        let Some(position) = marker.position else {
            continue;
        };
        let center = view.to_screen(&position);
        painter.circle_filled(center, radius, color32(marker.color));
        painter.text(
            center + egui::vec2(radius + 3.0, 0.0),
            Align2::LEFT_CENTER,
            &marker.label,
            FontId::proportional(11.0),
            Color32::from_rgb(220, 220, 220),
        );

        if marker.id == frame.selected {
            painter.circle_stroke(center, radius + 4.0, Stroke::new(2.0, Color32::WHITE));
        }
    }
}
