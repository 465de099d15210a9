//! Raster georeferencing: affine geotransform and the projector built on it

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Position on the base-map image
///
/// Rows count upward from the bottom edge of the image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPos {
    pub col: f64,
    pub row: f64,
}

impl PixelPos {
    pub fn new(col: f64, row: f64) -> Self {
        Self { col, row }
    }

    pub fn distance_to(&self, other: &PixelPos) -> f64 {
        (self.col - other.col).hypot(self.row - other.row)
    }

    pub fn is_finite(&self) -> bool {
        self.col.is_finite() && self.row.is_finite()
    }
}

/// Affine map from pixel (col, row) to geographic (lon, lat)
///
/// Coefficient order follows the rasterio convention:
/// `x = a * col + b * row + c`, `y = d * col + e * row + f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Build from a GDAL geotransform `[c, a, b, f, d, e]`
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self::new(gt[1], gt[2], gt[0], gt[4], gt[5], gt[3])
    }

    /// North-up whole-world equirectangular raster of the given size
    pub fn plate_carree(width: u32, height: u32) -> Self {
        Self::new(
            360.0 / width as f64,
            0.0,
            -180.0,
            0.0,
            -180.0 / height as f64,
            90.0,
        )
    }

    fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.a, self.b, self.c, //
            self.d, self.e, self.f, //
            0.0, 0.0, 1.0,
        )
    }

    /// Pixel (col, row) to geographic (lon, lat), no flip applied
    pub fn forward(&self, col: f64, row: f64) -> (f64, f64) {
        let p = self.matrix() * Vector3::new(col, row, 1.0);
        (p.x, p.y)
    }

    /// Inverse mapping, failing for a singular transform
    pub fn inverse(&self) -> Result<Matrix3<f64>, SessionError> {
        let det = self.a * self.e - self.b * self.d;
        if det == 0.0 || !det.is_finite() {
            return Err(SessionError::Configuration(format!(
                "geotransform is not invertible (determinant {})",
                det
            )));
        }

        let inverse = self.matrix().try_inverse().ok_or_else(|| {
            SessionError::Configuration("geotransform is not invertible".to_string())
        })?;
        if inverse.iter().any(|v| !v.is_finite()) {
            return Err(SessionError::Configuration(
                "geotransform inverse is not finite".to_string(),
            ));
        }

        Ok(inverse)
    }
}

/// Base-map metadata supplied once at session start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseMap {
    pub image_width: u32,
    pub image_height: u32,
    pub transform: GeoTransform,
}

impl BaseMap {
    pub fn new(image_width: u32, image_height: u32, transform: GeoTransform) -> Self {
        Self {
            image_width,
            image_height,
            transform,
        }
    }

    /// Whole-world equirectangular map
    pub fn plate_carree(image_width: u32, image_height: u32) -> Self {
        Self::new(
            image_width,
            image_height,
            GeoTransform::plate_carree(image_width, image_height),
        )
    }

    /// Whether `pos` lies on the drawn image
    pub fn contains(&self, pos: &PixelPos) -> bool {
        pos.is_finite()
            && (0.0..=self.image_width as f64).contains(&pos.col)
            && (0.0..=self.image_height as f64).contains(&pos.row)
    }
}

/// Geographic to image-pixel projection with the vertical flip applied
#[derive(Debug, Clone, Copy)]
pub struct GeoProjector {
    transform: GeoTransform,
    inverse: Matrix3<f64>,
    image_height: f64,
}

impl GeoProjector {
    pub fn new(transform: &GeoTransform, image_height: f64) -> Result<Self, SessionError> {
        if !(image_height > 0.0 && image_height.is_finite()) {
            return Err(SessionError::Configuration(format!(
                "image height must be positive, got {}",
                image_height
            )));
        }

        Ok(Self {
            transform: *transform,
            inverse: transform.inverse()?,
            image_height,
        })
    }

    pub fn for_base_map(base_map: &BaseMap) -> Result<Self, SessionError> {
        Self::new(&base_map.transform, base_map.image_height as f64)
    }

    /// Project a subpoint (degrees) to pixel coordinates
    pub fn project(&self, latitude_deg: f64, longitude_deg: f64) -> PixelPos {
        let p = self.inverse * Vector3::new(longitude_deg, latitude_deg, 1.0);
        PixelPos::new(p.x, self.image_height - p.y)
    }

    /// Pixel coordinates back to (latitude, longitude) in degrees
    pub fn unproject(&self, pos: &PixelPos) -> (f64, f64) {
        let (lon, lat) = self.transform.forward(pos.col, self.image_height - pos.row);
        (lat, lon)
    }

    pub fn image_height(&self) -> f64 {
        self.image_height
    }
}

/// One-shot projection for callers without a long-lived projector
pub fn project(
    latitude_deg: f64,
    longitude_deg: f64,
    transform: &GeoTransform,
    image_height: f64,
) -> Result<PixelPos, SessionError> {
    Ok(GeoProjector::new(transform, image_height)?.project(latitude_deg, longitude_deg))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// lon [-180, 180] -> col [0, 1000], lat [-90, 90] -> row [0, 1000]
    fn square_world() -> GeoTransform {
        GeoTransform::new(0.36, 0.0, -180.0, 0.0, 0.18, -90.0)
    }

    #[test]
    fn test_origin_projects_to_image_center() {
        let pos = project(0.0, 0.0, &square_world(), 1000.0).unwrap();
        assert!((pos.col - 500.0).abs() < 1e-9);
        assert!((pos.row - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_flip() {
        let projector = GeoProjector::new(&square_world(), 1000.0).unwrap();
        // Raw row for lat 45 is 750; flipped is 250
        let pos = projector.project(45.0, 90.0);
        assert!((pos.col - 750.0).abs() < 1e-9);
        assert!((pos.row - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_projection_round_trip_grid() {
        let transforms = [
            square_world(),
            GeoTransform::plate_carree(2048, 1024),
            GeoTransform::from_gdal([-180.0, 0.1, 0.002, 90.0, 0.001, -0.1]),
        ];

        for transform in transforms {
            let projector = GeoProjector::new(&transform, 1024.0).unwrap();
            for lat in (-80..=80).step_by(20) {
                for lon in (-170..=170).step_by(34) {
                    let (lat, lon) = (lat as f64 + 0.25, lon as f64 - 0.5);
                    let pixel = projector.project(lat, lon);

                    let (back_lon, back_lat) =
                        transform.forward(pixel.col, projector.image_height() - pixel.row);
                    assert!((back_lat - lat).abs() < 1e-9, "lat {} -> {}", lat, back_lat);
                    assert!((back_lon - lon).abs() < 1e-9, "lon {} -> {}", lon, back_lon);

                    let (u_lat, u_lon) = projector.unproject(&pixel);
                    assert!((u_lat - lat).abs() < 1e-9);
                    assert!((u_lon - lon).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_plate_carree_north_up() {
        let projector = GeoProjector::for_base_map(&BaseMap::plate_carree(2048, 1024)).unwrap();
        let equator = projector.project(0.0, 0.0);
        assert!((equator.col - 1024.0).abs() < 1e-9);
        assert!((equator.row - 512.0).abs() < 1e-9);

        // Rows grow northward after the flip
        let north = projector.project(60.0, 0.0);
        assert!(north.row > equator.row);
    }

    #[test]
    fn test_singular_transform_is_configuration_error() {
        let singular = GeoTransform::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0);
        let err = GeoProjector::new(&singular, 100.0).unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));

        let zero = GeoTransform::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(project(0.0, 0.0, &zero, 100.0).is_err());
    }

    #[test]
    fn test_non_positive_height_rejected() {
        assert!(GeoProjector::new(&square_world(), 0.0).is_err());
        assert!(GeoProjector::new(&square_world(), f64::NAN).is_err());
    }

    #[test]
    fn test_base_map_contains() {
        let map = BaseMap::plate_carree(1000, 500);
        assert!(map.contains(&PixelPos::new(0.0, 0.0)));
        assert!(map.contains(&PixelPos::new(1000.0, 500.0)));
        assert!(!map.contains(&PixelPos::new(-0.1, 10.0)));
        assert!(!map.contains(&PixelPos::new(10.0, 500.5)));
        assert!(!map.contains(&PixelPos::new(f64::NAN, 10.0)));
    }
}
