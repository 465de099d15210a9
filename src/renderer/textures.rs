//! Base-map image loading

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use std::path::Path;

use satmap::{BaseMap, GeoProjector, PixelPos};

const OCEAN: [u8; 4] = [12, 24, 44, 255];
const GRATICULE: [u8; 4] = [40, 70, 110, 255];
const GRATICULE_STEP_DEG: f64 = 30.0;

/// Load the base-map raster from a file path
pub fn load_map_image(path: impl AsRef<Path>) -> Result<MapImage> {
    let path = path.as_ref();
    log::info!("Loading map image: {:?}", path);

    let img = image::open(path).with_context(|| format!("Failed to load map image: {:?}", path))?;

    Ok(MapImage::from_image(img))
}

/// RGBA pixels of the base map, top row first
pub struct MapImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl MapImage {
    pub fn from_image(img: DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        let rgba = img.to_rgba8();

        Self {
            width,
            height,
            data: rgba.into_raw(),
        }
    }

    /// Plain background with a lat/lon grid, used when no image is supplied
    pub fn graticule(base_map: &BaseMap, projector: &GeoProjector) -> Self {
        let width = base_map.image_width;
        let height = base_map.image_height;
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);

        // Half a pixel in degrees along each axis
        let col_tol = base_map.transform.a.abs().max(base_map.transform.b.abs());
        let row_tol = base_map.transform.d.abs().max(base_map.transform.e.abs());
        let tol = 0.5 * col_tol.max(row_tol);

        for y in 0..height {
            for x in 0..width {
                // Image rows run top-down, map rows bottom-up
                let pixel = PixelPos::new(x as f64 + 0.5, height as f64 - (y as f64 + 0.5));
                let (lat, lon) = projector.unproject(&pixel);
                let on_line = near_multiple(lat, GRATICULE_STEP_DEG, tol)
                    || near_multiple(lon, GRATICULE_STEP_DEG, tol);
                data.extend_from_slice(if on_line { &GRATICULE } else { &OCEAN });
            }
        }

        Self {
            width,
            height,
            data,
        }
    }

    pub fn to_color_image(&self) -> egui::ColorImage {
        egui::ColorImage::from_rgba_unmultiplied(
            [self.width as usize, self.height as usize],
            &self.data,
        )
    }
}

fn near_multiple(value: f64, step: f64, tol: f64) -> bool {
    let r = value.rem_euclid(step);
    r <= tol || step - r <= tol
}
