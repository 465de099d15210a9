//! WGS84 geodesy and Earth rotation helpers

use nalgebra::Vector3;

/// WGS84 semi-major axis in kilometers
pub const WGS84_A_KM: f64 = 6378.137;
/// WGS84 flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// First eccentricity squared
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

pub const SECONDS_PER_DAY: f64 = 86_400.0;
const J2000_UNIX_SECONDS: f64 = 946_728_000.0;
const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;
const GMST_BASE_DEG: f64 = 280.460_618_37;
const GMST_ROTATION_PER_DAY: f64 = 360.985_647_366_29;
const GMST_CORRECTION: f64 = 0.000_387_933;

/// Geodetic coordinates on the WGS84 ellipsoid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodetic {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub height_km: f64,
}

/// Earth-fixed Cartesian position (km) of a geodetic point
pub fn geodetic_to_ecef_km(latitude_deg: f64, longitude_deg: f64, height_km: f64) -> Vector3<f64> {
    let (sin_lat, cos_lat) = latitude_deg.to_radians().sin_cos();
    let (sin_lon, cos_lon) = longitude_deg.to_radians().sin_cos();
    let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    Vector3::new(
        (n + height_km) * cos_lat * cos_lon,
        (n + height_km) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + height_km) * sin_lat,
    )
}

/// Geodetic coordinates of an Earth-fixed position (km)
pub fn ecef_to_geodetic(position_km: &Vector3<f64>) -> Geodetic {
    let (x, y, z) = (position_km.x, position_km.y, position_km.z);
    let p = x.hypot(y);
    let longitude = y.atan2(x);

    let mut latitude = z.atan2(p * (1.0 - WGS84_E2));
    let mut height = 0.0;
    for _ in 0..8 {
        let (sin_lat, cos_lat) = latitude.sin_cos();
        let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        height = p * cos_lat + (z + WGS84_E2 * n * sin_lat) * sin_lat - n;
        let next = z.atan2(p * (1.0 - WGS84_E2 * n / (n + height)));
        let converged = (next - latitude).abs() < 1e-14;
        latitude = next;
        if converged {
            break;
        }
    }

    Geodetic {
        latitude_deg: latitude.to_degrees(),
        longitude_deg: normalize_longitude(longitude.to_degrees()),
        height_km: height,
    }
}

/// Wrap a longitude into [-180, 180]
pub fn normalize_longitude(lon_deg: f64) -> f64 {
    let mut lon = lon_deg;
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon < -180.0 {
        lon += 360.0;
    }
    lon
}

/// Greenwich Mean Sidereal Time in radians at a Unix timestamp (seconds)
pub fn greenwich_mean_sidereal_time(unix_seconds: f64) -> f64 {
    let days_since_j2000 = (unix_seconds - J2000_UNIX_SECONDS) / SECONDS_PER_DAY;
    let centuries = days_since_j2000 / DAYS_PER_JULIAN_CENTURY;
    let gmst_degrees = GMST_BASE_DEG
        + GMST_ROTATION_PER_DAY * days_since_j2000
        + GMST_CORRECTION * centuries * centuries
        - centuries * centuries * centuries / 38_710_000.0;
    gmst_degrees.rem_euclid(360.0).to_radians()
}

/// Rotate an inertial (TEME) vector into the Earth-fixed frame
///
/// Polar motion is ignored; the error is a few meters at LEO.
pub fn inertial_to_earth_fixed(v: &Vector3<f64>, gmst_rad: f64) -> Vector3<f64> {
    let (sin_g, cos_g) = gmst_rad.sin_cos();
    Vector3::new(
        cos_g * v.x + sin_g * v.y,
        -sin_g * v.x + cos_g * v.y,
        v.z,
    )
}
