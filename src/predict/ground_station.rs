use serde::{Deserialize, Serialize};

pub const EARTH_ROTATION_RAD_S: f64 = 7.292_115e-5;

// WGS-84 constants
const WGS84_A_KM: f64 = 6378.137;
const WGS84_E2: f64 = 0.006_694_379_990_14;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GroundStation {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    #[serde(default)]
    pub altitude_m: f64,
}

impl Default for GroundStation {
    /// Priddis radio observatory, south-west of Calgary.
    fn default() -> Self {
        Self {
            latitude_deg: 50.8688,
            longitude_deg: -114.2910,
            altitude_m: 1279.0,
        }
    }
}

impl GroundStation {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        }
    }

    pub fn from_coordinates(coordinates: &str, altitude_m: Option<f64>) -> Option<Self> {
        let parts: Vec<_> = coordinates.split(',').map(|s| s.trim()).collect();
        if parts.len() < 2 {
            return None;
        }
        let lat = parts[0].parse().ok()?;
        let lon = parts[1].parse().ok()?;
        Some(Self::new(lat, lon, altitude_m.unwrap_or(0.0)))
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }

    pub fn position_ecef_km(&self) -> [f64; 3] {
        geodetic_to_ecef(self.lat_rad(), self.lon_rad(), self.altitude_m / 1000.0)
    }
}

pub fn geodetic_to_ecef(lat_rad: f64, lon_rad: f64, alt_km: f64) -> [f64; 3] {
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    [
        (n + alt_km) * cos_lat * lon_rad.cos(),
        (n + alt_km) * cos_lat * lon_rad.sin(),
        (n * (1.0 - WGS84_E2) + alt_km) * sin_lat,
    ]
}

/// Geodetic latitude, longitude (radians) and altitude (km) of an Earth-fixed
/// position. Iterates on latitude until it settles below 1e-12 rad.
pub fn ecef_to_geodetic(ecef: [f64; 3]) -> (f64, f64, f64) {
    let [x, y, z] = ecef;
    let lon = y.atan2(x);
    let p = (x * x + y * y).sqrt();
    let mut lat = z.atan2(p * (1.0 - WGS84_E2));
    let mut n = WGS84_A_KM;

    for _ in 0..10 {
        let sin_lat = lat.sin();
        n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        let next = (z + n * WGS84_E2 * sin_lat).atan2(p);
        if (next - lat).abs() < 1e-12 {
            lat = next;
            break;
        }
        lat = next;
    }

    let alt = if lat.cos().abs() > 1e-9 {
        p / lat.cos() - n
    } else {
        z.abs() - n * (1.0 - WGS84_E2)
    };
    (lat, lon, alt)
}
