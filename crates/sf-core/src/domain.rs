//! Geographic simulation domain.

use core::fmt;

/// Latitude band covered by the regional high-resolution forcing product.
pub const LOCAL_LAT_RANGE: (f64, f64) = (30.37, 45.7);
/// Longitude band covered by the regional high-resolution forcing product.
pub const LOCAL_LON_RANGE: (f64, f64) = (-17.25, 36.0);

/// Rectangular lat/lon bounding box in degrees.
///
/// Computed once when a run is initialized and handed unchanged to
/// acquisition, preprocessing, postprocessing and presentation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Domain {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Domain {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// Square box of half-width `delta` degrees around a point.
    pub fn around(lat: f64, lon: f64, delta: f64) -> Self {
        Self::new(lat - delta, lat + delta, lon - delta, lon + delta)
    }

    /// Center as `(mean latitude, mean longitude)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.lat_min + self.lat_max) / 2.0,
            (self.lon_min + self.lon_max) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    pub fn height(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }

    /// Forcing provider region for this domain.
    pub fn region(&self) -> Region {
        Region::select(self)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lat [{:.4}, {:.4}] x lon [{:.4}, {:.4}]",
            self.lat_min, self.lat_max, self.lon_min, self.lon_max
        )
    }
}

/// Which forcing provider coverage a domain falls into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Region {
    /// Regional high-resolution product.
    Local,
    Global,
}

impl Region {
    /// Pure function of the domain center. Both bands are open intervals, so a
    /// center sitting exactly on a band edge selects `Global`.
    pub fn select(domain: &Domain) -> Self {
        let (lat, lon) = domain.center();
        let in_lat = LOCAL_LAT_RANGE.0 < lat && lat < LOCAL_LAT_RANGE.1;
        let in_lon = LOCAL_LON_RANGE.0 < lon && lon < LOCAL_LON_RANGE.1;
        if in_lat && in_lon {
            Region::Local
        } else {
            Region::Global
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Region::Local => "local",
            Region::Global => "global",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
