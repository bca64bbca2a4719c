//! Area spill initial condition from a slick shapefile.

use crate::coastline::rings_to_polygons;
use crate::error::{AppError, AppResult};
use geo::{GeodesicArea, Polygon};
use shapefile::{Reader, Shape};
use std::fmt::Write as _;
use std::path::Path;

/// Slick outline and the oil volume it represents.
#[derive(Debug, Clone)]
pub struct AreaSpill {
    pub polygons: Vec<Polygon<f64>>,
    pub area_m2: f64,
    pub volume_m3: f64,
}

impl AreaSpill {
    /// Geodesic area of `polygons` times a uniform thickness.
    pub fn from_polygons(polygons: Vec<Polygon<f64>>, thickness_m: f64) -> Self {
        let area_m2: f64 = polygons.iter().map(|p| p.geodesic_area_unsigned()).sum();
        Self {
            polygons,
            area_m2,
            volume_m3: area_m2 * thickness_m,
        }
    }

    pub fn load(path: &Path, thickness_m: f64) -> AppResult<Self> {
        let mut reader = Reader::from_path(path).map_err(|e| {
            AppError::Configuration(format!(
                "cannot read slick shapefile {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut polygons = Vec::new();
        for result in reader.iter_shapes_and_records() {
            let (shape, _record) = result.map_err(|e| {
                AppError::Configuration(format!("slick shapefile {}: {}", path.display(), e))
            })?;
            if let Shape::Polygon(polygon) = shape {
                polygons.extend(rings_to_polygons(polygon.rings()));
            }
        }

        if polygons.is_empty() {
            return Err(AppError::Configuration(format!(
                "slick shapefile {} has no polygons",
                path.display()
            )));
        }

        let spill = Self::from_polygons(polygons, thickness_m);
        tracing::info!(
            path = %path.display(),
            area_m2 = spill.area_m2,
            volume_m3 = spill.volume_m3,
            "area spill loaded"
        );
        Ok(spill)
    }

    /// Volume spread evenly over `n` spill points.
    pub fn split_volume(&self, n: usize) -> Vec<f64> {
        if n == 0 {
            return Vec::new();
        }
        vec![self.volume_m3 / n as f64; n]
    }

    /// Text initial condition: total volume, polygon count, then each
    /// polygon's exterior vertex count followed by `lat lon` rows.
    pub fn to_initial_slick(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:.6}", self.volume_m3);
        let _ = writeln!(out, "{}", self.polygons.len());
        for polygon in &self.polygons {
            let coords = &polygon.exterior().0;
            let _ = writeln!(out, "{}", coords.len());
            for c in coords {
                let _ = writeln!(out, "{:.6} {:.6}", c.y, c.x);
            }
        }
        out
    }

    pub fn write_initial_slick(&self, path: &Path) -> AppResult<()> {
        std::fs::write(path, self.to_initial_slick())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    // About 1.11 km x 0.91 km near 35N.
    fn patch() -> Polygon<f64> {
        let exterior = LineString::from(vec![
            (35.90, 35.25),
            (35.91, 35.25),
            (35.91, 35.26),
            (35.90, 35.26),
            (35.90, 35.25),
        ]);
        Polygon::new(exterior, vec![])
    }

    #[test]
    fn volume_is_area_times_thickness() {
        let spill = AreaSpill::from_polygons(vec![patch()], 1.0e-4);
        assert!(spill.area_m2 > 0.9e6 && spill.area_m2 < 1.1e6, "{}", spill.area_m2);
        assert!((spill.volume_m3 - spill.area_m2 * 1.0e-4).abs() < 1e-9);
    }

    #[test]
    fn volumes_add_over_polygons() {
        let one = AreaSpill::from_polygons(vec![patch()], 1.0e-4);
        let two = AreaSpill::from_polygons(vec![patch(), patch()], 1.0e-4);
        assert!((two.volume_m3 - 2.0 * one.volume_m3).abs() < 1e-6);
    }

    #[test]
    fn split_keeps_length_and_total() {
        let spill = AreaSpill::from_polygons(vec![patch()], 1.0e-4);
        let rates = spill.split_volume(3);
        assert_eq!(rates.len(), 3);
        assert!((rates.iter().sum::<f64>() - spill.volume_m3).abs() < 1e-9);
    }

    #[test]
    fn initial_slick_lists_vertices_lat_first() {
        let text = AreaSpill::from_polygons(vec![patch()], 1.0e-4).to_initial_slick();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "1");
        assert_eq!(lines[2], "5");
        assert_eq!(lines[3], "35.250000 35.900000");
        assert_eq!(lines.len(), 8);
    }
}
