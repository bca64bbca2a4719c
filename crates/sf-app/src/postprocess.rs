//! Combined surface concentration dataset.
//!
//! Each event's solver output carries a surface concentration table
//! (`time_h,lon,lat,concentration`). Records are summed onto a regular grid
//! over the run domain across all events. Each output time stores only the
//! cells that received oil.

use crate::error::{AppError, AppResult};
use serde::Deserialize;
use sf_core::Domain;
use sf_results::{ConcentrationDataset, GridCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONCENTRATION_UNITS: &str = "tons/km2";

/// Output times closer than this are treated as the same time.
const TIME_KEY_SCALE: f64 = 1000.0;

#[derive(Debug, Deserialize)]
struct SurfaceRecord {
    time_h: f64,
    lon: f64,
    lat: f64,
    concentration: f64,
}

/// Regular grid over a domain.
#[derive(Debug, Clone)]
pub struct Grid {
    domain: Domain,
    resolution: f64,
    nx: usize,
    ny: usize,
}

impl Grid {
    pub fn new(domain: Domain, resolution: f64) -> Self {
        let cells = |extent: f64| ((extent / resolution) - 1e-9).ceil().max(1.0) as usize;
        Self {
            domain,
            resolution,
            nx: cells(domain.width()),
            ny: cells(domain.height()),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    pub fn lon_centers(&self) -> Vec<f64> {
        (0..self.nx)
            .map(|i| self.domain.lon_min + (i as f64 + 0.5) * self.resolution)
            .collect()
    }

    pub fn lat_centers(&self) -> Vec<f64> {
        (0..self.ny)
            .map(|j| self.domain.lat_min + (j as f64 + 0.5) * self.resolution)
            .collect()
    }

    /// `(j, i)` cell of a point, or `None` outside the domain.
    pub fn cell(&self, lat: f64, lon: f64) -> Option<(usize, usize)> {
        if !self.domain.contains(lat, lon) {
            return None;
        }
        let i = ((lon - self.domain.lon_min) / self.resolution).floor() as usize;
        let j = ((lat - self.domain.lat_min) / self.resolution).floor() as usize;
        Some((j.min(self.ny - 1), i.min(self.nx - 1)))
    }

}

/// Surface tables to read: `out_dir/{file}` for a single event, or
/// `out_dir/slick{i}/{file}` for `i` in `1..=n_events`.
pub fn event_tables(
    out_dir: &Path,
    multiple_slick: bool,
    n_events: usize,
    surface_file: &str,
) -> Vec<(String, PathBuf)> {
    if multiple_slick {
        (1..=n_events)
            .map(|i| {
                let label = format!("slick{i}");
                let path = out_dir.join(&label).join(surface_file);
                (label, path)
            })
            .collect()
    } else {
        vec![("combined".to_string(), out_dir.join(surface_file))]
    }
}

pub fn aggregate(
    domain: &Domain,
    out_dir: &Path,
    multiple_slick: bool,
    n_events: usize,
    resolution: f64,
    surface_file: &str,
) -> AppResult<ConcentrationDataset> {
    let grid = Grid::new(*domain, resolution);
    let mut by_time: BTreeMap<i64, BTreeMap<(usize, usize), f64>> = BTreeMap::new();
    let mut events = Vec::new();
    let mut dropped = 0usize;

    for (label, path) in event_tables(out_dir, multiple_slick, n_events, surface_file) {
        if !path.is_file() {
            return Err(AppError::Postprocessing(format!(
                "missing surface output for {label}: {}",
                path.display()
            )));
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| AppError::Postprocessing(format!("{}: {}", path.display(), e)))?;

        let mut records = 0usize;
        for result in rdr.deserialize() {
            let record: SurfaceRecord = result
                .map_err(|e| AppError::Postprocessing(format!("{}: {}", path.display(), e)))?;
            records += 1;
            let Some((j, i)) = grid.cell(record.lat, record.lon) else {
                dropped += 1;
                continue;
            };
            let key = (record.time_h * TIME_KEY_SCALE).round() as i64;
            *by_time.entry(key).or_default().entry((j, i)).or_insert(0.0) += record.concentration;
        }

        tracing::debug!(event = %label, records, "surface table read");
        events.push(label);
    }

    if dropped > 0 {
        tracing::warn!(dropped, "surface records outside the domain were ignored");
    }

    let (time_h, concentration): (Vec<f64>, Vec<Vec<GridCell>>) = by_time
        .into_iter()
        .map(|(key, cells)| {
            let slice = cells
                .into_iter()
                .filter(|&(_, value)| value != 0.0)
                .map(|((j, i), value)| GridCell { j, i, value })
                .collect();
            (key as f64 / TIME_KEY_SCALE, slice)
        })
        .unzip();

    let dataset = ConcentrationDataset {
        lon: grid.lon_centers(),
        lat: grid.lat_centers(),
        time_h,
        concentration,
        events,
        units: CONCENTRATION_UNITS.to_string(),
    };
    let (ny, nx) = grid.shape();
    tracing::info!(
        times = dataset.time_h.len(),
        ny,
        nx,
        cells = dataset.stored_cells(),
        "concentration dataset built"
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("sf_app_postprocess").join(tag);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn domain() -> Domain {
        Domain::new(35.0, 36.0, 35.0, 36.0)
    }

    #[test]
    fn grid_covers_domain() {
        let grid = Grid::new(domain(), 0.25);
        assert_eq!(grid.shape(), (4, 4));
        assert_eq!(grid.lon_centers()[0], 35.125);
        assert_eq!(grid.cell(35.0, 35.0), Some((0, 0)));
        assert_eq!(grid.cell(36.0, 36.0), Some((3, 3)));
        assert_eq!(grid.cell(35.6, 35.1), Some((2, 0)));
        assert_eq!(grid.cell(36.1, 35.5), None);
    }

    #[test]
    fn separate_events_are_summed_per_time() {
        let out = temp("sum");
        for (slick, rows) in [
            ("slick1", "time_h,lon,lat,concentration\n1,35.1,35.1,2.0\n2,35.1,35.1,1.0\n"),
            ("slick2", "time_h,lon,lat,concentration\n1,35.1,35.1,3.0\n1,35.9,35.9,4.0\n"),
        ] {
            fs::create_dir_all(out.join(slick)).unwrap();
            fs::write(out.join(slick).join("surface_concentration.csv"), rows).unwrap();
        }

        let ds = aggregate(&domain(), &out, true, 2, 0.25, "surface_concentration.csv").unwrap();
        assert_eq!(ds.time_h, vec![1.0, 2.0]);
        assert_eq!(ds.events, vec!["slick1", "slick2"]);
        assert_eq!(ds.value_at(0, 0, 0), 5.0);
        assert_eq!(ds.value_at(0, 3, 3), 4.0);
        assert_eq!(ds.value_at(0, 1, 1), 0.0);
        assert_eq!(ds.concentration[0].len(), 2);
        assert_eq!(ds.total_at(1), 1.0);
    }

    #[test]
    fn fine_grid_keeps_only_touched_cells() {
        let out = temp("sparse");
        fs::write(
            out.join("surface_concentration.csv"),
            "time_h,lon,lat,concentration\n1,33.0,34.0,2.5\n1,36.9,37.9,1.0\n2,33.0,34.0,0\n",
        )
        .unwrap();
        let domain = Domain::new(31.0, 38.0, 32.0, 37.0);
        let ds = aggregate(&domain, &out, false, 1, 0.005, "surface_concentration.csv").unwrap();

        assert_eq!(ds.lat.len(), 1400);
        assert_eq!(ds.lon.len(), 1000);
        assert_eq!(ds.time_h, vec![1.0, 2.0]);
        assert_eq!(ds.stored_cells(), 2);
        assert!(ds.concentration[1].is_empty());
        assert_eq!(ds.value_at(0, 600, 200), 2.5);
        assert_eq!(ds.total_at(0), 3.5);
    }

    #[test]
    fn missing_event_output_fails() {
        let out = temp("missing");
        fs::create_dir_all(out.join("slick1")).unwrap();
        fs::write(
            out.join("slick1").join("surface_concentration.csv"),
            "time_h,lon,lat,concentration\n",
        )
        .unwrap();

        let err = aggregate(&domain(), &out, true, 2, 0.25, "surface_concentration.csv")
            .unwrap_err();
        assert!(matches!(err, AppError::Postprocessing(ref m) if m.contains("slick2")));
    }

    #[test]
    fn single_event_reads_out_dir() {
        let out = temp("single");
        fs::write(
            out.join("surface_concentration.csv"),
            "time_h, lon, lat, concentration\n0.5, 35.5, 35.5, 1.5\n",
        )
        .unwrap();
        let ds = aggregate(&domain(), &out, false, 1, 0.5, "surface_concentration.csv").unwrap();
        assert_eq!(ds.events, vec!["combined"]);
        assert_eq!(ds.time_h, vec![0.5]);
        assert_eq!(ds.value_at(0, 1, 1), 1.5);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn points_inside_domain_land_in_grid(
            lat_min in -60.0_f64..60.0,
            lon_min in -170.0_f64..160.0,
            extent in 0.1_f64..5.0,
            resolution in 0.01_f64..0.5,
            fy in 0.0_f64..=1.0,
            fx in 0.0_f64..=1.0,
        ) {
            let domain = Domain::new(lat_min, lat_min + extent, lon_min, lon_min + extent);
            let grid = Grid::new(domain, resolution);
            let (ny, nx) = grid.shape();
            let lat = lat_min + fy * extent;
            let lon = lon_min + fx * extent;
            if domain.contains(lat, lon) {
                let (j, i) = grid.cell(lat, lon).unwrap();
                prop_assert!(j < ny && i < nx);
                prop_assert_eq!(grid.lat_centers().len(), ny);
                prop_assert_eq!(grid.lon_centers().len(), nx);
            }
        }
    }
}
