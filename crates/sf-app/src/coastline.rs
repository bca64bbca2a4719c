//! Land/sea classification of spill coordinates.
//!
//! Land polygons are read from a coastline shapefile (GSHHS level 1 or any
//! polygon layer in lon/lat) and tested with `geo` point-in-polygon.

use crate::error::{AppError, AppResult};
use geo::orient::{Direction, Orient};
use geo::{BoundingRect, Contains, Coord, Intersects, LineString, MultiPolygon, Point, Polygon, Rect};
use shapefile::{PolygonRing, Reader, Shape};
use std::fmt;
use std::path::Path;

/// Margin in degrees added around the spill points when loading polygons.
const LOAD_MARGIN_DEG: f64 = 1.0;

pub trait LandClassifier {
    fn is_land(&self, lat: f64, lon: f64) -> bool;
}

/// A spill point that fell on land.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandPoint {
    pub index: usize,
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for LandPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({:.4}, {:.4})", self.index, self.lat, self.lon)
    }
}

/// Land polygons loaded from a shapefile.
pub struct CoastlineShapes {
    land: MultiPolygon<f64>,
}

impl CoastlineShapes {
    pub fn from_polygons(polygons: Vec<Polygon<f64>>) -> Self {
        Self {
            land: MultiPolygon(polygons),
        }
    }

    /// Load every polygon whose bounding box intersects `window`
    /// (`lon`/`lat` rectangle). `None` loads the whole layer.
    pub fn load(path: &Path, window: Option<Rect<f64>>) -> AppResult<Self> {
        let mut reader = Reader::from_path(path).map_err(|e| {
            AppError::Configuration(format!(
                "cannot read coastline shapefile {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut polygons = Vec::new();
        for result in reader.iter_shapes_and_records() {
            let (shape, _record) = result.map_err(|e| {
                AppError::Configuration(format!("coastline shapefile {}: {}", path.display(), e))
            })?;
            if let Shape::Polygon(polygon) = shape {
                for poly in rings_to_polygons(polygon.rings()) {
                    let keep = match (&window, poly.bounding_rect()) {
                        (Some(w), Some(bbox)) => bbox.intersects(w),
                        (None, _) => true,
                        (Some(_), None) => false,
                    };
                    if keep {
                        polygons.push(poly);
                    }
                }
            }
        }

        tracing::debug!(path = %path.display(), polygons = polygons.len(), "coastline loaded");
        Ok(Self::from_polygons(polygons))
    }

    /// Load only the polygons near the given points.
    pub fn load_around(path: &Path, lats: &[f64], lons: &[f64]) -> AppResult<Self> {
        Self::load(path, points_window(lats, lons))
    }

    pub fn polygon_count(&self) -> usize {
        self.land.0.len()
    }
}

impl LandClassifier for CoastlineShapes {
    fn is_land(&self, lat: f64, lon: f64) -> bool {
        self.land.contains(&Point::new(lon, lat))
    }
}

/// Outer rings start a polygon; inner rings become holes of the last one.
/// Shapefile outer rings are clockwise, so every polygon is reoriented to
/// the counter-clockwise exterior `geo` area algorithms expect.
pub(crate) fn rings_to_polygons(rings: &[PolygonRing<shapefile::Point>]) -> Vec<Polygon<f64>> {
    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for ring in rings {
        let line = LineString::from(
            ring.points()
                .iter()
                .map(|p| Coord { x: p.x, y: p.y })
                .collect::<Vec<_>>(),
        );
        match ring {
            PolygonRing::Outer(_) => polygons.push((line, Vec::new())),
            PolygonRing::Inner(_) => match polygons.last_mut() {
                Some((_, holes)) => holes.push(line),
                None => polygons.push((line, Vec::new())),
            },
        }
    }
    polygons
        .into_iter()
        .map(|(exterior, holes)| Polygon::new(exterior, holes).orient(Direction::Default))
        .collect()
}

fn points_window(lats: &[f64], lons: &[f64]) -> Option<Rect<f64>> {
    let fold = |values: &[f64]| {
        values.iter().fold(None, |acc: Option<(f64, f64)>, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    };
    let (lat_lo, lat_hi) = fold(lats)?;
    let (lon_lo, lon_hi) = fold(lons)?;
    Some(Rect::new(
        Coord {
            x: lon_lo - LOAD_MARGIN_DEG,
            y: lat_lo - LOAD_MARGIN_DEG,
        },
        Coord {
            x: lon_hi + LOAD_MARGIN_DEG,
            y: lat_hi + LOAD_MARGIN_DEG,
        },
    ))
}

/// Aggregate check: every land point is reported, not just the first.
pub fn check_spill_points(
    classifier: &dyn LandClassifier,
    lats: &[f64],
    lons: &[f64],
) -> AppResult<()> {
    let on_land: Vec<LandPoint> = lats
        .iter()
        .zip(lons)
        .enumerate()
        .filter(|(_, (lat, lon))| classifier.is_land(**lat, **lon))
        .map(|(index, (&lat, &lon))| LandPoint { index, lat, lon })
        .collect();

    if on_land.is_empty() {
        Ok(())
    } else {
        Err(AppError::LandLocked { points: on_land })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Square island covering lat 34.9..35.1, lon 36.3..36.6.
    pub(crate) fn island() -> CoastlineShapes {
        let exterior = LineString::from(vec![
            (36.3, 34.9),
            (36.6, 34.9),
            (36.6, 35.1),
            (36.3, 35.1),
            (36.3, 34.9),
        ]);
        CoastlineShapes::from_polygons(vec![Polygon::new(exterior, vec![])])
    }

    /// Write one polygon per ring list as a `.shp`/`.shx`/`.dbf` triple.
    /// Points are `(lon, lat)`; outer rings are stored clockwise.
    pub(crate) fn write_polygon_shapefile(path: &Path, outlines: &[Vec<(f64, f64)>]) {
        use shapefile::dbase::{FieldValue, Record, TableWriterBuilder};

        let table = TableWriterBuilder::new().add_character_field("name".try_into().unwrap(), 16);
        let mut writer = shapefile::Writer::from_path(path, table).unwrap();
        for (k, outline) in outlines.iter().enumerate() {
            let ring = PolygonRing::Outer(
                outline
                    .iter()
                    .map(|&(x, y)| shapefile::Point::new(x, y))
                    .collect(),
            );
            let mut record = Record::default();
            record.insert(
                "name".to_string(),
                FieldValue::Character(Some(format!("poly{k}"))),
            );
            writer
                .write_shape_and_record(&shapefile::Polygon::new(ring), &record)
                .unwrap();
        }
    }

    fn temp(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("sf_app_coastline").join(tag);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn shapefile_land_is_loaded_near_points() {
        let dir = temp("load");
        let path = dir.join("land.shp");
        write_polygon_shapefile(
            &path,
            &[
                vec![(36.3, 34.9), (36.3, 35.1), (36.6, 35.1), (36.6, 34.9), (36.3, 34.9)],
                vec![(10.0, 50.0), (10.0, 51.0), (11.0, 51.0), (11.0, 50.0), (10.0, 50.0)],
            ],
        );

        let coast = CoastlineShapes::load_around(&path, &[35.25, 35.0], &[35.9, 36.5]).unwrap();
        assert_eq!(coast.polygon_count(), 1);
        assert!(coast.is_land(35.0, 36.5));
        assert!(!coast.is_land(35.25, 35.9));

        let whole = CoastlineShapes::load(&path, None).unwrap();
        assert_eq!(whole.polygon_count(), 2);
        assert!(whole.is_land(50.5, 10.5));
    }

    #[test]
    fn missing_coastline_is_configuration_error() {
        let dir = temp("missing");
        assert!(matches!(
            CoastlineShapes::load(&dir.join("absent.shp"), None),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn clockwise_rings_are_reoriented() {
        use geo::Winding;

        let outer = PolygonRing::Outer(vec![
            shapefile::Point::new(0.0, 0.0),
            shapefile::Point::new(0.0, 1.0),
            shapefile::Point::new(1.0, 1.0),
            shapefile::Point::new(1.0, 0.0),
            shapefile::Point::new(0.0, 0.0),
        ]);
        let polys = rings_to_polygons(&[outer]);
        assert!(polys[0].exterior().is_ccw());
    }

    #[test]
    fn sea_points_pass() {
        let coast = island();
        assert!(check_spill_points(&coast, &[35.25, 35.3], &[35.90, 35.95]).is_ok());
    }

    #[test]
    fn any_land_point_rejects_all_and_lists_each() {
        let coast = island();
        let err = check_spill_points(&coast, &[35.0, 35.25, 34.95], &[36.5, 35.9, 36.4])
            .unwrap_err();
        match err {
            AppError::LandLocked { points } => {
                let indices: Vec<usize> = points.iter().map(|p| p.index).collect();
                assert_eq!(indices, vec![0, 2]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn window_spans_points_with_margin() {
        let w = points_window(&[35.0, 36.0], &[20.0, 21.0]).unwrap();
        assert_eq!(w.min(), Coord { x: 19.0, y: 34.0 });
        assert_eq!(w.max(), Coord { x: 22.0, y: 37.0 });
        assert!(points_window(&[], &[]).is_none());
    }

    #[test]
    fn inner_rings_become_holes() {
        let outer = PolygonRing::Outer(vec![
            shapefile::Point::new(0.0, 0.0),
            shapefile::Point::new(0.0, 10.0),
            shapefile::Point::new(10.0, 10.0),
            shapefile::Point::new(10.0, 0.0),
            shapefile::Point::new(0.0, 0.0),
        ]);
        let inner = PolygonRing::Inner(vec![
            shapefile::Point::new(4.0, 4.0),
            shapefile::Point::new(6.0, 4.0),
            shapefile::Point::new(6.0, 6.0),
            shapefile::Point::new(4.0, 6.0),
            shapefile::Point::new(4.0, 4.0),
        ]);
        let polys = rings_to_polygons(&[outer, inner]);
        assert_eq!(polys.len(), 1);
        let coast = CoastlineShapes::from_polygons(polys);
        assert!(coast.is_land(2.0, 2.0));
        assert!(!coast.is_land(5.0, 5.0));
    }
}
