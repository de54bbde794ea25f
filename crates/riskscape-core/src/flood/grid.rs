//! Adaptive flood grid: zoom-dependent cell size and per-cell water depth.
use serde::{Deserialize, Serialize};

use crate::config::FloodConfig;
use crate::coords::GeoPoint;
use crate::terrain::{TerrainMetricsProvider, TerrainSample};

/// Rainfall (mm) at which the rain factor saturates.
const RAIN_SATURATION_MM: f64 = 20.0;
/// Depth (m) produced by saturated rain on sea-level terrain.
const RAIN_DEPTH_SCALE: f64 = 4.0;
/// Depth lost per metre of elevation.
const ELEVATION_DEPTH_LOSS: f64 = 0.02;
/// Lower bound on the drainage multiplier so steep cells can still pond.
const MIN_DRAINAGE: f64 = 0.1;

/// Cell size and half-extent of the grid, both in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    pub step: f64,
    pub radius: f64,
}

impl GridParams {
    /// Cells per side. At least one.
    pub fn cells_per_side(&self) -> usize {
        if self.step <= 0.0 || !self.step.is_finite() || !self.radius.is_finite() {
            return 1;
        }
        ((2.0 * self.radius / self.step).round() as usize).max(1)
    }
}

/// Finer, smaller grid at high zoom; coarser, wider grid otherwise.
pub fn zoom_to_grid_params(zoom: u32, config: &FloodConfig) -> GridParams {
    if zoom >= config.fine_zoom {
        config.fine_grid
    } else {
        config.coarse_grid
    }
}

/// One flooded grid square.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodCell {
    /// Corners SW, NW, NE, SE.
    pub polygon: [GeoPoint; 4],
    /// Water depth in metres, within `[0, max_depth]`.
    pub depth: f64,
}

/// Water depth for one cell, before the `max_depth` clamp.
pub fn cell_depth(effective_rainfall_mm: f64, terrain: &TerrainSample) -> f64 {
    let rain = if effective_rainfall_mm.is_finite() { effective_rainfall_mm.max(0.0) } else { 0.0 };
    let rain_factor = (rain / RAIN_SATURATION_MM).min(1.0);
    let ponding = (rain_factor * RAIN_DEPTH_SCALE - terrain.elevation * ELEVATION_DEPTH_LOSS).max(0.0);
    ponding * terrain.drainage.max(MIN_DRAINAGE)
}

/// Build the sparse list of flooded cells around `center`.
///
/// Cells run south to north, then west to east. Terrain is sampled at each
/// cell centre; cells with no standing water are left out.
pub fn build_flood_cells(
    terrain: &TerrainMetricsProvider,
    center: GeoPoint,
    effective_rainfall_mm: f64,
    zoom: u32,
    config: &FloodConfig,
) -> Vec<FloodCell> {
    let params = zoom_to_grid_params(zoom, config);
    let n = params.cells_per_side();
    let origin = center.offset(-params.radius, -params.radius);
    let max_depth = config.max_depth;

    let build_row = |row: usize| -> Vec<FloodCell> {
        let lat0 = origin.lat + row as f64 * params.step;
        (0..n)
            .filter_map(|col| {
                let lng0 = origin.lng + col as f64 * params.step;
                let centre = GeoPoint::new(lat0 + params.step / 2.0, lng0 + params.step / 2.0);
                let sample = terrain.terrain_metrics(centre);
                let depth = cell_depth(effective_rainfall_mm, &sample).min(max_depth);
                if depth <= 0.0 {
                    return None;
                }
                let (lat1, lng1) = (lat0 + params.step, lng0 + params.step);
                Some(FloodCell {
                    polygon: [
                        GeoPoint::new(lat0, lng0),
                        GeoPoint::new(lat1, lng0),
                        GeoPoint::new(lat1, lng1),
                        GeoPoint::new(lat0, lng1),
                    ],
                    depth,
                })
            })
            .collect()
    };

    #[cfg(feature = "threading")]
    {
        use rayon::prelude::*;
        (0..n).into_par_iter().flat_map_iter(build_row).collect()
    }

    #[cfg(not(feature = "threading"))]
    {
        (0..n).flat_map(build_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{ElevationSource, FlatElevation};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn flat(elevation: f64) -> TerrainMetricsProvider {
        TerrainMetricsProvider::with_defaults(Arc::new(FlatElevation(elevation)))
    }

    #[test]
    fn zoom_selects_grid_resolution() {
        let cfg = FloodConfig::default();
        let fine = zoom_to_grid_params(16, &cfg);
        let coarse = zoom_to_grid_params(11, &cfg);
        assert!(fine.step < coarse.step);
        assert!(fine.radius < coarse.radius);
        assert_eq!(zoom_to_grid_params(cfg.fine_zoom, &cfg), fine);
        assert_eq!(fine.cells_per_side(), 20);
    }

    #[test]
    fn depth_formula_on_flat_sea_level() {
        let t = TerrainSample::derive(0.0, 0.0, 55.66, 0.6);
        assert_relative_eq!(cell_depth(10.0, &t), 2.0, epsilon = 1e-12);
        // Rain factor saturates at 20 mm.
        assert_relative_eq!(cell_depth(80.0, &t), 4.0, epsilon = 1e-12);
        assert_eq!(cell_depth(0.0, &t), 0.0);
        assert_eq!(cell_depth(f64::NAN, &t), 0.0);
    }

    #[test]
    fn steep_cells_keep_minimum_drainage() {
        let t = TerrainSample::derive(0.0, 100.0, 55.66, 0.6);
        assert_eq!(t.drainage, 0.0);
        assert_relative_eq!(cell_depth(20.0, &t), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn cells_clamped_to_max_depth() {
        let cfg = FloodConfig::default();
        let cells = build_flood_cells(&flat(0.0), GeoPoint::new(19.0, 72.8), 100.0, 15, &cfg);
        assert_eq!(cells.len(), 400);
        assert!(cells.iter().all(|c| c.depth <= cfg.max_depth && c.depth > 0.0));
        assert!(cells.iter().any(|c| c.depth == cfg.max_depth));
    }

    #[test]
    fn high_ground_produces_sparse_output() {
        let cfg = FloodConfig::default();
        // 4 m of ponding is fully offset at 200 m elevation.
        let cells = build_flood_cells(&flat(250.0), GeoPoint::new(19.0, 72.8), 100.0, 15, &cfg);
        assert!(cells.is_empty());
    }

    #[test]
    fn only_low_half_floods_on_a_split_plateau() {
        let cfg = FloodConfig::default();
        let center = GeoPoint::new(19.0, 72.8);
        let source: Arc<dyn ElevationSource> =
            Arc::new(move |p: GeoPoint| Some(if p.lng < center.lng { 0.0 } else { 500.0 }));
        let terrain = TerrainMetricsProvider::with_defaults(source);
        let cells = build_flood_cells(&terrain, center, 40.0, 15, &cfg);
        assert_eq!(cells.len(), 200);
        assert!(cells.iter().all(|c| c.polygon[2].lng <= center.lng + 1e-9));
    }

    #[test]
    fn polygon_corners_span_one_step() {
        let cfg = FloodConfig::default();
        let cells = build_flood_cells(&flat(0.0), GeoPoint::new(0.0, 0.0), 10.0, 10, &cfg);
        let c = &cells[0];
        let step = cfg.coarse_grid.step;
        assert_relative_eq!(c.polygon[1].lat - c.polygon[0].lat, step, epsilon = 1e-12);
        assert_relative_eq!(c.polygon[3].lng - c.polygon[0].lng, step, epsilon = 1e-12);
        assert_relative_eq!(c.polygon[0].lat, -cfg.coarse_grid.radius, epsilon = 1e-12);
    }
}
