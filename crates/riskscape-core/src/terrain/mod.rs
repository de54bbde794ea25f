//! Point terrain metrics: elevation lookup with memoisation, and the slope,
//! drainage and heat proxies derived from two nearby elevation probes.
//!
//! Every lookup is fail-soft. An unavailable or non-finite elevation reads as
//! 0 m and is logged, never surfaced as an error.
pub mod cache;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::config::TerrainConfig;
use crate::coords::{GeoPoint, METRES_PER_DEGREE};
use cache::ElevationCache;

/// External terrain data provider. `None` means "no data here".
pub trait ElevationSource: Send + Sync {
    fn elevation(&self, point: GeoPoint) -> Option<f64>;
}

impl<F> ElevationSource for F
where
    F: Fn(GeoPoint) -> Option<f64> + Send + Sync,
{
    fn elevation(&self, point: GeoPoint) -> Option<f64> {
        self(point)
    }
}

/// Constant-elevation source, handy for hosts without a DEM.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatElevation(pub f64);

impl ElevationSource for FlatElevation {
    fn elevation(&self, _point: GeoPoint) -> Option<f64> {
        Some(self.0)
    }
}

/// Derived terrain description at one point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainSample {
    /// Metres above sea level.
    pub elevation: f64,
    /// Rise over run, unitless.
    pub slope: f64,
    /// 0 (steep) to 1 (flat); how readily standing water accumulates.
    pub drainage: f64,
    /// Urban heat proxy, ≥ 0.
    pub heat: f64,
}

impl TerrainSample {
    /// Build a sample from the elevation at a point and at a probe
    /// `offset_m` metres away.
    pub fn derive(elevation: f64, probe_elevation: f64, offset_m: f64, built_density: f64) -> Self {
        let slope = if offset_m > 0.0 {
            (probe_elevation - elevation).abs() / offset_m
        } else {
            0.0
        };
        let drainage = (1.0 - slope * 4.0).clamp(0.0, 1.0);
        let heat = (1.0 + built_density * 2.0 - elevation * 0.002 - slope * 0.4).max(0.0);
        Self { elevation, slope, drainage, heat }
    }
}

pub struct TerrainMetricsProvider {
    source: Arc<dyn ElevationSource>,
    cache: Mutex<ElevationCache>,
    config: TerrainConfig,
}

impl TerrainMetricsProvider {
    pub fn new(source: Arc<dyn ElevationSource>, config: TerrainConfig) -> Self {
        let cache = ElevationCache::new(config.cache_capacity, config.eviction);
        Self {
            source,
            cache: Mutex::new(cache),
            config,
        }
    }

    pub fn with_defaults(source: Arc<dyn ElevationSource>) -> Self {
        Self::new(source, TerrainConfig::default())
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Uncached elevation in metres; 0 when the source has nothing.
    pub fn elevation(&self, point: GeoPoint) -> f64 {
        self.query(point).unwrap_or(0.0)
    }

    /// Memoised elevation. Unavailable answers read as 0 but are not cached,
    /// so a later query can still pick up real data.
    pub fn cached_elevation(&self, point: GeoPoint) -> f64 {
        let key = point.key();
        if let Some(hit) = self.lock_cache().get(&key) {
            return hit;
        }
        match self.query(point) {
            Some(elevation) => {
                self.lock_cache().insert(key, elevation);
                elevation
            }
            None => 0.0,
        }
    }

    pub fn terrain_metrics(&self, point: GeoPoint) -> TerrainSample {
        let offset_deg = self.config.slope_offset_deg;
        let here = self.cached_elevation(point);
        let probe = self.cached_elevation(point.offset(offset_deg, 0.0));
        TerrainSample::derive(here, probe, offset_deg * METRES_PER_DEGREE, self.config.built_density)
    }

    /// Population-weighted risk score from drainage and heat.
    pub fn calculate_risk(&self, point: GeoPoint, population: f64) -> f64 {
        let t = self.terrain_metrics(point);
        (t.drainage * 0.6 + t.heat * 0.4) * population.max(0.0)
    }

    /// Heuristic emergency response time in minutes. Not calibrated.
    pub fn emergency_response_time(&self, point: GeoPoint) -> u32 {
        let t = self.terrain_metrics(point);
        (5.0 + t.slope * 12.0 + t.drainage * 8.0).round().max(0.0) as u32
    }

    pub fn cache_len(&self) -> usize {
        self.lock_cache().len()
    }

    fn query(&self, point: GeoPoint) -> Option<f64> {
        if !point.is_finite() {
            return None;
        }
        match self.source.elevation(point) {
            Some(v) if v.is_finite() => Some(v),
            other => {
                tracing::warn!(
                    target: "riskscape::terrain",
                    lat = point.lat,
                    lng = point.lng,
                    value = ?other,
                    "elevation unavailable; using 0 m"
                );
                None
            }
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, ElevationCache> {
        // Entries are plain f64s; a poisoned lock is still consistent.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
