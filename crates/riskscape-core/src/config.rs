//! Tunable constants for every component, loadable from JSON.
//!
//! `ImpactConfig::default()` carries the documented fallback values, so a
//! missing or broken config file degrades to the built-in behaviour instead
//! of failing the caller.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::economy::{ImpactFactors, WorstCaseBounds};
use crate::flood::grid::GridParams;
use crate::terrain::cache::EvictionPolicy;

/// Environment variable naming an override config path.
pub const CONFIG_ENV_VAR: &str = "RISKSCAPE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read impact config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse impact config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    pub terrain: TerrainConfig,
    pub flood: FloodConfig,
    pub economy: EconomyConfig,
    pub scenario: ScenarioConfig,
}

impl ImpactConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Load from the path in [`CONFIG_ENV_VAR`], falling back to defaults.
    pub fn from_env_or_default() -> Self {
        let Some(path) = env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from) else {
            tracing::info!(target: "riskscape::config", "impact_config.loaded=builtin");
            return Self::default();
        };
        match Self::from_file(&path) {
            Ok(cfg) => {
                tracing::info!(
                    target: "riskscape::config",
                    path = %path.display(),
                    "impact_config.loaded=file"
                );
                cfg
            }
            Err(err) => {
                tracing::warn!(
                    target: "riskscape::config",
                    path = %path.display(),
                    error = %err,
                    "impact_config.load_failed; using builtin"
                );
                Self::default()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Northward offset (degrees) of the second elevation probe used for slope.
    pub slope_offset_deg: f64,
    /// Impervious-surface proxy in the heat formula. Not spatially varying.
    pub built_density: f64,
    pub cache_capacity: usize,
    pub eviction: EvictionPolicy,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            slope_offset_deg: 0.0005,
            built_density: 0.6,
            cache_capacity: 5000,
            eviction: EvictionPolicy::ClearAll,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    /// Depth ceiling (m) and the multiplier ceiling for one run.
    pub max_depth: f64,
    /// Multiplier increment per tick.
    pub depth_step: f64,
    /// Zoom at or above which the fine grid is used.
    pub fine_zoom: u32,
    /// Zoom assumed until the host reports one.
    pub default_zoom: u32,
    pub fine_grid: GridParams,
    pub coarse_grid: GridParams,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            max_depth: 3.5,
            depth_step: 0.02,
            fine_zoom: 14,
            default_zoom: 13,
            fine_grid: GridParams { step: 0.001, radius: 0.01 },
            coarse_grid: GridParams { step: 0.002, radius: 0.02 },
        }
    }
}

/// Fallbacks used when a macro-baseline field is missing, plus the FX rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub gdp_per_capita_usd: f64,
    pub population: u64,
    pub urban_pct: f64,
    pub poverty_rate: f64,
    pub inr_per_usd: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            gdp_per_capita_usd: 2500.0,
            population: 20_000_000,
            urban_pct: 35.0,
            poverty_rate: 0.2,
            inr_per_usd: 84.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Factor values at the base year.
    pub baseline: ImpactFactors,
    /// AQI, flood risk and traffic reached at the maximum simulation year.
    /// Rainfall keeps its baseline value in every year.
    pub worst_case: WorstCaseBounds,
    /// Budget for a live pollutant lookup.
    pub live_reading_timeout_ms: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            baseline: ImpactFactors {
                aqi: 90.0,
                rainfall_mm: 0.0,
                flood_risk: 0.25,
                traffic_congestion: 0.35,
            },
            worst_case: WorstCaseBounds {
                aqi: 300.0,
                flood_risk: 0.85,
                traffic_congestion: 0.8,
            },
            live_reading_timeout_ms: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let cfg = ImpactConfig::from_json_str(r#"{ "economy": { "inr_per_usd": 83.5 } }"#).unwrap();
        assert_eq!(cfg.economy.inr_per_usd, 83.5);
        assert_eq!(cfg.economy.gdp_per_capita_usd, 2500.0);
        assert_eq!(cfg.terrain, TerrainConfig::default());
        assert_eq!(cfg.flood.max_depth, 3.5);
    }

    #[test]
    fn eviction_policy_round_trips_by_name() {
        let cfg = ImpactConfig::from_json_str(r#"{ "terrain": { "eviction": "fifo" } }"#).unwrap();
        assert_eq!(cfg.terrain.eviction, EvictionPolicy::Fifo);
        assert_eq!(cfg.terrain.cache_capacity, 5000);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ImpactConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ImpactConfig::from_file(Path::new("/nonexistent/riskscape.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }), "got {err}");
    }
}
