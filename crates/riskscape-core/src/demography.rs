//! Year-by-year population projection with an economic-stress feedback on
//! net migration.
//!
//! Growth compounds on a whole-person population: each simulated year adds
//! `round(population * total_rate)`. This is an approximation, not a cohort
//! model.
use serde::{Deserialize, Serialize};

/// Loss (INR crore) at which economic stress saturates.
const STRESS_SATURATION_CR: f64 = 3000.0;
const BASE_MIGRATION_RATE: f64 = 0.012;
/// Fraction of migration suppressed at full stress.
const STRESS_MIGRATION_DAMPING: f64 = 0.6;

const NATURAL_RATE_START: f64 = 0.009;
const NATURAL_RATE_DECLINE: f64 = 0.0004;
const NATURAL_RATE_FLOOR: f64 = 0.002;

const TFR_START: f64 = 1.5;
const TFR_DECLINE: f64 = 0.015;
const TFR_FLOOR: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemographicState {
    pub year: i32,
    /// Always > 0.
    pub population: u64,
    pub growth_rate_pct: f64,
    pub tfr: f64,
    /// Share of total growth coming from net migration.
    pub migration_share_pct: f64,
}

/// `[0, 1]` stress from an economic loss in INR crore.
pub fn economic_stress(economic_loss_cr: f64) -> f64 {
    if economic_loss_cr.is_nan() {
        return 0.0;
    }
    (economic_loss_cr / STRESS_SATURATION_CR).clamp(0.0, 1.0)
}

/// Net migration rate after stress damping.
pub fn adjusted_migration_rate(economic_loss_cr: f64) -> f64 {
    BASE_MIGRATION_RATE * (1.0 - STRESS_MIGRATION_DAMPING * economic_stress(economic_loss_cr))
}

pub fn natural_rate(years_elapsed: u32) -> f64 {
    (NATURAL_RATE_START - years_elapsed as f64 * NATURAL_RATE_DECLINE).max(NATURAL_RATE_FLOOR)
}

pub fn total_fertility_rate(years_elapsed: u32) -> f64 {
    (TFR_START - years_elapsed as f64 * TFR_DECLINE).max(TFR_FLOOR)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DemographicProjector;

impl DemographicProjector {
    pub fn new() -> Self {
        Self
    }

    /// Population at `target_year`, compounding from `base_year`.
    ///
    /// `target_year <= base_year` runs zero iterations and returns
    /// `base_population` unchanged. A zero base population is raised to 1.
    /// `growth_rate_pct` is the rate that produced the final year's growth.
    pub fn project(
        &self,
        base_year: i32,
        target_year: i32,
        base_population: u64,
        economic_loss_cr: f64,
    ) -> DemographicState {
        let migration = adjusted_migration_rate(economic_loss_cr);
        let years = years_between(base_year, target_year);
        let mut population = base_population.max(1);
        for elapsed in 0..years {
            population = grow(population, natural_rate(elapsed) + migration);
        }
        state_at(base_year, years, population, migration)
    }

    /// One state per year from `base_year` through `target_year` inclusive.
    pub fn project_series(
        &self,
        base_year: i32,
        target_year: i32,
        base_population: u64,
        economic_loss_cr: f64,
    ) -> Vec<DemographicState> {
        let migration = adjusted_migration_rate(economic_loss_cr);
        let years = years_between(base_year, target_year);
        let mut population = base_population.max(1);
        let mut series = Vec::with_capacity(years as usize + 1);
        series.push(state_at(base_year, 0, population, migration));
        for elapsed in 0..years {
            population = grow(population, natural_rate(elapsed) + migration);
            series.push(state_at(base_year, elapsed + 1, population, migration));
        }
        series
    }
}

fn years_between(base_year: i32, target_year: i32) -> u32 {
    (i64::from(target_year) - i64::from(base_year)).max(0) as u32
}

fn grow(population: u64, rate: f64) -> u64 {
    let added = (population as f64 * rate).round();
    population.saturating_add(added.max(0.0) as u64)
}

/// State after `elapsed` years. Growth rate and migration share describe the
/// last year actually applied; at zero elapsed years, the first year's rate.
fn state_at(base_year: i32, elapsed: u32, population: u64, migration: f64) -> DemographicState {
    let total = natural_rate(elapsed.saturating_sub(1)) + migration;
    DemographicState {
        year: base_year.saturating_add(i32::try_from(elapsed).unwrap_or(i32::MAX)),
        population,
        growth_rate_pct: total * 100.0,
        tfr: total_fertility_rate(elapsed),
        migration_share_pct: migration / total * 100.0,
    }
}
