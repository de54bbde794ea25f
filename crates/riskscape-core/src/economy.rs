//! Economic loss and people-affected estimates from normalised risk factors.
//!
//! One canonical weighted model: each factor is normalised to `[0, 1]`,
//! blended with fixed weights into an impact factor, and the impact factor
//! scales one day of regional GDP.

use serde::{Deserialize, Serialize};

use crate::config::EconomyConfig;

pub const AQI_WEIGHT: f64 = 0.15;
pub const RAIN_WEIGHT: f64 = 0.20;
pub const FLOOD_WEIGHT: f64 = 0.40;
pub const TRAFFIC_WEIGHT: f64 = 0.25;

/// AQI below which there is no economic drag.
const AQI_LOSS_FLOOR: f64 = 50.0;
/// AQI span over which the drag ramps to its maximum.
const AQI_LOSS_SPAN: f64 = 400.0;
/// Rainfall (mm) at which rain-driven loss saturates.
const RAIN_LOSS_SATURATION_MM: f64 = 150.0;
const DAYS_PER_YEAR: f64 = 365.0;
const RUPEES_PER_CRORE: f64 = 1.0e7;

/// Share of the population exposed per unit of each normalised factor.
const AQI_EXPOSED_SHARE: f64 = 0.30;
const FLOOD_DISPLACED_SHARE: f64 = 0.20;
const TRAFFIC_DELAYED_SHARE: f64 = 0.10;
/// Share of the population always counted as affected.
const BASELINE_AFFECTED_SHARE: f64 = 0.05;
pub const MIN_PEOPLE_AFFECTED: u64 = 100;

/// Raw risk drivers for one location and year.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImpactFactors {
    /// 0..=500.
    pub aqi: f64,
    pub rainfall_mm: f64,
    /// 0..=1.
    pub flood_risk: f64,
    /// 0..=1.
    pub traffic_congestion: f64,
}

/// Values the projected factors reach at the maximum simulation year.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorstCaseBounds {
    pub aqi: f64,
    pub flood_risk: f64,
    pub traffic_congestion: f64,
}

impl ImpactFactors {
    /// Clamp every field into its documented range; NaN becomes 0.
    pub fn clamped(self) -> Self {
        Self {
            aqi: finite_or_zero(self.aqi).clamp(0.0, 500.0),
            rainfall_mm: finite_or_zero(self.rainfall_mm).max(0.0),
            flood_risk: finite_or_zero(self.flood_risk).clamp(0.0, 1.0),
            traffic_congestion: finite_or_zero(self.traffic_congestion).clamp(0.0, 1.0),
        }
    }

    /// Move AQI, flood risk and traffic linearly toward `bounds`; `t` is
    /// clamped to `[0, 1]`. Rainfall is not projected and stays as given.
    pub fn project_toward(&self, bounds: &WorstCaseBounds, t: f64) -> Self {
        let t = finite_or_zero(t).clamp(0.0, 1.0);
        let mix = |a: f64, b: f64| a * (1.0 - t) + b * t;
        Self {
            aqi: mix(self.aqi, bounds.aqi),
            rainfall_mm: self.rainfall_mm,
            flood_risk: mix(self.flood_risk, bounds.flood_risk),
            traffic_congestion: mix(self.traffic_congestion, bounds.traffic_congestion),
        }
    }

    pub fn normalized(&self) -> NormalizedFactors {
        let clamp01 = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        NormalizedFactors {
            aqi: clamp01((self.aqi - AQI_LOSS_FLOOR) / AQI_LOSS_SPAN),
            rain: clamp01(self.rainfall_mm / RAIN_LOSS_SATURATION_MM),
            flood: clamp01(self.flood_risk),
            traffic: clamp01(self.traffic_congestion),
        }
    }
}

/// Each factor mapped to `[0, 1]` loss intensity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFactors {
    pub aqi: f64,
    pub rain: f64,
    pub flood: f64,
    pub traffic: f64,
}

impl NormalizedFactors {
    pub fn impact_factor(&self) -> f64 {
        AQI_WEIGHT * self.aqi + RAIN_WEIGHT * self.rain + FLOOD_WEIGHT * self.flood + TRAFFIC_WEIGHT * self.traffic
    }
}

/// Regional macro data. Every field is independently optional.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MacroBaseline {
    pub gdp_per_capita_usd: Option<f64>,
    pub population: Option<u64>,
    pub urban_pct: Option<f64>,
    pub poverty_rate: Option<f64>,
}

impl MacroBaseline {
    /// Fill every missing or unusable field from `fallback`.
    pub fn resolve(&self, fallback: &EconomyConfig) -> ResolvedBaseline {
        let positive = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);
        ResolvedBaseline {
            gdp_per_capita_usd: positive(self.gdp_per_capita_usd).unwrap_or(fallback.gdp_per_capita_usd),
            population: self.population.filter(|&p| p > 0).unwrap_or(fallback.population),
            urban_pct: self
                .urban_pct
                .filter(|x| x.is_finite())
                .map_or(fallback.urban_pct, |x| x.clamp(0.0, 100.0)),
            poverty_rate: self
                .poverty_rate
                .filter(|x| x.is_finite())
                .map_or(fallback.poverty_rate, |x| x.clamp(0.0, 1.0)),
        }
    }
}

/// External macro-data provider, queried per region.
pub trait MacroBaselineSource: Send + Sync {
    fn baseline(&self, region: &str) -> Option<MacroBaseline>;
}

impl MacroBaselineSource for MacroBaseline {
    fn baseline(&self, _region: &str) -> Option<MacroBaseline> {
        Some(*self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBaseline {
    pub gdp_per_capita_usd: f64,
    pub population: u64,
    pub urban_pct: f64,
    pub poverty_rate: f64,
}

/// Crore contribution of each factor to the total loss.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LossBreakdown {
    pub aqi_cr: f64,
    pub rainfall_cr: f64,
    pub flood_cr: f64,
    pub traffic_cr: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossEstimate {
    pub normalized: NormalizedFactors,
    pub impact_factor: f64,
    pub daily_gdp_usd: f64,
    pub loss_usd: f64,
    /// INR crore, rounded to 2 decimals, ≥ 0.
    pub economic_loss_cr: f64,
    pub breakdown: LossBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EconomicImpactResult {
    /// ≥ [`MIN_PEOPLE_AFFECTED`].
    pub people_affected: u64,
    pub economic_loss_cr: f64,
    pub breakdown: LossBreakdown,
}

#[derive(Debug, Clone, Default)]
pub struct EconomicImpactModel {
    config: EconomyConfig,
}

impl EconomicImpactModel {
    pub fn new(config: EconomyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn compute_loss(&self, factors: &ImpactFactors, baseline: &MacroBaseline) -> LossEstimate {
        let resolved = baseline.resolve(&self.config);
        let normalized = factors.normalized();
        let impact_factor = normalized.impact_factor();

        let daily_gdp_usd = resolved.gdp_per_capita_usd * resolved.population as f64 / DAYS_PER_YEAR;
        let loss_usd = daily_gdp_usd * impact_factor;
        let to_crore = |usd: f64| (usd * self.config.inr_per_usd / RUPEES_PER_CRORE).max(0.0);

        let breakdown = LossBreakdown {
            aqi_cr: round2(to_crore(daily_gdp_usd * AQI_WEIGHT * normalized.aqi)),
            rainfall_cr: round2(to_crore(daily_gdp_usd * RAIN_WEIGHT * normalized.rain)),
            flood_cr: round2(to_crore(daily_gdp_usd * FLOOD_WEIGHT * normalized.flood)),
            traffic_cr: round2(to_crore(daily_gdp_usd * TRAFFIC_WEIGHT * normalized.traffic)),
        };

        LossEstimate {
            normalized,
            impact_factor,
            daily_gdp_usd,
            loss_usd,
            economic_loss_cr: round2(to_crore(loss_usd)),
            breakdown,
        }
    }

    /// Health, displacement, delay and baseline terms, floored at
    /// [`MIN_PEOPLE_AFFECTED`].
    pub fn compute_people_affected(&self, factors: &ImpactFactors, projected_population: u64) -> u64 {
        let n = factors.normalized();
        let pop = projected_population as f64;

        let health = n.aqi * pop * AQI_EXPOSED_SHARE;
        let displaced = n.flood * pop * FLOOD_DISPLACED_SHARE;
        let delayed = n.traffic * pop * TRAFFIC_DELAYED_SHARE;
        let baseline = pop * BASELINE_AFFECTED_SHARE;

        let affected = AQI_WEIGHT * health + FLOOD_WEIGHT * displaced + TRAFFIC_WEIGHT * delayed + baseline;
        (affected.round() as u64).max(MIN_PEOPLE_AFFECTED)
    }

    /// Loss and people affected together.
    pub fn evaluate(
        &self,
        factors: &ImpactFactors,
        baseline: &MacroBaseline,
        projected_population: u64,
    ) -> EconomicImpactResult {
        let loss = self.compute_loss(factors, baseline);
        EconomicImpactResult {
            people_affected: self.compute_people_affected(factors, projected_population),
            economic_loss_cr: loss.economic_loss_cr,
            breakdown: loss.breakdown,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn golden_factors() -> ImpactFactors {
        ImpactFactors { aqi: 90.0, rainfall_mm: 0.0, flood_risk: 0.25, traffic_congestion: 0.35 }
    }

    #[test]
    fn weights_sum_to_one() {
        assert_relative_eq!(AQI_WEIGHT + RAIN_WEIGHT + FLOOD_WEIGHT + TRAFFIC_WEIGHT, 1.0, epsilon = 1e-15);
        assert!(FLOOD_WEIGHT > AQI_WEIGHT.max(RAIN_WEIGHT).max(TRAFFIC_WEIGHT));
    }

    #[test]
    fn golden_loss_chain() {
        let model = EconomicImpactModel::default();
        let baseline = MacroBaseline {
            gdp_per_capita_usd: Some(2500.0),
            population: Some(20_000_000),
            ..MacroBaseline::default()
        };
        let est = model.compute_loss(&golden_factors(), &baseline);

        assert_relative_eq!(est.normalized.aqi, 0.10, epsilon = 1e-12);
        assert_eq!(est.normalized.rain, 0.0);
        assert_relative_eq!(est.normalized.flood, 0.25, epsilon = 1e-12);
        assert_relative_eq!(est.normalized.traffic, 0.35, epsilon = 1e-12);
        assert_relative_eq!(est.impact_factor, 0.2025, epsilon = 1e-12);
        assert_relative_eq!(est.daily_gdp_usd, 136_986_301.369_863, epsilon = 1e-4);
        assert_relative_eq!(est.loss_usd, 27_739_726.027_397, epsilon = 1e-3);
        assert_relative_eq!(est.economic_loss_cr, 233.01, epsilon = 1e-9);
    }

    #[test]
    fn missing_baseline_uses_fallbacks() {
        let model = EconomicImpactModel::default();
        let est = model.compute_loss(&golden_factors(), &MacroBaseline::default());
        assert_relative_eq!(est.economic_loss_cr, 233.01, epsilon = 1e-9);

        let junk = MacroBaseline {
            gdp_per_capita_usd: Some(f64::NAN),
            population: Some(0),
            urban_pct: Some(140.0),
            poverty_rate: None,
        };
        let resolved = junk.resolve(model.config());
        assert_eq!(resolved.gdp_per_capita_usd, 2500.0);
        assert_eq!(resolved.population, 20_000_000);
        assert_eq!(resolved.urban_pct, 100.0);
        assert_eq!(resolved.poverty_rate, 0.2);
    }

    #[test]
    fn breakdown_sums_to_total() {
        let model = EconomicImpactModel::default();
        let factors = ImpactFactors { aqi: 250.0, rainfall_mm: 60.0, flood_risk: 0.7, traffic_congestion: 0.5 };
        let est = model.compute_loss(&factors, &MacroBaseline::default());
        let b = est.breakdown;
        let sum = b.aqi_cr + b.rainfall_cr + b.flood_cr + b.traffic_cr;
        assert!((sum - est.economic_loss_cr).abs() <= 0.03, "sum {sum} vs {}", est.economic_loss_cr);
        assert!(b.flood_cr > b.aqi_cr);
    }

    #[test]
    fn loss_never_negative() {
        let model = EconomicImpactModel::default();
        for factors in [
            ImpactFactors::default(),
            ImpactFactors { aqi: -300.0, rainfall_mm: -5.0, flood_risk: -1.0, traffic_congestion: -1.0 },
            ImpactFactors { aqi: f64::NAN, rainfall_mm: f64::INFINITY, flood_risk: 9.0, traffic_congestion: 0.2 },
        ] {
            let est = model.compute_loss(&factors, &MacroBaseline::default());
            assert!(est.economic_loss_cr >= 0.0, "{factors:?} -> {}", est.economic_loss_cr);
            assert!(est.impact_factor <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn saturated_factors_cost_a_full_day_of_gdp() {
        let model = EconomicImpactModel::default();
        let worst = ImpactFactors { aqi: 500.0, rainfall_mm: 300.0, flood_risk: 1.0, traffic_congestion: 1.0 };
        let est = model.compute_loss(&worst, &MacroBaseline::default());
        assert_relative_eq!(est.impact_factor, 1.0, epsilon = 1e-12);
        // 2500 * 2e7 / 365 * 84 / 1e7
        assert_relative_eq!(est.economic_loss_cr, 1150.68, epsilon = 1e-9);
    }

    #[test]
    fn people_affected_has_a_floor() {
        let model = EconomicImpactModel::default();
        assert_eq!(model.compute_people_affected(&ImpactFactors::default(), 0), 100);
        assert_eq!(model.compute_people_affected(&ImpactFactors::default(), 10), 100);
        assert_eq!(model.compute_people_affected(&golden_factors(), 0), 100);
    }

    #[test]
    fn people_affected_weighted_terms() {
        let model = EconomicImpactModel::default();
        // aqi 0.1, flood 0.25, traffic 0.35 on 1M people:
        //   0.15*30_000 + 0.40*50_000 + 0.25*35_000 + 50_000 = 83_250
        assert_eq!(model.compute_people_affected(&golden_factors(), 1_000_000), 83_250);
    }

    #[test]
    fn projection_hits_bounds_and_leaves_rain_alone() {
        let a = golden_factors();
        let b = WorstCaseBounds { aqi: 300.0, flood_risk: 0.85, traffic_congestion: 0.8 };
        let at_max = ImpactFactors { aqi: 300.0, rainfall_mm: a.rainfall_mm, flood_risk: 0.85, traffic_congestion: 0.8 };
        assert_eq!(a.project_toward(&b, 0.0), a);
        assert_eq!(a.project_toward(&b, 1.0), at_max);
        assert_eq!(a.project_toward(&b, 7.0), at_max);
        assert_relative_eq!(a.project_toward(&b, 0.5).aqi, 195.0, epsilon = 1e-12);
        assert_eq!(a.project_toward(&b, 0.5).rainfall_mm, a.rainfall_mm);
    }
}
