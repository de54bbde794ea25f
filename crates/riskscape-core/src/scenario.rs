//! Per-query composition of terrain, air quality, economy and demography.
//!
//! Pipeline order for one (location, year):
//!   1. Terrain sample at the location
//!   2. Factor projection toward worst-case bounds by time factor
//!   3. Live-reading override (base year only)
//!   4. Economic loss
//!   5. Demographic projection, fed by the loss
//!   6. People affected, from the projected population
//!
//! The loss feeds migration; nothing flows back the other way within one
//! evaluation.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::air_quality::{fetch_live_reading, AqiReading, PollutantSource};
use crate::config::{ImpactConfig, ScenarioConfig};
use crate::coords::GeoPoint;
use crate::demography::{DemographicProjector, DemographicState};
use crate::economy::{
    EconomicImpactModel, EconomicImpactResult, ImpactFactors, LossEstimate, MacroBaseline, MacroBaselineSource,
    ResolvedBaseline,
};
use crate::session::{SessionClock, SessionToken};
use crate::terrain::{TerrainMetricsProvider, TerrainSample};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub point: GeoPoint,
    /// Key for the macro-baseline lookup.
    pub region: String,
}

impl Location {
    pub fn new(lat: f64, lng: f64, region: impl Into<String>) -> Self {
        Self { point: GeoPoint::new(lat, lng), region: region.into() }
    }
}

/// Current observations. Each overrides the projection for the base year only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveReadings {
    pub air: Option<AqiReading>,
    pub rainfall_mm: Option<f64>,
    pub traffic_congestion: Option<f64>,
}

impl LiveReadings {
    pub fn none() -> Self {
        Self::default()
    }

    fn apply(&self, factors: ImpactFactors) -> ImpactFactors {
        let usable = |v: Option<f64>| v.filter(|x| x.is_finite());
        ImpactFactors {
            aqi: self.air.map_or(factors.aqi, |r| f64::from(r.aqi)),
            rainfall_mm: usable(self.rainfall_mm).unwrap_or(factors.rainfall_mm),
            flood_risk: factors.flood_risk,
            traffic_congestion: usable(self.traffic_congestion).unwrap_or(factors.traffic_congestion),
        }
    }
}

/// Serialisable form of one `evaluate` call, for the CLI and WASM surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub location: Location,
    pub year: i32,
    pub base_year: i32,
    pub max_year: i32,
    #[serde(default)]
    pub live: LiveReadings,
}

/// Immutable result of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactScenario {
    pub session: SessionToken,
    pub location: Location,
    pub year: i32,
    pub base_year: i32,
    pub max_year: i32,
    pub time_factor: f64,
    pub terrain: TerrainSample,
    pub factors: ImpactFactors,
    pub baseline: ResolvedBaseline,
    pub loss: LossEstimate,
    pub economic: EconomicImpactResult,
    pub demographic: DemographicState,
}

/// Progress from `base_year` to `max_year`, clamped to `[0, 1]`.
/// Zero when the span is empty or inverted.
pub fn time_factor(year: i32, base_year: i32, max_year: i32) -> f64 {
    let span = i64::from(max_year) - i64::from(base_year);
    if span <= 0 {
        return 0.0;
    }
    ((i64::from(year) - i64::from(base_year)) as f64 / span as f64).clamp(0.0, 1.0)
}

/// Baseline flood risk scale from terrain; 1 on flat ground.
fn terrain_flood_modifier(terrain: &TerrainSample) -> f64 {
    0.5 + 0.5 * terrain.drainage
}

pub struct ImpactOrchestrator {
    config: ScenarioConfig,
    terrain: Arc<TerrainMetricsProvider>,
    economy: EconomicImpactModel,
    demography: DemographicProjector,
    macro_source: Arc<dyn MacroBaselineSource>,
    pollutants: Option<Arc<dyn PollutantSource>>,
    clock: Arc<SessionClock>,
}

impl ImpactOrchestrator {
    pub fn new(
        config: &ImpactConfig,
        terrain: Arc<TerrainMetricsProvider>,
        macro_source: Arc<dyn MacroBaselineSource>,
    ) -> Self {
        Self {
            config: config.scenario.clone(),
            terrain,
            economy: EconomicImpactModel::new(config.economy.clone()),
            demography: DemographicProjector::new(),
            macro_source,
            pollutants: None,
            clock: Arc::new(SessionClock::new()),
        }
    }

    pub fn with_pollutant_source(mut self, source: Arc<dyn PollutantSource>) -> Self {
        self.pollutants = Some(source);
        self
    }

    /// Share a clock with other query issuers.
    pub fn with_clock(mut self, clock: Arc<SessionClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock(&self) -> &Arc<SessionClock> {
        &self.clock
    }

    pub fn terrain(&self) -> &Arc<TerrainMetricsProvider> {
        &self.terrain
    }

    /// Live AQI for `point` from the configured pollutant source, if any.
    /// Slow or failing providers yield an empty reading.
    pub fn fetch_live_readings(&self, point: GeoPoint) -> LiveReadings {
        let air = self.pollutants.as_ref().and_then(|source| {
            let timeout = Duration::from_millis(self.config.live_reading_timeout_ms);
            fetch_live_reading(Arc::clone(source), point, timeout)
        });
        LiveReadings { air, ..LiveReadings::default() }
    }

    /// Factors for `year` before any live override. Rainfall stays at the
    /// configured baseline; only a base-year live reading changes it.
    pub fn projected_factors(&self, terrain: &TerrainSample, year: i32, base_year: i32, max_year: i32) -> ImpactFactors {
        let mut start = self.config.baseline;
        start.flood_risk *= terrain_flood_modifier(terrain);
        start.project_toward(&self.config.worst_case, time_factor(year, base_year, max_year))
    }

    pub fn evaluate(
        &self,
        location: &Location,
        year: i32,
        base_year: i32,
        max_year: i32,
        live: &LiveReadings,
    ) -> ImpactScenario {
        let token = self.clock.issue();
        self.evaluate_with_token(token, location, year, base_year, max_year, live)
    }

    pub fn evaluate_request(&self, request: &ScenarioRequest) -> ImpactScenario {
        self.evaluate(&request.location, request.year, request.base_year, request.max_year, &request.live)
    }

    /// One scenario per year from `base_year` through `max_year`, all under
    /// a single session token.
    pub fn trajectory(
        &self,
        location: &Location,
        base_year: i32,
        max_year: i32,
        live: &LiveReadings,
    ) -> Vec<ImpactScenario> {
        let token = self.clock.issue();
        (base_year..=max_year.max(base_year))
            .map(|year| self.evaluate_with_token(token, location, year, base_year, max_year, live))
            .collect()
    }

    fn evaluate_with_token(
        &self,
        token: SessionToken,
        location: &Location,
        year: i32,
        base_year: i32,
        max_year: i32,
        live: &LiveReadings,
    ) -> ImpactScenario {
        let point = location.point.sanitized();
        let terrain = self.terrain.terrain_metrics(point);

        let mut factors = self.projected_factors(&terrain, year, base_year, max_year);
        if year == base_year {
            factors = live.apply(factors);
        }
        let factors = factors.clamped();

        let macro_baseline = self.macro_source.baseline(&location.region).unwrap_or_else(|| {
            tracing::debug!(
                target: "riskscape::scenario",
                region = %location.region,
                "no macro baseline; using fallbacks"
            );
            MacroBaseline::default()
        });
        let baseline = macro_baseline.resolve(self.economy.config());

        let loss = self.economy.compute_loss(&factors, &macro_baseline);
        let demographic = self
            .demography
            .project(base_year, year, baseline.population, loss.economic_loss_cr);
        let people_affected = self.economy.compute_people_affected(&factors, demographic.population);

        tracing::debug!(
            target: "riskscape::scenario",
            session = token.0,
            region = %location.region,
            year,
            loss_cr = loss.economic_loss_cr,
            people_affected,
            population = demographic.population,
            "scenario.evaluated"
        );

        ImpactScenario {
            session: token,
            location: Location { point, region: location.region.clone() },
            year,
            base_year,
            max_year,
            time_factor: time_factor(year, base_year, max_year),
            terrain,
            factors,
            baseline,
            loss,
            economic: EconomicImpactResult {
                people_affected,
                economic_loss_cr: loss.economic_loss_cr,
                breakdown: loss.breakdown,
            },
            demographic,
        }
    }
}
