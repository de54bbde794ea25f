//! End-to-end checks across terrain, flood, economy and demography.

use std::sync::Arc;
use std::thread;

use riskscape_core::economy::MacroBaselineSource;
use riskscape_core::{
    DemographicProjector, FloodSpreadSimulator, GeoPoint, HeightField, ImpactConfig, ImpactOrchestrator, LatestSlot, LiveReadings,
    Location, MacroBaseline, SnapshotSlot, TerrainMetricsProvider, TickOutcome,
};

/// Coastal basin: sea level in the west, rising 2 m per 0.001° eastward.
fn coastal_dem() -> HeightField {
    HeightField::from_fn(201, 201, (72.7, 72.9), (18.9, 19.1), |p| ((p.lng - 72.7) * 2000.0) as f32)
}

struct Regions;

impl MacroBaselineSource for Regions {
    fn baseline(&self, region: &str) -> Option<MacroBaseline> {
        match region {
            "IN-MH" => Some(MacroBaseline {
                gdp_per_capita_usd: Some(3200.0),
                population: Some(21_000_000),
                urban_pct: Some(45.0),
                poverty_rate: None,
            }),
            _ => None,
        }
    }
}

fn setup() -> (ImpactConfig, Arc<TerrainMetricsProvider>, ImpactOrchestrator) {
    let cfg = ImpactConfig::default();
    let terrain = Arc::new(TerrainMetricsProvider::new(Arc::new(coastal_dem()), cfg.terrain.clone()));
    let orchestrator = ImpactOrchestrator::new(&cfg, Arc::clone(&terrain), Arc::new(Regions));
    (cfg, terrain, orchestrator)
}

#[test]
fn known_region_uses_its_own_baseline() {
    let (_, _, o) = setup();
    let known = o.evaluate(&Location::new(19.0, 72.75, "IN-MH"), 2025, 2025, 2050, &LiveReadings::none());
    let unknown = o.evaluate(&Location::new(19.0, 72.75, "ZZ"), 2025, 2025, 2050, &LiveReadings::none());

    assert_eq!(known.baseline.population, 21_000_000);
    assert_eq!(known.baseline.poverty_rate, 0.2);
    assert_eq!(unknown.baseline.population, 20_000_000);
    assert!(known.economic.economic_loss_cr > unknown.economic.economic_loss_cr);
}

#[test]
fn concurrent_evaluations_agree_with_sequential_ones() {
    let (_, _, o) = setup();
    let o = Arc::new(o);
    let queries: Vec<(Location, i32)> = (0..8)
        .map(|i| (Location::new(18.95 + i as f64 * 0.01, 72.72 + i as f64 * 0.02, "IN-MH"), 2025 + i * 3))
        .collect();

    let handles: Vec<_> = queries
        .iter()
        .cloned()
        .map(|(loc, year)| {
            let o = Arc::clone(&o);
            thread::spawn(move || o.evaluate(&loc, year, 2025, 2050, &LiveReadings::none()))
        })
        .collect();
    let parallel: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for (scenario, (loc, year)) in parallel.iter().zip(&queries) {
        let again = o.evaluate(loc, *year, 2025, 2050, &LiveReadings::none());
        assert_eq!(scenario.factors, again.factors);
        assert_eq!(scenario.economic, again.economic);
        assert_eq!(scenario.demographic, again.demographic);
    }
}

#[test]
fn superseded_scenarios_are_not_applied() {
    let (_, _, o) = setup();
    let visible = LatestSlot::new(Arc::clone(o.clock()));
    let loc = Location::new(19.0, 72.75, "IN-MH");

    let slow = o.evaluate(&loc, 2030, 2025, 2050, &LiveReadings::none());
    let fast = o.evaluate(&loc, 2040, 2025, 2050, &LiveReadings::none());

    assert!(visible.apply(fast.session, fast.clone()));
    assert!(!visible.apply(slow.session, slow));
    assert_eq!(visible.get().map(|s| s.year), Some(2040));
}

#[test]
fn flood_run_and_evaluation_share_terrain_without_interfering() {
    let (cfg, terrain, o) = setup();
    let slot = SnapshotSlot::new();
    let mut sim = FloodSpreadSimulator::new(Arc::clone(&terrain), cfg.flood.clone(), slot.clone());
    sim.set_zoom(15);
    // 200 m contour: enough elevation to offset saturated rain.
    let center = GeoPoint::new(19.0, 72.8);
    sim.start(center, 60.0);

    let before = o.evaluate(&Location::new(19.0, 72.8, "IN-MH"), 2025, 2025, 2050, &LiveReadings::none());
    for _ in 0..40 {
        assert!(matches!(sim.tick(), TickOutcome::Advanced { .. }));
    }
    let after = o.evaluate(&Location::new(19.0, 72.8, "IN-MH"), 2025, 2025, 2050, &LiveReadings::none());
    assert_eq!(before.economic, after.economic);

    let cells = slot.latest();
    assert!(!cells.is_empty());
    // Only the low western half holds water.
    let west = cells.iter().filter(|c| c.polygon[0].lng < center.lng).count();
    assert!(west > 0);
    assert_eq!(west, cells.len());
    assert!(cells.iter().all(|c| c.depth > 0.0 && c.depth <= cfg.flood.max_depth));

    sim.stop();
    assert!(slot.latest().is_empty());
}

#[test]
fn trajectory_losses_rise_and_damp_population_growth() {
    let (_, _, o) = setup();
    let series = o.trajectory(&Location::new(19.0, 72.75, "IN-MH"), 2025, 2050, &LiveReadings::none());
    assert_eq!(series.len(), 26);
    let first = &series[0];
    let last = &series[25];
    assert!(last.economic.economic_loss_cr > first.economic.economic_loss_cr);
    assert!(last.demographic.population > first.demographic.population);

    let calm = DemographicProjector::new().project(2025, 2050, 21_000_000, 0.0);
    assert!(last.demographic.population < calm.population);
}
