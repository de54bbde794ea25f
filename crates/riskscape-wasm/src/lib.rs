use std::collections::HashMap;
use std::sync::Arc;

use js_sys::Function;
use riskscape_core::economy::MacroBaselineSource;
use riskscape_core::terrain::ElevationSource;
use riskscape_core::{
    FlatElevation, FloodCell, FloodSink, FloodSpreadSimulator, GeoPoint, HeightField, ImpactConfig, ImpactOrchestrator,
    Location, MacroBaseline, ScenarioRequest, TerrainMetricsProvider,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Region code → macro baseline, as handed over from the page.
#[derive(Debug, Default)]
struct RegionTable(HashMap<String, MacroBaseline>);

impl MacroBaselineSource for RegionTable {
    fn baseline(&self, region: &str) -> Option<MacroBaseline> {
        self.0.get(region).copied()
    }
}

fn parse_config(config_json: Option<&str>) -> Result<ImpactConfig, String> {
    match config_json {
        Some(json) => ImpactConfig::from_json_str(json).map_err(|e| e.to_string()),
        None => Ok(ImpactConfig::default()),
    }
}

/// Elevation from a serialised `HeightField`, or sea-level flat ground.
fn parse_elevation(heightfield_json: Option<&str>) -> Result<Arc<dyn ElevationSource>, String> {
    match heightfield_json {
        Some(json) => {
            let field: HeightField = serde_json::from_str(json).map_err(|e| format!("Invalid heightfield: {e}"))?;
            Ok(Arc::new(field))
        }
        None => Ok(Arc::new(FlatElevation(0.0))),
    }
}

fn parse_regions(regions_json: Option<&str>) -> Result<RegionTable, String> {
    match regions_json {
        Some(json) => serde_json::from_str(json)
            .map(RegionTable)
            .map_err(|e| format!("Invalid regions: {e}")),
        None => Ok(RegionTable::default()),
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Evaluate one scenario on flat terrain with fallback macro data.
/// `request_json` is a serialised `ScenarioRequest`.
#[wasm_bindgen]
pub fn evaluate(request_json: &str) -> Result<JsValue, JsValue> {
    ImpactEngine::new(None, None, None)?.evaluate(request_json)
}

/// US EPA AQI for a PM2.5 concentration (µg/m³).
#[wasm_bindgen]
pub fn pm25_to_aqi(pm25: f64) -> u16 {
    riskscape_core::pm25_to_aqi(pm25)
}

/// Scenario evaluator holding its terrain cache across calls.
#[wasm_bindgen]
pub struct ImpactEngine {
    orchestrator: ImpactOrchestrator,
}

#[wasm_bindgen]
impl ImpactEngine {
    /// All arguments are optional JSON: an `ImpactConfig`, a `HeightField`,
    /// and an object mapping region codes to macro baselines.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_json: Option<String>,
        heightfield_json: Option<String>,
        regions_json: Option<String>,
    ) -> Result<ImpactEngine, JsValue> {
        let config = parse_config(config_json.as_deref()).map_err(|e| JsValue::from_str(&e))?;
        let elevation = parse_elevation(heightfield_json.as_deref()).map_err(|e| JsValue::from_str(&e))?;
        let regions = parse_regions(regions_json.as_deref()).map_err(|e| JsValue::from_str(&e))?;
        let terrain = Arc::new(TerrainMetricsProvider::new(elevation, config.terrain.clone()));
        Ok(Self { orchestrator: ImpactOrchestrator::new(&config, terrain, Arc::new(regions)) })
    }

    pub fn evaluate(&self, request_json: &str) -> Result<JsValue, JsValue> {
        let request: ScenarioRequest = serde_json::from_str(request_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid request: {e}")))?;
        to_js(&self.orchestrator.evaluate_request(&request))
    }

    /// Yearly scenarios from `base_year` through `max_year`.
    pub fn trajectory(&self, request_json: &str) -> Result<JsValue, JsValue> {
        let request: ScenarioRequest = serde_json::from_str(request_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid request: {e}")))?;
        let series = self
            .orchestrator
            .trajectory(&request.location, request.base_year, request.max_year, &request.live);
        to_js(&series)
    }

    /// Whether `session` belongs to the most recent query. Callers drop
    /// results for which this is false.
    #[wasm_bindgen(js_name = isCurrent)]
    pub fn is_current(&self, session: f64) -> bool {
        self.orchestrator.clock().is_current(riskscape_core::SessionToken(session as u64))
    }
}

/// Forwards each flood snapshot to a JS callback as an array of cells.
struct CallbackSink {
    callback: Function,
}

impl FloodSink for CallbackSink {
    fn publish(&mut self, cells: Vec<FloodCell>) {
        let count = cells.len();
        let value = match serde_wasm_bindgen::to_value(&cells) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(target: "riskscape::wasm", cells = count, error = %err, "flood snapshot not serialisable; skipped");
                return;
            }
        };
        // A throwing callback must not wedge the animation.
        if let Err(err) = self.callback.call1(&JsValue::NULL, &value) {
            tracing::warn!(target: "riskscape::wasm", cells = count, error = ?err, "flood callback threw");
        }
    }
}

/// Flood animation whose `tick()` the page calls from `requestAnimationFrame`.
#[wasm_bindgen]
pub struct FloodAnimation {
    simulator: FloodSpreadSimulator<CallbackSink>,
}

#[wasm_bindgen]
impl FloodAnimation {
    #[wasm_bindgen(constructor)]
    pub fn new(
        on_cells: Function,
        config_json: Option<String>,
        heightfield_json: Option<String>,
    ) -> Result<FloodAnimation, JsValue> {
        let config = parse_config(config_json.as_deref()).map_err(|e| JsValue::from_str(&e))?;
        let elevation = parse_elevation(heightfield_json.as_deref()).map_err(|e| JsValue::from_str(&e))?;
        let terrain = Arc::new(TerrainMetricsProvider::new(elevation, config.terrain.clone()));
        let sink = CallbackSink { callback: on_cells };
        Ok(Self { simulator: FloodSpreadSimulator::new(terrain, config.flood, sink) })
    }

    /// Start a run, cancelling any in flight. Returns the run id.
    pub fn start(&mut self, lat: f64, lng: f64, rainfall_mm: f64) -> f64 {
        self.simulator.start(GeoPoint::new(lat, lng), rainfall_mm).0 as f64
    }

    /// Advance one step. Returns the `TickOutcome`.
    pub fn tick(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.simulator.tick())
    }

    pub fn stop(&mut self) {
        self.simulator.stop();
    }

    #[wasm_bindgen(js_name = setZoom)]
    pub fn set_zoom(&mut self, zoom: u32) {
        self.simulator.set_zoom(zoom);
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.simulator.is_running()
    }

    #[wasm_bindgen(js_name = depthMultiplier)]
    pub fn depth_multiplier(&self) -> Option<f64> {
        self.simulator.depth_multiplier()
    }
}

/// Location helper for pages that build requests by hand.
#[wasm_bindgen(js_name = scenarioRequest)]
pub fn scenario_request(lat: f64, lng: f64, region: &str, year: i32, base_year: i32, max_year: i32) -> Result<String, JsValue> {
    let request = ScenarioRequest {
        location: Location::new(lat, lng, region),
        year,
        base_year,
        max_year,
        live: Default::default(),
    };
    serde_json::to_string(&request).map_err(|e| JsValue::from_str(&e.to_string()))
}
