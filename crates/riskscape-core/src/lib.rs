//! Deterministic environmental-economic impact engine.
//!
//! Terrain and air-quality inputs feed an animated flood grid and a per-query
//! scenario: economic loss, people affected, and a demographic projection
//! with stress-driven migration feedback.
pub mod air_quality;
pub mod config;
pub mod coords;
pub mod demography;
pub mod economy;
pub mod flood;
pub mod heightfield;
pub mod scenario;
pub mod session;
pub mod terrain;

pub use air_quality::{pm25_to_aqi, AqiCategory, AqiReading};
pub use config::{ConfigError, ImpactConfig};
pub use coords::GeoPoint;
pub use demography::{DemographicProjector, DemographicState};
pub use economy::{EconomicImpactModel, EconomicImpactResult, ImpactFactors, MacroBaseline, WorstCaseBounds};
pub use flood::{FloodCell, FloodSink, FloodSpreadSimulator, SnapshotSlot, TickOutcome};
pub use heightfield::HeightField;
pub use scenario::{ImpactOrchestrator, ImpactScenario, LiveReadings, Location, ScenarioRequest};
pub use session::{LatestSlot, SessionClock, SessionToken};
pub use terrain::{ElevationSource, FlatElevation, TerrainMetricsProvider, TerrainSample};
