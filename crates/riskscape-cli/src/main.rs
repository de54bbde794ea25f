/// Command-line harness for the impact engine: scenario evaluation,
/// yearly trajectories, flood runs and AQI conversion, all printed as JSON.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use riskscape_core::air_quality::pm10_to_aqi;
use riskscape_core::economy::MacroBaselineSource;
use riskscape_core::terrain::ElevationSource;
use riskscape_core::{
    pm25_to_aqi, AqiCategory, FlatElevation, FloodSpreadSimulator, GeoPoint, HeightField, ImpactConfig,
    ImpactOrchestrator, LiveReadings, Location, MacroBaseline, ScenarioRequest, SnapshotSlot, TerrainMetricsProvider,
    TickOutcome,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "riskscape", about = "Environmental-economic impact scenarios")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one (location, year) scenario.
    Evaluate {
        #[command(flatten)]
        query: Query,
        /// Target year.
        #[arg(long)]
        year: i32,
        /// Read a ScenarioRequest JSON file instead of the location flags.
        #[arg(long)]
        request: Option<PathBuf>,
    },
    /// Evaluate every year from the base year through the max year.
    Trajectory {
        #[command(flatten)]
        query: Query,
    },
    /// Animate a flood run to completion, printing one line per tick.
    Flood {
        #[command(flatten)]
        sources: Sources,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Rainfall in mm.
        #[arg(long, default_value_t = 50.0)]
        rain: f64,
        /// Map zoom; 14 and above uses the fine grid.
        #[arg(long)]
        zoom: Option<u32>,
        /// Delay between ticks.
        #[arg(long, default_value_t = 50)]
        interval_ms: u64,
        /// Print the final cell snapshot.
        #[arg(long)]
        cells: bool,
    },
    /// Convert pollutant concentrations to AQI.
    Aqi {
        /// PM2.5 in µg/m³.
        #[arg(long)]
        pm25: f64,
        /// PM10 in µg/m³.
        #[arg(long)]
        pm10: Option<f64>,
    },
}

/// Inputs shared by every command that touches terrain or macro data.
#[derive(Args, Debug)]
struct Sources {
    /// ImpactConfig JSON. Defaults to $RISKSCAPE_CONFIG, then built-ins.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Serialised HeightField JSON. Flat sea-level ground when omitted.
    #[arg(long)]
    dem: Option<PathBuf>,
    /// JSON object mapping region codes to macro baselines.
    #[arg(long)]
    regions: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct Query {
    #[command(flatten)]
    sources: Sources,
    #[arg(long, allow_hyphen_values = true, default_value_t = 19.076)]
    lat: f64,
    #[arg(long, allow_hyphen_values = true, default_value_t = 72.8777)]
    lng: f64,
    /// Region code for the macro-baseline lookup.
    #[arg(long, default_value = "IN-MH")]
    region: String,
    #[arg(long, default_value_t = 2025)]
    base_year: i32,
    #[arg(long, default_value_t = 2050)]
    max_year: i32,
    /// Live PM2.5 reading applied to the base year.
    #[arg(long)]
    live_pm25: Option<f64>,
    /// Live rainfall (mm) applied to the base year.
    #[arg(long)]
    live_rain: Option<f64>,
}

impl Query {
    fn location(&self) -> Location {
        Location::new(self.lat, self.lng, self.region.clone())
    }

    fn live(&self) -> LiveReadings {
        let air = self.live_pm25.map(|pm25| riskscape_core::AqiReading {
            pm25,
            pm10: 0.0,
            no2: 0.0,
            o3: 0.0,
            aqi: pm25_to_aqi(pm25),
            timestamp_ms: 0,
        });
        LiveReadings { air, rainfall_mm: self.live_rain, traffic_congestion: None }
    }
}

struct RegionTable(HashMap<String, MacroBaseline>);

impl MacroBaselineSource for RegionTable {
    fn baseline(&self, region: &str) -> Option<MacroBaseline> {
        self.0.get(region).copied()
    }
}

impl Sources {
    fn config(&self) -> Result<ImpactConfig> {
        match &self.config {
            Some(path) => ImpactConfig::from_file(path).with_context(|| format!("loading config {}", path.display())),
            None => Ok(ImpactConfig::from_env_or_default()),
        }
    }

    fn elevation(&self) -> Result<Arc<dyn ElevationSource>> {
        let Some(path) = &self.dem else {
            return Ok(Arc::new(FlatElevation(0.0)));
        };
        let field: HeightField = read_json(path)?;
        tracing::info!(
            target: "riskscape::cli",
            path = %path.display(),
            width = field.width,
            height = field.height,
            "dem.loaded"
        );
        Ok(Arc::new(field))
    }

    fn regions(&self) -> Result<RegionTable> {
        match &self.regions {
            Some(path) => Ok(RegionTable(read_json(path)?)),
            None => Ok(RegionTable(HashMap::new())),
        }
    }

    fn terrain(&self, config: &ImpactConfig) -> Result<Arc<TerrainMetricsProvider>> {
        Ok(Arc::new(TerrainMetricsProvider::new(self.elevation()?, config.terrain.clone())))
    }

    fn orchestrator(&self) -> Result<ImpactOrchestrator> {
        let config = self.config()?;
        let terrain = self.terrain(&config)?;
        Ok(ImpactOrchestrator::new(&config, terrain, Arc::new(self.regions()?)))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct AqiReport {
    pm25: f64,
    aqi: u16,
    category: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pm10_aqi: Option<u16>,
}

fn aqi_report(pm25: f64, pm10: Option<f64>) -> AqiReport {
    let aqi = pm25_to_aqi(pm25);
    AqiReport {
        pm25,
        aqi,
        category: AqiCategory::from_aqi(aqi).label(),
        pm10_aqi: pm10.map(pm10_to_aqi),
    }
}

fn run_flood(
    sources: &Sources,
    center: GeoPoint,
    rain: f64,
    zoom: Option<u32>,
    interval: Duration,
    print_cells: bool,
) -> Result<()> {
    let config = sources.config()?;
    let terrain = sources.terrain(&config)?;
    let slot = SnapshotSlot::new();
    let mut simulator = FloodSpreadSimulator::new(terrain, config.flood.clone(), slot.clone());
    if let Some(zoom) = zoom {
        simulator.set_zoom(zoom);
    }

    let run = simulator.start(center, rain);
    tracing::info!(target: "riskscape::cli", run = run.0, "flood.started");
    loop {
        let outcome = simulator.tick_run(run);
        println!("{}", serde_json::to_string(&outcome)?);
        match outcome {
            TickOutcome::Advanced { .. } => thread::sleep(interval),
            TickOutcome::Finished { .. } | TickOutcome::Idle => break,
        }
    }
    tracing::info!(target: "riskscape::cli", snapshots = slot.publish_count(), "flood.finished");

    if print_cells {
        print_json(&slot.latest())?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Evaluate { query, year, request } => {
            let orchestrator = query.sources.orchestrator()?;
            let request = match request {
                Some(path) => read_json::<ScenarioRequest>(&path)?,
                None => ScenarioRequest {
                    location: query.location(),
                    year,
                    base_year: query.base_year,
                    max_year: query.max_year,
                    live: query.live(),
                },
            };
            print_json(&orchestrator.evaluate_request(&request))?;
        }
        Command::Trajectory { query } => {
            let orchestrator = query.sources.orchestrator()?;
            let series = orchestrator.trajectory(&query.location(), query.base_year, query.max_year, &query.live());
            print_json(&series)?;
        }
        Command::Flood { sources, lat, lng, rain, zoom, interval_ms, cells } => {
            run_flood(&sources, GeoPoint::new(lat, lng), rain, zoom, Duration::from_millis(interval_ms), cells)?;
        }
        Command::Aqi { pm25, pm10 } => print_json(&aqi_report(pm25, pm10))?,
    }

    Ok(())
}
