//! Animated flood spread around a point.
//!
//! The simulator owns at most one active [`FloodRun`]. The host's update loop
//! calls [`FloodSpreadSimulator::tick`] at its own cadence; each tick advances
//! the depth multiplier, rebuilds the grid and publishes the cell list to the
//! sink. Nothing here sleeps or spawns.
pub mod grid;
pub mod run;

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::FloodConfig;
use crate::coords::GeoPoint;
use crate::terrain::TerrainMetricsProvider;
pub use grid::{build_flood_cells, zoom_to_grid_params, FloodCell, GridParams};
pub use run::{FloodRun, RunId};

/// Receives one cell-list snapshot per tick, and an empty list on stop.
pub trait FloodSink {
    fn publish(&mut self, cells: Vec<FloodCell>);
}

impl<F> FloodSink for F
where
    F: FnMut(Vec<FloodCell>),
{
    fn publish(&mut self, cells: Vec<FloodCell>) {
        self(cells)
    }
}

/// Sink that keeps only the latest snapshot, readable from another handle.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSlot {
    latest: Arc<Mutex<Vec<FloodCell>>>,
    published: Arc<Mutex<u64>>,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Vec<FloodCell> {
        self.latest.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Total snapshots received.
    pub fn publish_count(&self) -> u64 {
        *self.published.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl FloodSink for SnapshotSlot {
    fn publish(&mut self, cells: Vec<FloodCell>) {
        *self.latest.lock().unwrap_or_else(|p| p.into_inner()) = cells;
        *self.published.lock().unwrap_or_else(|p| p.into_inner()) += 1;
    }
}

/// Snapshot of the active run's grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodGridState {
    pub run: RunId,
    pub center: GeoPoint,
    pub radius: f64,
    pub step: f64,
    pub depth_multiplier: f64,
    pub cells: Vec<FloodCell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TickOutcome {
    /// No run active, or the tick belonged to a cancelled run.
    Idle,
    Advanced { run: RunId, depth_multiplier: f64, cells: usize },
    /// Final tick of a run; the simulator is idle afterwards.
    Finished { run: RunId, cells: usize },
}

struct ActiveRun {
    run: FloodRun,
    cells: Vec<FloodCell>,
}

pub struct FloodSpreadSimulator<S: FloodSink> {
    terrain: Arc<TerrainMetricsProvider>,
    config: FloodConfig,
    sink: S,
    zoom: u32,
    active: Option<ActiveRun>,
    next_id: u64,
}

impl<S: FloodSink> FloodSpreadSimulator<S> {
    pub fn new(terrain: Arc<TerrainMetricsProvider>, config: FloodConfig, sink: S) -> Self {
        Self {
            terrain,
            zoom: config.default_zoom,
            config,
            sink,
            active: None,
            next_id: 0,
        }
    }

    /// Map zoom used for runs started after this call.
    pub fn set_zoom(&mut self, zoom: u32) {
        self.zoom = zoom;
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    /// Begin a new run, cancelling any run in flight.
    pub fn start(&mut self, center: GeoPoint, rainfall_mm: f64) -> RunId {
        if let Some(prev) = self.active.take() {
            tracing::debug!(target: "riskscape::flood", run = prev.run.id.0, "flood_run.cancelled");
        }
        self.next_id += 1;
        let id = RunId(self.next_id);
        let run = FloodRun::new(id, center.sanitized(), rainfall_mm, self.zoom, &self.config);
        tracing::debug!(
            target: "riskscape::flood",
            run = id.0,
            lat = run.center.lat,
            lng = run.center.lng,
            rainfall_mm = run.rainfall_mm,
            zoom = self.zoom,
            "flood_run.started"
        );
        self.active = Some(ActiveRun { run, cells: Vec::new() });
        id
    }

    /// Cancel any pending tick and publish an empty snapshot.
    pub fn stop(&mut self) {
        if let Some(prev) = self.active.take() {
            tracing::debug!(target: "riskscape::flood", run = prev.run.id.0, "flood_run.stopped");
        }
        self.sink.publish(Vec::new());
    }

    /// Advance the active run by one step.
    pub fn tick(&mut self) -> TickOutcome {
        let Some(active) = self.active.take() else {
            return TickOutcome::Idle;
        };
        let run = active.run.tick();
        let cells = build_flood_cells(
            &self.terrain,
            run.center,
            run.effective_rainfall_mm(),
            run.zoom,
            &self.config,
        );
        let count = cells.len();
        self.sink.publish(cells.clone());

        if run.is_finished() {
            tracing::debug!(target: "riskscape::flood", run = run.id.0, ticks = run.ticks(), "flood_run.finished");
            return TickOutcome::Finished { run: run.id, cells: count };
        }
        let outcome = TickOutcome::Advanced {
            run: run.id,
            depth_multiplier: run.depth_multiplier(),
            cells: count,
        };
        self.active = Some(ActiveRun { run, cells });
        outcome
    }

    /// Tick only if `id` is still the active run. Ticks a scheduler queued for
    /// a run that has since been cancelled are dropped here.
    pub fn tick_run(&mut self, id: RunId) -> TickOutcome {
        match &self.active {
            Some(active) if active.run.id == id => self.tick(),
            _ => {
                tracing::trace!(target: "riskscape::flood", run = id.0, "flood_tick.stale");
                TickOutcome::Idle
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_run(&self) -> Option<RunId> {
        self.active.as_ref().map(|a| a.run.id)
    }

    pub fn depth_multiplier(&self) -> Option<f64> {
        self.active.as_ref().map(|a| a.run.depth_multiplier())
    }

    pub fn grid_state(&self) -> Option<FloodGridState> {
        let active = self.active.as_ref()?;
        let params = zoom_to_grid_params(active.run.zoom, &self.config);
        Some(FloodGridState {
            run: active.run.id,
            center: active.run.center,
            radius: params.radius,
            step: params.step,
            depth_multiplier: active.run.depth_multiplier(),
            cells: active.cells.clone(),
        })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Drive the active run to completion, calling `on_tick` after every step.
    /// For hosts without their own update loop.
    pub fn run_to_completion(&mut self, mut on_tick: impl FnMut(&TickOutcome)) -> u32 {
        let mut ticks = 0;
        loop {
            let outcome = self.tick();
            if outcome == TickOutcome::Idle {
                return ticks;
            }
            ticks += 1;
            on_tick(&outcome);
            if matches!(outcome, TickOutcome::Finished { .. }) {
                return ticks;
            }
        }
    }
}
