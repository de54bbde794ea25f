//! State of one flood animation run, advanced by a pure `tick` transition.
use serde::{Deserialize, Serialize};

use crate::config::FloodConfig;
use crate::coords::GeoPoint;

/// Identifies a run so ticks scheduled for a cancelled run can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodRun {
    pub id: RunId,
    pub center: GeoPoint,
    pub rainfall_mm: f64,
    pub zoom: u32,
    ticks: u32,
    step: f64,
    max_multiplier: f64,
}

impl FloodRun {
    pub fn new(id: RunId, center: GeoPoint, rainfall_mm: f64, zoom: u32, config: &FloodConfig) -> Self {
        Self {
            id,
            center,
            rainfall_mm: if rainfall_mm.is_finite() { rainfall_mm.max(0.0) } else { 0.0 },
            zoom,
            ticks: 0,
            step: config.depth_step.max(0.0),
            max_multiplier: config.max_depth.max(0.0),
        }
    }

    /// Advance one animation step. Saturates at the max multiplier.
    #[must_use]
    pub fn tick(self) -> Self {
        if self.is_finished() {
            return self;
        }
        Self { ticks: self.ticks + 1, ..self }
    }

    /// `ticks * step`, capped at `max_depth`. Computed from the tick count,
    /// never accumulated.
    pub fn depth_multiplier(&self) -> f64 {
        (self.ticks as f64 * self.step).min(self.max_multiplier)
    }

    pub fn effective_rainfall_mm(&self) -> f64 {
        self.rainfall_mm * self.depth_multiplier()
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// A zero step can never reach the cap; such a run ends immediately.
    pub fn is_finished(&self) -> bool {
        self.step <= 0.0 || self.depth_multiplier() >= self.max_multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> FloodRun {
        FloodRun::new(RunId(1), GeoPoint::new(19.0, 72.8), 50.0, 14, &FloodConfig::default())
    }

    #[test]
    fn starts_at_zero() {
        let r = run();
        assert_eq!(r.depth_multiplier(), 0.0);
        assert_eq!(r.effective_rainfall_mm(), 0.0);
        assert!(!r.is_finished());
    }

    #[test]
    fn multiplier_is_monotone_and_capped() {
        let mut r = run();
        let mut prev = r.depth_multiplier();
        let mut ticks = 0;
        while !r.is_finished() {
            r = r.tick();
            ticks += 1;
            let m = r.depth_multiplier();
            assert!(m >= prev, "multiplier decreased: {prev} -> {m}");
            assert!(m <= 3.5);
            prev = m;
            assert!(ticks <= 200, "run never finished");
        }
        assert_eq!(r.depth_multiplier(), 3.5);
        assert!((175..=176).contains(&ticks), "ticks = {ticks}");

        let after = r.clone().tick();
        assert_eq!(after, r);
    }

    #[test]
    fn negative_rainfall_is_clamped() {
        let r = FloodRun::new(RunId(2), GeoPoint::new(0.0, 0.0), -10.0, 10, &FloodConfig::default());
        assert_eq!(r.tick().effective_rainfall_mm(), 0.0);
    }
}
