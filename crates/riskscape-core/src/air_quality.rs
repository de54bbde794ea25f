//! Pollutant concentration → US EPA air-quality index.
//!
//! Conversion is piecewise linear within each breakpoint band and never
//! fails: negative or NaN concentrations read as 0, anything beyond the last
//! band is capped at 500. Fetching a live reading is the only operation that
//! can come back empty, and it does so quietly.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coords::GeoPoint;

pub const AQI_MAX: u16 = 500;

/// Default budget for a live pollutant lookup.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// `(conc_lo, conc_hi, index_lo, index_hi)` per band, µg/m³.
type Band = (f64, f64, f64, f64);

const PM25_BANDS: [Band; 6] = [
    (0.0, 12.0, 0.0, 50.0),
    (12.0, 35.4, 50.0, 100.0),
    (35.4, 55.4, 100.0, 150.0),
    (55.4, 150.4, 150.0, 200.0),
    (150.4, 250.4, 200.0, 300.0),
    (250.4, 500.4, 300.0, 500.0),
];

const PM10_BANDS: [Band; 6] = [
    (0.0, 54.0, 0.0, 50.0),
    (54.0, 154.0, 50.0, 100.0),
    (154.0, 254.0, 100.0, 150.0),
    (254.0, 354.0, 150.0, 200.0),
    (354.0, 424.0, 200.0, 300.0),
    (424.0, 604.0, 300.0, 500.0),
];

fn index_from_bands(concentration: f64, bands: &[Band]) -> u16 {
    if concentration.is_nan() {
        return 0;
    }
    let c = concentration.max(0.0);
    for &(c_lo, c_hi, i_lo, i_hi) in bands {
        if c <= c_hi {
            let aqi = i_lo + (c - c_lo) / (c_hi - c_lo) * (i_hi - i_lo);
            return (aqi.round() as u16).min(AQI_MAX);
        }
    }
    AQI_MAX
}

/// PM2.5 (µg/m³, 24 h) → AQI in `0..=500`.
pub fn pm25_to_aqi(pm25: f64) -> u16 {
    index_from_bands(pm25, &PM25_BANDS)
}

/// PM10 (µg/m³, 24 h) → AQI in `0..=500`.
pub fn pm10_to_aqi(pm10: f64) -> u16 {
    index_from_bands(pm10, &PM10_BANDS)
}

/// EPA health category for an AQI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub fn from_aqi(aqi: u16) -> Self {
        match aqi {
            0..=50 => Self::Good,
            51..=100 => Self::Moderate,
            101..=150 => Self::UnhealthyForSensitive,
            151..=200 => Self::Unhealthy,
            201..=300 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitive => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }
}

/// Raw concentrations as an air-quality provider reports them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollutantSample {
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub o3: f64,
    /// Unix epoch milliseconds.
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AqiReading {
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub o3: f64,
    /// Index derived from PM2.5.
    pub aqi: u16,
    pub timestamp_ms: u64,
}

impl AqiReading {
    /// `None` when PM2.5 is not a finite number; other pollutants are
    /// carried through as reported.
    pub fn from_sample(sample: PollutantSample) -> Option<Self> {
        if !sample.pm25.is_finite() {
            return None;
        }
        Some(Self {
            pm25: sample.pm25,
            pm10: sample.pm10,
            no2: sample.no2,
            o3: sample.o3,
            aqi: pm25_to_aqi(sample.pm25),
            timestamp_ms: sample.timestamp_ms,
        })
    }

    pub fn category(&self) -> AqiCategory {
        AqiCategory::from_aqi(self.aqi)
    }
}

/// External air-quality provider. `None` means no reading is available.
pub trait PollutantSource: Send + Sync {
    fn sample(&self, point: GeoPoint) -> Option<PollutantSample>;
}

impl<F> PollutantSource for F
where
    F: Fn(GeoPoint) -> Option<PollutantSample> + Send + Sync,
{
    fn sample(&self, point: GeoPoint) -> Option<PollutantSample> {
        self(point)
    }
}

/// Query `source` on a worker thread, giving up after `timeout`.
///
/// Timeouts, empty answers, unusable readings and provider panics all yield
/// `None`. A provider that overruns keeps its thread until it returns; its
/// late answer is dropped.
pub fn fetch_live_reading(
    source: Arc<dyn PollutantSource>,
    point: GeoPoint,
    timeout: Duration,
) -> Option<AqiReading> {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("pollutant-fetch".into())
        .spawn(move || {
            let _ = tx.send(source.sample(point));
        });
    if let Err(err) = spawned {
        tracing::warn!(target: "riskscape::air_quality", error = %err, "pollutant fetch could not start");
        return None;
    }

    match rx.recv_timeout(timeout) {
        Ok(Some(sample)) => {
            let reading = AqiReading::from_sample(sample);
            if reading.is_none() {
                tracing::warn!(target: "riskscape::air_quality", ?sample, "discarding non-finite pollutant reading");
            }
            reading
        }
        Ok(None) => {
            tracing::debug!(target: "riskscape::air_quality", lat = point.lat, lng = point.lng, "no pollutant reading");
            None
        }
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(
                target: "riskscape::air_quality",
                timeout_ms = timeout.as_millis() as u64,
                "pollutant fetch timed out"
            );
            None
        }
        Err(RecvTimeoutError::Disconnected) => {
            tracing::warn!(target: "riskscape::air_quality", "pollutant source failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pm25: f64) -> PollutantSample {
        PollutantSample { pm25, pm10: 40.0, no2: 20.0, o3: 30.0, timestamp_ms: 1_700_000_000_000 }
    }

    #[test]
    fn good_band_matches_linear_formula() {
        for i in 0..=120 {
            let pm25 = i as f64 * 0.1;
            assert_eq!(pm25_to_aqi(pm25), (pm25 / 12.0 * 50.0).round() as u16, "pm25 = {pm25}");
        }
    }

    #[test]
    fn breakpoints_hit_band_edges() {
        assert_eq!(pm25_to_aqi(12.0), 50);
        assert_eq!(pm25_to_aqi(35.4), 100);
        assert_eq!(pm25_to_aqi(55.4), 150);
        assert_eq!(pm25_to_aqi(150.4), 200);
        assert_eq!(pm25_to_aqi(250.4), 300);
        assert_eq!(pm25_to_aqi(500.4), 500);
    }

    #[test]
    fn monotone_and_bounded_over_whole_domain() {
        let mut prev = 0;
        for i in 0..=8000 {
            let aqi = pm25_to_aqi(i as f64 * 0.1);
            assert!(aqi >= prev, "decrease at {}: {prev} -> {aqi}", i as f64 * 0.1);
            assert!(aqi <= AQI_MAX);
            prev = aqi;
        }
        assert_eq!(pm25_to_aqi(1.0e9), 500);
        assert_eq!(pm25_to_aqi(f64::INFINITY), 500);
    }

    #[test]
    fn invalid_concentrations_read_as_zero() {
        assert_eq!(pm25_to_aqi(-4.0), 0);
        assert_eq!(pm25_to_aqi(f64::NAN), 0);
        assert_eq!(pm10_to_aqi(-1.0), 0);
    }

    #[test]
    fn pm10_uses_its_own_table() {
        assert_eq!(pm10_to_aqi(54.0), 50);
        assert_eq!(pm10_to_aqi(154.0), 100);
        assert_eq!(pm10_to_aqi(700.0), 500);
    }

    #[test]
    fn categories_follow_epa_tiers() {
        assert_eq!(AqiCategory::from_aqi(0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(51), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(150), AqiCategory::UnhealthyForSensitive);
        assert_eq!(AqiCategory::from_aqi(201), AqiCategory::VeryUnhealthy);
        assert_eq!(AqiCategory::from_aqi(500), AqiCategory::Hazardous);
        assert_eq!(AqiCategory::Hazardous.label(), "Hazardous");
    }

    #[test]
    fn live_fetch_converts_reading() {
        let source: Arc<dyn PollutantSource> = Arc::new(|_p: GeoPoint| Some(sample(35.4)));
        let reading = fetch_live_reading(source, GeoPoint::new(28.6, 77.2), DEFAULT_FETCH_TIMEOUT).unwrap();
        assert_eq!(reading.aqi, 100);
        assert_eq!(reading.category(), AqiCategory::Moderate);
        assert_eq!(reading.pm10, 40.0);
    }

    #[test]
    fn live_fetch_fails_soft() {
        let empty: Arc<dyn PollutantSource> = Arc::new(|_p: GeoPoint| -> Option<PollutantSample> { None });
        assert!(fetch_live_reading(empty, GeoPoint::new(0.0, 0.0), DEFAULT_FETCH_TIMEOUT).is_none());

        let nan: Arc<dyn PollutantSource> = Arc::new(|_p: GeoPoint| Some(sample(f64::NAN)));
        assert!(fetch_live_reading(nan, GeoPoint::new(0.0, 0.0), DEFAULT_FETCH_TIMEOUT).is_none());

        let slow: Arc<dyn PollutantSource> = Arc::new(|_p: GeoPoint| {
            thread::sleep(Duration::from_millis(300));
            Some(sample(10.0))
        });
        assert!(fetch_live_reading(slow, GeoPoint::new(0.0, 0.0), Duration::from_millis(20)).is_none());

        let panicking: Arc<dyn PollutantSource> =
            Arc::new(|_p: GeoPoint| -> Option<PollutantSample> { panic!("provider exploded") });
        assert!(fetch_live_reading(panicking, GeoPoint::new(0.0, 0.0), DEFAULT_FETCH_TIMEOUT).is_none());
    }
}
