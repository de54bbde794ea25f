use serde::{Deserialize, Serialize};

use crate::coords::GeoPoint;
use crate::terrain::ElevationSource;

/// A regular lat/lng elevation raster (metres, f32), row-major from the
/// southern edge. Coordinate math uses f64; elevation values use f32.
///
/// This is the in-process stand-in for a terrain data provider: anything that
/// can hand over a DEM tile can answer elevation queries through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawHeightField")]
pub struct HeightField {
    /// Row-major elevation values in metres. Row 0 is `min_lat`.
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub min_lng: f64,
    pub max_lng: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// Wire form, checked before it becomes a `HeightField`.
#[derive(Deserialize)]
struct RawHeightField {
    data: Vec<f32>,
    width: usize,
    height: usize,
    min_lng: f64,
    max_lng: f64,
    min_lat: f64,
    max_lat: f64,
}

impl TryFrom<RawHeightField> for HeightField {
    type Error = String;

    fn try_from(raw: RawHeightField) -> Result<Self, Self::Error> {
        let expected = raw
            .width
            .checked_mul(raw.height)
            .ok_or_else(|| format!("raster {}x{} is too large", raw.width, raw.height))?;
        if raw.data.len() != expected {
            return Err(format!(
                "raster {}x{} needs {expected} values, got {}",
                raw.width,
                raw.height,
                raw.data.len()
            ));
        }
        let bounds = [raw.min_lng, raw.max_lng, raw.min_lat, raw.max_lat];
        if bounds.iter().any(|b| !b.is_finite()) || raw.min_lng > raw.max_lng || raw.min_lat > raw.max_lat {
            return Err("raster bounds must be finite and ordered".to_string());
        }
        Ok(Self {
            data: raw.data,
            width: raw.width,
            height: raw.height,
            min_lng: raw.min_lng,
            max_lng: raw.max_lng,
            min_lat: raw.min_lat,
            max_lat: raw.max_lat,
        })
    }
}

impl HeightField {
    pub fn new(width: usize, height: usize, min_lng: f64, max_lng: f64, min_lat: f64, max_lat: f64, fill: f32) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            min_lng,
            max_lng,
            min_lat,
            max_lat,
        }
    }

    /// Build a raster by evaluating `f` at every grid node.
    pub fn from_fn(
        width: usize,
        height: usize,
        (min_lng, max_lng): (f64, f64),
        (min_lat, max_lat): (f64, f64),
        f: impl Fn(GeoPoint) -> f32,
    ) -> Self {
        let mut hf = Self::new(width, height, min_lng, max_lng, min_lat, max_lat, 0.0);
        for r in 0..height {
            for c in 0..width {
                let v = f(hf.node(r, c));
                hf.set(r, c, v);
            }
        }
        hf
    }

    /// Geographic position of grid node `(row, col)`.
    pub fn node(&self, row: usize, col: usize) -> GeoPoint {
        let fy = if self.height > 1 { row as f64 / (self.height - 1) as f64 } else { 0.0 };
        let fx = if self.width > 1 { col as f64 / (self.width - 1) as f64 } else { 0.0 };
        GeoPoint::new(
            self.min_lat + fy * (self.max_lat - self.min_lat),
            self.min_lng + fx * (self.max_lng - self.min_lng),
        )
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    /// Value at `(row, col)`, or `None` past the end of `data`.
    fn value(&self, row: usize, col: usize) -> Option<f32> {
        let idx = row.checked_mul(self.width)?.checked_add(col)?;
        self.data.get(idx).copied()
    }

    /// Bilinear sample at `p`. `None` outside the raster, for an empty one,
    /// or when `data` is shorter than `width * height`.
    pub fn sample(&self, p: GeoPoint) -> Option<f32> {
        if self.width == 0 || self.height == 0 || !p.is_finite() {
            return None;
        }
        if p.lng < self.min_lng || p.lng > self.max_lng || p.lat < self.min_lat || p.lat > self.max_lat {
            return None;
        }

        let span_lng = self.max_lng - self.min_lng;
        let span_lat = self.max_lat - self.min_lat;
        let fx = if span_lng > 0.0 { (p.lng - self.min_lng) / span_lng * (self.width - 1) as f64 } else { 0.0 };
        let fy = if span_lat > 0.0 { (p.lat - self.min_lat) / span_lat * (self.height - 1) as f64 } else { 0.0 };

        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let tx = (fx - x0 as f64) as f32;
        let ty = (fy - y0 as f64) as f32;

        let v00 = self.value(y0, x0)?;
        let v10 = self.value(y0, x1)?;
        let v01 = self.value(y1, x0)?;
        let v11 = self.value(y1, x1)?;

        Some(
            v00 * (1.0 - tx) * (1.0 - ty)
                + v10 * tx * (1.0 - ty)
                + v01 * (1.0 - tx) * ty
                + v11 * tx * ty,
        )
    }
}

impl ElevationSource for HeightField {
    fn elevation(&self, point: GeoPoint) -> Option<f64> {
        self.sample(point).map(f64::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_corners_return_exact_values() {
        let mut hf = HeightField::new(4, 4, 72.0, 73.0, 19.0, 20.0, 0.0);
        hf.set(0, 0, 10.0);
        hf.set(0, 3, 20.0);
        hf.set(3, 0, 30.0);
        hf.set(3, 3, 40.0);

        let at = |lat, lng| hf.sample(GeoPoint::new(lat, lng)).unwrap();
        assert!((at(19.0, 72.0) - 10.0).abs() < 1e-5);
        assert!((at(19.0, 73.0) - 20.0).abs() < 1e-5);
        assert!((at(20.0, 72.0) - 30.0).abs() < 1e-5);
        assert!((at(20.0, 73.0) - 40.0).abs() < 1e-5);
    }

    #[test]
    fn outside_bounds_is_unavailable() {
        let hf = HeightField::new(4, 4, 72.0, 73.0, 19.0, 20.0, 5.0);
        assert!(hf.elevation(GeoPoint::new(18.0, 72.5)).is_none());
        assert!(hf.elevation(GeoPoint::new(f64::NAN, 72.5)).is_none());
        assert_eq!(hf.elevation(GeoPoint::new(19.5, 72.5)), Some(5.0));
    }

    #[test]
    fn from_fn_evaluates_nodes() {
        let hf = HeightField::from_fn(3, 3, (0.0, 2.0), (0.0, 2.0), |p| (p.lat * 10.0 + p.lng) as f32);
        assert_eq!(hf.get(2, 1), 21.0);
        assert_eq!(hf.get(0, 2), 2.0);
    }

    #[test]
    fn mismatched_raster_is_rejected_on_load() {
        let short = r#"{"data":[1.0],"width":4,"height":4,"min_lng":72.0,"max_lng":73.0,"min_lat":19.0,"max_lat":20.0}"#;
        let err = serde_json::from_str::<HeightField>(short).unwrap_err();
        assert!(err.to_string().contains("needs 16 values"));

        let flipped = r#"{"data":[1.0],"width":1,"height":1,"min_lng":73.0,"max_lng":72.0,"min_lat":19.0,"max_lat":20.0}"#;
        assert!(serde_json::from_str::<HeightField>(flipped).is_err());

        let good = serde_json::to_string(&HeightField::new(2, 2, 72.0, 73.0, 19.0, 20.0, 7.0)).unwrap();
        let back: HeightField = serde_json::from_str(&good).unwrap();
        assert_eq!(back.sample(GeoPoint::new(19.5, 72.5)), Some(7.0));
    }

    #[test]
    fn short_data_reads_as_unavailable_elevation() {
        let mut hf = HeightField::new(4, 4, 72.0, 73.0, 19.0, 20.0, 1.0);
        hf.data.truncate(1);
        assert_eq!(hf.elevation(GeoPoint::new(19.5, 72.5)), None);

        let terrain = crate::terrain::TerrainMetricsProvider::with_defaults(std::sync::Arc::new(hf));
        assert_eq!(terrain.terrain_metrics(GeoPoint::new(19.5, 72.5)).elevation, 0.0);
    }
}
