//! Multi-band raster → 8-bit intensity surface.

use orthoreg_core::{GrayImage, Raster};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Percentile stretch applied before feature detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeParams {
    /// Percentile mapped to 0, in `[0, 100]`.
    pub low_percentile: f64,
    /// Percentile mapped to 255, in `[0, 100]`.
    pub high_percentile: f64,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            low_percentile: 2.0,
            high_percentile: 98.0,
        }
    }
}

/// Band mean, percentile stretch, clamp and round to `u8`.
///
/// Non-finite samples (no-data) are ignored by the percentiles and map to 0.
/// When both percentiles coincide the upper bound is widened by one unit.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(width = raster.width(), height = raster.height(), bands = raster.band_count()))
)]
pub fn to_grayscale(raster: &Raster, params: &NormalizeParams) -> GrayImage {
    let surface = band_mean(raster);

    let mut finite: Vec<f32> = surface.iter().copied().filter(|v| v.is_finite()).collect();
    finite.sort_unstable_by(f32::total_cmp);
    let (lo, mut hi) = if finite.is_empty() {
        (0.0, 0.0)
    } else {
        (
            percentile(&finite, params.low_percentile),
            percentile(&finite, params.high_percentile),
        )
    };
    if hi == lo {
        hi = lo + 1.0;
    }
    log::debug!("normalize: stretch [{lo}, {hi}] over {} finite samples", finite.len());

    let scale = 1.0 / (hi - lo);
    let data = surface
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                return 0;
            }
            let t = ((v as f64 - lo) * scale).clamp(0.0, 1.0);
            (t * 255.0).round() as u8
        })
        .collect();

    GrayImage {
        width: raster.width(),
        height: raster.height(),
        data,
    }
}

/// Per-pixel arithmetic mean over all bands.
pub fn band_mean(raster: &Raster) -> Vec<f32> {
    if raster.band_count() == 1 {
        return raster.band(0).to_vec();
    }
    let n = raster.width() * raster.height();
    let mut acc = vec![0.0f64; n];
    for b in 0..raster.band_count() {
        for (a, &v) in acc.iter_mut().zip(raster.band(b)) {
            *a += v as f64;
        }
    }
    let inv = 1.0 / raster.band_count() as f64;
    acc.into_iter().map(|a| (a * inv) as f32).collect()
}

/// Percentile of ascending `sorted` with linear interpolation between order
/// statistics; `q` in `[0, 100]`.
pub fn percentile(sorted: &[f32], q: f64) -> f64 {
    match sorted.len() {
        0 => return f64::NAN,
        1 => return sorted[0] as f64,
        _ => {}
    }
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    let a = sorted[below] as f64;
    let b = sorted[above] as f64;
    a + (b - a) * (rank - below as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use orthoreg_core::GeoTransform;

    fn single_band(width: usize, height: usize, data: Vec<f32>) -> Raster {
        Raster::new(width, height, 1, data, GeoTransform::IDENTITY, "").unwrap()
    }

    #[test]
    fn percentile_interpolates_like_numpy() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&v, 0.0), 1.0);
        assert_relative_eq!(percentile(&v, 50.0), 2.5);
        assert_relative_eq!(percentile(&v, 100.0), 4.0);
        assert_relative_eq!(percentile(&v, 2.0), 1.06, epsilon = 1e-12);
    }

    #[test]
    fn stretch_saturates_tails() {
        let data: Vec<f32> = (0..10_000).map(|v| v as f32).collect();
        let gray = to_grayscale(&single_band(100, 100, data), &NormalizeParams::default());
        let zeros = gray.data.iter().filter(|&&v| v == 0).count();
        let full = gray.data.iter().filter(|&&v| v == 255).count();
        // Everything at or below the 2nd percentile maps to 0 (plus rounding).
        assert!((200..=225).contains(&zeros), "zeros {zeros}");
        assert!((200..=225).contains(&full), "full {full}");
        assert!(gray.data.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn constant_surface_is_uniform() {
        let gray = to_grayscale(&single_band(8, 4, vec![42.5; 32]), &NormalizeParams::default());
        assert_eq!(gray.width, 8);
        assert_eq!(gray.height, 4);
        assert!(gray.data.iter().all(|&v| v == gray.data[0]));
    }

    #[test]
    fn bands_are_averaged() {
        let raster = Raster::from_bands(
            2,
            1,
            vec![vec![0.0, 10.0], vec![20.0, 30.0]],
            GeoTransform::IDENTITY,
            "",
        )
        .unwrap();
        assert_eq!(band_mean(&raster), vec![10.0, 20.0]);
    }

    #[test]
    fn nodata_maps_to_zero_and_is_ignored() {
        let mut data: Vec<f32> = (0..100).map(|v| v as f32).collect();
        data[0] = f32::NAN;
        data[99] = f32::INFINITY;
        let gray = to_grayscale(&single_band(10, 10, data), &NormalizeParams::default());
        assert_eq!(gray.data[0], 0);
        assert_eq!(gray.data[99], 0);
        assert_eq!(gray.data[98], 255);
    }
}
