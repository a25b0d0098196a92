//! Resampling a raster into another raster's pixel grid.

use nalgebra::Vector3;
use orthoreg_core::{BandView, Homography, Raster, RasterError};
use serde::{Deserialize, Serialize};

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Sampling kernel used by the warp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Bilinear,
    Nearest,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpParams {
    pub interpolation: Interpolation,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WarpError {
    #[error("homography is not invertible")]
    NotInvertible,
    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// Warp every band of `source` into a `width × height` grid.
///
/// `h` maps source pixels to destination pixels; each destination pixel
/// centre is pulled back through `h⁻¹` and sampled. Lookups outside the
/// source, or at infinity, read 0. The output carries an identity
/// geotransform and no CRS until it is reconciled.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(source, h, params), fields(bands = source.band_count()))
)]
pub fn warp_raster(
    source: &Raster,
    h: &Homography,
    width: usize,
    height: usize,
    params: &WarpParams,
) -> Result<Raster, WarpError> {
    if !h.is_well_conditioned() {
        return Err(WarpError::NotInvertible);
    }
    let inv = h.h.try_inverse().ok_or(WarpError::NotInvertible)?;

    let mut coords = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let v = inv * Vector3::new(x as f64, y as f64, 1.0);
            if v[2].abs() < 1e-12 {
                coords.push((f64::NAN, f64::NAN));
            } else {
                coords.push((v[0] / v[2], v[1] / v[2]));
            }
        }
    }

    let mut out = Raster::zeros(width, height, source.band_count())?;
    let plane = width * height;
    let interpolation = params.interpolation;

    #[cfg(feature = "rayon")]
    out.data_mut()
        .par_chunks_mut(plane)
        .enumerate()
        .for_each(|(b, dst)| resample_band(dst, source.band_view(b), &coords, interpolation));
    #[cfg(not(feature = "rayon"))]
    out.data_mut()
        .chunks_mut(plane)
        .enumerate()
        .for_each(|(b, dst)| resample_band(dst, source.band_view(b), &coords, interpolation));

    Ok(out)
}

fn resample_band(
    dst: &mut [f32],
    band: BandView<'_>,
    coords: &[(f64, f64)],
    interpolation: Interpolation,
) {
    for (d, &(x, y)) in dst.iter_mut().zip(coords) {
        *d = match interpolation {
            Interpolation::Bilinear => band.sample_bilinear(x, y),
            Interpolation::Nearest => band.sample_nearest(x, y),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;
    use orthoreg_core::GeoTransform;

    fn ramp(width: usize, height: usize, bands: usize) -> Raster {
        let planes = (0..bands)
            .map(|b| {
                (0..width * height)
                    .map(|i| ((i % width) + 10 * (i / width) + 1000 * b) as f32)
                    .collect()
            })
            .collect();
        Raster::from_bands(width, height, planes, GeoTransform::IDENTITY, "").unwrap()
    }

    #[test]
    fn identity_reproduces_source() {
        let src = ramp(7, 5, 2);
        let out = warp_raster(&src, &Homography::identity(), 7, 5, &WarpParams::default()).unwrap();
        assert_eq!(out.band_count(), 2);
        for (a, b) in out.data().iter().zip(src.data()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-4);
        }
    }

    #[test]
    fn translation_shifts_and_fills_zero() {
        let src = ramp(8, 6, 1);
        let h = Homography::translation(2.0, 1.0);
        let out = warp_raster(&src, &h, 8, 6, &WarpParams::default()).unwrap();
        let band = out.band(0);
        // dst(x, y) = src(x - 2, y - 1)
        assert_relative_eq!(band[3 * 8 + 5], src.band(0)[2 * 8 + 3], epsilon = 1e-4);
        assert_eq!(band[0], 0.0);
        assert_eq!(band[8 + 1], 0.0);
    }

    #[test]
    fn nearest_keeps_source_values() {
        let src = ramp(6, 6, 1);
        let h = Homography::translation(0.4, -0.4);
        let params = WarpParams {
            interpolation: Interpolation::Nearest,
        };
        let out = warp_raster(&src, &h, 6, 6, &params).unwrap();
        assert!(out.band(0).iter().all(|v| src.band(0).contains(v) || *v == 0.0));
    }

    #[test]
    fn output_takes_requested_grid() {
        let src = ramp(4, 4, 3);
        let out = warp_raster(&src, &Homography::identity(), 9, 2, &WarpParams::default()).unwrap();
        assert_eq!((out.width(), out.height(), out.band_count()), (9, 2, 3));
    }

    #[test]
    fn large_offset_is_warped_not_refused() {
        let src = ramp(20, 20, 1);
        let far = Homography::from_array([[0.1, 0.0, 3000.0], [0.0, 0.1, 2000.0], [0.0, 0.0, 1.0]]);
        let out = warp_raster(&src, &far, 4, 4, &WarpParams::default()).unwrap();
        assert!(out.band(0).iter().all(|v| *v == 0.0));

        // dst(x, y) = src(x + 12000, y)
        let wide = ramp(12_010, 2, 1);
        let back = Homography::translation(-12_000.0, 0.0);
        let out = warp_raster(&wide, &back, 4, 2, &WarpParams::default()).unwrap();
        assert_relative_eq!(out.band(0)[4 + 1], wide.band(0)[12_010 + 12_001], epsilon = 1e-2);
    }

    #[test]
    fn singular_homography_is_rejected() {
        let src = ramp(4, 4, 1);
        let h = Homography::new(Matrix3::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0, 0.0, 0.0, 1.0));
        assert_eq!(
            warp_raster(&src, &h, 4, 4, &WarpParams::default()).unwrap_err(),
            WarpError::NotInvertible
        );
    }
}
