//! Multi-band floating point rasters with their georeference.

use serde::{Deserialize, Serialize};

/// Affine pixel-to-world mapping in GDAL coefficient order.
///
/// `x = c[0] + col * c[1] + row * c[2]`, `y = c[3] + col * c[4] + row * c[5]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    pub const IDENTITY: GeoTransform = GeoTransform([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    /// North-up transform without rotation terms.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self([origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height])
    }

    #[inline]
    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    /// World coordinates of the (fractional) pixel `(col, row)`.
    #[inline]
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        let c = &self.0;
        (
            c[0] + col * c[1] + row * c[2],
            c[3] + col * c[4] + row * c[5],
        )
    }

    #[inline]
    pub fn origin(&self) -> (f64, f64) {
        (self.0[0], self.0[3])
    }

    /// `(pixel_width, pixel_height)`; pixel height is negative for north-up rasters.
    #[inline]
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.0[1], self.0[5])
    }

    pub fn is_north_up(&self) -> bool {
        self.0[2] == 0.0 && self.0[4] == 0.0
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Errors raised when a raster buffer violates the shape invariants.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RasterError {
    #[error("raster dimensions must be positive (width={width}, height={height})")]
    EmptyDimensions { width: usize, height: usize },
    #[error("raster must have at least one band")]
    NoBands,
    #[error("raster buffer length mismatch (expected {expected} samples, got {got})")]
    BufferLength { expected: usize, got: usize },
    #[error("band {band} has {got} samples, expected {expected}")]
    BandLength {
        band: usize,
        expected: usize,
        got: usize,
    },
}

/// Band-major `bands × height × width` raster of `f32` samples.
///
/// The raster owns its samples, its [`GeoTransform`] and an opaque coordinate
/// reference identifier. Shape invariants are checked on construction and
/// cannot be broken afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    bands: usize,
    data: Vec<f32>,
    geo_transform: GeoTransform,
    crs: String,
}

impl Raster {
    /// Build a raster from a band-major sample buffer.
    pub fn new(
        width: usize,
        height: usize,
        bands: usize,
        data: Vec<f32>,
        geo_transform: GeoTransform,
        crs: impl Into<String>,
    ) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::EmptyDimensions { width, height });
        }
        if bands == 0 {
            return Err(RasterError::NoBands);
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(bands))
            .ok_or(RasterError::EmptyDimensions { width, height })?;
        if data.len() != expected {
            return Err(RasterError::BufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            bands,
            data,
            geo_transform,
            crs: crs.into(),
        })
    }

    /// Build a raster from one buffer per band.
    pub fn from_bands(
        width: usize,
        height: usize,
        bands: Vec<Vec<f32>>,
        geo_transform: GeoTransform,
        crs: impl Into<String>,
    ) -> Result<Self, RasterError> {
        if bands.is_empty() {
            return Err(RasterError::NoBands);
        }
        let plane = width * height;
        let mut data = Vec::with_capacity(plane * bands.len());
        for (band, samples) in bands.iter().enumerate() {
            if samples.len() != plane {
                return Err(RasterError::BandLength {
                    band,
                    expected: plane,
                    got: samples.len(),
                });
            }
            data.extend_from_slice(samples);
        }
        Self::new(width, height, bands.len(), data, geo_transform, crs)
    }

    /// Zero-filled raster with an identity transform and no CRS.
    pub fn zeros(width: usize, height: usize, bands: usize) -> Result<Self, RasterError> {
        Self::new(
            width,
            height,
            bands,
            vec![0.0; width * height * bands],
            GeoTransform::IDENTITY,
            String::new(),
        )
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn band_count(&self) -> usize {
        self.bands
    }

    #[inline]
    pub fn geo_transform(&self) -> GeoTransform {
        self.geo_transform
    }

    #[inline]
    pub fn crs(&self) -> &str {
        &self.crs
    }

    /// Replace the georeference, leaving samples untouched.
    pub fn set_georeference(&mut self, geo_transform: GeoTransform, crs: impl Into<String>) {
        self.geo_transform = geo_transform;
        self.crs = crs.into();
    }

    /// Samples of band `index` (panics when out of range).
    #[inline]
    pub fn band(&self, index: usize) -> &[f32] {
        let plane = self.width * self.height;
        &self.data[index * plane..(index + 1) * plane]
    }

    #[inline]
    pub fn band_mut(&mut self, index: usize) -> &mut [f32] {
        let plane = self.width * self.height;
        &mut self.data[index * plane..(index + 1) * plane]
    }

    pub fn band_view(&self, index: usize) -> BandView<'_> {
        BandView {
            width: self.width,
            height: self.height,
            data: self.band(index),
        }
    }

    pub fn band_views(&self) -> impl Iterator<Item = BandView<'_>> {
        (0..self.bands).map(move |b| self.band_view(b))
    }

    /// Whole band-major buffer.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// Borrowed single band of a [`Raster`].
#[derive(Clone, Copy, Debug)]
pub struct BandView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [f32],
}

impl BandView<'_> {
    #[inline]
    fn get(&self, x: i64, y: i64) -> f32 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0.0;
        }
        self.data[y as usize * self.width + x as usize]
    }

    /// Bilinear sample with pixel centres at integer coordinates.
    ///
    /// Neighbours outside the band read as 0, so locations more than one pixel
    /// outside evaluate to exactly 0.
    #[inline]
    pub fn sample_bilinear(&self, x: f64, y: f64) -> f32 {
        if !(x.is_finite() && y.is_finite()) {
            return 0.0;
        }
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = (x - x0) as f32;
        let fy = (y - y0) as f32;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = self.get(x0, y0);
        let p10 = self.get(x0 + 1, y0);
        let p01 = self.get(x0, y0 + 1);
        let p11 = self.get(x0 + 1, y0 + 1);

        let a = p00 + fx * (p10 - p00);
        let b = p01 + fx * (p11 - p01);
        a + fy * (b - a)
    }

    /// Nearest-neighbour sample; outside reads 0.
    #[inline]
    pub fn sample_nearest(&self, x: f64, y: f64) -> f32 {
        if !(x.is_finite() && y.is_finite()) {
            return 0.0;
        }
        self.get(x.round() as i64, y.round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_mismatched_buffers() {
        assert_eq!(
            Raster::zeros(0, 4, 1),
            Err(RasterError::EmptyDimensions {
                width: 0,
                height: 4
            })
        );
        assert_eq!(Raster::zeros(4, 4, 0), Err(RasterError::NoBands));
        let err = Raster::new(2, 2, 2, vec![0.0; 7], GeoTransform::IDENTITY, "").unwrap_err();
        assert_eq!(
            err,
            RasterError::BufferLength {
                expected: 8,
                got: 7
            }
        );
    }

    #[test]
    fn from_bands_checks_each_plane() {
        let err = Raster::from_bands(
            2,
            2,
            vec![vec![0.0; 4], vec![0.0; 3]],
            GeoTransform::IDENTITY,
            "EPSG:32650",
        )
        .unwrap_err();
        assert_eq!(
            err,
            RasterError::BandLength {
                band: 1,
                expected: 4,
                got: 3
            }
        );
    }

    #[test]
    fn bands_are_band_major() {
        let r = Raster::from_bands(
            2,
            1,
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            GeoTransform::north_up(500.0, 4000.0, 0.5, -0.5),
            "EPSG:32650",
        )
        .unwrap();
        assert_eq!(r.band(1), &[3.0, 4.0]);
        assert_eq!(r.crs(), "EPSG:32650");
        assert_eq!(r.geo_transform().pixel_to_world(2.0, 4.0), (501.0, 3998.0));
    }

    #[test]
    fn bilinear_interpolates_between_centres() {
        let data = [10.0, 20.0, 30.0, 40.0];
        let v = BandView {
            width: 2,
            height: 2,
            data: &data,
        };
        assert_eq!(v.sample_bilinear(0.0, 0.0), 10.0);
        assert_eq!(v.sample_bilinear(1.0, 1.0), 40.0);
        assert_eq!(v.sample_bilinear(0.5, 0.5), 25.0);
        assert_eq!(v.sample_bilinear(-5.0, 0.0), 0.0);
        assert_eq!(v.sample_bilinear(f64::NAN, 0.0), 0.0);
        assert_eq!(v.sample_nearest(0.6, 0.4), 20.0);
        assert_eq!(v.sample_nearest(2.0, 0.0), 0.0);
    }
}
