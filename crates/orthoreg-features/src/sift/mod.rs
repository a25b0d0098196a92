//! Scale-invariant keypoints on an 8-bit surface.
//!
//! Difference-of-Gaussians extrema on a 2× upsampled seed, refined to
//! sub-pixel accuracy, filtered for low contrast and edge response, assigned
//! one or more dominant orientations and described by a rotated 4×4×8
//! gradient histogram.
//!
//! Output keypoints are in surface pixel coordinates with pixel centres at
//! integer positions.

mod descriptor;
mod extrema;
mod orientation;
mod scale_space;

use std::collections::HashSet;

use log::debug;
use orthoreg_core::GrayImageView;
use serde::{Deserialize, Serialize};

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Feature, FeatureBackend, Keypoint};
use extrema::Extremum;
use scale_space::ScaleSpace;

/// Parameters of the SIFT detector/descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftParams {
    /// Number of DoG layers searched per octave.
    pub scales_per_octave: usize,
    /// Blur of the first Gaussian level, in input pixels.
    pub sigma_min: f32,
    /// Assumed blur already present in the input.
    pub sigma_in: f32,
    /// Minimum absolute interpolated DoG contrast (intensities in `[0, 1]`).
    pub contrast_threshold: f32,
    /// Maximum ratio of principal curvatures.
    pub edge_threshold: f32,
    /// Double the input resolution before building the pyramid.
    pub upsample: bool,
    /// Samples ignored at each octave border.
    pub border: usize,
    pub max_octaves: usize,
    /// Keep only the strongest features when set.
    pub max_features: Option<usize>,
}

impl Default for SiftParams {
    fn default() -> Self {
        Self {
            scales_per_octave: 3,
            sigma_min: 0.8,
            sigma_in: 0.5,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            upsample: true,
            border: 5,
            max_octaves: 8,
            max_features: None,
        }
    }
}

/// Default [`FeatureBackend`].
#[derive(Clone, Debug, Default)]
pub struct SiftBackend {
    pub params: SiftParams,
}

impl SiftBackend {
    pub fn new(params: SiftParams) -> Self {
        Self { params }
    }
}

impl FeatureBackend for SiftBackend {
    fn name(&self) -> &str {
        "sift"
    }

    fn detect_and_describe(&self, image: &GrayImageView<'_>) -> Vec<Feature> {
        detect_sift(image, &self.params)
    }
}

/// Detect and describe features on `image`.
///
/// The result is deterministic and ordered by octave, layer and raster
/// position (or by decreasing response when `max_features` truncates).
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(image, params), fields(width = image.width, height = image.height))
)]
pub fn detect_sift(image: &GrayImageView<'_>, params: &SiftParams) -> Vec<Feature> {
    if image.width < 2 || image.height < 2 || image.data.len() < image.width * image.height {
        return Vec::new();
    }

    let space = ScaleSpace::build(image, params);
    let extrema = extrema::find_extrema(&space, params);

    #[cfg(feature = "rayon")]
    let features: Vec<Feature> = extrema
        .par_iter()
        .flat_map_iter(|e| describe_extremum(&space, e))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let features: Vec<Feature> = extrema
        .iter()
        .flat_map(|e| describe_extremum(&space, e))
        .collect();

    let mut features = dedup(features);
    if let Some(limit) = params.max_features {
        if features.len() > limit {
            features.sort_by(|a, b| b.keypoint.response.total_cmp(&a.keypoint.response));
            features.truncate(limit);
        }
    }

    debug!(
        "sift: {}x{} -> {} octaves, {} extrema, {} features",
        image.width,
        image.height,
        space.octaves.len(),
        extrema.len(),
        features.len()
    );
    features
}

fn describe_extremum(space: &ScaleSpace, e: &Extremum) -> Vec<Feature> {
    let octave = &space.octaves[e.octave];
    let gauss = &octave.gaussians[e.layer];
    let scale = (1u32 << e.octave) as f32 * space.delta_min;

    orientation::dominant_orientations(gauss, e.x, e.y, e.sigma)
        .into_iter()
        .map(|angle| Feature {
            keypoint: Keypoint {
                x: e.xf * scale,
                y: e.yf * scale,
                size: 2.0 * e.sigma * scale,
                angle,
                response: e.contrast.abs(),
                octave: e.octave as u16,
            },
            descriptor: descriptor::describe(gauss, e.xf, e.yf, angle, e.sigma),
        })
        .collect()
}

/// Plateaus can refine to the same point twice; keep the first copy.
fn dedup(features: Vec<Feature>) -> Vec<Feature> {
    let mut seen = HashSet::with_capacity(features.len());
    features
        .into_iter()
        .filter(|f| {
            let k = &f.keypoint;
            seen.insert((
                k.x.to_bits(),
                k.y.to_bits(),
                k.size.to_bits(),
                k.angle.to_bits(),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use orthoreg_core::GrayImage;

    fn blobs(width: usize, height: usize, centres: &[(f32, f32)]) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let mut v = 20.0f32;
                for &(cx, cy) in centres {
                    let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
                    v += 200.0 * (-d2 / (2.0 * 3.0 * 3.0)).exp();
                }
                img.data[y * width + x] = v.min(255.0) as u8;
            }
        }
        img
    }

    #[test]
    fn isolated_blob_is_detected_near_its_centre() {
        let img = blobs(64, 64, &[(30.0, 34.0)]);
        let features = detect_sift(&img.view(), &SiftParams::default());
        assert!(!features.is_empty());
        let best = features
            .iter()
            .max_by(|a, b| a.keypoint.response.total_cmp(&b.keypoint.response))
            .unwrap();
        assert!((best.keypoint.x - 30.0).abs() < 1.0, "{:?}", best.keypoint);
        assert!((best.keypoint.y - 34.0).abs() < 1.0, "{:?}", best.keypoint);
    }

    #[test]
    fn flat_surface_has_no_features() {
        let mut img = GrayImage::new(48, 48);
        img.data.fill(128);
        assert!(detect_sift(&img.view(), &SiftParams::default()).is_empty());
    }

    #[test]
    fn detection_is_deterministic() {
        let img = blobs(80, 60, &[(20.0, 20.0), (50.0, 30.0), (35.0, 45.0)]);
        let a = detect_sift(&img.view(), &SiftParams::default());
        let b = detect_sift(&img.view(), &SiftParams::default());
        assert_eq!(a, b);
    }

    #[test]
    fn max_features_keeps_strongest() {
        let img = blobs(80, 60, &[(20.0, 20.0), (50.0, 30.0), (35.0, 45.0)]);
        let all = detect_sift(&img.view(), &SiftParams::default());
        assert!(all.len() >= 2);
        let params = SiftParams {
            max_features: Some(1),
            ..SiftParams::default()
        };
        let top = detect_sift(&img.view(), &params);
        assert_eq!(top.len(), 1);
        let strongest = all
            .iter()
            .map(|f| f.keypoint.response)
            .fold(f32::MIN, f32::max);
        assert_eq!(top[0].keypoint.response, strongest);
    }
}
