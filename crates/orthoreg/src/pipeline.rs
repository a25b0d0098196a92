//! The registration pipeline: normalize, detect, match, estimate, warp,
//! georeference.

use std::path::Path;
use std::time::Instant;

use nalgebra::Point2;
use orthoreg_core::{Homography, Raster};
use orthoreg_features::{DescriptorMatcher, Feature, FeatureBackend, Match, SiftBackend};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::estimate::estimate_transform;
use crate::georef::reconcile;
use crate::io::TimingsMs;
use crate::normalize::to_grayscale;
use crate::observer::{ProgressObserver, RegistrationStage};
use crate::params::RegistrationParams;
use crate::store::RasterStore;
use crate::warp::{warp_raster, WarpError};
use crate::RegisterError;

/// Result of a successful registration.
#[derive(Clone, Debug)]
pub struct RegistrationOutcome {
    /// Source resampled into the target's pixel grid, georeferenced.
    pub raster: Raster,
    /// Source pixel → target pixel.
    pub homography: Homography,
    pub source_features: usize,
    pub target_features: usize,
    /// Matches accepted by the ratio test.
    pub matches: usize,
    pub inliers: usize,
    pub iterations: usize,
}

/// Registers a source raster onto a target raster's pixel grid.
#[derive(Clone, Debug)]
pub struct Registrar<B = SiftBackend> {
    backend: B,
    params: RegistrationParams,
}

impl Registrar<SiftBackend> {
    /// SIFT-backed registrar configured from `params.sift`.
    pub fn new(params: RegistrationParams) -> Self {
        let backend = SiftBackend::new(params.sift.clone());
        Self { backend, params }
    }
}

impl Default for Registrar<SiftBackend> {
    fn default() -> Self {
        Self::new(RegistrationParams::default())
    }
}

impl<B: FeatureBackend> Registrar<B> {
    /// Registrar using a custom feature backend; `params.sift` is ignored.
    pub fn with_backend(backend: B, params: RegistrationParams) -> Self {
        Self { backend, params }
    }

    pub fn params(&self) -> &RegistrationParams {
        &self.params
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run every stage on in-memory rasters.
    ///
    /// Stages report to `observer` in order as they complete. The first
    /// failing stage aborts the run.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip_all,
            fields(backend = self.backend.name(), source_bands = source.band_count())
        )
    )]
    pub fn register_rasters(
        &self,
        source: &Raster,
        target: &Raster,
        observer: &mut dyn ProgressObserver,
    ) -> Result<RegistrationOutcome, RegisterError> {
        let params = &self.params;
        params.validate()?;

        let source_gray = to_grayscale(source, &params.normalize);
        let target_gray = to_grayscale(target, &params.normalize);
        observer.on_stage(&RegistrationStage::Normalized {
            source: (source_gray.width, source_gray.height),
            target: (target_gray.width, target_gray.height),
        });

        let source_features = self.backend.detect_and_describe(&source_gray.view());
        let target_features = self.backend.detect_and_describe(&target_gray.view());
        observer.on_stage(&RegistrationStage::FeaturesDetected {
            source: source_features.len(),
            target: target_features.len(),
        });
        if source_features.len() < params.min_features
            || target_features.len() < params.min_features
        {
            return Err(RegisterError::InsufficientFeatures {
                source_features: source_features.len(),
                target_features: target_features.len(),
                min: params.min_features,
            });
        }

        let matcher = DescriptorMatcher::from_params(&params.matching);
        let matches = matcher.match_features(&source_features, &target_features);
        observer.on_stage(&RegistrationStage::Matched {
            accepted: matches.len(),
        });
        if matches.len() < params.matching.min_matches {
            return Err(RegisterError::InsufficientMatches {
                found: matches.len(),
                min: params.matching.min_matches,
            });
        }

        let (src_pts, dst_pts) = correspondences(&matches, &source_features, &target_features);
        let ransac = estimate_transform(&src_pts, &dst_pts, &params.ransac)?;
        observer.on_stage(&RegistrationStage::TransformEstimated {
            inliers: ransac.inlier_count(),
            matches: matches.len(),
            iterations: ransac.iterations,
        });

        let mut raster = warp_raster(
            source,
            &ransac.homography,
            target.width(),
            target.height(),
            &params.warp,
        )
        .map_err(|err| match err {
            WarpError::NotInvertible => RegisterError::DegenerateTransform {
                inliers: ransac.inlier_count(),
                min: params.ransac.min_inliers,
            },
            WarpError::Raster(e) => RegisterError::InvalidRaster(e),
        })?;
        observer.on_stage(&RegistrationStage::Warped {
            width: raster.width(),
            height: raster.height(),
            bands: raster.band_count(),
        });

        reconcile(
            &mut raster,
            source,
            target,
            &ransac.homography,
            params.geo_policy,
        );
        observer.on_stage(&RegistrationStage::Georeferenced {
            policy: params.geo_policy,
        });

        Ok(RegistrationOutcome {
            raster,
            homography: ransac.homography,
            source_features: source_features.len(),
            target_features: target_features.len(),
            matches: matches.len(),
            inliers: ransac.inlier_count(),
            iterations: ransac.iterations,
        })
    }

    /// Read both rasters through `store`, register, and write the output.
    ///
    /// Nothing is written unless every stage succeeds.
    pub fn register_paths<S: RasterStore>(
        &self,
        store: &S,
        source_path: &Path,
        target_path: &Path,
        output_path: &Path,
        observer: &mut dyn ProgressObserver,
    ) -> Result<RegistrationOutcome, RegisterError> {
        self.register_paths_timed(
            store,
            source_path,
            target_path,
            output_path,
            observer,
            &mut TimingsMs::default(),
        )
    }

    /// [`Registrar::register_paths`] that records the wall time of the read,
    /// register and write phases in `timings` as each one completes.
    /// `timings.total` is left to the caller.
    pub fn register_paths_timed<S: RasterStore>(
        &self,
        store: &S,
        source_path: &Path,
        target_path: &Path,
        output_path: &Path,
        observer: &mut dyn ProgressObserver,
        timings: &mut TimingsMs,
    ) -> Result<RegistrationOutcome, RegisterError> {
        let started = Instant::now();
        let source = read(store, source_path)?;
        let target = read(store, target_path)?;
        timings.read = elapsed_ms(started);

        let started = Instant::now();
        let outcome = self.register_rasters(&source, &target, observer)?;
        timings.register = elapsed_ms(started);

        let started = Instant::now();
        store
            .write_raster(output_path, &outcome.raster)
            .map_err(|source| RegisterError::UnwritableRaster {
                path: output_path.to_path_buf(),
                source,
            })?;
        timings.write = elapsed_ms(started);
        Ok(outcome)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn read<S: RasterStore>(store: &S, path: &Path) -> Result<Raster, RegisterError> {
    store
        .read_raster(path)
        .map_err(|source| RegisterError::UnreadableRaster {
            path: path.to_path_buf(),
            source,
        })
}

fn correspondences(
    matches: &[Match],
    source: &[Feature],
    target: &[Feature],
) -> (Vec<Point2<f64>>, Vec<Point2<f64>>) {
    let point = |f: &Feature| Point2::new(f.keypoint.x as f64, f.keypoint.y as f64);
    matches
        .iter()
        .map(|m| (point(&source[m.source]), point(&target[m.target])))
        .unzip()
}
