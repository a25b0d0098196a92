//! Progress reporting for a registration run.

use crate::GeoReferencePolicy;

/// A completed pipeline stage, with the counts needed to follow a run.
#[derive(Clone, Debug, PartialEq)]
pub enum RegistrationStage {
    /// Both rasters reduced to 8-bit surfaces.
    Normalized {
        source: (usize, usize),
        target: (usize, usize),
    },
    FeaturesDetected {
        source: usize,
        target: usize,
    },
    /// Matches that survived the ratio test.
    Matched { accepted: usize },
    TransformEstimated {
        inliers: usize,
        matches: usize,
        iterations: usize,
    },
    Warped {
        width: usize,
        height: usize,
        bands: usize,
    },
    Georeferenced { policy: GeoReferencePolicy },
}

/// Receives stage events in pipeline order.
pub trait ProgressObserver {
    fn on_stage(&mut self, stage: &RegistrationStage);
}

impl<F: FnMut(&RegistrationStage)> ProgressObserver for F {
    fn on_stage(&mut self, stage: &RegistrationStage) {
        self(stage)
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_stage(&mut self, _stage: &RegistrationStage) {}
}

/// Forwards events to the `log` facade at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_stage(&mut self, stage: &RegistrationStage) {
        match stage {
            RegistrationStage::Normalized { source, target } => log::info!(
                "normalized source {}x{} and target {}x{}",
                source.0,
                source.1,
                target.0,
                target.1
            ),
            RegistrationStage::FeaturesDetected { source, target } => {
                log::info!("found {source} features in source, {target} in target")
            }
            RegistrationStage::Matched { accepted } => log::info!("{accepted} good matches"),
            RegistrationStage::TransformEstimated {
                inliers,
                matches,
                iterations,
            } => log::info!(
                "homography with {inliers} inliers out of {matches} matches ({iterations} iterations)"
            ),
            RegistrationStage::Warped {
                width,
                height,
                bands,
            } => log::info!("warped {bands} band(s) into {width}x{height}"),
            RegistrationStage::Georeferenced { policy } => {
                log::info!("georeferenced with {} policy", policy.as_str())
            }
        }
    }
}
