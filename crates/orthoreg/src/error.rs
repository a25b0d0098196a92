use std::path::PathBuf;

use orthoreg_core::RasterError;

use crate::io::ConfigError;
use crate::store::RasterIoError;

/// Fatal registration failures. None of them leave an output file behind.
#[derive(thiserror::Error, Debug)]
pub enum RegisterError {
    #[error("cannot read raster {}: {source}", path.display())]
    UnreadableRaster {
        path: PathBuf,
        #[source]
        source: RasterIoError,
    },
    #[error("cannot write raster {}: {source}", path.display())]
    UnwritableRaster {
        path: PathBuf,
        #[source]
        source: RasterIoError,
    },
    #[error(
        "too few features for reliable registration: source {source_features}, target {target_features}, need {min}"
    )]
    InsufficientFeatures {
        source_features: usize,
        target_features: usize,
        min: usize,
    },
    #[error("too few matches for reliable registration: {found}, need {min}")]
    InsufficientMatches { found: usize, min: usize },
    #[error("transform is unreliable: {inliers} inliers, need {min}")]
    DegenerateTransform { inliers: usize, min: usize },
    #[error("invalid raster: {0}")]
    InvalidRaster(#[from] RasterError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
