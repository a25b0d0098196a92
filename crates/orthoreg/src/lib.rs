//! Feature-based registration of georeferenced rasters.
//!
//! A source raster is aligned onto a target raster's pixel grid in six
//! sequential stages:
//! 1. both rasters are reduced to 8-bit surfaces (band mean, 2/98 percentile
//!    stretch);
//! 2. scale-invariant features are detected on each surface;
//! 3. descriptors are matched with a two-nearest-neighbour ratio test;
//! 4. a source → target homography is estimated by RANSAC;
//! 5. every source band is resampled into the target grid;
//! 6. the output adopts the target's geotransform and CRS.
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::path::Path;
//! use orthoreg::{GeoTiffStore, LogObserver, Registrar, RegistrationParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registrar = Registrar::new(RegistrationParams::default());
//! let outcome = registrar.register_paths(
//!     &GeoTiffStore,
//!     Path::new("drift.tif"),
//!     Path::new("reference.tif"),
//!     Path::new("aligned.tif"),
//!     &mut LogObserver,
//! )?;
//! println!("{} inliers", outcome.inliers);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `orthoreg::core`: rasters, geotransforms, gray images, homographies.
//! - `orthoreg::features`: keypoints, the `FeatureBackend` trait, SIFT,
//!   descriptor matching.
//! - [`normalize`], [`estimate`], [`warp`], [`georef`]: the individual
//!   stages, usable on their own.
//! - [`Registrar`]: the whole pipeline, on rasters or on paths.
//! - [`store`]: GeoTIFF persistence.
//! - [`io`]: JSON run configuration and reports.

pub use orthoreg_core as core;
pub use orthoreg_features as features;

pub mod estimate;
pub mod georef;
pub mod io;
pub mod normalize;
pub mod observer;
pub mod params;
pub mod pipeline;
pub mod store;
pub mod warp;

mod error;

pub use error::RegisterError;
pub use estimate::{estimate_transform, RansacParams, RansacResult};
pub use georef::{reconcile, reconciled_georeference, GeoReferencePolicy};
pub use io::{ConfigError, RegistrationConfig, RegistrationReport, TimingsMs};
pub use normalize::{to_grayscale, NormalizeParams};
pub use observer::{LogObserver, NoopObserver, ProgressObserver, RegistrationStage};
pub use params::RegistrationParams;
pub use pipeline::{Registrar, RegistrationOutcome};
pub use store::{GeoTiffStore, RasterIoError, RasterStore};
pub use warp::{warp_raster, Interpolation, WarpError, WarpParams};

pub use orthoreg_core::{GeoTransform, Homography, Raster, RasterError};
pub use orthoreg_features::{FeatureBackend, MatchParams, SiftBackend, SiftParams};
