//! Core types and utilities for feature-based raster registration.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any feature detector or on a concrete raster file format.

mod homography;
mod image;
mod raster;

pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{GrayImage, GrayImageView};
pub use raster::{BandView, GeoTransform, Raster, RasterError};
