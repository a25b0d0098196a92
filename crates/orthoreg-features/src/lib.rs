//! Local features for raster registration.
//!
//! This crate focuses on:
//! - the [`FeatureBackend`] capability that turns an 8-bit surface into
//!   `(Keypoint, Descriptor)` pairs,
//! - a difference-of-Gaussians / gradient-histogram backend ([`SiftBackend`]),
//! - nearest-neighbour matching with Lowe's ratio test ([`DescriptorMatcher`]).
//!
//! It does **not** estimate geometry; see the `orthoreg` facade for that.

mod backend;
mod keypoint;
mod matcher;
mod sift;

pub use backend::FeatureBackend;
pub use keypoint::{Descriptor, Feature, Keypoint, DESCRIPTOR_LEN};
pub use matcher::{DescriptorMatcher, Match, MatchParams};
pub use sift::{detect_sift, SiftBackend, SiftParams};
