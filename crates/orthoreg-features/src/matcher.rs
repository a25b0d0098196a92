//! Nearest-neighbour descriptor matching with Lowe's ratio test.

use serde::{Deserialize, Serialize};

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::Feature;

/// Putative correspondence between a source and a target feature.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Match {
    /// Index into the source feature list.
    pub source: usize,
    /// Index into the target feature list.
    pub target: usize,
    /// Euclidean descriptor distance to the nearest target.
    pub distance: f32,
}

/// Matching thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    /// A match is kept when `best < ratio * second_best`.
    pub ratio: f32,
    /// Fewer accepted matches than this abort registration.
    pub min_matches: usize,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            ratio: 0.75,
            min_matches: 10,
        }
    }
}

/// Exhaustive two-nearest-neighbour matcher.
///
/// Implementation note: this is a brute-force scan over all target
/// descriptors. It is exact, and ties resolve to the lower target index.
#[derive(Clone, Debug)]
pub struct DescriptorMatcher {
    ratio: f32,
}

impl DescriptorMatcher {
    pub fn new(ratio: f32) -> Self {
        Self { ratio }
    }

    pub fn from_params(params: &MatchParams) -> Self {
        Self::new(params.ratio)
    }

    #[inline]
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Accepted matches, in source order.
    ///
    /// A source feature is dropped when fewer than two target features
    /// exist or when its nearest neighbour is not clearly closer than the
    /// second nearest.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(source = source.len(), target = target.len()))
    )]
    pub fn match_features(&self, source: &[Feature], target: &[Feature]) -> Vec<Match> {
        if target.len() < 2 {
            return Vec::new();
        }

        #[cfg(feature = "rayon")]
        let matches: Vec<Match> = source
            .par_iter()
            .enumerate()
            .filter_map(|(i, f)| self.match_one(i, f, target))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let matches: Vec<Match> = source
            .iter()
            .enumerate()
            .filter_map(|(i, f)| self.match_one(i, f, target))
            .collect();

        log::debug!(
            "matcher: {} source x {} target -> {} accepted (ratio {})",
            source.len(),
            target.len(),
            matches.len(),
            self.ratio
        );
        matches
    }

    fn match_one(&self, index: usize, feature: &Feature, target: &[Feature]) -> Option<Match> {
        let (best, best_d2, second_d2) = two_nearest(feature, target)?;
        let (best_d, second_d) = (best_d2.sqrt(), second_d2.sqrt());
        if best_d < self.ratio * second_d {
            Some(Match {
                source: index,
                target: best,
                distance: best_d,
            })
        } else {
            None
        }
    }
}

impl Default for DescriptorMatcher {
    fn default() -> Self {
        Self::from_params(&MatchParams::default())
    }
}

/// `(best index, best squared distance, second-best squared distance)`.
fn two_nearest(feature: &Feature, target: &[Feature]) -> Option<(usize, f32, f32)> {
    let mut best: Option<(usize, f32)> = None;
    let mut second = f32::INFINITY;
    for (j, t) in target.iter().enumerate() {
        let d2 = feature.descriptor.distance_squared(&t.descriptor);
        match best {
            Some((_, b)) if d2 < b => {
                second = b;
                best = Some((j, d2));
            }
            Some(_) => {
                if d2 < second {
                    second = d2;
                }
            }
            None => best = Some((j, d2)),
        }
    }
    let (j, b) = best?;
    second.is_finite().then_some((j, b, second))
}
