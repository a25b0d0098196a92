//! Tunable parameters of a registration run.

use orthoreg_features::{MatchParams, SiftParams};
use serde::{Deserialize, Serialize};

use crate::estimate::RansacParams;
use crate::io::ConfigError;
use crate::normalize::NormalizeParams;
use crate::warp::WarpParams;
use crate::GeoReferencePolicy;

/// Parameters for every pipeline stage.
///
/// Defaults reproduce the reference thresholds: 2/98 percentile stretch,
/// ratio 0.75, at least 10 features and 10 matches, 5 px RANSAC tolerance,
/// at least 4 inliers, bilinear warp, target georeference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationParams {
    pub normalize: NormalizeParams,
    pub sift: SiftParams,
    pub matching: MatchParams,
    /// Each image needs at least this many features.
    pub min_features: usize,
    pub ransac: RansacParams,
    pub warp: WarpParams,
    pub geo_policy: GeoReferencePolicy,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        Self {
            normalize: NormalizeParams::default(),
            sift: SiftParams::default(),
            matching: MatchParams::default(),
            min_features: 10,
            ransac: RansacParams::default(),
            warp: WarpParams::default(),
            geo_policy: GeoReferencePolicy::default(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl RegistrationParams {
    /// Reject values that would make a stage meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = &self.normalize;
        if !(0.0..=100.0).contains(&n.low_percentile)
            || !(0.0..=100.0).contains(&n.high_percentile)
            || n.low_percentile >= n.high_percentile
        {
            return Err(invalid(
                "normalize",
                format!(
                    "need 0 <= low < high <= 100, got {} / {}",
                    n.low_percentile, n.high_percentile
                ),
            ));
        }

        let s = &self.sift;
        if s.scales_per_octave == 0 {
            return Err(invalid("sift.scales_per_octave", "must be at least 1"));
        }
        if !(s.sigma_min > 0.0) || !(s.sigma_in >= 0.0) {
            return Err(invalid("sift.sigma_min", "blur levels must be positive"));
        }
        if s.max_octaves == 0 {
            return Err(invalid("sift.max_octaves", "must be at least 1"));
        }

        if !(self.matching.ratio > 0.0) {
            return Err(invalid(
                "matching.ratio",
                format!("must be positive, got {}", self.matching.ratio),
            ));
        }

        let r = &self.ransac;
        if !(r.threshold > 0.0) {
            return Err(invalid(
                "ransac.threshold",
                format!("must be positive, got {}", r.threshold),
            ));
        }
        if !(r.confidence > 0.0 && r.confidence < 1.0) {
            return Err(invalid(
                "ransac.confidence",
                format!("must lie in (0, 1), got {}", r.confidence),
            ));
        }
        if r.max_iterations == 0 {
            return Err(invalid("ransac.max_iterations", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_match_reference_thresholds() {
        let p = RegistrationParams::default();
        p.validate().unwrap();
        assert_eq!(p.normalize.low_percentile, 2.0);
        assert_eq!(p.normalize.high_percentile, 98.0);
        assert_eq!(p.matching.ratio, 0.75);
        assert_eq!(p.matching.min_matches, 10);
        assert_eq!(p.min_features, 10);
        assert_eq!(p.ransac.threshold, 5.0);
        assert_eq!(p.ransac.min_inliers, 4);
        assert_eq!(p.geo_policy, GeoReferencePolicy::Target);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let p: RegistrationParams =
            serde_json::from_str(r#"{ "matching": { "ratio": 0.6 }, "geo_policy": "source-translated" }"#)
                .unwrap();
        assert_eq!(p.matching.ratio, 0.6);
        assert_eq!(p.matching.min_matches, 10);
        assert_eq!(p.geo_policy, GeoReferencePolicy::SourceTranslated);
        assert_eq!(p.ransac, RansacParams::default());
    }

    #[test]
    fn inverted_percentiles_are_rejected() {
        let mut p = RegistrationParams::default();
        p.normalize.low_percentile = 90.0;
        p.normalize.high_percentile = 10.0;
        assert!(matches!(
            p.validate(),
            Err(ConfigError::Invalid { field: "normalize", .. })
        ));
    }

    #[test]
    fn ransac_confidence_must_be_a_probability() {
        let mut p = RegistrationParams::default();
        p.ransac.confidence = 1.0;
        assert!(matches!(
            p.validate(),
            Err(ConfigError::Invalid {
                field: "ransac.confidence",
                ..
            })
        ));
    }
}
