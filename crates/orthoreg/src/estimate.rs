//! Robust homography estimation from putative matches.

use nalgebra::Point2;
use orthoreg_core::{estimate_homography, homography_from_4pt, Homography};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::RegisterError;

const SAMPLE_SIZE: usize = 4;

/// Consensus-sampling parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Maximum reprojection error (target pixels) for an inlier.
    pub threshold: f64,
    /// Upper bound on sampling iterations.
    pub max_iterations: usize,
    /// Desired probability of having drawn one all-inlier sample.
    pub confidence: f64,
    /// Fewer inliers than this abort registration.
    pub min_inliers: usize,
    /// Redraws allowed per iteration when a sample is degenerate.
    pub max_degenerate_attempts: usize,
    pub seed: u64,
    /// Refit on all inliers after sampling.
    pub refine: bool,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            max_iterations: 2000,
            confidence: 0.995,
            min_inliers: 4,
            max_degenerate_attempts: 100,
            seed: 0x5eed,
            refine: true,
        }
    }
}

/// Selected model and its consensus set.
#[derive(Clone, Debug)]
pub struct RansacResult {
    pub homography: Homography,
    /// Indices into the input correspondences, ascending.
    pub inliers: Vec<usize>,
    /// Sampling iterations spent (including degenerate ones).
    pub iterations: usize,
    /// Inlier count of every non-degenerate sampled candidate, in draw order.
    pub candidate_inliers: Vec<usize>,
    /// The final model came from the least-squares refit.
    pub refined: bool,
}

impl RansacResult {
    #[inline]
    pub fn inlier_count(&self) -> usize {
        self.inliers.len()
    }
}

/// RANSAC over 4-point samples mapping `src[i]` to `dst[i]`.
///
/// Samples with three collinear points (in either image) or a singular
/// system are redrawn. The iteration budget shrinks as the best inlier
/// ratio grows. The winning model is refit on its inliers and the refit is
/// kept when it does not lose support.
///
/// Fails with [`RegisterError::DegenerateTransform`] when no valid sample
/// exists or the best model has fewer than `min_inliers` inliers.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(correspondences = src.len()))
)]
pub fn estimate_transform(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    params: &RansacParams,
) -> Result<RansacResult, RegisterError> {
    let min = params.min_inliers.max(SAMPLE_SIZE);
    let n = src.len().min(dst.len());
    if n < SAMPLE_SIZE {
        return Err(RegisterError::DegenerateTransform { inliers: 0, min });
    }
    let (src, dst) = (&src[..n], &dst[..n]);

    let mut rng = StdRng::seed_from_u64(params.seed);
    let index = Uniform::new(0, n);
    let mut budget = params.max_iterations.max(1);
    let mut iterations = 0;
    let mut candidate_inliers = Vec::new();
    let mut best: Option<(Homography, Vec<usize>)> = None;

    while iterations < budget {
        iterations += 1;
        let Some(model) = draw_model(&mut rng, &index, src, dst, params.max_degenerate_attempts)
        else {
            continue;
        };

        let inliers = collect_inliers(&model, src, dst, params.threshold);
        candidate_inliers.push(inliers.len());
        if best.as_ref().map_or(true, |(_, b)| inliers.len() > b.len()) {
            let ratio = inliers.len() as f64 / n as f64;
            budget = budget.min(required_iterations(ratio, params.confidence).max(iterations));
            best = Some((model, inliers));
        }
    }

    let Some((mut homography, mut inliers)) = best else {
        log::debug!("ransac: no non-degenerate sample in {iterations} iterations");
        return Err(RegisterError::DegenerateTransform { inliers: 0, min });
    };

    let mut refined = false;
    if params.refine && inliers.len() > SAMPLE_SIZE {
        let s: Vec<_> = inliers.iter().map(|&i| src[i]).collect();
        let d: Vec<_> = inliers.iter().map(|&i| dst[i]).collect();
        if let Some(refit) = estimate_homography(&s, &d) {
            let refit_inliers = collect_inliers(&refit, src, dst, params.threshold);
            if refit_inliers.len() >= inliers.len() {
                homography = refit;
                inliers = refit_inliers;
                refined = true;
            }
        }
    }

    log::debug!(
        "ransac: {} / {n} inliers after {iterations} iterations (refined: {refined})",
        inliers.len()
    );

    if inliers.len() < min {
        return Err(RegisterError::DegenerateTransform {
            inliers: inliers.len(),
            min,
        });
    }

    Ok(RansacResult {
        homography,
        inliers,
        iterations,
        candidate_inliers,
        refined,
    })
}

/// Draw distinct indices until a non-degenerate 4-point model is found.
fn draw_model(
    rng: &mut StdRng,
    index: &Uniform<usize>,
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    max_attempts: usize,
) -> Option<Homography> {
    for _ in 0..max_attempts.max(1) {
        let mut sample = [0usize; SAMPLE_SIZE];
        for i in 0..SAMPLE_SIZE {
            loop {
                let candidate = index.sample(rng);
                if sample[..i].iter().all(|&v| v != candidate) {
                    sample[i] = candidate;
                    break;
                }
            }
        }
        let s = sample.map(|i| src[i]);
        let d = sample.map(|i| dst[i]);
        if let Some(h) = homography_from_4pt(&s, &d) {
            return Some(h);
        }
    }
    None
}

fn collect_inliers(
    h: &Homography,
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    threshold: f64,
) -> Vec<usize> {
    src.iter()
        .zip(dst)
        .enumerate()
        .filter(|(_, (s, d))| h.transfer_error(**s, **d) <= threshold)
        .map(|(i, _)| i)
        .collect()
}

/// `log(1 - confidence) / log(1 - w^4)`, saturating to `usize::MAX` when no
/// bound applies.
fn required_iterations(inlier_ratio: f64, confidence: f64) -> usize {
    let p_good = inlier_ratio.clamp(0.0, 1.0).powi(SAMPLE_SIZE as i32);
    if p_good >= 1.0 {
        return 1;
    }
    let log_conf = (1.0 - confidence.clamp(0.0, 1.0)).ln();
    let log_bad = (1.0 - p_good).ln();
    if !log_conf.is_finite() || !log_bad.is_finite() || log_bad >= 0.0 {
        return usize::MAX;
    }
    (log_conf / log_bad).ceil().max(1.0) as usize
}
