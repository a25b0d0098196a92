//! Scale-space extrema: discrete detection, sub-pixel refinement, and the
//! contrast / edge-response filters.

use nalgebra::{Matrix3, Vector3};

use super::scale_space::{Octave, ScaleSpace};
use super::SiftParams;

const MAX_INTERP_STEPS: usize = 5;

/// Refined extremum in octave-local coordinates.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Extremum {
    pub octave: usize,
    /// Integer Gaussian level after refinement.
    pub layer: usize,
    /// Integer sample the refinement converged to.
    pub x: usize,
    pub y: usize,
    /// Sub-pixel position in octave pixels.
    pub xf: f32,
    pub yf: f32,
    /// Blur of the extremum in octave pixels.
    pub sigma: f32,
    /// Interpolated DoG value.
    pub contrast: f32,
}

pub(crate) fn find_extrema(space: &ScaleSpace, params: &SiftParams) -> Vec<Extremum> {
    let n = params.scales_per_octave.max(1);
    let border = params.border.max(1);
    // Cheap pre-filter before interpolation, half the final threshold.
    let prefilter = 0.5 * params.contrast_threshold / n as f32;

    let mut out = Vec::new();
    for (o, octave) in space.octaves.iter().enumerate() {
        if octave.width <= 2 * border || octave.height <= 2 * border {
            continue;
        }
        for layer in 1..=n {
            for y in border..octave.height - border {
                for x in border..octave.width - border {
                    if !is_local_extremum(octave, layer, x, y, prefilter) {
                        continue;
                    }
                    if let Some(e) = refine(octave, o, layer, x, y, params) {
                        out.push(e);
                    }
                }
            }
        }
    }
    out
}

fn is_local_extremum(octave: &Octave, layer: usize, x: usize, y: usize, threshold: f32) -> bool {
    let v = octave.dog(layer, x, y);
    if v.abs() <= threshold {
        return false;
    }
    for l in layer - 1..=layer + 1 {
        for yy in y - 1..=y + 1 {
            for xx in x - 1..=x + 1 {
                if l == layer && yy == y && xx == x {
                    continue;
                }
                let n = octave.dog(l, xx, yy);
                if (v > 0.0 && n > v) || (v < 0.0 && n < v) {
                    return false;
                }
            }
        }
    }
    true
}

/// Gradient and Hessian of the DoG at an integer sample, ordered `(x, y, s)`.
fn derivatives(octave: &Octave, layer: usize, x: usize, y: usize) -> (Vector3<f32>, Matrix3<f32>) {
    let d = |l: usize, xx: usize, yy: usize| octave.dog(l, xx, yy);
    let v2 = 2.0 * d(layer, x, y);

    let gradient = Vector3::new(
        0.5 * (d(layer, x + 1, y) - d(layer, x - 1, y)),
        0.5 * (d(layer, x, y + 1) - d(layer, x, y - 1)),
        0.5 * (d(layer + 1, x, y) - d(layer - 1, x, y)),
    );

    let dxx = d(layer, x + 1, y) + d(layer, x - 1, y) - v2;
    let dyy = d(layer, x, y + 1) + d(layer, x, y - 1) - v2;
    let dss = d(layer + 1, x, y) + d(layer - 1, x, y) - v2;
    let dxy = 0.25
        * (d(layer, x + 1, y + 1) - d(layer, x - 1, y + 1) - d(layer, x + 1, y - 1)
            + d(layer, x - 1, y - 1));
    let dxs = 0.25
        * (d(layer + 1, x + 1, y) - d(layer + 1, x - 1, y) - d(layer - 1, x + 1, y)
            + d(layer - 1, x - 1, y));
    let dys = 0.25
        * (d(layer + 1, x, y + 1) - d(layer + 1, x, y - 1) - d(layer - 1, x, y + 1)
            + d(layer - 1, x, y - 1));

    let hessian = Matrix3::new(dxx, dxy, dxs, dxy, dyy, dys, dxs, dys, dss);
    (gradient, hessian)
}

/// Quadratic refinement; moves to the neighbouring sample while any offset
/// component exceeds half a pixel.
fn refine(
    octave: &Octave,
    o: usize,
    layer: usize,
    x: usize,
    y: usize,
    params: &SiftParams,
) -> Option<Extremum> {
    let n = params.scales_per_octave.max(1) as isize;
    let border = params.border.max(1) as isize;
    let (w, h) = (octave.width as isize, octave.height as isize);

    let (mut xi, mut yi, mut li) = (x as isize, y as isize, layer as isize);
    for _ in 0..MAX_INTERP_STEPS {
        let (ux, uy, ul) = (xi as usize, yi as usize, li as usize);
        let (g, hess) = derivatives(octave, ul, ux, uy);
        let offset = -(hess.try_inverse()? * g);
        if offset.iter().any(|v| !v.is_finite()) {
            return None;
        }

        if offset.iter().all(|v| v.abs() < 0.5) {
            let contrast = octave.dog(ul, ux, uy) + 0.5 * g.dot(&offset);
            if contrast.abs() * (n as f32) < params.contrast_threshold {
                return None;
            }
            if is_edge_like(&hess, params.edge_threshold) {
                return None;
            }
            let sigma = (params.sigma_min / delta_min(params))
                * 2f32.powf((li as f32 + offset.z) / n as f32);
            return Some(Extremum {
                octave: o,
                layer: ul,
                x: ux,
                y: uy,
                xf: xi as f32 + offset.x,
                yf: yi as f32 + offset.y,
                sigma,
                contrast,
            });
        }

        if offset.iter().any(|v| v.abs() > (w.max(h)) as f32) {
            return None;
        }
        xi += offset.x.round() as isize;
        yi += offset.y.round() as isize;
        li += offset.z.round() as isize;
        if li < 1 || li > n || xi < border || xi >= w - border || yi < border || yi >= h - border
        {
            return None;
        }
    }
    None
}

/// Principal-curvature ratio test on the spatial 2×2 block of the Hessian.
fn is_edge_like(hess: &Matrix3<f32>, edge_threshold: f32) -> bool {
    let (dxx, dyy, dxy) = (hess[(0, 0)], hess[(1, 1)], hess[(0, 1)]);
    let tr = dxx + dyy;
    let det = dxx * dyy - dxy * dxy;
    let r = edge_threshold;
    det <= 0.0 || tr * tr * r >= (r + 1.0) * (r + 1.0) * det
}

fn delta_min(params: &SiftParams) -> f32 {
    if params.upsample {
        0.5
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_test_rejects_ridges_and_keeps_blobs() {
        let blob = Matrix3::new(-2.0, 0.0, 0.0, 0.0, -2.0, 0.0, 0.0, 0.0, -1.0);
        let ridge = Matrix3::new(-2.0, 0.0, 0.0, 0.0, -0.01, 0.0, 0.0, 0.0, -1.0);
        let saddle = Matrix3::new(-2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, -1.0);
        assert!(!is_edge_like(&blob, 10.0));
        assert!(is_edge_like(&ridge, 10.0));
        assert!(is_edge_like(&saddle, 10.0));
    }
}
