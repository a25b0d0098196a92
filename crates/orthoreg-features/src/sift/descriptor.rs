use super::scale_space::FloatImage;
use crate::Descriptor;

const GRID: usize = 4;
const ORI_BINS: usize = 8;
/// Width of one spatial cell, in units of the keypoint blur.
const CELL_SCALE: f32 = 3.0;
const MAG_CLIP: f32 = 0.2;

/// Rotated 4×4×8 gradient histogram around `(xf, yf)`, trilinearly
/// interpolated and Gaussian weighted, then normalized, clipped at 0.2 and
/// normalized again.
pub(crate) fn describe(img: &FloatImage, xf: f32, yf: f32, angle: f32, sigma: f32) -> Descriptor {
    let (w, h) = (img.width() as isize, img.height() as isize);
    let data = img.as_raw();
    let at = |xx: isize, yy: isize| data[(yy * w + xx) as usize];

    let d = GRID as f32;
    let cell = CELL_SCALE * sigma;
    let diag = ((w * w + h * h) as f32).sqrt();
    let radius = (cell * std::f32::consts::SQRT_2 * (d + 1.0) * 0.5)
        .round()
        .min(diag) as isize;

    let (sin_a, cos_a) = angle.to_radians().sin_cos();
    let (cos_t, sin_t) = (cos_a / cell, sin_a / cell);
    let bins_per_deg = ORI_BINS as f32 / 360.0;
    let exp_scale = -1.0 / (d * d * 0.5);

    // Padded by one cell on each side and one extra orientation bin so the
    // interpolation never needs bounds checks.
    const ROW: usize = (GRID + 2) * (ORI_BINS + 2);
    let mut hist = [0.0f32; (GRID + 2) * ROW];

    let (px, py) = (xf.round() as isize, yf.round() as isize);
    for i in -radius..=radius {
        for j in -radius..=radius {
            let c_rot = j as f32 * cos_t - i as f32 * sin_t;
            let r_rot = j as f32 * sin_t + i as f32 * cos_t;
            let rbin = r_rot + d / 2.0 - 0.5;
            let cbin = c_rot + d / 2.0 - 0.5;
            let (r, c) = (py + i, px + j);
            if !(rbin > -1.0 && rbin < d && cbin > -1.0 && cbin < d) {
                continue;
            }
            if r <= 0 || r >= h - 1 || c <= 0 || c >= w - 1 {
                continue;
            }

            let dx = at(c + 1, r) - at(c - 1, r);
            let dy = at(c, r - 1) - at(c, r + 1);
            let ori = dy.atan2(dx).to_degrees().rem_euclid(360.0);
            let mag = (dx * dx + dy * dy).sqrt()
                * ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
            let obin = (ori - angle) * bins_per_deg;

            accumulate(&mut hist, rbin, cbin, obin, mag);
        }
    }

    let mut out = Descriptor::zeros();
    for i in 0..GRID {
        for j in 0..GRID {
            let idx = (i + 1) * ROW + (j + 1) * (ORI_BINS + 2);
            // Fold the wrap-around bins back onto the circle.
            hist[idx] += hist[idx + ORI_BINS];
            hist[idx + 1] += hist[idx + ORI_BINS + 1];
            for k in 0..ORI_BINS {
                out.0[(i * GRID + j) * ORI_BINS + k] = hist[idx + k];
            }
        }
    }
    normalize(&mut out);
    out
}

fn accumulate(hist: &mut [f32], rbin: f32, cbin: f32, obin: f32, mag: f32) {
    let r0 = rbin.floor();
    let c0 = cbin.floor();
    let o0 = obin.floor();
    let (fr, fc, fo) = (rbin - r0, cbin - c0, obin - o0);
    let r0 = r0 as isize;
    let c0 = c0 as isize;
    let o0 = (o0 as isize).rem_euclid(ORI_BINS as isize);

    let v_r1 = mag * fr;
    let v_r0 = mag - v_r1;
    let v_rc11 = v_r1 * fc;
    let v_rc10 = v_r1 - v_rc11;
    let v_rc01 = v_r0 * fc;
    let v_rc00 = v_r0 - v_rc01;
    let v_rco111 = v_rc11 * fo;
    let v_rco110 = v_rc11 - v_rco111;
    let v_rco101 = v_rc10 * fo;
    let v_rco100 = v_rc10 - v_rco101;
    let v_rco011 = v_rc01 * fo;
    let v_rco010 = v_rc01 - v_rco011;
    let v_rco001 = v_rc00 * fo;
    let v_rco000 = v_rc00 - v_rco001;

    let ob = (ORI_BINS + 2) as isize;
    let row = (GRID + 2) as isize * ob;
    let idx = ((r0 + 1) * row + (c0 + 1) * ob + o0) as usize;
    let (ob, row) = (ob as usize, row as usize);
    hist[idx] += v_rco000;
    hist[idx + 1] += v_rco001;
    hist[idx + ob] += v_rco010;
    hist[idx + ob + 1] += v_rco011;
    hist[idx + row] += v_rco100;
    hist[idx + row + 1] += v_rco101;
    hist[idx + row + ob] += v_rco110;
    hist[idx + row + ob + 1] += v_rco111;
}

fn normalize(desc: &mut Descriptor) {
    let norm = desc.0.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return;
    }
    let clip = MAG_CLIP * norm;
    for v in desc.0.iter_mut() {
        *v = v.min(clip);
    }
    let norm = desc.0.iter().map(|v| v * v).sum::<f32>().sqrt().max(f32::EPSILON);
    for v in desc.0.iter_mut() {
        *v /= norm;
    }
}
