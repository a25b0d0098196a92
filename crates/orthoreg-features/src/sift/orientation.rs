use super::scale_space::FloatImage;

const ORI_BINS: usize = 36;
const ORI_SIGMA_FACTOR: f32 = 1.5;
const ORI_RADIUS_FACTOR: f32 = 3.0 * ORI_SIGMA_FACTOR;
const ORI_PEAK_RATIO: f32 = 0.8;

/// Dominant gradient orientations (degrees, `[0, 360)`) around an integer
/// sample of a Gaussian level. One keypoint is emitted per returned angle.
pub(crate) fn dominant_orientations(img: &FloatImage, x: usize, y: usize, sigma: f32) -> Vec<f32> {
    let hist = smooth(&orientation_histogram(img, x, y, sigma));

    let max = hist.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let threshold = ORI_PEAK_RATIO * max;

    let mut angles = Vec::new();
    for j in 0..ORI_BINS {
        let l = hist[(j + ORI_BINS - 1) % ORI_BINS];
        let r = hist[(j + 1) % ORI_BINS];
        let c = hist[j];
        if c > l && c > r && c >= threshold {
            let mut bin = j as f32 + 0.5 * (l - r) / (l - 2.0 * c + r);
            if bin < 0.0 {
                bin += ORI_BINS as f32;
            } else if bin >= ORI_BINS as f32 {
                bin -= ORI_BINS as f32;
            }
            let mut angle = bin * (360.0 / ORI_BINS as f32);
            if angle >= 360.0 - f32::EPSILON {
                angle = 0.0;
            }
            angles.push(angle);
        }
    }
    angles
}

fn orientation_histogram(img: &FloatImage, x: usize, y: usize, sigma: f32) -> [f32; ORI_BINS] {
    let (w, h) = (img.width() as isize, img.height() as isize);
    let data = img.as_raw();
    let at = |xx: isize, yy: isize| data[(yy * w + xx) as usize];

    let radius = (ORI_RADIUS_FACTOR * sigma).round() as isize;
    let weight_sigma = ORI_SIGMA_FACTOR * sigma;
    let exp_scale = -1.0 / (2.0 * weight_sigma * weight_sigma);

    let mut hist = [0.0f32; ORI_BINS];
    for i in -radius..=radius {
        let yy = y as isize + i;
        if yy <= 0 || yy >= h - 1 {
            continue;
        }
        for j in -radius..=radius {
            let xx = x as isize + j;
            if xx <= 0 || xx >= w - 1 {
                continue;
            }
            let dx = at(xx + 1, yy) - at(xx - 1, yy);
            // Rows grow downwards; flip so angles are counter-clockwise.
            let dy = at(xx, yy - 1) - at(xx, yy + 1);
            let weight = (((i * i + j * j) as f32) * exp_scale).exp();
            let mag = (dx * dx + dy * dy).sqrt();
            let ori = dy.atan2(dx).to_degrees();

            let mut bin = (ori * ORI_BINS as f32 / 360.0).round() as isize;
            bin = bin.rem_euclid(ORI_BINS as isize);
            hist[bin as usize] += weight * mag;
        }
    }
    hist
}

/// Circular `[1, 4, 6, 4, 1] / 16` smoothing.
fn smooth(hist: &[f32; ORI_BINS]) -> [f32; ORI_BINS] {
    let at = |k: isize| hist[k.rem_euclid(ORI_BINS as isize) as usize];
    let mut out = [0.0f32; ORI_BINS];
    for (i, slot) in out.iter_mut().enumerate() {
        let i = i as isize;
        *slot = (at(i - 2) + at(i + 2)) * (1.0 / 16.0)
            + (at(i - 1) + at(i + 1)) * (4.0 / 16.0)
            + at(i) * (6.0 / 16.0);
    }
    out
}
