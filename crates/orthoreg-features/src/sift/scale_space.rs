//! Gaussian and difference-of-Gaussians pyramids.

use image::{ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use orthoreg_core::GrayImageView;

use super::SiftParams;

pub(crate) type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// One octave: `n + 3` Gaussian levels and `n + 2` DoG levels, all at the
/// same resolution.
pub(crate) struct Octave {
    pub width: usize,
    pub height: usize,
    pub gaussians: Vec<FloatImage>,
    pub dogs: Vec<Vec<f32>>,
}

impl Octave {
    #[inline]
    pub fn dog(&self, layer: usize, x: usize, y: usize) -> f32 {
        self.dogs[layer][y * self.width + x]
    }
}

pub(crate) struct ScaleSpace {
    pub octaves: Vec<Octave>,
    /// Sampling distance of the first octave in input pixels (0.5 when upsampled).
    pub delta_min: f32,
}

impl ScaleSpace {
    pub fn build(image: &GrayImageView<'_>, params: &SiftParams) -> Self {
        let n = params.scales_per_octave.max(1);
        let delta_min = if params.upsample { 0.5 } else { 1.0 };

        let seed = seed_image(image, params.upsample);
        let seed_sigma =
            (params.sigma_min.powi(2) - params.sigma_in.powi(2)).max(1e-4).sqrt() / delta_min;
        let first = gaussian_blur_f32(&seed, seed_sigma);

        let min_axis = first.width().min(first.height()) as f32;
        let n_octaves = ((min_axis.log2() - 2.0).round().max(0.0) as usize + 1)
            .min(params.max_octaves.max(1));

        // Incremental blur that takes level s-1 to level s, in octave pixels.
        let k2 = 2f32.powf(2.0 / n as f32);
        let increments: Vec<f32> = (1..n + 3)
            .map(|s| {
                let prev = k2.powi(s as i32 - 1);
                (params.sigma_min / delta_min) * (prev * k2 - prev).sqrt()
            })
            .collect();

        // Level n of each octave has twice the base blur, so it seeds the next one.
        let mut octaves = Vec::with_capacity(n_octaves);
        let mut base = first;
        loop {
            let octave = build_octave(base, &increments);
            let next = decimate(&octave.gaussians[n]);
            octaves.push(octave);
            if octaves.len() == n_octaves || next.width() == 0 || next.height() == 0 {
                break;
            }
            base = next;
        }

        Self { octaves, delta_min }
    }
}

fn build_octave(base: FloatImage, increments: &[f32]) -> Octave {
    let width = base.width() as usize;
    let height = base.height() as usize;

    let mut gaussians = Vec::with_capacity(increments.len() + 1);
    gaussians.push(base);
    for &sigma in increments {
        let next = gaussian_blur_f32(&gaussians[gaussians.len() - 1], sigma);
        gaussians.push(next);
    }

    let dogs = gaussians
        .windows(2)
        .map(|pair| {
            pair[1]
                .as_raw()
                .iter()
                .zip(pair[0].as_raw().iter())
                .map(|(b, a)| b - a)
                .collect()
        })
        .collect();

    Octave {
        width,
        height,
        gaussians,
        dogs,
    }
}

/// Intensities in `[0, 1]`, optionally upsampled 2× so that seed pixel `u`
/// sits on input coordinate `u / 2`.
fn seed_image(image: &GrayImageView<'_>, upsample: bool) -> FloatImage {
    let w = image.width;
    let h = image.height;
    let at = |x: usize, y: usize| image.get(x, y) as f32 / 255.0;

    if !upsample {
        return FloatImage::from_fn(w as u32, h as u32, |x, y| {
            Luma([at(x as usize, y as usize)])
        });
    }

    FloatImage::from_fn((2 * w) as u32, (2 * h) as u32, |u, v| {
        let x0 = u as usize / 2;
        let y0 = v as usize / 2;
        let x1 = (x0 + (u as usize & 1)).min(w - 1);
        let y1 = (y0 + (v as usize & 1)).min(h - 1);
        let value = 0.25 * (at(x0, y0) + at(x1, y0) + at(x0, y1) + at(x1, y1));
        Luma([value])
    })
}

fn decimate(src: &FloatImage) -> FloatImage {
    FloatImage::from_fn(src.width() / 2, src.height() / 2, |x, y| {
        *src.get_pixel(2 * x, 2 * y)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orthoreg_core::GrayImage;

    #[test]
    fn upsampled_seed_interpolates_between_samples() {
        let img = GrayImage {
            width: 2,
            height: 1,
            data: vec![0, 255],
        };
        let seed = seed_image(&img.view(), true);
        assert_eq!(seed.dimensions(), (4, 2));
        assert_eq!(seed.get_pixel(0, 0)[0], 0.0);
        assert!((seed.get_pixel(1, 0)[0] - 0.5).abs() < 1e-6);
        assert_eq!(seed.get_pixel(2, 1)[0], 1.0);
    }

    #[test]
    fn octaves_halve_resolution() {
        let img = GrayImage::new(64, 48);
        let space = ScaleSpace::build(&img.view(), &SiftParams::default());
        assert_eq!(space.octaves[0].width, 128);
        assert_eq!(space.octaves[0].height, 96);
        assert_eq!(space.octaves[1].width, 64);
        let n = SiftParams::default().scales_per_octave;
        for octave in &space.octaves {
            assert_eq!(octave.gaussians.len(), n + 3);
            assert_eq!(octave.dogs.len(), n + 2);
        }
    }
}
