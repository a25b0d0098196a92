use orthoreg_core::GrayImage;
use orthoreg_features::{DescriptorMatcher, FeatureBackend, SiftBackend};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Smooth random texture sampled in canvas coordinates.
struct Texture {
    cell: f32,
    cols: usize,
    lattice: Vec<f32>,
}

impl Texture {
    fn new(size: usize, cell: f32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let cols = (size as f32 / cell) as usize + 3;
        let lattice = (0..cols * cols).map(|_| rng.gen_range(0.0..1.0)).collect();
        Self {
            cell,
            cols,
            lattice,
        }
    }

    fn at(&self, x: f32, y: f32) -> f32 {
        let (gx, gy) = (x / self.cell, y / self.cell);
        let (ix, iy) = (gx.floor() as usize, gy.floor() as usize);
        let smooth = |t: f32| t * t * (3.0 - 2.0 * t);
        let (fx, fy) = (smooth(gx - ix as f32), smooth(gy - iy as f32));
        let l = |i: usize, j: usize| self.lattice[j * self.cols + i];
        let top = l(ix, iy) * (1.0 - fx) + l(ix + 1, iy) * fx;
        let bottom = l(ix, iy + 1) * (1.0 - fx) + l(ix + 1, iy + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    fn crop(&self, ox: usize, oy: usize, width: usize, height: usize) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let v = self.at((x + ox) as f32, (y + oy) as f32);
                img.data[y * width + x] = (v * 255.0).round() as u8;
            }
        }
        img
    }
}

#[test]
fn shifted_crops_match_by_translation() {
    let texture = Texture::new(200, 6.0, 42);
    let source = texture.crop(10, 10, 120, 100);
    let target = texture.crop(5, 7, 120, 100);

    let backend = SiftBackend::default();
    let src_features = backend.detect_and_describe(&source.view());
    let tgt_features = backend.detect_and_describe(&target.view());
    assert!(src_features.len() >= 20, "source features {}", src_features.len());
    assert!(tgt_features.len() >= 20, "target features {}", tgt_features.len());

    let matches = DescriptorMatcher::default().match_features(&src_features, &tgt_features);
    let consistent = matches
        .iter()
        .filter(|m| {
            let s = src_features[m.source].keypoint;
            let t = tgt_features[m.target].keypoint;
            (t.x - s.x - 5.0).abs() < 1.0 && (t.y - s.y - 3.0).abs() < 1.0
        })
        .count();

    assert!(consistent >= 15, "consistent {consistent} of {}", matches.len());
    assert!(
        consistent as f32 >= 0.8 * matches.len() as f32,
        "consistent {consistent} of {}",
        matches.len()
    );
}

#[test]
fn backend_reports_its_name() {
    assert_eq!(SiftBackend::default().name(), "sift");
}
