#![allow(dead_code)]

use orthoreg::core::GrayImageView;
use orthoreg::features::{Descriptor, Feature, FeatureBackend, Keypoint};
use orthoreg::{GeoTransform, Raster};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Smooth random texture sampled in canvas coordinates.
pub struct Texture {
    cell: f32,
    cols: usize,
    lattice: Vec<f32>,
}

impl Texture {
    pub fn new(size: usize, cell: f32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let cols = (size as f32 / cell) as usize + 3;
        let lattice = (0..cols * cols).map(|_| rng.gen_range(0.0..1.0)).collect();
        Self {
            cell,
            cols,
            lattice,
        }
    }

    pub fn at(&self, x: f32, y: f32) -> f32 {
        let (gx, gy) = (x / self.cell, y / self.cell);
        let (ix, iy) = (gx.floor() as usize, gy.floor() as usize);
        let smooth = |t: f32| t * t * (3.0 - 2.0 * t);
        let (fx, fy) = (smooth(gx - ix as f32), smooth(gy - iy as f32));
        let l = |i: usize, j: usize| self.lattice[j * self.cols + i];
        let top = l(ix, iy) * (1.0 - fx) + l(ix + 1, iy) * fx;
        let bottom = l(ix, iy + 1) * (1.0 - fx) + l(ix + 1, iy + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// `bands`-band raster whose band `b` is `scale * (b + 1) * texture`.
    pub fn crop(
        &self,
        ox: usize,
        oy: usize,
        width: usize,
        height: usize,
        bands: usize,
        scale: f32,
    ) -> Raster {
        let planes = (0..bands)
            .map(|b| {
                let gain = scale * (b + 1) as f32;
                (0..width * height)
                    .map(|i| gain * self.at((i % width + ox) as f32, (i / width + oy) as f32))
                    .collect()
            })
            .collect();
        Raster::from_bands(width, height, planes, GeoTransform::IDENTITY, "").unwrap()
    }
}

/// Source crop at (10, 10) and target crop at (5, 7) of the same 8-bit range
/// texture: source pixel `p` shows what target pixel `p + (5, 3)` shows.
pub fn shifted_pair(width: usize, height: usize, bands: usize) -> (Raster, Raster) {
    let texture = Texture::new(200, 6.0, 42);
    let mut source = texture.crop(10, 10, width, height, bands, 255.0);
    let mut target = texture.crop(5, 7, width, height, bands, 255.0);
    source.set_georeference(GeoTransform::north_up(1000.0, 2000.0, 0.5, -0.5), "EPSG:32633");
    target.set_georeference(
        GeoTransform::north_up(500_000.0, 4_100_000.0, 0.5, -0.5),
        "EPSG:32650",
    );
    (source, target)
}

fn unit_descriptor(axis: usize) -> Descriptor {
    let mut d = Descriptor::zeros();
    d.0[axis] = 1.0;
    d
}

fn feature(x: f32, y: f32, axis: usize) -> Feature {
    Feature {
        keypoint: Keypoint {
            x,
            y,
            size: 4.0,
            angle: 0.0,
            response: 1.0,
            octave: 0,
        },
        descriptor: unit_descriptor(axis),
    }
}

/// Backend returning fixed features, chosen by surface width.
pub struct ScriptedBackend {
    pub source_width: usize,
    pub source: Vec<Feature>,
    pub target: Vec<Feature>,
}

impl ScriptedBackend {
    /// `good` distinctive pairs at `points` (target shifted by `shift`), plus
    /// one indistinct feature per image that the ratio test always rejects.
    pub fn with_points(source_width: usize, points: &[(f32, f32)], shift: (f32, f32)) -> Self {
        let mut source: Vec<Feature> = points
            .iter()
            .enumerate()
            .map(|(k, &(x, y))| feature(x, y, k))
            .collect();
        let mut target: Vec<Feature> = points
            .iter()
            .enumerate()
            .map(|(k, &(x, y))| feature(x + shift.0, y + shift.1, k))
            .collect();
        source.push(feature(1.0, 1.0, 120));
        target.push(feature(2.0, 2.0, 121));
        Self {
            source_width,
            source,
            target,
        }
    }

    /// `count` well spread positions inside a 60 × 50 box.
    pub fn scattered(count: usize) -> Vec<(f32, f32)> {
        (0..count)
            .map(|k| {
                let x = 8.0 + ((k * 37) % 61) as f32 + 0.3 * (k % 3) as f32;
                let y = 6.0 + ((k * 23) % 47) as f32 + 0.7 * (k % 2) as f32;
                (x, y)
            })
            .collect()
    }
}

impl FeatureBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn detect_and_describe(&self, image: &GrayImageView<'_>) -> Vec<Feature> {
        if image.width == self.source_width {
            self.source.clone()
        } else {
            self.target.clone()
        }
    }
}

/// Flat rasters for the scripted backend: source `80 × 64`, target `96 × 64`.
pub fn scripted_rasters() -> (Raster, Raster) {
    let source = Raster::new(
        80,
        64,
        1,
        vec![10.0; 80 * 64],
        GeoTransform::north_up(0.0, 64.0, 1.0, -1.0),
        "EPSG:4326",
    )
    .unwrap();
    let target = Raster::new(
        96,
        64,
        2,
        vec![20.0; 96 * 64 * 2],
        GeoTransform::north_up(300.0, 400.0, 2.0, -2.0),
        "EPSG:3857",
    )
    .unwrap();
    (source, target)
}
