use serde::{Deserialize, Serialize};

/// Length of every descriptor vector (4×4 spatial cells × 8 orientation bins).
pub const DESCRIPTOR_LEN: usize = 128;

/// Distinctive image location in surface pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Sub-pixel column (pixel centres at integer coordinates).
    pub x: f32,
    /// Sub-pixel row.
    pub y: f32,
    /// Diameter of the meaningful neighbourhood, in surface pixels.
    pub size: f32,
    /// Dominant gradient orientation in degrees, `[0, 360)`.
    pub angle: f32,
    /// Absolute interpolated DoG contrast; larger is stronger.
    pub response: f32,
    /// Scale-space octave the keypoint was found in.
    pub octave: u16,
}

/// Fixed-length appearance fingerprint, compared by Euclidean distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Descriptor(pub [f32; DESCRIPTOR_LEN]);

impl Descriptor {
    pub fn zeros() -> Self {
        Self([0.0; DESCRIPTOR_LEN])
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[inline]
    pub fn distance_squared(&self, other: &Descriptor) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| {
                let d = a - b;
                d * d
            })
            .sum()
    }

    #[inline]
    pub fn distance(&self, other: &Descriptor) -> f32 {
        self.distance_squared(other).sqrt()
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Self::zeros()
    }
}

/// One keypoint with its descriptor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Feature {
    pub keypoint: Keypoint,
    pub descriptor: Descriptor,
}
