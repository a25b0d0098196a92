use crate::Feature;
use orthoreg_core::GrayImageView;

/// Keypoint detector + descriptor extractor.
///
/// Implementations must be deterministic: the same surface always yields the
/// same features in the same order, so match indices stay stable within one
/// registration.
pub trait FeatureBackend {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &str;

    fn detect_and_describe(&self, image: &GrayImageView<'_>) -> Vec<Feature>;
}

impl<B: FeatureBackend + ?Sized> FeatureBackend for &B {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect_and_describe(&self, image: &GrayImageView<'_>) -> Vec<Feature> {
        (**self).detect_and_describe(image)
    }
}

impl<B: FeatureBackend + ?Sized> FeatureBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect_and_describe(&self, image: &GrayImageView<'_>) -> Vec<Feature> {
        (**self).detect_and_describe(image)
    }
}
