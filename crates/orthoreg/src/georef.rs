//! Output georeferencing.

use orthoreg_core::{GeoTransform, Homography, Raster};
use serde::{Deserialize, Serialize};

/// Where the registered output takes its geotransform and CRS from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeoReferencePolicy {
    /// The output lives in the target's pixel grid, so it inherits the
    /// target's geotransform and CRS unchanged.
    #[default]
    Target,
    /// Source geotransform shifted by the translation part of the
    /// homography, in the source CRS. Ignores rotation, scale and
    /// perspective; only meaningful for near-translational registrations.
    SourceTranslated,
}

impl GeoReferencePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoReferencePolicy::Target => "target",
            GeoReferencePolicy::SourceTranslated => "source-translated",
        }
    }
}

/// Geotransform and CRS the output should carry under `policy`.
pub fn reconciled_georeference(
    source: &Raster,
    target: &Raster,
    h: &Homography,
    policy: GeoReferencePolicy,
) -> (GeoTransform, String) {
    match policy {
        GeoReferencePolicy::Target => (target.geo_transform(), target.crs().to_string()),
        GeoReferencePolicy::SourceTranslated => {
            let mut c = source.geo_transform().coefficients();
            let (tx, ty) = h.translation_part();
            c[0] += tx * c[1];
            c[3] += ty * c[5];
            (GeoTransform(c), source.crs().to_string())
        }
    }
}

/// Stamp the reconciled georeference onto `output`.
pub fn reconcile(
    output: &mut Raster,
    source: &Raster,
    target: &Raster,
    h: &Homography,
    policy: GeoReferencePolicy,
) {
    let (gt, crs) = reconciled_georeference(source, target, h, policy);
    log::debug!("georef: {} policy -> {:?} {crs}", policy.as_str(), gt.0);
    output.set_georeference(gt, crs);
}
