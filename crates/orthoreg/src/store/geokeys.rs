//! GeoTIFF georeferencing tags ↔ GDAL geotransform and CRS identifier.
//!
//! Only the subset needed to round-trip north-up and affine rasters is
//! handled: model pixel scale + tiepoint, the full model transformation,
//! and the EPSG / citation keys of the key directory.

use orthoreg_core::GeoTransform;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GT_CITATION: u16 = 1026;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const PCS_CITATION: u16 = 3073;

const MODEL_PROJECTED: u16 = 1;
const MODEL_GEOGRAPHIC: u16 = 2;
const USER_DEFINED: u16 = 32767;
const PIXEL_IS_AREA: u16 = 1;
const PIXEL_IS_POINT: u16 = 2;

/// Tag number of `GeoAsciiParamsTag`, used as a key location.
const ASCII_PARAMS_LOCATION: u16 = 34737;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct GeoKey {
    pub id: u16,
    pub location: u16,
    pub count: u16,
    pub value: u16,
}

/// Entries of a `GeoKeyDirectoryTag`; malformed directories yield no keys.
pub(crate) fn parse_key_directory(dir: &[u16]) -> Vec<GeoKey> {
    if dir.len() < 4 {
        return Vec::new();
    }
    let n = dir[3] as usize;
    dir[4..]
        .chunks_exact(4)
        .take(n)
        .map(|k| GeoKey {
            id: k[0],
            location: k[1],
            count: k[2],
            value: k[3],
        })
        .collect()
}

fn short_key(keys: &[GeoKey], id: u16) -> Option<u16> {
    keys.iter()
        .find(|k| k.id == id && k.location == 0)
        .map(|k| k.value)
}

fn ascii_key(keys: &[GeoKey], id: u16, ascii: &str) -> Option<String> {
    let k = keys
        .iter()
        .find(|k| k.id == id && k.location == ASCII_PARAMS_LOCATION)?;
    let start = k.value as usize;
    let end = start + k.count as usize;
    let text = ascii.get(start..end.min(ascii.len()))?;
    let text = text.trim_end_matches(['|', '\0']).trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// `EPSG:<code>` when the keys name one, else a citation string, else empty.
pub(crate) fn crs_from_keys(keys: &[GeoKey], ascii: &str) -> String {
    for id in [PROJECTED_CS_TYPE, GEOGRAPHIC_TYPE] {
        if let Some(code) = short_key(keys, id).filter(|&c| c != 0 && c != USER_DEFINED) {
            return format!("EPSG:{code}");
        }
    }
    ascii_key(keys, PCS_CITATION, ascii)
        .or_else(|| ascii_key(keys, GT_CITATION, ascii))
        .unwrap_or_default()
}

pub(crate) fn is_pixel_is_point(keys: &[GeoKey]) -> bool {
    short_key(keys, GT_RASTER_TYPE) == Some(PIXEL_IS_POINT)
}

/// Geotransform from whichever model tags are present (identity otherwise).
///
/// Point-registered rasters are shifted by half a pixel so the transform
/// addresses pixel corners.
pub(crate) fn geotransform_from_tags(
    pixel_scale: Option<&[f64]>,
    tiepoint: Option<&[f64]>,
    transformation: Option<&[f64]>,
    pixel_is_point: bool,
) -> GeoTransform {
    let mut gt = if let Some(m) = transformation.filter(|m| m.len() >= 16) {
        GeoTransform([m[3], m[0], m[1], m[7], m[4], m[5]])
    } else if let (Some(s), Some(t)) = (
        pixel_scale.filter(|s| s.len() >= 2),
        tiepoint.filter(|t| t.len() >= 6),
    ) {
        let (sx, sy) = (s[0], s[1]);
        GeoTransform([t[3] - t[0] * sx, sx, 0.0, t[4] + t[1] * sy, 0.0, -sy])
    } else {
        return GeoTransform::IDENTITY;
    };

    if pixel_is_point {
        let c = &mut gt.0;
        c[0] -= 0.5 * (c[1] + c[2]);
        c[3] -= 0.5 * (c[4] + c[5]);
    }
    gt
}

/// Tag payloads describing `gt` and `crs`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EncodedGeoTags {
    pub pixel_scale: Option<[f64; 3]>,
    pub tiepoint: Option<[f64; 6]>,
    pub transformation: Option<[f64; 16]>,
    pub key_directory: Vec<u16>,
    pub ascii_params: Option<String>,
}

pub(crate) fn encode_geo_tags(gt: &GeoTransform, crs: &str) -> EncodedGeoTags {
    let c = gt.coefficients();
    let (pixel_scale, tiepoint, transformation) = if gt.is_north_up() {
        (
            Some([c[1], -c[5], 0.0]),
            Some([0.0, 0.0, 0.0, c[0], c[3], 0.0]),
            None,
        )
    } else {
        let m = [
            c[1], c[2], 0.0, c[0], //
            c[4], c[5], 0.0, c[3], //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        (None, None, Some(m))
    };

    let mut keys: Vec<[u16; 4]> = vec![[GT_RASTER_TYPE, 0, 1, PIXEL_IS_AREA]];
    let mut ascii_params = None;
    match parse_epsg(crs) {
        Some(code) if is_geographic_code(code) => {
            keys.push([GT_MODEL_TYPE, 0, 1, MODEL_GEOGRAPHIC]);
            keys.push([GEOGRAPHIC_TYPE, 0, 1, code]);
        }
        Some(code) => {
            keys.push([GT_MODEL_TYPE, 0, 1, MODEL_PROJECTED]);
            keys.push([PROJECTED_CS_TYPE, 0, 1, code]);
        }
        None if !crs.trim().is_empty() => {
            let text = format!("{}|", crs.trim());
            keys.push([GT_MODEL_TYPE, 0, 1, USER_DEFINED]);
            keys.push([GT_CITATION, ASCII_PARAMS_LOCATION, text.len() as u16, 0]);
            ascii_params = Some(text);
        }
        None => {}
    }
    keys.sort_by_key(|k| k[0]);

    let mut key_directory = vec![1, 1, 0, keys.len() as u16];
    key_directory.extend(keys.iter().flatten());

    EncodedGeoTags {
        pixel_scale,
        tiepoint,
        transformation,
        key_directory,
        ascii_params,
    }
}

fn parse_epsg(crs: &str) -> Option<u16> {
    let (authority, code) = crs.trim().split_once(':')?;
    if !authority.eq_ignore_ascii_case("epsg") {
        return None;
    }
    code.trim().parse().ok()
}

/// Geographic 2D CRS codes live in the 4000 block of the EPSG registry.
fn is_geographic_code(code: u16) -> bool {
    (4000..5000).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(tags: &EncodedGeoTags) -> (GeoTransform, String) {
        let keys = parse_key_directory(&tags.key_directory);
        let gt = geotransform_from_tags(
            tags.pixel_scale.as_ref().map(|v| &v[..]),
            tags.tiepoint.as_ref().map(|v| &v[..]),
            tags.transformation.as_ref().map(|v| &v[..]),
            is_pixel_is_point(&keys),
        );
        let crs = crs_from_keys(&keys, tags.ascii_params.as_deref().unwrap_or(""));
        (gt, crs)
    }

    #[test]
    fn north_up_projected_round_trips() {
        let gt = GeoTransform::north_up(500_000.0, 4_100_000.0, 0.25, -0.25);
        let tags = encode_geo_tags(&gt, "EPSG:32650");
        assert!(tags.transformation.is_none());
        assert_eq!(decode(&tags), (gt, "EPSG:32650".to_string()));
    }

    #[test]
    fn rotated_geographic_round_trips() {
        let gt = GeoTransform([116.0, 1e-4, 2e-6, 40.0, 3e-6, -1e-4]);
        let tags = encode_geo_tags(&gt, "epsg:4326");
        assert!(tags.pixel_scale.is_none());
        assert_eq!(decode(&tags), (gt, "EPSG:4326".to_string()));
    }

    #[test]
    fn free_form_crs_goes_through_citation() {
        let tags = encode_geo_tags(&GeoTransform::IDENTITY, "Local grid (m)");
        assert_eq!(decode(&tags).1, "Local grid (m)");
        let empty = encode_geo_tags(&GeoTransform::IDENTITY, "");
        assert_eq!(decode(&empty).1, "");
    }

    #[test]
    fn pixel_is_point_shifts_half_pixel() {
        let gt = geotransform_from_tags(
            Some(&[2.0, 2.0, 0.0]),
            Some(&[0.0, 0.0, 0.0, 100.0, 50.0, 0.0]),
            None,
            true,
        );
        assert_eq!(gt, GeoTransform::north_up(99.0, 51.0, 2.0, -2.0));
    }

    #[test]
    fn short_directory_has_no_keys() {
        assert!(parse_key_directory(&[1, 1]).is_empty());
        assert_eq!(crs_from_keys(&[], ""), "");
    }
}
