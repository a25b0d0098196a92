use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use orthoreg_core::Raster;
use tiff::decoder::{ifd::Value, Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::ColorType;
use tiff::encoder::TiffEncoder;
use tiff::tags::{PhotometricInterpretation, SampleFormat, Tag};

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::geokeys::{
    crs_from_keys, encode_geo_tags, geotransform_from_tags, is_pixel_is_point,
    parse_key_directory,
};
use super::{RasterIoError, RasterStore};

/// Largest band count the writer supports.
pub const MAX_WRITE_BANDS: usize = 8;

macro_rules! define_float_bands {
    ($name:ident, $photometric:expr, $channels:expr) => {
        struct $name;

        impl ColorType for $name {
            type Inner = f32;
            const TIFF_VALUE: PhotometricInterpretation = $photometric;
            const BITS_PER_SAMPLE: &'static [u16] = &[32; $channels];
            const SAMPLE_FORMAT: &'static [SampleFormat] = &[SampleFormat::IEEEFP; $channels];

            fn horizontal_predict(_: &[Self::Inner], _: &mut Vec<Self::Inner>) {
                unreachable!()
            }
        }
    };
}

define_float_bands!(Float1, PhotometricInterpretation::BlackIsZero, 1);
define_float_bands!(Float2, PhotometricInterpretation::BlackIsZero, 2);
define_float_bands!(Float3, PhotometricInterpretation::RGB, 3);
define_float_bands!(Float4, PhotometricInterpretation::RGB, 4);
define_float_bands!(Float5, PhotometricInterpretation::BlackIsZero, 5);
define_float_bands!(Float6, PhotometricInterpretation::BlackIsZero, 6);
define_float_bands!(Float7, PhotometricInterpretation::BlackIsZero, 7);
define_float_bands!(Float8, PhotometricInterpretation::BlackIsZero, 8);

/// GeoTIFF reader/writer.
///
/// Reads strip or tiled, chunky (pixel-interleaved) images with 8/16/32/64
/// bit integer or 32/64 bit float samples and any sample count. Writes
/// uncompressed 32 bit float with one sample per band.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeoTiffStore;

impl GeoTiffStore {
    pub fn new() -> Self {
        Self
    }
}

impl RasterStore for GeoTiffStore {
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    fn read_raster(&self, path: &Path) -> Result<Raster, RasterIoError> {
        let file = BufReader::new(File::open(path)?);
        let mut decoder = Decoder::new(file)?.with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);
        let samples = decoder
            .find_tag(Tag::SamplesPerPixel)?
            .map(Value::into_u16)
            .transpose()?
            .unwrap_or(1) as usize;
        if let Some(planar) = decoder.find_tag(Tag::PlanarConfiguration)? {
            if planar.into_u16()? != 1 {
                return Err(RasterIoError::Unsupported(
                    "planar (band-sequential) TIFF".to_string(),
                ));
            }
        }

        let pixel_scale = decoder
            .find_tag(Tag::ModelPixelScaleTag)?
            .map(Value::into_f64_vec)
            .transpose()?;
        let tiepoint = decoder
            .find_tag(Tag::ModelTiepointTag)?
            .map(Value::into_f64_vec)
            .transpose()?;
        let transformation = decoder
            .find_tag(Tag::ModelTransformationTag)?
            .map(Value::into_f64_vec)
            .transpose()?;
        let key_directory = decoder
            .find_tag(Tag::GeoKeyDirectoryTag)?
            .map(Value::into_u16_vec)
            .transpose()?
            .unwrap_or_default();
        let ascii = decoder
            .find_tag(Tag::GeoAsciiParamsTag)?
            .map(Value::into_string)
            .transpose()?
            .unwrap_or_default();

        let keys = parse_key_directory(&key_directory);
        let geo_transform = geotransform_from_tags(
            pixel_scale.as_deref(),
            tiepoint.as_deref(),
            transformation.as_deref(),
            is_pixel_is_point(&keys),
        );
        let crs = crs_from_keys(&keys, &ascii);

        let interleaved = to_f32(decoder.read_image()?)?;
        let expected = width * height * samples;
        if interleaved.len() < expected {
            return Err(RasterIoError::Unsupported(format!(
                "decoded {} samples, expected {expected}",
                interleaved.len()
            )));
        }

        let planes = deinterleave(&interleaved[..expected], samples);
        log::debug!(
            "read {}: {width}x{height}, {samples} band(s), crs '{crs}'",
            path.display()
        );
        Ok(Raster::from_bands(width, height, planes, geo_transform, crs)?)
    }

    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, raster)))]
    fn write_raster(&self, path: &Path, raster: &Raster) -> Result<(), RasterIoError> {
        let bands = raster.band_count();
        if bands > MAX_WRITE_BANDS {
            return Err(RasterIoError::Unsupported(format!(
                "{bands} bands (at most {MAX_WRITE_BANDS} can be written)"
            )));
        }

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(".orthoreg-")
            .suffix(".tif.part")
            .tempfile_in(dir)?;

        match bands {
            1 => encode::<Float1>(tmp.as_file_mut(), raster)?,
            2 => encode::<Float2>(tmp.as_file_mut(), raster)?,
            3 => encode::<Float3>(tmp.as_file_mut(), raster)?,
            4 => encode::<Float4>(tmp.as_file_mut(), raster)?,
            5 => encode::<Float5>(tmp.as_file_mut(), raster)?,
            6 => encode::<Float6>(tmp.as_file_mut(), raster)?,
            7 => encode::<Float7>(tmp.as_file_mut(), raster)?,
            _ => encode::<Float8>(tmp.as_file_mut(), raster)?,
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        log::debug!(
            "wrote {}: {}x{}, {bands} band(s)",
            path.display(),
            raster.width(),
            raster.height()
        );
        Ok(())
    }
}

fn encode<CT: ColorType<Inner = f32>>(file: &mut File, raster: &Raster) -> Result<(), RasterIoError> {
    let tags = encode_geo_tags(&raster.geo_transform(), raster.crs());

    let mut tiff = TiffEncoder::new(file)?;
    let mut image = tiff.new_image::<CT>(raster.width() as u32, raster.height() as u32)?;
    {
        let dir = image.encoder();
        if let Some(scale) = tags.pixel_scale {
            dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
        }
        if let Some(tiepoint) = tags.tiepoint {
            dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
        }
        if let Some(m) = tags.transformation {
            dir.write_tag(Tag::ModelTransformationTag, &m[..])?;
        }
        dir.write_tag(Tag::GeoKeyDirectoryTag, &tags.key_directory[..])?;
        if let Some(ascii) = tags.ascii_params.as_deref() {
            dir.write_tag(Tag::GeoAsciiParamsTag, ascii)?;
        }
    }

    image.write_data(&interleave(raster))?;
    Ok(())
}

fn to_f32(decoded: DecodingResult) -> Result<Vec<f32>, RasterIoError> {
    #[allow(unreachable_patterns)]
    let out = match decoded {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => {
            return Err(RasterIoError::Unsupported(
                "sample format".to_string(),
            ))
        }
    };
    Ok(out)
}

/// Pixel-interleaved samples → one plane per band.
fn deinterleave(samples: &[f32], bands: usize) -> Vec<Vec<f32>> {
    let bands = bands.max(1);
    let pixels = samples.len() / bands;
    let mut planes = vec![Vec::with_capacity(pixels); bands];
    for px in samples.chunks_exact(bands) {
        for (plane, &v) in planes.iter_mut().zip(px) {
            plane.push(v);
        }
    }
    planes
}

fn interleave(raster: &Raster) -> Vec<f32> {
    let bands = raster.band_count();
    let pixels = raster.width() * raster.height();
    let mut out = vec![0.0f32; pixels * bands];
    for b in 0..bands {
        for (i, &v) in raster.band(b).iter().enumerate() {
            out[i * bands + b] = v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_and_deinterleave_are_inverse_layouts() {
        let raster = Raster::from_bands(
            2,
            1,
            vec![vec![1.0, 2.0], vec![10.0, 20.0], vec![100.0, 200.0]],
            orthoreg_core::GeoTransform::IDENTITY,
            "",
        )
        .unwrap();
        let flat = interleave(&raster);
        assert_eq!(flat, vec![1.0, 10.0, 100.0, 2.0, 20.0, 200.0]);
        assert_eq!(
            deinterleave(&flat, 3),
            vec![vec![1.0, 2.0], vec![10.0, 20.0], vec![100.0, 200.0]]
        );
    }
}
