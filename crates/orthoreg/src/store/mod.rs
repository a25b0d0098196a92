//! Raster persistence.

mod geokeys;
mod geotiff;

use std::path::Path;

use orthoreg_core::{Raster, RasterError};

pub use geotiff::{GeoTiffStore, MAX_WRITE_BANDS};

#[derive(thiserror::Error, Debug)]
pub enum RasterIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error("unsupported raster layout: {0}")]
    Unsupported(String),
}

/// Reads and writes whole rasters, georeference included.
pub trait RasterStore {
    fn read_raster(&self, path: &Path) -> Result<Raster, RasterIoError>;

    /// Writes atomically: on failure no file appears at `path`.
    fn write_raster(&self, path: &Path, raster: &Raster) -> Result<(), RasterIoError>;
}

impl<S: RasterStore + ?Sized> RasterStore for &S {
    fn read_raster(&self, path: &Path) -> Result<Raster, RasterIoError> {
        (**self).read_raster(path)
    }

    fn write_raster(&self, path: &Path, raster: &Raster) -> Result<(), RasterIoError> {
        (**self).write_raster(path, raster)
    }
}
