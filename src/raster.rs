use std::fmt::Debug;
use std::path::Path;

use gdal::raster::{GdalDataType, GdalType};
use gdal::Dataset;
use netcdf::NcTypeDescriptor;
use num_traits::NumCast;

use crate::crs::Crs;
use crate::error::{CubeError, Result};
use crate::geometry::Affine;

/// Pixel data types accepted for input tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    U8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl PixelType {
    pub fn from_gdal(data_type: GdalDataType) -> Option<Self> {
        match data_type {
            GdalDataType::UInt8 => Some(PixelType::U8),
            GdalDataType::UInt16 => Some(PixelType::U16),
            GdalDataType::Int16 => Some(PixelType::I16),
            GdalDataType::UInt32 => Some(PixelType::U32),
            GdalDataType::Int32 => Some(PixelType::I32),
            GdalDataType::Float32 => Some(PixelType::F32),
            GdalDataType::Float64 => Some(PixelType::F64),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelType::U8 => "uint8",
            PixelType::U16 => "uint16",
            PixelType::I16 => "int16",
            PixelType::U32 => "uint32",
            PixelType::I32 => "int32",
            PixelType::F32 => "float32",
            PixelType::F64 => "float64",
        }
    }

    pub fn size_of(&self) -> usize {
        match self {
            PixelType::U8 => 1,
            PixelType::U16 | PixelType::I16 => 2,
            PixelType::U32 | PixelType::I32 | PixelType::F32 => 4,
            PixelType::F64 => 8,
        }
    }
}

/// A Rust type that can be read from GDAL and stored in NetCDF.
pub trait Pixel:
    GdalType + NcTypeDescriptor + NumCast + Copy + Default + PartialEq + Debug + Send + Sync + 'static
{
    const TYPE: PixelType;
}

macro_rules! impl_pixel {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl Pixel for $t {
            const TYPE: PixelType = PixelType::$variant;
        })*
    };
}

impl_pixel!(
    u8 => U8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    f32 => F32,
    f64 => F64,
);

/// Header information of a single-band raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub rows: usize,
    pub cols: usize,
    pub transform: Affine,
    pub crs: Crs,
    pub pixel_type: PixelType,
    pub nodata: Option<f64>,
}

/// A rectangular pixel region, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Window {
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opens single-band rasters. Every call must be independent so chunk workers
/// can call it concurrently on the same path.
pub trait RasterReader: Send + Sync {
    fn inspect(&self, path: &Path) -> Result<RasterInfo>;

    fn read_window<T: Pixel>(&self, path: &Path, window: Window) -> Result<Vec<T>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GdalReader;

impl GdalReader {
    pub fn new() -> Self {
        Self
    }
}

impl RasterReader for GdalReader {
    fn inspect(&self, path: &Path) -> Result<RasterInfo> {
        let dataset = Dataset::open(path).map_err(|e| CubeError::raster(path, e))?;
        let file = display_name(path);

        let band_count = dataset.raster_count();
        if band_count != 1 {
            return Err(CubeError::UnsupportedRaster {
                file,
                reason: format!("expected a single band, found {}", band_count),
            });
        }

        let (cols, rows) = dataset.raster_size();
        let geo_transform = dataset
            .geo_transform()
            .map_err(|e| CubeError::raster(path, e))?;
        let crs = crs_from_projection(&dataset.projection(), path)?;

        let band = dataset.rasterband(1).map_err(|e| CubeError::raster(path, e))?;
        let pixel_type =
            PixelType::from_gdal(band.band_type()).ok_or_else(|| CubeError::UnsupportedRaster {
                file: file.clone(),
                reason: format!("unsupported pixel type {:?}", band.band_type()),
            })?;

        Ok(RasterInfo {
            rows,
            cols,
            transform: Affine::from_gdal(&geo_transform),
            crs,
            pixel_type,
            nodata: band.no_data_value(),
        })
    }

    fn read_window<T: Pixel>(&self, path: &Path, window: Window) -> Result<Vec<T>> {
        // チャンクごとに開き直す（ファイルハンドルは共有しない）
        let dataset = Dataset::open(path).map_err(|e| CubeError::raster(path, e))?;
        let band = dataset.rasterband(1).map_err(|e| CubeError::raster(path, e))?;
        let buffer = band
            .read_as::<T>(
                (window.col_off as isize, window.row_off as isize),
                (window.cols, window.rows),
                (window.cols, window.rows),
                None,
            )
            .map_err(|e| CubeError::raster(path, e))?;
        Ok(buffer.data().to_vec())
    }
}

/// Canonical CRS of the projection string `path` declares.
fn crs_from_projection(wkt: &str, path: &Path) -> Result<Crs> {
    if wkt.trim().is_empty() {
        return Ok(Crs::empty());
    }
    // GDALを通して正規化したWKTで比較する
    Crs::from_wkt(wkt).map_err(|e| CubeError::raster(path, e))
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}
