use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CubeError>;

#[derive(Error, Debug)]
pub enum CubeError {
    /// 入力ディレクトリに対象拡張子のファイルが一つもない
    #[error("no .{extension} files found in {dir}")]
    InputAbsent { dir: PathBuf, extension: String },

    /// 命名規則に一致するファイルが一つもない
    #[error("none of the {scanned} candidate files matched the tile naming pattern")]
    NoParsedTiles { scanned: usize },

    #[error("no tiles found for period {period} (available: {available:?})")]
    NoRecordsForPeriod {
        period: String,
        available: Vec<String>,
    },

    #[error("{property} mismatch in {file}: expected {expected}, found {found}")]
    GeometryMismatch {
        file: String,
        property: &'static str,
        expected: String,
        found: String,
    },

    #[error("unsupported raster {file}: {reason}")]
    UnsupportedRaster { file: String, reason: String },

    #[error("failed to read raster {path}: {source}")]
    Raster {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("failed to write NetCDF {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: netcdf::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CubeError {
    pub(crate) fn raster(path: impl Into<PathBuf>, source: gdal::errors::GdalError) -> Self {
        CubeError::Raster {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: netcdf::Error) -> Self {
        CubeError::Write {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CubeError::Io {
            path: path.into(),
            source,
        }
    }
}
