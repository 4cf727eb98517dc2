use std::fmt;
use std::path::Path;

use rayon::prelude::*;
use tracing::info;

use crate::crs::Crs;
use crate::error::{CubeError, Result};
use crate::filename::TileRecord;
use crate::raster::{PixelType, RasterInfo, RasterReader};

/// Affine pixel-to-world transform.
///
/// `x = c + col * a + row * b`, `y = f + col * d + row * e`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// From GDAL's `[c, a, b, f, d, e]` ordering.
    pub fn from_gdal(gt: &[f64; 6]) -> Self {
        Self {
            a: gt[1],
            b: gt[2],
            c: gt[0],
            d: gt[4],
            e: gt[5],
            f: gt[3],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    /// Space separated GDAL geotransform, as stored in the `GeoTransform` attribute.
    pub fn to_gdal_string(&self) -> String {
        self.to_gdal()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Affine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {}, {})",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

/// Geometry shared by every tile of a run, captured from the first record.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceGeometry {
    pub source: String,
    pub rows: usize,
    pub cols: usize,
    pub transform: Affine,
    pub crs: Crs,
    pub pixel_type: PixelType,
    pub nodata: Option<f64>,
}

impl ReferenceGeometry {
    pub fn from_info(source: impl Into<String>, info: RasterInfo) -> Self {
        Self {
            source: source.into(),
            rows: info.rows,
            cols: info.cols,
            transform: info.transform,
            crs: info.crs,
            pixel_type: info.pixel_type,
            nodata: info.nodata,
        }
    }

    /// Compare a candidate tile against the reference, CRS first, then transform, then shape.
    pub fn check(&self, file: &str, info: &RasterInfo) -> Result<()> {
        if info.crs != self.crs {
            return Err(CubeError::GeometryMismatch {
                file: file.to_string(),
                property: "CRS",
                expected: self.crs.describe(),
                found: info.crs.describe(),
            });
        }
        if info.transform != self.transform {
            return Err(CubeError::GeometryMismatch {
                file: file.to_string(),
                property: "transform",
                expected: self.transform.to_string(),
                found: info.transform.to_string(),
            });
        }
        if (info.rows, info.cols) != (self.rows, self.cols) {
            return Err(CubeError::GeometryMismatch {
                file: file.to_string(),
                property: "shape",
                expected: format!("{}x{}", self.rows, self.cols),
                found: format!("{}x{}", info.rows, info.cols),
            });
        }
        Ok(())
    }
}

/// Capture the reference geometry from the first record and check every other record against it.
///
/// Runs to completion before any deferred read is built, so mismatches abort
/// the run before the output file is touched.
pub fn validate_geometry<R: RasterReader>(
    reader: &R,
    input_dir: &Path,
    records: &[TileRecord],
) -> Result<ReferenceGeometry> {
    let first = records.first().ok_or_else(|| CubeError::NoRecordsForPeriod {
        period: String::new(),
        available: Vec::new(),
    })?;

    info!("Inspecting sample raster {} …", first.filename);
    let info = reader.inspect(&input_dir.join(&first.filename))?;
    let reference = ReferenceGeometry::from_info(first.filename.clone(), info);
    info!(
        "Shape={}x{}, CRS={}, dtype={}, nodata={:?}",
        reference.rows,
        reference.cols,
        reference.crs.describe(),
        reference.pixel_type.name(),
        reference.nodata
    );

    info!("Checking consistency of {} tiles …", records.len());
    // 並列で検査し、エラーはレコード順で最初のものを返す
    let results: Vec<Result<()>> = records[1..]
        .par_iter()
        .map(|record| {
            let info = reader.inspect(&input_dir.join(&record.filename))?;
            reference.check(&record.filename, &info)
        })
        .collect();
    results.into_iter().collect::<Result<Vec<()>>>()?;

    info!("All {} tiles share the reference geometry", records.len());
    Ok(reference)
}
