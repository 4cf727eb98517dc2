use std::fs;
use std::path::Path;

use chrono::Utc;
use netcdf::{FileMut, VariableMut};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cohort::Cohort;
use crate::config::CubeConfig;
use crate::coords::CoordinateVectors;
use crate::crs::CfAttribute;
use crate::error::{CubeError, Result};
use crate::geometry::ReferenceGeometry;
use crate::grid::{Chunk, DeferredArray};
use crate::raster::{Pixel, PixelType, RasterReader};

pub const GRID_MAPPING_VARIABLE: &str = "spatial_ref";
pub const CONVENTIONS: &str = "CF-1.8";
const DIMENSIONS: [&str; 4] = ["gender", "age_group", "y", "x"];

type NcResult<T> = std::result::Result<T, netcdf::Error>;

/// Everything that goes into the output file. Pixels stay deferred in `array`.
#[derive(Debug, Clone)]
pub struct CubeDataset {
    pub variable_name: String,
    pub units: String,
    pub year: String,
    pub gender_labels: Vec<String>,
    pub age_ids: Vec<i16>,
    pub array: DeferredArray,
    pub coords: CoordinateVectors,
    pub reference: ReferenceGeometry,
}

impl CubeDataset {
    pub fn assemble(
        config: &CubeConfig,
        cohort: &Cohort,
        reference: ReferenceGeometry,
        array: DeferredArray,
        coords: CoordinateVectors,
    ) -> Self {
        Self {
            variable_name: config.variable_name.clone(),
            units: config.units.clone(),
            year: cohort.year.clone(),
            gender_labels: cohort.genders.labels.clone(),
            age_ids: cohort.age_ids(),
            array,
            coords,
            reference,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub chunks_written: usize,
    /// Uncompressed size of the main variable.
    pub bytes_written: u64,
}

pub struct NetCdfWriter {
    compression_level: i32,
}

impl Default for NetCdfWriter {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_COMPRESSION_LEVEL)
    }
}

impl NetCdfWriter {
    pub fn new(compression_level: i32) -> Self {
        Self { compression_level }
    }

    /// Stream `dataset` into a NetCDF-4 file, executing the deferred reads chunk by chunk.
    pub fn write<R: RasterReader>(
        &self,
        dataset: &CubeDataset,
        reader: &R,
        output_path: &Path,
    ) -> Result<WriteStats> {
        match dataset.array.pixel_type() {
            PixelType::U8 => self.write_typed::<u8, R>(dataset, reader, output_path),
            PixelType::U16 => self.write_typed::<u16, R>(dataset, reader, output_path),
            PixelType::I16 => self.write_typed::<i16, R>(dataset, reader, output_path),
            PixelType::U32 => self.write_typed::<u32, R>(dataset, reader, output_path),
            PixelType::I32 => self.write_typed::<i32, R>(dataset, reader, output_path),
            PixelType::F32 => self.write_typed::<f32, R>(dataset, reader, output_path),
            PixelType::F64 => self.write_typed::<f64, R>(dataset, reader, output_path),
        }
    }

    fn write_typed<T: Pixel, R: RasterReader>(
        &self,
        dataset: &CubeDataset,
        reader: &R,
        output_path: &Path,
    ) -> Result<WriteStats> {
        // 出力ディレクトリの作成
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| CubeError::io(parent, e))?;
            }
        }

        let mut file = netcdf::create(output_path).map_err(|e| CubeError::write(output_path, e))?;
        self.define::<T>(&mut file, dataset)
            .map_err(|e| CubeError::write(output_path, e))?;

        let mut var = file
            .variable_mut(&dataset.variable_name)
            .ok_or_else(|| CubeError::Config(format!("variable {} not defined", dataset.variable_name)))?;
        let stats = stream_chunks::<T, R>(&mut var, &dataset.array, reader, output_path)?;

        info!(
            "Wrote {} chunks ({} bytes uncompressed) to {:?}",
            stats.chunks_written, stats.bytes_written, output_path
        );
        Ok(stats)
    }

    /// Dimensions, coordinate variables, the grid mapping and the (still empty) main variable.
    fn define<T: Pixel>(&self, file: &mut FileMut, dataset: &CubeDataset) -> NcResult<()> {
        let [genders, ages, rows, cols] = dataset.array.shape();
        file.add_dimension(DIMENSIONS[0], genders)?;
        file.add_dimension(DIMENSIONS[1], ages)?;
        file.add_dimension(DIMENSIONS[2], rows)?;
        file.add_dimension(DIMENSIONS[3], cols)?;

        self.write_label_coords(file, dataset)?;
        self.write_spatial_coords(file, dataset)?;
        self.write_grid_mapping(file, &dataset.reference)?;

        {
            let mut var = file.add_variable::<T>(&dataset.variable_name, &DIMENSIONS)?;
            var.set_chunking(&dataset.array.chunk_shape())?;
            if self.compression_level > 0 {
                var.set_compression(self.compression_level, true)?;
            }
            var.put_attribute("long_name", dataset.variable_name.as_str())?;
            var.put_attribute("units", dataset.units.as_str())?;
            var.put_attribute("grid_mapping", GRID_MAPPING_VARIABLE)?;
            if let Some(nodata) = dataset.reference.nodata {
                var.put_attribute("nodata", nodata)?;
            }
        }

        file.add_attribute("Conventions", CONVENTIONS)?;
        file.add_attribute("year", dataset.year.as_str())?;
        file.add_attribute(
            "source",
            format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")).as_str(),
        )?;
        file.add_attribute(
            "history",
            format!(
                "{}: stacked {} tiles",
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
                genders * ages
            )
            .as_str(),
        )?;
        Ok(())
    }

    fn write_label_coords(&self, file: &mut FileMut, dataset: &CubeDataset) -> NcResult<()> {
        let gender_ids: Vec<i8> = (0..dataset.gender_labels.len()).map(|i| i as i8).collect();
        {
            let mut var = file.add_variable::<i8>("gender", &["gender"])?;
            var.put_attribute("long_name", "gender")?;
            var.put_attribute("flag_values", gender_ids.clone())?;
            var.put_attribute("flag_meanings", dataset.gender_labels.join(" ").as_str())?;
            var.put_values(&gender_ids, ..)?;
        }
        {
            let mut var = file.add_variable::<i16>("age_group", &["age_group"])?;
            var.put_attribute("long_name", "age group (lower bound)")?;
            var.put_attribute("units", "years")?;
            var.put_values(&dataset.age_ids, ..)?;
        }
        Ok(())
    }

    fn write_spatial_coords(&self, file: &mut FileMut, dataset: &CubeDataset) -> NcResult<()> {
        let crs = &dataset.reference.crs;
        // 投影座標系の単位はCRSから取る（フィート系など）
        let linear = crs.linear_units().unwrap_or("m");
        let (x_attrs, y_attrs) = if crs.is_geographic() {
            (
                [("standard_name", "longitude"), ("long_name", "longitude"), ("units", "degrees_east")],
                [("standard_name", "latitude"), ("long_name", "latitude"), ("units", "degrees_north")],
            )
        } else {
            (
                [("standard_name", "projection_x_coordinate"), ("long_name", "x coordinate of projection"), ("units", linear)],
                [("standard_name", "projection_y_coordinate"), ("long_name", "y coordinate of projection"), ("units", linear)],
            )
        };

        {
            let mut var = file.add_variable::<f64>("x", &["x"])?;
            for (name, value) in x_attrs {
                var.put_attribute(name, value)?;
            }
            var.put_attribute("axis", "X")?;
            var.put_values(&dataset.coords.x, ..)?;
        }
        {
            let mut var = file.add_variable::<f64>("y", &["y"])?;
            for (name, value) in y_attrs {
                var.put_attribute(name, value)?;
            }
            var.put_attribute("axis", "Y")?;
            var.put_values(&dataset.coords.y, ..)?;
        }
        Ok(())
    }

    fn write_grid_mapping(&self, file: &mut FileMut, reference: &ReferenceGeometry) -> NcResult<()> {
        let crs = &reference.crs;
        if !crs.is_empty() && crs.grid_mapping_name().is_none() {
            warn!(
                "No CF grid mapping for {}; only crs_wkt describes the projection",
                crs.describe()
            );
        }

        let mut var = file.add_variable::<i32>(GRID_MAPPING_VARIABLE, &[])?;
        for (name, value) in crs.grid_mapping() {
            match value {
                CfAttribute::Text(text) => var.put_attribute(name, text.as_str())?,
                CfAttribute::Number(number) => var.put_attribute(name, *number)?,
                CfAttribute::Numbers(numbers) => var.put_attribute(name, numbers.clone())?,
            };
        }
        if !reference.crs.is_empty() {
            var.put_attribute("crs_wkt", reference.crs.wkt())?;
            // GDAL はこの属性名で投影法を読む
            var.put_attribute("spatial_ref", reference.crs.wkt())?;
        }
        var.put_attribute("GeoTransform", reference.transform.to_gdal_string().as_str())?;
        var.put_values(&[0i32], ..)?;
        Ok(())
    }
}

/// Materialise chunks in parallel batches and write them in key order.
///
/// Peak memory is one batch: `current_num_threads()` chunks.
fn stream_chunks<T: Pixel, R: RasterReader>(
    var: &mut VariableMut<'_>,
    array: &DeferredArray,
    reader: &R,
    output_path: &Path,
) -> Result<WriteStats> {
    let keys: Vec<_> = array.chunks().collect();
    let batch_size = rayon::current_num_threads().max(1);
    let mut stats = WriteStats {
        chunks_written: 0,
        bytes_written: 0,
    };

    for batch in keys.chunks(batch_size) {
        let chunks: Vec<Chunk<T>> = batch
            .par_iter()
            .map(|&key| array.materialize::<T, R>(reader, key))
            .collect::<Result<_>>()?;

        for chunk in chunks {
            var.put_values(&chunk.data, chunk.extents())
                .map_err(|e| CubeError::write(output_path, e))?;
            stats.chunks_written += 1;
            stats.bytes_written += (chunk.data.len() * T::TYPE.size_of()) as u64;
        }
        debug!("Written {}/{} chunks", stats.chunks_written, keys.len());
    }

    Ok(stats)
}
