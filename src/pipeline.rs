use std::path::PathBuf;

use tracing::info;

use crate::cohort::select_cohort;
use crate::config::CubeConfig;
use crate::coords::pixel_centers;
use crate::error::Result;
use crate::filename::{classify, scan_directory, TileNamePattern};
use crate::geometry::validate_geometry;
use crate::grid::{build_grid, MissingTile};
use crate::raster::{GdalReader, RasterReader};
use crate::writer::{CubeDataset, NetCdfWriter};

/// Outcome of a successful run, including the non-fatal issues it recovered from.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub year: String,
    pub genders: Vec<String>,
    pub ages: Vec<String>,
    pub shape: [usize; 4],
    pub unparsed: Vec<String>,
    pub missing: Vec<MissingTile>,
    pub rotated: bool,
    pub chunks_written: usize,
}

/// Build the cube described by `config` using GDAL to read tiles.
pub fn run(config: &CubeConfig) -> Result<RunSummary> {
    run_with(&GdalReader::new(), config)
}

pub fn run_with<R: RasterReader>(reader: &R, config: &CubeConfig) -> Result<RunSummary> {
    config.validate()?;

    info!("Scanning input folder {:?} …", config.input_dir);
    let names = scan_directory(&config.input_dir, &config.extension)?;

    let pattern = TileNamePattern::new(&config.extension)?;
    let classification = classify(&names, &pattern)?;

    let cohort = select_cohort(&classification.records, &config.period)?;

    // 検証を全て終えてから遅延グラフを組み立てる
    let reference = validate_geometry(reader, &config.input_dir, &cohort.records)?;

    info!("Building deferred array …");
    let grid = build_grid(
        &cohort,
        &reference,
        &config.input_dir,
        config.chunk_size,
        config.missing_policy,
    );

    info!("Building coordinates …");
    let coords = pixel_centers(&reference.transform, reference.rows, reference.cols);
    let rotated = coords.rotated;

    let shape = grid.array.shape();
    let dataset = CubeDataset::assemble(config, &cohort, reference, grid.array, coords);

    info!("Writing NetCDF (streamed) to {:?} …", config.output_path);
    let stats = NetCdfWriter::new(config.compression_level).write(&dataset, reader, &config.output_path)?;
    info!("Done. NetCDF written: {:?}", config.output_path);

    Ok(RunSummary {
        output_path: config.output_path.clone(),
        year: cohort.year,
        genders: cohort.genders.labels,
        ages: cohort.ages.labels,
        shape,
        unparsed: classification.unparsed,
        missing: grid.missing,
        rotated,
        chunks_written: stats.chunks_written,
    })
}
