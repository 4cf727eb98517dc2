pub mod cohort;
pub mod config;
pub mod coords;
pub mod crs;
pub mod error;
pub mod filename;
pub mod geometry;
pub mod grid;
pub mod pipeline;
pub mod raster;
pub mod writer;

#[cfg(test)]
pub(crate) mod testdata;

pub use cohort::{select_cohort, CategoryAxis, Cohort};
pub use config::{CubeConfig, MissingTilePolicy, PeriodSelector};
pub use coords::{pixel_centers, CoordinateVectors};
pub use error::{CubeError, Result};
pub use filename::{parse_tile_name, TileRecord};
pub use geometry::{Affine, ReferenceGeometry};
pub use grid::{DeferredArray, MissingTile, TileGrid};
pub use pipeline::{run, run_with, RunSummary};
pub use raster::{GdalReader, RasterReader};
pub use writer::{CubeDataset, NetCdfWriter};
