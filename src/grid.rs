//! Deferred 4-D (gender × age × y × x) array over scattered tiles.
//!
//! Building the grid only records, for every (gender, age) pair, where its
//! slab comes from: a tile on disk or a constant fill. Pixels are produced one
//! chunk at a time by [`DeferredArray::materialize`], which the writer calls
//! during the streamed write. A chunk never spans two slabs, so each
//! materialisation is a single windowed read or a single fill.

use std::ops::Range;
use std::path::{Path, PathBuf};

use num_traits::NumCast;
use tracing::{info, warn};

use crate::cohort::Cohort;
use crate::config::MissingTilePolicy;
use crate::error::Result;
use crate::geometry::ReferenceGeometry;
use crate::raster::{Pixel, PixelType, RasterReader, Window};

#[derive(Debug, Clone, PartialEq)]
pub enum SlabSource {
    /// Read band 1 of this file when the chunk is requested.
    Read(PathBuf),
    /// No tile for this combination; emit the fill value.
    Fill,
}

/// Position of one chunk: slab indices plus spatial block indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub gender: usize,
    pub age: usize,
    pub row_block: usize,
    pub col_block: usize,
}

#[derive(Debug, Clone)]
pub struct Chunk<T> {
    pub key: ChunkKey,
    pub window: Window,
    pub data: Vec<T>,
}

impl<T> Chunk<T> {
    /// Index ranges of this chunk in the 4-D array.
    pub fn extents(&self) -> [Range<usize>; 4] {
        [
            self.key.gender..self.key.gender + 1,
            self.key.age..self.key.age + 1,
            self.window.row_off..self.window.row_off + self.window.rows,
            self.window.col_off..self.window.col_off + self.window.cols,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct DeferredArray {
    genders: usize,
    ages: usize,
    rows: usize,
    cols: usize,
    chunk_size: usize,
    pixel_type: PixelType,
    fill_value: f64,
    // 性別が外側、年齢が内側の順
    slabs: Vec<SlabSource>,
}

impl DeferredArray {
    pub fn shape(&self) -> [usize; 4] {
        [self.genders, self.ages, self.rows, self.cols]
    }

    /// Storage chunk shape: one slab deep, `chunk_size` square, clipped to the raster.
    pub fn chunk_shape(&self) -> [usize; 4] {
        [
            1,
            1,
            self.chunk_size.min(self.rows).max(1),
            self.chunk_size.min(self.cols).max(1),
        ]
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    pub fn fill_value(&self) -> f64 {
        self.fill_value
    }

    pub fn slab(&self, gender: usize, age: usize) -> &SlabSource {
        &self.slabs[gender * self.ages + age]
    }

    pub fn blocks(&self) -> (usize, usize) {
        (
            self.rows.div_ceil(self.chunk_size),
            self.cols.div_ceil(self.chunk_size),
        )
    }

    pub fn chunk_count(&self) -> usize {
        let (row_blocks, col_blocks) = self.blocks();
        self.genders * self.ages * row_blocks * col_blocks
    }

    /// All chunk keys in (gender, age, row block, column block) order.
    pub fn chunks(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        let (row_blocks, col_blocks) = self.blocks();
        (0..self.genders).flat_map(move |gender| {
            (0..self.ages).flat_map(move |age| {
                (0..row_blocks).flat_map(move |row_block| {
                    (0..col_blocks).map(move |col_block| ChunkKey {
                        gender,
                        age,
                        row_block,
                        col_block,
                    })
                })
            })
        })
    }

    pub fn window(&self, key: ChunkKey) -> Window {
        let row_off = key.row_block * self.chunk_size;
        let col_off = key.col_block * self.chunk_size;
        Window {
            row_off,
            col_off,
            rows: self.chunk_size.min(self.rows - row_off),
            cols: self.chunk_size.min(self.cols - col_off),
        }
    }

    /// Produce the pixels of one chunk, reading from disk if the slab is backed by a tile.
    pub fn materialize<T: Pixel, R: RasterReader>(&self, reader: &R, key: ChunkKey) -> Result<Chunk<T>> {
        let window = self.window(key);
        let data = match self.slab(key.gender, key.age) {
            SlabSource::Read(path) => reader.read_window::<T>(path, window)?,
            SlabSource::Fill => {
                let fill = <T as NumCast>::from(self.fill_value).unwrap_or_default();
                vec![fill; window.len()]
            }
        };
        Ok(Chunk { key, window, data })
    }
}

/// A (gender, age) combination with no backing tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTile {
    pub gender: String,
    pub age: String,
}

#[derive(Debug, Clone)]
pub struct TileGrid {
    pub array: DeferredArray,
    pub missing: Vec<MissingTile>,
}

/// Resolve every (gender, age) pair to a deferred slab. Performs no pixel I/O.
pub fn build_grid(
    cohort: &Cohort,
    reference: &ReferenceGeometry,
    input_dir: &Path,
    chunk_size: usize,
    policy: MissingTilePolicy,
) -> TileGrid {
    let fill_value = match policy {
        MissingTilePolicy::Zero => 0.0,
        MissingTilePolicy::Nodata => reference.nodata.unwrap_or_else(|| {
            warn!(
                "Reference tile {} has no nodata value; missing tiles are zero-filled",
                reference.source
            );
            0.0
        }),
    };

    let mut slabs = Vec::with_capacity(cohort.genders.len() * cohort.ages.len());
    let mut missing = Vec::new();

    for gender in &cohort.genders.labels {
        for age in &cohort.ages.labels {
            match cohort.tile(gender, age) {
                Some(filename) => slabs.push(SlabSource::Read(input_dir.join(filename))),
                None => {
                    warn!("MISSING tile gender={}, age={}", gender, age);
                    missing.push(MissingTile {
                        gender: gender.clone(),
                        age: age.clone(),
                    });
                    slabs.push(SlabSource::Fill);
                }
            }
        }
    }

    let array = DeferredArray {
        genders: cohort.genders.len(),
        ages: cohort.ages.len(),
        rows: reference.rows,
        cols: reference.cols,
        chunk_size: chunk_size.max(1),
        pixel_type: reference.pixel_type,
        fill_value,
        slabs,
    };
    info!(
        "Deferred array shape={:?}, chunks={:?}, {} chunks total, {} missing tiles",
        array.shape(),
        array.chunk_shape(),
        array.chunk_count(),
        missing.len()
    );

    TileGrid { array, missing }
}
