//! Test fixtures: an in-memory raster reader and a small GeoTIFF writer.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use gdal::raster::Buffer;
use gdal::DriverManager;
use num_traits::NumCast;
use tracing_subscriber::fmt::MakeWriter;

use crate::crs::Crs;
use crate::error::{CubeError, Result};
use crate::geometry::Affine;
use crate::raster::{Pixel, PixelType, RasterInfo, RasterReader, Window};

pub(crate) const TEST_NODATA: f64 = -99999.0;

#[derive(Debug, Clone)]
pub(crate) struct TestTile {
    pub rows: usize,
    pub cols: usize,
    pub transform: Affine,
    pub crs: Crs,
    pub pixel_type: PixelType,
    pub nodata: Option<f64>,
    pub values: Vec<f32>,
}

impl TestTile {
    /// A north-up WGS84 tile whose pixels are 1, 2, 3, ... in row-major order.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            transform: Affine::new(0.001, 0.0, 14.0, 0.0, -0.001, 12.0),
            crs: Crs::from_epsg(4326).expect("EPSG:4326 is always available"),
            pixel_type: PixelType::F32,
            nodata: Some(TEST_NODATA),
            values: (1..=rows * cols).map(|v| v as f32).collect(),
        }
    }

    pub fn with_values(mut self, values: Vec<f32>) -> Self {
        assert_eq!(values.len(), self.rows * self.cols);
        self.values = values;
        self
    }

    fn info(&self) -> RasterInfo {
        RasterInfo {
            rows: self.rows,
            cols: self.cols,
            transform: self.transform,
            crs: self.crs.clone(),
            pixel_type: self.pixel_type,
            nodata: self.nodata,
        }
    }
}

/// Serves tiles from memory and counts pixel reads.
pub(crate) struct MemoryReader {
    dir: PathBuf,
    tiles: HashMap<PathBuf, TestTile>,
    broken: HashSet<PathBuf>,
    window_reads: AtomicUsize,
}

impl MemoryReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tiles: HashMap::new(),
            broken: HashSet::new(),
            window_reads: AtomicUsize::new(0),
        }
    }

    pub fn insert(&mut self, name: &str, tile: TestTile) {
        self.tiles.insert(self.dir.join(name), tile);
    }

    /// Header reads succeed but pixel reads fail for `name`.
    pub fn break_reads(&mut self, name: &str) {
        self.broken.insert(self.dir.join(name));
    }

    pub fn window_reads(&self) -> usize {
        self.window_reads.load(Ordering::SeqCst)
    }

    fn tile(&self, path: &Path) -> Result<&TestTile> {
        self.tiles.get(path).ok_or_else(|| {
            CubeError::io(
                path,
                io::Error::new(io::ErrorKind::NotFound, "no test tile"),
            )
        })
    }
}

impl RasterReader for MemoryReader {
    fn inspect(&self, path: &Path) -> Result<RasterInfo> {
        Ok(self.tile(path)?.info())
    }

    fn read_window<T: Pixel>(&self, path: &Path, window: Window) -> Result<Vec<T>> {
        self.window_reads.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(path) {
            return Err(CubeError::io(
                path,
                io::Error::new(io::ErrorKind::UnexpectedEof, "truncated tile"),
            ));
        }

        let tile = self.tile(path)?;
        let mut out = Vec::with_capacity(window.len());
        for row in window.row_off..window.row_off + window.rows {
            let start = row * tile.cols + window.col_off;
            out.extend(
                tile.values[start..start + window.cols]
                    .iter()
                    .map(|&v| <T as NumCast>::from(v).unwrap_or_default()),
            );
        }
        Ok(out)
    }
}

pub(crate) fn gtiff_available() -> bool {
    DriverManager::get_driver_by_name("GTiff").is_ok()
}

/// Write `tile` as a single-band float32 GeoTIFF.
pub(crate) fn write_test_tiff(path: &Path, tile: &TestTile) -> gdal::errors::Result<()> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset = driver.create_with_band_type::<f32, _>(path, tile.cols, tile.rows, 1)?;
    dataset.set_geo_transform(&tile.transform.to_gdal())?;

    dataset.set_projection(tile.crs.wkt())?;

    let mut band = dataset.rasterband(1)?;
    band.set_no_data_value(tile.nodata)?;
    let mut buffer = Buffer::new((tile.cols, tile.rows), tile.values.clone());
    band.write((0, 0), (tile.cols, tile.rows), &mut buffer)?;
    Ok(())
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = SharedBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` on this thread and return the WARN and ERROR lines it logged.
pub(crate) fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    let buffer = SharedBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .without_time()
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);

    let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    (result, output.lines().map(str::to_string).collect())
}
