use ::cohort_cube::filename;
use ::cohort_cube::{Affine, CubeConfig, PeriodSelector, RunSummary, TileRecord};
use pyo3::prelude::*;

#[pymodule]
fn cohort_cube(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTileRecord>()?;
    m.add_class::<PyRunSummary>()?;
    m.add_function(wrap_pyfunction!(build_cube, m)?)?;
    m.add_function(wrap_pyfunction!(parse_tile_name, m)?)?;
    m.add_function(wrap_pyfunction!(pixel_centers, m)?)?;
    Ok(())
}

#[pyclass(name = "TileRecord")]
#[derive(Clone)]
pub struct PyTileRecord {
    #[pyo3(get)]
    pub filename: String,
    #[pyo3(get)]
    pub country: String,
    #[pyo3(get)]
    pub gender: String,
    #[pyo3(get)]
    pub age: String,
    #[pyo3(get)]
    pub year: String,
}

impl From<TileRecord> for PyTileRecord {
    fn from(record: TileRecord) -> Self {
        PyTileRecord {
            filename: record.filename,
            country: record.country,
            gender: record.gender,
            age: record.age,
            year: record.year,
        }
    }
}

#[pymethods]
impl PyTileRecord {
    fn __repr__(&self) -> String {
        format!(
            "TileRecord(country='{}', gender='{}', age='{}', year='{}')",
            self.country, self.gender, self.age, self.year
        )
    }
}

#[pyclass(name = "RunSummary")]
#[derive(Clone)]
pub struct PyRunSummary {
    #[pyo3(get)]
    pub output_path: String,
    #[pyo3(get)]
    pub year: String,
    #[pyo3(get)]
    pub genders: Vec<String>,
    #[pyo3(get)]
    pub ages: Vec<String>,
    #[pyo3(get)]
    pub shape: (usize, usize, usize, usize),
    #[pyo3(get)]
    pub unparsed: Vec<String>,
    /// (gender, age) pairs that were filled
    #[pyo3(get)]
    pub missing: Vec<(String, String)>,
    #[pyo3(get)]
    pub rotated: bool,
}

impl From<RunSummary> for PyRunSummary {
    fn from(summary: RunSummary) -> Self {
        let [g, a, y, x] = summary.shape;
        PyRunSummary {
            output_path: summary.output_path.display().to_string(),
            year: summary.year,
            genders: summary.genders,
            ages: summary.ages,
            shape: (g, a, y, x),
            unparsed: summary.unparsed,
            missing: summary
                .missing
                .into_iter()
                .map(|m| (m.gender, m.age))
                .collect(),
            rotated: summary.rotated,
        }
    }
}

#[pymethods]
impl PyRunSummary {
    fn __repr__(&self) -> String {
        format!(
            "RunSummary(year='{}', shape={:?}, missing={}, output='{}')",
            self.year,
            self.shape,
            self.missing.len(),
            self.output_path
        )
    }
}

#[pyfunction]
#[pyo3(signature = (input_dir, output_path, year=None))]
pub fn build_cube(
    py: Python<'_>,
    input_dir: &str,
    output_path: &str,
    year: Option<String>,
) -> PyResult<PyRunSummary> {
    let config = CubeConfig::new(input_dir, output_path).with_period(PeriodSelector::from_option(year));

    // 書き込み中はGILを解放する
    let summary = py.allow_threads(|| ::cohort_cube::run(&config)).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyIOError, _>(format!("Failed to build cube: {}", e))
    })?;

    Ok(PyRunSummary::from(summary))
}

#[pyfunction]
pub fn parse_tile_name(name: &str) -> Option<PyTileRecord> {
    filename::parse_tile_name(name).map(PyTileRecord::from)
}

/// Pixel-centre (x, y) coordinates for a GDAL-ordered geotransform.
#[pyfunction]
pub fn pixel_centers(transform: [f64; 6], rows: usize, cols: usize) -> (Vec<f64>, Vec<f64>) {
    let coords = ::cohort_cube::pixel_centers(&Affine::from_gdal(&transform), rows, cols);
    (coords.x, coords.y)
}
