use std::path::PathBuf;

use crate::error::{CubeError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 4;

/// Which period (year) of tiles to stack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PeriodSelector {
    /// Pick the latest period observed among the parsed filenames.
    #[default]
    Latest,
    Explicit(String),
}

impl PeriodSelector {
    pub fn from_option(period: Option<String>) -> Self {
        match period {
            Some(p) => PeriodSelector::Explicit(p),
            None => PeriodSelector::Latest,
        }
    }
}

/// What to put in slabs that have no backing tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingTilePolicy {
    #[default]
    Zero,
    /// Fill with the reference tile's nodata value (zero when it has none).
    Nodata,
}

#[derive(Debug, Clone)]
pub struct CubeConfig {
    pub input_dir: PathBuf,
    pub output_path: PathBuf,
    pub period: PeriodSelector,
    pub extension: String,
    pub variable_name: String,
    pub units: String,
    pub chunk_size: usize,
    pub compression_level: i32,
    pub missing_policy: MissingTilePolicy,
}

impl CubeConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_path: output_path.into(),
            period: PeriodSelector::Latest,
            extension: "tif".to_string(),
            variable_name: "population".to_string(),
            units: "people".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            missing_policy: MissingTilePolicy::Zero,
        }
    }

    pub fn with_period(mut self, period: PeriodSelector) -> Self {
        self.period = period;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_missing_policy(mut self, policy: MissingTilePolicy) -> Self {
        self.missing_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(CubeError::Config("chunk size must be positive".to_string()));
        }
        if !(0..=9).contains(&self.compression_level) {
            return Err(CubeError::Config(format!(
                "compression level must be between 0 and 9, got {}",
                self.compression_level
            )));
        }
        if self.variable_name.trim().is_empty() {
            return Err(CubeError::Config("variable name must not be empty".to_string()));
        }
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(CubeError::Config("file extension must not be empty".to_string()));
        }
        Ok(())
    }
}
