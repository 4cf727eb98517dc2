use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use tracing::{info, warn};

use crate::error::{CubeError, Result};

/// Metadata carried by a tile's filename, e.g. `tcd_f_00_2025_CN_100m_R2024B_v1.tif`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRecord {
    pub filename: String,
    pub country: String,
    /// Lower-cased single letter code.
    pub gender: String,
    /// Two digit age band, kept as written (leading zeros preserved).
    pub age: String,
    pub year: String,
}

/// Compiled filename pattern for one input extension.
#[derive(Debug, Clone)]
pub struct TileNamePattern {
    regex: Regex,
}

impl TileNamePattern {
    pub fn new(extension: &str) -> Result<Self> {
        let ext = regex::escape(extension.trim_start_matches('.'));
        let pattern = format!(
            r"^(?P<country>[a-z]{{3}})[_-](?P<gender>[a-z])[_-](?P<age>\d{{2}})[_-](?P<year>\d{{4}})(?:[_-].+)?\.{ext}$"
        );
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| CubeError::Config(format!("invalid extension {extension:?}: {e}")))?;
        Ok(Self { regex })
    }

    pub fn parse(&self, filename: &str) -> Option<TileRecord> {
        let caps = self.regex.captures(filename)?;
        Some(TileRecord {
            filename: filename.to_string(),
            country: caps["country"].to_lowercase(),
            gender: caps["gender"].to_lowercase(),
            age: caps["age"].to_string(),
            year: caps["year"].to_string(),
        })
    }
}

/// Parse a `.tif` tile name with the default pattern.
pub fn parse_tile_name(filename: &str) -> Option<TileRecord> {
    static DEFAULT: OnceLock<TileNamePattern> = OnceLock::new();
    DEFAULT
        .get_or_init(|| TileNamePattern::new("tif").expect("default tile pattern compiles"))
        .parse(filename)
}

#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub records: Vec<TileRecord>,
    /// Names with the right extension that did not match the pattern.
    pub unparsed: Vec<String>,
}

pub fn classify<S: AsRef<str>>(names: &[S], pattern: &TileNamePattern) -> Result<Classification> {
    let mut classification = Classification::default();
    for name in names {
        let name = name.as_ref();
        match pattern.parse(name) {
            Some(record) => classification.records.push(record),
            None => classification.unparsed.push(name.to_string()),
        }
    }

    if !classification.unparsed.is_empty() {
        warn!(
            "Skipped {} files not matching the naming pattern: {:?}",
            classification.unparsed.len(),
            classification.unparsed
        );
    }
    if classification.records.is_empty() {
        return Err(CubeError::NoParsedTiles {
            scanned: names.len(),
        });
    }

    info!("Parsed {} tile names", classification.records.len());
    Ok(classification)
}

/// List the files directly under `dir` whose extension matches (case-insensitive), sorted by name.
pub fn scan_directory(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let extension = extension.trim_start_matches('.');
    let mut names = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| CubeError::io(dir, e))? {
        let entry = entry.map_err(|e| CubeError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if !matches {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
            names.push(name.to_string());
        }
    }

    names.sort();
    info!("Found {} .{} files in {:?}", names.len(), extension, dir);

    if names.is_empty() {
        return Err(CubeError::InputAbsent {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }
    Ok(names)
}
