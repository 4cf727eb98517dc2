mod common;

use cohort_cube::{run, CubeConfig, CubeError, PeriodSelector};
use common::{gtiff_available, read_cube, write_tile, GEO_TRANSFORM};
use tempfile::TempDir;

// (ファイル名, 画素の基準値)
const TILES: [(&str, f32); 4] = [
    ("tcd_f_00_2025_CN_100m_R2024B_v1.tif", 10.0),
    ("tcd_f_01_2025_CN_100m_R2024B_v1.tif", 20.0),
    ("tcd_m_00_2025_CN_100m_R2024B_v1.tif", 30.0),
    ("tcd_m_01_2025_CN_100m_R2024B_v1.tif", 40.0),
];

fn slab(base: f32) -> Vec<f32> {
    (0..4).map(|i| base + i as f32).collect()
}

#[test]
fn test_full_coverage_stacks_every_tile() {
    if !gtiff_available() {
        eprintln!("Skipping test: GTiff driver not available");
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("tiles");
    std::fs::create_dir(&input).unwrap();
    for (name, base) in TILES {
        write_tile(&input, name, base, GEO_TRANSFORM);
    }
    let output = temp_dir.path().join("out/cube.nc");

    let summary = run(&CubeConfig::new(&input, &output)).unwrap();
    assert_eq!(summary.shape, [2, 2, 2, 2]);
    assert!(summary.missing.is_empty());
    assert!(summary.unparsed.is_empty());
    assert_eq!(summary.genders, vec!["f", "m"]);
    assert_eq!(summary.ages, vec!["00", "01"]);

    let (shape, values) = read_cube(&output);
    assert_eq!(shape, vec![2, 2, 2, 2]);
    let expected: Vec<f32> = TILES.iter().flat_map(|(_, base)| slab(*base)).collect();
    assert_eq!(values, expected);
}

#[test]
fn test_missing_tile_is_zero_filled() {
    if !gtiff_available() {
        eprintln!("Skipping test: GTiff driver not available");
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("tiles");
    std::fs::create_dir(&input).unwrap();
    for (name, base) in TILES.iter().filter(|(name, _)| !name.starts_with("tcd_f_01")) {
        write_tile(&input, name, *base, GEO_TRANSFORM);
    }
    let output = temp_dir.path().join("cube.nc");

    let summary = run(&CubeConfig::new(&input, &output)).unwrap();
    assert_eq!(summary.shape, [2, 2, 2, 2]);
    assert_eq!(summary.missing.len(), 1);
    assert_eq!(summary.missing[0].gender, "f");
    assert_eq!(summary.missing[0].age, "01");

    let (shape, values) = read_cube(&output);
    assert_eq!(shape, vec![2, 2, 2, 2]);
    assert_eq!(&values[0..4], slab(10.0).as_slice());
    assert_eq!(&values[4..8], &[0.0; 4]);
    assert_eq!(&values[8..12], slab(30.0).as_slice());
    assert_eq!(&values[12..16], slab(40.0).as_slice());
}

#[test]
fn test_shifted_transform_aborts_without_output() {
    if !gtiff_available() {
        eprintln!("Skipping test: GTiff driver not available");
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("tiles");
    std::fs::create_dir(&input).unwrap();
    for (name, base) in TILES {
        let mut geo_transform = GEO_TRANSFORM;
        if name.starts_with("tcd_m_00") {
            geo_transform[0] += 1.0;
        }
        write_tile(&input, name, base, geo_transform);
    }
    let output = temp_dir.path().join("cube.nc");

    let err = run(&CubeConfig::new(&input, &output)).unwrap_err();
    match err {
        CubeError::GeometryMismatch { file, property, .. } => {
            assert_eq!(file, TILES[2].0);
            assert_eq!(property, "transform");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}

#[test]
fn test_explicit_year_and_unparsed_names() {
    if !gtiff_available() {
        eprintln!("Skipping test: GTiff driver not available");
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path();
    write_tile(input, "tcd_f_00_2020.tif", 1.0, GEO_TRANSFORM);
    write_tile(input, "tcd_f_00_2025.tif", 2.0, GEO_TRANSFORM);
    write_tile(input, "landmask.tif", 0.0, GEO_TRANSFORM);
    let output = input.join("out").join("cube_2020.nc");

    let config = CubeConfig::new(input, &output)
        .with_period(PeriodSelector::Explicit("2020".to_string()));
    let summary = run(&config).unwrap();
    assert_eq!(summary.year, "2020");
    assert_eq!(summary.unparsed, vec!["landmask.tif".to_string()]);
    assert_eq!(summary.shape, [1, 1, 2, 2]);

    let (_, values) = read_cube(&output);
    assert_eq!(values, slab(1.0));
}
