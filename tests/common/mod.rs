use std::path::Path;

use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;

/// GDAL order: origin x, pixel width, row rotation, origin y, column rotation, pixel height.
pub const GEO_TRANSFORM: [f64; 6] = [14.0, 0.001, 0.0, 12.0, 0.0, -0.001];

pub fn gtiff_available() -> bool {
    DriverManager::get_driver_by_name("GTiff").is_ok()
}

/// Write a 2x2 float32 EPSG:4326 tile whose pixels are `base + 0..4`.
pub fn write_tile(dir: &Path, name: &str, base: f32, geo_transform: [f64; 6]) {
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut dataset = driver
        .create_with_band_type::<f32, _>(dir.join(name), 2, 2, 1)
        .unwrap();
    dataset.set_geo_transform(&geo_transform).unwrap();
    let srs = SpatialRef::from_epsg(4326).unwrap();
    dataset.set_projection(&srs.to_wkt().unwrap()).unwrap();

    let mut band = dataset.rasterband(1).unwrap();
    band.set_no_data_value(Some(-99999.0)).unwrap();
    let mut buffer = Buffer::new((2, 2), (0..4).map(|i| base + i as f32).collect::<Vec<f32>>());
    band.write((0, 0), (2, 2), &mut buffer).unwrap();
}

pub fn read_cube(path: &Path) -> (Vec<usize>, Vec<f32>) {
    let file = netcdf::open(path).unwrap();
    let var = file.variable("population").unwrap();
    let shape = var.dimensions().iter().map(|d| d.len()).collect();
    let values: Vec<f32> = var.get_values(..).unwrap();
    (shape, values)
}
