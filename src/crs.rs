//! Coordinate reference system handling and CF grid-mapping attributes.
//!
//! Everything is read from GDAL's `SpatialRef` once, when the tile is
//! inspected, so the result is plain data that can cross threads. The grid
//! mapping follows the WKT1 projection method and parameter names GDAL
//! reports. Methods without a CF equivalent keep the ellipsoid attributes and
//! rely on `crs_wkt`.

use gdal::errors::Result as GdalResult;
use gdal::spatial_ref::SpatialRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrsKind {
    #[default]
    Unknown,
    Geographic,
    Projected,
}

/// A CRS as canonical WKT plus what the writer needs from it.
///
/// Equality is decided on the canonical WKT only.
#[derive(Debug, Clone, Default)]
pub struct Crs {
    wkt: String,
    authority: Option<String>,
    kind: CrsKind,
    linear_units: Option<String>,
    grid_mapping: Vec<(&'static str, CfAttribute)>,
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.wkt == other.wkt
    }
}

impl Crs {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse `wkt` with GDAL and keep its canonical form.
    pub fn from_wkt(wkt: &str) -> GdalResult<Self> {
        Self::from_spatial_ref(&SpatialRef::from_wkt(wkt)?)
    }

    pub fn from_epsg(code: u32) -> GdalResult<Self> {
        Self::from_spatial_ref(&SpatialRef::from_epsg(code)?)
    }

    pub fn from_spatial_ref(srs: &SpatialRef) -> GdalResult<Self> {
        let wkt = srs.to_wkt()?;
        let kind = if srs.is_geographic() {
            CrsKind::Geographic
        } else if srs.is_projected() {
            CrsKind::Projected
        } else {
            CrsKind::Unknown
        };
        let authority = match (srs.auth_name(), srs.auth_code()) {
            (Some(name), Ok(code)) => Some(format!("{}:{}", name, code)),
            _ => None,
        };
        let linear_units = match kind {
            CrsKind::Projected => srs.linear_units_name().map(|name| cf_length_unit(&name)),
            _ => None,
        };

        let attr = |node: &str, child: usize| srs.get_attr_value(node, child).ok().flatten();
        let param = |name: &str| srs.get_proj_param(name).ok().flatten();
        let projection = attr("PROJECTION", 0);

        let mut grid_mapping = match kind {
            CrsKind::Geographic => vec![("grid_mapping_name", text("latitude_longitude"))],
            CrsKind::Projected => projection
                .as_deref()
                .and_then(|method| projected_grid_mapping(method, &param))
                .unwrap_or_default(),
            CrsKind::Unknown => Vec::new(),
        };

        let ellipsoid = Ellipsoid {
            semi_major: srs.semi_major().ok(),
            semi_minor: srs.semi_minor().ok(),
            inverse_flattening: attr("SPHEROID", 2).and_then(|v| v.trim().parse().ok()),
        };
        grid_mapping.extend(ellipsoid.attributes());
        let prime_meridian = attr("PRIMEM", 1)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(0.0);
        grid_mapping.push(("longitude_of_prime_meridian", CfAttribute::Number(prime_meridian)));

        Ok(Self {
            wkt,
            authority,
            kind,
            linear_units,
            grid_mapping,
        })
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    pub fn is_empty(&self) -> bool {
        self.wkt.is_empty()
    }

    pub fn kind(&self) -> CrsKind {
        self.kind
    }

    pub fn is_geographic(&self) -> bool {
        self.kind == CrsKind::Geographic
    }

    /// CF/UDUNITS spelling of the projected axis unit, e.g. `m` or `US_survey_foot`.
    pub fn linear_units(&self) -> Option<&str> {
        self.linear_units.as_deref()
    }

    /// CF-1.8 grid mapping attributes, in a stable order.
    pub fn grid_mapping(&self) -> &[(&'static str, CfAttribute)] {
        &self.grid_mapping
    }

    pub fn grid_mapping_name(&self) -> Option<&str> {
        self.grid_mapping.iter().find_map(|(key, value)| match (key, value) {
            (&"grid_mapping_name", CfAttribute::Text(name)) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Short human readable form used in log and error messages.
    pub fn describe(&self) -> String {
        if self.is_empty() {
            "<none>".to_string()
        } else if let Some(authority) = &self.authority {
            authority.clone()
        } else {
            self.wkt.chars().take(80).collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CfAttribute {
    Text(String),
    Number(f64),
    Numbers(Vec<f64>),
}

fn text(value: &str) -> CfAttribute {
    CfAttribute::Text(value.to_string())
}

fn cf_length_unit(name: &str) -> String {
    match name.to_ascii_lowercase().as_str() {
        "metre" | "meter" | "m" => "m".to_string(),
        "kilometre" | "kilometer" | "km" => "km".to_string(),
        "us survey foot" | "foot_us" | "us_survey_foot" => "US_survey_foot".to_string(),
        "foot" | "international foot" | "foot (international)" | "ft" => "ft".to_string(),
        _ => name.replace(' ', "_"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ellipsoid {
    semi_major: Option<f64>,
    semi_minor: Option<f64>,
    inverse_flattening: Option<f64>,
}

impl Ellipsoid {
    fn attributes(&self) -> Vec<(&'static str, CfAttribute)> {
        let Some(a) = self.semi_major else {
            return Vec::new();
        };
        let rf = self.inverse_flattening.or_else(|| {
            self.semi_minor
                .map(|b| if (a - b).abs() < 1e-9 { 0.0 } else { a / (a - b) })
        });
        match rf {
            // 球体
            Some(rf) if rf == 0.0 => vec![("earth_radius", CfAttribute::Number(a))],
            Some(rf) => vec![
                ("semi_major_axis", CfAttribute::Number(a)),
                ("inverse_flattening", CfAttribute::Number(rf)),
            ],
            None => vec![("semi_major_axis", CfAttribute::Number(a))],
        }
    }
}

/// CF attributes for a WKT1 projection method, or `None` when CF has no
/// matching grid mapping. `param` looks up a WKT1 projection parameter.
pub fn projected_grid_mapping(
    method: &str,
    param: &dyn Fn(&str) -> Option<f64>,
) -> Option<Vec<(&'static str, CfAttribute)>> {
    let number = |names: &[&str], default: f64| {
        CfAttribute::Number(names.iter().find_map(|name| param(name)).unwrap_or(default))
    };
    let parallels = || {
        let values: Vec<f64> = ["standard_parallel_1", "standard_parallel_2"]
            .iter()
            .filter_map(|name| param(name))
            .collect();
        CfAttribute::Numbers(values)
    };
    let false_origin = || {
        [
            ("false_easting", number(&["false_easting"], 0.0)),
            ("false_northing", number(&["false_northing"], 0.0)),
        ]
    };

    let mut attrs: Vec<(&'static str, CfAttribute)> = match method {
        "Transverse_Mercator" => vec![
            ("grid_mapping_name", text("transverse_mercator")),
            ("longitude_of_central_meridian", number(&["central_meridian"], 0.0)),
            ("latitude_of_projection_origin", number(&["latitude_of_origin"], 0.0)),
            ("scale_factor_at_central_meridian", number(&["scale_factor"], 1.0)),
        ],
        "Mercator_1SP" => vec![
            ("grid_mapping_name", text("mercator")),
            ("longitude_of_projection_origin", number(&["central_meridian"], 0.0)),
            ("scale_factor_at_projection_origin", number(&["scale_factor"], 1.0)),
        ],
        "Mercator_2SP" => vec![
            ("grid_mapping_name", text("mercator")),
            ("longitude_of_projection_origin", number(&["central_meridian"], 0.0)),
            ("standard_parallel", number(&["standard_parallel_1"], 0.0)),
        ],
        "Lambert_Conformal_Conic_1SP" => vec![
            ("grid_mapping_name", text("lambert_conformal_conic")),
            ("standard_parallel", number(&["latitude_of_origin"], 0.0)),
            ("longitude_of_central_meridian", number(&["central_meridian"], 0.0)),
            ("latitude_of_projection_origin", number(&["latitude_of_origin"], 0.0)),
        ],
        "Lambert_Conformal_Conic_2SP" => vec![
            ("grid_mapping_name", text("lambert_conformal_conic")),
            ("standard_parallel", parallels()),
            ("longitude_of_central_meridian", number(&["central_meridian"], 0.0)),
            ("latitude_of_projection_origin", number(&["latitude_of_origin"], 0.0)),
        ],
        "Albers_Conic_Equal_Area" => vec![
            ("grid_mapping_name", text("albers_conical_equal_area")),
            ("standard_parallel", parallels()),
            ("longitude_of_central_meridian", number(&["longitude_of_center", "central_meridian"], 0.0)),
            ("latitude_of_projection_origin", number(&["latitude_of_center", "latitude_of_origin"], 0.0)),
        ],
        "Lambert_Azimuthal_Equal_Area" => vec![
            ("grid_mapping_name", text("lambert_azimuthal_equal_area")),
            ("longitude_of_projection_origin", number(&["longitude_of_center", "central_meridian"], 0.0)),
            ("latitude_of_projection_origin", number(&["latitude_of_center", "latitude_of_origin"], 0.0)),
        ],
        "Azimuthal_Equidistant" => vec![
            ("grid_mapping_name", text("azimuthal_equidistant")),
            ("longitude_of_projection_origin", number(&["longitude_of_center", "central_meridian"], 0.0)),
            ("latitude_of_projection_origin", number(&["latitude_of_center", "latitude_of_origin"], 0.0)),
        ],
        "Polar_Stereographic" => {
            let origin = param("latitude_of_origin").unwrap_or(90.0);
            let mut attrs = vec![
                ("grid_mapping_name", text("polar_stereographic")),
                ("straight_vertical_longitude_from_pole", number(&["central_meridian"], 0.0)),
            ];
            if (origin.abs() - 90.0).abs() < 1e-9 {
                // 極で縮尺係数を与える形式
                attrs.push(("latitude_of_projection_origin", CfAttribute::Number(origin)));
                attrs.push(("scale_factor_at_projection_origin", number(&["scale_factor"], 1.0)));
            } else {
                // 標準緯線で縮尺1となる形式
                attrs.push(("latitude_of_projection_origin", CfAttribute::Number(90.0_f64.copysign(origin))));
                attrs.push(("standard_parallel", CfAttribute::Number(origin)));
            }
            attrs
        }
        "Stereographic" | "Oblique_Stereographic" => vec![
            ("grid_mapping_name", text("stereographic")),
            ("longitude_of_projection_origin", number(&["central_meridian"], 0.0)),
            ("latitude_of_projection_origin", number(&["latitude_of_origin"], 0.0)),
            ("scale_factor_at_projection_origin", number(&["scale_factor"], 1.0)),
        ],
        "Orthographic" => vec![
            ("grid_mapping_name", text("orthographic")),
            ("longitude_of_projection_origin", number(&["central_meridian"], 0.0)),
            ("latitude_of_projection_origin", number(&["latitude_of_origin"], 0.0)),
        ],
        "Sinusoidal" => vec![
            ("grid_mapping_name", text("sinusoidal")),
            ("longitude_of_projection_origin", number(&["longitude_of_center", "central_meridian"], 0.0)),
        ],
        "Cylindrical_Equal_Area" => vec![
            ("grid_mapping_name", text("lambert_cylindrical_equal_area")),
            ("longitude_of_central_meridian", number(&["central_meridian"], 0.0)),
            ("standard_parallel", number(&["standard_parallel_1"], 0.0)),
        ],
        "Hotine_Oblique_Mercator" | "Hotine_Oblique_Mercator_Azimuth_Center" => vec![
            ("grid_mapping_name", text("oblique_mercator")),
            ("azimuth_of_central_line", number(&["azimuth"], 0.0)),
            ("latitude_of_projection_origin", number(&["latitude_of_center"], 0.0)),
            ("longitude_of_projection_origin", number(&["longitude_of_center"], 0.0)),
            ("scale_factor_at_projection_origin", number(&["scale_factor"], 1.0)),
        ],
        "Geostationary_Satellite" => vec![
            ("grid_mapping_name", text("geostationary")),
            ("longitude_of_projection_origin", number(&["central_meridian"], 0.0)),
            ("latitude_of_projection_origin", CfAttribute::Number(0.0)),
            ("perspective_point_height", number(&["satellite_height"], 35785831.0)),
            ("sweep_angle_axis", text("y")),
        ],
        _ => return None,
    };
    attrs.extend(false_origin());
    Some(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(attrs: &'a [(&'static str, CfAttribute)], key: &str) -> Option<&'a CfAttribute> {
        attrs.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    fn number(attrs: &[(&'static str, CfAttribute)], key: &str) -> f64 {
        match lookup(attrs, key) {
            Some(CfAttribute::Number(v)) => *v,
            other => panic!("{} is not a number: {:?}", key, other),
        }
    }

    fn mapping_for(method: &str, params: &[(&str, f64)]) -> Option<Vec<(&'static str, CfAttribute)>> {
        let params: HashMap<&str, f64> = params.iter().copied().collect();
        projected_grid_mapping(method, &|name| params.get(name).copied())
    }

    #[test]
    fn test_geographic_wgs84() {
        let crs = Crs::from_epsg(4326).unwrap();
        assert!(crs.is_geographic());
        assert_eq!(crs.linear_units(), None);
        assert_eq!(crs.describe(), "EPSG:4326");

        let attrs = crs.grid_mapping();
        assert_eq!(crs.grid_mapping_name(), Some("latitude_longitude"));
        assert_eq!(number(attrs, "semi_major_axis"), 6378137.0);
        assert!((number(attrs, "inverse_flattening") - 298.257223563).abs() < 1e-9);
        assert_eq!(number(attrs, "longitude_of_prime_meridian"), 0.0);
    }

    #[test]
    fn test_utm_south() {
        let crs = Crs::from_epsg(32733).unwrap();
        assert_eq!(crs.kind(), CrsKind::Projected);
        assert_eq!(crs.linear_units(), Some("m"));

        let attrs = crs.grid_mapping();
        assert_eq!(crs.grid_mapping_name(), Some("transverse_mercator"));
        assert_eq!(number(attrs, "longitude_of_central_meridian"), 15.0);
        assert_eq!(number(attrs, "scale_factor_at_central_meridian"), 0.9996);
        assert_eq!(number(attrs, "false_northing"), 10000000.0);
    }

    #[test]
    fn test_polar_stereographic_north() {
        // NSIDC 北極域
        let crs = Crs::from_epsg(3413).unwrap();
        let attrs = crs.grid_mapping();
        assert_eq!(crs.grid_mapping_name(), Some("polar_stereographic"));
        assert_eq!(number(attrs, "straight_vertical_longitude_from_pole"), -45.0);
        assert_eq!(number(attrs, "latitude_of_projection_origin"), 90.0);
        assert_eq!(number(attrs, "standard_parallel"), 70.0);
    }

    #[test]
    fn test_sinusoidal_sphere() {
        let srs = SpatialRef::from_proj4(
            "+proj=sinu +lon_0=0 +x_0=0 +y_0=0 +R=6371007.181 +units=m +no_defs",
        )
        .unwrap();
        let crs = Crs::from_spatial_ref(&srs).unwrap();
        let attrs = crs.grid_mapping();
        assert_eq!(crs.grid_mapping_name(), Some("sinusoidal"));
        assert_eq!(number(attrs, "longitude_of_projection_origin"), 0.0);
        assert_eq!(number(attrs, "earth_radius"), 6371007.181);
        assert!(lookup(attrs, "inverse_flattening").is_none());
    }

    #[test]
    fn test_feet_based_projection_units() {
        // NAD83 / California zone 3 (ftUS)
        let crs = Crs::from_epsg(2227).unwrap();
        assert_eq!(crs.linear_units(), Some("US_survey_foot"));
        assert_eq!(crs.grid_mapping_name(), Some("lambert_conformal_conic"));
    }

    #[test]
    fn test_two_standard_parallels() {
        let attrs = mapping_for(
            "Albers_Conic_Equal_Area",
            &[
                ("standard_parallel_1", 29.5),
                ("standard_parallel_2", 45.5),
                ("latitude_of_center", 23.0),
                ("longitude_of_center", -96.0),
            ],
        )
        .unwrap();
        assert_eq!(
            lookup(&attrs, "standard_parallel"),
            Some(&CfAttribute::Numbers(vec![29.5, 45.5]))
        );
        assert_eq!(number(&attrs, "longitude_of_central_meridian"), -96.0);
        assert_eq!(number(&attrs, "false_easting"), 0.0);
    }

    #[test]
    fn test_polar_stereographic_variant_a() {
        let attrs = mapping_for(
            "Polar_Stereographic",
            &[("latitude_of_origin", -90.0), ("scale_factor", 0.994)],
        )
        .unwrap();
        assert_eq!(number(&attrs, "latitude_of_projection_origin"), -90.0);
        assert_eq!(number(&attrs, "scale_factor_at_projection_origin"), 0.994);
        assert!(lookup(&attrs, "standard_parallel").is_none());
    }

    #[test]
    fn test_method_without_cf_mapping() {
        assert!(mapping_for("Robinson", &[]).is_none());

        let crs = Crs::from_wkt(
            &SpatialRef::from_proj4("+proj=robin +datum=WGS84").unwrap().to_wkt().unwrap(),
        )
        .unwrap();
        assert_eq!(crs.grid_mapping_name(), None);
        assert!(lookup(crs.grid_mapping(), "semi_major_axis").is_some());
    }

    #[test]
    fn test_empty_crs() {
        let crs = Crs::empty();
        assert!(crs.is_empty());
        assert_eq!(crs.describe(), "<none>");
        assert!(crs.grid_mapping().is_empty());
    }

    #[test]
    fn test_equality_uses_canonical_wkt() {
        let a = Crs::from_epsg(4326).unwrap();
        let b = Crs::from_wkt(a.wkt()).unwrap();
        let c = Crs::from_epsg(4269).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_wkt_is_an_error() {
        assert!(Crs::from_wkt("NOT A CRS").is_err());
    }
}
