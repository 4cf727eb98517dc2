use tracing::warn;

use crate::geometry::Affine;

/// Below this magnitude the rotation/shear terms are treated as zero.
pub const ROTATION_EPSILON: f64 = 1e-12;

/// Pixel-centre coordinates of the spatial axes.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateVectors {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// The transform has rotation or shear terms.
    pub rotated: bool,
}

pub fn is_north_up(transform: &Affine) -> bool {
    transform.b.abs() < ROTATION_EPSILON && transform.d.abs() < ROTATION_EPSILON
}

/// Compute pixel-centre x (length `cols`) and y (length `rows`) vectors.
pub fn pixel_centers(transform: &Affine, rows: usize, cols: usize) -> CoordinateVectors {
    let rotated = !is_north_up(transform);
    if rotated {
        warn!(
            "Grid is rotated/sheared (b={}, d={}); viewers expecting north-up grids may misplace it",
            transform.b, transform.d
        );
    }

    let Affine { a, b, c, d, e, f } = *transform;
    let x = (0..cols).map(|i| c + (i as f64 + 0.5) * a + 0.5 * b).collect();
    let y = (0..rows).map(|j| f + (j as f64 + 0.5) * e + 0.5 * d).collect();

    CoordinateVectors { x, y, rotated }
}
