//! Perspective (homography) transform between two quadrilaterals
//!
//! Maps an axis-aligned source rectangle onto an arbitrary destination
//! quad. The eight homography coefficients come from a 2-rows-per-corner
//! linear system solved by Gaussian elimination with partial pivoting,
//! then get embedded into a 4x4 matrix (identity on the unused z axis)
//! so the renderer can push it as a plain transform. The forward and
//! inverse matrices are cached and recomputed lazily when marked dirty.

use nalgebra::{Matrix4, Vector4};

use crate::config::Point;
use crate::error::WarpError;

/// Pivots below this fraction of the system's magnitude mean the corner
/// correspondences are (nearly) collinear and the system has no usable
/// solution
const PIVOT_EPSILON: f64 = 1e-10;

/// Guard for the homogeneous divide
const W_EPSILON: f64 = 1e-10;

/// Cached perspective transform from a source rectangle to a destination
/// quad, both in pixel space
#[derive(Debug, Clone)]
pub struct PerspectiveTransform {
    /// Axis-aligned content rectangle corners: TL, TR, BR, BL
    source: [Point; 4],
    /// Pixel positions of the 4 mapped corners
    destination: [Point; 4],
    transform: Matrix4<f64>,
    inverse: Matrix4<f64>,
    dirty: bool,
}

impl PerspectiveTransform {
    /// Identity transform over a content rectangle
    pub fn new(width: u32, height: u32) -> Self {
        let source = rect_corners(width, height);
        Self {
            source,
            destination: source,
            transform: Matrix4::identity(),
            inverse: Matrix4::identity(),
            dirty: false,
        }
    }

    /// Resize the source content rectangle
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.source = rect_corners(width, height);
        self.dirty = true;
    }

    pub fn source(&self) -> &[Point; 4] {
        &self.source
    }

    pub fn destination(&self) -> &[Point; 4] {
        &self.destination
    }

    /// Move one destination corner (pixels). Out-of-range indices are
    /// ignored.
    pub fn set_destination(&mut self, index: usize, pos: Point) -> bool {
        if index >= 4 {
            tracing::debug!("Ignoring write to perspective corner {}", index);
            return false;
        }
        self.destination[index] = pos;
        self.dirty = true;
        true
    }

    /// Replace all four destination corners (pixels)
    pub fn set_destinations(&mut self, corners: [Point; 4]) {
        self.destination = corners;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Recompute the cached matrices if dirty. On a degenerate corner
    /// layout the previous matrices are kept, the transform stays dirty,
    /// and the error is returned so a later corner edit can recover.
    pub fn update(&mut self) -> Result<(), WarpError> {
        if !self.dirty {
            return Ok(());
        }

        let transform = perspective_matrix(&self.source, &self.destination)?;
        let inverse = transform
            .try_inverse()
            .ok_or(WarpError::DegenerateHomography)?;

        self.transform = transform;
        self.inverse = inverse;
        self.dirty = false;
        Ok(())
    }

    /// Current forward matrix, recomputed lazily
    pub fn matrix(&mut self) -> Matrix4<f64> {
        self.refresh();
        self.transform
    }

    /// Current inverse matrix, recomputed lazily. Maps pixel coordinates
    /// back into source space (e.g. to translate a drag position into a
    /// grid-local point).
    pub fn inverse(&mut self) -> Matrix4<f64> {
        self.refresh();
        self.inverse
    }

    /// Transform a source-space point to destination space
    pub fn transform_point(&mut self, p: Point) -> Point {
        self.refresh();
        apply(&self.transform, p)
    }

    /// Transform a destination-space point back to source space
    pub fn inverse_transform_point(&mut self, p: Point) -> Point {
        self.refresh();
        apply(&self.inverse, p)
    }

    fn refresh(&mut self) {
        if let Err(e) = self.update() {
            tracing::warn!("Keeping previous perspective transform: {}", e);
        }
    }
}

/// Corners of an axis-aligned rectangle: TL, TR, BR, BL
fn rect_corners(width: u32, height: u32) -> [Point; 4] {
    let (w, h) = (width as f64, height as f64);
    [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ]
}

/// Compute the 4x4 perspective matrix mapping `src[i]` to `dst[i]`.
/// Each correspondence contributes two rows of an 8x9 augmented system;
/// the solved coefficients (a..h) form the projective map
/// `x' = (ax + by + c) / (gx + hy + 1)`, `y' = (dx + ey + f) / (gx + hy + 1)`.
pub fn perspective_matrix(src: &[Point; 4], dst: &[Point; 4]) -> Result<Matrix4<f64>, WarpError> {
    let mut p = [[0.0f64; 9]; 8];

    for i in 0..4 {
        let (sx, sy) = (src[i].x, src[i].y);
        let (dx, dy) = (dst[i].x, dst[i].y);

        p[2 * i] = [-sx, -sy, -1.0, 0.0, 0.0, 0.0, sx * dx, sy * dx, -dx];
        p[2 * i + 1] = [0.0, 0.0, 0.0, -sx, -sy, -1.0, sx * dy, sy * dy, -dy];
    }

    gaussian_elimination(&mut p)?;

    let (a, b, c) = (p[0][8], p[1][8], p[2][8]);
    let (d, e, f) = (p[3][8], p[4][8], p[5][8]);
    let (g, h) = (p[6][8], p[7][8]);

    Ok(Matrix4::new(
        a, b, 0.0, c, //
        d, e, 0.0, f, //
        0.0, 0.0, 1.0, 0.0, //
        g, h, 0.0, 1.0,
    ))
}

/// Row-reduce the 8x9 augmented system in place, leaving the solution in
/// the last column. Partial pivoting; a near-zero pivot reports the
/// degenerate-corner condition instead of dividing through by it.
fn gaussian_elimination(a: &mut [[f64; 9]; 8]) -> Result<(), WarpError> {
    let rows = 8;

    // pivot tolerance relative to the system's magnitude, so rounding
    // residue on pixel-scale entries still reads as zero
    let scale = a
        .iter()
        .flatten()
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    let tolerance = PIVOT_EPSILON * scale.max(1.0);

    for col in 0..rows {
        // pick the largest pivot in this column
        let mut max_row = col;
        for row in col + 1..rows {
            if a[row][col].abs() > a[max_row][col].abs() {
                max_row = row;
            }
        }

        if a[max_row][col].abs() < tolerance {
            return Err(WarpError::DegenerateHomography);
        }

        if max_row != col {
            a.swap(col, max_row);
        }

        // normalize the pivot row
        let pivot = a[col][col];
        for k in 0..9 {
            a[col][k] /= pivot;
        }

        // eliminate below
        for row in col + 1..rows {
            let factor = a[row][col];
            for k in 0..9 {
                a[row][k] -= factor * a[col][k];
            }
        }
    }

    // back-substitute from the last row upward
    for i in (0..rows - 1).rev() {
        for j in i + 1..rows {
            a[i][8] -= a[i][j] * a[j][8];
        }
    }

    Ok(())
}

/// Apply a 4x4 perspective matrix to a 2D point with a homogeneous
/// divide. Points at w ~ 0 are returned unchanged.
pub fn apply(m: &Matrix4<f64>, p: Point) -> Point {
    let v = m * Vector4::new(p.x, p.y, 0.0, 1.0);
    if v.w.abs() < W_EPSILON {
        return p;
    }
    Point::new(v.x / v.w, v.y / v.w)
}
