//! Control-point grid for warp editing
//!
//! A rectangular array of normalized 2D control points, stored
//! column-major (index = col * rows + row). Reads beyond the grid edges
//! return a linear mirror extrapolation, which is what makes spline
//! fitting and bicubic mesh sampling behave at the borders.

use serde::{Deserialize, Serialize};

use crate::config::Point;

/// Upper bound on columns * rows for any grid
pub const MAX_CONTROL_POINTS: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlGrid {
    columns: usize,
    rows: usize,
    /// Control points, column-major: index = col * rows + row
    points: Vec<Point>,
}

impl Default for ControlGrid {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

impl ControlGrid {
    /// Create an identity grid (evenly spaced, no deformation)
    pub fn new(columns: usize, rows: usize) -> Self {
        let mut columns = columns.max(2);
        let mut rows = rows.max(2);
        if columns * rows > MAX_CONTROL_POINTS {
            tracing::warn!(
                "{}x{} grid exceeds {} control points, falling back to 2x2",
                columns,
                rows,
                MAX_CONTROL_POINTS
            );
            columns = 2;
            rows = 2;
        }

        let mut grid = Self {
            columns,
            rows,
            points: Vec::new(),
        };
        grid.reset();
        grid
    }

    /// Rebuild a grid from persisted parts. Returns `None` when the
    /// dimensions or point count are unusable.
    pub fn from_points(columns: usize, rows: usize, points: Vec<Point>) -> Option<Self> {
        if columns < 2 || rows < 2 {
            return None;
        }
        if columns * rows > MAX_CONTROL_POINTS || points.len() != columns * rows {
            return None;
        }
        Some(Self {
            columns,
            rows,
            points,
        })
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Reset all control points to the undistorted, evenly spaced grid
    pub fn reset(&mut self) {
        self.points.clear();
        for col in 0..self.columns {
            for row in 0..self.rows {
                self.points.push(Point::new(
                    col as f64 / (self.columns - 1) as f64,
                    row as f64 / (self.rows - 1) as f64,
                ));
            }
        }
    }

    /// Flat index of a grid position
    pub fn index(&self, col: usize, row: usize) -> usize {
        col * self.rows + row
    }

    /// Look up a control point, extrapolating beyond the grid edges by
    /// mirroring: the out-of-range point is the in-range edge point
    /// reflected through its neighbor. Applied recursively per axis.
    pub fn point(&self, col: i64, row: i64) -> Point {
        let max_col = (self.columns - 1) as i64;
        let max_row = (self.rows - 1) as i64;

        if col < 0 {
            return self.point(0, row) * 2.0 - self.point(-col, row);
        }
        if row < 0 {
            return self.point(col, 0) * 2.0 - self.point(col, -row);
        }
        if col > max_col {
            return self.point(max_col, row) * 2.0 - self.point(2 * max_col - col, row);
        }
        if row > max_row {
            return self.point(col, max_row) * 2.0 - self.point(col, 2 * max_row - row);
        }

        self.points[col as usize * self.rows + row as usize]
    }

    /// Set a control point; writes outside the grid are ignored
    pub fn set(&mut self, col: usize, row: usize, pt: Point) {
        if col >= self.columns || row >= self.rows {
            tracing::debug!("Ignoring write to out-of-range grid cell ({}, {})", col, row);
            return;
        }
        self.points[col * self.rows + row] = pt;
    }

    /// Get a control point by flat index
    pub fn at(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    /// Set a control point by flat index; out-of-range writes are ignored
    pub fn set_at(&mut self, index: usize, pt: Point) -> bool {
        match self.points.get_mut(index) {
            Some(p) => {
                *p = pt;
                true
            }
            None => {
                tracing::debug!("Ignoring write to out-of-range point index {}", index);
                false
            }
        }
    }

    /// Index of the control point closest to `pos` (in pixels), along
    /// with its distance. Points are compared at `point * (width, height)`.
    /// The first minimum in iteration order wins.
    pub fn find_nearest(&self, pos: Point, width: u32, height: u32) -> (usize, f64) {
        let mut index = 0;
        let mut dist = f64::MAX;

        for (i, p) in self.points.iter().enumerate() {
            let (px, py) = p.to_pixels(width, height);
            let d = pos.distance(Point::new(px, py));
            if d < dist {
                dist = d;
                index = i;
            }
        }

        (index, dist)
    }

    /// Flat indices of the 4 grid corners, ordered top-left, top-right,
    /// bottom-right, bottom-left
    pub fn corner_indices(&self) -> [usize; 4] {
        let n = self.columns * self.rows;
        [0, n - self.rows, n - 1, self.rows - 1]
    }

    /// Bounding box of the current points (normalized)
    pub fn bounds(&self) -> (Point, Point) {
        let mut min = Point::new(f64::MAX, f64::MAX);
        let mut max = Point::new(f64::MIN, f64::MIN);
        for p in &self.points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }

    /// Reverse the column order of the control points
    pub fn flip_horizontal(&mut self) {
        let mut points = Vec::with_capacity(self.points.len());
        for col in (0..self.columns).rev() {
            for row in 0..self.rows {
                points.push(self.points[col * self.rows + row]);
            }
        }
        self.points = points;
    }

    /// Reverse the row order of the control points
    pub fn flip_vertical(&mut self) {
        let mut points = Vec::with_capacity(self.points.len());
        for col in 0..self.columns {
            for row in (0..self.rows).rev() {
                points.push(self.points[col * self.rows + row]);
            }
        }
        self.points = points;
    }

    /// Atomically replace the points and one axis count. Used by the
    /// spline resampler; `points.len()` must equal `columns * rows`.
    pub(crate) fn replace(&mut self, columns: usize, rows: usize, points: Vec<Point>) {
        debug_assert_eq!(points.len(), columns * rows);
        self.columns = columns;
        self.rows = rows;
        self.points = points;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_is_identity() {
        for (cols, rows) in [(2, 2), (4, 3), (5, 5)] {
            let grid = ControlGrid::new(cols, rows);
            for col in 0..cols {
                for row in 0..rows {
                    let p = grid.point(col as i64, row as i64);
                    assert_eq!(p.x, col as f64 / (cols - 1) as f64);
                    assert_eq!(p.y, row as f64 / (rows - 1) as f64);
                }
            }
        }
    }

    #[test]
    fn test_mirror_extrapolation() {
        let mut grid = ControlGrid::new(4, 3);
        // deform a bit so the mirror is non-trivial
        grid.set(1, 1, Point::new(0.4, 0.55));
        grid.set(0, 1, Point::new(-0.05, 0.5));

        for row in 0..3 {
            let expect = grid.point(0, row) * 2.0 - grid.point(1, row);
            let got = grid.point(-1, row);
            assert!((got.x - expect.x).abs() < 1e-12);
            assert!((got.y - expect.y).abs() < 1e-12);
        }

        // beyond the far edge
        let expect = grid.point(3, 1) * 2.0 - grid.point(2, 1);
        let got = grid.point(4, 1);
        assert!((got.x - expect.x).abs() < 1e-12);
        assert!((got.y - expect.y).abs() < 1e-12);

        // both axes out of range at once
        let _ = grid.point(-2, 5);
    }

    #[test]
    fn test_out_of_range_write_is_noop() {
        let mut grid = ControlGrid::new(3, 3);
        let before = grid.points().to_vec();
        grid.set(3, 0, Point::new(9.0, 9.0));
        grid.set(0, 7, Point::new(9.0, 9.0));
        assert!(!grid.set_at(9, Point::new(9.0, 9.0)));
        assert_eq!(grid.points(), &before[..]);
    }

    #[test]
    fn test_find_nearest_first_minimum_wins() {
        let mut grid = ControlGrid::new(2, 2);
        // two points equidistant from the probe: index 1 (0,1) and index 2 (1,0)
        let (index, dist) = grid.find_nearest(Point::new(50.0, 50.0), 100, 100);
        assert_eq!(index, 0, "probe at center is closest to all 4, first wins");
        assert!((dist - (50.0f64 * 50.0 + 50.0 * 50.0).sqrt()).abs() < 1e-9);

        grid.set(0, 0, Point::new(0.9, 0.9));
        let (index, _) = grid.find_nearest(Point::new(95.0, 95.0), 100, 100);
        assert_eq!(index, 0);
    }

    #[test]
    fn test_corner_indices() {
        let grid = ControlGrid::new(4, 3);
        // column-major: TL=0, TR=(cols-1)*rows, BR=n-1, BL=rows-1
        assert_eq!(grid.corner_indices(), [0, 9, 11, 2]);
    }

    #[test]
    fn test_flips_are_self_inverse() {
        let mut grid = ControlGrid::new(3, 4);
        grid.set(1, 2, Point::new(0.3, 0.8));
        let before = grid.points().to_vec();

        grid.flip_horizontal();
        assert_ne!(grid.points(), &before[..]);
        grid.flip_horizontal();
        assert_eq!(grid.points(), &before[..]);

        grid.flip_vertical();
        grid.flip_vertical();
        assert_eq!(grid.points(), &before[..]);
    }

    #[test]
    fn test_from_points_validates() {
        let pts = vec![Point::default(); 6];
        assert!(ControlGrid::from_points(3, 2, pts.clone()).is_some());
        assert!(ControlGrid::from_points(3, 3, pts.clone()).is_none());
        assert!(ControlGrid::from_points(1, 6, pts).is_none());
    }

    #[test]
    fn test_oversized_grid_falls_back() {
        let grid = ControlGrid::new(64, 64);
        assert_eq!(grid.columns(), 2);
        assert_eq!(grid.rows(), 2);
    }
}
