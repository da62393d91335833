//! Spline fitting for control-grid resizing
//!
//! Changing the number of columns or rows refits each affected row (or
//! column) of control points with a 1D spline, then samples the spline
//! at arc-length-uniform positions so the new points spread evenly along
//! the curve rather than along its parameter. Grid corners land exactly
//! on the old endpoints; the interior shape is approximated.

use crate::config::Point;
use crate::grid::{ControlGrid, MAX_CONTROL_POINTS};

/// How control points are interpolated, both when refitting the grid
/// and when sampling the mesh between them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Piecewise straight segments
    Linear,
    /// Catmull-Rom cubic segments
    #[default]
    Curved,
}

impl Interpolation {
    pub fn from_linear(linear: bool) -> Self {
        if linear {
            Interpolation::Linear
        } else {
            Interpolation::Curved
        }
    }

    pub fn is_linear(&self) -> bool {
        *self == Interpolation::Linear
    }
}

/// Grid axis selector for resize commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Columns,
    Rows,
}

/// Resample one grid axis to `n` control points. Returns `false` (and
/// leaves the grid untouched) when `n < 2` or the resulting grid would
/// exceed [`MAX_CONTROL_POINTS`].
pub fn resample(grid: &mut ControlGrid, axis: Axis, n: usize, mode: Interpolation) -> bool {
    match axis {
        Axis::Columns => resample_columns(grid, n, mode),
        Axis::Rows => resample_rows(grid, n, mode),
    }
}

/// Resample the grid to `n` columns, preserving its shape
pub fn resample_columns(grid: &mut ControlGrid, n: usize, mode: Interpolation) -> bool {
    let rows = grid.rows();
    if n < 2 || n * rows > MAX_CONTROL_POINTS {
        tracing::debug!("Rejecting column resample to {} ({} rows)", n, rows);
        return false;
    }

    let columns = grid.columns();
    let mut points = vec![Point::default(); n * rows];

    for row in 0..rows {
        let spline = fit_axis(mode, columns, |col| grid.point(col, row as i64));

        let length = spline.length();
        for col in 0..n {
            let t = col as f64 / (n - 1) as f64;
            points[col * rows + row] = spline.point_at_length(length * t);
        }
    }

    grid.replace(n, rows, points);
    true
}

/// Resample the grid to `n` rows, preserving its shape
pub fn resample_rows(grid: &mut ControlGrid, n: usize, mode: Interpolation) -> bool {
    let columns = grid.columns();
    if n < 2 || columns * n > MAX_CONTROL_POINTS {
        tracing::debug!("Rejecting row resample to {} ({} columns)", n, columns);
        return false;
    }

    let rows = grid.rows();
    let mut points = vec![Point::default(); columns * n];

    for col in 0..columns {
        let spline = fit_axis(mode, rows, |row| grid.point(col as i64, row));

        let length = spline.length();
        for row in 0..n {
            let t = row as f64 / (n - 1) as f64;
            points[col * n + row] = spline.point_at_length(length * t);
        }
    }

    grid.replace(columns, n, points);
    true
}

/// Build the 1D spline for one run of `count` control points, where
/// `lookup` resolves an (extrapolating) index along the axis.
fn fit_axis<F>(mode: Interpolation, count: usize, lookup: F) -> ArcSpline
where
    F: Fn(i64) -> Point,
{
    match mode {
        Interpolation::Linear => {
            ArcSpline::polyline((0..count).map(|i| lookup(i as i64)).collect())
        }
        Interpolation::Curved => {
            // Catmull-Rom expressed as a chain of cubic Bezier segments:
            // handles derived from the neighboring knots, mirrored
            // extrapolation supplying the outer neighbors at the ends.
            let mut segments = Vec::with_capacity(count - 1);
            for i in 0..count as i64 - 1 {
                let p0 = lookup(i - 1);
                let p1 = lookup(i);
                let p2 = lookup(i + 1);
                let p3 = lookup(i + 2);

                let b1 = p1 + (p2 - p0) / 6.0;
                let b2 = p2 - (p3 - p1) / 6.0;

                segments.push([p1, b1, b2, p2]);
            }
            ArcSpline::cubic(segments)
        }
    }
}

/// Samples per cubic segment for the arc-length table
const ARC_SAMPLES: usize = 32;

/// Segment of a 1D spline in the plane
enum Segment {
    Line(Point, Point),
    Cubic([Point; 4]),
}

impl Segment {
    fn eval(&self, t: f64) -> Point {
        match self {
            Segment::Line(a, b) => a.lerp(*b, t),
            Segment::Cubic([p0, p1, p2, p3]) => {
                let t2 = t * t;
                let t3 = t2 * t;
                let mt = 1.0 - t;
                let mt2 = mt * mt;
                let mt3 = mt2 * mt;
                *p0 * mt3 + *p1 * (3.0 * mt2 * t) + *p2 * (3.0 * mt * t2) + *p3 * t3
            }
        }
    }

    fn start(&self) -> Point {
        match self {
            Segment::Line(a, _) => *a,
            Segment::Cubic([p0, ..]) => *p0,
        }
    }

    fn end(&self) -> Point {
        match self {
            Segment::Line(_, b) => *b,
            Segment::Cubic([.., p3]) => *p3,
        }
    }
}

/// A piecewise spline with a precomputed arc-length table, so points can
/// be sampled at uniform distances along the curve
struct ArcSpline {
    segments: Vec<Segment>,
    /// (cumulative length, global parameter) pairs, strictly ordered by length
    table: Vec<(f64, f64)>,
}

impl ArcSpline {
    fn polyline(points: Vec<Point>) -> Self {
        let segments = points
            .windows(2)
            .map(|w| Segment::Line(w[0], w[1]))
            .collect();
        Self::build(segments, 1)
    }

    fn cubic(segments: Vec<[Point; 4]>) -> Self {
        Self::build(segments.into_iter().map(Segment::Cubic).collect(), ARC_SAMPLES)
    }

    fn build(segments: Vec<Segment>, samples_per_segment: usize) -> Self {
        let mut table = Vec::with_capacity(segments.len() * samples_per_segment + 1);
        let mut cum = 0.0;
        let mut prev = segments
            .first()
            .map(|s| s.start())
            .unwrap_or_default();
        table.push((0.0, 0.0));

        for (i, seg) in segments.iter().enumerate() {
            for k in 1..=samples_per_segment {
                let t = k as f64 / samples_per_segment as f64;
                let p = seg.eval(t);
                cum += prev.distance(p);
                table.push((cum, i as f64 + t));
                prev = p;
            }
        }

        Self { segments, table }
    }

    /// Total measured curve length
    fn length(&self) -> f64 {
        self.table.last().map(|&(len, _)| len).unwrap_or(0.0)
    }

    /// Point at arc length `s` from the start of the curve. Clamped to
    /// the exact endpoints outside [0, length].
    fn point_at_length(&self, s: f64) -> Point {
        if self.segments.is_empty() {
            return Point::default();
        }
        if s <= 0.0 {
            return self.segments[0].start();
        }
        let total = self.length();
        if s >= total {
            return self.segments[self.segments.len() - 1].end();
        }

        // binary search for the bracketing table entries
        let i = self
            .table
            .partition_point(|&(len, _)| len < s)
            .clamp(1, self.table.len() - 1);
        let (len0, t0) = self.table[i - 1];
        let (len1, t1) = self.table[i];

        let f = if len1 > len0 { (s - len0) / (len1 - len0) } else { 0.0 };
        let t = t0 + (t1 - t0) * f;

        self.eval(t)
    }

    fn eval(&self, t: f64) -> Point {
        let seg = (t.floor() as usize).min(self.segments.len() - 1);
        self.segments[seg].eval(t - seg as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_resample_identity_is_even() {
        // 2x2 identity grid, columns 2 -> 4: every row stays a straight,
        // evenly divided edge
        let mut grid = ControlGrid::new(2, 2);
        assert!(resample_columns(&mut grid, 4, Interpolation::Linear));
        assert_eq!(grid.columns(), 4);
        assert_eq!(grid.rows(), 2);

        for row in 0..2 {
            for col in 0..4 {
                let p = grid.point(col, row);
                assert!((p.x - col as f64 / 3.0).abs() < 1e-12);
                assert!((p.y - row as f64).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_curved_resample_preserves_corners() {
        let mut grid = ControlGrid::new(4, 3);
        grid.set(1, 1, Point::new(0.2, 0.45));
        grid.set(2, 1, Point::new(0.75, 0.3));

        let first: Vec<Point> = (0..3).map(|r| grid.point(0, r)).collect();
        let last: Vec<Point> = (0..3).map(|r| grid.point(3, r)).collect();

        assert!(resample_columns(&mut grid, 7, Interpolation::Curved));
        assert_eq!(grid.columns(), 7);

        for row in 0..3 {
            assert_eq!(grid.point(0, row), first[row as usize]);
            assert_eq!(grid.point(6, row), last[row as usize]);
        }
    }

    #[test]
    fn test_curved_resample_stays_on_straight_edge() {
        // collinear knots stay collinear under Catmull-Rom
        let mut grid = ControlGrid::new(3, 2);
        assert!(resample_columns(&mut grid, 5, Interpolation::Curved));

        for col in 0..5 {
            let p = grid.point(col, 0);
            assert!(p.y.abs() < 1e-9, "point {} drifted off the edge: {:?}", col, p);
        }
    }

    #[test]
    fn test_oversized_resample_is_noop() {
        let mut grid = ControlGrid::new(4, 3);
        grid.set(2, 1, Point::new(0.9, 0.1));
        let before = grid.points().to_vec();

        // 400 * 3 > 1024
        assert!(!resample_columns(&mut grid, 400, Interpolation::Linear));
        assert_eq!(grid.columns(), 4);
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.points(), &before[..]);
    }

    #[test]
    fn test_undersized_resample_is_noop() {
        let mut grid = ControlGrid::new(4, 3);
        let before = grid.points().to_vec();

        assert!(!resample_columns(&mut grid, 1, Interpolation::Curved));
        assert!(!resample_rows(&mut grid, 0, Interpolation::Linear));
        assert_eq!(grid.columns(), 4);
        assert_eq!(grid.points(), &before[..]);
    }

    #[test]
    fn test_row_resample() {
        let mut grid = ControlGrid::new(3, 2);
        assert!(resample(&mut grid, Axis::Rows, 5, Interpolation::Linear));
        assert_eq!(grid.rows(), 5);
        assert_eq!(grid.columns(), 3);

        for row in 0..5 {
            let p = grid.point(1, row);
            assert!((p.x - 0.5).abs() < 1e-12);
            assert!((p.y - row as f64 / 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_arc_length_uniform_on_bent_polyline() {
        // an L-shaped polyline: total length 2, resampled midpoint must sit
        // at the bend
        let spline = ArcSpline::polyline(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
        ]);
        assert!((spline.length() - 2.0).abs() < 1e-12);

        let mid = spline.point_at_length(1.0);
        assert!((mid.x - 1.0).abs() < 1e-12);
        assert!(mid.y.abs() < 1e-12);

        let q = spline.point_at_length(1.5);
        assert!((q.x - 1.0).abs() < 1e-12);
        assert!((q.y - 0.5).abs() < 1e-12);
    }
}
