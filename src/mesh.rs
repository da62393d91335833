//! Mesh tessellation for grid warps
//!
//! Turns a control grid into a renderable triangulated quad mesh. The
//! vertex density follows the content size (or, in adaptive mode, the
//! bounding box of the mapped points), snapped so sample points line up
//! with control-grid spans. Interior positions come from bilinear or
//! bicubic (Catmull-Rom) interpolation of the surrounding control
//! points.

use serde::Serialize;

use crate::config::Point;
use crate::grid::ControlGrid;
use crate::spline::Interpolation;

/// One tessellated vertex: pixel-space position plus normalized texture
/// coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeshVertex {
    pub position: [f64; 2],
    pub texcoord: [f64; 2],
}

/// Triangulated warp mesh, regenerated whenever the grid goes dirty and
/// consumed by the external renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarpMesh {
    /// Vertex count along the grid's column axis
    pub resolution_x: usize,
    /// Vertex count along the grid's row axis
    pub resolution_y: usize,
    /// Vertices, column-major (flat index = x * resolution_y + y)
    pub vertices: Vec<MeshVertex>,
    /// Triangle list, two triangles per quad
    pub indices: Vec<u32>,
}

/// Tessellation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshTessellator {
    /// Quad size in pixels; larger values produce a coarser mesh
    pub resolution: u32,
    /// Derive the vertex counts from the mapped bounding box instead of
    /// the content size
    pub adaptive: bool,
    pub interpolation: Interpolation,
}

impl Default for MeshTessellator {
    fn default() -> Self {
        Self {
            resolution: 16,
            adaptive: false,
            interpolation: Interpolation::default(),
        }
    }
}

impl MeshTessellator {
    /// Compute the snapped vertex counts for a grid at the given content
    /// size
    pub fn vertex_counts(&self, grid: &ControlGrid, width: u32, height: u32) -> (usize, usize) {
        let resolution = self.resolution.max(1) as f64;

        let (quads_x, quads_y) = if self.adaptive {
            let (min, max) = grid.bounds();
            let w = (max.x - min.x) * width as f64;
            let h = (max.y - min.y) * height as f64;
            ((w / resolution) as i64, (h / resolution) as i64)
        } else {
            (
                (width as f64 / resolution) as i64,
                (height as f64 / resolution) as i64,
            )
        };

        let rx = snap(quads_x + 1, grid.columns() as i64);
        let ry = snap(quads_y + 1, grid.rows() as i64);
        (rx as usize, ry as usize)
    }

    /// Tessellate the grid into a vertex/index buffer. Positions are
    /// scaled to pixels by the content size. Deterministic for a given
    /// grid and size.
    pub fn tessellate(&self, grid: &ControlGrid, width: u32, height: u32) -> WarpMesh {
        let (rx, ry) = self.vertex_counts(grid, width, height);
        let columns = grid.columns();
        let rows = grid.rows();

        let mut vertices = Vec::with_capacity(rx * ry);

        for x in 0..rx {
            for y in 0..ry {
                // continuous grid parameter in [0, columns-1] x [0, rows-1]
                let gx = x as f64 * (columns - 1) as f64 / (rx - 1) as f64;
                let gy = y as f64 * (rows - 1) as f64 / (ry - 1) as f64;

                let col = gx.floor() as i64;
                let row = gy.floor() as i64;
                let fx = gx - col as f64;
                let fy = gy - row as f64;

                let p = match self.interpolation {
                    Interpolation::Linear => {
                        let p1 = grid.point(col, row) * (1.0 - fx)
                            + grid.point(col + 1, row) * fx;
                        let p2 = grid.point(col, row + 1) * (1.0 - fx)
                            + grid.point(col + 1, row + 1) * fx;
                        p1 * (1.0 - fy) + p2 * fy
                    }
                    Interpolation::Curved => {
                        // interpolate each column of the 4x4 neighborhood
                        // along y, then the 4 results along x
                        let mut spans = [Point::default(); 4];
                        for (i, span) in spans.iter_mut().enumerate() {
                            let c = col + i as i64 - 1;
                            let knots = [
                                grid.point(c, row - 1),
                                grid.point(c, row),
                                grid.point(c, row + 1),
                                grid.point(c, row + 2),
                            ];
                            *span = cubic_interpolate(&knots, fy);
                        }
                        cubic_interpolate(&spans, fx)
                    }
                };

                vertices.push(MeshVertex {
                    position: [p.x * width as f64, p.y * height as f64],
                    texcoord: [
                        x as f64 / (rx - 1) as f64,
                        y as f64 / (ry - 1) as f64,
                    ],
                });
            }
        }

        let mut indices = Vec::with_capacity(6 * (rx - 1) * (ry - 1));
        for x in 0..rx - 1 {
            for y in 0..ry - 1 {
                let a = (x * ry + y) as u32;
                let b = a + 1;
                let c = a + ry as u32;
                let d = c + 1;
                indices.extend_from_slice(&[a, b, c, b, d, c]);
            }
        }

        WarpMesh {
            resolution_x: rx,
            resolution_y: ry,
            vertices,
            indices,
        }
    }
}

/// Snap a raw vertex count to the nearest value whose span count is a
/// multiple of the control-grid span count, so mesh samples align with
/// control points. Counts at or below the control count collapse to the
/// control count.
fn snap(verts: i64, controls: i64) -> i64 {
    if controls < verts {
        let mut d = (verts - 1) % (controls - 1);
        if d >= controls / 2 {
            d -= controls - 1;
        }
        verts - d
    } else {
        controls
    }
}

/// Catmull-Rom interpolation across 4 knots at parameter `t` in [0, 1],
/// evaluated between `knots[1]` and `knots[2]`
pub(crate) fn cubic_interpolate(knots: &[Point; 4], t: f64) -> Point {
    let [k0, k1, k2, k3] = *knots;

    k1 + (k2 - k0
        + (k0 * 2.0 - k1 * 5.0 + k2 * 4.0 - k3
            + ((k1 - k2) * 3.0 + k3 - k0) * t)
            * t)
        * (0.5 * t)
}
