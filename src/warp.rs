//! Warp variants and control-point routing
//!
//! Three warp flavors share one capability set: a grid warp deforming
//! the interior of the content, a perspective warp mapping the content
//! rectangle onto an arbitrary quad, and a composite that layers the
//! perspective transform over the grid. The composite routes each
//! control-point operation by index: the 4 grid corners belong to the
//! perspective warp, everything else to the grid, with coordinates
//! translated through the forward or inverse homography.
//!
//! Renderer contract for the composite: apply the perspective matrix as
//! the enclosing coordinate frame, draw the tessellated mesh inside it,
//! restore the frame.

use nalgebra::Matrix4;

use crate::blend::{DisplayColor, EdgeBlend};
use crate::config::{Point, WarpMethod, WarpSettings};
use crate::grid::ControlGrid;
use crate::mesh::{MeshTessellator, WarpMesh};
use crate::spline::{self, Axis, Interpolation};
use crate::transform::{self, PerspectiveTransform};
use crate::error::WarpError;
use crate::session::EditSession;

/// Grid-deforming warp: control points move the content interior, the
/// tessellated mesh is rebuilt lazily when the grid is dirty
#[derive(Debug, Clone)]
pub struct BilinearWarp {
    grid: ControlGrid,
    width: u32,
    height: u32,
    resolution: u32,
    interpolation: Interpolation,
    adaptive: bool,
    blend: EdgeBlend,
    color: DisplayColor,
    selected: Option<usize>,
    dirty: bool,
    mesh: Option<WarpMesh>,
}

impl BilinearWarp {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            grid: ControlGrid::default(),
            width,
            height,
            resolution: 16,
            interpolation: Interpolation::default(),
            adaptive: false,
            blend: EdgeBlend::default(),
            color: DisplayColor::default(),
            selected: None,
            dirty: true,
            mesh: None,
        }
    }

    pub fn grid(&self) -> &ControlGrid {
        &self.grid
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Reset control points to the undistorted image
    pub fn reset(&mut self) {
        self.grid.reset();
        self.dirty = true;
    }

    fn tessellator(&self) -> MeshTessellator {
        MeshTessellator {
            resolution: self.resolution,
            adaptive: self.adaptive,
            interpolation: self.interpolation,
        }
    }

    /// Current mesh, rebuilt only when dirty; a clean request returns
    /// the cached buffers untouched
    pub fn mesh(&mut self) -> &WarpMesh {
        if self.dirty || self.mesh.is_none() {
            self.mesh = Some(self.tessellator().tessellate(&self.grid, self.width, self.height));
            self.dirty = false;
        }
        self.mesh.as_ref().unwrap()
    }

    pub fn control_point(&self, index: usize) -> Option<Point> {
        self.grid.at(index)
    }

    pub fn set_control_point(&mut self, index: usize, pos: Point) -> bool {
        if self.grid.set_at(index, pos) {
            self.dirty = true;
            true
        } else {
            false
        }
    }

    pub fn move_control_point(&mut self, index: usize, shift: Point) -> bool {
        match self.grid.at(index) {
            Some(p) => self.set_control_point(index, p + shift),
            None => false,
        }
    }

    pub fn find_control_point(&self, pos: Point) -> (usize, f64) {
        self.grid.find_nearest(pos, self.width, self.height)
    }

    pub fn select_control_point(&mut self, index: usize) -> bool {
        if index >= self.grid.len() {
            return false;
        }
        self.selected = Some(index);
        true
    }

    pub fn deselect_control_point(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Resample the grid to `n` columns; silently rejected when out of
    /// bounds
    pub fn set_columns(&mut self, n: usize) -> bool {
        let ok = spline::resample_columns(&mut self.grid, n, self.interpolation);
        if ok {
            self.dirty = true;
        }
        ok
    }

    /// Resample the grid to `n` rows; silently rejected when out of
    /// bounds
    pub fn set_rows(&mut self, n: usize) -> bool {
        let ok = spline::resample_rows(&mut self.grid, n, self.interpolation);
        if ok {
            self.dirty = true;
        }
        ok
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn set_resolution(&mut self, resolution: u32) {
        self.resolution = resolution.max(1);
        self.dirty = true;
    }

    /// Step to a finer mesh (smaller quads), bounded at 4 px
    pub fn finer(&mut self) {
        if self.resolution > 4 {
            self.resolution -= 4;
            self.dirty = true;
        }
    }

    /// Step to a coarser mesh (larger quads), bounded at 64 px
    pub fn coarser(&mut self) {
        if self.resolution < 64 {
            self.resolution += 4;
            self.dirty = true;
        }
    }

    pub fn adaptive(&self) -> bool {
        self.adaptive
    }

    pub fn set_adaptive(&mut self, adaptive: bool) {
        self.adaptive = adaptive;
        self.dirty = true;
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn set_interpolation(&mut self, mode: Interpolation) {
        self.interpolation = mode;
        self.dirty = true;
    }

    pub fn toggle_interpolation(&mut self) {
        self.set_interpolation(match self.interpolation {
            Interpolation::Linear => Interpolation::Curved,
            Interpolation::Curved => Interpolation::Linear,
        });
    }

    /// Mirror the control points left-right
    pub fn flip_horizontal(&mut self) {
        self.grid.flip_horizontal();
        self.dirty = true;
    }

    /// Mirror the control points top-bottom
    pub fn flip_vertical(&mut self) {
        self.grid.flip_vertical();
        self.dirty = true;
    }

    pub fn blend(&self) -> &EdgeBlend {
        &self.blend
    }

    pub fn blend_mut(&mut self) -> &mut EdgeBlend {
        &mut self.blend
    }

    pub fn color(&self) -> &DisplayColor {
        &self.color
    }

    pub fn color_mut(&mut self) -> &mut DisplayColor {
        &mut self.color
    }

    pub fn to_settings(&self) -> WarpSettings {
        WarpSettings {
            method: WarpMethod::Bilinear,
            columns: self.grid.columns(),
            rows: self.grid.rows(),
            points: self.grid.points().to_vec(),
            corners: None,
            resolution: self.resolution,
            linear: self.interpolation.is_linear(),
            adaptive: self.adaptive,
            blend: self.blend,
            color: self.color,
        }
    }

    pub fn from_settings(settings: &WarpSettings, width: u32, height: u32) -> Self {
        let mut warp = Self::new(width, height);
        warp.resolution = settings.resolution.max(1);
        warp.interpolation = Interpolation::from_linear(settings.linear);
        warp.adaptive = settings.adaptive;
        warp.blend = settings.blend;
        warp.color = settings.color;

        match ControlGrid::from_points(settings.columns, settings.rows, settings.points.clone()) {
            Some(grid) => warp.grid = grid,
            None => {
                tracing::warn!(
                    "Unusable {}x{} grid with {} point(s), resetting to identity",
                    settings.columns,
                    settings.rows,
                    settings.points.len()
                );
            }
        }
        warp
    }
}

/// Four-corner perspective warp over the whole content rectangle
#[derive(Debug, Clone)]
pub struct PerspectiveWarp {
    /// Normalized destination corners: TL, TR, BR, BL
    corners: [Point; 4],
    transform: PerspectiveTransform,
    width: u32,
    height: u32,
    blend: EdgeBlend,
    color: DisplayColor,
    selected: Option<usize>,
    dirty: bool,
}

const UNIT_CORNERS: [Point; 4] = [
    Point { x: 0.0, y: 0.0 },
    Point { x: 1.0, y: 0.0 },
    Point { x: 1.0, y: 1.0 },
    Point { x: 0.0, y: 1.0 },
];

impl PerspectiveWarp {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            corners: UNIT_CORNERS,
            transform: PerspectiveTransform::new(width, height),
            width,
            height,
            blend: EdgeBlend::default(),
            color: DisplayColor::default(),
            selected: None,
            dirty: true,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty || self.transform.is_dirty()
    }

    /// Reset the corners to the undistorted rectangle
    pub fn reset(&mut self) {
        self.corners = UNIT_CORNERS;
        self.dirty = true;
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    /// Destination corners in pixels
    pub fn destination_pixels(&self) -> [Point; 4] {
        self.corners
            .map(|c| Point::new(c.x * self.width as f64, c.y * self.height as f64))
    }

    /// Push the content size and corner pixels into the cached transform
    fn sync(&mut self) {
        if self.dirty {
            self.transform.set_size(self.width, self.height);
            self.transform.set_destinations(self.destination_pixels());
            self.dirty = false;
        }
    }

    /// Solve the homography if stale, reporting a degenerate corner
    /// layout
    pub fn update(&mut self) -> Result<(), WarpError> {
        self.sync();
        self.transform.update()
    }

    /// Forward matrix mapping content pixels onto the destination quad
    pub fn matrix(&mut self) -> Matrix4<f64> {
        self.sync();
        self.transform.matrix()
    }

    /// Inverse matrix mapping screen pixels back into content space
    pub fn inverse(&mut self) -> Matrix4<f64> {
        self.sync();
        self.transform.inverse()
    }

    pub fn control_point(&self, index: usize) -> Option<Point> {
        self.corners.get(index).copied()
    }

    pub fn set_control_point(&mut self, index: usize, pos: Point) -> bool {
        if index >= 4 {
            tracing::debug!("Ignoring write to perspective corner {}", index);
            return false;
        }
        self.corners[index] = pos;
        self.dirty = true;
        true
    }

    pub fn move_control_point(&mut self, index: usize, shift: Point) -> bool {
        match self.control_point(index) {
            Some(p) => self.set_control_point(index, p + shift),
            None => false,
        }
    }

    pub fn find_control_point(&self, pos: Point) -> (usize, f64) {
        let mut index = 0;
        let mut dist = f64::MAX;
        for (i, c) in self.destination_pixels().iter().enumerate() {
            let d = pos.distance(*c);
            if d < dist {
                dist = d;
                index = i;
            }
        }
        (index, dist)
    }

    pub fn select_control_point(&mut self, index: usize) -> bool {
        if index >= 4 {
            return false;
        }
        self.selected = Some(index);
        true
    }

    pub fn deselect_control_point(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Rotate the content counter-clockwise by cycling the corners
    pub fn rotate_ccw(&mut self) {
        self.corners.swap(1, 2);
        self.corners.swap(0, 1);
        self.corners.swap(3, 0);
        if let Some(sel) = self.selected {
            self.selected = Some((sel + 1) % 4);
        }
        self.dirty = true;
    }

    /// Rotate the content clockwise by cycling the corners
    pub fn rotate_cw(&mut self) {
        self.corners.swap(3, 0);
        self.corners.swap(0, 1);
        self.corners.swap(1, 2);
        if let Some(sel) = self.selected {
            self.selected = Some((sel + 3) % 4);
        }
        self.dirty = true;
    }

    /// Flip the content horizontally
    pub fn flip_horizontal(&mut self) {
        self.corners.swap(0, 1);
        self.corners.swap(2, 3);
        if let Some(sel) = self.selected {
            self.selected = Some(if sel % 2 == 1 { sel - 1 } else { sel + 1 });
        }
        self.dirty = true;
    }

    /// Flip the content vertically
    pub fn flip_vertical(&mut self) {
        self.corners.swap(0, 3);
        self.corners.swap(1, 2);
        if let Some(sel) = self.selected {
            self.selected = Some(3 - sel);
        }
        self.dirty = true;
    }

    pub fn blend(&self) -> &EdgeBlend {
        &self.blend
    }

    pub fn blend_mut(&mut self) -> &mut EdgeBlend {
        &mut self.blend
    }

    pub fn color(&self) -> &DisplayColor {
        &self.color
    }

    pub fn color_mut(&mut self) -> &mut DisplayColor {
        &mut self.color
    }

    pub fn to_settings(&self) -> WarpSettings {
        WarpSettings {
            method: WarpMethod::Perspective,
            columns: 2,
            rows: 2,
            points: self.corners.to_vec(),
            corners: None,
            resolution: 16,
            linear: false,
            adaptive: false,
            blend: self.blend,
            color: self.color,
        }
    }

    pub fn from_settings(settings: &WarpSettings, width: u32, height: u32) -> Self {
        let mut warp = Self::new(width, height);
        warp.blend = settings.blend;
        warp.color = settings.color;

        if settings.points.len() == 4 {
            warp.corners = [
                settings.points[0],
                settings.points[1],
                settings.points[2],
                settings.points[3],
            ];
        } else if !settings.points.is_empty() {
            tracing::warn!(
                "Expected 4 perspective corners, found {}; keeping identity",
                settings.points.len()
            );
        }
        warp
    }
}

/// Perspective-over-grid composite. The perspective warp owns the 4
/// corner indices of the grid; interior points live in warped content
/// space and are translated through the homography on every access.
#[derive(Debug, Clone)]
pub struct PerspectiveBilinearWarp {
    bilinear: BilinearWarp,
    perspective: PerspectiveWarp,
}

impl PerspectiveBilinearWarp {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            bilinear: BilinearWarp::new(width, height),
            perspective: PerspectiveWarp::new(width, height),
        }
    }

    pub fn bilinear(&self) -> &BilinearWarp {
        &self.bilinear
    }

    pub fn perspective(&self) -> &PerspectiveWarp {
        &self.perspective
    }

    pub fn size(&self) -> (u32, u32) {
        self.bilinear.size()
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.bilinear.set_size(width, height);
        self.perspective.set_size(width, height);
    }

    pub fn reset(&mut self) {
        self.bilinear.reset();
        self.perspective.reset();
    }

    /// Whether `index` is one of the 4 grid corners owned by the
    /// perspective warp
    pub fn is_corner(&self, index: usize) -> bool {
        self.corner_slot(index).is_some()
    }

    /// Map a grid corner index to its perspective corner slot
    fn corner_slot(&self, index: usize) -> Option<usize> {
        let rows = self.bilinear.grid().rows();
        let n = self.bilinear.grid().len();

        if index == 0 {
            Some(0)
        } else if index == n - rows {
            Some(1)
        } else if index == n - 1 {
            Some(2)
        } else if index == rows - 1 {
            Some(3)
        } else {
            None
        }
    }

    /// Control point in normalized screen space. Corners come straight
    /// from the perspective warp; interior points are grid-local and get
    /// pushed through the forward transform.
    pub fn control_point(&mut self, index: usize) -> Option<Point> {
        if let Some(slot) = self.corner_slot(index) {
            return self.perspective.control_point(slot);
        }

        let p = self.bilinear.grid().at(index)?;
        let (w, h) = self.bilinear.size();
        let (px, py) = p.to_pixels(w, h);
        let m = self.perspective.matrix();
        let sp = transform::apply(&m, Point::new(px, py));
        Some(Point::from_pixels(sp.x, sp.y, w, h))
    }

    /// Set a control point from normalized screen space; interior
    /// positions go through the inverse transform into grid space
    pub fn set_control_point(&mut self, index: usize, pos: Point) -> bool {
        if let Some(slot) = self.corner_slot(index) {
            return self.perspective.set_control_point(slot, pos);
        }
        if self.bilinear.grid().at(index).is_none() {
            return false;
        }

        let (w, h) = self.bilinear.size();
        let (px, py) = pos.to_pixels(w, h);
        let inv = self.perspective.inverse();
        let lp = transform::apply(&inv, Point::new(px, py));
        self.bilinear
            .set_control_point(index, Point::from_pixels(lp.x, lp.y, w, h))
    }

    pub fn move_control_point(&mut self, index: usize, shift: Point) -> bool {
        if let Some(slot) = self.corner_slot(index) {
            return self.perspective.move_control_point(slot, shift);
        }
        match self.control_point(index) {
            Some(p) => self.set_control_point(index, p + shift),
            None => false,
        }
    }

    /// Closest control point to `pos` (pixels), measured against the
    /// composited screen-space positions
    pub fn find_control_point(&mut self, pos: Point) -> (usize, f64) {
        let n = self.bilinear.grid().len();
        let (w, h) = self.bilinear.size();

        let mut index = 0;
        let mut dist = f64::MAX;
        for i in 0..n {
            let p = match self.control_point(i) {
                Some(p) => p,
                None => continue,
            };
            let (px, py) = p.to_pixels(w, h);
            let d = pos.distance(Point::new(px, py));
            if d < dist {
                dist = d;
                index = i;
            }
        }
        (index, dist)
    }

    /// Select a control point. Selecting a corner also selects it in
    /// the perspective warp; selecting an interior point deselects the
    /// perspective warp, so at most one point is active across both.
    pub fn select_control_point(&mut self, index: usize) -> bool {
        if index >= self.bilinear.grid().len() {
            return false;
        }
        match self.corner_slot(index) {
            Some(slot) => {
                self.perspective.select_control_point(slot);
            }
            None => self.perspective.deselect_control_point(),
        }
        self.bilinear.select_control_point(index)
    }

    pub fn deselect_control_point(&mut self) {
        self.perspective.deselect_control_point();
        self.bilinear.deselect_control_point();
    }

    pub fn selected(&self) -> Option<usize> {
        self.bilinear.selected()
    }

    /// Current mesh of the embedded grid warp
    pub fn mesh(&mut self) -> &WarpMesh {
        self.bilinear.mesh()
    }

    /// Enclosing perspective matrix for the renderer
    pub fn matrix(&mut self) -> Matrix4<f64> {
        self.perspective.matrix()
    }

    pub fn update(&mut self) -> Result<(), WarpError> {
        self.perspective.update()?;
        let _ = self.bilinear.mesh();
        Ok(())
    }

    /// Flips reorder the grid points; rotations cycle the perspective
    /// corners
    pub fn flip_horizontal(&mut self) {
        self.bilinear.flip_horizontal();
    }

    pub fn flip_vertical(&mut self) {
        self.bilinear.flip_vertical();
    }

    pub fn rotate_ccw(&mut self) {
        self.perspective.rotate_ccw();
    }

    pub fn rotate_cw(&mut self) {
        self.perspective.rotate_cw();
    }

    pub fn toggle_interpolation(&mut self) {
        self.bilinear.toggle_interpolation();
    }

    pub fn to_settings(&self) -> WarpSettings {
        let mut settings = self.bilinear.to_settings();
        settings.method = WarpMethod::PerspectiveBilinear;
        settings.corners = Some(*self.perspective.corners());
        settings
    }

    pub fn from_settings(settings: &WarpSettings, width: u32, height: u32) -> Self {
        let mut warp = Self::new(width, height);
        warp.bilinear = BilinearWarp::from_settings(settings, width, height);
        if let Some(corners) = settings.corners {
            for (i, c) in corners.into_iter().enumerate() {
                warp.perspective.set_control_point(i, c);
            }
        }
        warp
    }
}

/// A warp of any method, exposing the uniform capability set. The
/// variant is a closed set dispatched by tag; the composite embeds the
/// other two.
#[derive(Debug, Clone)]
pub enum Warp {
    Bilinear(BilinearWarp),
    Perspective(PerspectiveWarp),
    PerspectiveBilinear(PerspectiveBilinearWarp),
}

impl Warp {
    pub fn new(method: WarpMethod, width: u32, height: u32) -> Self {
        match method {
            WarpMethod::Bilinear => Warp::Bilinear(BilinearWarp::new(width, height)),
            WarpMethod::Perspective => Warp::Perspective(PerspectiveWarp::new(width, height)),
            WarpMethod::PerspectiveBilinear => {
                Warp::PerspectiveBilinear(PerspectiveBilinearWarp::new(width, height))
            }
        }
    }

    pub fn method(&self) -> WarpMethod {
        match self {
            Warp::Bilinear(_) => WarpMethod::Bilinear,
            Warp::Perspective(_) => WarpMethod::Perspective,
            Warp::PerspectiveBilinear(_) => WarpMethod::PerspectiveBilinear,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            Warp::Bilinear(w) => w.size(),
            Warp::Perspective(w) => w.size(),
            Warp::PerspectiveBilinear(w) => w.size(),
        }
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        match self {
            Warp::Bilinear(w) => w.set_size(width, height),
            Warp::Perspective(w) => w.set_size(width, height),
            Warp::PerspectiveBilinear(w) => w.set_size(width, height),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Warp::Bilinear(w) => w.reset(),
            Warp::Perspective(w) => w.reset(),
            Warp::PerspectiveBilinear(w) => w.reset(),
        }
    }

    pub fn control_point_count(&self) -> usize {
        match self {
            Warp::Bilinear(w) => w.grid().len(),
            Warp::Perspective(_) => 4,
            Warp::PerspectiveBilinear(w) => w.bilinear().grid().len(),
        }
    }

    /// Control point in normalized screen space
    pub fn control_point(&mut self, index: usize) -> Option<Point> {
        match self {
            Warp::Bilinear(w) => w.control_point(index),
            Warp::Perspective(w) => w.control_point(index),
            Warp::PerspectiveBilinear(w) => w.control_point(index),
        }
    }

    pub fn set_control_point(&mut self, index: usize, pos: Point) -> bool {
        match self {
            Warp::Bilinear(w) => w.set_control_point(index, pos),
            Warp::Perspective(w) => w.set_control_point(index, pos),
            Warp::PerspectiveBilinear(w) => w.set_control_point(index, pos),
        }
    }

    pub fn move_control_point(&mut self, index: usize, shift: Point) -> bool {
        match self {
            Warp::Bilinear(w) => w.move_control_point(index, shift),
            Warp::Perspective(w) => w.move_control_point(index, shift),
            Warp::PerspectiveBilinear(w) => w.move_control_point(index, shift),
        }
    }

    /// Closest control point to a pixel position, with its distance
    pub fn find_control_point(&mut self, pos: Point) -> (usize, f64) {
        match self {
            Warp::Bilinear(w) => w.find_control_point(pos),
            Warp::Perspective(w) => w.find_control_point(pos),
            Warp::PerspectiveBilinear(w) => w.find_control_point(pos),
        }
    }

    pub fn select_control_point(&mut self, index: usize) -> bool {
        match self {
            Warp::Bilinear(w) => w.select_control_point(index),
            Warp::Perspective(w) => w.select_control_point(index),
            Warp::PerspectiveBilinear(w) => w.select_control_point(index),
        }
    }

    pub fn deselect_control_point(&mut self) {
        match self {
            Warp::Bilinear(w) => w.deselect_control_point(),
            Warp::Perspective(w) => w.deselect_control_point(),
            Warp::PerspectiveBilinear(w) => w.deselect_control_point(),
        }
    }

    pub fn selected(&self) -> Option<usize> {
        match self {
            Warp::Bilinear(w) => w.selected(),
            Warp::Perspective(w) => w.selected(),
            Warp::PerspectiveBilinear(w) => w.selected(),
        }
    }

    /// Recompute whatever derived geometry is stale: the mesh for grid
    /// warps, the matrices for perspective warps
    pub fn update_geometry(&mut self) -> Result<(), WarpError> {
        match self {
            Warp::Bilinear(w) => {
                let _ = w.mesh();
                Ok(())
            }
            Warp::Perspective(w) => w.update(),
            Warp::PerspectiveBilinear(w) => w.update(),
        }
    }

    /// Tessellated mesh, if this warp has one
    pub fn mesh(&mut self) -> Option<&WarpMesh> {
        match self {
            Warp::Bilinear(w) => Some(w.mesh()),
            Warp::Perspective(_) => None,
            Warp::PerspectiveBilinear(w) => Some(w.mesh()),
        }
    }

    /// Perspective matrix, if this warp has one
    pub fn matrix(&mut self) -> Option<Matrix4<f64>> {
        match self {
            Warp::Bilinear(_) => None,
            Warp::Perspective(w) => Some(w.matrix()),
            Warp::PerspectiveBilinear(w) => Some(w.matrix()),
        }
    }

    pub fn blend(&self) -> &EdgeBlend {
        match self {
            Warp::Bilinear(w) => w.blend(),
            Warp::Perspective(w) => w.blend(),
            Warp::PerspectiveBilinear(w) => w.bilinear().blend(),
        }
    }

    pub fn blend_mut(&mut self) -> &mut EdgeBlend {
        match self {
            Warp::Bilinear(w) => w.blend_mut(),
            Warp::Perspective(w) => w.blend_mut(),
            Warp::PerspectiveBilinear(w) => w.bilinear.blend_mut(),
        }
    }

    pub fn color(&self) -> &DisplayColor {
        match self {
            Warp::Bilinear(w) => w.color(),
            Warp::Perspective(w) => w.color(),
            Warp::PerspectiveBilinear(w) => w.bilinear().color(),
        }
    }

    pub fn color_mut(&mut self) -> &mut DisplayColor {
        match self {
            Warp::Bilinear(w) => w.color_mut(),
            Warp::Perspective(w) => w.color_mut(),
            Warp::PerspectiveBilinear(w) => w.bilinear.color_mut(),
        }
    }

    pub fn to_settings(&self) -> WarpSettings {
        match self {
            Warp::Bilinear(w) => w.to_settings(),
            Warp::Perspective(w) => w.to_settings(),
            Warp::PerspectiveBilinear(w) => w.to_settings(),
        }
    }

    pub fn from_settings(settings: &WarpSettings, width: u32, height: u32) -> Self {
        match settings.method {
            WarpMethod::Bilinear => {
                Warp::Bilinear(BilinearWarp::from_settings(settings, width, height))
            }
            WarpMethod::Perspective => {
                Warp::Perspective(PerspectiveWarp::from_settings(settings, width, height))
            }
            WarpMethod::PerspectiveBilinear => Warp::PerspectiveBilinear(
                PerspectiveBilinearWarp::from_settings(settings, width, height),
            ),
        }
    }

    // ------------------------------------------------------------------
    // Interactive commands, gated on the editing session

    /// Select the control point closest to `pos` (pixels)
    pub fn select_nearest(&mut self, session: &EditSession, pos: Point) -> bool {
        if !session.edit_enabled {
            return false;
        }
        let (index, _) = self.find_control_point(pos);
        self.select_control_point(index)
    }

    /// Move the selected control point by a normalized delta
    pub fn move_selected(&mut self, session: &EditSession, delta: Point) -> bool {
        if !session.edit_enabled {
            return false;
        }
        match self.selected() {
            Some(index) => self.move_control_point(index, delta),
            None => false,
        }
    }

    /// Resample the control grid along one axis; a no-op for pure
    /// perspective warps and for out-of-bounds counts
    pub fn resize_grid(&mut self, session: &EditSession, axis: Axis, count: usize) -> bool {
        if !session.edit_enabled {
            return false;
        }
        match self {
            Warp::Bilinear(w) => match axis {
                Axis::Columns => w.set_columns(count),
                Axis::Rows => w.set_rows(count),
            },
            Warp::Perspective(_) => false,
            Warp::PerspectiveBilinear(w) => match axis {
                Axis::Columns => w.bilinear.set_columns(count),
                Axis::Rows => w.bilinear.set_rows(count),
            },
        }
    }

    /// Set one of the 4 corners (TL, TR, BR, BL order) in normalized
    /// screen space
    pub fn set_corner(&mut self, session: &EditSession, index: usize, pos: Point) -> bool {
        if !session.edit_enabled || index >= 4 {
            return false;
        }
        match self {
            Warp::Bilinear(w) => {
                let grid_index = w.grid().corner_indices()[index];
                w.set_control_point(grid_index, pos)
            }
            Warp::Perspective(w) => w.set_control_point(index, pos),
            Warp::PerspectiveBilinear(w) => w.perspective.set_control_point(index, pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> EditSession {
        EditSession {
            edit_enabled: true,
            use_color_lut: false,
        }
    }

    fn assert_close(a: Point, b: Point, tol: f64) {
        assert!(
            (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn test_bilinear_mesh_cache() {
        let mut warp = BilinearWarp::new(640, 480);
        assert!(warp.is_dirty());

        let first = warp.mesh().clone();
        assert!(!warp.is_dirty());
        assert_eq!(warp.mesh(), &first);

        warp.set_control_point(0, Point::new(0.1, 0.1));
        assert!(warp.is_dirty());
        assert_ne!(warp.mesh(), &first);
    }

    #[test]
    fn test_bilinear_resize_end_to_end() {
        // 2x2 identity, columns -> 4 in linear mode: evenly spaced points
        // on the original straight edges
        let mut warp = BilinearWarp::new(640, 480);
        warp.set_interpolation(Interpolation::Linear);
        assert!(warp.set_columns(4));

        for row in 0..2 {
            for col in 0..4 {
                let p = warp.grid().point(col, row);
                assert!((p.x - col as f64 / 3.0).abs() < 1e-12);
                assert!((p.y - row as f64).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_resize_rejection_keeps_grid() {
        let mut warp = BilinearWarp::new(640, 480);
        assert!(warp.set_columns(6));
        assert!(warp.set_rows(6));

        // 200 * 6 > 1024
        assert!(!warp.set_columns(200));
        assert_eq!(warp.grid().columns(), 6);
        assert!(!warp.set_rows(1));
        assert_eq!(warp.grid().rows(), 6);
    }

    #[test]
    fn test_perspective_rotations_cycle() {
        let mut warp = PerspectiveWarp::new(100, 100);
        warp.set_control_point(0, Point::new(0.1, 0.2));
        let before = *warp.corners();

        warp.rotate_ccw();
        assert_ne!(*warp.corners(), before);
        warp.rotate_ccw();
        warp.rotate_ccw();
        warp.rotate_ccw();
        assert_eq!(*warp.corners(), before);

        warp.rotate_cw();
        warp.rotate_ccw();
        assert_eq!(*warp.corners(), before);
    }

    #[test]
    fn test_perspective_flips_are_self_inverse() {
        let mut warp = PerspectiveWarp::new(100, 100);
        warp.set_control_point(2, Point::new(0.8, 1.1));
        let before = *warp.corners();

        warp.flip_horizontal();
        warp.flip_horizontal();
        assert_eq!(*warp.corners(), before);

        warp.flip_vertical();
        warp.flip_vertical();
        assert_eq!(*warp.corners(), before);
    }

    #[test]
    fn test_composite_corner_aliasing() {
        let mut warp = PerspectiveBilinearWarp::new(200, 100);
        // grow the grid so corner indices are non-trivial
        warp.bilinear.set_columns(4);
        warp.bilinear.set_rows(3);

        let delta = Point::new(0.05, -0.03);
        assert!(warp.move_control_point(0, delta));

        let via_composite = warp.control_point(0).unwrap();
        let via_perspective = warp.perspective().control_point(0).unwrap();
        assert_close(via_composite, via_perspective, 1e-12);

        let (cx, cy) = via_composite.to_pixels(200, 100);
        let (px, py) = via_perspective.to_pixels(200, 100);
        assert!((cx - px).abs() < 1e-9 && (cy - py).abs() < 1e-9);
        assert_close(via_perspective, Point::new(0.05, -0.03), 1e-12);
    }

    #[test]
    fn test_composite_corner_slots() {
        let mut warp = PerspectiveBilinearWarp::new(200, 100);
        warp.bilinear.set_columns(4);
        warp.bilinear.set_rows(3);

        // column-major 4x3: TL=0, TR=9, BR=11, BL=2
        assert!(warp.is_corner(0));
        assert!(warp.is_corner(9));
        assert!(warp.is_corner(11));
        assert!(warp.is_corner(2));
        assert!(!warp.is_corner(5));
    }

    #[test]
    fn test_composite_interior_round_trip() {
        let mut warp = PerspectiveBilinearWarp::new(200, 100);
        warp.bilinear.set_columns(3);
        warp.bilinear.set_rows(3);

        // skew the perspective so the transform is non-trivial
        warp.perspective.set_control_point(1, Point::new(0.9, 0.1));
        warp.perspective.set_control_point(2, Point::new(1.05, 0.95));

        let target = Point::new(0.42, 0.58);
        let center = warp.bilinear.grid().index(1, 1);
        assert!(warp.set_control_point(center, target));
        let back = warp.control_point(center).unwrap();
        assert_close(back, target, 1e-6);
    }

    #[test]
    fn test_composite_selection_exclusive() {
        let mut warp = PerspectiveBilinearWarp::new(200, 100);
        warp.bilinear.set_columns(3);
        warp.bilinear.set_rows(3);

        // corner index 0 selects in both
        assert!(warp.select_control_point(0));
        assert_eq!(warp.selected(), Some(0));
        assert_eq!(warp.perspective().selected(), Some(0));

        // interior selection drops the perspective selection
        let center = warp.bilinear().grid().index(1, 1);
        assert!(warp.select_control_point(center));
        assert_eq!(warp.selected(), Some(center));
        assert_eq!(warp.perspective().selected(), None);

        warp.deselect_control_point();
        assert_eq!(warp.selected(), None);
    }

    #[test]
    fn test_composite_identity_matches_plain_grid() {
        // with an identity perspective, composite accessors behave like
        // the plain grid warp
        let mut warp = PerspectiveBilinearWarp::new(640, 480);
        warp.bilinear.set_columns(3);

        let index = warp.bilinear.grid().index(1, 1);
        let raw = warp.bilinear.grid().at(index).unwrap();
        let seen = warp.control_point(index).unwrap();
        assert_close(seen, raw, 1e-9);
    }

    #[test]
    fn test_warp_enum_dispatch() {
        let (w, h) = (640, 480);
        for method in [
            WarpMethod::Bilinear,
            WarpMethod::Perspective,
            WarpMethod::PerspectiveBilinear,
        ] {
            let mut warp = Warp::new(method, w, h);
            assert_eq!(warp.method(), method);
            assert_eq!(warp.size(), (w, h));
            assert!(warp.update_geometry().is_ok());

            match method {
                WarpMethod::Perspective => {
                    assert!(warp.mesh().is_none());
                    assert!(warp.matrix().is_some());
                    assert_eq!(warp.control_point_count(), 4);
                }
                WarpMethod::Bilinear => {
                    assert!(warp.mesh().is_some());
                    assert!(warp.matrix().is_none());
                    assert_eq!(warp.control_point_count(), 4);
                }
                WarpMethod::PerspectiveBilinear => {
                    assert!(warp.mesh().is_some());
                    assert!(warp.matrix().is_some());
                }
            }
        }
    }

    #[test]
    fn test_commands_respect_session() {
        let mut warp = Warp::new(WarpMethod::Bilinear, 640, 480);
        let off = EditSession::default();
        let on = session();

        assert!(!warp.select_nearest(&off, Point::new(0.0, 0.0)));
        assert!(!warp.resize_grid(&off, Axis::Columns, 4));
        assert!(!warp.set_corner(&off, 0, Point::new(0.1, 0.1)));

        assert!(warp.select_nearest(&on, Point::new(0.0, 0.0)));
        assert_eq!(warp.selected(), Some(0));
        assert!(warp.move_selected(&on, Point::new(0.02, 0.01)));
        let p = warp.control_point(0).unwrap();
        assert_close(p, Point::new(0.02, 0.01), 1e-12);

        assert!(warp.resize_grid(&on, Axis::Columns, 4));
        assert_eq!(warp.control_point_count(), 8);
    }

    #[test]
    fn test_set_corner_routes_per_variant() {
        let on = session();
        let target = Point::new(0.12, 0.08);

        let mut bilinear = Warp::new(WarpMethod::Bilinear, 100, 100);
        assert!(bilinear.resize_grid(&on, Axis::Columns, 3));
        assert!(bilinear.set_corner(&on, 1, target));
        // TR of a 3x2 grid is index 4 in column-major order
        assert_close(bilinear.control_point(4).unwrap(), target, 1e-12);

        let mut perspective = Warp::new(WarpMethod::Perspective, 100, 100);
        assert!(perspective.set_corner(&on, 1, target));
        assert_close(perspective.control_point(1).unwrap(), target, 1e-12);

        let mut composite = Warp::new(WarpMethod::PerspectiveBilinear, 100, 100);
        assert!(composite.set_corner(&on, 1, target));
        if let Warp::PerspectiveBilinear(w) = &composite {
            assert_close(w.perspective().corners()[1], target, 1e-12);
        } else {
            unreachable!();
        }
    }

    #[test]
    fn test_settings_round_trip_all_methods() {
        let on = session();
        let (w, h) = (320, 240);

        let mut warps = vec![
            Warp::new(WarpMethod::Bilinear, w, h),
            Warp::new(WarpMethod::Perspective, w, h),
            Warp::new(WarpMethod::PerspectiveBilinear, w, h),
        ];
        warps[0].resize_grid(&on, Axis::Columns, 3);
        warps[0].set_control_point(2, Point::new(0.1, 0.9));
        warps[1].set_corner(&on, 2, Point::new(1.1, 0.9));
        warps[2].resize_grid(&on, Axis::Rows, 4);
        warps[2].set_corner(&on, 0, Point::new(-0.05, 0.02));
        for warp in &mut warps {
            warp.blend_mut().set_edges(0.3, 0.0, 0.25, 0.0);
        }

        for warp in &mut warps {
            let settings = warp.to_settings();
            let mut restored = Warp::from_settings(&settings, w, h);

            assert_eq!(restored.method(), warp.method());
            assert_eq!(restored.control_point_count(), warp.control_point_count());
            assert_eq!(restored.blend(), warp.blend());
            for i in 0..warp.control_point_count() {
                let a = warp.control_point(i).unwrap();
                let b = restored.control_point(i).unwrap();
                assert_close(a, b, 1e-12);
            }
        }
    }
}
