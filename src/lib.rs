//! warpdeck - warp geometry and edge blending for projection mapping
//!
//! Computes and maintains the geometric mapping used to project an
//! image onto an irregular physical surface: a grid of adjustable
//! control points deforming the content, a four-corner perspective
//! (homography) transform, a composite layering the two, and the
//! edge-blend parameter set consumed by the external shader.
//!
//! Rendering, GPU resources and input decoding are collaborators: this
//! crate exposes vertex/index buffers, transform matrices and blend
//! uniforms, and accepts discrete editing commands.

pub mod blend;
pub mod config;
pub mod error;
pub mod grid;
pub mod mesh;
pub mod session;
pub mod spline;
pub mod transform;
pub mod warp;

pub use blend::{DisplayColor, EdgeBlend};
pub use config::{Point, WarpConfig, WarpMethod, WarpSettings};
pub use error::WarpError;
pub use grid::{ControlGrid, MAX_CONTROL_POINTS};
pub use mesh::{MeshTessellator, MeshVertex, WarpMesh};
pub use session::EditSession;
pub use spline::{Axis, Interpolation};
pub use transform::PerspectiveTransform;
pub use warp::{BilinearWarp, PerspectiveBilinearWarp, PerspectiveWarp, Warp};
