//! Error conditions reported by the warp core
//!
//! Bounds violations (out-of-range indices, oversized grid resizes) are
//! not errors: they come from a live editing loop and are silently
//! rejected as no-ops. The conditions below are the ones a caller can
//! actually act on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarpError {
    /// Three or more destination corners are (nearly) collinear, so the
    /// perspective linear system has no usable solution. The previously
    /// cached transform is kept.
    #[error("degenerate homography: destination corners are collinear")]
    DegenerateHomography,

    /// A rendering-layer resource (surface, texture) could not be
    /// obtained. Reported by collaborators, recoverable by retry or
    /// fallback at that layer.
    #[error("render resource unavailable: {0}")]
    ResourceUnavailable(String),
}
