//! Editing session state
//!
//! The original design kept edit-mode and color-LUT switches as
//! process-wide globals; here they are explicit session state passed to
//! every interactive operation, scoped to the editing session rather
//! than the process.

use crate::config::Point;
use crate::warp::Warp;

/// Flags governing interactive editing. Commands are no-ops while
/// `edit_enabled` is off.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditSession {
    pub edit_enabled: bool,
    /// Whether the renderer should sample the color LUT texture it owns
    pub use_color_lut: bool,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_edit(&mut self, enabled: bool) {
        self.edit_enabled = enabled;
    }

    pub fn toggle_edit(&mut self) {
        self.edit_enabled = !self.edit_enabled;
    }
}

/// Select the control point closest to `pos` (pixels) across all warps,
/// deselecting every other warp. Warps are scanned in reverse draw
/// order, so on an exact tie the topmost warp wins. Returns the winning
/// (warp, point) indices.
pub fn select_closest(
    warps: &mut [Warp],
    session: &EditSession,
    pos: Point,
) -> Option<(usize, usize)> {
    if !session.edit_enabled {
        return None;
    }

    let mut best: Option<(usize, usize, f64)> = None;
    for (wi, warp) in warps.iter_mut().enumerate().rev() {
        let (pi, d) = warp.find_control_point(pos);
        if best.map_or(true, |(_, _, bd)| d < bd) {
            best = Some((wi, pi, d));
        }
    }

    let (wi, pi, _) = best?;
    for (i, warp) in warps.iter_mut().enumerate() {
        if i == wi {
            warp.select_control_point(pi);
        } else {
            warp.deselect_control_point();
        }
    }
    Some((wi, pi))
}

/// Set the content size of every warp
pub fn set_size_all(warps: &mut [Warp], width: u32, height: u32) {
    for warp in warps.iter_mut() {
        warp.set_size(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WarpMethod;

    #[test]
    fn test_select_closest_across_warps() {
        let mut warps = vec![
            Warp::new(WarpMethod::Bilinear, 100, 100),
            Warp::new(WarpMethod::Perspective, 100, 100),
        ];
        // drag the second warp's TR corner near the probe point
        let session = EditSession {
            edit_enabled: true,
            use_color_lut: false,
        };
        warps[1].set_control_point(1, Point::new(0.6, 0.4));

        let hit = select_closest(&mut warps, &session, Point::new(62.0, 41.0));
        assert_eq!(hit, Some((1, 1)));
        assert_eq!(warps[1].selected(), Some(1));
        assert_eq!(warps[0].selected(), None);

        // selecting in the other warp clears the previous selection
        let hit = select_closest(&mut warps, &session, Point::new(2.0, 98.0));
        assert_eq!(hit, Some((1, 3)));

        let hit = select_closest(&mut warps, &session, Point::new(50.0, 50.0));
        assert!(hit.is_some());
    }

    #[test]
    fn test_select_closest_disabled_session() {
        let mut warps = vec![Warp::new(WarpMethod::Bilinear, 100, 100)];
        let session = EditSession::new();
        assert_eq!(select_closest(&mut warps, &session, Point::new(0.0, 0.0)), None);
        assert_eq!(warps[0].selected(), None);
    }

    #[test]
    fn test_set_size_all() {
        let mut warps = vec![
            Warp::new(WarpMethod::Bilinear, 100, 100),
            Warp::new(WarpMethod::PerspectiveBilinear, 100, 100),
        ];
        set_size_all(&mut warps, 1920, 1080);
        assert_eq!(warps[0].size(), (1920, 1080));
        assert_eq!(warps[1].size(), (1920, 1080));
    }
}
