//! Edge blending parameters for projector overlap regions
//!
//! The warp core only owns the parameter set and the blend-curve
//! formulas; the per-pixel work happens in the external shader. The
//! functions here are the contract that shader must implement, and they
//! double as a CPU reference for tests and mask export.
//!
//! Per-pixel contract: alpha starts at 1 and is attenuated by
//! `clamp(distance_to_edge / edge_width, 0, 1)` for each active edge;
//! the per-channel blend factor is `luminance * (2a)^exponent` below
//! a = 0.5 and `1 - (1 - luminance) * (2(1-a))^exponent` above; the
//! output color is `tex * blend^(1/gamma)`.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// Per-channel value triple for luminance and gamma
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rgb {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Rgb {
    pub fn splat(v: f64) -> Self {
        Self {
            red: v,
            green: v,
            blue: v,
        }
    }

    fn as_array(&self) -> [f64; 3] {
        [self.red, self.green, self.blue]
    }
}

/// Blend region widths for the four edges. Stored as half the value
/// passed to [`EdgeBlend::set_edges`]; the shader consumes these stored
/// widths directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Edges {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

/// Edge-blend parameter set handed to the renderer as shader uniforms
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EdgeBlend {
    edges: Edges,
    /// 0.5 = linear / no correction
    luminance: Rgb,
    gamma: Rgb,
    /// Blend curve exponent, 1 = linear, 2 = quadratic
    exponent: f64,
}

impl Default for EdgeBlend {
    fn default() -> Self {
        Self {
            edges: Edges::default(),
            luminance: Rgb::splat(0.5),
            gamma: Rgb::splat(1.0),
            exponent: 2.0,
        }
    }
}

impl EdgeBlend {
    /// Set the blend areas for the left, top, right and bottom edges
    /// (each in [0, 1]). Stored halved.
    pub fn set_edges(&mut self, left: f64, top: f64, right: f64, bottom: f64) {
        self.edges.left = (left * 0.5).clamp(0.0, 1.0);
        self.edges.top = (top * 0.5).clamp(0.0, 1.0);
        self.edges.right = (right * 0.5).clamp(0.0, 1.0);
        self.edges.bottom = (bottom * 0.5).clamp(0.0, 1.0);
    }

    /// Edge blend areas as set (i.e. doubled stored widths)
    pub fn edges(&self) -> [f64; 4] {
        [
            2.0 * self.edges.left,
            2.0 * self.edges.top,
            2.0 * self.edges.right,
            2.0 * self.edges.bottom,
        ]
    }

    /// Stored half-widths, the values bound as shader uniforms
    pub fn edge_widths(&self) -> Edges {
        self.edges
    }

    /// Set the luminance for all channels (0.5 = linear)
    pub fn set_luminance(&mut self, v: f64) {
        self.luminance = Rgb::splat(v);
    }

    pub fn set_luminance_rgb(&mut self, red: f64, green: f64, blue: f64) {
        self.luminance = Rgb { red, green, blue };
    }

    pub fn luminance(&self) -> Rgb {
        self.luminance
    }

    /// Set the gamma curve for all channels
    pub fn set_gamma(&mut self, v: f64) {
        self.gamma = Rgb::splat(v);
    }

    pub fn set_gamma_rgb(&mut self, red: f64, green: f64, blue: f64) {
        self.gamma = Rgb { red, green, blue };
    }

    pub fn gamma(&self) -> Rgb {
        self.gamma
    }

    /// Set the blend curve exponent, clamped to [1, 100]
    pub fn set_exponent(&mut self, e: f64) {
        self.exponent = e.clamp(1.0, 100.0);
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// Per-pixel blend alpha at normalized texture position `(u, v)`
    pub fn alpha(&self, u: f64, v: f64) -> f64 {
        let mut a = 1.0;
        if self.edges.left > 0.0 {
            a *= (u / self.edges.left).clamp(0.0, 1.0);
        }
        if self.edges.top > 0.0 {
            a *= (v / self.edges.top).clamp(0.0, 1.0);
        }
        if self.edges.right > 0.0 {
            a *= ((1.0 - u) / self.edges.right).clamp(0.0, 1.0);
        }
        if self.edges.bottom > 0.0 {
            a *= ((1.0 - v) / self.edges.bottom).clamp(0.0, 1.0);
        }
        a
    }

    /// Per-channel blend factor for an alpha value
    pub fn blend_factor(&self, a: f64) -> [f64; 3] {
        // persisted documents may carry an unclamped exponent
        let e = self.exponent.clamp(1.0, 100.0);
        let mut out = [0.0; 3];
        for (i, lum) in self.luminance.as_array().into_iter().enumerate() {
            out[i] = if a < 0.5 {
                lum * (2.0 * a).powf(e)
            } else {
                1.0 - (1.0 - lum) * (2.0 * (1.0 - a)).powf(e)
            };
        }
        out
    }

    /// Full contract: blended output color at `(u, v)`
    pub fn apply(&self, color: [f64; 3], u: f64, v: f64) -> [f64; 3] {
        let blend = self.blend_factor(self.alpha(u, v));
        let gamma = self.gamma.as_array();
        let mut out = [0.0; 3];
        for i in 0..3 {
            out[i] = color[i] * blend[i].powf(1.0 / gamma[i]);
        }
        out
    }

    /// Render the blend factor as a grayscale image, averaged across
    /// channels. Used to preview the mask the shader would apply.
    pub fn mask_image(&self, width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let u = (x as f64 + 0.5) / width as f64;
            let v = (y as f64 + 0.5) / height as f64;
            let b = self.blend_factor(self.alpha(u, v));
            let gray = (b[0] + b[1] + b[2]) / 3.0;
            Luma([(gray * 255.0).round().clamp(0.0, 255.0) as u8])
        })
    }
}

/// Display color parameters passed through to the renderer; no color
/// math happens in the core
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DisplayColor {
    /// 0.0 to 1.0
    #[serde(default = "default_one")]
    pub brightness: f64,
    /// 0.0 to 1.0
    #[serde(default = "default_one")]
    pub contrast: f64,
    /// 0.0 to 1.0
    #[serde(default = "default_one")]
    pub saturation: f64,
}

fn default_one() -> f64 {
    1.0
}

impl Default for DisplayColor {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
        }
    }
}
