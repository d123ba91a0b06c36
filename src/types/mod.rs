//! Shared types used throughout the library.

mod material;
mod surface;
mod transform;

pub use material::Material;
pub use surface::{DrawGroup, SurfaceType};
pub use transform::{face_order, rotation_only, to_blender, to_xplane, to_xplane_dir};

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Max distance between two points for them to be merged.
pub const LIMIT: f64 = 0.0001;

/// Decimal places kept when converting into X-Plane space.
pub const ROUND: i32 = 4;

/// Max distance between two texture coordinates, about one pixel in 2048.
pub const UV_LIMIT: f64 = 0.0004;

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Round to the precision used for positions and keyframe values.
pub fn round4(value: f64) -> f64 {
    round_to(value, ROUND)
}

/// Component-wise comparison within `fudge`.
pub fn approx_eq(a: DVec3, b: DVec3, fudge: f64) -> bool {
    (a.x - b.x).abs() <= fudge && (a.y - b.y).abs() <= fudge && (a.z - b.z).abs() <= fudge
}

/// Shortest decimal form of `value` that always shows a fractional part,
/// so `2.0` reads `2.0` rather than `2`.
pub fn float_repr(value: f64) -> String {
    let s = format!("{}", value);
    if s.contains(['.', 'e', 'N', 'n']) {
        s
    } else {
        s + ".0"
    }
}

/// A texture coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Uv {
    pub s: f64,
    pub t: f64,
}

impl Uv {
    pub fn new(s: f64, t: f64) -> Self {
        Self { s, t }
    }

    pub fn approx_eq(&self, other: &Uv) -> bool {
        (self.s - other.s).abs() <= UV_LIMIT && (self.t - other.t).abs() <= UV_LIMIT
    }

    /// Midpoint of two coordinates.
    pub fn average(&self, other: &Uv) -> Uv {
        Uv::new((self.s + other.s) / 2.0, (self.t + other.t) / 2.0)
    }
}

impl From<[f64; 2]> for Uv {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

/// An RGB triple in the 0..1 range.
pub type Rgb = [f64; 3];
