//! Primitives and the state sort.
//!
//! Every exported tri, line and light becomes one [`Primitive`] carrying the
//! render state it needs. Sorting them with [`compare`] groups primitives
//! that share expensive state so the writer has as few transitions as
//! possible to emit.

use super::animation::AnimId;
use crate::types::{Material, Rgb, SurfaceType, Uv};
use glam::DVec3;
use std::cmp::Ordering;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Render state bits of a primitive.
///
/// Lower bits change more often in the output than higher ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);
    pub const HARD: Flags = Flags(1);
    pub const DECK: Flags = Flags(2);
    pub const TWOSIDE: Flags = Flags(4);
    pub const PANEL: Flags = Flags(8);
    pub const ALPHA: Flags = Flags(16);
    /// No polygon offset.
    pub const NPOLY: Flags = Flags(32);

    /// Cheap per-face state.
    pub const BUCKET1: Flags = Flags(1 | 2 | 4);
    /// Expensive state, sorted before animation.
    pub const BUCKET2: Flags = Flags(8 | 16 | 32);
    /// State given to lines and lights.
    pub const LIGHTS: Flags = Flags(8 | 16 | 32);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn intersects(self, other: Flags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Flags {
    type Output = Flags;

    fn bitand(self, rhs: Flags) -> Flags {
        Flags(self.0 & rhs.0)
    }
}

impl Not for Flags {
    type Output = Flags;

    fn not(self) -> Flags {
        Flags(!self.0)
    }
}

/// Primitive kind, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Style {
    Tri,
    Line,
    /// Indexed RGB light.
    VLight,
    /// Light written as its own directive.
    NLight,
}

/// A legacy RGB light from the `VLIGHT` table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VLight {
    pub position: DVec3,
    pub color: Rgb,
}

/// Lights written inline in the command section.
#[derive(Debug, Clone, PartialEq)]
pub enum NamedLight {
    /// A light from the simulator's named light table.
    Named { position: DVec3, name: String },
    /// Fully parameterised light.
    Custom {
        position: DVec3,
        rgba: [f64; 4],
        size: f64,
        uv1: Uv,
        uv2: Uv,
        dataref: String,
    },
    /// `smoke_black` or `smoke_white` puff.
    Smoke {
        position: DVec3,
        kind: String,
        size: f64,
    },
}

/// Style specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Three or four vertex table indices, already in output winding.
    Tri(Vec<usize>),
    /// Two line table indices.
    Line([usize; 2]),
    VLight(VLight),
    NLight(NamedLight),
}

/// One sortable unit of output.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    /// Object the primitive came from.
    pub object: String,
    pub group: Option<String>,
    pub flags: Flags,
    pub surface: Option<SurfaceType>,
    pub material: Material,
    pub anim: AnimId,
    /// Cockpit region index, -1 for none.
    pub region: i32,
    /// Layers the primitive is drawn in.
    pub layer: u32,
    /// Layer used for sorting; anything in layer 1 sorts as layer 1.
    pub layer_for_sort: u32,
    /// The source object uses the full cockpit panel texture.
    pub has_panel_texture: bool,
    /// Span in the index table (tris, lines) or light table (lights).
    pub offset: usize,
    pub count: usize,
    pub geometry: Geometry,
}

impl Primitive {
    pub fn new(object: &str, layer: u32, anim: AnimId, geometry: Geometry) -> Self {
        Self {
            object: object.to_string(),
            group: None,
            flags: Flags::NONE,
            surface: None,
            material: Material::DEFAULT,
            anim,
            region: -1,
            layer,
            layer_for_sort: if layer & 1 != 0 { 1 } else { layer },
            has_panel_texture: false,
            offset: 0,
            count: 0,
            geometry,
        }
    }

    /// Lines and lights share one fixed render state.
    pub fn light_or_line(object: &str, layer: u32, anim: AnimId, geometry: Geometry) -> Self {
        let mut prim = Self::new(object, layer, anim, geometry);
        prim.flags = Flags::LIGHTS;
        prim
    }

    pub fn with_group(mut self, group: Option<&str>) -> Self {
        self.group = group.map(str::to_string);
        self
    }

    pub fn with_panel_texture(mut self, has_panel_texture: bool) -> Self {
        self.has_panel_texture = has_panel_texture;
        self
    }

    pub fn style(&self) -> Style {
        match self.geometry {
            Geometry::Tri(_) => Style::Tri,
            Geometry::Line(_) => Style::Line,
            Geometry::VLight(_) => Style::VLight,
            Geometry::NLight(_) => Style::NLight,
        }
    }

    /// Vertex table indices of a tri, in output winding.
    pub fn corners(&self) -> &[usize] {
        match &self.geometry {
            Geometry::Tri(corners) => corners,
            _ => &[],
        }
    }
}

/// The state sort.
///
/// First difference wins: layer, draw group, expensive flags, animation,
/// material, cheap flags, cockpit region, style, surface.
pub fn compare(a: &Primitive, b: &Primitive) -> Ordering {
    a.layer_for_sort
        .cmp(&b.layer_for_sort)
        .then_with(|| a.group.cmp(&b.group))
        .then_with(|| (a.flags & Flags::BUCKET2).cmp(&(b.flags & Flags::BUCKET2)))
        .then_with(|| a.anim.cmp(&b.anim))
        .then_with(|| a.material.sort_cmp(&b.material))
        .then_with(|| (a.flags & Flags::BUCKET1).cmp(&(b.flags & Flags::BUCKET1)))
        .then_with(|| a.region.cmp(&b.region))
        .then_with(|| a.style().cmp(&b.style()))
        .then_with(|| a.surface.cmp(&b.surface))
}

/// Stable sort into output order.
pub fn sort_primitives(prims: &mut [Primitive]) {
    prims.sort_by(compare);
}
