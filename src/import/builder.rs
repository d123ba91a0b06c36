//! Rebuilds an object tree from a stream of directives.
//!
//! Each `ANIM_begin` scope yields one or more animated empties. Animations
//! that can share an empty do so: show/hide ranges, a translation followed by
//! rotations, and consecutive rotations about different axes that are keyed
//! to the same dataref values. Everything else nests one level deeper.

use super::parser::{Attribute, Directive, LineError, ShowHideKind};
use crate::config::Platform;
use crate::diagnostic::Diagnostics;
use crate::registry::TextureSlot;
use crate::types::{round_to, to_blender, Material, Rgb, SurfaceType, Uv};
use glam::{DMat4, DQuat, DVec3};
use serde::Serialize;

/// Keyframe comparisons round to this many places.
const KEYFRAME_PRECISION: i32 = 5;

/// Render state in force when a piece of geometry was drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeState {
    pub poly_offset: f64,
    pub two_sided: bool,
    pub material: Material,
    pub hard: Option<Hardness>,
    pub cockpit: Cockpit,
    /// The last `ATTR_manip_*` line.
    pub manipulator: Option<String>,
}

impl Default for AttributeState {
    fn default() -> Self {
        Self {
            poly_offset: 0.0,
            two_sided: false,
            material: Material::DEFAULT,
            hard: None,
            cockpit: Cockpit::None,
            manipulator: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hardness {
    pub deck: bool,
    pub surface: Option<SurfaceType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cockpit {
    None,
    Panel,
    Region(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslateAnimation {
    pub dataref: String,
    pub values: Vec<f64>,
    /// One location per value.
    pub locations: Vec<DVec3>,
    pub loop_value: Option<f64>,
}

/// Rotation about one axis, one angle in degrees per dataref value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotationAxis {
    pub axis: DVec3,
    pub angles: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotateAnimation {
    pub dataref: String,
    pub values: Vec<f64>,
    /// Axes in the order they were declared.
    pub axes: Vec<RotationAxis>,
    pub loop_value: Option<f64>,
}

impl RotateAnimation {
    /// The combined rotation at each dataref value.
    pub fn keyframes(&self) -> Vec<DQuat> {
        (0..self.values.len())
            .map(|frame| {
                self.axes.iter().fold(DQuat::IDENTITY, |q, axis| {
                    let angle = axis.angles.get(frame).copied().unwrap_or(0.0);
                    q * DQuat::from_axis_angle(axis.axis.normalize_or_zero(), angle.to_radians())
                })
            })
            .collect()
    }

    fn accepts(&self, other: &RotateAnimation) -> bool {
        self.dataref == other.dataref
            && same_values(&self.values, &other.values)
            && self.loop_value == other.loop_value
            && other
                .axes
                .iter()
                .all(|b| self.axes.iter().all(|a| !a.axis.abs_diff_eq(b.axis, 1e-4)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowHideAnimation {
    pub kind: ShowHideKind,
    pub dataref: String,
    pub v1: f64,
    pub v2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Animation {
    Translate(TranslateAnimation),
    Rotate(RotateAnimation),
    ShowHide(ShowHideAnimation),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImportedVertex {
    pub position: DVec3,
    pub normal: DVec3,
    pub uv: Uv,
}

/// Triangles with their own compact vertex list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportedMesh {
    pub vertices: Vec<ImportedVertex>,
    /// Corners in scene winding.
    pub faces: Vec<[usize; 3]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColoredPoint {
    pub position: DVec3,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportedLight {
    Named {
        name: String,
        position: DVec3,
    },
    Custom {
        position: DVec3,
        rgba: [f64; 4],
        size: f64,
        uv1: Uv,
        uv2: Uv,
        dataref: String,
    },
    Smoke {
        kind: String,
        position: DVec3,
        size: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Carries animation only.
    Empty,
    Mesh {
        mesh: ImportedMesh,
        state: AttributeState,
    },
    Lines {
        segments: Vec<[ColoredPoint; 2]>,
        state: AttributeState,
    },
    Lights {
        lights: Vec<ColoredPoint>,
    },
    Light(ImportedLight),
}

/// One object of the imported tree. Coordinates are in scene space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedNode {
    pub name: String,
    /// Index into [`ImportedObj::nodes`].
    pub parent: Option<usize>,
    /// Static transform relative to the parent.
    pub matrix: DMat4,
    pub animations: Vec<Animation>,
    /// Visible range, when the file has levels of detail.
    pub lod: Option<[f64; 2]>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportedTextures {
    pub diffuse: Option<String>,
    pub lit: Option<String>,
    pub normal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerGroup {
    pub name: String,
    pub offset: i32,
}

/// The result of an import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportedObj {
    pub platform: Platform,
    pub textures: ImportedTextures,
    /// Cockpit regions as left, bottom, right, top.
    pub regions: Vec<[i32; 4]>,
    pub layer_group: Option<LayerGroup>,
    pub slung_load_weight: Option<f64>,
    /// Parents always come before their children.
    pub nodes: Vec<ImportedNode>,
    pub diagnostics: Diagnostics,
}

impl ImportedObj {
    pub fn node(&self, name: &str) -> Option<&ImportedNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn roots(&self) -> impl Iterator<Item = &ImportedNode> {
        self.nodes.iter().filter(|n| n.parent.is_none())
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = &ImportedNode> {
        self.nodes.iter().filter(move |n| n.parent == Some(index))
    }

    pub fn meshes(&self) -> impl Iterator<Item = (&ImportedNode, &ImportedMesh)> {
        self.nodes.iter().filter_map(|n| match &n.kind {
            NodeKind::Mesh { mesh, .. } => Some((n, mesh)),
            _ => None,
        })
    }

    /// Depth of a node below the root.
    pub fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(index).and_then(|n| n.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent].parent;
        }
        depth
    }
}

/// An open `ANIM_begin` scope.
struct Scope {
    /// The node geometry in this scope hangs from.
    top: Option<usize>,
    /// Whether `top` was created inside this scope.
    owns_top: bool,
    /// Static transforms seen since `top` was created.
    pending: DMat4,
}

/// An `ANIM_trans_begin` or `ANIM_rotate_begin` block being read.
enum Keyed {
    Trans {
        dataref: String,
        values: Vec<f64>,
        locations: Vec<DVec3>,
        loop_value: Option<f64>,
        line: usize,
    },
    Rotate {
        axis: DVec3,
        dataref: String,
        values: Vec<f64>,
        angles: Vec<f64>,
        loop_value: Option<f64>,
        line: usize,
    },
}

/// Incremental builder fed one directive at a time.
pub struct ObjBuilder {
    platform: Platform,
    diags: Diagnostics,
    vertices: Vec<ImportedVertex>,
    line_vertices: Vec<ColoredPoint>,
    vlights: Vec<ColoredPoint>,
    indices: Vec<usize>,
    point_counts: Option<[usize; 4]>,
    textures: ImportedTextures,
    regions: Vec<[i32; 4]>,
    layer_group: Option<LayerGroup>,
    slung_load_weight: Option<f64>,
    nodes: Vec<ImportedNode>,
    scopes: Vec<Scope>,
    /// Static transforms outside any scope.
    root_pending: DMat4,
    keyed: Option<Keyed>,
    state: AttributeState,
    lod: Option<[f64; 2]>,
}

impl ObjBuilder {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            diags: Diagnostics::new(),
            vertices: Vec::new(),
            line_vertices: Vec::new(),
            vlights: Vec::new(),
            indices: Vec::new(),
            point_counts: None,
            textures: ImportedTextures::default(),
            regions: Vec::new(),
            layer_group: None,
            slung_load_weight: None,
            nodes: Vec::new(),
            scopes: Vec::new(),
            root_pending: DMat4::IDENTITY,
            keyed: None,
            state: AttributeState::default(),
            lod: None,
        }
    }

    /// Record a line that could not be read.
    pub fn skip(&mut self, line: usize, err: &LineError) {
        self.diags
            .warn(format!("Line {}: {}; line ignored", line, err), Vec::new());
    }

    pub fn apply(&mut self, directive: Directive, line: usize) {
        match directive {
            Directive::PointCounts(counts) => self.point_counts = Some(counts),
            Directive::Texture { slot, path } => match slot {
                TextureSlot::Diffuse => self.textures.diffuse = Some(path),
                TextureSlot::Lit => self.textures.lit = Some(path),
                TextureSlot::Normal => self.textures.normal = Some(path),
            },
            Directive::CockpitRegion(region) => self.regions.push(region),
            Directive::Vt {
                position,
                normal,
                uv,
            } => self.vertices.push(ImportedVertex {
                position: to_blender(position),
                normal: to_blender(normal),
                uv,
            }),
            Directive::VLine { position, color } => self.line_vertices.push(ColoredPoint {
                position: to_blender(position),
                color,
            }),
            Directive::VLight { position, color } => self.vlights.push(ColoredPoint {
                position: to_blender(position),
                color,
            }),
            Directive::Idx(indices) => self.indices.extend(indices),
            Directive::Tris { offset, count } => self.tris(offset, count, line),
            Directive::Lines { offset, count } => self.lines(offset, count, line),
            Directive::Lights { offset, count } => {
                match offset.checked_add(count).and_then(|end| self.vlights.get(offset..end)) {
                    Some(lights) => {
                        let lights = lights.to_vec();
                        self.add_node("Lights", NodeKind::Lights { lights });
                    }
                    None => self.out_of_range("LIGHTS", line),
                }
            }
            Directive::LightNamed { name, position } => {
                let light = ImportedLight::Named {
                    name,
                    position: to_blender(position),
                };
                self.add_node("Light", NodeKind::Light(light));
            }
            Directive::LightCustom {
                position,
                rgba,
                size,
                uv1,
                uv2,
                dataref,
            } => {
                let light = ImportedLight::Custom {
                    position: to_blender(position),
                    rgba,
                    size,
                    uv1,
                    uv2,
                    dataref,
                };
                self.add_node("Light", NodeKind::Light(light));
            }
            Directive::Smoke {
                kind,
                position,
                size,
            } => {
                let light = ImportedLight::Smoke {
                    kind,
                    position: to_blender(position),
                    size,
                };
                self.add_node("Smoke", NodeKind::Light(light));
            }
            Directive::SlungLoadWeight(weight) => self.slung_load_weight = Some(weight),
            Directive::Attr(attr) => self.attribute(attr),
            Directive::AnimBegin => {
                let top = self.current_top();
                self.scopes.push(Scope {
                    top,
                    owns_top: false,
                    pending: DMat4::IDENTITY,
                });
            }
            Directive::AnimEnd => {
                self.close_keyed();
                if self.scopes.pop().is_none() {
                    self.diags.warn(
                        format!("Line {}: ANIM_end without a matching ANIM_begin", line),
                        Vec::new(),
                    );
                }
            }
            Directive::Trans {
                from,
                to,
                v1,
                v2,
                dataref,
            } => self.trans(from, to, v1, v2, dataref, line),
            Directive::Rotate {
                axis,
                r1,
                r2,
                v1,
                v2,
                dataref,
            } => self.rotate(axis, r1, r2, v1, v2, dataref, line),
            Directive::TransBegin(dataref) => {
                self.close_keyed();
                self.keyed = Some(Keyed::Trans {
                    dataref,
                    values: Vec::new(),
                    locations: Vec::new(),
                    loop_value: None,
                    line,
                });
            }
            Directive::RotateBegin { axis, dataref } => {
                self.close_keyed();
                self.keyed = Some(Keyed::Rotate {
                    axis,
                    dataref,
                    values: Vec::new(),
                    angles: Vec::new(),
                    loop_value: None,
                    line,
                });
            }
            Directive::TransKey { value, position } => match &mut self.keyed {
                Some(Keyed::Trans {
                    values, locations, ..
                }) => {
                    values.push(value);
                    locations.push(to_blender(position));
                }
                _ => self.stray("ANIM_trans_key", line),
            },
            Directive::RotateKey { value, angle } => match &mut self.keyed {
                Some(Keyed::Rotate { values, angles, .. }) => {
                    values.push(value);
                    angles.push(angle);
                }
                _ => self.stray("ANIM_rotate_key", line),
            },
            Directive::KeyframeLoop(value) => match &mut self.keyed {
                Some(Keyed::Trans { loop_value, .. }) | Some(Keyed::Rotate { loop_value, .. }) => {
                    *loop_value = Some(value)
                }
                None => self.stray("ANIM_keyframe_loop", line),
            },
            Directive::TransEnd | Directive::RotateEnd => {
                if self.keyed.is_none() {
                    self.stray("keyframe block end", line);
                }
                self.close_keyed();
            }
            Directive::ShowHide {
                kind,
                v1,
                v2,
                dataref,
            } => {
                let anim = Animation::ShowHide(ShowHideAnimation {
                    kind,
                    dataref,
                    v1,
                    v2,
                });
                self.animate(anim, line);
            }
        }
    }

    pub fn finish(mut self) -> ImportedObj {
        if let Some(keyed) = self.keyed.take() {
            let line = match keyed {
                Keyed::Trans { line, .. } | Keyed::Rotate { line, .. } => line,
            };
            self.diags.warn(
                format!("Keyframe block started on line {} is never ended", line),
                Vec::new(),
            );
        }
        if !self.scopes.is_empty() {
            self.diags.warn(
                format!("{} animation scope(s) left open at end of file", self.scopes.len()),
                Vec::new(),
            );
        }
        if let Some(expected) = self.point_counts {
            let found = [
                self.vertices.len(),
                self.line_vertices.len(),
                self.vlights.len(),
                self.indices.len(),
            ];
            if expected != found {
                self.diags.warn(
                    format!(
                        "POINT_COUNTS says {:?} but the file has {:?}",
                        expected, found
                    ),
                    Vec::new(),
                );
            }
        }
        if self.nodes.is_empty() {
            self.diags.warn("The file contains no objects", Vec::new());
        }
        log::debug!("Imported {} nodes", self.nodes.len());

        ImportedObj {
            platform: self.platform,
            textures: self.textures,
            regions: self.regions,
            layer_group: self.layer_group,
            slung_load_weight: self.slung_load_weight,
            nodes: self.nodes,
            diagnostics: self.diags,
        }
    }

    fn attribute(&mut self, attr: Attribute) {
        let attr = match attr {
            Attribute::Lod { near, far } => {
                self.lod = Some([near, far]);
                self.state = AttributeState::default();
                return;
            }
            Attribute::LayerGroup { name, offset } => {
                self.layer_group = Some(LayerGroup { name, offset });
                return;
            }
            other => other,
        };
        let state = &mut self.state;
        match attr {
            Attribute::PolyOffset(offset) => state.poly_offset = offset,
            Attribute::Cull(cull) => state.two_sided = !cull,
            Attribute::Diffuse(color) => state.material.diffuse = color,
            Attribute::Emission(color) => state.material.emission = color,
            Attribute::Shiny(ratio) => state.material.shiny = ratio,
            Attribute::Reset => state.material = Material::DEFAULT,
            Attribute::Hard { deck, surface } => state.hard = Some(Hardness { deck, surface }),
            Attribute::NoHard => state.hard = None,
            Attribute::Cockpit => state.cockpit = Cockpit::Panel,
            Attribute::CockpitRegion(region) => state.cockpit = Cockpit::Region(region),
            Attribute::NoCockpit => {
                state.cockpit = Cockpit::None;
                state.manipulator = None;
            }
            Attribute::Manipulator { kind, args } => {
                let mut line = kind;
                for arg in args {
                    line.push('\t');
                    line.push_str(&arg);
                }
                state.manipulator = Some(line);
            }
            Attribute::Lod { .. } | Attribute::LayerGroup { .. } => {}
        }
    }

    fn tris(&mut self, offset: usize, count: usize, line: usize) {
        let Some(span) = offset
            .checked_add(count)
            .and_then(|end| self.indices.get(offset..end))
            .map(<[usize]>::to_vec)
        else {
            return self.out_of_range("TRIS", line);
        };
        if count % 3 != 0 {
            self.diags.warn(
                format!("Line {}: TRIS count {} is not a multiple of 3", line, count),
                Vec::new(),
            );
        }

        let mut mesh = ImportedMesh::default();
        let mut remap: Vec<(usize, usize)> = Vec::new();
        for tri in span.chunks_exact(3) {
            let mut face = [0; 3];
            // Reversed to restore the scene's winding.
            for (corner, &index) in face.iter_mut().zip(tri.iter().rev()) {
                let local = match remap.iter().find(|(global, _)| *global == index) {
                    Some((_, local)) => *local,
                    None => {
                        let Some(vertex) = self.vertices.get(index) else {
                            return self.out_of_range("TRIS", line);
                        };
                        mesh.vertices.push(*vertex);
                        remap.push((index, mesh.vertices.len() - 1));
                        mesh.vertices.len() - 1
                    }
                };
                *corner = local;
            }
            mesh.faces.push(face);
        }

        let state = self.state.clone();
        self.add_node("Mesh", NodeKind::Mesh { mesh, state });
    }

    fn lines(&mut self, offset: usize, count: usize, line: usize) {
        let Some(span) = offset
            .checked_add(count)
            .and_then(|end| self.indices.get(offset..end))
            .map(<[usize]>::to_vec)
        else {
            return self.out_of_range("LINES", line);
        };
        let mut segments = Vec::with_capacity(count / 2);
        for pair in span.chunks_exact(2) {
            match (self.line_vertices.get(pair[0]), self.line_vertices.get(pair[1])) {
                (Some(a), Some(b)) => segments.push([*a, *b]),
                _ => return self.out_of_range("LINES", line),
            }
        }
        let state = self.state.clone();
        self.add_node("Line", NodeKind::Lines { segments, state });
    }

    fn trans(&mut self, from: DVec3, to: DVec3, v1: f64, v2: f64, dataref: String, line: usize) {
        self.close_keyed();
        let same_place = round_vec(from) == round_vec(to);
        let same_values = round_to(v1, KEYFRAME_PRECISION) == round_to(v2, KEYFRAME_PRECISION);
        if same_place && same_values {
            self.bake(DMat4::from_translation(to_blender(from)));
            return;
        }
        if same_values {
            self.diags.warn(
                format!(
                    "Line {}: ANIM_trans has different locations but the same dataref values",
                    line
                ),
                Vec::new(),
            );
        }
        let anim = Animation::Translate(TranslateAnimation {
            dataref,
            values: vec![v1, v2],
            locations: vec![to_blender(from), to_blender(to)],
            loop_value: None,
        });
        self.animate(anim, line);
    }

    #[allow(clippy::too_many_arguments)]
    fn rotate(&mut self, axis: DVec3, r1: f64, r2: f64, v1: f64, v2: f64, dataref: String, line: usize) {
        self.close_keyed();
        let axis = to_blender(axis);
        let same_angle = round_to(r1, KEYFRAME_PRECISION) == round_to(r2, KEYFRAME_PRECISION);
        let same_values = round_to(v1, KEYFRAME_PRECISION) == round_to(v2, KEYFRAME_PRECISION);
        if same_angle && same_values {
            let q = DQuat::from_axis_angle(axis.normalize_or_zero(), r1.to_radians());
            self.bake(DMat4::from_quat(q));
            return;
        }
        if same_values {
            self.diags.warn(
                format!(
                    "Line {}: ANIM_rotate has different angles but the same dataref values",
                    line
                ),
                Vec::new(),
            );
        }
        let anim = Animation::Rotate(RotateAnimation {
            dataref,
            values: vec![v1, v2],
            axes: vec![RotationAxis {
                axis,
                angles: vec![r1, r2],
            }],
            loop_value: None,
        });
        self.animate(anim, line);
    }

    fn close_keyed(&mut self) {
        let Some(keyed) = self.keyed.take() else {
            return;
        };
        let (anim, line) = match keyed {
            Keyed::Trans {
                dataref,
                values,
                locations,
                loop_value,
                line,
            } => (
                Animation::Translate(TranslateAnimation {
                    dataref,
                    values,
                    locations,
                    loop_value,
                }),
                line,
            ),
            Keyed::Rotate {
                axis,
                dataref,
                values,
                angles,
                loop_value,
                line,
            } => (
                Animation::Rotate(RotateAnimation {
                    dataref,
                    values,
                    axes: vec![RotationAxis {
                        axis: to_blender(axis),
                        angles,
                    }],
                    loop_value,
                }),
                line,
            ),
        };
        self.animate(anim, line);
    }

    /// Attach an animation to the current scope's empty, or nest a new one.
    fn animate(&mut self, anim: Animation, line: usize) {
        let Some(scope) = self.scopes.last() else {
            self.diags.warn(
                format!("Line {}: animation outside ANIM_begin ignored", line),
                Vec::new(),
            );
            return;
        };

        if let (Some(top), true) = (scope.top, scope.owns_top && scope.pending == DMat4::IDENTITY) {
            let existing = &mut self.nodes[top].animations;
            if merge_into(existing, &anim) {
                return;
            }
            if can_follow(existing, &anim) {
                existing.push(anim);
                return;
            }
        }

        let pending = scope.pending;
        let index = self.push_node("Anim", pending, NodeKind::Empty);
        self.nodes[index].animations.push(anim);
        if let Some(scope) = self.scopes.last_mut() {
            scope.top = Some(index);
            scope.owns_top = true;
            scope.pending = DMat4::IDENTITY;
        }
    }

    /// Fold a static transform into whatever comes next in this scope.
    fn bake(&mut self, m: DMat4) {
        match self.scopes.last_mut() {
            Some(scope) => scope.pending *= m,
            None => self.root_pending *= m,
        }
    }

    fn current_top(&self) -> Option<usize> {
        self.scopes.last().and_then(|s| s.top)
    }

    fn add_node(&mut self, prefix: &str, kind: NodeKind) {
        self.close_keyed();
        let matrix = match self.scopes.last() {
            Some(scope) => scope.pending,
            None => self.root_pending,
        };
        self.push_node(prefix, matrix, kind);
    }

    fn push_node(&mut self, prefix: &str, matrix: DMat4, kind: NodeKind) -> usize {
        let ordinal = self
            .nodes
            .iter()
            .filter(|n| n.name.starts_with(prefix) && n.name[prefix.len()..].starts_with('.'))
            .count();
        self.nodes.push(ImportedNode {
            name: format!("{}.{:03}", prefix, ordinal),
            parent: self.current_top(),
            matrix,
            animations: Vec::new(),
            lod: self.lod,
            kind,
        });
        self.nodes.len() - 1
    }

    fn out_of_range(&mut self, directive: &str, line: usize) {
        self.diags.warn(
            format!("Line {}: {} refers past the end of its table; skipped", line, directive),
            Vec::new(),
        );
    }

    fn stray(&mut self, what: &str, line: usize) {
        self.diags.warn(
            format!("Line {}: {} outside a keyframe block ignored", line, what),
            Vec::new(),
        );
    }
}

fn round_vec(v: DVec3) -> [f64; 3] {
    [
        round_to(v.x, KEYFRAME_PRECISION),
        round_to(v.y, KEYFRAME_PRECISION),
        round_to(v.z, KEYFRAME_PRECISION),
    ]
}

fn same_values(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| round_to(*x, KEYFRAME_PRECISION) == round_to(*y, KEYFRAME_PRECISION))
}

/// Add a rotation's axes to a rotation already on the node.
fn merge_into(existing: &mut [Animation], anim: &Animation) -> bool {
    let Animation::Rotate(new) = anim else {
        return false;
    };
    match existing.last_mut() {
        Some(Animation::Rotate(current)) if current.accepts(new) => {
            current.axes.extend(new.axes.iter().cloned());
            true
        }
        _ => false,
    }
}

/// Whether `anim` can be applied after everything already on a node.
fn can_follow(existing: &[Animation], anim: &Animation) -> bool {
    match anim {
        Animation::ShowHide(_) => true,
        Animation::Translate(_) => existing
            .iter()
            .all(|a| matches!(a, Animation::ShowHide(_))),
        Animation::Rotate(_) => !existing.iter().any(|a| matches!(a, Animation::Rotate(_))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::parser::parse_line;

    fn build(body: &str) -> ImportedObj {
        let mut builder = ObjBuilder::new(Platform::Ibm);
        for (n, line) in body.lines().enumerate() {
            match parse_line(line) {
                Ok(Some(d)) => builder.apply(d, n + 4),
                Ok(None) => {}
                Err(err) => builder.skip(n + 4, &err),
            }
        }
        builder.finish()
    }

    const QUAD: &str = "VT\t0 0 0\t0 1 0\t0 0\n\
        VT\t1 0 0\t0 1 0\t1 0\n\
        VT\t1 0 -1\t0 1 0\t1 1\n\
        VT\t0 0 -1\t0 1 0\t0 1\n\
        IDX\t3\nIDX\t2\nIDX\t1\nIDX\t3\nIDX\t1\nIDX\t0\n";

    #[test]
    fn test_mesh_from_index_span() {
        let obj = build(&format!("{}TRIS\t0 6\n", QUAD));
        let (node, mesh) = obj.meshes().next().unwrap();
        assert_eq!(node.name, "Mesh.000");
        assert_eq!(node.parent, None);
        assert_eq!(mesh.vertices.len(), 4);
        // First triangle 3 2 1 is read back as 1 2 3, renumbered by first use.
        assert_eq!(mesh.faces, vec![[0, 1, 2], [3, 0, 2]]);
        assert_eq!(mesh.vertices[0].position, DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(mesh.vertices[0].normal, DVec3::Z);
        assert!(obj.diagnostics.is_empty());
    }

    #[test]
    fn test_out_of_range_span() {
        let obj = build(&format!("{}TRIS\t3 6\n", QUAD));
        assert_eq!(obj.meshes().count(), 0);
        assert!(obj.diagnostics.contains("TRIS refers past the end"));
    }

    #[test]
    fn test_span_end_overflow() {
        let obj = build(&format!("{}TRIS\t18446744073709551615 3\n", QUAD));
        assert_eq!(obj.meshes().count(), 0);
        assert!(obj.diagnostics.contains("TRIS refers past the end"));

        let obj = build(
            "VLINE\t0 0 0\t1 0 0\nVLINE\t1 0 0\t1 0 0\nIDX\t0\nIDX\t1\n\
             LINES\t18446744073709551615 2\n",
        );
        assert!(obj.diagnostics.contains("LINES refers past the end"));

        let obj = build("VLIGHT\t0 0 0\t1 1 1\nLIGHTS\t1 18446744073709551615\n");
        assert!(obj.diagnostics.contains("LIGHTS refers past the end"));
    }

    #[test]
    fn test_attribute_snapshot() {
        let body = format!(
            "{}ATTR_no_cull\nATTR_hard_deck\tconcrete\nATTR_diffuse_rgb\t1 0 0\nTRIS\t0 3\n\
             ATTR_cull\nATTR_no_hard\nATTR_reset\nTRIS\t3 3\n",
            QUAD
        );
        let obj = build(&body);
        let states: Vec<&AttributeState> = obj
            .nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Mesh { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert!(states[0].two_sided);
        assert_eq!(
            states[0].hard,
            Some(Hardness {
                deck: true,
                surface: Some(SurfaceType::Concrete),
            })
        );
        assert_eq!(states[0].material.diffuse, [1.0, 0.0, 0.0]);
        assert_eq!(states[1], &AttributeState::default());
    }

    #[test]
    fn test_scopes_build_hierarchy() {
        let body = format!(
            "{}ANIM_begin\n\
             ANIM_trans\t0 0 0\t1 0 0\t0 1\tsim/a\n\
             \tANIM_begin\n\
             \tANIM_rotate\t0 1 0\t0 90\t0 1\tsim/b\n\
             \tTRIS\t0 3\n\
             \tANIM_end\n\
             TRIS\t3 3\n\
             ANIM_end\n\
             TRIS\t0 6\n",
            QUAD
        );
        let obj = build(&body);
        let names: Vec<(&str, Option<usize>)> =
            obj.nodes.iter().map(|n| (n.name.as_str(), n.parent)).collect();
        assert_eq!(
            names,
            vec![
                ("Anim.000", None),
                ("Anim.001", Some(0)),
                ("Mesh.000", Some(1)),
                ("Mesh.001", Some(0)),
                ("Mesh.002", None),
            ]
        );
        assert_eq!(obj.depth(2), 2);
        assert!(obj.diagnostics.is_empty());
    }

    #[test]
    fn test_translation_and_rotation_share_empty() {
        let body = format!(
            "{}ANIM_begin\n\
             ANIM_hide\t0 0.5\tsim/h\n\
             ANIM_trans\t0 0 0\t2 0 0\t-1 1\tsim/a\n\
             ANIM_rotate\t0 1 0\t0 90\t-1 1\tsim/a\n\
             TRIS\t0 3\n\
             ANIM_end\n",
            QUAD
        );
        let obj = build(&body);
        assert_eq!(obj.nodes.len(), 2);
        let anims = &obj.nodes[0].animations;
        assert_eq!(anims.len(), 3);
        assert!(matches!(anims[0], Animation::ShowHide(_)));
        assert!(matches!(anims[1], Animation::Translate(_)));
        assert!(matches!(anims[2], Animation::Rotate(_)));
    }

    #[test]
    fn test_rotation_before_translation_nests() {
        let body = format!(
            "{}ANIM_begin\n\
             ANIM_rotate\t0 1 0\t0 90\t0 1\tsim/a\n\
             ANIM_trans\t0 0 0\t2 0 0\t0 1\tsim/a\n\
             TRIS\t0 3\n\
             ANIM_end\n",
            QUAD
        );
        let obj = build(&body);
        assert_eq!(obj.nodes.len(), 3);
        assert_eq!(obj.nodes[1].parent, Some(0));
        assert_eq!(obj.nodes[2].parent, Some(1));
    }

    #[test]
    fn test_euler_axes_merge() {
        let body = format!(
            "{}ANIM_begin\n\
             ANIM_rotate_begin\t0 0 1\tsim/r\n\
             \tANIM_rotate_key\t0\t0\n\
             \tANIM_rotate_key\t1\t30\n\
             ANIM_rotate_end\n\
             ANIM_rotate_begin\t0 1 0\tsim/r\n\
             \tANIM_rotate_key\t0\t0\n\
             \tANIM_rotate_key\t1\t45\n\
             ANIM_rotate_end\n\
             ANIM_rotate_begin\t1 0 0\tsim/r\n\
             \tANIM_rotate_key\t0\t0\n\
             \tANIM_rotate_key\t1\t60\n\
             ANIM_rotate_end\n\
             TRIS\t0 3\n\
             ANIM_end\n",
            QUAD
        );
        let obj = build(&body);
        assert_eq!(obj.nodes.len(), 2);
        let Animation::Rotate(rotate) = &obj.nodes[0].animations[0] else {
            panic!("expected a rotation");
        };
        assert_eq!(rotate.axes.len(), 3);
        let keys = rotate.keyframes();
        assert!(keys[0].abs_diff_eq(DQuat::IDENTITY, 1e-9));

        // X-Plane Z, Y, X are scene -Y, Z, X.
        let expected = DQuat::from_axis_angle(DVec3::NEG_Y, 30f64.to_radians())
            * DQuat::from_axis_angle(DVec3::Z, 45f64.to_radians())
            * DQuat::from_axis_angle(DVec3::X, 60f64.to_radians());
        assert!(keys[1].abs_diff_eq(expected, 1e-9));
    }

    #[test]
    fn test_static_transforms_bake() {
        let body = format!(
            "{}ANIM_begin\n\
             ANIM_trans\t1 2 3\t1 2 3\t0 0\tno_ref\n\
             TRIS\t0 3\n\
             ANIM_end\n",
            QUAD
        );
        let obj = build(&body);
        assert_eq!(obj.nodes.len(), 1);
        let mesh = &obj.nodes[0];
        assert!(mesh.animations.is_empty());
        assert_eq!(
            mesh.matrix.transform_point3(DVec3::ZERO),
            DVec3::new(1.0, -3.0, 2.0)
        );
    }

    #[test]
    fn test_malformed_trans_warns() {
        let body = format!(
            "{}ANIM_begin\nANIM_trans\t0 0 0\t1 0 0\t1 1\tsim/a\nTRIS\t0 3\nANIM_end\n",
            QUAD
        );
        let obj = build(&body);
        assert!(obj
            .diagnostics
            .contains("different locations but the same dataref values"));
        assert_eq!(obj.nodes.len(), 2);
    }

    #[test]
    fn test_unbalanced_scopes() {
        let obj = build("ANIM_end\nANIM_begin\nANIM_begin\n");
        assert!(obj.diagnostics.contains("Line 4: ANIM_end without a matching ANIM_begin"));
        assert!(obj.diagnostics.contains("2 animation scope(s) left open"));
    }

    #[test]
    fn test_bad_line_is_skipped() {
        let obj = build(&format!("{}IDX\tx\nTRIS\t0 3\n", QUAD));
        assert!(obj.diagnostics.contains("IDX has an invalid index \"x\""));
        assert_eq!(obj.meshes().count(), 1);
    }

    #[test]
    fn test_lights_and_lines() {
        let body = "VLINE\t0 0 0\t1 0 0\n\
            VLINE\t1 0 0\t1 0 0\n\
            VLIGHT\t0 1 0\t1 1 1\n\
            IDX\t0\nIDX\t1\n\
            LINES\t0 2\n\
            LIGHTS\t0 1\n\
            LIGHT_NAMED\tairplane_beacon\t\t0 2 0\n";
        let obj = build(body);
        assert_eq!(obj.nodes.len(), 3);
        assert!(matches!(&obj.nodes[0].kind, NodeKind::Lines { segments, .. } if segments.len() == 1));
        assert!(matches!(&obj.nodes[1].kind, NodeKind::Lights { lights } if lights.len() == 1));
        assert!(matches!(
            &obj.nodes[2].kind,
            NodeKind::Light(ImportedLight::Named { name, .. }) if name == "airplane_beacon"
        ));
    }

    #[test]
    fn test_lod_recorded() {
        let body = format!("{}ATTR_LOD\t0 1000\nTRIS\t0 3\nATTR_LOD\t1000 4000\nTRIS\t3 3\n", QUAD);
        let obj = build(&body);
        assert_eq!(obj.nodes[0].lod, Some([0.0, 1000.0]));
        assert_eq!(obj.nodes[1].lod, Some([1000.0, 4000.0]));
    }

    #[test]
    fn test_point_count_mismatch() {
        let obj = build(&format!("POINT_COUNTS\t5 0 0 6\n{}TRIS\t0 6\n", QUAD));
        assert!(obj.diagnostics.contains("POINT_COUNTS says [5, 0, 0, 6]"));
    }
}
