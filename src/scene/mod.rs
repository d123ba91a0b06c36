//! Plain in-memory scene description consumed by the exporter.
//!
//! The scene is authored in a Z-up space. Object matrices are world
//! matrices (column major) sampled at the first animation frame. Armatures
//! carry their per-frame bone poses directly, so nothing has to be evaluated
//! or toggled on shared state while exporting.

pub mod properties;

pub use properties::{light_name, lod_overrides, CustomLightOptions, EmptyOptions, MeshOptions};

use crate::error::{ObjError, Result};
use crate::types::float_repr;
use glam::{DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A complete scene to export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    /// Diffuse texture path as it should appear in the OBJ.
    #[serde(default)]
    pub texture: Option<String>,
    /// Cockpit panel regions, in declaration order.
    #[serde(default)]
    pub panel_regions: Vec<PanelRegion>,
    /// Named object groups; an object belongs to the first group (by name)
    /// that lists it.
    #[serde(default)]
    pub groups: Vec<ObjectGroup>,
    /// Objects in traversal order.
    #[serde(default)]
    pub objects: Vec<SceneObject>,
}

impl Scene {
    /// Load a scene from a JSON file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Look up an object that another object refers to.
    pub fn require(&self, name: &str, referrer: &str) -> Result<&SceneObject> {
        self.object(name).ok_or_else(|| ObjError::MissingParent {
            parent: name.to_string(),
            object: referrer.to_string(),
        })
    }

    /// Name of the group `object` is drawn with.
    pub fn group_of(&self, object: &str) -> Option<&str> {
        let mut groups: Vec<&ObjectGroup> = self.groups.iter().collect();
        groups.sort_by_key(|g| g.name.to_lowercase());
        groups
            .into_iter()
            .find(|g| g.objects.iter().any(|o| o == object))
            .map(|g| g.name.as_str())
    }

    /// Index of the panel region using `image`.
    pub fn region_index(&self, image: &str) -> Option<usize> {
        self.panel_regions.iter().position(|r| r.image == image)
    }
}

/// A rectangle of the cockpit panel texture, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRegion {
    /// Image name used by faces textured with this region.
    pub image: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectGroup {
    pub name: String,
    #[serde(default)]
    pub objects: Vec<String>,
}

fn default_layers() -> u32 {
    1
}

fn identity_matrix() -> [f64; 16] {
    DMat4::IDENTITY.to_cols_array()
}

/// One object in the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    /// Layer bitmask; layers 1, 2 and 4 map to the three LODs.
    #[serde(default = "default_layers")]
    pub layers: u32,
    /// World matrix, column major.
    #[serde(default = "identity_matrix")]
    pub matrix: [f64; 16],
    #[serde(default)]
    pub parent: Option<String>,
    /// Bone of the parent armature this object hangs from.
    #[serde(default)]
    pub parent_bone: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub data: ObjectData,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, data: ObjectData) -> Self {
        Self {
            name: name.into(),
            layers: 1,
            matrix: identity_matrix(),
            parent: None,
            parent_bone: None,
            properties: Vec::new(),
            data,
        }
    }

    pub fn with_matrix(mut self, matrix: DMat4) -> Self {
        self.matrix = matrix.to_cols_array();
        self
    }

    pub fn with_layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>, bone: Option<&str>) -> Self {
        self.parent = Some(parent.into());
        self.parent_bone = bone.map(str::to_string);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.push(Property::new(name, value));
        self
    }

    pub fn world_matrix(&self) -> DMat4 {
        DMat4::from_cols_array(&self.matrix)
    }

    /// Last property whose trimmed name is `name`.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().rev().find(|p| p.name.trim() == name)
    }

    pub fn kind(&self) -> &'static str {
        match self.data {
            ObjectData::Mesh(_) => "Mesh",
            ObjectData::Lamp(_) => "Lamp",
            ObjectData::Armature(_) => "Armature",
            ObjectData::Empty => "Empty",
            ObjectData::Other => "Object",
        }
    }

    pub fn as_armature(&self) -> Option<&ArmatureData> {
        match &self.data {
            ObjectData::Armature(a) => Some(a),
            _ => None,
        }
    }
}

/// Type-specific object payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectData {
    Mesh(MeshData),
    Lamp(LampData),
    Armature(ArmatureData),
    #[default]
    Empty,
    /// Cameras, curves and anything else that is never exported.
    Other,
}

/// A user property attached to an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

impl Property {
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    /// Numeric value of an int or float property.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness: non-zero numbers, non-empty strings, `true`.
    pub fn is_truthy(&self) -> bool {
        match self {
            PropertyValue::Bool(b) => *b,
            PropertyValue::Int(i) => *i != 0,
            PropertyValue::Float(f) => *f != 0.0,
            PropertyValue::String(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(true) => f.write_str("True"),
            PropertyValue::Bool(false) => f.write_str("False"),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(v) => f.write_str(&float_repr(*v)),
            PropertyValue::String(s) => f.write_str(s),
        }
    }
}

/// Mesh geometry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    #[serde(default)]
    pub faces: Vec<MeshFace>,
    /// Material slots; faces index into this list.
    #[serde(default)]
    pub materials: Vec<Option<MaterialSlot>>,
}

impl MeshData {
    /// First material slot, used by custom lights.
    pub fn first_material(&self) -> Option<&MaterialSlot> {
        self.materials.first().and_then(Option::as_ref)
    }

    /// A mesh whose first material has halo set is a custom light.
    pub fn is_custom_light(&self) -> bool {
        self.first_material().is_some_and(|m| m.halo)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshVertex {
    pub co: [f64; 3],
    #[serde(default)]
    pub normal: [f64; 3],
}

impl MeshVertex {
    pub fn new(co: [f64; 3], normal: [f64; 3]) -> Self {
        Self { co, normal }
    }
}

/// A mesh face; only triangles and quads are exported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshFace {
    pub vertices: Vec<usize>,
    /// One UV per corner for textured faces.
    #[serde(default)]
    pub uv: Vec<[f64; 2]>,
    #[serde(default)]
    pub smooth: bool,
    /// Flat face normal.
    #[serde(default)]
    pub normal: [f64; 3],
    #[serde(default)]
    pub material: usize,
    /// Render mode; faces without one are untextured and dynamic.
    #[serde(default)]
    pub mode: Option<FaceMode>,
    #[serde(default)]
    pub image: Option<String>,
}

impl MeshFace {
    pub fn new(vertices: Vec<usize>) -> Self {
        Self {
            vertices,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> FaceMode {
        self.mode.unwrap_or_else(FaceMode::untextured)
    }
}

/// Per-face render flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceMode {
    pub tex: bool,
    pub invisible: bool,
    pub two_sided: bool,
    /// Tiled faces get no polygon offset.
    pub tiles: bool,
    /// Dynamic faces are never hard.
    pub dynamic: bool,
    /// Alpha blended transparency.
    pub alpha: bool,
}

impl FaceMode {
    pub fn untextured() -> Self {
        Self {
            dynamic: true,
            ..Default::default()
        }
    }

    pub fn textured() -> Self {
        Self {
            tex: true,
            dynamic: true,
            ..Default::default()
        }
    }
}

fn white() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

fn one() -> f64 {
    1.0
}

/// Authoring-side material slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSlot {
    #[serde(default = "white")]
    pub color: [f64; 3],
    /// Mirror colour; emission is `mirror * emit`.
    #[serde(default = "white")]
    pub mirror: [f64; 3],
    #[serde(default)]
    pub emit: f64,
    #[serde(default)]
    pub spec: f64,
    #[serde(default = "one")]
    pub alpha: f64,
    /// Marks a mesh as a custom light.
    #[serde(default)]
    pub halo: bool,
    #[serde(default)]
    pub halo_size: f64,
    /// Texture crop rectangle `(u1, v1, u2, v2)` for custom lights.
    #[serde(default)]
    pub texture_crop: Option<[f64; 4]>,
    #[serde(default)]
    pub texture_image: Option<String>,
}

impl Default for MaterialSlot {
    fn default() -> Self {
        Self {
            color: white(),
            mirror: white(),
            emit: 0.0,
            spec: 0.0,
            alpha: 1.0,
            halo: false,
            halo_size: 0.0,
            texture_crop: None,
            texture_image: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LampKind {
    #[default]
    Point,
    Spot,
    Sun,
    Area,
    Hemi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LampData {
    #[serde(default)]
    pub kind: LampKind,
    #[serde(default = "white")]
    pub color: [f64; 3],
    #[serde(default = "one")]
    pub energy: f64,
}

impl Default for LampData {
    fn default() -> Self {
        Self {
            kind: LampKind::Point,
            color: white(),
            energy: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmatureData {
    pub bones: Vec<Bone>,
}

impl ArmatureData {
    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }
}

fn identity_quat() -> [f64; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

/// A bone with its rest placement and sampled pose per frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Connected bones cannot translate away from their parent.
    #[serde(default)]
    pub connected: bool,
    /// Head position in armature space.
    #[serde(default)]
    pub head: [f64; 3],
    /// Rest orientation in armature space, `(w, x, y, z)`.
    #[serde(default = "identity_quat")]
    pub rotation: [f64; 4],
    /// Pose samples for frames 1, 2, ...
    #[serde(default)]
    pub frames: Vec<BonePose>,
}

impl Bone {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            connected: false,
            head: [0.0; 3],
            rotation: identity_quat(),
            frames: Vec::new(),
        }
    }

    pub fn rest_rotation(&self) -> DQuat {
        let [w, x, y, z] = self.rotation;
        DQuat::from_xyzw(x, y, z, w).normalize()
    }

    pub fn head(&self) -> DVec3 {
        DVec3::from_array(self.head)
    }
}

/// Pose of a bone relative to its rest placement at one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BonePose {
    /// Location in bone space; absent when the bone has no location keys.
    #[serde(default)]
    pub location: Option<[f64; 3]>,
    /// Rotation `(w, x, y, z)` in bone space; absent when not keyed.
    #[serde(default)]
    pub rotation: Option<[f64; 4]>,
}

impl BonePose {
    pub fn new(location: Option<[f64; 3]>, rotation: Option<[f64; 4]>) -> Self {
        Self { location, rotation }
    }

    pub fn rotation_quat(&self) -> Option<DQuat> {
        self.rotation
            .map(|[w, x, y, z]| DQuat::from_xyzw(x, y, z, w).normalize())
    }
}
