//! Bone animation resolution.
//!
//! Every exported object hangs from at most one animation chain. A chain is
//! built from the object's parent bone up through parent bones and parent
//! armatures. Each link becomes an [`AnimNode`] holding keyframes already in
//! X-Plane space. Structurally equal nodes are shared so that objects on
//! the same bone end up inside one `ANIM_begin` block.

use crate::diagnostic::Diagnostics;
use crate::error::{ObjError, Result};
use crate::registry::{make_short_name, DatarefLookup, DatarefRegistry, Manipulator, ManipulatorRegistry};
use crate::scene::{ArmatureData, Bone, Property, PropertyValue, Scene, SceneObject};
use crate::types::{approx_eq, round4, rotation_only, to_blender, to_xplane, to_xplane_dir, LIMIT};
use glam::{DMat4, DVec3};

/// Handle to an interned animation node. The root is the absence of
/// animation and always sorts first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnimId(usize);

impl AnimId {
    pub const ROOT: AnimId = AnimId(0);

    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Show,
    Hide,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Show => "show",
            Visibility::Hide => "hide",
        }
    }
}

/// An `ANIM_show` or `ANIM_hide` range.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowHide {
    pub kind: Visibility,
    pub dataref: String,
    pub v1: f64,
    pub v2: f64,
}

/// One level of animation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimNode {
    pub parent: AnimId,
    pub dataref: String,
    /// Per-frame offsets, or a single offset when the bone doesn't move.
    pub translations: Vec<DVec3>,
    /// One axis when every frame rotates about the same axis, else one per
    /// frame. Empty when nothing rotates.
    pub axes: Vec<DVec3>,
    /// Per-frame angles in degrees.
    pub angles: Vec<f64>,
    /// Dataref value at each frame.
    pub values: Vec<f64>,
    pub loop_value: Option<f64>,
    pub show_hide: Vec<ShowHide>,
    pub manipulator: Option<Manipulator>,
}

impl AnimNode {
    fn root() -> Self {
        Self {
            parent: AnimId::ROOT,
            dataref: String::new(),
            translations: Vec::new(),
            axes: Vec::new(),
            angles: Vec::new(),
            values: Vec::new(),
            loop_value: None,
            show_hide: Vec::new(),
            manipulator: None,
        }
    }

    /// Equality with geometric tolerance on keyframes.
    pub fn same_as(&self, other: &AnimNode) -> bool {
        self.parent == other.parent
            && self.dataref == other.dataref
            && self.values == other.values
            && self.loop_value == other.loop_value
            && self.show_hide == other.show_hide
            && self.manipulator == other.manipulator
            && same_points(&self.translations, &other.translations)
            && same_points(&self.axes, &other.axes)
            && self.angles.len() == other.angles.len()
            && self
                .angles
                .iter()
                .zip(&other.angles)
                .all(|(a, b)| (a - b).abs() <= LIMIT)
    }
}

fn same_points(a: &[DVec3], b: &[DVec3]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(p, q)| approx_eq(*p, *q, LIMIT))
}

/// Arena of interned animation nodes; index 0 is the root.
#[derive(Debug, Clone)]
pub struct AnimRegistry {
    nodes: Vec<AnimNode>,
}

impl Default for AnimRegistry {
    fn default() -> Self {
        Self {
            nodes: vec![AnimNode::root()],
        }
    }
}

impl AnimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of an equal node, adding `node` if there is none.
    pub fn intern(&mut self, node: AnimNode) -> AnimId {
        if let Some(index) = self.nodes.iter().skip(1).position(|n| n.same_as(&node)) {
            return AnimId(index + 1);
        }
        self.nodes.push(node);
        AnimId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: AnimId) -> &AnimNode {
        &self.nodes[id.0]
    }

    /// Nodes from the outermost down to `id`, excluding the root.
    pub fn chain(&self, id: AnimId) -> Vec<AnimId> {
        let mut chain = Vec::new();
        let mut current = id;
        while !current.is_root() {
            chain.push(current);
            current = self.nodes[current.0].parent;
        }
        chain.reverse();
        chain
    }

    /// Nesting depth; the root is 0.
    pub fn depth(&self, id: AnimId) -> usize {
        self.chain(id).len()
    }

    /// Number of animation nodes, excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dataref, per-frame values and loop value bound to a bone or property.
#[derive(Debug, Clone, PartialEq)]
pub struct DatarefBinding {
    pub dataref: String,
    pub values: Vec<Option<f64>>,
    pub loop_value: Option<f64>,
}

/// Builds animation chains for scene objects.
pub struct AnimResolver<'a> {
    scene: &'a Scene,
    datarefs: &'a DatarefRegistry,
    manipulators: &'a ManipulatorRegistry,
    registry: AnimRegistry,
    v9: bool,
}

impl<'a> AnimResolver<'a> {
    pub fn new(
        scene: &'a Scene,
        datarefs: &'a DatarefRegistry,
        manipulators: &'a ManipulatorRegistry,
    ) -> Self {
        Self {
            scene,
            datarefs,
            manipulators,
            registry: AnimRegistry::new(),
            v9: false,
        }
    }

    pub fn registry(&self) -> &AnimRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> AnimRegistry {
        self.registry
    }

    /// True once any bone used more than two keyframes.
    pub fn requires_v9(&self) -> bool {
        self.v9
    }

    /// Animation of `child`, [`AnimId::ROOT`] when it isn't animated.
    pub fn resolve(&mut self, child: &SceneObject, diags: &mut Diagnostics) -> Result<AnimId> {
        let scene = self.scene;
        let Some(parent_name) = child.parent.as_deref() else {
            return Ok(AnimId::ROOT);
        };
        let parent = scene.require(parent_name, &child.name)?;
        let Some(armature) = parent.as_armature() else {
            return Ok(AnimId::ROOT);
        };

        let bone_name = child
            .parent_bone
            .as_deref()
            .ok_or_else(|| ObjError::MissingParentBone {
                kind: child.kind().to_string(),
                object: child.name.clone(),
            })?;
        let bone = armature
            .bone(bone_name)
            .ok_or_else(|| deleted_bone(bone_name, child))?;

        self.resolve_bone(child, parent, armature, bone, diags)
    }

    fn resolve_bone(
        &mut self,
        child: &SceneObject,
        object: &SceneObject,
        armature: &ArmatureData,
        bone: &Bone,
        diags: &mut Diagnostics,
    ) -> Result<AnimId> {
        let manipulator = self
            .manipulators
            .from_properties(&object.properties, &object.name)?;

        let parent = match bone.parent.as_deref() {
            Some(name) => {
                let parent_bone = armature.bone(name).ok_or_else(|| deleted_bone(name, child))?;
                self.resolve_bone(child, object, armature, parent_bone, diags)?
            }
            // An armature parented to another armature's bone continues
            // that chain.
            None => self.resolve(object, diags)?,
        };

        let mut show_hide = Vec::new();
        if bone.parent.is_none() {
            for prop in &object.properties {
                let name = prop.name.trim();
                for (suffix, kind) in [("_hide_v", Visibility::Hide), ("_show_v", Visibility::Show)] {
                    let Some(pos) = name.find(suffix) else {
                        continue;
                    };
                    let digits = &name[pos + suffix.len()..];
                    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                        continue;
                    }
                    let first: usize = match digits.parse() {
                        Ok(first) if first & 1 == 1 => first,
                        _ => continue,
                    };
                    let binding =
                        self.dataref_values(object, child, &name[..pos], &suffix[..5], first, 2)?;
                    if let [Some(v1), Some(v2)] = binding.values[..] {
                        show_hide.push(ShowHide {
                            kind,
                            dataref: binding.dataref,
                            v1,
                            v2,
                        });
                    }
                }
            }
        }

        let frames = bone.frames.len();
        if frames < 2 {
            diags.warn(
                format!(
                    "Ignoring bone \"{}\" in armature \"{}\" - you haven't created animation keys in frames 1 and 2",
                    bone.name, object.name
                ),
                vec![child.name.clone()],
            );
            if !show_hide.is_empty() {
                return Ok(self.registry.intern(AnimNode {
                    parent,
                    dataref: "no_ref".to_string(),
                    translations: vec![DVec3::ZERO],
                    values: vec![0.0, 1.0],
                    show_hide,
                    manipulator,
                    ..AnimNode::root()
                }));
            }
            return Ok(if bone.parent.is_some() { parent } else { AnimId::ROOT });
        }
        if frames > 2 {
            self.v9 = true;
        }

        let binding = self.dataref_values(object, child, &bone.name, "", 1, frames)?;
        let leaf = binding.dataref.rsplit('/').next().unwrap_or_default().to_string();
        let values = binding
            .values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                value.ok_or_else(|| ObjError::MissingDatarefValue {
                    armature: object.name.clone(),
                    property: format!("{}_v{}", leaf, i + 1),
                    object: child.name.clone(),
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        let mm = object.world_matrix();
        let rm = rotation_only(&mm);
        let rest = bone.rest_rotation();
        let ancestors = self.registry.chain(parent);
        let pinned = bone.parent.is_some() && bone.connected;

        let mut translations: Vec<DVec3> = Vec::with_capacity(frames);
        let mut axes: Vec<Option<DVec3>> = Vec::with_capacity(frames);
        let mut angles: Vec<f64> = Vec::with_capacity(frames);
        let mut moved = false;

        for pose in &bone.frames {
            let location = match pose.location {
                Some(location) if !pinned => DVec3::from_array(location),
                _ => DVec3::ZERO,
            };
            let mut t = to_xplane(&mm, rest * location + bone.head());
            // Offsets are relative to the first frame of every enclosing level.
            for id in &ancestors {
                if let Some(first) = self.registry.get(*id).translations.first() {
                    t -= *first;
                }
            }
            if let Some(first) = translations.first() {
                if !approx_eq(t, *first, LIMIT) {
                    moved = true;
                }
            }
            translations.push(t);

            match pose.rotation_quat() {
                Some(q) => {
                    let (axis, angle) = q.to_axis_angle();
                    let angle = round4(angle.to_degrees());
                    if angle == 0.0 {
                        axes.push(None);
                        angles.push(0.0);
                    } else {
                        axes.push(Some(to_xplane_dir(&rm, rest * axis)));
                        angles.push(angle);
                    }
                }
                None => {
                    axes.push(None);
                    angles.push(0.0);
                }
            }
        }

        if !moved {
            translations.truncate(1);
        }

        let (axes, angles) = collapse_axes(axes, angles);

        Ok(self.registry.intern(AnimNode {
            parent,
            dataref: binding.dataref,
            translations,
            axes,
            angles,
            values,
            loop_value: binding.loop_value,
            show_hide,
            manipulator,
        }))
    }

    /// Look up the dataref named by a bone or property and its values.
    ///
    /// `name` may carry an array index (`ENGN_N1_[2]`). Values come from
    /// `<ref><suffix>_v<n>` properties for `n` in `first..first + count`;
    /// bones default to `0, 1, 1, ...`, properties to nothing.
    pub fn dataref_values(
        &self,
        object: &SceneObject,
        child: &SceneObject,
        name: &str,
        suffix: &str,
        first: usize,
        count: usize,
    ) -> Result<DatarefBinding> {
        let (thing, mut values): (&str, Vec<Option<f64>>) = if suffix.is_empty() {
            (
                "bone in armature",
                (0..count).map(|i| Some(if i == 0 { 0.0 } else { 1.0 })).collect(),
            )
        } else {
            ("property in armature", vec![None; count])
        };

        let name = name.split('.').next().unwrap_or_default().trim();
        let (reference, index) = match name.find('[') {
            Some(l) if !self.datarefs.contains(name) => {
                let malformed = || ObjError::MalformedDatarefIndex {
                    index: name[l..].to_string(),
                    bone: name.to_string(),
                    object: object.name.clone(),
                };
                let digits = name
                    .strip_suffix(']')
                    .and_then(|n| n.get(l + 1..))
                    .filter(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()))
                    .ok_or_else(malformed)?;
                let index: usize = digits.parse().map_err(|_| malformed())?;
                (name[..l].trim(), Some((index, digits)))
            }
            _ => (name, None),
        };

        let mut seq = vec![reference.to_string()];
        if index.is_some() {
            seq.push(name.to_string());
        }

        let dataref = match self.datarefs.lookup(reference) {
            DatarefLookup::Found(found) => {
                let n = found.array_len;
                match index {
                    _ if n == 0 => {
                        return Err(ObjError::DatarefNotAnimatable {
                            dataref: found.path.clone(),
                            object: child.name.clone(),
                        })
                    }
                    Some(_) if n == 1 => {
                        return Err(ObjError::DatarefNotArray {
                            dataref: found.path.clone(),
                            thing: thing.to_string(),
                            name: reference.to_string(),
                            object: child.name.clone(),
                        })
                    }
                    None if n != 1 => {
                        return Err(ObjError::DatarefIsArray {
                            dataref: found.path.clone(),
                            thing: thing.to_string(),
                            name: reference.to_string(),
                            object: child.name.clone(),
                        })
                    }
                    Some((i, _)) if i >= n => {
                        return Err(ObjError::DatarefIndexOutOfRange {
                            dataref: found.path.clone(),
                            last: n - 1,
                            index: i,
                            object: child.name.clone(),
                        })
                    }
                    Some((_, digits)) => format!("{}[{}]", found.path, digits),
                    None => found.path.clone(),
                }
            }
            _ => custom_dataref(self.datarefs, object, &child.name, thing, &seq)?,
        };

        seq.push(make_short_name(&dataref));

        let mut loop_value = None;
        for tmpref in &seq {
            for (slot, n) in (first..first + count).enumerate() {
                let key = format!("{}{}_v{}", tmpref, suffix, n);
                if let Some(prop) = object.property(&key) {
                    values[slot] = Some(property_number(prop, &key, object)?);
                }
            }
            let key = format!("{}{}_loop", tmpref, suffix);
            if let Some(prop) = object.property(&key) {
                let value = property_number(prop, &key, object)?;
                loop_value = (value != 0.0).then_some(value);
            }
        }

        Ok(DatarefBinding {
            dataref,
            values,
            loop_value,
        })
    }

    /// `child`'s world matrix at frame 1 with its animation un-applied, so
    /// that geometry is relative to the innermost bone's rest position.
    pub fn local_matrix(&self, child: &SceneObject, anim: AnimId) -> DMat4 {
        let mut mm = child.world_matrix();
        for id in self.registry.chain(anim) {
            let node = self.registry.get(id);
            if let Some(first) = node.translations.first() {
                mm.w_axis -= to_blender(*first).extend(0.0);
            }
            if let (Some(axis), Some(&angle)) = (node.axes.first(), node.angles.first()) {
                let axis = (-to_blender(*axis)).normalize_or_zero();
                if angle != 0.0 && axis != DVec3::ZERO {
                    mm = DMat4::from_axis_angle(axis, angle.to_radians()) * mm;
                }
            }
        }
        mm
    }
}

/// Reduce per-frame rotation axes to one when they are all parallel.
///
/// Antiparallel axes are flipped along with their angle. Frames without
/// rotation don't constrain the axis; when axes really differ they get an
/// arbitrary placeholder axis.
fn collapse_axes(mut axes: Vec<Option<DVec3>>, mut angles: Vec<f64>) -> (Vec<DVec3>, Vec<f64>) {
    let mut reference: Option<DVec3> = None;
    let mut coplanar = true;
    for i in 0..axes.len() {
        let Some(axis) = axes[i] else {
            continue;
        };
        match reference {
            None => reference = Some(axis),
            Some(r) if approx_eq(r, -axis, LIMIT) => {
                axes[i] = Some(DVec3::ZERO - axis);
                angles[i] = -angles[i];
            }
            Some(r) if approx_eq(r, axis, LIMIT) => {}
            Some(_) => {
                coplanar = false;
                break;
            }
        }
    }

    if coplanar {
        match reference {
            Some(r) => (vec![r], angles),
            None => (Vec::new(), Vec::new()),
        }
    } else {
        let axes = axes.into_iter().map(|a| a.unwrap_or(DVec3::Y)).collect();
        (axes, angles)
    }
}

/// Resolve a name to a dataref path via string properties on `owner`.
///
/// A property named like any entry of `names` holds the dataref's directory;
/// the last entry of `names` is appended to it.
pub fn custom_dataref(
    datarefs: &DatarefRegistry,
    owner: &SceneObject,
    culprit: &str,
    thing: &str,
    names: &[String],
) -> Result<String> {
    let first = names.first().map(String::as_str).unwrap_or_default();
    let last = names.last().map(String::as_str).unwrap_or_default();

    let mut dataref = None;
    for name in names {
        if let Some(prop) = owner.properties.iter().find(|p| p.name.trim() == name) {
            let PropertyValue::String(path) = &prop.value else {
                return Err(ObjError::UnsupportedPropertyType {
                    property: first.to_string(),
                    object: owner.name.clone(),
                });
            };
            let mut path = path.trim().to_string();
            if !path.is_empty() && !path.ends_with('/') {
                path.push('/');
            }
            dataref = Some(path + last);
        }
    }

    match dataref {
        Some(dataref) => Ok(dataref),
        None if datarefs.contains(first) => Err(ObjError::AmbiguousDataref {
            name: first.to_string(),
            object: culprit.to_string(),
        }),
        None => Err(ObjError::UnknownDataref {
            name: first.to_string(),
            thing: thing.to_string(),
            object: owner.name.clone(),
        }),
    }
}

fn property_number(prop: &Property, key: &str, object: &SceneObject) -> Result<f64> {
    match prop.value {
        PropertyValue::Int(i) => Ok(i as f64),
        PropertyValue::Float(f) => Ok(round4(f)),
        _ => Err(ObjError::UnsupportedPropertyType {
            property: key.to_string(),
            object: object.name.clone(),
        }),
    }
}

fn deleted_bone(bone: &str, child: &SceneObject) -> ObjError {
    ObjError::DeletedBone {
        bone: bone.to_string(),
        object: child.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{BonePose, MeshData, ObjectData};
    use std::f64::consts::FRAC_1_SQRT_2;

    const DATAREFS: &str = "2 1001 Sun Mar 18 2007 X-Plane\n\
        sim/cockpit2/controls/yoke_roll_ratio float y ratio Roll\n\
        sim/flightmodel/engine/ENGN_N1_ float[8] y percent N1\n\
        sim/aircraft/view/acf_tailnum byte[40] y string Tail\n\
        sim/cockpit/electrical/battery_on int y bool Battery\n\
        sim/cockpit2/electrical/battery_on int[8] y bool Battery\n";

    fn datarefs() -> DatarefRegistry {
        DatarefRegistry::parse(DATAREFS).unwrap()
    }

    fn yoke_bone() -> Bone {
        let mut bone = Bone::new("yoke_roll_ratio");
        bone.frames = vec![
            BonePose::new(Some([0.0, 0.0, 0.0]), Some([1.0, 0.0, 0.0, 0.0])),
            BonePose::new(
                Some([2.0, 0.0, 0.0]),
                Some([FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2]),
            ),
        ];
        bone
    }

    fn armature(name: &str, bones: Vec<Bone>) -> SceneObject {
        SceneObject::new(name, ObjectData::Armature(ArmatureData { bones }))
    }

    fn mesh_on(armature: &str, bone: &str) -> SceneObject {
        SceneObject::new("Yoke", ObjectData::Mesh(MeshData::default()))
            .with_parent(armature, Some(bone))
    }

    fn scene(objects: Vec<SceneObject>) -> Scene {
        Scene {
            objects,
            ..Default::default()
        }
    }

    #[test]
    fn test_unparented_object_is_static() {
        let scene = scene(vec![SceneObject::new("Cube", ObjectData::Empty)]);
        let datarefs = datarefs();
        let manips = ManipulatorRegistry::builtin();
        let mut resolver = AnimResolver::new(&scene, &datarefs, &manips);
        let mut diags = Diagnostics::new();
        let id = resolver.resolve(&scene.objects[0], &mut diags).unwrap();
        assert!(id.is_root());
        assert!(resolver.registry().is_empty());
    }

    #[test]
    fn test_bone_keyframes() {
        let arm = armature("Arm", vec![yoke_bone()])
            .with_property("yoke_roll_ratio_v1", PropertyValue::Float(-1.0))
            .with_property("yoke_roll_ratio_v2", PropertyValue::Float(1.0));
        let scene = scene(vec![arm, mesh_on("Arm", "yoke_roll_ratio")]);
        let datarefs = datarefs();
        let manips = ManipulatorRegistry::builtin();
        let mut resolver = AnimResolver::new(&scene, &datarefs, &manips);
        let mut diags = Diagnostics::new();

        let id = resolver.resolve(&scene.objects[1], &mut diags).unwrap();
        let node = resolver.registry().get(id);
        assert_eq!(node.dataref, "sim/cockpit2/controls/yoke_roll_ratio");
        assert_eq!(node.values, vec![-1.0, 1.0]);
        assert_eq!(node.translations, vec![DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0)]);
        assert_eq!(node.axes, vec![DVec3::new(0.0, 1.0, 0.0)]);
        assert_eq!(node.angles, vec![0.0, 90.0]);
        assert_eq!(node.loop_value, None);
        assert!(!resolver.requires_v9());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_shared_bone_is_interned_once() {
        let arm = armature("Arm", vec![yoke_bone()]);
        let other = SceneObject::new("Grip", ObjectData::Mesh(MeshData::default()))
            .with_parent("Arm", Some("yoke_roll_ratio"));
        let scene = scene(vec![arm, mesh_on("Arm", "yoke_roll_ratio"), other]);
        let datarefs = datarefs();
        let manips = ManipulatorRegistry::builtin();
        let mut resolver = AnimResolver::new(&scene, &datarefs, &manips);
        let mut diags = Diagnostics::new();

        let a = resolver.resolve(&scene.objects[1], &mut diags).unwrap();
        let b = resolver.resolve(&scene.objects[2], &mut diags).unwrap();
        assert_eq!(a, b);
        assert_eq!(resolver.registry().len(), 1);
        // Default values when no properties are given.
        assert_eq!(resolver.registry().get(a).values, vec![0.0, 1.0]);
    }

    #[test]
    fn test_nested_bones_are_relative() {
        let mut outer = yoke_bone();
        outer.name = "yoke_roll_ratio".into();
        let mut inner = Bone::new("ENGN_N1_[1]");
        inner.parent = Some("yoke_roll_ratio".into());
        inner.head = [2.0, 0.0, 0.0];
        inner.frames = vec![
            BonePose::new(Some([0.0, 0.0, 0.0]), None),
            BonePose::new(Some([0.0, 0.0, 1.0]), None),
            BonePose::new(Some([0.0, 0.0, 2.0]), None),
        ];
        let arm = armature("Arm", vec![outer, inner]);
        let scene = scene(vec![arm, mesh_on("Arm", "ENGN_N1_[1]")]);
        let datarefs = datarefs();
        let manips = ManipulatorRegistry::builtin();
        let mut resolver = AnimResolver::new(&scene, &datarefs, &manips);
        let mut diags = Diagnostics::new();

        let id = resolver.resolve(&scene.objects[1], &mut diags).unwrap();
        let chain = resolver.registry().chain(id);
        assert_eq!(chain.len(), 2);
        assert_eq!(resolver.registry().depth(id), 2);

        let inner = resolver.registry().get(id);
        assert_eq!(inner.dataref, "sim/flightmodel/engine/ENGN_N1_[1]");
        assert_eq!(inner.parent, chain[0]);
        assert_eq!(inner.values, vec![0.0, 1.0, 1.0]);
        assert_eq!(inner.translations[0], DVec3::new(2.0, 0.0, 0.0));
        assert_eq!(inner.translations[2], DVec3::new(2.0, 2.0, 0.0));
        assert!(inner.axes.is_empty());
        assert!(resolver.requires_v9());
    }

    #[test]
    fn test_missing_and_deleted_bones() {
        let arm = armature("Arm", vec![yoke_bone()]);
        let unboned = SceneObject::new("Yoke", ObjectData::Mesh(MeshData::default()))
            .with_parent("Arm", None);
        let scene = scene(vec![arm, unboned, mesh_on("Arm", "gone")]);
        let datarefs = datarefs();
        let manips = ManipulatorRegistry::builtin();
        let mut resolver = AnimResolver::new(&scene, &datarefs, &manips);
        let mut diags = Diagnostics::new();

        match resolver.resolve(&scene.objects[1], &mut diags) {
            Err(ObjError::MissingParentBone { kind, object }) => {
                assert_eq!(kind, "Mesh");
                assert_eq!(object, "Yoke");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            resolver.resolve(&scene.objects[2], &mut diags),
            Err(ObjError::DeletedBone { .. })
        ));
    }

    #[test]
    fn test_dataref_errors() {
        let datarefs = datarefs();
        let manips = ManipulatorRegistry::builtin();
        let cases: Vec<(&str, fn(&ObjError) -> bool)> = vec![
            ("ENGN_N1_[x]", |e| matches!(e, ObjError::MalformedDatarefIndex { .. })),
            ("ENGN_N1_[1", |e| matches!(e, ObjError::MalformedDatarefIndex { .. })),
            ("ENGN_N1_", |e| matches!(e, ObjError::DatarefIsArray { .. })),
            ("ENGN_N1_[8]", |e| matches!(e, ObjError::DatarefIndexOutOfRange { last: 7, index: 8, .. })),
            ("yoke_roll_ratio[0]", |e| matches!(e, ObjError::DatarefNotArray { .. })),
            ("acf_tailnum", |e| matches!(e, ObjError::DatarefNotAnimatable { .. })),
            ("battery_on", |e| matches!(e, ObjError::AmbiguousDataref { .. })),
            ("no_such_thing", |e| matches!(e, ObjError::UnknownDataref { .. })),
        ];
        for (name, check) in cases {
            let mut bone = yoke_bone();
            bone.name = name.to_string();
            let scene = scene(vec![armature("Arm", vec![bone]), mesh_on("Arm", name)]);
            let mut resolver = AnimResolver::new(&scene, &datarefs, &manips);
            let mut diags = Diagnostics::new();
            let err = resolver.resolve(&scene.objects[1], &mut diags).unwrap_err();
            assert!(check(&err), "{}: {:?}", name, err);
        }
    }

    #[test]
    fn test_custom_dataref_property() {
        let mut bone = yoke_bone();
        bone.name = "door_ratio.001".into();
        let arm = armature("Arm", vec![bone])
            .with_property("door_ratio", PropertyValue::String(" my/plugin ".into()))
            .with_property("door_ratio_loop", PropertyValue::Int(2));
        let scene = scene(vec![arm, mesh_on("Arm", "door_ratio.001")]);
        let datarefs = datarefs();
        let manips = ManipulatorRegistry::builtin();
        let mut resolver = AnimResolver::new(&scene, &datarefs, &manips);
        let mut diags = Diagnostics::new();

        let id = resolver.resolve(&scene.objects[1], &mut diags).unwrap();
        let node = resolver.registry().get(id);
        assert_eq!(node.dataref, "my/plugin/door_ratio");
        assert_eq!(node.loop_value, Some(2.0));
    }

    #[test]
    fn test_show_hide_without_keys() {
        let mut bone = Bone::new("yoke_roll_ratio");
        bone.frames = vec![BonePose::default()];
        let arm = armature("Arm", vec![bone])
            .with_property("battery_on_hide_v1", PropertyValue::Int(0))
            .with_property("battery_on_hide_v2", PropertyValue::Float(0.5))
            .with_property("battery_on", PropertyValue::String("sim/cockpit/electrical".into()));
        let scene = scene(vec![arm, mesh_on("Arm", "yoke_roll_ratio")]);
        let datarefs = datarefs();
        let manips = ManipulatorRegistry::builtin();
        let mut resolver = AnimResolver::new(&scene, &datarefs, &manips);
        let mut diags = Diagnostics::new();

        let id = resolver.resolve(&scene.objects[1], &mut diags).unwrap();
        let node = resolver.registry().get(id);
        assert_eq!(node.dataref, "no_ref");
        assert_eq!(node.translations, vec![DVec3::ZERO]);
        assert_eq!(
            node.show_hide,
            vec![ShowHide {
                kind: Visibility::Hide,
                dataref: "sim/cockpit/electrical/battery_on".into(),
                v1: 0.0,
                v2: 0.5,
            }]
        );
        assert!(diags.contains("Ignoring bone \"yoke_roll_ratio\" in armature \"Arm\""));
    }

    #[test]
    fn test_unkeyed_bone_is_dropped() {
        let bone = Bone::new("yoke_roll_ratio");
        let scene = scene(vec![armature("Arm", vec![bone]), mesh_on("Arm", "yoke_roll_ratio")]);
        let datarefs = datarefs();
        let manips = ManipulatorRegistry::builtin();
        let mut resolver = AnimResolver::new(&scene, &datarefs, &manips);
        let mut diags = Diagnostics::new();
        let id = resolver.resolve(&scene.objects[1], &mut diags).unwrap();
        assert!(id.is_root());
        assert_eq!(diags.warnings().count(), 1);
    }

    #[test]
    fn test_collapse_axes() {
        let up = DVec3::Y;
        let (axes, angles) = collapse_axes(vec![None, Some(up), Some(-up)], vec![0.0, 10.0, 20.0]);
        assert_eq!(axes, vec![up]);
        assert_eq!(angles, vec![0.0, 10.0, -20.0]);

        let (axes, angles) = collapse_axes(vec![None, None], vec![0.0, 0.0]);
        assert!(axes.is_empty());
        assert!(angles.is_empty());

        let (axes, _) = collapse_axes(vec![None, Some(DVec3::X), Some(DVec3::Z)], vec![0.0, 5.0, 5.0]);
        assert_eq!(axes, vec![DVec3::Y, DVec3::X, DVec3::Z]);
    }

    #[test]
    fn test_local_matrix_unapplies_translation() {
        let arm = armature("Arm", vec![yoke_bone()]);
        let child = mesh_on("Arm", "yoke_roll_ratio")
            .with_matrix(DMat4::from_translation(DVec3::new(1.0, 2.0, 3.0)));
        let scene = scene(vec![arm, child]);
        let datarefs = datarefs();
        let manips = ManipulatorRegistry::builtin();
        let mut resolver = AnimResolver::new(&scene, &datarefs, &manips);
        let mut diags = Diagnostics::new();

        let id = resolver.resolve(&scene.objects[1], &mut diags).unwrap();
        let local = resolver.local_matrix(&scene.objects[1], id);
        // Frame 1 has no offset and no rotation, so nothing changes.
        assert_eq!(local.w_axis.truncate(), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(resolver.local_matrix(&scene.objects[1], AnimId::ROOT), scene.objects[1].world_matrix());
    }
}
