//! OBJ8 import.
//!
//! Reads the text one line at a time. A bad header aborts the import; any
//! other line that can't be read is skipped with a warning.

pub mod builder;
pub mod parser;

pub use builder::{
    Animation, AttributeState, ImportedMesh, ImportedNode, ImportedObj, NodeKind, ObjBuilder,
    RotateAnimation, TranslateAnimation,
};
pub use parser::{Directive, LineError};

use crate::error::Result;
use std::path::Path;

/// Import OBJ8 text.
pub fn import_obj(text: &str) -> Result<ImportedObj> {
    let mut lines = text.lines();
    let platform = parser::parse_header(&mut lines)?;
    let mut builder = ObjBuilder::new(platform);
    for (i, line) in lines.enumerate() {
        let line_no = i + 4;
        match parser::parse_line(line) {
            Ok(Some(directive)) => builder.apply(directive, line_no),
            Ok(None) => {}
            Err(err) => builder.skip(line_no, &err),
        }
    }
    Ok(builder.finish())
}

/// Read and import an OBJ8 file.
pub fn import_from_file<P: AsRef<Path>>(path: P) -> Result<ImportedObj> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let obj = import_obj(&text)?;
    log::info!(
        "Imported {} objects from {}",
        obj.nodes.len(),
        path.as_ref().display()
    );
    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportConfig;
    use crate::error::ObjError;
    use crate::export::{export_obj, ExportContext};
    use crate::registry::{DatarefRegistry, ManipulatorRegistry};
    use crate::scene::{
        ArmatureData, Bone, BonePose, MeshData, MeshFace, MeshVertex, ObjectData, PropertyValue,
        Scene, SceneObject,
    };
    use glam::{DQuat, DVec3};

    const DATAREFS: &str = "2 1001 Sun Mar 18 2007 X-Plane\n\
        sim/cockpit2/controls/yoke_roll_ratio float y ratio Roll\n";

    fn animated_scene() -> Scene {
        let half = std::f64::consts::FRAC_1_SQRT_2;
        let mut bone = Bone::new("yoke_roll_ratio");
        bone.frames = vec![
            BonePose::new(Some([0.0; 3]), Some([1.0, 0.0, 0.0, 0.0])),
            BonePose::new(Some([2.0, 0.0, 0.0]), Some([half, 0.0, 0.0, half])),
        ];
        let yoke = SceneObject::new("Yoke", ObjectData::Armature(ArmatureData { bones: vec![bone] }))
            .with_property("yoke_roll_ratio_v1", PropertyValue::Float(-1.0))
            .with_property("yoke_roll_ratio_v2", PropertyValue::Float(1.0));

        let mut face = MeshFace::new(vec![0, 1, 2]);
        face.normal = [0.0, 0.0, 1.0];
        let handle = SceneObject::new(
            "Handle",
            ObjectData::Mesh(MeshData {
                vertices: vec![
                    MeshVertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
                    MeshVertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
                    MeshVertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
                ],
                faces: vec![face],
                materials: Vec::new(),
            }),
        )
        .with_parent("Yoke", Some("yoke_roll_ratio"));

        Scene {
            objects: vec![yoke, handle],
            ..Default::default()
        }
    }

    #[test]
    fn test_round_trip_animation() {
        let datarefs = DatarefRegistry::parse(DATAREFS).unwrap();
        let manipulators = ManipulatorRegistry::builtin();
        let ctx = ExportContext::new(&datarefs, &manipulators);
        let exported = export_obj(&animated_scene(), &ctx, &ExportConfig::default()).unwrap();

        let obj = import_obj(&exported.text).unwrap();
        assert!(obj.diagnostics.warnings().next().is_none(), "{:?}", obj.diagnostics);

        let anim = obj.node("Anim.000").unwrap();
        let [Animation::Translate(trans), Animation::Rotate(rotate)] = &anim.animations[..] else {
            panic!("unexpected animations {:?}", anim.animations);
        };
        assert_eq!(trans.dataref, "sim/cockpit2/controls/yoke_roll_ratio");
        assert_eq!(trans.values, vec![-1.0, 1.0]);
        assert!(trans.locations[0].abs_diff_eq(DVec3::ZERO, 1e-4));
        assert!(trans.locations[1].abs_diff_eq(DVec3::new(2.0, 0.0, 0.0), 1e-4));

        assert_eq!(rotate.values, vec![-1.0, 1.0]);
        assert_eq!(rotate.axes.len(), 1);
        assert!(rotate.axes[0].axis.abs_diff_eq(DVec3::Z, 1e-4));
        assert!((rotate.axes[0].angles[1] - 90.0).abs() < 0.01);
        let keys = rotate.keyframes();
        let quarter = DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2);
        assert!(keys[1].abs_diff_eq(quarter, 1e-4));

        let (handle, mesh) = obj.meshes().next().unwrap();
        assert_eq!(handle.parent, Some(0));
        assert_eq!(mesh.faces.len(), 1);
        assert_eq!(mesh.vertices.len(), 3);
        let mut positions: Vec<[i64; 3]> = mesh
            .vertices
            .iter()
            .map(|v| (v.position * 1e4).round().as_i64vec3().to_array())
            .collect();
        positions.sort();
        assert_eq!(positions, vec![[0, 0, 0], [0, 10000, 0], [10000, 0, 0]]);
    }

    #[test]
    fn test_round_trip_textures() {
        let datarefs = DatarefRegistry::parse(DATAREFS).unwrap();
        let manipulators = ManipulatorRegistry::builtin();
        let ctx = ExportContext::new(&datarefs, &manipulators);
        let mut scene = animated_scene();
        scene.texture = Some("yoke.png".into());
        let exported = export_obj(&scene, &ctx, &ExportConfig::default()).unwrap();

        let obj = import_obj(&exported.text).unwrap();
        assert_eq!(obj.textures.diffuse.as_deref(), Some("yoke.png"));
        assert_eq!(obj.textures.lit.as_deref(), Some("yoke_LIT.png"));
        assert_eq!(obj.textures.normal.as_deref(), Some("yoke_NML.png"));
    }

    #[test]
    fn test_header_is_fatal() {
        let result = import_obj("OBJ\n800\nI\nTRIS\t0 3\n");
        assert!(matches!(result, Err(ObjError::InvalidHeader(_))));
    }

    #[test]
    fn test_import_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.obj");
        std::fs::write(&path, "A\n800\nOBJ\n\nTEXTURE\t\nPOINT_COUNTS\t0 0 0 0\n").unwrap();
        let obj = import_from_file(&path).unwrap();
        assert_eq!(obj.platform, crate::config::Platform::Apple);
        assert!(obj.nodes.is_empty());
        assert!(obj.diagnostics.contains("no objects"));
    }
}
