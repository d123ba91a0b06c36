//! Scene objects to primitives.
//!
//! Each exported object is turned into primitives with its render state
//! resolved, and its vertices are interned into the shared tables. Objects
//! are visited in scene order so that animation ids, and hence the output,
//! are deterministic.

use super::animation::{custom_dataref, AnimId, AnimRegistry, AnimResolver};
use super::primitive::{Flags, Geometry, NamedLight, Primitive, VLight};
use super::survey::{is_panel_image, Survey};
use super::tables::{LineTable, LineVertex, VertexEntry, VertexTable};
use crate::config::ExportConfig;
use crate::diagnostic::Diagnostics;
use crate::error::{ObjError, Result};
use crate::registry::{DatarefLookup, DatarefRegistry, ManipulatorRegistry};
use crate::scene::{
    light_name, CustomLightOptions, LampData, LampKind, MeshData, MeshFace, MeshOptions, ObjectData,
    Scene, SceneObject,
};
use crate::types::{
    approx_eq, face_order, rotation_only, to_xplane, to_xplane_dir, Material, Rgb, SurfaceType, Uv,
    LIMIT,
};
use glam::{DMat4, DVec3};

/// Colour of lines without a material.
const LINE_GREY: Rgb = [0.5, 0.5, 0.5];

/// Everything classification produced.
pub struct Classified {
    pub vertices: VertexTable,
    pub lines: LineTable,
    pub prims: Vec<Primitive>,
    pub anims: AnimRegistry,
    pub requires_v9: bool,
}

/// Per-mesh state shared by all of its faces.
struct MeshState<'m> {
    anim: AnimId,
    group: Option<&'m str>,
    hardness: Flags,
    surface: Option<SurfaceType>,
    has_panel_texture: bool,
    matrix: DMat4,
    normal_matrix: DMat4,
}

#[derive(Default)]
struct FaceCounts {
    degenerate: usize,
    hard: usize,
    two_sided: usize,
}

pub struct Classifier<'a> {
    scene: &'a Scene,
    config: &'a ExportConfig,
    survey: &'a Survey,
    datarefs: &'a DatarefRegistry,
    resolver: AnimResolver<'a>,
    vertices: VertexTable,
    lines: LineTable,
    prims: Vec<Primitive>,
    /// First primitive of every animated mesh, for instance reuse.
    anim_candidates: Vec<usize>,
}

impl<'a> Classifier<'a> {
    pub fn new(
        scene: &'a Scene,
        config: &'a ExportConfig,
        survey: &'a Survey,
        datarefs: &'a DatarefRegistry,
        manipulators: &'a ManipulatorRegistry,
    ) -> Self {
        Self {
            scene,
            config,
            survey,
            datarefs,
            resolver: AnimResolver::new(scene, datarefs, manipulators),
            vertices: VertexTable::new(),
            lines: LineTable::new(),
            prims: Vec::new(),
            anim_candidates: Vec::new(),
        }
    }

    /// Classify every object on an exported layer.
    pub fn classify_scene(&mut self, diags: &mut Diagnostics) -> Result<()> {
        let scene = self.scene;
        for obj in scene.objects.iter().filter(|o| self.survey.exports(o)) {
            self.classify(obj, diags)?;
        }
        Ok(())
    }

    pub fn classify(&mut self, obj: &SceneObject, diags: &mut Diagnostics) -> Result<()> {
        match &obj.data {
            ObjectData::Mesh(mesh) => {
                if is_line(mesh, &obj.world_matrix(), self.config.line_width) {
                    self.classify_line(obj, mesh, diags)
                } else if mesh.is_custom_light() {
                    self.classify_custom_light(obj, mesh, diags)
                } else {
                    self.classify_mesh(obj, mesh, diags)
                }
            }
            ObjectData::Lamp(lamp) => self.classify_lamp(obj, lamp, diags),
            _ => Ok(()),
        }
    }

    pub fn finish(self) -> Classified {
        let requires_v9 = self.resolver.requires_v9();
        Classified {
            vertices: self.vertices,
            lines: self.lines,
            prims: self.prims,
            anims: self.resolver.into_registry(),
            requires_v9,
        }
    }

    fn group_of(&self, obj: &SceneObject) -> Option<&'a str> {
        let scene: &'a Scene = self.scene;
        scene.group_of(&obj.name)
    }

    fn classify_line(&mut self, obj: &SceneObject, mesh: &MeshData, diags: &mut Diagnostics) -> Result<()> {
        log::trace!("Exporting line \"{}\"", obj.name);
        let anim = self.resolver.resolve(obj, diags)?;
        let mm = self.resolver.local_matrix(obj, anim);

        let Some(face) = mesh.faces.first() else {
            return Ok(());
        };
        let Some(v) = face_points(mesh, face, &mm) else {
            return Ok(());
        };
        let w = self.config.line_width;
        let i = if approx_eq(v[0], v[1], w) && approx_eq(v[2], v[3], w) {
            0
        } else {
            1
        };
        let ends = [(v[i] + v[i + 1]) / 2.0, (v[i + 2] + v[(i + 3) % 4]) / 2.0];

        let color = match mesh.materials.get(face.material) {
            Some(Some(slot)) => slot.color,
            _ => LINE_GREY,
        };
        let a = self.lines.intern(LineVertex {
            position: ends[0],
            color,
        });
        let b = self.lines.intern(LineVertex {
            position: ends[1],
            color,
        });

        let group = self.group_of(obj);
        self.prims.push(
            Primitive::light_or_line(&obj.name, obj.layers, anim, Geometry::Line([a, b]))
                .with_group(group),
        );
        Ok(())
    }

    fn classify_custom_light(
        &mut self,
        obj: &SceneObject,
        mesh: &MeshData,
        diags: &mut Diagnostics,
    ) -> Result<()> {
        let anim = self.resolver.resolve(obj, diags)?;
        let mm = self.resolver.local_matrix(obj, anim);

        let slot = mesh.first_material().cloned().unwrap_or_default();
        let options = CustomLightOptions::parse(obj)?;
        let rgba = options.apply([slot.color[0], slot.color[1], slot.color[2], slot.alpha]);
        let (uv1, uv2) = match slot.texture_crop {
            Some([u1, v1, u2, v2]) => (Uv::new(u1, v1), Uv::new(u2, v2)),
            None => (Uv::new(0.0, 0.0), Uv::new(1.0, 1.0)),
        };

        let dataref = match options.dataref {
            None => "NULL".to_string(),
            Some(name) => match self.datarefs.lookup(&name) {
                DatarefLookup::Found(found) if found.array_len != 9 => {
                    return Err(ObjError::DatarefNotLightable {
                        dataref: found.path.clone(),
                        object: obj.name.clone(),
                    });
                }
                DatarefLookup::Found(found) => found.path.clone(),
                _ => custom_dataref(self.datarefs, obj, &obj.name, "custom light", &[name])?,
            },
        };

        let group = self.group_of(obj);
        for vertex in &mesh.vertices {
            let light = NamedLight::Custom {
                position: to_xplane(&mm, DVec3::from_array(vertex.co)),
                rgba,
                size: slot.halo_size,
                uv1,
                uv2,
                dataref: dataref.clone(),
            };
            self.prims.push(
                Primitive::light_or_line(&obj.name, obj.layers, anim, Geometry::NLight(light))
                    .with_group(group),
            );
        }
        Ok(())
    }

    fn classify_lamp(&mut self, obj: &SceneObject, lamp: &LampData, diags: &mut Diagnostics) -> Result<()> {
        let anim = self.resolver.resolve(obj, diags)?;
        let mm = self.resolver.local_matrix(obj, anim);

        if lamp.kind != LampKind::Point {
            diags.info(
                format!("Ignoring Area, Spot, Sun or Hemi lamp \"{}\"", obj.name),
                vec![obj.name.clone()],
            );
            return Ok(());
        }

        let name = obj.name.split('.').next().unwrap_or_default();
        let lower = name.to_lowercase();
        let has_word = |word: &str| lower.split_whitespace().any(|w| w == word);
        let position = to_xplane(&mm, DVec3::ZERO);
        let rgb = |color: Rgb| Geometry::VLight(VLight { position, color });

        let geometry = if has_word("pulse") {
            rgb([9.9; 3])
        } else if has_word("strobe") {
            rgb([9.8; 3])
        } else if has_word("traffic") {
            rgb([9.7; 3])
        } else if has_word("flash") {
            rgb(lamp.color.map(|c| 0.0 - c))
        } else if has_word("lamp") {
            rgb(lamp.color)
        } else if name == "smoke_black" || name == "smoke_white" {
            Geometry::NLight(NamedLight::Smoke {
                position,
                kind: name.to_string(),
                size: lamp.energy,
            })
        } else {
            Geometry::NLight(NamedLight::Named {
                position,
                name: light_name(obj, name),
            })
        };

        let group = self.group_of(obj);
        self.prims.push(
            Primitive::light_or_line(&obj.name, obj.layers, anim, geometry).with_group(group),
        );
        Ok(())
    }

    fn classify_mesh(&mut self, obj: &SceneObject, mesh: &MeshData, diags: &mut Diagnostics) -> Result<()> {
        log::trace!("Exporting mesh \"{}\" with {} faces", obj.name, mesh.faces.len());
        let anim = self.resolver.resolve(obj, diags)?;
        let mm = self.resolver.local_matrix(obj, anim);

        let options = if self.config.cockpit {
            MeshOptions::default()
        } else {
            MeshOptions::parse(obj)?
        };

        let state = MeshState {
            anim,
            group: self.group_of(obj),
            hardness: if options.deck { Flags::DECK } else { Flags::HARD },
            surface: options.surface,
            has_panel_texture: mesh.faces.iter().any(|f| {
                f.mode().tex && f.image.as_deref().is_some_and(is_panel_image)
            }),
            normal_matrix: rotation_only(&mm),
            matrix: mm,
        };
        let mut counts = FaceCounts::default();

        let reused = if anim.is_root() {
            None
        } else {
            self.find_instance(mesh, &state)
        };

        match reused {
            Some(first) => {
                let mut trino = 0;
                for face in &mesh.faces {
                    if !is_renderable(mesh, face) {
                        counts.degenerate += 1;
                        continue;
                    }
                    if face.mode().invisible {
                        continue;
                    }
                    let mut prim = self.face_primitive(obj, mesh, face, &state, &mut counts)?;
                    prim.geometry = Geometry::Tri(self.prims[first + trino].corners().to_vec());
                    self.prims.push(prim);
                    trino += 1;
                }
                log::debug!("Mesh \"{}\" reuses vertices of an earlier instance", obj.name);
            }
            None => {
                let start = self.prims.len();
                for face in &mesh.faces {
                    if !is_renderable(mesh, face) {
                        counts.degenerate += 1;
                        continue;
                    }
                    let mode = face.mode();
                    if mode.invisible {
                        continue;
                    }
                    let mut prim = self.face_primitive(obj, mesh, face, &state, &mut counts)?;
                    let order = face_order(&state.matrix, face.vertices.len());
                    let mut corners = Vec::with_capacity(order.len());
                    for &i in order {
                        let vt = face_vertex(mesh, face, i, &state);
                        corners.push(self.vertices.intern(vt));
                    }
                    prim.geometry = Geometry::Tri(corners);
                    self.prims.push(prim);
                }
                if !anim.is_root() {
                    self.anim_candidates.push(start);
                }
            }
        }

        let culprit = || vec![obj.name.clone()];
        if counts.degenerate > 0 {
            diags.info(
                format!("Ignoring {} degenerate face(s) in mesh \"{}\"", counts.degenerate, obj.name),
                culprit(),
            );
        }
        if counts.hard > 0 {
            diags.info(
                format!("Found {} hard face(s) in mesh \"{}\"", counts.hard, obj.name),
                culprit(),
            );
        }
        if counts.two_sided > 0 {
            diags.info(
                format!("Found {} two-sided face(s) in mesh \"{}\"", counts.two_sided, obj.name),
                culprit(),
            );
        }
        Ok(())
    }

    /// Look for an earlier animated mesh with the same faces.
    ///
    /// Every candidate starts as a match and is dropped at the first face
    /// whose vertices differ. Returns the first primitive of the survivor.
    fn find_instance(&self, mesh: &MeshData, state: &MeshState) -> Option<usize> {
        let fudge = LIMIT * 10.0;
        let mut candidates = self.anim_candidates.clone();
        let mut trino = 0;
        for face in &mesh.faces {
            if !is_renderable(mesh, face) || face.mode().invisible {
                continue;
            }
            let order = face_order(&state.matrix, face.vertices.len());
            for &i in order {
                let vt = face_vertex(mesh, face, i, state);
                candidates.retain(|&start| {
                    self.prims
                        .get(start + trino)
                        .map(Primitive::corners)
                        .filter(|corners| corners.len() == order.len())
                        .and_then(|corners| corners.get(order[i]))
                        .and_then(|&index| self.vertices.get(index))
                        .is_some_and(|existing| vt.approx_eq(existing, fudge))
                });
            }
            if candidates.is_empty() {
                return None;
            }
            trino += 1;
        }
        candidates.first().copied()
    }

    /// A tri primitive carrying the face's render state, without corners.
    fn face_primitive(
        &self,
        obj: &SceneObject,
        mesh: &MeshData,
        face: &MeshFace,
        state: &MeshState,
        counts: &mut FaceCounts,
    ) -> Result<Primitive> {
        let mode = face.mode();
        let cockpit = self.config.cockpit;
        let mut prim = Primitive::new(&obj.name, obj.layers, state.anim, Geometry::Tri(Vec::new()))
            .with_group(state.group)
            .with_panel_texture(state.has_panel_texture);

        if let Some(Some(slot)) = mesh.materials.get(face.material) {
            prim.material = Material::new(slot.color, slot.mirror.map(|m| m * slot.emit), slot.spec);
        }

        if mode.tex {
            if face.uv.len() != face.vertices.len() {
                return Err(ObjError::MissingUv {
                    object: obj.name.clone(),
                });
            }
            if mode.alpha {
                prim.flags |= Flags::ALPHA;
            }
        }

        if mode.two_sided {
            prim.flags |= Flags::TWOSIDE;
            counts.two_sided += 1;
        }

        if !mode.tiles || cockpit {
            prim.flags |= Flags::NPOLY;
        }

        if cockpit && mode.tex {
            let image = face.image.as_deref();
            if let Some(region) = image.and_then(|i| self.survey.region_index(i)) {
                prim.flags = (prim.flags | Flags::PANEL) & !Flags::ALPHA;
                prim.region = region as i32;
            } else if image.is_some_and(is_panel_image) {
                prim.flags |= Flags::PANEL;
            }
        }

        if !cockpit && obj.layers & 1 != 0 && !mode.dynamic {
            prim.flags |= state.hardness;
            prim.surface = state.surface;
            counts.hard += 1;
        }

        Ok(prim)
    }
}

/// Triangles and quads whose corners all exist.
fn is_renderable(mesh: &MeshData, face: &MeshFace) -> bool {
    matches!(face.vertices.len(), 3 | 4) && face.vertices.iter().all(|&v| v < mesh.vertices.len())
}

fn face_vertex(mesh: &MeshData, face: &MeshFace, corner: usize, state: &MeshState) -> VertexEntry {
    let vertex = &mesh.vertices[face.vertices[corner]];
    let normal = if face.smooth { vertex.normal } else { face.normal };
    let uv = if face.mode().tex {
        face.uv.get(corner).copied().map(Uv::from).unwrap_or_default()
    } else {
        Uv::default()
    };
    VertexEntry::new(
        to_xplane(&state.matrix, DVec3::from_array(vertex.co)),
        to_xplane_dir(&state.normal_matrix, DVec3::from_array(normal)),
        uv,
    )
}

fn face_points(mesh: &MeshData, face: &MeshFace, matrix: &DMat4) -> Option<[DVec3; 4]> {
    if face.vertices.len() != 4 {
        return None;
    }
    let mut points = [DVec3::ZERO; 4];
    for (point, &index) in points.iter_mut().zip(&face.vertices) {
        *point = to_xplane(matrix, DVec3::from_array(mesh.vertices.get(index)?.co));
    }
    Some(points)
}

/// A mesh made of one untextured quad whose opposite ends are each
/// narrower than `width` is drawn as a line.
pub fn is_line(mesh: &MeshData, world: &DMat4, width: f64) -> bool {
    if mesh.faces.len() != 1 || mesh.faces[0].mode().tex {
        return false;
    }
    let Some(v) = face_points(mesh, &mesh.faces[0], world) else {
        return false;
    };
    (0..2).any(|i| approx_eq(v[i], v[i + 1], width) && approx_eq(v[i + 2], v[(i + 3) % 4], width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{
        ArmatureData, Bone, BonePose, FaceMode, MaterialSlot, MeshVertex, PanelRegion, PropertyValue,
    };

    struct Fixture {
        scene: Scene,
        config: ExportConfig,
        datarefs: DatarefRegistry,
        manipulators: ManipulatorRegistry,
    }

    impl Fixture {
        fn new(objects: Vec<SceneObject>) -> Self {
            Self {
                scene: Scene {
                    objects,
                    ..Default::default()
                },
                config: ExportConfig::default(),
                datarefs: DatarefRegistry::parse(
                    "2 1001 Sun Mar 18 2007 X-Plane\n\
                     sim/cockpit2/controls/yoke_roll_ratio float y ratio Roll\n\
                     sim/lights/beacon_lights_on int y bool Beacon\n\
                     sim/graphics/animation/lights/airplane_beacon_light_rgb float[9] n none\n",
                )
                .unwrap(),
                manipulators: ManipulatorRegistry::builtin(),
            }
        }

        fn run(&self) -> Result<(Classified, Diagnostics)> {
            let mut diags = Diagnostics::new();
            let survey = Survey::run(&self.scene, &self.config, &mut diags)?;
            let mut classifier =
                Classifier::new(&self.scene, &self.config, &survey, &self.datarefs, &self.manipulators);
            classifier.classify_scene(&mut diags)?;
            Ok((classifier.finish(), diags))
        }
    }

    fn flat_vertex(x: f64, y: f64) -> MeshVertex {
        MeshVertex::new([x, y, 0.0], [0.0, 0.0, 1.0])
    }

    fn flat_face(vertices: Vec<usize>) -> MeshFace {
        let mut face = MeshFace::new(vertices);
        face.normal = [0.0, 0.0, 1.0];
        face
    }

    fn mesh(name: &str, vertices: Vec<MeshVertex>, faces: Vec<MeshFace>) -> SceneObject {
        SceneObject::new(
            name,
            ObjectData::Mesh(MeshData {
                vertices,
                faces,
                materials: Vec::new(),
            }),
        )
    }

    fn two_triangles() -> SceneObject {
        mesh(
            "Pair",
            vec![
                flat_vertex(0.0, 0.0),
                flat_vertex(1.0, 0.0),
                flat_vertex(0.0, 1.0),
                flat_vertex(-1.0, 0.0),
                flat_vertex(0.0, -1.0),
            ],
            vec![flat_face(vec![0, 1, 2]), flat_face(vec![0, 3, 4])],
        )
    }

    #[test]
    fn test_shared_corner_is_interned_once() {
        let fixture = Fixture::new(vec![two_triangles()]);
        let (classified, _) = fixture.run().unwrap();
        assert_eq!(classified.vertices.len(), 5);
        assert_eq!(classified.prims.len(), 2);
        let first = classified.prims[0].corners();
        let second = classified.prims[1].corners();
        assert_eq!(first[2], second[2]);
    }

    #[test]
    fn test_winding_is_reversed() {
        let fixture = Fixture::new(vec![two_triangles()]);
        let (classified, _) = fixture.run().unwrap();
        let corners = classified.prims[0].corners();
        // Corner 2 of the source face is emitted first.
        let first = classified.vertices.get(corners[0]).unwrap();
        assert_eq!(first.position, DVec3::new(0.0, 0.0, -1.0));
        assert_eq!(first.normal, DVec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_mirrored_object_keeps_winding() {
        let obj = two_triangles().with_matrix(DMat4::from_scale(DVec3::new(-1.0, 1.0, 1.0)));
        let fixture = Fixture::new(vec![obj]);
        let (classified, _) = fixture.run().unwrap();
        let corners = classified.prims[0].corners();
        let first = classified.vertices.get(corners[0]).unwrap();
        assert_eq!(first.position, DVec3::ZERO);
    }

    #[test]
    fn test_default_flags_and_material() {
        let fixture = Fixture::new(vec![two_triangles()]);
        let (classified, diags) = fixture.run().unwrap();
        let prim = &classified.prims[0];
        assert_eq!(prim.flags, Flags::NPOLY);
        assert!(prim.material.is_default());
        assert_eq!(prim.surface, None);
        assert!(prim.anim.is_root());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_hard_surface_faces() {
        let mut obj = two_triangles()
            .with_property("surface", PropertyValue::String("concrete".into()))
            .with_property("deck", PropertyValue::Int(1));
        if let ObjectData::Mesh(mesh) = &mut obj.data {
            mesh.faces[0].mode = Some(FaceMode {
                tiles: true,
                ..Default::default()
            });
        }
        let fixture = Fixture::new(vec![obj]);
        let (classified, diags) = fixture.run().unwrap();
        assert_eq!(classified.prims[0].flags, Flags::DECK);
        assert_eq!(classified.prims[0].surface, Some(SurfaceType::Concrete));
        assert_eq!(classified.prims[1].flags, Flags::NPOLY);
        assert!(diags.contains("Found 1 hard face(s) in mesh \"Pair\""));
    }

    #[test]
    fn test_invalid_surface_is_fatal() {
        let obj = two_triangles().with_property("surface", PropertyValue::String("lava".into()));
        let fixture = Fixture::new(vec![obj]);
        assert!(matches!(fixture.run(), Err(ObjError::InvalidSurface { .. })));
    }

    #[test]
    fn test_degenerate_and_invisible_faces() {
        let mut invisible = flat_face(vec![0, 1, 2]);
        invisible.mode = Some(FaceMode {
            invisible: true,
            ..FaceMode::untextured()
        });
        let obj = mesh(
            "Bits",
            vec![flat_vertex(0.0, 0.0), flat_vertex(1.0, 0.0), flat_vertex(0.0, 1.0)],
            vec![flat_face(vec![0, 1]), invisible, flat_face(vec![0, 1, 7]), flat_face(vec![0, 1, 2])],
        );
        let fixture = Fixture::new(vec![obj]);
        let (classified, diags) = fixture.run().unwrap();
        assert_eq!(classified.prims.len(), 1);
        assert!(diags.contains("Ignoring 2 degenerate face(s) in mesh \"Bits\""));
    }

    #[test]
    fn test_missing_uv() {
        let mut face = flat_face(vec![0, 1, 2]);
        face.mode = Some(FaceMode::textured());
        face.uv = vec![[0.0, 0.0]];
        let obj = mesh(
            "Bad",
            vec![flat_vertex(0.0, 0.0), flat_vertex(1.0, 0.0), flat_vertex(0.0, 1.0)],
            vec![face],
        );
        let fixture = Fixture::new(vec![obj]);
        assert!(matches!(fixture.run(), Err(ObjError::MissingUv { .. })));
    }

    #[test]
    fn test_textured_alpha_two_sided() {
        let mut face = flat_face(vec![0, 1, 2]);
        face.mode = Some(FaceMode {
            tex: true,
            alpha: true,
            two_sided: true,
            tiles: true,
            dynamic: true,
            ..Default::default()
        });
        face.uv = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        face.image = Some("tex.png".into());
        let obj = mesh(
            "Glass",
            vec![flat_vertex(0.0, 0.0), flat_vertex(1.0, 0.0), flat_vertex(0.0, 1.0)],
            vec![face],
        );
        let fixture = Fixture::new(vec![obj]);
        let (classified, diags) = fixture.run().unwrap();
        assert_eq!(classified.prims[0].flags, Flags::ALPHA | Flags::TWOSIDE);
        let corner = classified.vertices.get(classified.prims[0].corners()[0]).unwrap();
        assert_eq!(corner.uv, Uv::new(0.0, 1.0));
        assert!(diags.contains("Found 1 two-sided face(s)"));
    }

    #[test]
    fn test_cockpit_region_face() {
        let mut face = flat_face(vec![0, 1, 2]);
        face.mode = Some(FaceMode {
            alpha: true,
            ..FaceMode::textured()
        });
        face.uv = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        face.image = Some("region1.png".into());
        let obj = mesh(
            "Gauge",
            vec![flat_vertex(0.0, 0.0), flat_vertex(1.0, 0.0), flat_vertex(0.0, 1.0)],
            vec![face],
        );
        let mut fixture = Fixture::new(vec![obj]);
        fixture.scene.panel_regions = vec![PanelRegion {
            image: "region1.png".into(),
            x: 0,
            y: 0,
            width: 128,
            height: 128,
        }];
        fixture.config = ExportConfig::default().with_cockpit(true);
        let (classified, _) = fixture.run().unwrap();
        let prim = &classified.prims[0];
        assert_eq!(prim.flags, Flags::PANEL | Flags::NPOLY);
        assert_eq!(prim.region, 0);
        assert!(!prim.has_panel_texture);
    }

    #[test]
    fn test_material_slot() {
        let mut obj = two_triangles();
        if let ObjectData::Mesh(mesh) = &mut obj.data {
            mesh.materials = vec![Some(MaterialSlot {
                color: [1.0, 0.0, 0.0],
                mirror: [1.0, 0.5, 0.0],
                emit: 0.5,
                spec: 0.25,
                ..Default::default()
            })];
        }
        let fixture = Fixture::new(vec![obj]);
        let (classified, _) = fixture.run().unwrap();
        assert_eq!(
            classified.prims[0].material,
            Material::new([1.0, 0.0, 0.0], [0.5, 0.25, 0.0], 0.25)
        );
    }

    #[test]
    fn test_thin_quad_is_a_line() {
        let obj = mesh(
            "Wire",
            vec![
                MeshVertex::new([0.0, 0.0, 0.0], [0.0; 3]),
                MeshVertex::new([0.05, 0.0, 0.0], [0.0; 3]),
                MeshVertex::new([0.05, 5.0, 0.0], [0.0; 3]),
                MeshVertex::new([0.0, 5.0, 0.0], [0.0; 3]),
            ],
            vec![MeshFace::new(vec![0, 1, 2, 3])],
        );
        let fixture = Fixture::new(vec![obj]);
        let (classified, _) = fixture.run().unwrap();
        assert_eq!(classified.prims.len(), 1);
        assert_eq!(classified.prims[0].flags, Flags::LIGHTS);
        assert_eq!(classified.lines.len(), 2);
        let ends = classified.lines.entries();
        assert_eq!(ends[0].position, DVec3::new(0.025, 0.0, 0.0));
        assert_eq!(ends[1].position, DVec3::new(0.025, 0.0, -5.0));
        assert_eq!(ends[0].color, LINE_GREY);
    }

    #[test]
    fn test_lamp_names() {
        let lamp = |name: &str| {
            SceneObject::new(
                name,
                ObjectData::Lamp(LampData {
                    color: [1.0, 0.5, 0.0],
                    energy: 2.0,
                    ..Default::default()
                }),
            )
        };
        let spot = SceneObject::new(
            "Spot",
            ObjectData::Lamp(LampData {
                kind: LampKind::Spot,
                ..Default::default()
            }),
        );
        let fixture = Fixture::new(vec![
            lamp("Pulse light"),
            lamp("flash.001"),
            lamp("smoke_black"),
            lamp("airplane_beacon").with_property("name", PropertyValue::String(" beacon ".into())),
            spot,
        ]);
        let (classified, diags) = fixture.run().unwrap();
        let geometry: Vec<&Geometry> = classified.prims.iter().map(|p| &p.geometry).collect();
        assert_eq!(geometry.len(), 4);
        assert!(matches!(geometry[0], Geometry::VLight(VLight { color, .. }) if *color == [9.9; 3]));
        assert!(matches!(geometry[1], Geometry::VLight(VLight { color, .. }) if color[0] == -1.0 && color[2] == 0.0));
        assert!(matches!(geometry[2], Geometry::NLight(NamedLight::Smoke { size, .. }) if *size == 2.0));
        assert!(matches!(geometry[3], Geometry::NLight(NamedLight::Named { name, .. }) if name == "beacon"));
        assert!(diags.contains("Ignoring Area, Spot, Sun or Hemi lamp \"Spot\""));
    }

    #[test]
    fn test_custom_light() {
        let light = SceneObject::new(
            "Beacon",
            ObjectData::Mesh(MeshData {
                vertices: vec![MeshVertex::new([0.0, 0.0, 1.0], [0.0; 3])],
                faces: Vec::new(),
                materials: vec![Some(MaterialSlot {
                    color: [1.0, 0.0, 0.0],
                    halo: true,
                    halo_size: 2.5,
                    texture_crop: Some([0.0, 0.5, 0.5, 1.0]),
                    texture_image: Some("lights.png".into()),
                    ..Default::default()
                })],
            }),
        )
        .with_property("A", PropertyValue::Float(0.5))
        .with_property("name", PropertyValue::String("airplane_beacon_light_rgb".into()));
        let fixture = Fixture::new(vec![light]);
        let (classified, _) = fixture.run().unwrap();
        match &classified.prims[0].geometry {
            Geometry::NLight(NamedLight::Custom {
                position,
                rgba,
                size,
                uv1,
                uv2,
                dataref,
            }) => {
                assert_eq!(*position, DVec3::new(0.0, 1.0, 0.0));
                assert_eq!(*rgba, [1.0, 0.0, 0.0, 0.5]);
                assert_eq!(*size, 2.5);
                assert_eq!(*uv1, Uv::new(0.0, 0.5));
                assert_eq!(*uv2, Uv::new(0.5, 1.0));
                assert_eq!(dataref, "sim/graphics/animation/lights/airplane_beacon_light_rgb");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_custom_light_needs_rgb_dataref() {
        let light = SceneObject::new(
            "Beacon",
            ObjectData::Mesh(MeshData {
                vertices: vec![MeshVertex::new([0.0; 3], [0.0; 3])],
                faces: Vec::new(),
                materials: vec![Some(MaterialSlot {
                    halo: true,
                    ..Default::default()
                })],
            }),
        )
        .with_property("name", PropertyValue::String("beacon_lights_on".into()));
        let fixture = Fixture::new(vec![light]);
        assert!(matches!(fixture.run(), Err(ObjError::DatarefNotLightable { .. })));
    }

    #[test]
    fn test_animated_instances_share_vertices() {
        let mut bone = Bone::new("yoke_roll_ratio");
        bone.frames = vec![
            BonePose::new(Some([0.0; 3]), None),
            BonePose::new(Some([0.0, 0.0, 1.0]), None),
        ];
        let arm = SceneObject::new("Arm", ObjectData::Armature(ArmatureData { bones: vec![bone] }));
        let mut left = two_triangles().with_parent("Arm", Some("yoke_roll_ratio"));
        left.name = "Left".into();
        let mut right = two_triangles().with_parent("Arm", Some("yoke_roll_ratio"));
        right.name = "Right".into();

        let fixture = Fixture::new(vec![arm, left, right]);
        let (classified, _) = fixture.run().unwrap();
        assert_eq!(classified.prims.len(), 4);
        assert_eq!(classified.vertices.len(), 5);
        assert_eq!(classified.prims[2].corners(), classified.prims[0].corners());
        assert_eq!(classified.prims[3].anim, classified.prims[1].anim);
        assert_eq!(classified.anims.len(), 1);
    }
}
