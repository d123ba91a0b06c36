//! Scene-wide settings gathered before any primitive is built.
//!
//! The survey decides which layers are exported and at which distances,
//! finds the single texture the object uses, and collects the cockpit
//! panel regions and the draw group.

use crate::config::ExportConfig;
use crate::diagnostic::Diagnostics;
use crate::error::{ObjError, Result};
use crate::scene::{lod_overrides, EmptyOptions, LampKind, ObjectData, PanelRegion, PropertyValue, Scene, SceneObject};
use crate::types::DrawGroup;

const MULTIPLE_LODS: &str = "Multiple Levels Of Detail found";

#[derive(Debug, Clone, PartialEq)]
pub struct Survey {
    /// Layers exported: 1, or 7 for all three LODs.
    pub layer_mask: u32,
    pub lod_ranges: [i32; 4],
    pub texture: Option<String>,
    /// Panel regions actually used, in declaration order.
    pub regions: Vec<PanelRegion>,
    pub draw_group: Option<DrawGroup>,
    pub slung_load_weight: Option<PropertyValue>,
}

impl Survey {
    pub fn run(scene: &Scene, config: &ExportConfig, diags: &mut Diagnostics) -> Result<Self> {
        let mut layer_mask = 1;
        let mut lod_ranges = config.lod_ranges;

        if !config.cockpit {
            let mut base = 0;
            for obj in &scene.objects {
                if layer_mask == 1 {
                    let layers = obj.layers & 7;
                    if base == 0 {
                        base = layers;
                    } else if layers != 0 && layers != base {
                        layer_mask = 7;
                        diags.info(MULTIPLE_LODS, Vec::new());
                    }
                }

                if matches!(obj.data, ObjectData::Empty) {
                    for (index, distance) in lod_overrides(obj) {
                        lod_ranges[index] = distance;
                        if index < 3 && lod_ranges[index + 1] <= lod_ranges[index] {
                            lod_ranges[index + 1] = lod_ranges[index] + 1;
                        }
                        if layer_mask != 7 {
                            layer_mask = 7;
                            diags.info(MULTIPLE_LODS, Vec::new());
                        }
                    }
                }
            }
        }

        let mut textures = TextureCandidates::default();
        let mut used_regions = vec![false; scene.panel_regions.len()];
        let mut panel_objects: Vec<String> = Vec::new();
        let mut draw_group = None;
        let mut slung_load_weight = None;

        for obj in scene.objects.iter().filter(|o| o.layers & layer_mask != 0) {
            match &obj.data {
                ObjectData::Mesh(mesh) if mesh.is_custom_light() => {
                    match mesh.first_material().and_then(|m| m.texture_image.as_deref()) {
                        Some(image) => textures.add(image, obj),
                        None => diags.warn(
                            format!("Custom light \"{}\" has no texture", obj.name),
                            vec![obj.name.clone()],
                        ),
                    }
                }
                ObjectData::Mesh(mesh) => {
                    for face in &mesh.faces {
                        let Some(image) = face.image.as_deref() else {
                            continue;
                        };
                        if !face.mode().tex {
                            continue;
                        }
                        if !config.cockpit {
                            textures.add(image, obj);
                        } else if let Some(region) = scene.region_index(image) {
                            used_regions[region] = true;
                        } else if is_panel_image(image) {
                            if !panel_objects.contains(&obj.name) {
                                panel_objects.push(obj.name.clone());
                            }
                        } else {
                            textures.add(image, obj);
                        }
                    }
                }
                ObjectData::Lamp(lamp) if config.cockpit && lamp.kind == LampKind::Point => {
                    return Err(ObjError::CockpitLight {
                        objects: vec![obj.name.clone()],
                    });
                }
                ObjectData::Empty => {
                    let options = EmptyOptions::parse(obj)?;
                    if options.draw_group.is_some() {
                        draw_group = options.draw_group;
                    }
                    if options.slung_load_weight.is_some() {
                        slung_load_weight = options.slung_load_weight;
                    }
                }
                _ => {}
            }
        }

        if textures.conflicts() {
            return Err(ObjError::MultipleTextures {
                textures: textures.distinct,
                objects: textures.culprits,
            });
        }

        let regions: Vec<PanelRegion> = scene
            .panel_regions
            .iter()
            .zip(&used_regions)
            .filter(|(_, used)| **used)
            .map(|(region, _)| region.clone())
            .collect();

        if !panel_objects.is_empty() && !regions.is_empty() {
            return Err(ObjError::PanelWithRegions {
                objects: panel_objects,
            });
        }

        let texture = scene
            .texture
            .clone()
            .filter(|t| !t.is_empty())
            .or(textures.chosen);

        if config.cockpit && texture.is_some() {
            diags.info("Using algorithms appropriate for a cockpit object", Vec::new());
        }
        log::debug!("Texture {:?}, layer mask {}", texture, layer_mask);

        Ok(Self {
            layer_mask,
            lod_ranges,
            texture,
            regions,
            draw_group,
            slung_load_weight,
        })
    }

    /// Layers visited by the writer, one per LOD.
    pub fn layer_sequence(&self) -> &'static [u32] {
        if self.layer_mask == 1 {
            &[1]
        } else {
            &[1, 2, 4]
        }
    }

    pub fn exports(&self, object: &SceneObject) -> bool {
        object.layers & self.layer_mask != 0
    }

    /// Index of the used region textured with `image`.
    pub fn region_index(&self, image: &str) -> Option<usize> {
        self.regions.iter().position(|r| r.image == image)
    }
}

/// Images named like `panel.png` use the whole cockpit panel.
pub fn is_panel_image(image: &str) -> bool {
    image.to_lowercase().contains("panel.")
}

#[derive(Debug, Default)]
struct TextureCandidates {
    chosen: Option<String>,
    distinct: Vec<String>,
    culprits: Vec<String>,
}

impl TextureCandidates {
    fn add(&mut self, image: &str, object: &SceneObject) {
        if !self
            .distinct
            .iter()
            .any(|t| t.eq_ignore_ascii_case(image))
        {
            self.distinct.push(image.to_string());
        }
        match &self.chosen {
            None => self.chosen = Some(image.to_string()),
            Some(chosen) if chosen.eq_ignore_ascii_case(image) => {}
            Some(_) => {
                if !self.culprits.contains(&object.name) {
                    self.culprits.push(object.name.clone());
                }
            }
        }
    }

    fn conflicts(&self) -> bool {
        self.distinct.len() > 1
    }
}

/// Warn about objects on layers that were not exported.
pub fn check_layers(scene: &Scene, cockpit: bool, diags: &mut Diagnostics) {
    let mask = if cockpit { 1 } else { 7 };
    let outside: Vec<String> = scene
        .objects
        .iter()
        .filter(|o| o.layers != 0 && o.layers & mask == 0)
        .map(|o| o.name.clone())
        .collect();
    if outside.is_empty() {
        return;
    }
    let message = if cockpit {
        "Objects were found outside layer 1 and were not exported"
    } else {
        "Objects were found outside layers 1-3 and were not exported"
    };
    diags.warn(message, outside);
}
