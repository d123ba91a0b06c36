//! Typed views over object properties.
//!
//! Each object kind reads a fixed set of properties. Parsing happens once per
//! object and an invalid value is a hard error naming the object.

use super::{PropertyValue, SceneObject};
use crate::error::{ObjError, Result};
use crate::types::{DrawGroup, SurfaceType};

/// Hard surface options of a mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshOptions {
    pub surface: Option<SurfaceType>,
    /// Hard faces are decks that can be walked under.
    pub deck: bool,
}

impl MeshOptions {
    pub fn parse(object: &SceneObject) -> Result<Self> {
        let mut options = Self::default();
        for prop in &object.properties {
            let name = prop.name.trim().to_lowercase();
            if name == "surface" {
                let text = prop.value.to_string();
                let surface = text.trim().parse::<SurfaceType>().map_err(|_| {
                    ObjError::InvalidSurface {
                        surface: text.clone(),
                        object: object.name.clone(),
                    }
                })?;
                options.surface = Some(surface);
            } else if name == "deck" && prop.value.is_truthy() {
                options.deck = true;
            }
        }
        Ok(options)
    }
}

/// Overrides for a custom light.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomLightOptions {
    /// `R`, `G`, `B` and `A` overrides of the material colour.
    pub rgba: [Option<f64>; 4],
    /// Dataref short name, leaf name or custom name.
    pub dataref: Option<String>,
}

impl CustomLightOptions {
    pub fn parse(object: &SceneObject) -> Result<Self> {
        let mut options = Self::default();
        for prop in &object.properties {
            let channel = ["R", "G", "B", "A"].iter().position(|c| *c == prop.name);
            if let Some(channel) = channel {
                let value = prop.value.as_number().ok_or_else(|| unsupported(&prop.name, object))?;
                options.rgba[channel] = Some(value);
            } else if prop.name == "name" {
                let name = prop.value.as_str().ok_or_else(|| unsupported("name", object))?;
                options.dataref = Some(name.trim().to_string());
            }
        }
        Ok(options)
    }

    /// Material colour with the overrides applied.
    pub fn apply(&self, base: [f64; 4]) -> [f64; 4] {
        let mut rgba = base;
        for (out, value) in rgba.iter_mut().zip(self.rgba) {
            if let Some(value) = value {
                *out = value;
            }
        }
        rgba
    }
}

/// Scene-wide settings carried by empties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmptyOptions {
    pub draw_group: Option<DrawGroup>,
    pub slung_load_weight: Option<PropertyValue>,
    /// `(lod index, distance)` pairs from `lod_0` to `lod_3`.
    pub lod_ranges: Vec<(usize, i32)>,
}

impl EmptyOptions {
    pub fn parse(object: &SceneObject) -> Result<Self> {
        let mut options = Self::default();
        for prop in &object.properties {
            let Some(number) = prop.value.as_number() else {
                continue;
            };
            let name = prop.name.trim();

            if let Some(group) = name.strip_prefix("group_") {
                if !DrawGroup::is_valid_name(group) {
                    return Err(ObjError::InvalidDrawGroup {
                        group: group.to_string(),
                        object: object.name.clone(),
                    });
                }
                options.draw_group = Some(DrawGroup {
                    name: group.to_string(),
                    offset: number as i32,
                });
            } else if name == "slung_load_weight" {
                options.slung_load_weight = Some(prop.value.clone());
            }
        }
        options.lod_ranges = lod_overrides(object);
        Ok(options)
    }
}

/// `lod_0` to `lod_3` distance overrides carried by an object, in order.
pub fn lod_overrides(object: &SceneObject) -> Vec<(usize, i32)> {
    object
        .properties
        .iter()
        .filter_map(|prop| {
            let number = prop.value.as_number()?;
            lod_index(&prop.name).map(|index| (index, number as i32))
        })
        .collect()
}

fn lod_index(name: &str) -> Option<usize> {
    let lower = name.to_lowercase();
    let digit = lower.strip_prefix("lod_")?;
    match digit {
        "0" => Some(0),
        "1" => Some(1),
        "2" => Some(2),
        "3" => Some(3),
        _ => None,
    }
}

/// Name to use for a named light: the `name` property if present, else the
/// object name.
pub fn light_name(object: &SceneObject, default: &str) -> String {
    object
        .properties
        .iter()
        .filter(|p| p.name.to_lowercase() == "name")
        .last()
        .map(|p| p.value.to_string().trim().to_string())
        .unwrap_or_else(|| default.to_string())
}

fn unsupported(property: &str, object: &SceneObject) -> ObjError {
    ObjError::UnsupportedPropertyType {
        property: property.to_string(),
        object: object.name.clone(),
    }
}
