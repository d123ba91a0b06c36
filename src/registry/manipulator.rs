//! Cockpit manipulator definitions.
//!
//! Each manipulator type has a fixed, ordered list of attributes with
//! defaults. The directive is the type name followed by the attribute values,
//! tab separated, in that order.

use crate::error::{ObjError, Result};
use crate::scene::{Property, PropertyValue};

/// Property selecting the manipulator of an armature.
pub const MANIPULATOR_TYPE: &str = "manipulator_type";

/// Value meaning "no manipulator".
pub const MANIP_NONE: &str = "ATTR_manip_none";

/// A manipulator attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum ManipValue {
    Str(String),
    Float(f64),
    Int(i64),
}

impl ManipValue {
    fn format(&self) -> String {
        match self {
            ManipValue::Str(s) => s.trim().to_string(),
            ManipValue::Float(f) => format!("{:6.2}", f),
            ManipValue::Int(i) => i.to_string(),
        }
    }
}

impl From<&PropertyValue> for ManipValue {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Int(i) => ManipValue::Int(*i),
            PropertyValue::Float(f) => ManipValue::Float(*f),
            PropertyValue::Bool(b) => ManipValue::Int(i64::from(*b)),
            PropertyValue::String(s) => ManipValue::Str(s.clone()),
        }
    }
}

/// One manipulator type and its attribute defaults.
#[derive(Debug, Clone)]
pub struct ManipulatorKind {
    pub name: &'static str,
    pub attributes: Vec<(&'static str, ManipValue)>,
}

/// A manipulator bound to an animation.
#[derive(Debug, Clone, PartialEq)]
pub struct Manipulator {
    pub kind: String,
    pub values: Vec<(String, ManipValue)>,
}

impl Manipulator {
    /// The full manipulator directive line, without indentation.
    pub fn to_directive(&self) -> String {
        let mut line = self.kind.clone();
        for (_, value) in &self.values {
            line.push('\t');
            line.push_str(&value.format());
        }
        line
    }
}

/// Table of known manipulator types.
#[derive(Debug, Clone)]
pub struct ManipulatorRegistry {
    kinds: Vec<ManipulatorKind>,
}

impl Default for ManipulatorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ManipulatorRegistry {
    /// The manipulators understood by X-Plane 9.
    pub fn builtin() -> Self {
        use ManipValue::{Float, Int};
        let s = || ManipValue::Str(String::new());
        let f = || Float(0.0);

        let kinds = vec![
            ManipulatorKind {
                name: "ATTR_manip_drag_xy",
                attributes: vec![
                    ("cursor", s()),
                    ("dx", f()),
                    ("dy", f()),
                    ("v1min", f()),
                    ("v1max", f()),
                    ("v2min", f()),
                    ("v2max", f()),
                    ("dref1", s()),
                    ("dref2", s()),
                    ("tooltip", s()),
                ],
            },
            ManipulatorKind {
                name: "ATTR_manip_drag_axis",
                attributes: vec![
                    ("cursor", s()),
                    ("dx", f()),
                    ("dy", f()),
                    ("dz", f()),
                    ("v1", f()),
                    ("v2", f()),
                    ("dataref", s()),
                    ("tooltip", s()),
                ],
            },
            ManipulatorKind {
                name: "ATTR_manip_command",
                attributes: vec![("cursor", s()), ("command", s()), ("tooltip", s())],
            },
            ManipulatorKind {
                name: "ATTR_manip_command_axis",
                attributes: vec![
                    ("cursor", s()),
                    ("dx", f()),
                    ("dy", f()),
                    ("dz", f()),
                    ("pos-command", s()),
                    ("neg-command", s()),
                    ("tooltip", s()),
                ],
            },
            ManipulatorKind {
                name: "ATTR_manip_noop",
                attributes: vec![("NULL", Int(0))],
            },
            ManipulatorKind {
                name: "ATTR_manip_push",
                attributes: vec![
                    ("cursor", s()),
                    ("v-down", f()),
                    ("v-up", f()),
                    ("dataref", s()),
                    ("tooltip", s()),
                ],
            },
            ManipulatorKind {
                name: "ATTR_manip_radio",
                attributes: vec![
                    ("cursor", s()),
                    ("v-down", f()),
                    ("dataref", s()),
                    ("tooltip", s()),
                ],
            },
            ManipulatorKind {
                name: "ATTR_manip_toggle",
                attributes: vec![
                    ("cursor", s()),
                    ("v-on", f()),
                    ("v-off", f()),
                    ("dataref", s()),
                    ("tooltip", s()),
                ],
            },
            ManipulatorKind {
                name: "ATTR_manip_delta",
                attributes: delta_attributes(),
            },
            ManipulatorKind {
                name: "ATTR_manip_wrap",
                attributes: delta_attributes(),
            },
        ];
        Self { kinds }
    }

    pub fn get(&self, name: &str) -> Option<&ManipulatorKind> {
        self.kinds.iter().find(|k| k.name == name)
    }

    /// Build the manipulator described by an armature's properties.
    ///
    /// `manipulator_type` picks the type. Properties named
    /// `<type>_<...>_<key>` set the first attribute whose name contains
    /// `key`; properties matching no attribute are ignored.
    pub fn from_properties(&self, properties: &[Property], object: &str) -> Result<Option<Manipulator>> {
        let kind_name = properties
            .iter()
            .filter(|p| p.name == MANIPULATOR_TYPE)
            .last()
            .map(|p| p.value.to_string());
        let kind_name = match kind_name {
            Some(name) if name != MANIP_NONE => name,
            _ => return Ok(None),
        };

        let kind = self.get(&kind_name).ok_or_else(|| ObjError::UnknownManipulator {
            manipulator: kind_name.clone(),
            object: object.to_string(),
        })?;

        let mut values: Vec<(String, ManipValue)> = kind
            .attributes
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        for prop in properties.iter().filter(|p| p.name.starts_with(kind.name)) {
            let key = prop.name.rsplit('_').next().unwrap_or_default();
            if key.is_empty() {
                continue;
            }
            if let Some(slot) = values.iter_mut().find(|(name, _)| name.contains(key)) {
                slot.1 = ManipValue::from(&prop.value);
            }
        }

        Ok(Some(Manipulator {
            kind: kind_name,
            values,
        }))
    }
}

fn delta_attributes() -> Vec<(&'static str, ManipValue)> {
    vec![
        ("cursor", ManipValue::Str(String::new())),
        ("v-down", ManipValue::Float(0.0)),
        ("v-hold", ManipValue::Float(0.0)),
        ("v-min", ManipValue::Float(0.0)),
        ("v-max", ManipValue::Float(0.0)),
        ("dataref", ManipValue::Str(String::new())),
        ("tooltip", ManipValue::Str(String::new())),
    ]
}
