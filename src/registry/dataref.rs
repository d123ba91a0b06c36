//! Dataref registry loaded from `DataRefs.txt`.
//!
//! Every usable dataref is reachable by its abbreviated short name and by its
//! leaf name. Leaf names shared by several datarefs are kept as ambiguous so
//! that lookups can tell "ambiguous" apart from "unknown".

use crate::error::{ObjError, Result};
use std::collections::HashMap;
use std::path::Path;

/// A dataref known to the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataref {
    /// Full path, e.g. `sim/cockpit2/controls/yoke_roll_ratio`.
    pub path: String,
    /// 1 for scalars, the declared length for arrays, 0 when unusable.
    pub array_len: usize,
}

/// Result of looking a name up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatarefLookup<'a> {
    Found(&'a Dataref),
    Ambiguous,
    Unknown,
}

/// Name to dataref table.
#[derive(Debug, Clone, Default)]
pub struct DatarefRegistry {
    // None marks a leaf name used by more than one dataref.
    entries: HashMap<String, Option<Dataref>>,
}

impl DatarefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a `DataRefs.txt` file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse the contents of a `DataRefs.txt` file.
    ///
    /// The first line is a 7 field version banner starting with `2`. Each
    /// following line is `path type writable [units] [description]`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let banner: Vec<&str> = lines.next().unwrap_or_default().split_whitespace().collect();
        if banner.len() != 7 || banner[0] != "2" {
            return Err(ObjError::CorruptDatarefFile(
                "unrecognised version banner".to_string(),
            ));
        }

        let mut registry = Self::new();
        for (lineno, line) in lines.enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() < 3 {
                return Err(ObjError::CorruptDatarefFile(format!(
                    "line {} has too few fields",
                    lineno + 2
                )));
            }

            let path = fields[0];
            let second = path.split('/').nth(1).unwrap_or_default();
            if second == "test" || second == "version" {
                continue;
            }

            let array_len = parse_array_len(fields[1]).ok_or_else(|| {
                ObjError::CorruptDatarefFile(format!(
                    "bad type \"{}\" on line {}",
                    fields[1],
                    lineno + 2
                ))
            })?;
            registry.insert(path, array_len);
        }

        log::debug!("Loaded {} dataref names", registry.entries.len());
        Ok(registry)
    }

    /// Register a dataref under its short name and its leaf name.
    pub fn insert(&mut self, path: &str, array_len: usize) {
        if path.split('/').nth(1) == Some("multiplayer") {
            // Too many clashing names to be useful.
            return;
        }

        let dataref = Dataref {
            path: path.to_string(),
            array_len,
        };

        let short = make_short_name(path);
        if self.entries.contains_key(&short) {
            log::warn!("Ambiguous short name {} for dataref {}", short, path);
        } else {
            self.entries.insert(short, Some(dataref.clone()));
        }

        let leaf = path.rsplit('/').next().unwrap_or(path).to_string();
        if self.entries.contains_key(&leaf) {
            self.entries.insert(leaf, None);
        } else {
            self.entries.insert(leaf, Some(dataref));
        }
    }

    pub fn lookup(&self, name: &str) -> DatarefLookup<'_> {
        match self.entries.get(name) {
            Some(Some(dataref)) => DatarefLookup::Found(dataref),
            Some(None) => DatarefLookup::Ambiguous,
            None => DatarefLookup::Unknown,
        }
    }

    /// True if `name` is a key at all, ambiguous or not.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `int`, `float` and `double` are scalars, `float[8]` is an array of 8, and
/// anything else cannot drive an animation.
fn parse_array_len(ty: &str) -> Option<usize> {
    let lower = ty.to_lowercase();
    for base in ["int", "float", "double"] {
        if let Some(rest) = lower.strip_prefix(base) {
            if rest.is_empty() {
                return Some(1);
            }
            return rest
                .strip_prefix('[')
                .and_then(|r| r.strip_suffix(']'))
                .and_then(|n| n.parse().ok());
        }
    }
    Some(0)
}

/// Abbreviate a dataref path: the initial of each directory (keeping a
/// trailing `2`), then `_` and the leaf. Long leaves lose vowels and
/// underscores.
pub fn make_short_name(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    let mut short = String::new();
    for (i, comp) in parts.iter().enumerate() {
        if i + 1 == parts.len() {
            short.push('_');
            if comp.chars().count() > 15 {
                short.extend(comp.chars().filter(|c| !"aeiouAEIOU_".contains(*c)));
            } else {
                short.push_str(comp);
            }
        } else {
            if let Some(first) = comp.chars().next() {
                short.push(first);
            }
            if comp.ends_with('2') {
                short.push('2');
            }
        }
    }
    short
}
