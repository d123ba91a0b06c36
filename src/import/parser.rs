//! Line tokenizer for OBJ8 text.
//!
//! Each line becomes at most one [`Directive`]. Values stay in X-Plane space;
//! converting to scene space is the builder's job.

use crate::config::Platform;
use crate::error::{ObjError, Result};
use crate::registry::TextureSlot;
use crate::types::{Rgb, SurfaceType, Uv};
use glam::DVec3;
use serde::Serialize;
use std::str::{FromStr, SplitWhitespace};
use thiserror::Error;

/// Why a single line could not be read. The line is skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineError {
    #[error("{directive} is missing its {what}")]
    Missing {
        directive: String,
        what: &'static str,
    },

    #[error("{directive} has an invalid {what} \"{token}\"")]
    Invalid {
        directive: String,
        what: &'static str,
        token: String,
    },

    #[error("unknown surface \"{0}\"")]
    UnknownSurface(String),
}

/// Show or hide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowHideKind {
    Show,
    Hide,
}

/// State-changing `ATTR_*` commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Lod { near: f64, far: f64 },
    PolyOffset(f64),
    /// `ATTR_cull` (true) or `ATTR_no_cull` (false).
    Cull(bool),
    Diffuse(Rgb),
    Emission(Rgb),
    Shiny(f64),
    Reset,
    Hard {
        deck: bool,
        surface: Option<SurfaceType>,
    },
    NoHard,
    Cockpit,
    CockpitRegion(usize),
    NoCockpit,
    LayerGroup { name: String, offset: i32 },
    /// An `ATTR_manip_*` line, kept verbatim.
    Manipulator { kind: String, args: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    PointCounts([usize; 4]),
    Texture {
        slot: TextureSlot,
        path: String,
    },
    CockpitRegion([i32; 4]),
    Vt {
        position: DVec3,
        normal: DVec3,
        uv: Uv,
    },
    VLine {
        position: DVec3,
        color: Rgb,
    },
    VLight {
        position: DVec3,
        color: Rgb,
    },
    /// `IDX` or `IDX10`.
    Idx(Vec<usize>),
    Tris {
        offset: usize,
        count: usize,
    },
    Lines {
        offset: usize,
        count: usize,
    },
    Lights {
        offset: usize,
        count: usize,
    },
    LightNamed {
        name: String,
        position: DVec3,
    },
    LightCustom {
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
    SlungLoadWeight(f64),
    Attr(Attribute),
    AnimBegin,
    AnimEnd,
    Trans {
        from: DVec3,
        to: DVec3,
        v1: f64,
        v2: f64,
        dataref: String,
    },
    Rotate {
        axis: DVec3,
        r1: f64,
        r2: f64,
        v1: f64,
        v2: f64,
        dataref: String,
    },
    TransBegin(String),
    TransKey {
        value: f64,
        position: DVec3,
    },
    TransEnd,
    RotateBegin {
        axis: DVec3,
        dataref: String,
    },
    RotateKey {
        value: f64,
        angle: f64,
    },
    RotateEnd,
    KeyframeLoop(f64),
    ShowHide {
        kind: ShowHideKind,
        v1: f64,
        v2: f64,
        dataref: String,
    },
}

/// Check the three header lines and return the platform marker.
///
/// Lines are consumed from `lines` whether or not the header is valid.
pub fn parse_header<'a, I>(lines: &mut I) -> Result<Platform>
where
    I: Iterator<Item = &'a str>,
{
    let mut next = |expected: &str| {
        lines.next().map(str::trim).ok_or_else(|| {
            ObjError::InvalidHeader(format!("file ends before \"{}\"", expected))
        })
    };

    let marker = next("A or I")?;
    let platform = Platform::from_marker(marker).ok_or_else(|| {
        ObjError::InvalidHeader(format!("expected A or I on line 1, found \"{}\"", marker))
    })?;
    for (line, expected) in [(2, "800"), (3, "OBJ")] {
        let found = next(expected)?;
        if found != expected {
            return Err(ObjError::InvalidHeader(format!(
                "expected {} on line {}, found \"{}\"",
                expected, line, found
            )));
        }
    }
    Ok(platform)
}

/// Read one body line.
///
/// Blank lines, comments and directives this crate doesn't model give
/// `Ok(None)`.
pub fn parse_line(line: &str) -> std::result::Result<Option<Directive>, LineError> {
    let code = line.find('#').map_or(line, |i| &line[..i]);
    let mut tokens = code.split_whitespace();
    let Some(word) = tokens.next() else {
        return Ok(None);
    };
    let mut f = Fields {
        directive: word,
        tokens,
    };

    let directive = match word {
        "POINT_COUNTS" => Directive::PointCounts([
            f.num("vertex count")?,
            f.num("line vertex count")?,
            f.num("light count")?,
            f.num("index count")?,
        ]),
        "TEXTURE" => match f.tokens.next() {
            Some(path) => Directive::Texture {
                slot: TextureSlot::Diffuse,
                path: path.to_string(),
            },
            None => return Ok(None),
        },
        "TEXTURE_LIT" => Directive::Texture {
            slot: TextureSlot::Lit,
            path: f.word("path")?.to_string(),
        },
        "TEXTURE_NORMAL" => Directive::Texture {
            slot: TextureSlot::Normal,
            path: f.word("path")?.to_string(),
        },
        "COCKPIT_REGION" => Directive::CockpitRegion([
            f.num("left")?,
            f.num("bottom")?,
            f.num("right")?,
            f.num("top")?,
        ]),
        "VT" => Directive::Vt {
            position: f.vec3("position")?,
            normal: f.vec3("normal")?,
            uv: Uv::new(f.num("s")?, f.num("t")?),
        },
        "VLINE" => Directive::VLine {
            position: f.vec3("position")?,
            color: f.rgb("colour")?,
        },
        "VLIGHT" => Directive::VLight {
            position: f.vec3("position")?,
            color: f.rgb("colour")?,
        },
        "IDX" => Directive::Idx(vec![f.num("index")?]),
        "IDX10" => {
            let mut indices = Vec::with_capacity(10);
            for _ in 0..10 {
                indices.push(f.num("index")?);
            }
            Directive::Idx(indices)
        }
        "TRIS" | "LINES" | "LIGHTS" => {
            let offset = f.num("offset")?;
            let count = f.num("count")?;
            match word {
                "TRIS" => Directive::Tris { offset, count },
                "LINES" => Directive::Lines { offset, count },
                _ => Directive::Lights { offset, count },
            }
        }
        "LIGHT_NAMED" => Directive::LightNamed {
            name: f.word("name")?.to_string(),
            position: f.vec3("position")?,
        },
        "LIGHT_CUSTOM" => Directive::LightCustom {
            position: f.vec3("position")?,
            rgba: [f.num("red")?, f.num("green")?, f.num("blue")?, f.num("alpha")?],
            size: f.num("size")?,
            uv1: Uv::new(f.num("s1")?, f.num("t1")?),
            uv2: Uv::new(f.num("s2")?, f.num("t2")?),
            dataref: f.word("dataref")?.to_string(),
        },
        "smoke_black" | "smoke_white" => Directive::Smoke {
            kind: word.to_string(),
            position: f.vec3("position")?,
            size: f.num("size")?,
        },
        "slung_load_weight" => Directive::SlungLoadWeight(f.num("weight")?),
        "ANIM_begin" => Directive::AnimBegin,
        "ANIM_end" => Directive::AnimEnd,
        "ANIM_trans" => Directive::Trans {
            from: f.vec3("start position")?,
            to: f.vec3("end position")?,
            v1: f.num("first value")?,
            v2: f.num("second value")?,
            dataref: f.dataref()?,
        },
        "ANIM_rotate" => Directive::Rotate {
            axis: f.vec3("axis")?,
            r1: f.num("first angle")?,
            r2: f.num("second angle")?,
            v1: f.num("first value")?,
            v2: f.num("second value")?,
            dataref: f.dataref()?,
        },
        "ANIM_trans_begin" => Directive::TransBegin(f.dataref()?),
        "ANIM_trans_key" => Directive::TransKey {
            value: f.num("value")?,
            position: f.vec3("position")?,
        },
        "ANIM_trans_end" => Directive::TransEnd,
        "ANIM_rotate_begin" => Directive::RotateBegin {
            axis: f.vec3("axis")?,
            dataref: f.dataref()?,
        },
        "ANIM_rotate_key" => Directive::RotateKey {
            value: f.num("value")?,
            angle: f.num("angle")?,
        },
        "ANIM_rotate_end" => Directive::RotateEnd,
        "ANIM_keyframe_loop" => Directive::KeyframeLoop(f.num("loop")?),
        "ANIM_show" | "ANIM_hide" => Directive::ShowHide {
            kind: if word == "ANIM_show" {
                ShowHideKind::Show
            } else {
                ShowHideKind::Hide
            },
            v1: f.num("first value")?,
            v2: f.num("second value")?,
            dataref: f.dataref()?,
        },
        _ if word.starts_with("ATTR_") => match parse_attribute(&mut f)? {
            Some(attr) => Directive::Attr(attr),
            None => {
                log::debug!("Skipping unsupported attribute {}", word);
                return Ok(None);
            }
        },
        _ => {
            log::debug!("Skipping unsupported directive {}", word);
            return Ok(None);
        }
    };
    Ok(Some(directive))
}

fn parse_attribute(f: &mut Fields) -> std::result::Result<Option<Attribute>, LineError> {
    let directive = f.directive;
    let attr = match directive {
        "ATTR_LOD" => Attribute::Lod {
            near: f.num("near distance")?,
            far: f.num("far distance")?,
        },
        "ATTR_poly_os" => Attribute::PolyOffset(f.num("offset")?),
        "ATTR_cull" => Attribute::Cull(true),
        "ATTR_no_cull" => Attribute::Cull(false),
        "ATTR_diffuse_rgb" => Attribute::Diffuse(f.rgb("colour")?),
        "ATTR_emission_rgb" => Attribute::Emission(f.rgb("colour")?),
        "ATTR_shiny_rat" => Attribute::Shiny(f.num("ratio")?),
        "ATTR_reset" => Attribute::Reset,
        "ATTR_hard" | "ATTR_hard_deck" => {
            let surface = match f.tokens.next() {
                Some(name) => Some(
                    name.parse::<SurfaceType>()
                        .map_err(|_| LineError::UnknownSurface(name.to_string()))?,
                ),
                None => None,
            };
            Attribute::Hard {
                deck: directive == "ATTR_hard_deck",
                surface,
            }
        }
        "ATTR_no_hard" => Attribute::NoHard,
        // Panel-textured objects name their region here.
        "ATTR_cockpit" => match f.tokens.clone().next() {
            Some(_) => Attribute::CockpitRegion(f.num("region")?),
            None => Attribute::Cockpit,
        },
        "ATTR_cockpit_region" => Attribute::CockpitRegion(f.num("region")?),
        "ATTR_no_cockpit" => Attribute::NoCockpit,
        "ATTR_layer_group" => Attribute::LayerGroup {
            name: f.word("group")?.to_string(),
            offset: f.num("offset")?,
        },
        kind if kind.starts_with("ATTR_manip_") => Attribute::Manipulator {
            kind: kind.to_string(),
            args: f.tokens.by_ref().map(str::to_string).collect(),
        },
        _ => return Ok(None),
    };
    Ok(Some(attr))
}

struct Fields<'a> {
    directive: &'a str,
    tokens: SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn word(&mut self, what: &'static str) -> std::result::Result<&'a str, LineError> {
        self.tokens.next().ok_or_else(|| LineError::Missing {
            directive: self.directive.to_string(),
            what,
        })
    }

    fn num<T: FromStr>(&mut self, what: &'static str) -> std::result::Result<T, LineError> {
        let token = self.word(what)?;
        token.parse().map_err(|_| LineError::Invalid {
            directive: self.directive.to_string(),
            what,
            token: token.to_string(),
        })
    }

    fn vec3(&mut self, what: &'static str) -> std::result::Result<DVec3, LineError> {
        Ok(DVec3::new(self.num(what)?, self.num(what)?, self.num(what)?))
    }

    fn rgb(&mut self, what: &'static str) -> std::result::Result<Rgb, LineError> {
        Ok([self.num(what)?, self.num(what)?, self.num(what)?])
    }

    /// The trailing dataref. Older files leave it off, meaning `no_ref`.
    fn dataref(&mut self) -> std::result::Result<String, LineError> {
        Ok(self.tokens.next().unwrap_or("no_ref").to_string())
    }
}
