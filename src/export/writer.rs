//! The command section.
//!
//! Sorted primitives are walked once per exported layer. Before each one the
//! render state it needs is compared against what has already been written,
//! and only the differences produce attributes. Consecutive `TRIS` and
//! `LINES` spans that touch are merged into a single command.

use super::animation::{AnimId, AnimNode, AnimRegistry};
use super::format::{named_light, value, vertex};
use super::primitive::{Flags, Geometry, Primitive};
use super::survey::Survey;
use crate::config::ExportConfig;
use crate::error::Result;
use crate::types::{approx_eq, round_to, Material, SurfaceType, LIMIT};
use glam::{DQuat, DVec3, EulerRot};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
struct RenderState {
    layer: u32,
    group: Option<String>,
    anim: AnimId,
    npoly: bool,
    alpha: bool,
    panel: bool,
    /// Cockpit region of the last tri, -1 for none.
    region: i32,
    material: Material,
    twoside: bool,
    hardness: Flags,
    surface: Option<SurfaceType>,
}

impl RenderState {
    /// What X-Plane assumes at the start of a file and of every LOD.
    fn initial(layer: u32) -> Self {
        Self {
            layer,
            group: None,
            anim: AnimId::ROOT,
            npoly: true,
            alpha: false,
            panel: false,
            region: -1,
            material: Material::DEFAULT,
            twoside: false,
            hardness: Flags::NONE,
            surface: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Tris,
    Lines,
}

/// A pending `TRIS` or `LINES` command.
#[derive(Debug, Clone, Copy)]
struct Run {
    kind: RunKind,
    offset: usize,
    count: usize,
    depth: usize,
}

pub struct CommandWriter<'a> {
    out: &'a mut String,
    anims: &'a AnimRegistry,
    survey: &'a Survey,
    debug_comments: bool,
    state: RenderState,
    run: Option<Run>,
}

/// Write the commands for `prims`, which must already be sorted and
/// indexed.
pub fn write_commands(
    out: &mut String,
    prims: &[Primitive],
    anims: &AnimRegistry,
    survey: &Survey,
    config: &ExportConfig,
) -> Result<()> {
    let mut writer = CommandWriter::new(out, anims, survey, config);
    for &layer in survey.layer_sequence() {
        for prim in prims.iter().filter(|p| p.layer & layer != 0) {
            writer.write_primitive(prim, layer)?;
        }
    }
    writer.finish()
}

fn indent(depth: usize) -> String {
    "\t".repeat(depth)
}

impl<'a> CommandWriter<'a> {
    pub fn new(
        out: &'a mut String,
        anims: &'a AnimRegistry,
        survey: &'a Survey,
        config: &ExportConfig,
    ) -> Self {
        Self {
            out,
            anims,
            survey,
            debug_comments: config.debug_comments,
            state: RenderState::initial(0),
            run: None,
        }
    }

    fn ins(&self) -> String {
        indent(self.anims.depth(self.state.anim))
    }

    /// Write one directive at the current animation depth.
    fn line(&mut self, text: &str) -> Result<()> {
        let ins = self.ins();
        writeln!(self.out, "{}{}", ins, text)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(run) = self.run.take() {
            let name = match run.kind {
                RunKind::Tris => "TRIS",
                RunKind::Lines => "LINES",
            };
            writeln!(self.out, "{}{}\t{} {}", indent(run.depth), name, run.offset, run.count)?;
        }
        Ok(())
    }

    fn accumulate(&mut self, kind: RunKind, offset: usize, count: usize) -> Result<()> {
        let depth = self.anims.depth(self.state.anim);
        if let Some(run) = self.run.as_mut() {
            if run.kind == kind && run.offset + run.count == offset {
                run.count += count;
                run.depth = depth;
                return Ok(());
            }
        }
        self.flush()?;
        self.run = Some(Run {
            kind,
            offset,
            count,
            depth,
        });
        Ok(())
    }

    /// Bring the written state in line with `prim` and emit its geometry.
    pub fn write_primitive(&mut self, prim: &Primitive, layer: u32) -> Result<()> {
        let mut flags = prim.flags;
        if layer > 1 {
            // Only the first LOD may be hard.
            flags.remove(Flags::HARD | Flags::DECK);
        }
        let is_tri = matches!(prim.geometry, Geometry::Tri(_));

        if layer != self.state.layer {
            self.flush()?;
            self.close_to(0)?;
            self.state = RenderState::initial(layer);
            if self.survey.layer_mask == 1 {
                self.out.push('\n');
            } else {
                let lod = &self.survey.lod_ranges;
                let i = (layer / 2) as usize;
                write!(self.out, "\nATTR_LOD\t{} {}\n", lod[i], lod[i + 1])?;
            }
        }

        let old = self.anims.chain(self.state.anim);
        let new = self.anims.chain(prim.anim);
        let common = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
        if prim.anim != self.state.anim {
            self.close_to(common)?;
        }

        if self.state.group != prim.group {
            self.flush()?;
            match &prim.group {
                None => self.line("####No_group")?,
                Some(group) => self.line(&format!("####_group\t{}", group))?,
            }
            self.state.group = prim.group.clone();
        }

        if is_tri {
            let npoly = flags.intersects(Flags::NPOLY);
            if self.state.npoly && !npoly {
                self.flush()?;
                self.line("ATTR_poly_os\t2")?;
            } else if npoly && !self.state.npoly {
                self.flush()?;
                self.line("ATTR_poly_os\t0")?;
            }
            self.state.npoly = npoly;

            // Blending is implied by the texture; only the batch breaks.
            let alpha = flags.intersects(Flags::ALPHA);
            if alpha != self.state.alpha {
                self.flush()?;
                log::trace!("Alpha {} at \"{}\"", if alpha { "on" } else { "off" }, prim.object);
            }
            self.state.alpha = alpha;

            self.write_panel(flags.intersects(Flags::PANEL), prim.region, prim.has_panel_texture)?;
        }

        for &id in &new[common..] {
            self.open(id, prim)?;
        }

        if is_tri {
            self.write_material(&prim.material)?;

            let twoside = flags.intersects(Flags::TWOSIDE);
            if self.state.twoside && !twoside {
                self.flush()?;
                self.line("ATTR_cull")?;
            } else if twoside && !self.state.twoside {
                self.flush()?;
                self.line("ATTR_no_cull")?;
            }
            self.state.twoside = twoside;

            self.write_hardness(flags & (Flags::HARD | Flags::DECK), prim.surface)?;
        }

        match &prim.geometry {
            Geometry::Tri(_) => self.accumulate(RunKind::Tris, prim.offset, prim.count)?,
            Geometry::Line(_) => self.accumulate(RunKind::Lines, prim.offset, prim.count)?,
            Geometry::VLight(_) => {
                self.flush()?;
                self.line(&format!("LIGHTS\t{} {}", prim.offset, prim.count))?;
            }
            Geometry::NLight(light) => {
                self.flush()?;
                self.line(&named_light(light))?;
            }
        }
        Ok(())
    }

    /// Objects textured with the panel itself stay in cockpit mode when one
    /// of their faces leaves the panel, and name regions through
    /// `ATTR_cockpit`. Other objects use `ATTR_no_cockpit` and
    /// `ATTR_cockpit_region`.
    fn write_panel(&mut self, panel: bool, region: i32, has_panel_texture: bool) -> Result<()> {
        let membership = if has_panel_texture {
            "ATTR_cockpit"
        } else {
            "ATTR_no_cockpit"
        };
        if self.state.panel && !panel {
            self.flush()?;
            self.line(membership)?;
        } else if region != self.state.region {
            self.flush()?;
            match (region >= 0, has_panel_texture) {
                (true, true) => self.line(&format!("ATTR_cockpit\t{}", region))?,
                (true, false) => self.line(&format!("ATTR_cockpit_region\t{}", region))?,
                (false, _) => self.line(membership)?,
            }
        } else if panel && !self.state.panel {
            self.flush()?;
            self.line(membership)?;
        }
        self.state.panel = panel;
        self.state.region = region;
        Ok(())
    }

    fn write_material(&mut self, material: &Material) -> Result<()> {
        let current = self.state.material;
        if current != *material && material.is_default() {
            self.flush()?;
            self.line("ATTR_reset")?;
        } else {
            if current.diffuse != material.diffuse {
                self.flush()?;
                let [r, g, b] = material.diffuse;
                self.line(&format!("ATTR_diffuse_rgb\t{:6.3} {:6.3} {:6.3}", r, g, b))?;
            }
            if current.emission != material.emission {
                self.flush()?;
                let [r, g, b] = material.emission;
                self.line(&format!("ATTR_emission_rgb\t{:6.3} {:6.3} {:6.3}", r, g, b))?;
            }
            if current.shiny != material.shiny {
                self.flush()?;
                self.line(&format!("ATTR_shiny_rat\t{:6.3}", material.shiny))?;
            }
        }
        self.state.material = *material;
        Ok(())
    }

    fn write_hardness(&mut self, hardness: Flags, surface: Option<SurfaceType>) -> Result<()> {
        let was_hard = self.state.hardness != Flags::NONE;
        let hard = hardness != Flags::NONE;
        if was_hard && !hard {
            self.flush()?;
            self.line("ATTR_no_hard")?;
            self.state.surface = None;
        } else if self.state.hardness != hardness || self.state.surface != surface {
            if hard {
                self.flush()?;
                let name = if hardness.intersects(Flags::DECK) {
                    "ATTR_hard_deck"
                } else {
                    "ATTR_hard"
                };
                match surface {
                    Some(surface) => self.line(&format!("{}\t{}", name, surface))?,
                    None => self.line(name)?,
                }
            }
            self.state.surface = surface;
        }
        self.state.hardness = hardness;
        Ok(())
    }

    /// End animations until only the outermost `keep` remain open.
    fn close_to(&mut self, keep: usize) -> Result<()> {
        while self.anims.depth(self.state.anim) > keep {
            self.flush()?;
            let node = self.anims.get(self.state.anim);
            if node.manipulator.is_some() {
                self.line("ATTR_no_cockpit")?;
            }
            self.state.anim = node.parent;
            self.line("ANIM_end")?;
        }
        Ok(())
    }

    fn open(&mut self, id: AnimId, prim: &Primitive) -> Result<()> {
        self.flush()?;
        self.line("ANIM_begin")?;
        if self.debug_comments {
            self.line(&format!("#{}", prim.object))?;
        }
        self.state.anim = id;
        let node = self.anims.get(id);
        let ins = self.ins();
        let out = &mut *self.out;

        let marker = match (&node.manipulator, prim.has_panel_texture) {
            (_, true) => "ATTR_cockpit".to_string(),
            (Some(_), false) => format!("ATTR_cockpit_region\t{}", prim.region.max(0)),
            (None, false) => "ATTR_no_cockpit".to_string(),
        };
        writeln!(out, "{}{}", ins, marker)?;

        for sh in &node.show_hide {
            writeln!(
                out,
                "{}ANIM_{}\t{} {}\t{}",
                ins,
                sh.kind.as_str(),
                value(sh.v1),
                value(sh.v2),
                sh.dataref
            )?;
        }

        write_translation(out, &ins, node)?;
        write_rotation(out, &ins, node)?;

        if let Some(manipulator) = &node.manipulator {
            writeln!(out, "{}{}", ins, manipulator.to_directive())?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.flush()?;
        self.close_to(0)
    }
}

fn key_value(node: &AnimNode, frame: usize) -> String {
    node.values.get(frame).copied().map(value).unwrap_or_else(|| "0".to_string())
}

fn write_loop(out: &mut String, ins: &str, node: &AnimNode) -> Result<()> {
    if let Some(loop_value) = node.loop_value {
        writeln!(out, "{}\tANIM_keyframe_loop\t{}", ins, value(loop_value))?;
    }
    Ok(())
}

fn write_translation(out: &mut String, ins: &str, node: &AnimNode) -> Result<()> {
    let t = &node.translations;
    match t.len() {
        0 => {}
        1 if approx_eq(t[0], DVec3::ZERO, LIMIT) => {}
        1 => {
            // Static offset; no_ref saves a dataref lookup.
            let v = vertex(t[0]);
            writeln!(out, "{}ANIM_trans\t{}\t{}\t0 0\tno_ref", ins, v, v)?;
        }
        n if n > 2 || node.loop_value.is_some() => {
            writeln!(out, "{}ANIM_trans_begin\t{}", ins, node.dataref)?;
            for (frame, offset) in t.iter().enumerate() {
                writeln!(
                    out,
                    "{}\tANIM_trans_key\t{}\t{}",
                    ins,
                    key_value(node, frame),
                    vertex(*offset)
                )?;
            }
            write_loop(out, ins, node)?;
            writeln!(out, "{}ANIM_trans_end", ins)?;
        }
        _ => {
            writeln!(
                out,
                "{}ANIM_trans\t{}\t{}\t{} {}\t{}",
                ins,
                vertex(t[0]),
                vertex(t[1]),
                key_value(node, 0),
                key_value(node, 1),
                node.dataref
            )?;
        }
    }
    Ok(())
}

fn write_rotation(out: &mut String, ins: &str, node: &AnimNode) -> Result<()> {
    let (r, a) = (&node.axes, &node.angles);
    let looped = node.loop_value.is_some();
    let (v0, v1) = (key_value(node, 0), key_value(node, 1));

    if r.is_empty() {
        return Ok(());
    }
    if r.len() == 1 && a.len() == 2 && !looped {
        writeln!(
            out,
            "{}ANIM_rotate\t{}\t{:6.2} {:6.2}\t{} {}\t{}",
            ins,
            vertex(r[0]),
            a[0],
            a[1],
            v0,
            v1,
            node.dataref
        )?;
    } else if r.len() == 2 && a.len() == 2 && !looped {
        for (axis, (from, to)) in r.iter().zip([(a[0], 0.0), (0.0, a[1])]) {
            writeln!(
                out,
                "{}ANIM_rotate\t{}\t{:6.2} {:6.2}\t{} {}\t{}",
                ins,
                vertex(*axis),
                from,
                to,
                v0,
                v1,
                node.dataref
            )?;
        }
    } else if r.len() == 1 {
        writeln!(out, "{}ANIM_rotate_begin\t{}\t{}", ins, vertex(r[0]), node.dataref)?;
        for (frame, angle) in a.iter().enumerate() {
            writeln!(out, "{}\tANIM_rotate_key\t{}\t{:6.2}", ins, key_value(node, frame), angle)?;
        }
        write_loop(out, ins, node)?;
        writeln!(out, "{}ANIM_rotate_end", ins)?;
    } else {
        // Axes differ per frame: decompose each key into Euler angles and
        // animate about the three cardinal axes.
        let eulers: Vec<(f64, f64, f64)> = r
            .iter()
            .zip(a)
            .map(|(axis, angle)| {
                DQuat::from_axis_angle(axis.normalize_or_zero(), angle.to_radians())
                    .to_euler(EulerRot::ZYX)
            })
            .collect();
        for (label, pick) in [
            ("0 0 1", 0usize),
            ("0 1 0", 1),
            ("1 0 0", 2),
        ] {
            writeln!(out, "{}ANIM_rotate_begin\t{}\t{}", ins, label, node.dataref)?;
            for (frame, (z, y, x)) in eulers.iter().enumerate() {
                // Rounded first so that tiny negatives don't print as -0.00.
                let angle = round_to([*z, *y, *x][pick].to_degrees(), 2) + 0.0;
                writeln!(out, "{}\tANIM_rotate_key\t{}\t{:6.2}", ins, key_value(node, frame), angle)?;
            }
            write_loop(out, ins, node)?;
            writeln!(out, "{}ANIM_rotate_end", ins)?;
        }
    }
    Ok(())
}
