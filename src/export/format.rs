//! Text formatting of OBJ8 records.
//!
//! Field widths follow what X-Plane's own tools write, so files diff cleanly
//! against hand-edited ones.

use super::indices::IndexTable;
use super::primitive::{NamedLight, VLight};
use super::survey::Survey;
use super::tables::{LineTable, LineVertex, VertexEntry, VertexTable};
use crate::config::Platform;
use crate::error::Result;
use crate::registry::{TextureResolver, TextureSlot};
use crate::scene::PanelRegion;
use crate::types::{float_repr, round4, round_to, Rgb, Uv};
use glam::DVec3;
use std::fmt::Write;

/// A position, `%9.4f` per component.
pub fn vertex(v: DVec3) -> String {
    format!("{:9.4} {:9.4} {:9.4}", v.x, v.y, v.z)
}

/// A texture coordinate, left aligned in six columns.
pub fn uv(uv: &Uv) -> String {
    format!(
        "{:<6} {:<6}",
        float_repr(round4(uv.s) + 0.0),
        float_repr(round4(uv.t) + 0.0)
    )
}

/// A dataref value or keyframe time. Integral values have no fraction.
pub fn value(v: f64) -> String {
    format!("{}", v + 0.0)
}

fn rgb_rounded(c: &Rgb) -> String {
    format!(
        "{:6.3} {:6.3} {:6.3}",
        round_to(c[0], 2),
        round_to(c[1], 2),
        round_to(c[2], 2)
    )
}

pub fn vt(entry: &VertexEntry) -> String {
    format!(
        "VT\t{}\t{:6.3} {:6.3} {:6.3}\t{}",
        vertex(entry.position),
        entry.normal.x,
        entry.normal.y,
        entry.normal.z,
        uv(&entry.uv)
    )
}

pub fn vline(line: &LineVertex) -> String {
    format!("VLINE\t{}\t{}", vertex(line.position), rgb_rounded(&line.color))
}

pub fn vlight(light: &VLight) -> String {
    format!("VLIGHT\t{}\t{}", vertex(light.position), rgb_rounded(&light.color))
}

/// The command that places a named, custom or smoke light.
pub fn named_light(light: &NamedLight) -> String {
    match light {
        NamedLight::Named { position, name } => {
            let tabs = 2usize.saturating_sub(name.len() / 8);
            format!("LIGHT_NAMED\t{}\t{}{}", name, "\t".repeat(tabs), vertex(*position))
        }
        NamedLight::Custom {
            position,
            rgba,
            size,
            uv1,
            uv2,
            dataref,
        } => format!(
            "LIGHT_CUSTOM\t{}\t{:6.3} {:6.3} {:6.3} {:6.3} {:9.4}\t{} {}\t{}",
            vertex(*position),
            rgba[0],
            rgba[1],
            rgba[2],
            rgba[3],
            size,
            uv(uv1),
            uv(uv2),
            dataref
        ),
        NamedLight::Smoke {
            position,
            kind,
            size,
        } => format!("{}\t{}\t{:4.2}", kind, vertex(*position), size),
    }
}

/// File marker, version, texture directives and cockpit regions.
pub fn write_header(
    out: &mut String,
    platform: Platform,
    textures: &dyn TextureResolver,
    regions: &[PanelRegion],
) -> Result<()> {
    write!(out, "{}\n800\nOBJ\n\n", platform.marker())?;
    match textures.resolve(TextureSlot::Diffuse) {
        Some(texture) => {
            writeln!(out, "TEXTURE\t\t{}", texture)?;
            if let Some(lit) = textures.resolve(TextureSlot::Lit) {
                writeln!(out, "TEXTURE_LIT\t{}", lit)?;
            }
            if let Some(normal) = textures.resolve(TextureSlot::Normal) {
                writeln!(out, "TEXTURE_NORMAL\t{}", normal)?;
            }
        }
        // X-Plane rejects a file without any TEXTURE line.
        None => writeln!(out, "TEXTURE\t")?,
    }
    for region in regions {
        writeln!(
            out,
            "COCKPIT_REGION\t{:4} {:4} {:4} {:4}",
            region.x,
            region.y,
            region.x + region.width,
            region.y + region.height
        )?;
    }
    Ok(())
}

/// Counts, the geometry tables, the index table and scene-wide attributes.
pub fn write_tables(
    out: &mut String,
    vertices: &VertexTable,
    lines: &LineTable,
    table: &IndexTable,
    survey: &Survey,
) -> Result<()> {
    write!(
        out,
        "POINT_COUNTS\t{} {} {} {}\n\n",
        vertices.len(),
        lines.len(),
        table.vlights.len(),
        table.indices.len()
    )?;

    for entry in vertices.entries() {
        writeln!(out, "{}", vt(entry))?;
    }
    if !vertices.is_empty() {
        out.push('\n');
    }

    for line in lines.entries() {
        writeln!(out, "{}", vline(line))?;
    }
    if !lines.is_empty() {
        out.push('\n');
    }

    for light in &table.vlights {
        writeln!(out, "{}", vlight(light))?;
    }
    if !table.vlights.is_empty() {
        out.push('\n');
    }

    let mut chunks = table.indices.chunks_exact(10);
    for chunk in chunks.by_ref() {
        let joined: Vec<String> = chunk.iter().map(usize::to_string).collect();
        writeln!(out, "IDX10\t{}", joined.join(" "))?;
    }
    for index in chunks.remainder() {
        writeln!(out, "IDX\t{}", index)?;
    }

    if let Some(weight) = survey.slung_load_weight.as_ref().filter(|w| w.is_truthy()) {
        write!(out, "\nslung_load_weight\t{}\n", weight)?;
    }
    if let Some(group) = &survey.draw_group {
        write!(out, "\nATTR_layer_group\t{}\t{}\n", group.name, group.offset)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DerivedTextures;

    #[test]
    fn test_vertex_widths() {
        assert_eq!(vertex(DVec3::new(1.0, -0.5, 12.25)), "   1.0000   -0.5000   12.2500");
    }

    #[test]
    fn test_uv_repr() {
        assert_eq!(uv(&Uv::new(0.5, 1.0)), "0.5    1.0   ");
        assert_eq!(uv(&Uv::new(0.123456, 0.0)), "0.1235 0.0   ");
    }

    #[test]
    fn test_value() {
        assert_eq!(value(1.0), "1");
        assert_eq!(value(-0.0), "0");
        assert_eq!(value(0.25), "0.25");
    }

    #[test]
    fn test_vt_line() {
        let entry = VertexEntry::new(DVec3::new(0.0, 1.0, 0.0), DVec3::Y, Uv::new(0.0, 1.0));
        assert_eq!(
            vt(&entry),
            "VT\t   0.0000    1.0000    0.0000\t 0.000  1.000  0.000\t0.0    1.0   "
        );
    }

    #[test]
    fn test_vline_rounds_colour() {
        let line = LineVertex {
            position: DVec3::ZERO,
            color: [0.123, 0.5, 1.0],
        };
        assert_eq!(
            vline(&line),
            "VLINE\t   0.0000    0.0000    0.0000\t 0.120  0.500  1.000"
        );
    }

    #[test]
    fn test_named_light_tabs() {
        let short = NamedLight::Named {
            position: DVec3::ZERO,
            name: "taxi_b".into(),
        };
        assert!(named_light(&short).starts_with("LIGHT_NAMED\ttaxi_b\t\t\t   0.0000"));
        let long = NamedLight::Named {
            position: DVec3::ZERO,
            name: "airplane_beacon_rotate".into(),
        };
        assert!(named_light(&long).starts_with("LIGHT_NAMED\tairplane_beacon_rotate\t   0.0000"));
    }

    #[test]
    fn test_custom_and_smoke() {
        let custom = NamedLight::Custom {
            position: DVec3::ZERO,
            rgba: [1.0, 0.0, 0.0, 0.5],
            size: 2.5,
            uv1: Uv::new(0.0, 0.5),
            uv2: Uv::new(0.5, 1.0),
            dataref: "NULL".into(),
        };
        assert_eq!(
            named_light(&custom),
            "LIGHT_CUSTOM\t   0.0000    0.0000    0.0000\t 1.000  0.000  0.000  0.500    2.5000\t0.0    0.5    0.5    1.0   \tNULL"
        );
        let smoke = NamedLight::Smoke {
            position: DVec3::ZERO,
            kind: "smoke_black".into(),
            size: 2.0,
        };
        assert_eq!(named_light(&smoke), "smoke_black\t   0.0000    0.0000    0.0000\t2.00");
    }

    #[test]
    fn test_header() {
        let mut out = String::new();
        let textures = DerivedTextures::new(Some("hangar.png".into()));
        let regions = vec![PanelRegion {
            image: "region1.png".into(),
            x: 0,
            y: 512,
            width: 256,
            height: 128,
        }];
        write_header(&mut out, Platform::Ibm, &textures, &regions).unwrap();
        assert_eq!(
            out,
            "I\n800\nOBJ\n\nTEXTURE\t\thangar.png\nTEXTURE_LIT\thangar_LIT.png\n\
             TEXTURE_NORMAL\thangar_NML.png\nCOCKPIT_REGION\t   0  512  256  640\n"
        );

        let mut out = String::new();
        write_header(&mut out, Platform::Apple, &DerivedTextures::new(None), &[]).unwrap();
        assert_eq!(out, "A\n800\nOBJ\n\nTEXTURE\t\n");
    }

    #[test]
    fn test_index_rows() {
        let mut out = String::new();
        let table = IndexTable {
            indices: (0..13).collect(),
            vlights: Vec::new(),
        };
        let survey = Survey {
            layer_mask: 1,
            lod_ranges: [0, 1000, 4000, 10000],
            texture: None,
            regions: Vec::new(),
            draw_group: None,
            slung_load_weight: None,
        };
        write_tables(&mut out, &VertexTable::new(), &LineTable::new(), &table, &survey).unwrap();
        assert_eq!(
            out,
            "POINT_COUNTS\t0 0 0 13\n\nIDX10\t0 1 2 3 4 5 6 7 8 9\nIDX\t10\nIDX\t11\nIDX\t12\n"
        );
    }
}
