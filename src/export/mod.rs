//! OBJ8 export.
//!
//! The pipeline runs in fixed passes over an immutable [`Scene`]:
//!
//! 1. [`survey`] settles layers, LODs, the texture and cockpit regions.
//! 2. [`classify`] turns objects into primitives and fills the vertex tables
//!    and the animation registry.
//! 3. The primitives are sorted by render state and [`indices`] lays out the
//!    index table in that order.
//! 4. [`format`] writes the header and tables, then [`writer`] the commands.
//!
//! The whole file is rendered in memory, so a failed export never leaves a
//! partial file behind.

pub mod animation;
pub mod classify;
pub mod format;
pub mod indices;
pub mod primitive;
pub mod survey;
pub mod tables;
pub mod writer;

pub use animation::{AnimId, AnimNode, AnimRegistry};
pub use primitive::{Flags, Geometry, NamedLight, Primitive};
pub use survey::Survey;

use crate::config::ExportConfig;
use crate::diagnostic::Diagnostics;
use crate::error::Result;
use crate::registry::{DatarefRegistry, DerivedTextures, ManipulatorRegistry, TextureResolver};
use crate::scene::Scene;
use classify::{Classified, Classifier};
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

/// Lookup tables an export consults.
#[derive(Clone, Copy)]
pub struct ExportContext<'a> {
    pub datarefs: &'a DatarefRegistry,
    pub manipulators: &'a ManipulatorRegistry,
    /// Texture paths for the header. Defaults to names derived from the
    /// scene's texture.
    pub textures: Option<&'a dyn TextureResolver>,
}

impl<'a> ExportContext<'a> {
    pub fn new(datarefs: &'a DatarefRegistry, manipulators: &'a ManipulatorRegistry) -> Self {
        Self {
            datarefs,
            manipulators,
            textures: None,
        }
    }

    pub fn with_textures(mut self, textures: &'a dyn TextureResolver) -> Self {
        self.textures = Some(textures);
        self
    }
}

/// Sizes of what was written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub vertices: usize,
    pub line_vertices: usize,
    pub lights: usize,
    pub indices: usize,
    pub primitives: usize,
    pub animations: usize,
}

/// A successful export.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// The complete OBJ8 file.
    pub text: String,
    pub diagnostics: Diagnostics,
    pub stats: ExportStats,
}

/// Export `scene` to OBJ8 text.
pub fn export_obj(scene: &Scene, ctx: &ExportContext, config: &ExportConfig) -> Result<ExportOutput> {
    let mut diags = Diagnostics::new();
    let survey = Survey::run(scene, config, &mut diags)?;

    let mut classifier = Classifier::new(scene, config, &survey, ctx.datarefs, ctx.manipulators);
    classifier.classify_scene(&mut diags)?;
    let Classified {
        vertices,
        lines,
        mut prims,
        anims,
        requires_v9,
    } = classifier.finish();

    survey::check_layers(scene, config.cockpit, &mut diags);
    if requires_v9 || !survey.regions.is_empty() {
        diags.warn("This object requires X-Plane v9", Vec::new());
    }

    primitive::sort_primitives(&mut prims);
    let table = indices::build_indices(&mut prims);
    log::debug!(
        "{} primitives, {} vertices, {} indices",
        prims.len(),
        vertices.len(),
        table.indices.len()
    );

    let derived = DerivedTextures::new(survey.texture.clone());
    let textures: &dyn TextureResolver = match ctx.textures {
        Some(textures) => textures,
        None => &derived,
    };

    let mut text = String::with_capacity(256 + vertices.len() * 80 + table.indices.len() * 4);
    format::write_header(&mut text, config.platform, textures, &survey.regions)?;
    format::write_tables(&mut text, &vertices, &lines, &table, &survey)?;
    writer::write_commands(&mut text, &prims, &anims, &survey, config)?;
    write!(text, "\n# {}\n", config.generator)?;

    let stats = ExportStats {
        vertices: vertices.len(),
        line_vertices: lines.len(),
        lights: table.vlights.len(),
        indices: table.indices.len(),
        primitives: prims.len(),
        animations: anims.len(),
    };
    Ok(ExportOutput {
        text,
        diagnostics: diags,
        stats,
    })
}

/// Export `scene` and write it to `path`.
///
/// The file is only created once the export has succeeded.
pub fn export_to_file<P: AsRef<Path>>(
    path: P,
    scene: &Scene,
    ctx: &ExportContext,
    config: &ExportConfig,
) -> Result<ExportOutput> {
    let output = export_obj(scene, ctx, config)?;
    std::fs::write(path.as_ref(), &output.text)?;
    log::info!(
        "Exported {} primitives to {}",
        output.stats.primitives,
        path.as_ref().display()
    );
    Ok(output)
}
