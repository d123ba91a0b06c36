//! # xplane-obj
//!
//! Encode and decode X-Plane OBJ8 object files.
//!
//! ## Overview
//!
//! The exporter takes a [`Scene`] (meshes, lamps, armatures with keyframed
//! bones and empties carrying options) and writes a complete OBJ8 file: the
//! deduplicated vertex tables, the index table and the command stream with
//! state changes kept to a minimum. The importer reads an OBJ8 file back into
//! a tree of animated empties, meshes, lines and lights.
//!
//! ## Quick Start
//!
//! ```ignore
//! use xplane_obj::{export_to_file, DatarefRegistry, ExportConfig, ExportContext,
//!                  ManipulatorRegistry, Scene};
//!
//! let scene = Scene::load_from_path("cockpit.json")?;
//! let datarefs = DatarefRegistry::load_from_path("DataRefs.txt")?;
//! let manipulators = ManipulatorRegistry::builtin();
//!
//! let ctx = ExportContext::new(&datarefs, &manipulators);
//! let config = ExportConfig::for_path("c172_cockpit.obj");
//! let output = export_to_file("c172_cockpit.obj", &scene, &ctx, &config)?;
//! for diagnostic in output.diagnostics.entries() {
//!     println!("{}", diagnostic.message);
//! }
//! ```
//!
//! ## Importing
//!
//! ```ignore
//! use xplane_obj::import_from_file;
//!
//! let obj = import_from_file("c172_cockpit.obj")?;
//! for (node, mesh) in obj.meshes() {
//!     println!("{}: {} faces", node.name, mesh.faces.len());
//! }
//! ```

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod export;
pub mod import;
pub mod registry;
pub mod scene;
pub mod types;

// Re-export main types for convenience
pub use config::{ExportConfig, Platform};
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use error::{ObjError, Result};
pub use export::{export_obj, export_to_file, ExportContext, ExportOutput, ExportStats};
pub use import::{import_from_file, import_obj, ImportedObj};
pub use registry::{DatarefRegistry, DerivedTextures, ManipulatorRegistry, TextureResolver, TextureSlot};
pub use scene::Scene;
