//! Lookup tables consulted during export.
//!
//! All registries are built once by the caller and passed by reference into
//! the export; nothing here is global.

pub mod dataref;
pub mod manipulator;
pub mod texture;

pub use dataref::{make_short_name, Dataref, DatarefLookup, DatarefRegistry};
pub use manipulator::{ManipValue, Manipulator, ManipulatorRegistry};
pub use texture::{DerivedTextures, TextureResolver, TextureSlot};
