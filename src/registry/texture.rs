//! Texture path resolution for the header directives.

/// The texture slots an OBJ header can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSlot {
    Diffuse,
    /// Night lighting texture.
    Lit,
    Normal,
}

/// Resolves texture slots to paths relative to the OBJ.
pub trait TextureResolver {
    fn resolve(&self, slot: TextureSlot) -> Option<String>;
}

/// Derives the lit and normal textures from the diffuse path by appending
/// `_LIT` and `_NML` to its stem.
///
/// A diffuse texture whose stem already ends in `LIT` has no companions.
#[derive(Debug, Clone, Default)]
pub struct DerivedTextures {
    diffuse: Option<String>,
}

impl DerivedTextures {
    pub fn new(diffuse: Option<String>) -> Self {
        Self {
            diffuse: diffuse.filter(|d| !d.is_empty()),
        }
    }

    fn with_suffix(&self, suffix: &str) -> Option<String> {
        let diffuse = self.diffuse.as_deref()?;
        let dot = diffuse.rfind('.')?;
        let (stem, ext) = diffuse.split_at(dot);
        if stem.to_uppercase().ends_with("LIT") {
            return None;
        }
        Some(format!("{}{}{}", stem, suffix, ext))
    }
}

impl TextureResolver for DerivedTextures {
    fn resolve(&self, slot: TextureSlot) -> Option<String> {
        match slot {
            TextureSlot::Diffuse => self.diffuse.clone(),
            TextureSlot::Lit => self.with_suffix("_LIT"),
            TextureSlot::Normal => self.with_suffix("_NML"),
        }
    }
}
