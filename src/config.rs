//! Export configuration.

use serde::Serialize;
use std::path::Path;

/// Byte order marker written on the first line of an OBJ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Platform {
    /// `A`, written by the Mac build.
    Apple,
    /// `I`, written everywhere else.
    #[default]
    Ibm,
}

impl Platform {
    pub fn marker(&self) -> char {
        match self {
            Platform::Apple => 'A',
            Platform::Ibm => 'I',
        }
    }

    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "A" => Some(Platform::Apple),
            "I" => Some(Platform::Ibm),
            _ => None,
        }
    }
}

/// File name endings that select cockpit export.
const COCKPIT_SUFFIXES: [&str; 3] = ["_cockpit.obj", "_cockpit_inn.obj", "_cockpit_out.obj"];

/// Main export configuration.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Export as an aircraft cockpit: no hard surfaces, panel textures and
    /// regions honoured, only layer 1 exported.
    pub cockpit: bool,
    /// Platform marker for the header.
    pub platform: Platform,
    /// Max width of a quad that is exported as a line.
    pub line_width: f64,
    /// Write a `#<object>` comment after each `ANIM_begin`.
    pub debug_comments: bool,
    /// Default LOD distances; `lod_N` properties on empties override them.
    pub lod_ranges: [i32; 4],
    /// Text of the trailing comment.
    pub generator: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            cockpit: false,
            platform: Platform::Ibm,
            line_width: 0.101,
            debug_comments: false,
            lod_ranges: [0, 1000, 4000, 10000],
            generator: format!("Exported with xplane-obj {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ExportConfig {
    /// Configuration for writing to `path`; cockpit mode follows the name.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self::default().with_cockpit(is_cockpit_path(path))
    }

    pub fn with_cockpit(mut self, cockpit: bool) -> Self {
        self.cockpit = cockpit;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_debug_comments(mut self, enabled: bool) -> Self {
        self.debug_comments = enabled;
        self
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }

    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }
}

/// Whether a file name marks a cockpit object.
pub fn is_cockpit_path(path: impl AsRef<Path>) -> bool {
    let name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    COCKPIT_SUFFIXES.iter().any(|s| name.ends_with(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cockpit_detection() {
        assert!(is_cockpit_path("planes/c172_cockpit.obj"));
        assert!(is_cockpit_path("C172_COCKPIT_INN.OBJ"));
        assert!(is_cockpit_path("c172_cockpit_out.obj"));
        assert!(!is_cockpit_path("c172_cockpit.obj.bak"));
        assert!(!is_cockpit_path("hangar.obj"));
    }

    #[test]
    fn test_defaults() {
        let config = ExportConfig::for_path("hangar.obj");
        assert!(!config.cockpit);
        assert_eq!(config.platform.marker(), 'I');
        assert_eq!(config.lod_ranges, [0, 1000, 4000, 10000]);
        assert!(ExportConfig::for_path("x_cockpit.obj").cockpit);
    }
}
