//! Face material as X-Plane understands it.

use super::Rgb;
use serde::Serialize;
use std::cmp::Ordering;

/// Diffuse colour, emission colour and shininess of a face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Material {
    pub diffuse: Rgb,
    pub emission: Rgb,
    pub shiny: f64,
}

impl Material {
    /// X-Plane's own default: white diffuse, no emission, not shiny.
    pub const DEFAULT: Material = Material {
        diffuse: [1.0, 1.0, 1.0],
        emission: [0.0, 0.0, 0.0],
        shiny: 0.0,
    };

    pub fn new(diffuse: Rgb, emission: Rgb, shiny: f64) -> Self {
        Self {
            diffuse,
            emission,
            shiny,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }

    /// Sort order: the default material first, then by component tuple.
    pub fn sort_cmp(&self, other: &Material) -> Ordering {
        match (self.is_default(), other.is_default()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => cmp_rgb(&self.diffuse, &other.diffuse)
                .then_with(|| cmp_rgb(&self.emission, &other.emission))
                .then_with(|| self.shiny.total_cmp(&other.shiny)),
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn cmp_rgb(a: &Rgb, b: &Rgb) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sorts_first() {
        let dark = Material::new([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 0.0);
        assert_eq!(Material::DEFAULT.sort_cmp(&dark), Ordering::Less);
        assert_eq!(dark.sort_cmp(&Material::DEFAULT), Ordering::Greater);
    }

    #[test]
    fn test_tuple_order() {
        let a = Material::new([0.2, 0.5, 0.5], [0.0, 0.0, 0.0], 0.0);
        let b = Material::new([0.2, 0.6, 0.0], [0.0, 0.0, 0.0], 0.0);
        let c = Material::new([0.2, 0.6, 0.0], [0.0, 0.0, 0.0], 0.5);
        assert_eq!(a.sort_cmp(&b), Ordering::Less);
        assert_eq!(b.sort_cmp(&c), Ordering::Less);
        assert_eq!(c.sort_cmp(&c), Ordering::Equal);
    }
}
