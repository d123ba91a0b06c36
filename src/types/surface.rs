//! Hard surface types and draw groups.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Physical surface attached to hard faces.
///
/// Declaration order is the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SurfaceType {
    Water,
    Concrete,
    Asphalt,
    Grass,
    Dirt,
    Gravel,
    Lakebed,
    Snow,
    Shoulder,
    Blastpad,
}

impl SurfaceType {
    pub const ALL: [SurfaceType; 10] = [
        SurfaceType::Water,
        SurfaceType::Concrete,
        SurfaceType::Asphalt,
        SurfaceType::Grass,
        SurfaceType::Dirt,
        SurfaceType::Gravel,
        SurfaceType::Lakebed,
        SurfaceType::Snow,
        SurfaceType::Shoulder,
        SurfaceType::Blastpad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceType::Water => "water",
            SurfaceType::Concrete => "concrete",
            SurfaceType::Asphalt => "asphalt",
            SurfaceType::Grass => "grass",
            SurfaceType::Dirt => "dirt",
            SurfaceType::Gravel => "gravel",
            SurfaceType::Lakebed => "lakebed",
            SurfaceType::Snow => "snow",
            SurfaceType::Shoulder => "shoulder",
            SurfaceType::Blastpad => "blastpad",
        }
    }
}

impl FromStr for SurfaceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|t| t.as_str() == s).ok_or(())
    }
}

impl Serialize for SurfaceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scenery layer group, written as `ATTR_layer_group`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawGroup {
    pub name: String,
    pub offset: i32,
}

impl DrawGroup {
    pub const NAMES: [&'static str; 11] = [
        "terrain",
        "beaches",
        "shoulders",
        "taxiways",
        "runways",
        "markings",
        "airports",
        "roads",
        "objects",
        "light_objects",
        "cars",
    ];

    pub fn is_valid_name(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_parse() {
        assert_eq!("grass".parse::<SurfaceType>(), Ok(SurfaceType::Grass));
        assert!("lava".parse::<SurfaceType>().is_err());
        assert!("Grass".parse::<SurfaceType>().is_err());
    }

    #[test]
    fn test_surface_order() {
        assert!(SurfaceType::Water < SurfaceType::Blastpad);
        assert!(None < Some(SurfaceType::Water));
    }

    #[test]
    fn test_draw_group_names() {
        assert!(DrawGroup::is_valid_name("light_objects"));
        assert!(!DrawGroup::is_valid_name("clouds"));
    }
}
