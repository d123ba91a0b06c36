//! Error types for OBJ export and import.

use thiserror::Error;

/// Result type alias using ObjError.
pub type Result<T> = std::result::Result<T, ObjError>;

/// Main error type for OBJ encoding and decoding.
///
/// Data-validation variants carry the names of the scene objects that caused
/// them so a caller can select them for the user.
#[derive(Error, Debug)]
pub enum ObjError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON data.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing into the in-memory output buffer failed.
    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),

    /// The dataref registry file is not in the expected layout.
    #[error("Corrupt DataRefs.txt file: {0}")]
    CorruptDatarefFile(String),

    /// An OBJ file did not start with the mandatory three-line header.
    #[error("File must start with the OBJ header (I or A, 800, OBJ): {0}")]
    InvalidHeader(String),

    #[error("Invalid surface \"{surface}\" for face in mesh \"{object}\"")]
    InvalidSurface { surface: String, object: String },

    #[error("Invalid drawing group \"{group}\" in \"{object}\"")]
    InvalidDrawGroup { group: String, object: String },

    #[error("Unsupported data type for \"{property}\" in \"{object}\"")]
    UnsupportedPropertyType { property: String, object: String },

    #[error("Malformed dataref index \"{index}\" in bone \"{bone}\" in armature \"{object}\"")]
    MalformedDatarefIndex {
        index: String,
        bone: String,
        object: String,
    },

    #[error("Dataref {dataref} can't be used for animation")]
    DatarefNotAnimatable { dataref: String, object: String },

    #[error("Dataref {dataref} is not an array. Rename the {thing} to \"{name}\"")]
    DatarefNotArray {
        dataref: String,
        thing: String,
        name: String,
        object: String,
    },

    #[error("Dataref {dataref} is an array. Rename the {thing} to \"{name}[0]\" to use the first value, etc")]
    DatarefIsArray {
        dataref: String,
        thing: String,
        name: String,
        object: String,
    },

    #[error("Dataref {dataref} has usable values from [0] to [{last}]; but you specified [{index}]")]
    DatarefIndexOutOfRange {
        dataref: String,
        last: usize,
        index: usize,
        object: String,
    },

    #[error("Dataref {name} is ambiguous. Add a string property named {name} with the path of the dataref you want to use")]
    AmbiguousDataref { name: String, object: String },

    #[error("Unrecognised dataref \"{name}\" for {thing} \"{object}\"")]
    UnknownDataref {
        name: String,
        thing: String,
        object: String,
    },

    #[error("Dataref {dataref} can't be used for custom lights")]
    DatarefNotLightable { dataref: String, object: String },

    #[error("Armature \"{armature}\" is missing a {property} property")]
    MissingDatarefValue {
        armature: String,
        property: String,
        object: String,
    },

    #[error("Missing UV for face in mesh \"{object}\"")]
    MissingUv { object: String },

    #[error("{kind} \"{object}\" has an armature as its parent. Make \"{object}\" the child of a bone")]
    MissingParentBone { kind: String, object: String },

    #[error("\"{object}\" has a deleted bone \"{bone}\" as its parent. Either make it the child of an existing bone, or clear its parent")]
    DeletedBone { bone: String, object: String },

    #[error("\"{object}\" refers to missing parent \"{parent}\"")]
    MissingParent { parent: String, object: String },

    #[error("Unknown manipulator type \"{manipulator}\" in \"{object}\"")]
    UnknownManipulator { manipulator: String, object: String },

    #[error("Cockpit objects can't contain lights")]
    CockpitLight { objects: Vec<String> },

    #[error("You can't use the panel texture since you've used panel regions. Use the panel texture, or panel regions, but not both")]
    PanelWithRegions { objects: Vec<String> },

    #[error("The OBJ format supports one texture file, but you've used multiple texture files: {textures:?}")]
    MultipleTextures {
        textures: Vec<String>,
        objects: Vec<String>,
    },
}

impl ObjError {
    /// Names of the scene objects responsible for this error, if any.
    pub fn objects(&self) -> Vec<&str> {
        match self {
            ObjError::InvalidSurface { object, .. }
            | ObjError::InvalidDrawGroup { object, .. }
            | ObjError::UnsupportedPropertyType { object, .. }
            | ObjError::MalformedDatarefIndex { object, .. }
            | ObjError::DatarefNotAnimatable { object, .. }
            | ObjError::DatarefNotArray { object, .. }
            | ObjError::DatarefIsArray { object, .. }
            | ObjError::DatarefIndexOutOfRange { object, .. }
            | ObjError::AmbiguousDataref { object, .. }
            | ObjError::UnknownDataref { object, .. }
            | ObjError::DatarefNotLightable { object, .. }
            | ObjError::MissingDatarefValue { object, .. }
            | ObjError::MissingUv { object }
            | ObjError::MissingParentBone { object, .. }
            | ObjError::DeletedBone { object, .. }
            | ObjError::MissingParent { object, .. }
            | ObjError::UnknownManipulator { object, .. } => vec![object.as_str()],
            ObjError::CockpitLight { objects }
            | ObjError::PanelWithRegions { objects }
            | ObjError::MultipleTextures { objects, .. } => {
                objects.iter().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }

    /// True for failures caused by the scene data rather than the environment.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            ObjError::Io(_)
                | ObjError::Json(_)
                | ObjError::Format(_)
                | ObjError::CorruptDatarefFile(_)
                | ObjError::InvalidHeader(_)
        )
    }
}
