//! Conversions between the authoring tool's space and X-Plane space.
//!
//! The scene is Z-up and right handed. X-Plane is Y-up with Z pointing
//! towards the viewer, so `(x, y, z)` becomes `(x, z, -y)`.

use super::round4;
use glam::{DMat3, DMat4, DVec3};

/// Transform a point by `matrix` and convert it to X-Plane space, rounded.
pub fn to_xplane(matrix: &DMat4, point: DVec3) -> DVec3 {
    swap_axes(matrix.transform_point3(point))
}

/// Transform a direction by `rotation` (no translation) and convert it.
pub fn to_xplane_dir(rotation: &DMat4, dir: DVec3) -> DVec3 {
    swap_axes(rotation.transform_vector3(dir))
}

/// Convert an X-Plane vector back to the scene's axes (no rounding).
pub fn to_blender(v: DVec3) -> DVec3 {
    DVec3::new(v.x, -v.z, v.y)
}

fn swap_axes(v: DVec3) -> DVec3 {
    // Adding zero keeps a negated 0.0 from printing as "-0.0000".
    DVec3::new(round4(v.x) + 0.0, round4(v.z) + 0.0, -round4(v.y) + 0.0)
}

/// Strip scale from a matrix, leaving only its rotation.
///
/// A zero scale on any axis makes normals meaningless; identity is returned.
pub fn rotation_only(matrix: &DMat4) -> DMat4 {
    let x = matrix.x_axis.truncate();
    let y = matrix.y_axis.truncate();
    let z = matrix.z_axis.truncate();
    if x.length() == 0.0 || y.length() == 0.0 || z.length() == 0.0 {
        return DMat4::IDENTITY;
    }
    DMat4::from_mat3(DMat3::from_cols(x.normalize(), y.normalize(), z.normalize()))
}

/// Face corner order for emission.
///
/// X-Plane winds faces the other way, so corners are normally reversed. A
/// mirrored object (negative determinant) already flips them.
pub fn face_order(matrix: &DMat4, corners: usize) -> &'static [usize] {
    let mirrored = matrix.determinant() < 0.0;
    match (corners, mirrored) {
        (3, false) => &[2, 1, 0],
        (4, false) => &[3, 2, 1, 0],
        (3, true) => &[0, 1, 2],
        (4, true) => &[0, 1, 2, 3],
        _ => &[],
    }
}
