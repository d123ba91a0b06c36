//! The master index table.
//!
//! Run after sorting, so that each primitive's span is contiguous with its
//! neighbours in output order and adjacent `TRIS`/`LINES` can be merged.

use super::primitive::{Geometry, Primitive, VLight};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexTable {
    pub indices: Vec<usize>,
    /// The `VLIGHT` table, in output order.
    pub vlights: Vec<VLight>,
}

/// Assign every primitive its `offset` and `count`.
///
/// Tris come first (a quad as two triangles), then lines, both in one index
/// array. Vertex lights index the `VLIGHT` table directly. Named lights use
/// no table at all.
pub fn build_indices(prims: &mut [Primitive]) -> IndexTable {
    let mut table = IndexTable::default();

    for prim in prims.iter_mut() {
        if let Geometry::Tri(corners) = &prim.geometry {
            prim.offset = table.indices.len();
            table.indices.extend_from_slice(&corners[..corners.len().min(3)]);
            if let [a, _, c, d] = corners[..] {
                table.indices.extend_from_slice(&[a, c, d]);
            }
            prim.count = table.indices.len() - prim.offset;
        }
    }

    for prim in prims.iter_mut() {
        if let Geometry::Line(ends) = prim.geometry {
            prim.offset = table.indices.len();
            table.indices.extend_from_slice(&ends);
            prim.count = 2;
        }
    }

    for prim in prims.iter_mut() {
        if let Geometry::VLight(light) = prim.geometry {
            prim.offset = table.vlights.len();
            prim.count = 1;
            table.vlights.push(light);
        }
    }

    table
}
