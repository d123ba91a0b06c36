//! Deduplicated vertex tables.
//!
//! Tris index into the `VT` table and lines into the `VLINE` table. Both are
//! append-only; an index handed out once stays valid for the whole export.

use crate::types::{approx_eq, Rgb, Uv, LIMIT};
use glam::DVec3;
use std::collections::HashMap;

type Cell = [i64; 3];

/// Grid cell of a position, cells [`LIMIT`] wide.
///
/// Two positions within [`LIMIT`] of each other lie in the same or
/// neighbouring cells.
fn cell(position: DVec3) -> Cell {
    let c = (position / LIMIT).floor();
    [c.x as i64, c.y as i64, c.z as i64]
}

/// One `VT` row: position, normal and texture coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexEntry {
    pub position: DVec3,
    pub normal: DVec3,
    pub uv: Uv,
}

impl VertexEntry {
    pub fn new(position: DVec3, normal: DVec3, uv: Uv) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Position and normal within `fudge`, UV within one texel.
    pub fn approx_eq(&self, other: &VertexEntry, fudge: f64) -> bool {
        approx_eq(self.position, other.position, fudge)
            && approx_eq(self.normal, other.normal, fudge)
            && self.uv.approx_eq(&other.uv)
    }
}

/// The `VT` table.
#[derive(Debug, Clone, Default)]
pub struct VertexTable {
    entries: Vec<VertexEntry>,
    cells: HashMap<Cell, Vec<usize>>,
}

impl VertexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of an equal vertex anywhere in the table, appending if none.
    ///
    /// A match takes the average of both texture coordinates. When several
    /// entries match, the earliest wins.
    pub fn intern(&mut self, vertex: VertexEntry) -> usize {
        if let Some(index) = self.find(&vertex) {
            self.merge_uv(index, &vertex);
            return index;
        }
        self.push(vertex)
    }

    fn find(&self, vertex: &VertexEntry) -> Option<usize> {
        let [x, y, z] = cell(vertex.position);
        let mut found: Option<usize> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = self.cells.get(&[x + dx, y + dy, z + dz]) else {
                        continue;
                    };
                    for &i in bucket {
                        if found.map_or(true, |f| i < f) && self.entries[i].approx_eq(vertex, LIMIT) {
                            found = Some(i);
                        }
                    }
                }
            }
        }
        found
    }

    fn merge_uv(&mut self, index: usize, vertex: &VertexEntry) {
        let entry = &mut self.entries[index];
        entry.uv = entry.uv.average(&vertex.uv);
    }

    fn push(&mut self, vertex: VertexEntry) -> usize {
        let index = self.entries.len();
        self.cells.entry(cell(vertex.position)).or_default().push(index);
        self.entries.push(vertex);
        index
    }

    pub fn get(&self, index: usize) -> Option<&VertexEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[VertexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One `VLINE` row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineVertex {
    pub position: DVec3,
    pub color: Rgb,
}

/// The `VLINE` table.
#[derive(Debug, Clone, Default)]
pub struct LineTable {
    entries: Vec<LineVertex>,
}

impl LineTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positions merge within [`LIMIT`]; colours must match exactly.
    pub fn intern(&mut self, vertex: LineVertex) -> usize {
        if let Some(index) = self
            .entries
            .iter()
            .position(|e| e.color == vertex.color && approx_eq(e.position, vertex.position, LIMIT))
        {
            return index;
        }
        self.entries.push(vertex);
        self.entries.len() - 1
    }

    pub fn entries(&self) -> &[LineVertex] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
