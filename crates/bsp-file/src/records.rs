//! Record types appended to a [`BspFileBuilder`](crate::BspFileBuilder).

use serde::Serialize;

/// A plane stored as `[a, b, c, d]` with `a*x + b*y + c*z = d`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BspPlane {
    pub p: [f32; 4],
}

/// Internal tree node.
///
/// Child links are node indices when non-negative; a negative value `-(i + 1)`
/// refers to leaf `i`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BspNode {
    pub parent: i32,
    pub children: [i32; 2],
    pub planenum: u32,
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BspLeaf {
    pub parent: i32,
    /// Area index, or -1 when the leaf belongs to no area.
    pub area: i32,
    pub contents: u32,
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BspArea {
    pub first_portal: u32,
    pub num_portals: u32,
    pub first_sector: u32,
    pub num_sectors: u32,
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
}

/// A visibility gate between two areas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BspAreaportal {
    pub planenum: u32,
    pub first_vert: u32,
    pub num_verts: u32,
    /// Area on each side of the portal plane (front, back); -1 when unknown.
    pub areas: [i32; 2],
}

impl Default for BspAreaportal {
    fn default() -> Self {
        Self {
            planenum: 0,
            first_vert: 0,
            num_verts: 0,
            areas: [-1, -1],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BspSector {
    pub first_area: u32,
    pub num_areas: u32,
    pub first_model: u32,
    pub num_models: u32,
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
}

/// A renderable triangle batch sharing one material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BspModel {
    pub first_vert: u32,
    pub num_verts: u32,
    pub first_index: u32,
    pub num_indices: u32,
    pub material: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BspVertex {
    pub v: [f32; 3],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BspMaterial {
    /// Index of the material name in the string table.
    pub string: u32,
}

/// Entity key/value pairs stored as alternating key and value strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BspEntity {
    pub first_string: u32,
    pub num_strings: u32,
}
