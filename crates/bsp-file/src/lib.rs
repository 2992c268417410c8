//! Append-only builder interface for compiled BSP map data.
//!
//! The map compiler never serializes bytes itself. It hands every record it
//! produces to a [`BspFileBuilder`], which owns storage and layout. Each
//! `add_*` method appends a default-initialized record and returns it for
//! filling in; `num_*` methods report the running count, which is also the
//! index the next appended record will receive.
//!
//! [`MemoryBspFile`] is a plain in-memory implementation, useful for tests
//! and for tools that post-process the compiled data before writing it out.

mod records;

pub use records::{
    BspArea, BspAreaportal, BspEntity, BspLeaf, BspMaterial, BspModel, BspNode, BspPlane,
    BspSector, BspVertex,
};

/// Append-only sink for compiled BSP records.
pub trait BspFileBuilder {
    fn add_string(&mut self) -> &mut String;
    fn add_material(&mut self) -> &mut BspMaterial;
    fn add_entity(&mut self) -> &mut BspEntity;
    fn add_plane(&mut self) -> &mut BspPlane;
    fn add_node(&mut self) -> &mut BspNode;
    fn add_leaf(&mut self) -> &mut BspLeaf;
    fn add_area(&mut self) -> &mut BspArea;
    fn add_areaportal(&mut self) -> &mut BspAreaportal;
    fn add_areaportal_index(&mut self) -> &mut u32;
    fn add_sector(&mut self) -> &mut BspSector;
    fn add_sector_index(&mut self) -> &mut u32;
    fn add_model(&mut self) -> &mut BspModel;
    fn add_vertex(&mut self) -> &mut BspVertex;
    fn add_index(&mut self) -> &mut u32;

    /// Mutable access to an already appended node, for back-patching child links.
    fn node_mut(&mut self, index: usize) -> Option<&mut BspNode>;
    /// Mutable access to an already appended areaportal, for filling in its areas.
    fn areaportal_mut(&mut self, index: usize) -> Option<&mut BspAreaportal>;

    fn num_strings(&self) -> usize;
    fn num_materials(&self) -> usize;
    fn num_entities(&self) -> usize;
    fn num_planes(&self) -> usize;
    fn num_nodes(&self) -> usize;
    fn num_leafs(&self) -> usize;
    fn num_areas(&self) -> usize;
    fn num_areaportals(&self) -> usize;
    fn num_areaportal_indices(&self) -> usize;
    fn num_sectors(&self) -> usize;
    fn num_sector_indices(&self) -> usize;
    fn num_models(&self) -> usize;
    fn num_vertices(&self) -> usize;
    fn num_indices(&self) -> usize;
}

/// In-memory [`BspFileBuilder`] storing every record in a `Vec`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MemoryBspFile {
    pub strings: Vec<String>,
    pub materials: Vec<BspMaterial>,
    pub entities: Vec<BspEntity>,
    pub planes: Vec<BspPlane>,
    pub nodes: Vec<BspNode>,
    pub leafs: Vec<BspLeaf>,
    pub areas: Vec<BspArea>,
    pub areaportals: Vec<BspAreaportal>,
    pub areaportal_indices: Vec<u32>,
    pub sectors: Vec<BspSector>,
    pub sector_indices: Vec<u32>,
    pub models: Vec<BspModel>,
    pub vertices: Vec<BspVertex>,
    pub indices: Vec<u32>,
}

impl MemoryBspFile {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Pushes a default record and returns a reference to it.
fn push_default<T: Default>(vec: &mut Vec<T>) -> &mut T {
    vec.push(T::default());
    let last = vec.len() - 1;
    &mut vec[last]
}

impl BspFileBuilder for MemoryBspFile {
    fn add_string(&mut self) -> &mut String {
        push_default(&mut self.strings)
    }

    fn add_material(&mut self) -> &mut BspMaterial {
        push_default(&mut self.materials)
    }

    fn add_entity(&mut self) -> &mut BspEntity {
        push_default(&mut self.entities)
    }

    fn add_plane(&mut self) -> &mut BspPlane {
        push_default(&mut self.planes)
    }

    fn add_node(&mut self) -> &mut BspNode {
        push_default(&mut self.nodes)
    }

    fn add_leaf(&mut self) -> &mut BspLeaf {
        push_default(&mut self.leafs)
    }

    fn add_area(&mut self) -> &mut BspArea {
        push_default(&mut self.areas)
    }

    fn add_areaportal(&mut self) -> &mut BspAreaportal {
        push_default(&mut self.areaportals)
    }

    fn add_areaportal_index(&mut self) -> &mut u32 {
        push_default(&mut self.areaportal_indices)
    }

    fn add_sector(&mut self) -> &mut BspSector {
        push_default(&mut self.sectors)
    }

    fn add_sector_index(&mut self) -> &mut u32 {
        push_default(&mut self.sector_indices)
    }

    fn add_model(&mut self) -> &mut BspModel {
        push_default(&mut self.models)
    }

    fn add_vertex(&mut self) -> &mut BspVertex {
        push_default(&mut self.vertices)
    }

    fn add_index(&mut self) -> &mut u32 {
        push_default(&mut self.indices)
    }

    fn node_mut(&mut self, index: usize) -> Option<&mut BspNode> {
        self.nodes.get_mut(index)
    }

    fn areaportal_mut(&mut self, index: usize) -> Option<&mut BspAreaportal> {
        self.areaportals.get_mut(index)
    }

    fn num_strings(&self) -> usize {
        self.strings.len()
    }

    fn num_materials(&self) -> usize {
        self.materials.len()
    }

    fn num_entities(&self) -> usize {
        self.entities.len()
    }

    fn num_planes(&self) -> usize {
        self.planes.len()
    }

    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn num_leafs(&self) -> usize {
        self.leafs.len()
    }

    fn num_areas(&self) -> usize {
        self.areas.len()
    }

    fn num_areaportals(&self) -> usize {
        self.areaportals.len()
    }

    fn num_areaportal_indices(&self) -> usize {
        self.areaportal_indices.len()
    }

    fn num_sectors(&self) -> usize {
        self.sectors.len()
    }

    fn num_sector_indices(&self) -> usize {
        self.sector_indices.len()
    }

    fn num_models(&self) -> usize {
        self.models.len()
    }

    fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    fn num_indices(&self) -> usize {
        self.indices.len()
    }
}
