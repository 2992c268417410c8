//! Writes a [`CompiledMap`] into a [`BspFileBuilder`].
//!
//! Records are appended in this order: materials, planes, the tree (nodes
//! and leaves in pre-order), sectors with their render models, areas with
//! their areaportals, and entities. Sector area lists and area sector lists
//! share the sector index table.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use bsp_file::BspFileBuilder;
use log::{info, warn};

use crate::bsp::{AreaId, NodeId, NodeKind, PortalId, Sector};
use crate::scene::Scene;
use crate::{CompiledMap, Contents, Surface, Winding};

/// Record counts written by [`CompiledMap::emit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitStats {
    pub materials: usize,
    pub planes: usize,
    pub nodes: usize,
    pub leafs: usize,
    pub areas: usize,
    pub areaportals: usize,
    pub sectors: usize,
    pub models: usize,
    pub vertices: usize,
    pub indices: usize,
    pub entities: usize,
}

impl CompiledMap {
    /// Appends every record of the compiled map to `file`.
    pub fn emit<B: BspFileBuilder + ?Sized>(&self, scene: &Scene, file: &mut B) -> EmitStats {
        info!("------------");
        info!("Emit...");

        let materials = self.emit_materials(scene, file);
        self.emit_planes(file);
        self.emit_tree(file);
        self.emit_sectors(scene, &materials, file);
        self.emit_areas(file);
        emit_entities(scene, file);

        let stats = EmitStats {
            materials: file.num_materials(),
            planes: file.num_planes(),
            nodes: file.num_nodes(),
            leafs: file.num_leafs(),
            areas: file.num_areas(),
            areaportals: file.num_areaportals(),
            sectors: file.num_sectors(),
            models: file.num_models(),
            vertices: file.num_vertices(),
            indices: file.num_indices(),
            entities: file.num_entities(),
        };
        info!("{} plane(s), {} node(s), {} leaf(s)", stats.planes, stats.nodes, stats.leafs);
        info!(
            "{} area(s), {} areaportal(s), {} sector(s)",
            stats.areas, stats.areaportals, stats.sectors
        );
        info!(
            "{} model(s), {} vert(s), {} index(es), {} material(s)",
            stats.models, stats.vertices, stats.indices, stats.materials
        );
        stats
    }

    /// Emits the name of every material a drawn face uses, sorted, and
    /// returns the record index of each.
    fn emit_materials<'s, B: BspFileBuilder + ?Sized>(
        &self,
        scene: &'s Scene,
        file: &mut B,
    ) -> HashMap<&'s str, u32> {
        let mut names = BTreeSet::new();
        for face in self.overlay.face_refs() {
            let info = self.overlay.face(face);
            if self.overlay.model(face.model).ignore
                || info.ignore
                || !info.contents.intersects(Contents::VISIBLE)
                || info.contents.contains(Contents::AREAPORTAL)
                || info.surface.contains(Surface::NO_DRAW)
            {
                continue;
            }
            if let Some(name) = scene.material_name(face) {
                names.insert(name);
            }
        }

        let mut indices = HashMap::with_capacity(names.len());
        for name in names {
            indices.insert(name, file.num_materials() as u32);
            let string = file.num_strings() as u32;
            file.add_material().string = string;
            *file.add_string() = name.to_string();
        }
        indices
    }

    fn emit_planes<B: BspFileBuilder + ?Sized>(&self, file: &mut B) {
        for (_, plane) in self.planes.iter() {
            let n = plane.normal();
            file.add_plane().p = [n.x as f32, n.y as f32, n.z as f32, plane.offset() as f32];
        }
    }

    /// Emits split nodes and leaves in pre-order. A child link is a node
    /// index, or `-(leaf + 1)` for a leaf.
    fn emit_tree<B: BspFileBuilder + ?Sized>(&self, file: &mut B) {
        let tree = &self.tree;
        // (node, parent record, slot in the parent)
        let mut stack: Vec<(NodeId, Option<usize>, usize)> = vec![(tree.root(), None, 0)];

        while let Some((id, parent, slot)) = stack.pop() {
            let node = tree.node(id);
            let (mins, maxs) = node.bounds.to_f32();
            let parent_index = parent.map_or(-1, |p| p as i32);

            let link = match node.kind {
                NodeKind::Leaf => {
                    let index = file.num_leafs();
                    let leaf = file.add_leaf();
                    leaf.parent = parent_index;
                    leaf.area = node.area.map_or(-1, |a| a.index() as i32);
                    leaf.contents = node.contents.bits();
                    leaf.mins = mins;
                    leaf.maxs = maxs;
                    -(index as i32 + 1)
                }
                NodeKind::Split { planenum, children } => {
                    let index = file.num_nodes();
                    let record = file.add_node();
                    record.parent = parent_index;
                    record.planenum = planenum.raw();
                    record.mins = mins;
                    record.maxs = maxs;
                    stack.push((children[1], Some(index), 1));
                    stack.push((children[0], Some(index), 0));
                    index as i32
                }
            };

            if let Some(record) = parent.and_then(|p| file.node_mut(p)) {
                record.children[slot] = link;
            }
        }
    }

    fn emit_sectors<B: BspFileBuilder + ?Sized>(&self, scene: &Scene, materials: &HashMap<&str, u32>, file: &mut B) {
        for sector in &self.sectors {
            let first_area = file.num_sector_indices() as u32;
            for area in &sector.areas {
                *file.add_sector_index() = area.index() as u32;
            }

            let first_model = file.num_models() as u32;
            let num_models = emit_sector_models(scene, sector, materials, file);

            let (mins, maxs) = sector.bounds.to_f32();
            let record = file.add_sector();
            record.first_area = first_area;
            record.num_areas = sector.areas.len() as u32;
            record.first_model = first_model;
            record.num_models = num_models;
            record.mins = mins;
            record.maxs = maxs;
        }
    }

    fn emit_areas<B: BspFileBuilder + ?Sized>(&self, file: &mut B) {
        let mut emitted: HashMap<PortalId, usize> = HashMap::new();

        for area in &self.areas {
            let first_portal = file.num_areaportal_indices() as u32;
            let mut num_portals = 0;
            for index in self.emit_areaportals(area.id, &mut emitted, file) {
                *file.add_areaportal_index() = index as u32;
                num_portals += 1;
            }

            let first_sector = file.num_sector_indices() as u32;
            for sector in &area.sectors {
                *file.add_sector_index() = sector.index() as u32;
            }

            let (mins, maxs) = area.bounds.to_f32();
            let record = file.add_area();
            record.first_portal = first_portal;
            record.num_portals = num_portals;
            record.first_sector = first_sector;
            record.num_sectors = area.sectors.len() as u32;
            record.mins = mins;
            record.maxs = maxs;
        }
    }

    /// Emits the areaportals bounding `area` and returns their record indices.
    ///
    /// A portal is an areaportal when it leads from a leaf of `area` into an
    /// areaportal leaf or another area, and one of the faces lying on it
    /// belongs to an areaportal model. Each portal is written once and shared
    /// by the areas on both of its sides.
    fn emit_areaportals<B: BspFileBuilder + ?Sized>(
        &self,
        area: AreaId,
        emitted: &mut HashMap<PortalId, usize>,
        file: &mut B,
    ) -> Vec<usize> {
        let tree = &self.tree;
        let mut out = Vec::new();

        for leaf in tree.leaves() {
            let node = tree.node(leaf);
            if node.area != Some(area) || node.contents.contains(Contents::AREAPORTAL) {
                continue;
            }

            for &pid in &node.portals {
                let Some(portal) = tree.portal(pid) else {
                    continue;
                };
                let other = tree.node(portal.other(leaf));
                let beyond = if other.contents.contains(Contents::AREAPORTAL) {
                    other.portal_areas.into_iter().flatten().find(|&a| a != area)
                } else {
                    match other.area {
                        Some(a) if a != area => Some(a),
                        _ => continue,
                    }
                };

                if !portal
                    .original
                    .iter()
                    .any(|&face| self.overlay.face(face).contents.contains(Contents::AREAPORTAL))
                {
                    warn!("portal {pid} bounds area {area} but is not an areaportal");
                    continue;
                }

                let side = portal.side_of(leaf);
                let index = match emitted.get(&pid) {
                    Some(&index) => index,
                    None => {
                        let index = emit_areaportal(portal.planenum.raw(), &portal.winding, file);
                        emitted.insert(pid, index);
                        index
                    }
                };
                if let Some(record) = file.areaportal_mut(index) {
                    record.areas[side] = area.index() as i32;
                    if let Some(beyond) = beyond {
                        record.areas[side ^ 1] = beyond.index() as i32;
                    }
                }
                if !out.contains(&index) {
                    out.push(index);
                }
            }
        }
        out
    }
}

fn emit_areaportal<B: BspFileBuilder + ?Sized>(planenum: u32, winding: &Winding, file: &mut B) -> usize {
    let index = file.num_areaportals();
    let first_vert = file.num_vertices() as u32;
    for p in winding.points() {
        file.add_vertex().v = [p.x as f32, p.y as f32, p.z as f32];
    }

    let record = file.add_areaportal();
    record.planenum = planenum;
    record.first_vert = first_vert;
    record.num_verts = winding.len() as u32;
    index
}

/// Emits one render model per material used in `sector`, fanning each
/// winding into triangles over vertices shared within the model.
fn emit_sector_models<B: BspFileBuilder + ?Sized>(
    scene: &Scene,
    sector: &Sector,
    materials: &HashMap<&str, u32>,
    file: &mut B,
) -> u32 {
    let mut by_material: BTreeMap<u32, Vec<&Winding>> = BTreeMap::new();
    for poly in &sector.polys {
        let Some(&material) = scene.material_name(poly.face).and_then(|name| materials.get(name)) else {
            continue;
        };
        by_material.entry(material).or_default().push(&poly.winding);
    }

    let count = by_material.len() as u32;
    for (material, windings) in by_material {
        let first_vert = file.num_vertices() as u32;
        let first_index = file.num_indices() as u32;
        let mut verts: HashMap<[u32; 3], u32> = HashMap::new();

        for winding in windings {
            let mut ids = Vec::with_capacity(winding.len());
            for p in winding.points() {
                let v = [p.x as f32, p.y as f32, p.z as f32];
                let key = v.map(f32::to_bits);
                let id = *verts.entry(key).or_insert_with(|| {
                    let id = file.num_vertices() as u32 - first_vert;
                    file.add_vertex().v = v;
                    id
                });
                ids.push(id);
            }
            for i in 1..ids.len().saturating_sub(1) {
                for id in [ids[0], ids[i], ids[i + 1]] {
                    *file.add_index() = id;
                }
            }
        }

        let num_verts = file.num_vertices() as u32 - first_vert;
        let num_indices = file.num_indices() as u32 - first_index;
        let model = file.add_model();
        model.first_vert = first_vert;
        model.num_verts = num_verts;
        model.first_index = first_index;
        model.num_indices = num_indices;
        model.material = material;
    }
    count
}

/// Emits each entity as key/value string pairs.
fn emit_entities<B: BspFileBuilder + ?Sized>(scene: &Scene, file: &mut B) {
    for entity in &scene.entities {
        let origin = entity.origin;
        let pairs = [
            ("classname", entity.classname.clone()),
            ("name", entity.name.clone()),
            ("origin", format!("{} {} {}", origin.x, origin.y, origin.z)),
        ];

        let first_string = file.num_strings() as u32;
        for (key, value) in pairs {
            *file.add_string() = key.to_string();
            *file.add_string() = value;
        }
        let record = file.add_entity();
        record.first_string = first_string;
        record.num_strings = 6;
    }
}
