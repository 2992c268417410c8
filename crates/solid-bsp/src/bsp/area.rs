//! Visibility areas: groups of leaves connected without crossing an
//! areaportal.

use log::{info, warn};
use smallvec::SmallVec;

use crate::scene::{FaceRef, Overlay, Scene};
use crate::{Bounds, CompileError, Contents, PlaneHash, Progress, Result, Winding};

use super::{AreaId, BspTree, NodeId, NodeKind, SectorId};

#[derive(Debug, Clone)]
pub struct Area {
    pub id: AreaId,
    /// Source triangles decomposed into this area, without duplicates.
    pub tris: Vec<FaceRef>,
    pub sectors: Vec<SectorId>,
    /// Bounds of the triangles owned by this area alone.
    pub bounds: Bounds,
}

impl Area {
    fn new(id: AreaId) -> Self {
        Self {
            id,
            tris: Vec::new(),
            sectors: Vec::new(),
            bounds: Bounds::empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecomposeStats {
    pub inside_models: usize,
    pub outside_models: usize,
    pub inside_tris: usize,
    pub outside_tris: usize,
}

impl BspTree {
    /// Assigns an area to every open leaf reachable from another without
    /// crossing an areaportal leaf.
    ///
    /// Area 0 is reserved for the sky and holds no leaves; the areas found
    /// are numbered from 1. Leaves are visited in pre-order. Areaportal
    /// leaves are tagged with the areas on either side but never flooded
    /// through. When `flooded`, leaves the entity flood never reached are
    /// left without an area.
    pub fn find_areas(&mut self, scene: &Scene, flooded: bool, max_areas: usize) -> Result<Vec<Area>> {
        for node in &mut self.nodes {
            node.area = None;
            node.portal_areas = [None, None];
            node.area_warned = false;
        }

        let mut areas = vec![Area::new(AreaId::SKY)];
        let leaves: Vec<NodeId> = self.leaves().collect();
        for leaf in leaves {
            let node = self.node(leaf);
            if node.area.is_some()
                || (flooded && node.occupied == 0)
                || node.contents.intersects(Contents::SOLID | Contents::AREAPORTAL)
            {
                continue;
            }

            let area = AreaId::new(areas.len());
            areas.push(Area::new(area));
            self.area_flood(leaf, area, scene);
        }

        if areas.len() > max_areas {
            return Err(CompileError::TooManyAreas {
                count: areas.len(),
                max: max_areas,
            });
        }

        info!("Set {} area(s)", areas.len());
        Ok(areas)
    }

    fn area_flood(&mut self, start: NodeId, area: AreaId, scene: &Scene) {
        let outside = self.outside();
        let mut stack = vec![start];

        while let Some(leaf) = stack.pop() {
            if self.node(leaf).contents.contains(Contents::AREAPORTAL) {
                self.tag_areaportal(leaf, area, scene);
                continue;
            }
            if self.node(leaf).area.is_some() {
                continue;
            }
            self.node_mut(leaf).area = Some(area);

            for &pid in self.node(leaf).portals.iter().rev() {
                let Some(portal) = self.portal(pid) else {
                    continue;
                };
                let other = portal.other(leaf);
                if other == outside || self.node(other).contents.intersects(Contents::BLOCKING) {
                    continue;
                }
                stack.push(other);
            }
        }
    }

    fn tag_areaportal(&mut self, leaf: NodeId, area: AreaId, scene: &Scene) {
        let name = owner_name(scene, self.node(leaf).contents_owner).to_string();
        let node = self.node_mut(leaf);

        match node.portal_areas {
            [None, _] => {
                node.area = Some(area);
                node.portal_areas[0] = Some(area);
            }
            [Some(a), _] if a == area => {}
            [Some(_), None] => node.portal_areas[1] = Some(area),
            [Some(_), Some(b)] if b == area => {}
            [Some(a), Some(b)] => {
                if !node.area_warned {
                    node.area_warned = true;
                    warn!(
                        "portal '{name}' touches more than 2 areas ({a}, {b}, {area}), map will not render correctly"
                    );
                }
            }
        }
    }

    /// Warns about areaportal leaves that do not separate two areas.
    /// Returns the number of such leaves.
    pub fn check_areas(&mut self, scene: &Scene) -> usize {
        let leaves: Vec<NodeId> = self.leaves().collect();
        let mut count = 0;

        for leaf in leaves {
            let owner = self.node(leaf).contents_owner;
            let node = self.node_mut(leaf);
            if !node.contents.contains(Contents::AREAPORTAL) {
                continue;
            }
            if node.portal_areas.iter().any(Option::is_none) {
                count += 1;
                if !node.area_warned {
                    node.area_warned = true;
                    warn!(
                        "portal '{}' does not separate areas (it will not constrain visibility)",
                        owner_name(scene, owner)
                    );
                }
            }
        }
        count
    }
}

impl BspTree {
    /// Records on every areaportal model the areas its leaves separate.
    /// Returns the number of models touching more than two areas.
    pub fn link_portal_models(&self, scene: &Scene, overlay: &mut Overlay) -> usize {
        for model in &mut overlay.models {
            model.portal_areas = [None, None];
        }

        let mut conflicts: Vec<u32> = Vec::new();
        for leaf in self.leaves() {
            let node = self.node(leaf);
            let Some(owner) = node.contents_owner else {
                continue;
            };
            if !node.contents.contains(Contents::AREAPORTAL) {
                continue;
            }

            let slots = &mut overlay.model_mut(owner).portal_areas;
            for area in node.portal_areas.into_iter().flatten() {
                match *slots {
                    [None, _] => slots[0] = Some(area),
                    [Some(a), _] if a == area => {}
                    [Some(_), None] => slots[1] = Some(area),
                    [Some(_), Some(b)] if b == area => {}
                    [Some(_), Some(_)] => {
                        if !conflicts.contains(&owner) {
                            conflicts.push(owner);
                            warn!(
                                "areaportal '{}' touches more than 2 areas, map will not render correctly",
                                owner_name(scene, Some(owner))
                            );
                        }
                    }
                }
            }
        }
        conflicts.len()
    }
}

fn owner_name(scene: &Scene, owner: Option<u32>) -> &str {
    owner
        .and_then(|m| scene.models.get(m as usize))
        .map_or("<NULL MODEL>", |m| m.name.as_str())
}

/// Pushes every visible source triangle down the finished tree and records
/// the areas its fragments land in.
///
/// Triangles are clipped exactly, without epsilon. A triangle lying on a
/// node's plane follows the side it faces. Areaportal models, ignored
/// models, outside solid models and outside faces are skipped. `NoDraw`
/// faces still learn their areas. A model with a fragment in an area is no
/// longer outside.
pub fn decompose_area_models(
    tree: &BspTree,
    scene: &Scene,
    overlay: &mut Overlay,
    planes: &mut PlaneHash,
    areas: &mut [Area],
    flooded: bool,
    progress: &mut Progress,
) -> DecomposeStats {
    let mut stats = DecomposeStats::default();

    for (m, model) in scene.models.iter().enumerate() {
        let info = overlay.model(m as u32);
        if info.ignore || info.contents.contains(Contents::AREAPORTAL) {
            continue;
        }
        if flooded && info.contents.contains(Contents::SOLID) && info.outside {
            stats.outside_models += 1;
            stats.outside_tris += model.tris.len();
            continue;
        }

        let mut landed = 0;
        for t in 0..model.tris.len() {
            let face = FaceRef::new(m, t);
            let face_info = overlay.face(face);
            if face_info.ignore || face_info.outside {
                continue;
            }
            let Some(plane) = face_info.plane else {
                continue;
            };
            progress.tick();

            let planenum = planes.find_plane_num(&plane);
            let [a, b, c] = scene.face_points(face);
            let mut found: SmallVec<[AreaId; 2]> = SmallVec::new();
            let mut stack = vec![(tree.root(), Winding::from_triangle(a, b, c))];

            while let Some((id, winding)) = stack.pop() {
                let node = tree.node(id);
                match node.kind {
                    NodeKind::Leaf => {
                        match node.area {
                            Some(area) if (!flooded || node.occupied > 0) && !found.contains(&area) => {
                                found.push(area)
                            }
                            _ => {}
                        }
                    }
                    NodeKind::Split { planenum: split, children } => {
                        if planenum == split {
                            stack.push((children[0], winding));
                        } else if planenum == split.opposite() {
                            stack.push((children[1], winding));
                        } else {
                            let (front, back) = winding.split(planes.plane(split), 0.0);
                            if front.is_empty() && back.is_empty() {
                                warn!("triangle {}:{} clipped away during area decomposition", m, t);
                            }
                            if !back.is_empty() {
                                stack.push((children[1], back));
                            }
                            if !front.is_empty() {
                                stack.push((children[0], front));
                            }
                        }
                    }
                }
            }

            if found.is_empty() {
                stats.outside_tris += 1;
                continue;
            }

            stats.inside_tris += 1;
            landed += 1;
            let face_info = overlay.face_mut(face);
            for area in found {
                if !face_info.areas.contains(&area) {
                    face_info.areas.push(area);
                    areas[area.index()].tris.push(face);
                }
            }
        }

        let info = overlay.model_mut(m as u32);
        if landed > 0 {
            info.outside = false;
        } else if !info.outside {
            warn!("model {} has no visible surface inside the hull", model.id);
        }

        if info.outside {
            stats.outside_models += 1;
        } else {
            stats.inside_models += 1;
        }
    }

    info!(
        "Inside : {} model(s), {} tri(s)",
        stats.inside_models, stats.inside_tris
    );
    info!(
        "Outside: {} model(s), {} tri(s)",
        stats.outside_models, stats.outside_tris
    );
    stats
}
