//! Flood fill from entities through the portal graph, and leak detection.
//!
//! Every entity seeds a depth-first flood through portals into neighbouring
//! leaves, stopping at solid ones. A sealed map never reaches the outside
//! node. When it does, the flood depths recorded on each leaf lead back from
//! the outside to the entity along a strictly decreasing path.

use log::{error, info, warn};
use nalgebra::Point3;

use crate::scene::{Entity, Overlay, Scene};
use crate::{Contents, PlaneHash, PlaneSide, Progress};

use super::{BspTree, NodeId, NodeKind};

/// Path from the outside of the map to the entity that can see it.
#[derive(Debug, Clone, PartialEq)]
pub struct LeakTrail {
    pub entity: String,
    /// Portal centres from the outside inward, ending at the entity origin.
    pub points: Vec<Point3<f64>>,
    /// Nodes walked, starting with the outside node.
    pub nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FloodOutcome {
    /// At least one entity flooded and none reached the outside.
    Sealed,
    /// No entity could seed the flood; nothing is known about the outside.
    NoSeeds,
    Leaked(LeakTrail),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillStats {
    pub inside_nodes: usize,
    pub outside_nodes: usize,
    pub inside_models: usize,
    pub outside_models: usize,
    pub inside_tris: usize,
    pub outside_tris: usize,
}

impl BspTree {
    /// Returns the leaf containing `point`. Points on a plane go to the back.
    pub fn leaf_for_point(&self, planes: &PlaneHash, point: &Point3<f64>) -> NodeId {
        let mut id = self.root();
        while let NodeKind::Split { planenum, children } = self.node(id).kind {
            id = match planes.plane(planenum).classify_point(point, 0.0) {
                PlaneSide::Front => children[0],
                PlaneSide::Back | PlaneSide::OnPlane => children[1],
            };
        }
        id
    }

    /// Floods from every entity and reports whether the outside was reached.
    ///
    /// Sky entities never seed the flood. Entities in solid space are skipped
    /// with a warning.
    pub fn flood_fill(&mut self, scene: &Scene, planes: &PlaneHash, progress: &mut Progress) -> FloodOutcome {
        for node in &mut self.nodes {
            node.occupied = 0;
        }

        let outside = self.outside();
        let mut seeded = false;

        for entity in scene.entities.iter().filter(|e| !e.sky) {
            let leaf = self.leaf_for_point(planes, &entity.origin);
            if self.node(leaf).contents.contains(Contents::SOLID) {
                warn!("entity named '{}' id {} is in solid space", entity.name, entity.id);
                continue;
            }

            seeded = true;
            if self.node(leaf).occupied == 0 {
                self.portal_flood(leaf, progress);
            }

            if self.node(outside).occupied > 0 {
                let trail = self.mark_leak_trail(entity);
                error!(
                    "MAP LEAKED, entity '{}' id {} can see outside ({} point trail)",
                    entity.classname,
                    entity.id,
                    trail.points.len()
                );
                return FloodOutcome::Leaked(trail);
            }
        }

        if !seeded {
            warn!("no valid entities found for flood, level will not be optimized");
            return FloodOutcome::NoSeeds;
        }
        FloodOutcome::Sealed
    }

    /// Depth-first flood from `start`, recording the depth at which each
    /// leaf was reached.
    fn portal_flood(&mut self, start: NodeId, progress: &mut Progress) {
        self.node_mut(start).occupied = 1;
        let mut stack = vec![(start, 0usize)];

        while let Some(frame) = stack.last_mut() {
            let (leaf, next) = *frame;
            let Some(&pid) = self.node(leaf).portals.get(next) else {
                stack.pop();
                continue;
            };
            frame.1 += 1;

            let Some(portal) = self.portal(pid) else {
                continue;
            };
            let other = portal.other(leaf);
            let node = self.node(other);
            if node.occupied != 0 || node.contents.intersects(Contents::BLOCKING) {
                continue;
            }

            let depth = stack.len() as u32 + 1;
            self.node_mut(other).occupied = depth;
            progress.tick();
            stack.push((other, 0));
        }
    }

    /// Walks from the outside node back to `entity`, always crossing to the
    /// neighbour with the smallest flood depth below the current one.
    fn mark_leak_trail(&self, entity: &Entity) -> LeakTrail {
        let mut node = self.outside();
        let mut count = self.node(node).occupied;
        let mut trail = LeakTrail {
            entity: entity.name.clone(),
            points: Vec::new(),
            nodes: vec![node],
        };

        while self.node(node).occupied > 1 {
            let mut next = None;
            for &pid in &self.node(node).portals {
                let Some(portal) = self.portal(pid) else {
                    continue;
                };
                let other = portal.other(node);
                let occupied = self.node(other).occupied;
                if occupied != 0 && occupied < count {
                    next = Some((portal.winding.center(), other));
                    count = occupied;
                }
            }

            let Some((center, other)) = next else {
                break;
            };
            trail.points.push(center);
            trail.nodes.push(other);
            node = other;
        }

        trail.points.push(entity.origin);
        trail
    }

    /// Turns every unreached leaf solid and marks which faces can be seen
    /// from a reached one.
    ///
    /// Faces are outside unless they lie on a portal of an occupied leaf;
    /// areaportal boundaries do not count. A model is outside only if all
    /// its faces are. Detail and sky models are never outside.
    pub fn fill_outside(&mut self, scene: &Scene, overlay: &mut Overlay) -> FillStats {
        let mut stats = FillStats::default();

        for face in overlay.faces.iter_mut().flatten() {
            face.outside = true;
        }

        let leaves: Vec<NodeId> = self.leaves().collect();
        for leaf in leaves {
            if self.node(leaf).occupied == 0 {
                stats.outside_nodes += 1;
                self.node_mut(leaf).contents = Contents::SOLID;
                continue;
            }

            stats.inside_nodes += 1;
            for &pid in &self.node(leaf).portals {
                let Some(portal) = self.portal(pid) else {
                    continue;
                };
                let [n0, n1] = portal.nodes;
                let differing = self.node(n0).contents ^ self.node(n1).contents;
                if differing.contains(Contents::AREAPORTAL) {
                    continue;
                }
                for &face in &portal.original {
                    overlay.face_mut(face).outside = false;
                }
            }
        }

        for (m, model) in scene.models.iter().enumerate() {
            let info = &overlay.models[m];
            if info.ignore || model.cinematic {
                continue;
            }

            if info.contents.contains(Contents::DETAIL) || model.sky {
                stats.inside_models += 1;
                stats.inside_tris += model.tris.len();
                overlay.models[m].outside = false;
                continue;
            }

            let mut outside = true;
            for face in &overlay.faces[m] {
                if face.outside {
                    stats.outside_tris += 1;
                } else {
                    stats.inside_tris += 1;
                    outside = false;
                }
            }

            if outside {
                stats.outside_models += 1;
            } else {
                stats.inside_models += 1;
            }
            overlay.models[m].outside = outside;
        }

        info!(
            "Inside : {} node(s), {} model(s), {} tri(s)",
            stats.inside_nodes, stats.inside_models, stats.inside_tris
        );
        info!(
            "Outside: {} node(s), {} model(s), {} tri(s)",
            stats.outside_nodes, stats.outside_models, stats.outside_tris
        );
        stats
    }
}
