//! Portals: the convex boundaries between adjacent nodes.
//!
//! Portals are generated top-down alongside the tree. Six portals around the
//! world box connect the outside node to the root; every split node then adds
//! one portal on its own plane and hands the portals it inherited down to its
//! children. Once the walk reaches the leaves, each leaf's portals exactly
//! bound its convex cell.

use log::{debug, info, warn};

use crate::scene::FaceRef;
use crate::{CompileConfig, Contents, PlaneHash, PlaneNum, Progress, Winding};

use super::{BspTree, NodeId, NodeKind, PortalId};

/// A convex polygon shared by exactly two nodes.
#[derive(Debug, Clone)]
pub struct Portal {
    pub planenum: PlaneNum,
    pub winding: Winding,
    /// `nodes[0]` is in front of the plane, `nodes[1]` behind it.
    pub nodes: [NodeId; 2],
    /// The split node that created this portal; `None` for the world box.
    pub on_node: Option<NodeId>,
    /// Visible contents this portal separates, set once faces are matched.
    pub contents: Contents,
    /// Source triangles lying on this portal.
    pub original: Vec<FaceRef>,
}

impl Portal {
    fn new(planenum: PlaneNum, winding: Winding, on_node: Option<NodeId>) -> Self {
        Self {
            planenum,
            winding,
            nodes: [NodeId::new(0), NodeId::new(0)],
            on_node,
            contents: Contents::empty(),
            original: Vec::new(),
        }
    }

    /// 0 if `node` is in front of the portal, 1 if behind.
    #[inline]
    pub fn side_of(&self, node: NodeId) -> usize {
        usize::from(self.nodes[1] == node)
    }

    /// The node on the far side from `node`.
    #[inline]
    pub fn other(&self, node: NodeId) -> NodeId {
        self.nodes[self.side_of(node) ^ 1]
    }
}

impl BspTree {
    /// Builds the portal graph of the whole tree and matches portals to the
    /// faces lying on them. Any previous portals are discarded.
    pub fn portalize(&mut self, planes: &mut PlaneHash, config: &CompileConfig, progress: &mut Progress) {
        self.portals.clear();
        for node in &mut self.nodes {
            node.portals.clear();
        }
        let stats = self.stats_mut();
        stats.portal_splits = 0;
        stats.portal_faces = 0;

        let root = self.root();
        let outside = self.outside();
        let mut bounds = self.node(root).bounds;
        if bounds.is_empty() {
            warn!("nothing to portalize, the world is empty");
            return;
        }
        bounds.expand(config.root_margin);

        let node = self.node_mut(outside);
        node.kind = NodeKind::Leaf;
        node.models.clear();
        node.contents = Contents::empty();
        node.occupied = 0;
        node.area = None;
        node.bounds = bounds;

        // Six portals facing outward, with the root behind them.
        for (winding, plane) in bounds
            .face_windings(config.max_world_extent)
            .into_iter()
            .zip(bounds.planes())
        {
            let planenum = planes.find_plane_num(&plane);
            let id = self.alloc_portal(Portal::new(planenum, winding, None));
            self.add_portal_to_nodes(id, outside, root);
        }

        self.make_tree_portals(planes, config, progress);
        self.find_portal_node_faces();

        info!(
            "{} portal(s), {} split(s), {} portal face(s)",
            self.portals().count(),
            self.stats().portal_splits,
            self.stats().portal_faces
        );
    }

    fn alloc_portal(&mut self, portal: Portal) -> PortalId {
        let id = PortalId::new(self.portals.len());
        self.portals.push(Some(portal));
        id
    }

    fn add_portal_to_nodes(&mut self, id: PortalId, front: NodeId, back: NodeId) {
        if let Some(portal) = self.portals[id.index()].as_mut() {
            portal.nodes = [front, back];
        }
        self.node_mut(front).portals.push(id);
        self.node_mut(back).portals.push(id);
    }

    fn make_tree_portals(&mut self, planes: &PlaneHash, config: &CompileConfig, progress: &mut Progress) {
        let splits: Vec<NodeId> = self.pre_order().filter(|&id| !self.node(id).is_leaf()).collect();
        for id in splits {
            self.make_node_portal(id, planes, config);
            self.split_node_portals(id, planes, config, progress);
        }
    }

    /// Creates the portal on a split node's plane, clipped to the node's cell.
    fn make_node_portal(&mut self, id: NodeId, planes: &PlaneHash, config: &CompileConfig) {
        let NodeKind::Split { planenum, children } = self.node(id).kind else {
            return;
        };
        let mut winding = Winding::base(planes.plane(planenum), config.max_world_extent);

        for &bounding in &self.node(id).portals {
            let Some(portal) = self.portal(bounding) else {
                continue;
            };
            let (front, back) = winding.split(planes.plane(portal.planenum), config.split_epsilon);
            winding = if portal.side_of(id) == 0 { front } else { back };
            if winding.is_empty() {
                debug!("node {id} portal clipped away by portal {bounding}");
                return;
            }
        }

        let portal = self.alloc_portal(Portal::new(planenum, winding, Some(id)));
        self.add_portal_to_nodes(portal, children[0], children[1]);
    }

    /// Moves every portal bounding a split node down to its children,
    /// cutting the ones that straddle its plane.
    fn split_node_portals(&mut self, id: NodeId, planes: &PlaneHash, config: &CompileConfig, progress: &mut Progress) {
        let NodeKind::Split { planenum, children } = self.node(id).kind else {
            return;
        };
        let plane = planes.plane(planenum);

        for pid in std::mem::take(&mut self.node_mut(id).portals) {
            let Some(mut portal) = self.portals[pid.index()].take() else {
                continue;
            };
            let side = portal.side_of(id);
            let other = portal.other(id);
            self.node_mut(other).portals.retain(|&p| p != pid);

            let (front, back) = portal.winding.split(plane, config.split_epsilon);
            let orient = |child: NodeId| if side == 0 { [child, other] } else { [other, child] };

            match (front.is_empty(), back.is_empty()) {
                (true, true) => {
                    warn!("portal {pid} vanished when split by node {id}, dropping it");
                }
                (false, false) => {
                    self.stats_mut().portal_splits += 1;
                    progress.tick();

                    let mut back_portal = portal.clone();
                    back_portal.winding = back;
                    portal.winding = front;

                    self.portals[pid.index()] = Some(portal);
                    let back_id = self.alloc_portal(back_portal);

                    let [a, b] = orient(children[0]);
                    self.add_portal_to_nodes(pid, a, b);
                    let [a, b] = orient(children[1]);
                    self.add_portal_to_nodes(back_id, a, b);
                }
                (false, true) => {
                    self.portals[pid.index()] = Some(portal);
                    let [a, b] = orient(children[0]);
                    self.add_portal_to_nodes(pid, a, b);
                }
                (true, false) => {
                    self.portals[pid.index()] = Some(portal);
                    let [a, b] = orient(children[1]);
                    self.add_portal_to_nodes(pid, a, b);
                }
            }
        }
    }

    /// Attaches to each portal between differing visible contents the source
    /// faces that lie on it.
    ///
    /// Only the highest priority differing class is matched, and the face
    /// must look away from the leaf that holds it.
    fn find_portal_node_faces(&mut self) {
        let leaves: Vec<NodeId> = self.leaves().collect();
        let mut matched = 0;

        for leaf in leaves {
            let node = &self.nodes[leaf.index()];
            if !node.contents.intersects(Contents::VISIBLE) {
                continue;
            }

            for &pid in &node.portals {
                let Some(portal) = self.portals[pid.index()].as_mut() else {
                    continue;
                };
                if !portal.original.is_empty() {
                    continue;
                }

                let [n0, n1] = portal.nodes;
                let differing = (self.nodes[n0.index()].contents ^ self.nodes[n1.index()].contents)
                    & Contents::VISIBLE;
                let Some(class) = differing.first_visible() else {
                    continue;
                };

                let planenum = portal.planenum.with_side(portal.side_of(leaf) ^ 1);
                for frag in node.models.iter().filter(|f| f.contents.intersects(class)) {
                    for poly in frag.polys.iter().filter(|p| p.planenum == planenum) {
                        portal.contents |= class;
                        portal.original.push(poly.face);
                        matched += 1;
                    }
                }
            }
        }

        self.stats_mut().portal_faces = matched;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::BuildContext;
    use crate::scene::Scene;
    use crate::testing::{self, p};

    fn portalized(scene: &Scene) -> (BspTree, PlaneHash) {
        let overlay = testing::overlay(scene);
        let config = CompileConfig::default();
        let ctx = BuildContext {
            scene,
            overlay: &overlay,
            config: &config,
            flooded: false,
        };
        let mut planes = PlaneHash::new();
        let mut progress = Progress::silent();
        let mut tree = BspTree::build(&ctx, &mut planes, &mut progress).unwrap();
        tree.portalize(&mut planes, &config, &mut progress);
        (tree, planes)
    }

    #[test]
    fn portals_link_two_nodes_both_ways() {
        let (tree, _) = portalized(&testing::split_rooms());
        for (id, portal) in tree.portals() {
            assert_ne!(portal.nodes[0], portal.nodes[1]);
            for node in portal.nodes {
                assert!(tree.node(node).is_leaf() || node == tree.outside());
                assert!(tree.node(node).portals.contains(&id));
            }
        }
        for id in tree.pre_order().filter(|&id| !tree.node(id).is_leaf()) {
            assert!(tree.node(id).portals.is_empty());
        }
    }

    #[test]
    fn sealed_room_cell_is_walled_in() {
        let (tree, planes) = portalized(&testing::sealed_room());
        let inside = tree.leaf_for_point(&planes, &p(128.0, 128.0, 128.0));
        let node = tree.node(inside);

        assert_eq!(node.portals.len(), 6);
        for &pid in &node.portals {
            let portal = tree.portal(pid).unwrap();
            assert_eq!(tree.node(portal.other(inside)).contents, Contents::SOLID);
            assert_eq!(portal.original.len(), 2);
            assert_eq!(portal.contents, Contents::SOLID);
            assert_eq!(portal.winding.len(), 4);
        }
        assert_eq!(tree.stats().portal_faces, 12);
    }

    #[test]
    fn open_room_sees_outside() {
        let (tree, planes) = portalized(&testing::leaky_room());
        let inside = tree.leaf_for_point(&planes, &p(128.0, 128.0, 128.0));
        let outside = tree.outside();
        assert!(
            tree.node(inside)
                .portals
                .iter()
                .any(|&pid| tree.portal(pid).unwrap().other(inside) == outside)
        );
    }

    #[test]
    fn areaportal_faces_are_matched() {
        let (tree, planes) = portalized(&testing::split_rooms());
        let slab = tree.leaf_for_point(&planes, &p(256.0, 128.0, 128.0));
        let gates: Vec<_> = tree
            .node(slab)
            .portals
            .iter()
            .filter_map(|&pid| tree.portal(pid))
            .filter(|portal| portal.contents == Contents::AREAPORTAL)
            .collect();

        assert_eq!(gates.len(), 2);
        for gate in gates {
            assert_eq!(gate.original.len(), 2);
            assert!(gate.original.iter().all(|face| face.model == 1));
        }
    }

    #[test]
    fn water_surfaces_are_matched_from_the_pool() {
        let (tree, planes) = portalized(&testing::water_room());
        let pool = tree.leaf_for_point(&planes, &p(128.0, 128.0, 48.0));
        let node = tree.node(pool);

        assert_eq!(node.contents, Contents::WATER);
        assert_eq!(node.portals.len(), 6);
        for &pid in &node.portals {
            let portal = tree.portal(pid).unwrap();
            assert!(tree.node(portal.other(pool)).contents.is_empty());
            assert_eq!(portal.contents, Contents::WATER);
            assert_eq!(portal.original.len(), 2);
            assert!(portal.original.iter().all(|face| face.model == 1));
        }
    }

    #[test]
    fn repeated_portalize_starts_over() {
        let scene = testing::sealed_room();
        let overlay = testing::overlay(&scene);
        let config = CompileConfig::default();
        let ctx = BuildContext {
            scene: &scene,
            overlay: &overlay,
            config: &config,
            flooded: false,
        };
        let mut planes = PlaneHash::new();
        let mut progress = Progress::silent();
        let mut tree = BspTree::build(&ctx, &mut planes, &mut progress).unwrap();
        tree.portalize(&mut planes, &config, &mut progress);
        let first = tree.portals().count();
        tree.portalize(&mut planes, &config, &mut progress);
        assert_eq!(tree.portals().count(), first);
    }
}
