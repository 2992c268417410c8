//! BSP tree container and construction.

use log::{info, warn};

use crate::scene::{FaceRef, Overlay, Scene};
use crate::{
    Classification, CompileConfig, CompileError, Contents, Plane3D, PlaneHash, PlaneNum,
    Progress, Result, Winding,
};

use super::node::{Node, NodeKind, Poly, TriModelFrag};
use super::portal::Portal;
use super::selector::{BalancedSplits, PlaneSelector, SelectContext};
use super::{NodeId, PortalId};

/// Inputs shared by every step of a tree pass.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub scene: &'a Scene,
    pub overlay: &'a Overlay,
    pub config: &'a CompileConfig,
    /// A previous pass flooded successfully and `overlay` knows which faces
    /// are outside.
    pub flooded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub structural_tris: usize,
    pub detail_tris: usize,
    pub nodes: usize,
    pub leafs: usize,
    /// Polygons lost to splits that left nothing on either side.
    pub dropped_polys: usize,
    pub portal_splits: usize,
    pub portal_faces: usize,
}

/// A solid BSP tree over the scene's triangles.
///
/// Nodes live in an arena. [`BspTree::outside`] is a synthetic node standing
/// for everything beyond the world box; it is never part of the hierarchy
/// but takes part in the portal graph. [`BspTree::root`] is the top of the
/// hierarchy.
///
/// # Construction
///
/// ```ignore
/// let mut planes = PlaneHash::new();
/// let mut tree = BspTree::build(&ctx, &mut planes, &mut progress)?;
/// tree.portalize(&mut planes, ctx.config, &mut progress);
/// ```
#[derive(Debug, Clone)]
pub struct BspTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) portals: Vec<Option<Portal>>,
    stats: TreeStats,
}

impl BspTree {
    /// Builds a tree choosing split planes with [`BalancedSplits`].
    pub fn build(
        ctx: &BuildContext<'_>,
        planes: &mut PlaneHash,
        progress: &mut Progress,
    ) -> Result<Self> {
        Self::build_with(ctx, planes, progress, &BalancedSplits)
    }

    /// Builds a tree choosing split planes with `selector`.
    pub fn build_with<S: PlaneSelector>(
        ctx: &BuildContext<'_>,
        planes: &mut PlaneHash,
        progress: &mut Progress,
        selector: &S,
    ) -> Result<Self> {
        let mut tree = Self {
            nodes: vec![Node::new(None), Node::new(None)],
            portals: Vec::new(),
            stats: TreeStats::default(),
        };

        tree.create_root_node(ctx, planes)?;
        info!(
            "BspTree ({} structural tri(s), {} detail tri(s), {} total)",
            tree.stats.structural_tris,
            tree.stats.detail_tris,
            tree.stats.structural_tris + tree.stats.detail_tris
        );

        tree.split_nodes(ctx, planes, progress, selector);
        info!("{} node(s), {} leaf(s)", tree.stats.nodes, tree.stats.leafs);
        if tree.stats.dropped_polys > 0 {
            warn!("{} polygon(s) were too small to split and were dropped", tree.stats.dropped_polys);
        }

        Ok(tree)
    }

    /// The synthetic node beyond the world box.
    #[inline]
    pub fn outside(&self) -> NodeId {
        NodeId::new(0)
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::new(1)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// All nodes, including the outside node at index 0.
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns a live portal, or `None` if the id was freed.
    #[inline]
    pub fn portal(&self, id: PortalId) -> Option<&Portal> {
        self.portals.get(id.index()).and_then(Option::as_ref)
    }

    /// Live portals and their ids.
    pub fn portals(&self) -> impl Iterator<Item = (PortalId, &Portal)> {
        self.portals
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (PortalId::new(i), p)))
    }

    #[inline]
    pub fn stats(&self) -> &TreeStats {
        &self.stats
    }

    #[inline]
    pub(crate) fn stats_mut(&mut self) -> &mut TreeStats {
        &mut self.stats
    }

    /// Visits the hierarchy from the root, each node before its children
    /// and front children before back children.
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![self.root()],
        }
    }

    /// Leaves in pre-order.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pre_order().filter(|&id| self.node(id).is_leaf())
    }

    /// Gathers one fragment per participating model into the root.
    fn create_root_node(&mut self, ctx: &BuildContext<'_>, planes: &mut PlaneHash) -> Result<()> {
        let half_extent = ctx.config.max_world_extent * 0.5;
        let root = &mut self.nodes[1];

        for (m, model) in ctx.scene.models.iter().enumerate() {
            let info = &ctx.overlay.models[m];
            if info.ignore || model.cinematic {
                continue;
            }

            if info.contents.intersects(Contents::STRUCTURAL) {
                self.stats.structural_tris += model.tris.len();
            } else {
                self.stats.detail_tris += model.tris.len();
            }

            if !info.contents.intersects(ctx.config.tree_contents) {
                continue;
            }

            if !info.bounds.is_empty()
                && (0..3).any(|i| info.bounds.mins[i] < -half_extent || info.bounds.maxs[i] > half_extent)
            {
                return Err(CompileError::ExceedsMaxExtents {
                    max_extent: ctx.config.max_world_extent,
                });
            }

            let mut frag = TriModelFrag::new(m as u32, info.contents);
            for (t, face) in ctx.overlay.faces[m].iter().enumerate() {
                if face.ignore {
                    continue;
                }
                let Some(plane) = face.plane else {
                    continue;
                };
                let face_ref = FaceRef::new(m, t);
                let [a, b, c] = ctx.scene.face_points(face_ref);
                frag.push(Poly {
                    face: face_ref,
                    winding: Winding::from_triangle(a, b, c),
                    planenum: planes.find_plane_num(&plane),
                    contents: info.contents,
                    on_node: false,
                });
            }

            if frag.polys.is_empty() {
                continue;
            }
            root.bounds.insert(&frag.bounds);
            root.models.push(frag);
        }

        if !root.bounds.is_empty() {
            root.bounds.expand(ctx.config.root_margin);
        }
        Ok(())
    }

    fn split_nodes<S: PlaneSelector>(
        &mut self,
        ctx: &BuildContext<'_>,
        planes: &PlaneHash,
        progress: &mut Progress,
        selector: &S,
    ) {
        let select_ctx = SelectContext {
            planes,
            overlay: ctx.overlay,
            valid_contents: ctx.config.tree_contents,
            flooded: ctx.flooded,
            split_epsilon: ctx.config.split_epsilon,
        };

        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let Some(planenum) = selector.select(self.node(id), &select_ctx) else {
                self.node_mut(id).make_leaf();
                self.stats.leafs += 1;
                continue;
            };

            self.stats.nodes += 1;
            progress.tick();

            let plane = planes.plane(planenum);
            let models = std::mem::take(&mut self.node_mut(id).models);
            let mut front = Node::new(Some(id));
            let mut back = Node::new(Some(id));

            for mut frag in models {
                let on_node = mark_node_polys(&mut frag, planenum);
                let side = plane.classify_bounds(&frag.bounds, 0.0);

                if on_node || matches!(side, Classification::Spanning | Classification::Coplanar) {
                    let (f, b) = split_frag(frag, plane, planenum, ctx.config.split_epsilon, &mut self.stats);
                    if let Some(f) = f {
                        front.bounds.insert(&f.bounds);
                        front.models.push(f);
                    }
                    if let Some(b) = b {
                        back.bounds.insert(&b.bounds);
                        back.models.push(b);
                    }
                } else if side == Classification::Front {
                    front.bounds.insert(&frag.bounds);
                    front.models.push(frag);
                } else {
                    back.bounds.insert(&frag.bounds);
                    back.models.push(frag);
                }
            }

            let front_id = NodeId::new(self.nodes.len());
            let back_id = NodeId::new(self.nodes.len() + 1);
            self.nodes.push(front);
            self.nodes.push(back);
            self.node_mut(id).kind = NodeKind::Split {
                planenum,
                children: [front_id, back_id],
            };

            stack.push(back_id);
            stack.push(front_id);
        }
    }
}

/// Flags every polygon lying on the split plane, in either orientation.
fn mark_node_polys(frag: &mut TriModelFrag, planenum: PlaneNum) -> bool {
    let mut marked = false;
    for poly in &mut frag.polys {
        if poly.planenum.canonical() == planenum.canonical() {
            poly.on_node = true;
            marked = true;
        }
    }
    marked
}

/// Distributes a fragment's polygons to the two sides of a split plane.
///
/// Polygons on the plane go to the side they face away from: the plane's
/// own orientation goes back, the opposite one front.
fn split_frag(
    frag: TriModelFrag,
    plane: &Plane3D,
    planenum: PlaneNum,
    epsilon: f64,
    stats: &mut TreeStats,
) -> (Option<TriModelFrag>, Option<TriModelFrag>) {
    let mut front = TriModelFrag::new(frag.model, frag.contents);
    let mut back = TriModelFrag::new(frag.model, frag.contents);

    for poly in frag.polys {
        if poly.planenum == planenum {
            back.push(poly);
            continue;
        }
        if poly.planenum == planenum.opposite() {
            front.push(poly);
            continue;
        }

        let (f, b) = poly.winding.split(plane, epsilon);
        if f.is_empty() && b.is_empty() {
            warn!(
                "polygon {}:{} vanished when split by plane {planenum}",
                poly.face.model, poly.face.tri
            );
            stats.dropped_polys += 1;
            continue;
        }
        if !f.is_empty() {
            front.push(Poly { winding: f, ..poly.clone() });
        }
        if !b.is_empty() {
            back.push(Poly { winding: b, ..poly });
        }
    }

    let keep = |frag: TriModelFrag| (!frag.polys.is_empty()).then_some(frag);
    (keep(front), keep(back))
}

/// Pre-order iterator over a [`BspTree`], driven by an explicit stack.
#[derive(Debug)]
pub struct PreOrder<'a> {
    tree: &'a BspTree,
    stack: Vec<NodeId>,
}

impl Iterator for PreOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        if let Some([front, back]) = self.tree.node(id).children() {
            self.stack.push(back);
            self.stack.push(front);
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, p};

    fn build(scene: &Scene) -> (BspTree, PlaneHash) {
        let overlay = testing::overlay(scene);
        let config = CompileConfig::default();
        let ctx = BuildContext {
            scene,
            overlay: &overlay,
            config: &config,
            flooded: false,
        };
        let mut planes = PlaneHash::new();
        let tree = BspTree::build(&ctx, &mut planes, &mut Progress::silent()).unwrap();
        (tree, planes)
    }

    #[test]
    fn empty_scene_is_single_leaf() {
        let scene = testing::scene(Vec::new(), Vec::new());
        let (tree, _) = build(&scene);
        assert!(tree.node(tree.root()).is_leaf());
        assert_eq!(tree.stats().leafs, 1);
        assert_eq!(tree.pre_order().count(), 1);
    }

    #[test]
    fn sealed_room_has_solid_shell() {
        let (tree, planes) = build(&testing::sealed_room());

        // Six walls: one node per wall, each with a solid leaf behind it.
        assert_eq!(tree.stats().nodes, 6);
        assert_eq!(tree.stats().leafs, 7);
        assert_eq!(tree.stats().structural_tris, 12);

        let inside = tree.leaf_for_point(&planes, &p(128.0, 128.0, 128.0));
        assert!(tree.node(inside).contents.is_empty());
        let wall = tree.leaf_for_point(&planes, &p(-8.0, 128.0, 128.0));
        assert_eq!(tree.node(wall).contents, Contents::SOLID);
    }

    #[test]
    fn internal_nodes_have_two_children() {
        let (tree, _) = build(&testing::split_rooms());
        for id in tree.pre_order() {
            let node = tree.node(id);
            match node.kind {
                NodeKind::Leaf => assert!(node.planenum().is_none()),
                NodeKind::Split { children, .. } => {
                    for child in children {
                        assert_eq!(tree.node(child).parent, Some(id));
                    }
                }
            }
        }
    }

    #[test]
    fn clip_brush_fills_its_leaf() {
        let mut scene = testing::sealed_room();
        scene.models.push(testing::brush(
            1,
            p(100.0, 100.0, 0.0),
            p(150.0, 150.0, 50.0),
            testing::CLIP,
        ));
        let (tree, planes) = build(&scene);

        assert_eq!(tree.stats().structural_tris, 12);
        assert_eq!(tree.stats().detail_tris, 12);
        // Clip geometry is carried down the tree but never splits it.
        assert_eq!(tree.stats().nodes, 6);

        let leaf = tree.leaf_for_point(&planes, &p(125.0, 125.0, 25.0));
        assert!(tree.node(leaf).contents.contains(Contents::CLIP));
        let wall = tree.leaf_for_point(&planes, &p(-8.0, 128.0, 128.0));
        assert_eq!(tree.node(wall).contents, Contents::SOLID);
    }

    #[test]
    fn solid_planes_split_before_water() {
        let (tree, planes) = build(&testing::water_room());
        assert_eq!(tree.stats().nodes, 12);
        assert_eq!(tree.stats().leafs, 13);

        let pool = tree.leaf_for_point(&planes, &p(128.0, 128.0, 48.0));
        assert_eq!(tree.node(pool).contents, Contents::WATER);
        let air = tree.leaf_for_point(&planes, &p(128.0, 128.0, 160.0));
        assert!(tree.node(air).contents.is_empty());

        // From the pool up: the six sides of the water, then the six walls.
        let mut offsets = Vec::new();
        let mut id = pool;
        while let Some(parent) = tree.node(id).parent {
            let planenum = tree.node(parent).planenum().unwrap();
            offsets.push(planes.plane(planenum).offset().abs());
            id = parent;
        }
        assert_eq!(id, tree.root());
        assert_eq!(offsets.len(), 12);

        let near = |d: f64, of: &[f64]| of.iter().any(|x| (d - x).abs() < 1e-6);
        assert!(offsets[..6].iter().all(|&d| near(d, &[16.0, 64.0, 96.0, 192.0][..])));
        assert!(offsets[6..].iter().all(|&d| near(d, &[0.0, 256.0][..])));
    }

    #[test]
    fn children_meet_only_at_their_split_plane() {
        for scene in [testing::sealed_room(), testing::split_rooms(), testing::water_room()] {
            let (tree, planes) = build(&scene);
            for id in tree.pre_order() {
                let NodeKind::Split { planenum, children: [front, back] } = tree.node(id).kind else {
                    continue;
                };
                let plane = planes.plane(planenum);

                let front = tree.node(front).bounds;
                if !front.is_empty() {
                    assert!(matches!(
                        plane.classify_bounds(&front, 0.01),
                        Classification::Front | Classification::Coplanar
                    ));
                }
                let back = tree.node(back).bounds;
                if !back.is_empty() {
                    assert!(matches!(
                        plane.classify_bounds(&back, 0.01),
                        Classification::Back | Classification::Coplanar
                    ));
                }
            }
        }
    }

    #[test]
    fn pre_order_visits_front_first() {
        let (tree, _) = build(&testing::sealed_room());
        let order: Vec<_> = tree.pre_order().collect();
        assert_eq!(order[0], tree.root());
        let [front, _] = tree.node(tree.root()).children().unwrap();
        assert_eq!(order[1], front);
        assert_eq!(order.len(), tree.stats().nodes + tree.stats().leafs);
    }

    #[test]
    fn areaportal_slab_becomes_leaf() {
        let (tree, planes) = build(&testing::split_rooms());
        let slab = tree.leaf_for_point(&planes, &p(256.0, 128.0, 128.0));
        assert_eq!(tree.node(slab).contents, Contents::AREAPORTAL);
        assert_eq!(tree.node(slab).contents_owner, Some(1));
    }

    #[test]
    fn geometry_beyond_world_is_rejected() {
        let scene = testing::scene(
            vec![testing::box_room(0, p(0.0, 0.0, 0.0), p(9000.0, 16.0, 16.0), &[])],
            Vec::new(),
        );
        let overlay = testing::overlay(&scene);
        let config = CompileConfig::default();
        let ctx = BuildContext {
            scene: &scene,
            overlay: &overlay,
            config: &config,
            flooded: false,
        };
        let err = BspTree::build(&ctx, &mut PlaneHash::new(), &mut Progress::silent()).unwrap_err();
        assert!(matches!(err, CompileError::ExceedsMaxExtents { .. }));
    }

    #[test]
    fn split_routes_coplanar_by_orientation() {
        let mut planes = PlaneHash::new();
        let up = Plane3D::axial(2, 0.0);
        let planenum = planes.find_plane_num(&up);
        let make = |tri, winding: Winding, planenum| Poly {
            face: FaceRef::new(0, tri),
            winding,
            planenum,
            contents: Contents::SOLID,
            on_node: true,
        };

        let mut frag = TriModelFrag::new(0, Contents::SOLID);
        frag.push(make(
            0,
            Winding::from_triangle(p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)),
            planenum,
        ));
        frag.push(make(
            1,
            Winding::from_triangle(p(0.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(1.0, 0.0, 0.0)),
            planenum.opposite(),
        ));
        frag.push(make(
            2,
            Winding::from_triangle(p(0.0, 0.0, -1.0), p(1.0, 0.0, 1.0), p(0.0, 1.0, 1.0)),
            PlaneNum::new(100),
        ));

        let mut stats = TreeStats::default();
        let (front, back) = split_frag(frag, &up, planenum, 0.0002, &mut stats);
        let front = front.unwrap();
        let back = back.unwrap();

        assert_eq!(front.polys[0].face.tri, 1);
        assert_eq!(back.polys[0].face.tri, 0);
        // The slanted triangle is cut into both halves.
        assert_eq!(front.polys.len(), 2);
        assert_eq!(back.polys.len(), 2);
        assert_eq!(stats.dropped_polys, 0);
    }
}
