//! BSP tree node implementation.

use crate::scene::FaceRef;
use crate::{Bounds, Contents, PlaneNum, Winding};

use super::{AreaId, NodeId, PortalId};

/// A fragment of one source triangle, confined to the cell of the node
/// that holds it.
#[derive(Debug, Clone)]
pub struct Poly {
    pub face: FaceRef,
    pub winding: Winding,
    pub planenum: PlaneNum,
    pub contents: Contents,
    /// Set once an ancestor split along this polygon's plane.
    pub on_node: bool,
}

/// The fragments of one source model that reside in a node.
#[derive(Debug, Clone)]
pub struct TriModelFrag {
    /// Index into `scene.models`.
    pub model: u32,
    pub contents: Contents,
    pub polys: Vec<Poly>,
    pub bounds: Bounds,
}

impl TriModelFrag {
    pub fn new(model: u32, contents: Contents) -> Self {
        Self {
            model,
            contents,
            polys: Vec::new(),
            bounds: Bounds::empty(),
        }
    }

    pub fn push(&mut self, poly: Poly) {
        self.bounds.insert(&poly.winding.bounds());
        self.polys.push(poly);
    }

    /// Returns true if every polygon lies on an ancestor's plane.
    pub fn all_on_node(&self) -> bool {
        self.polys.iter().all(|p| p.on_node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    /// Internal node; `children[0]` is in front of the plane, `children[1]` behind.
    Split {
        planenum: PlaneNum,
        children: [NodeId; 2],
    },
}

/// A node in the BSP tree.
///
/// While the tree is built every node owns the fragments inside its cell;
/// once it splits they move to its children, so only leaves keep geometry.
#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub bounds: Bounds,
    pub contents: Contents,
    pub models: Vec<TriModelFrag>,
    /// Portals bounding this node, in the order they were attached.
    pub portals: Vec<PortalId>,
    /// Flood depth at which the node was reached; 0 if never reached.
    pub occupied: u32,
    pub area: Option<AreaId>,
    /// Areas tagged on either side of an areaportal leaf.
    pub portal_areas: [Option<AreaId>; 2],
    pub area_warned: bool,
    /// Model that made this leaf an areaportal, for diagnostics.
    pub contents_owner: Option<u32>,
}

impl Node {
    pub fn new(parent: Option<NodeId>) -> Self {
        Self {
            parent,
            kind: NodeKind::Leaf,
            bounds: Bounds::empty(),
            contents: Contents::empty(),
            models: Vec::new(),
            portals: Vec::new(),
            occupied: 0,
            area: None,
            portal_areas: [None, None],
            area_warned: false,
            contents_owner: None,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf)
    }

    #[inline]
    pub fn planenum(&self) -> Option<PlaneNum> {
        match self.kind {
            NodeKind::Leaf => None,
            NodeKind::Split { planenum, .. } => Some(planenum),
        }
    }

    #[inline]
    pub fn children(&self) -> Option<[NodeId; 2]> {
        match self.kind {
            NodeKind::Leaf => None,
            NodeKind::Split { children, .. } => Some(children),
        }
    }

    /// Turns the node into a leaf and derives its contents from the
    /// fragments it holds.
    ///
    /// A solid fragment made entirely of polygons on ancestor planes fills
    /// the whole leaf, making it solid. Other fragments add their contents.
    pub(crate) fn make_leaf(&mut self) {
        self.kind = NodeKind::Leaf;
        self.contents = Contents::empty();

        for frag in &self.models {
            if frag.contents == Contents::SOLID {
                if frag.all_on_node() {
                    self.contents = Contents::SOLID;
                    break;
                }
            } else {
                if frag.contents.contains(Contents::AREAPORTAL) && self.contents_owner.is_none() {
                    self.contents_owner = Some(frag.model);
                }
                self.contents |= frag.contents;
            }
        }
    }
}
