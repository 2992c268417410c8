//! Solid BSP tree, portals, flood fill and areas.
//!
//! The tree partitions the world with planes taken from the input triangles.
//! Leaves are convex cells; after [`BspTree::portalize`] every leaf knows the
//! portals that bound it, which turns the tree into an adjacency graph used
//! by the flood fill and the area flood.
//!
//! # Architecture
//!
//! - [`BspTree`]: node arena plus portal pool. Node 0 is the synthetic
//!   "outside" node, node 1 the root.
//! - [`Node`]: a leaf or a split, holding the triangle fragments and portals
//!   that currently reside in it.
//! - [`PlaneSelector`]: strategy trait for choosing splitting planes
//! - [`Portal`]: the shared boundary between two nodes.
//!
//! Nodes and portals refer to each other by index, never by reference.

mod area;
mod flood;
mod node;
mod portal;
mod sector;
mod selector;
mod tree;

use std::fmt;

pub use area::{decompose_area_models, Area, DecomposeStats};
pub use flood::{FillStats, FloodOutcome, LeakTrail};
pub use node::{Node, NodeKind, Poly, TriModelFrag};
pub use portal::Portal;
pub use sector::{build_sectors, Sector, SectorPoly, SectorStats};
pub use selector::{BalancedSplits, PlaneSelector, SelectContext};
pub use tree::{BspTree, BuildContext, PreOrder, TreeStats};

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub fn new(index: usize) -> Self {
                Self(index as u32)
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

index_type!(
    /// Index of a node in a [`BspTree`].
    NodeId
);
index_type!(
    /// Index of a portal in a [`BspTree`]'s portal pool.
    PortalId
);
index_type!(
    /// Number of a visibility area.
    AreaId
);

impl AreaId {
    /// The sky area, reserved ahead of every area found in the tree.
    pub const SKY: AreaId = AreaId(0);
}
index_type!(
    /// Index of a sector produced by [`build_sectors`].
    SectorId
);
