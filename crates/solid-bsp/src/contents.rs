//! Contents and surface classification of faces and leaves.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// What occupies a region of space.
    ///
    /// The visible classes are ordered by split priority: lower bits are
    /// tried first when choosing a split plane.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Contents: u32 {
        const SOLID      = 0x01;
        const FOG        = 0x02;
        const WATER      = 0x04;
        const AREAPORTAL = 0x08;
        const DETAIL     = 0x10;
        const CLIP       = 0x20;
    }
}

impl Contents {
    /// Classes that partition space and are matched against portals.
    pub const VISIBLE: Contents = Contents::SOLID
        .union(Contents::FOG)
        .union(Contents::WATER)
        .union(Contents::AREAPORTAL);

    /// Classes the flood fill cannot pass through.
    pub const BLOCKING: Contents = Contents::SOLID;

    /// Geometry counted as structural rather than detail in statistics.
    pub const STRUCTURAL: Contents = Contents::VISIBLE;

    /// The visible classes, one bit each, in split priority order.
    pub fn visible_classes() -> impl Iterator<Item = Contents> {
        [
            Contents::SOLID,
            Contents::FOG,
            Contents::WATER,
            Contents::AREAPORTAL,
        ]
        .into_iter()
    }

    /// The highest priority visible class set in `self`.
    pub fn first_visible(self) -> Option<Contents> {
        Self::visible_classes().find(|c| self.contains(*c))
    }

    /// Parses a `BSP.Contents` material value. Unknown names are solid.
    pub fn from_material_str(s: &str) -> Contents {
        match s {
            "Clip" => Contents::CLIP,
            "Detail" => Contents::DETAIL,
            "Fog" => Contents::FOG,
            "Water" => Contents::WATER,
            "Areaportal" => Contents::AREAPORTAL,
            _ => Contents::SOLID,
        }
    }
}

bitflags! {
    /// Rendering hints attached to a face.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Surface: u32 {
        const NO_DRAW = 0x01;
    }
}

impl Surface {
    /// Parses a `BSP.Surface` material value.
    pub fn from_material_str(s: &str) -> Surface {
        match s {
            "NoDraw" | "No Draw" => Surface::NO_DRAW,
            _ => Surface::empty(),
        }
    }
}
