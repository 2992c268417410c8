//! Plane selection strategies for BSP tree construction.
//!
//! The choice of splitting plane affects tree balance and the number of
//! polygon splits during construction. Selection must be deterministic:
//! the same fragments in the same order always yield the same plane.

use std::collections::HashSet;

use crate::scene::Overlay;
use crate::{Classification, Contents, PlaneHash, PlaneNum};

use super::Node;

/// Everything a selector may consult besides the node itself.
#[derive(Debug, Clone, Copy)]
pub struct SelectContext<'a> {
    pub planes: &'a PlaneHash,
    pub overlay: &'a Overlay,
    /// Contents classes allowed to contribute split planes.
    pub valid_contents: Contents,
    /// A previous flood succeeded; faces marked outside are deprioritized.
    pub flooded: bool,
    pub split_epsilon: f64,
}

/// Strategy for selecting which plane splits a node.
///
/// Returns `None` when the node should become a leaf. The returned plane
/// must come from a polygon in the node that is not yet `on_node`.
pub trait PlaneSelector {
    fn select(&self, node: &Node, ctx: &SelectContext<'_>) -> Option<PlaneNum>;
}

const SPLIT_COST: i64 = 1000;
const AREAPORTAL_SPLIT_COST: i64 = 10000;

/// Picks the plane that best balances fragments while avoiding splits.
///
/// Contents classes are tried in priority order and the first class that
/// offers any candidate wins. Within a class, the cost is
/// `|front - back| + splits * 1000 + areaportal_splits * 10000`; ties keep
/// the first candidate found.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalancedSplits;

impl PlaneSelector for BalancedSplits {
    fn select(&self, node: &Node, ctx: &SelectContext<'_>) -> Option<PlaneNum> {
        if node.models.is_empty() {
            return None;
        }

        let mut tested = HashSet::new();

        // Interior faces first; outside faces only if nothing else is left.
        for allow_outside in [false, true] {
            for class in Contents::visible_classes() {
                if !ctx.valid_contents.contains(class) {
                    continue;
                }

                let mut best: Option<(i64, PlaneNum)> = None;

                for frag in &node.models {
                    for poly in &frag.polys {
                        if poly.on_node || !poly.contents.intersects(class) {
                            continue;
                        }
                        if ctx.flooded && !allow_outside && ctx.overlay.face(poly.face).outside {
                            continue;
                        }

                        let planenum = poly.planenum.canonical();
                        if !tested.insert(planenum) {
                            continue;
                        }

                        let cost = plane_cost(node, planenum, ctx);
                        if best.is_none_or(|(best_cost, _)| cost < best_cost) {
                            best = Some((cost, planenum));
                        }
                    }
                }

                if let Some((_, planenum)) = best {
                    return Some(planenum);
                }
            }

            if !ctx.flooded {
                break;
            }
        }

        None
    }
}

fn plane_cost(node: &Node, planenum: PlaneNum, ctx: &SelectContext<'_>) -> i64 {
    let plane = ctx.planes.plane(planenum);
    let mut front = 0i64;
    let mut back = 0i64;
    let mut splits = 0i64;
    let mut areaportal_splits = 0i64;

    for frag in &node.models {
        match plane.classify_bounds(&frag.bounds, 0.0) {
            Classification::Front => front += frag.polys.len() as i64,
            Classification::Back => back += frag.polys.len() as i64,
            Classification::Coplanar => {}
            Classification::Spanning => {
                for poly in &frag.polys {
                    if poly.planenum.canonical() == planenum {
                        continue;
                    }
                    match poly.winding.classify(plane, ctx.split_epsilon) {
                        Classification::Front => front += 1,
                        Classification::Back => back += 1,
                        Classification::Coplanar => {}
                        Classification::Spanning => {
                            splits += 1;
                            if poly.contents.contains(Contents::AREAPORTAL) {
                                areaportal_splits += 1;
                            }
                        }
                    }
                }
            }
        }
    }

    (front - back).abs() + splits * SPLIT_COST + areaportal_splits * AREAPORTAL_SPLIT_COST
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::{Poly, TriModelFrag};
    use crate::scene::FaceRef;
    use crate::{Plane3D, Winding};
    use nalgebra::Point3;

    fn make_triangle(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> Winding {
        Winding::from_triangle(
            Point3::new(a[0], a[1], a[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(c[0], c[1], c[2]),
        )
    }

    fn make_poly(planes: &mut PlaneHash, tri: u32, winding: Winding, contents: Contents) -> Poly {
        let pts = winding.points();
        let plane = Plane3D::from_three_points(pts[0], pts[1], pts[2]).unwrap();
        Poly {
            face: FaceRef { model: 0, tri },
            planenum: planes.find_plane_num(&plane),
            winding,
            contents,
            on_node: false,
        }
    }

    fn node_with(polys: Vec<Poly>) -> Node {
        let mut node = Node::new(None);
        for poly in polys {
            let mut frag = TriModelFrag::new(0, poly.contents);
            frag.push(poly);
            node.models.push(frag);
        }
        node
    }

    fn ctx<'a>(planes: &'a PlaneHash, overlay: &'a Overlay) -> SelectContext<'a> {
        SelectContext {
            planes,
            overlay,
            valid_contents: Contents::VISIBLE,
            flooded: false,
            split_epsilon: 0.0002,
        }
    }

    #[test]
    fn empty_node_is_leaf() {
        let planes = PlaneHash::new();
        let overlay = Overlay::default();
        let node = Node::new(None);
        assert!(BalancedSplits.select(&node, &ctx(&planes, &overlay)).is_none());
    }

    #[test]
    fn on_node_polys_are_not_candidates() {
        let mut planes = PlaneHash::new();
        let overlay = Overlay::default();
        let mut poly = make_poly(
            &mut planes,
            0,
            make_triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            Contents::SOLID,
        );
        poly.on_node = true;
        let node = node_with(vec![poly]);
        assert!(BalancedSplits.select(&node, &ctx(&planes, &overlay)).is_none());
    }

    #[test]
    fn prefers_balanced_plane() {
        // Three parallel floors at z = 0, 10, 20: the middle one splits 1/1.
        let mut planes = PlaneHash::new();
        let overlay = Overlay::default();
        let floors: Vec<Poly> = [0.0, 10.0, 20.0]
            .iter()
            .enumerate()
            .map(|(i, &z)| {
                make_poly(
                    &mut planes,
                    i as u32,
                    make_triangle([0.0, 0.0, z], [1.0, 0.0, z], [0.0, 1.0, z]),
                    Contents::SOLID,
                )
            })
            .collect();
        let middle = floors[1].planenum.canonical();
        let node = node_with(floors);

        assert_eq!(BalancedSplits.select(&node, &ctx(&planes, &overlay)), Some(middle));
    }

    #[test]
    fn ties_keep_first_candidate() {
        let mut planes = PlaneHash::new();
        let overlay = Overlay::default();
        let a = make_poly(
            &mut planes,
            0,
            make_triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            Contents::SOLID,
        );
        let b = make_poly(
            &mut planes,
            1,
            make_triangle([0.0, 0.0, 10.0], [1.0, 0.0, 10.0], [0.0, 1.0, 10.0]),
            Contents::SOLID,
        );
        let first = a.planenum.canonical();
        let node = node_with(vec![a, b]);

        assert_eq!(BalancedSplits.select(&node, &ctx(&planes, &overlay)), Some(first));
    }

    #[test]
    fn solid_class_beats_cheaper_water() {
        let mut planes = PlaneHash::new();
        let overlay = Overlay::default();
        let water = make_poly(
            &mut planes,
            0,
            make_triangle([0.0, 0.0, 5.0], [1.0, 0.0, 5.0], [0.0, 1.0, 5.0]),
            Contents::WATER,
        );
        let solid = make_poly(
            &mut planes,
            1,
            make_triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            Contents::SOLID,
        );
        let solid_plane = solid.planenum.canonical();
        let node = node_with(vec![water, solid]);

        assert_eq!(BalancedSplits.select(&node, &ctx(&planes, &overlay)), Some(solid_plane));
    }

    #[test]
    fn clip_polys_never_split() {
        let mut planes = PlaneHash::new();
        let overlay = Overlay::default();
        let clip = make_poly(
            &mut planes,
            0,
            make_triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            Contents::CLIP,
        );
        let node = node_with(vec![clip]);
        let every_class = SelectContext {
            valid_contents: Contents::all(),
            ..ctx(&planes, &overlay)
        };
        assert!(BalancedSplits.select(&node, &every_class).is_none());
    }

    #[test]
    fn splits_are_expensive() {
        // A vertical wall crossing a floor: splitting along the wall would cut
        // the floor, so the floor plane wins even though it is listed second.
        let mut planes = PlaneHash::new();
        let overlay = Overlay::default();
        let wall = make_poly(
            &mut planes,
            0,
            make_triangle([5.0, -5.0, -5.0], [5.0, 5.0, -5.0], [5.0, 0.0, 5.0]),
            Contents::SOLID,
        );
        let floor = make_poly(
            &mut planes,
            1,
            make_triangle([0.0, 0.0, -10.0], [10.0, 0.0, -10.0], [0.0, 10.0, -10.0]),
            Contents::SOLID,
        );
        let across = make_poly(
            &mut planes,
            2,
            make_triangle([0.0, -1.0, 0.0], [10.0, -1.0, 0.0], [0.0, -1.0, 1.0]),
            Contents::SOLID,
        );
        let floor_plane = floor.planenum.canonical();
        let node = node_with(vec![wall, floor, across]);

        assert_eq!(BalancedSplits.select(&node, &ctx(&planes, &overlay)), Some(floor_plane));
    }
}
