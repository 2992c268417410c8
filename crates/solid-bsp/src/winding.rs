//! Convex polygon windings and plane clipping.

use nalgebra::{Point3, Vector3};

use crate::plane::intersect_with_distances;
use crate::{Bounds, Classification, Plane3D, PlaneSide};

/// A convex polygon in 3D space, defined by an ordered list of vertices.
///
/// Vertices are coplanar and wound counter-clockwise when viewed from the
/// front. A winding may be empty: clipping reports "nothing on this side"
/// by returning an empty winding rather than `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Winding {
    points: Vec<Point3<f64>>,
}

impl Winding {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    pub fn from_triangle(a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> Self {
        Self {
            points: vec![a, b, c],
        }
    }

    /// A square lying on `plane`, centred on the point of the plane closest to
    /// the origin, reaching `half_size` along both frame vectors.
    ///
    /// Used as the unclipped starting polygon for portals and box faces.
    pub fn base(plane: &Plane3D, half_size: f64) -> Self {
        let org = Point3::from(plane.normal() * plane.offset());
        let (up, right) = plane.frame_vectors();
        let r = right * half_size;
        let u = up * half_size;

        Self {
            points: vec![org + r + u, org + r - u, org - r - u, org - r + u],
        }
    }

    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Average of the vertices.
    pub fn center(&self) -> Point3<f64> {
        if self.points.is_empty() {
            return Point3::origin();
        }
        let sum: Vector3<f64> = self.points.iter().map(|p| p.coords).sum();
        Point3::from(sum / self.points.len() as f64)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(&self.points)
    }

    /// Classifies this winding relative to a plane.
    ///
    /// Returns:
    /// - `Front` if no vertex is behind the plane and at least one is in front
    /// - `Back` if no vertex is in front of the plane and at least one is behind
    /// - `Coplanar` if all vertices lie on the plane
    /// - `Spanning` if vertices are on both sides
    pub fn classify(&self, plane: &Plane3D, epsilon: f64) -> Classification {
        let mut front = false;
        let mut back = false;

        for p in &self.points {
            match plane.classify_point(p, epsilon) {
                PlaneSide::Front => front = true,
                PlaneSide::Back => back = true,
                PlaneSide::OnPlane => {}
            }
            if front && back {
                return Classification::Spanning;
            }
        }

        match (front, back) {
            (true, false) => Classification::Front,
            (false, true) => Classification::Back,
            _ => Classification::Coplanar,
        }
    }

    /// The side holding the vertex farthest from the plane, or `Coplanar`
    /// if that distance is below `epsilon`.
    pub fn major_side(&self, plane: &Plane3D, epsilon: f64) -> Classification {
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        for p in &self.points {
            let d = plane.signed_distance(p);
            min = min.min(d);
            max = max.max(d);
        }
        if self.points.is_empty() {
            return Classification::Coplanar;
        }

        let side = if min.abs() > max.abs() { min } else { max };
        if side.abs() >= epsilon {
            if side > 0.0 {
                return Classification::Front;
            }
            if side < 0.0 {
                return Classification::Back;
            }
        }
        Classification::Coplanar
    }

    /// Splits the winding by a plane, returning `(front, back)`.
    ///
    /// - every vertex within `epsilon`: both results are empty
    /// - no vertex behind: the whole winding is in front
    /// - no vertex in front: the whole winding is behind
    /// - otherwise the winding is cut; vertices on the plane go to both halves
    pub fn split(&self, plane: &Plane3D, epsilon: f64) -> (Winding, Winding) {
        let n = self.points.len();
        if n == 0 {
            return (Winding::default(), Winding::default());
        }

        let dists: Vec<f64> = self.points.iter().map(|p| plane.signed_distance(p)).collect();
        let sides: Vec<PlaneSide> = dists
            .iter()
            .map(|&d| {
                if d > epsilon {
                    PlaneSide::Front
                } else if d < -epsilon {
                    PlaneSide::Back
                } else {
                    PlaneSide::OnPlane
                }
            })
            .collect();

        let fronts = sides.iter().filter(|s| **s == PlaneSide::Front).count();
        let backs = sides.iter().filter(|s| **s == PlaneSide::Back).count();

        if fronts == 0 && backs == 0 {
            return (Winding::default(), Winding::default());
        }
        if backs == 0 {
            return (self.clone(), Winding::default());
        }
        if fronts == 0 {
            return (Winding::default(), self.clone());
        }

        let mut front = Vec::with_capacity(n + 1);
        let mut back = Vec::with_capacity(n + 1);

        for i in 0..n {
            let current = self.points[i];
            match sides[i] {
                PlaneSide::Front => front.push(current),
                PlaneSide::Back => back.push(current),
                PlaneSide::OnPlane => {
                    front.push(current);
                    back.push(current);
                    continue;
                }
            }

            let next = (i + 1) % n;
            if sides[next] != PlaneSide::OnPlane && sides[next] != sides[i] {
                let mid = intersect_with_distances(&current, dists[i], &self.points[next], dists[next]);
                front.push(mid);
                back.push(mid);
            }
        }

        (Winding::new(front), Winding::new(back))
    }

    /// Keeps only the part of the winding behind the plane.
    pub fn chop_back(&self, plane: &Plane3D, epsilon: f64) -> Winding {
        self.split(plane, epsilon).1
    }
}
