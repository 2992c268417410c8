//! Plane representation and classification.

use std::ops::Neg;

use nalgebra::{Point3, Vector3};

use crate::Bounds;

/// Which side of a plane a point lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    /// Point is in front of the plane (positive side of normal)
    Front,
    /// Point is behind the plane (negative side of normal)
    Back,
    /// Point lies on the plane (within epsilon tolerance)
    OnPlane,
}

/// Classification of geometry (winding, bounding box) relative to a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Nothing behind the plane, something in front
    Front,
    /// Nothing in front of the plane, something behind
    Back,
    /// Everything lies on the plane within tolerance
    Coplanar,
    /// Geometry on both sides (crosses the plane)
    Spanning,
}

/// A plane in 3D space, represented as `normal · point = offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane3D {
    normal: Vector3<f64>,
    offset: f64,
}

impl Plane3D {
    /// Creates a new plane from a normal vector and offset.
    /// The normal will be normalized automatically.
    ///
    /// # Panics
    /// Panics if the normal vector has zero length.
    pub fn new(normal: Vector3<f64>, offset: f64) -> Self {
        let norm = normal.norm();
        assert!(norm > f64::EPSILON, "Plane normal cannot be zero");
        Self {
            normal: normal / norm,
            offset: offset / norm,
        }
    }

    /// Creates a plane from a normal that is already unit length, without renormalizing.
    #[inline]
    pub(crate) fn from_unit(normal: Vector3<f64>, offset: f64) -> Self {
        Self { normal, offset }
    }

    /// Creates a plane from three points.
    /// The normal direction follows the right-hand rule: (b - a) × (c - a).
    ///
    /// Returns `None` if the points are collinear (or nearly so).
    pub fn from_three_points(a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a));
        let norm = normal.norm();
        if norm <= f64::EPSILON {
            return None;
        }
        let unit_normal = normal / norm;
        Some(Self {
            normal: unit_normal,
            offset: unit_normal.dot(&a.coords),
        })
    }

    /// The +X, +Y or +Z plane through `offset` along that axis.
    pub fn axial(axis: usize, offset: f64) -> Self {
        let mut normal = Vector3::zeros();
        normal[axis] = 1.0;
        Self { normal, offset }
    }

    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.normal
    }

    /// Signed distance from the origin to the plane along the normal.
    #[inline]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Computes the signed distance from a point to the plane.
    /// - Positive: point is in front (same side as normal)
    /// - Negative: point is behind (opposite side from normal)
    #[inline]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) - self.offset
    }

    /// Classifies which side of the plane a point lies on.
    pub fn classify_point(&self, point: &Point3<f64>, epsilon: f64) -> PlaneSide {
        let dist = self.signed_distance(point);
        if dist > epsilon {
            PlaneSide::Front
        } else if dist < -epsilon {
            PlaneSide::Back
        } else {
            PlaneSide::OnPlane
        }
    }

    /// Classifies an axis-aligned box against the plane.
    ///
    /// A box that merely touches the plane from one side is classified to
    /// that side. A flat box lying in the plane is `Coplanar`.
    pub fn classify_bounds(&self, bounds: &Bounds, epsilon: f64) -> Classification {
        let center = bounds.origin();
        let half = bounds.size() * 0.5;
        let radius = self.normal.x.abs() * half.x
            + self.normal.y.abs() * half.y
            + self.normal.z.abs() * half.z;
        let dist = self.signed_distance(&center);

        let front = dist + radius > epsilon;
        let back = dist - radius < -epsilon;

        match (front, back) {
            (true, false) => Classification::Front,
            (false, true) => Classification::Back,
            (true, true) => Classification::Spanning,
            (false, false) => Classification::Coplanar,
        }
    }

    /// Returns a new plane with the normal flipped (facing the opposite direction).
    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// Returns two unit vectors spanning the plane, `(up, right)`.
    ///
    /// `up` is the world axis least aligned with the normal, projected onto
    /// the plane; `right = normal × up`.
    pub fn frame_vectors(&self) -> (Vector3<f64>, Vector3<f64>) {
        let n = self.normal;
        let mut axis = 0;
        let mut least = n.x.abs();
        for i in 1..3 {
            if n[i].abs() < least {
                least = n[i].abs();
                axis = i;
            }
        }

        let mut up = Vector3::zeros();
        up[axis] = 1.0;
        let up = (up - n * up.dot(&n)).normalize();
        let right = n.cross(&up);
        (up, right)
    }
}

impl Neg for Plane3D {
    type Output = Plane3D;

    fn neg(self) -> Self::Output {
        self.flipped()
    }
}

/// Point where the segment `a -> b` crosses the plane, given both endpoints'
/// signed distances.
#[inline]
pub(crate) fn intersect_with_distances(
    a: &Point3<f64>,
    dist_a: f64,
    b: &Point3<f64>,
    dist_b: f64,
) -> Point3<f64> {
    let t = dist_a / (dist_a - dist_b);
    a + (b - a) * t
}
