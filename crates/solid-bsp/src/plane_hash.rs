//! Canonical plane registry.
//!
//! Every plane the compiler uses is interned here and referred to by a
//! [`PlaneNum`]. Planes are stored in `(p, -p)` pairs, so flipping a plane
//! is `num ^ 1` and two fragments on the same plane (in either orientation)
//! share `num & !1`.

use std::fmt;

use nalgebra::Vector3;

use crate::Plane3D;

const NORMAL_SNAP_EPSILON: f64 = 1e-5;
const DIST_SNAP_EPSILON: f64 = 1e-4;
const NORMAL_EPSILON: f64 = 1e-6;
const DIST_EPSILON: f64 = 0.01;

const NUM_BUCKETS: usize = 4096;
const BUCKET_SIZE: f64 = 8.0;

/// Index of a plane in a [`PlaneHash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaneNum(u32);

impl PlaneNum {
    #[inline]
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// The same plane facing the other way.
    #[inline]
    pub fn opposite(self) -> Self {
        Self(self.0 ^ 1)
    }

    /// The even member of the pair; equal for a plane and its opposite.
    #[inline]
    pub fn canonical(self) -> Self {
        Self(self.0 & !1)
    }

    /// Returns the plane facing away from `side` 0 (front) or 1 (back).
    #[inline]
    pub fn with_side(self, side: usize) -> Self {
        Self(self.0 ^ (side as u32 & 1))
    }
}

impl fmt::Display for PlaneNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interning table mapping near-identical planes to one id.
#[derive(Debug, Clone)]
pub struct PlaneHash {
    planes: Vec<Plane3D>,
    buckets: Vec<Vec<PlaneNum>>,
}

impl Default for PlaneHash {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaneHash {
    pub fn new() -> Self {
        Self {
            planes: Vec::new(),
            buckets: vec![Vec::new(); NUM_BUCKETS],
        }
    }

    /// Returns the id of `plane`, interning it (and its negation) if no
    /// plane within tolerance is known yet.
    pub fn find_plane_num(&mut self, plane: &Plane3D) -> PlaneNum {
        let plane = snap_plane(plane);
        let bucket = bucket_for(plane.offset());

        for probe in [bucket + NUM_BUCKETS - 1, bucket, bucket + 1] {
            let probe = probe % NUM_BUCKETS;
            for &num in &self.buckets[probe] {
                if planes_equal(&self.planes[num.index()], &plane) {
                    return num;
                }
            }
        }

        let num = PlaneNum(self.planes.len() as u32);
        self.planes.push(plane);
        self.planes.push(plane.flipped());
        self.buckets[bucket].push(num);
        self.buckets[bucket].push(num.opposite());
        num
    }

    /// The plane stored under `num`.
    ///
    /// # Panics
    /// Panics if `num` did not come from this table.
    #[inline]
    pub fn plane(&self, num: PlaneNum) -> &Plane3D {
        &self.planes[num.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// All planes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (PlaneNum, &Plane3D)> {
        self.planes
            .iter()
            .enumerate()
            .map(|(i, p)| (PlaneNum(i as u32), p))
    }
}

fn bucket_for(offset: f64) -> usize {
    ((offset.abs() / BUCKET_SIZE).floor() as usize) % NUM_BUCKETS
}

fn planes_equal(a: &Plane3D, b: &Plane3D) -> bool {
    let (na, nb) = (a.normal(), b.normal());
    (0..3).all(|i| (na[i] - nb[i]).abs() < NORMAL_EPSILON)
        && (a.offset() - b.offset()).abs() < DIST_EPSILON
}

/// Snaps near-axial normals onto the axis and near-integer distances onto
/// the integer.
fn snap_plane(plane: &Plane3D) -> Plane3D {
    let mut normal = plane.normal();
    for i in 0..3 {
        if (normal[i] - 1.0).abs() < NORMAL_SNAP_EPSILON {
            normal = Vector3::zeros();
            normal[i] = 1.0;
            break;
        }
        if (normal[i] + 1.0).abs() < NORMAL_SNAP_EPSILON {
            normal = Vector3::zeros();
            normal[i] = -1.0;
            break;
        }
    }

    let mut offset = plane.offset();
    let rounded = offset.round();
    if (offset - rounded).abs() < DIST_SNAP_EPSILON {
        offset = rounded;
    }

    Plane3D::from_unit(normal, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn same_plane_same_id() {
        let mut hash = PlaneHash::new();
        let a = hash.find_plane_num(&Plane3D::axial(2, 64.0));
        let b = hash.find_plane_num(&Plane3D::axial(2, 64.0));
        assert_eq!(a, b);
        assert_eq!(hash.len(), 2);
    }

    #[test]
    fn negation_is_paired() {
        let mut hash = PlaneHash::new();
        let plane = Plane3D::new(Vector3::new(1.0, 2.0, 3.0), 40.0);
        let a = hash.find_plane_num(&plane);
        let b = hash.find_plane_num(&plane.flipped());
        assert_eq!(b, a.opposite());
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a.raw() % 2, 0);
    }

    #[test]
    fn near_planes_merge() {
        let mut hash = PlaneHash::new();
        let base = Plane3D::new(Vector3::new(0.6, 0.8, 0.0), 100.0);
        let a = hash.find_plane_num(&base);

        let nudged = Plane3D::from_unit(
            base.normal() + Vector3::new(5e-7, -5e-7, 0.0),
            base.offset() + 0.009,
        );
        assert_eq!(hash.find_plane_num(&nudged), a);

        let far = Plane3D::from_unit(base.normal(), base.offset() + 0.02);
        assert_ne!(hash.find_plane_num(&far).canonical(), a.canonical());
    }

    #[test]
    fn merges_across_bucket_boundary() {
        let mut hash = PlaneHash::new();
        let normal = Vector3::new(0.6, 0.8, 0.0);
        let a = hash.find_plane_num(&Plane3D::from_unit(normal, 7.996));
        let b = hash.find_plane_num(&Plane3D::from_unit(normal, 8.004));
        assert_eq!(a, b);
    }

    #[test]
    fn snaps_axial_normals_and_integer_distances() {
        let mut hash = PlaneHash::new();
        let almost = Plane3D::from_unit(Vector3::new(0.0, 0.999_999_5, 0.0), 31.999_95);
        let num = hash.find_plane_num(&almost);

        let plane = hash.plane(num);
        assert_eq!(plane.normal(), Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(plane.offset(), 32.0);

        let opposite = hash.plane(num.opposite());
        assert_approx_eq!(opposite.normal().y, -1.0);
        assert_approx_eq!(opposite.offset(), -32.0);
    }

    #[test]
    fn ids_are_dense_pairs() {
        let mut hash = PlaneHash::new();
        let ids: Vec<_> = (0..5)
            .map(|i| hash.find_plane_num(&Plane3D::axial(0, i as f64 * 16.0)))
            .collect();
        let raw: Vec<u32> = ids.iter().map(|n| n.raw()).collect();
        assert_eq!(raw, vec![0, 2, 4, 6, 8]);
        assert_eq!(hash.iter().count(), 10);
    }
}
