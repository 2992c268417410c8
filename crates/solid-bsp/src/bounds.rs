//! Axis-aligned bounding boxes.

use nalgebra::{Point3, Vector3};

use crate::{Plane3D, Winding};

/// An axis-aligned box. A freshly created box is inverted (`mins > maxs`)
/// so that the first inserted point defines it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub mins: Point3<f64>,
    pub maxs: Point3<f64>,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bounds {
    #[inline]
    pub const fn new(mins: Point3<f64>, maxs: Point3<f64>) -> Self {
        Self { mins, maxs }
    }

    /// An inverted box that contains nothing.
    pub fn empty() -> Self {
        Self {
            mins: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            maxs: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    /// Returns true until at least one point has been inserted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mins.x > self.maxs.x || self.mins.y > self.maxs.y || self.mins.z > self.maxs.z
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        let mut bounds = Self::empty();
        for p in points {
            bounds.insert_point(p);
        }
        bounds
    }

    pub fn insert_point(&mut self, p: &Point3<f64>) {
        for i in 0..3 {
            self.mins[i] = self.mins[i].min(p[i]);
            self.maxs[i] = self.maxs[i].max(p[i]);
        }
    }

    pub fn insert(&mut self, other: &Bounds) {
        if other.is_empty() {
            return;
        }
        self.insert_point(&other.mins);
        self.insert_point(&other.maxs);
    }

    #[inline]
    pub fn size(&self) -> Vector3<f64> {
        self.maxs - self.mins
    }

    /// Center of the box.
    #[inline]
    pub fn origin(&self) -> Point3<f64> {
        Point3::from((self.mins.coords + self.maxs.coords) * 0.5)
    }

    /// Grows the box by `amount` on every side.
    pub fn expand(&mut self, amount: f64) {
        let delta = Vector3::repeat(amount);
        self.mins -= delta;
        self.maxs += delta;
    }

    /// The six planes of the box, facing outward, ordered -X, +X, -Y, +Y, -Z, +Z.
    pub fn planes(&self) -> [Plane3D; 6] {
        let mut planes = [Plane3D::axial(0, 0.0); 6];
        for axis in 0..3 {
            planes[axis * 2] = Plane3D::axial(axis, self.mins[axis]).flipped();
            planes[axis * 2 + 1] = Plane3D::axial(axis, self.maxs[axis]);
        }
        planes
    }

    /// One winding per face of the box, in the same order as [`Bounds::planes`].
    /// Each winding lies on its outward plane.
    pub fn face_windings(&self, extent: f64) -> Vec<Winding> {
        let planes = self.planes();
        let mut out = Vec::with_capacity(6);

        for (i, plane) in planes.iter().enumerate() {
            let mut winding = Winding::base(plane, extent);
            // Clip by the four planes of the other two axes.
            for y in 0..4 {
                let z = ((i / 2 * 2) + y + 2) % 6;
                winding = winding.chop_back(&planes[z], 0.0);
            }
            out.push(winding);
        }

        out
    }

    /// Converts to the single precision arrays used by the file records.
    pub fn to_f32(&self) -> ([f32; 3], [f32; 3]) {
        if self.is_empty() {
            return ([0.0; 3], [0.0; 3]);
        }
        (
            [self.mins.x as f32, self.mins.y as f32, self.mins.z as f32],
            [self.maxs.x as f32, self.maxs.y as f32, self.maxs.z as f32],
        )
    }
}
