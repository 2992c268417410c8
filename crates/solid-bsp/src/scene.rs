//! Scene input and the per-face classification overlay.
//!
//! A [`Scene`] is plain input data: worldspawn triangle models, point
//! entities and material names. Everything the compiler learns about the
//! geometry (contents, which faces face the outside, which areas a face
//! touches) lives in an [`Overlay`] keyed by [`FaceRef`], so the scene
//! itself is never mutated.

use std::collections::HashMap;

use log::warn;
use nalgebra::Point3;
use smallvec::SmallVec;

use crate::bsp::AreaId;
use crate::{Bounds, CompileError, Contents, Plane3D, Surface};

/// Material property holding the contents class.
pub const CONTENTS_KEY: &str = "BSP.Contents";
/// Material property holding surface flags.
pub const SURFACE_KEY: &str = "BSP.Surface";

#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Material names, indexed by [`TriFace::material`].
    pub materials: Vec<String>,
    /// Worldspawn geometry.
    pub models: Vec<TriModel>,
    /// Point entities; each one may seed the flood fill.
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, Default)]
pub struct TriModel {
    pub id: u32,
    pub name: String,
    pub vertices: Vec<Point3<f64>>,
    pub tris: Vec<TriFace>,
    /// Animated geometry, excluded from the tree.
    pub cinematic: bool,
    pub sky: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriFace {
    pub v: [u32; 3],
    pub material: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct Entity {
    pub id: u32,
    pub name: String,
    pub classname: String,
    pub origin: Point3<f64>,
    /// Sky entities never seed the flood fill.
    pub sky: bool,
}

/// Identifies one source triangle: `scene.models[model].tris[tri]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceRef {
    pub model: u32,
    pub tri: u32,
}

impl FaceRef {
    #[inline]
    pub fn new(model: usize, tri: usize) -> Self {
        Self {
            model: model as u32,
            tri: tri as u32,
        }
    }
}

impl Scene {
    /// The three corners of a face.
    ///
    /// # Panics
    /// Panics if the face or its vertex indices are out of range. Faces that
    /// passed [`load_materials`] without being ignored are always valid.
    pub fn face_points(&self, face: FaceRef) -> [Point3<f64>; 3] {
        let model = &self.models[face.model as usize];
        let tri = &model.tris[face.tri as usize];
        tri.v.map(|v| model.vertices[v as usize])
    }

    pub fn material_name(&self, face: FaceRef) -> Option<&str> {
        let tri = &self.models[face.model as usize].tris[face.tri as usize];
        tri.material
            .and_then(|m| self.materials.get(m as usize))
            .map(String::as_str)
    }
}

/// String keyed material metadata lookup.
pub trait MaterialProperties {
    /// Returns the value of `key` for `material`, or `None` if either the
    /// material or the key is unknown.
    fn property(&self, material: &str, key: &str) -> Option<&str>;
}

impl MaterialProperties for HashMap<String, HashMap<String, String>> {
    fn property(&self, material: &str, key: &str) -> Option<&str> {
        self.get(material)
            .and_then(|props| props.get(key))
            .map(String::as_str)
    }
}

/// What the compiler knows about a single source triangle.
#[derive(Debug, Clone, Default)]
pub struct FaceInfo {
    pub contents: Contents,
    pub surface: Surface,
    /// Excluded from every phase.
    pub ignore: bool,
    /// Not visible from any occupied leaf.
    pub outside: bool,
    pub plane: Option<Plane3D>,
    /// Areas the face was decomposed into, without duplicates.
    pub areas: SmallVec<[AreaId; 2]>,
}

/// What the compiler knows about a source model.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub contents: Contents,
    pub ignore: bool,
    pub outside: bool,
    pub bounds: Bounds,
    /// Areas on either side of an areaportal model.
    pub portal_areas: [Option<AreaId>; 2],
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            contents: Contents::empty(),
            ignore: false,
            outside: false,
            bounds: Bounds::empty(),
            portal_areas: [None, None],
        }
    }
}

/// Classification overlay for a [`Scene`], indexed like the scene.
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    pub models: Vec<ModelInfo>,
    pub faces: Vec<Vec<FaceInfo>>,
}

impl Overlay {
    #[inline]
    pub fn face(&self, face: FaceRef) -> &FaceInfo {
        &self.faces[face.model as usize][face.tri as usize]
    }

    #[inline]
    pub fn face_mut(&mut self, face: FaceRef) -> &mut FaceInfo {
        &mut self.faces[face.model as usize][face.tri as usize]
    }

    #[inline]
    pub fn model(&self, model: u32) -> &ModelInfo {
        &self.models[model as usize]
    }

    #[inline]
    pub fn model_mut(&mut self, model: u32) -> &mut ModelInfo {
        &mut self.models[model as usize]
    }

    /// Every face of every model, in scene order.
    pub fn face_refs(&self) -> impl Iterator<Item = FaceRef> + '_ {
        self.faces.iter().enumerate().flat_map(|(m, faces)| {
            (0..faces.len()).map(move |t| FaceRef::new(m, t))
        })
    }
}

/// Resolves material metadata for every face and builds the overlay.
///
/// Faces without a material discard their whole model; degenerate or
/// malformed triangles are ignored individually. Missing metadata and models
/// mixing contents classes are fatal.
pub fn load_materials(
    scene: &Scene,
    materials: &dyn MaterialProperties,
) -> Result<Overlay, CompileError> {
    let mut overlay = Overlay {
        models: Vec::with_capacity(scene.models.len()),
        faces: Vec::with_capacity(scene.models.len()),
    };

    for model in &scene.models {
        let mut info = ModelInfo::default();
        let mut faces = vec![FaceInfo::default(); model.tris.len()];

        for (tri, face) in model.tris.iter().zip(faces.iter_mut()) {
            let Some(material) = tri.material else {
                warn!(
                    "model {} has a face or faces without a material, this model will be discarded",
                    model.id
                );
                info.ignore = true;
                break;
            };

            let name = scene
                .materials
                .get(material as usize)
                .map(String::as_str)
                .unwrap_or_default();
            let contents = materials
                .property(name, CONTENTS_KEY)
                .ok_or_else(|| CompileError::MissingMaterialMetadata {
                    material: name.to_string(),
                    key: CONTENTS_KEY,
                })?;
            let contents = Contents::from_material_str(contents);

            if info.contents.is_empty() {
                info.contents = contents;
            } else if info.contents != contents {
                return Err(CompileError::MixedContents {
                    model: model.id,
                    material: name.to_string(),
                });
            }

            face.contents = contents;
            face.surface = materials
                .property(name, SURFACE_KEY)
                .map(Surface::from_material_str)
                .unwrap_or_default();

            let Some(points) = triangle_points(model, tri) else {
                warn!("model {} has a face with an invalid vertex index, ignoring it", model.id);
                face.ignore = true;
                continue;
            };
            match Plane3D::from_three_points(points[0], points[1], points[2]) {
                Some(plane) => {
                    face.plane = Some(plane);
                    for p in &points {
                        info.bounds.insert_point(p);
                    }
                }
                None => {
                    warn!("model {} has a degenerate triangle, ignoring it", model.id);
                    face.ignore = true;
                }
            }
        }

        overlay.models.push(info);
        overlay.faces.push(faces);
    }

    Ok(overlay)
}

fn triangle_points(model: &TriModel, tri: &TriFace) -> Option<[Point3<f64>; 3]> {
    let a = *model.vertices.get(tri.v[0] as usize)?;
    let b = *model.vertices.get(tri.v[1] as usize)?;
    let c = *model.vertices.get(tri.v[2] as usize)?;
    Some([a, b, c])
}
