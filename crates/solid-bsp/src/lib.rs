//! Solid BSP map compiler.
//!
//! Turns a triangle soup scene into a BSP tree, connects its leaves with
//! portals, floods it from the entities to find leaks and the exterior, and
//! partitions the interior into areas and sectors. The result is written to
//! any [`bsp_file::BspFileBuilder`].
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::atomic::AtomicBool;
//!
//! use bsp_file::MemoryBspFile;
//! use solid_bsp::{BspBuilder, CompileConfig, Scene};
//!
//! let scene = Scene::default();
//! let materials: HashMap<String, HashMap<String, String>> = HashMap::new();
//! let map = BspBuilder::compile(&scene, &materials, &CompileConfig::default(), &AtomicBool::new(false), None)?;
//!
//! let mut file = MemoryBspFile::new();
//! map.emit(&scene, &mut file);
//! # Ok::<(), solid_bsp::CompileError>(())
//! ```

mod bounds;
mod builder;
mod config;
mod contents;
mod emit;
mod error;
mod plane;
mod plane_hash;
mod progress;
mod scene;
mod winding;

pub mod bsp;

#[cfg(test)]
mod testing;

pub use bounds::Bounds;
pub use builder::{BspBuilder, CompileJob, CompileStats, CompileStatus, CompiledMap};
pub use config::CompileConfig;
pub use contents::{Contents, Surface};
pub use emit::EmitStats;
pub use error::{CompileError, ConfigError, Result};
pub use plane::{Classification, Plane3D, PlaneSide};
pub use plane_hash::{PlaneHash, PlaneNum};
pub use progress::{CompileEvent, Phase, Progress};
pub use scene::{
    load_materials, Entity, FaceInfo, FaceRef, MaterialProperties, ModelInfo, Overlay, Scene, TriFace,
    TriModel, CONTENTS_KEY, SURFACE_KEY,
};
pub use winding::Winding;
