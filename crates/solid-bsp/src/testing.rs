//! Box room fixtures for tests.

use std::collections::HashMap;

use nalgebra::Point3;

use crate::scene::{load_materials, Entity, Overlay, Scene, TriFace, TriModel, CONTENTS_KEY, SURFACE_KEY};

pub(crate) const WALL: u32 = 0;
pub(crate) const PORTAL: u32 = 1;
pub(crate) const WATER: u32 = 2;
pub(crate) const NODRAW: u32 = 3;
pub(crate) const CLIP: u32 = 4;

/// Index into the box corner table: bit 0 picks x, bit 1 y, bit 2 z.
const BOX_FACES: [[usize; 4]; 6] = [
    [0, 2, 6, 4], // -X, facing +X
    [1, 5, 7, 3], // +X, facing -X
    [0, 4, 5, 1], // -Y, facing +Y
    [2, 3, 7, 6], // +Y, facing -Y
    [0, 1, 3, 2], // -Z, facing +Z
    [4, 6, 7, 5], // +Z, facing -Z
];

pub(crate) fn materials() -> HashMap<String, HashMap<String, String>> {
    let mut table = HashMap::new();
    for (name, contents, surface) in [
        ("wall", "Solid", None),
        ("portal", "Areaportal", None),
        ("water", "Water", None),
        ("nodraw", "Solid", Some("NoDraw")),
        ("clip", "Clip", None),
    ] {
        let mut props = HashMap::new();
        props.insert(CONTENTS_KEY.to_string(), contents.to_string());
        if let Some(surface) = surface {
            props.insert(SURFACE_KEY.to_string(), surface.to_string());
        }
        table.insert(name.to_string(), props);
    }
    table
}

/// Routes `log` output to the test harness. Safe to call more than once.
pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
    Point3::new(x, y, z)
}

/// A model made of quads, two triangles each, facing by the right hand rule.
pub(crate) fn quads_model(id: u32, quads: &[[Point3<f64>; 4]], material: u32) -> TriModel {
    let mut vertices = Vec::with_capacity(quads.len() * 4);
    let mut tris = Vec::with_capacity(quads.len() * 2);
    for quad in quads {
        let base = vertices.len() as u32;
        vertices.extend_from_slice(quad);
        tris.push(TriFace {
            v: [base, base + 1, base + 2],
            material: Some(material),
        });
        tris.push(TriFace {
            v: [base, base + 2, base + 3],
            material: Some(material),
        });
    }
    TriModel {
        id,
        name: format!("model{id}"),
        vertices,
        tris,
        ..TriModel::default()
    }
}

fn box_quads(mins: Point3<f64>, maxs: Point3<f64>, skip: &[usize]) -> Vec<[Point3<f64>; 4]> {
    let corner = |i: usize| {
        p(
            if i & 1 != 0 { maxs.x } else { mins.x },
            if i & 2 != 0 { maxs.y } else { mins.y },
            if i & 4 != 0 { maxs.z } else { mins.z },
        )
    };
    BOX_FACES
        .iter()
        .enumerate()
        .filter(|(i, _)| !skip.contains(i))
        .map(|(_, face)| face.map(corner))
        .collect()
}

/// The walls of a box, facing inward. `skip` lists faces to leave out, in
/// the order -X, +X, -Y, +Y, -Z, +Z.
pub(crate) fn box_room(id: u32, mins: Point3<f64>, maxs: Point3<f64>, skip: &[usize]) -> TriModel {
    quads_model(id, &box_quads(mins, maxs, skip), WALL)
}

/// A closed box facing outward, filling its volume with `material`.
pub(crate) fn brush(id: u32, mins: Point3<f64>, maxs: Point3<f64>, material: u32) -> TriModel {
    let mut quads = box_quads(mins, maxs, &[]);
    for quad in &mut quads {
        quad.reverse();
    }
    quads_model(id, &quads, material)
}

pub(crate) fn entity(id: u32, origin: Point3<f64>) -> Entity {
    Entity {
        id,
        name: format!("entity{id}"),
        classname: "info_player_start".into(),
        origin,
        sky: false,
    }
}

pub(crate) fn scene(models: Vec<TriModel>, entities: Vec<Entity>) -> Scene {
    Scene {
        materials: ["wall", "portal", "water", "nodraw", "clip"]
            .into_iter()
            .map(String::from)
            .collect(),
        models,
        entities,
    }
}

pub(crate) fn overlay(scene: &Scene) -> Overlay {
    load_materials(scene, &materials()).unwrap()
}

/// A closed 256 unit cube with one entity in the middle.
pub(crate) fn sealed_room() -> Scene {
    scene(
        vec![box_room(0, p(0.0, 0.0, 0.0), p(256.0, 256.0, 256.0), &[])],
        vec![entity(1, p(128.0, 128.0, 128.0))],
    )
}

/// [`sealed_room`] with a pool of water floating in its lower half, from
/// (64, 64, 16) to (192, 192, 96).
pub(crate) fn water_room() -> Scene {
    let mut scene = sealed_room();
    scene
        .models
        .push(brush(1, p(64.0, 64.0, 16.0), p(192.0, 192.0, 96.0), WATER));
    scene
}

/// [`sealed_room`] without its ceiling.
pub(crate) fn leaky_room() -> Scene {
    scene(
        vec![box_room(0, p(0.0, 0.0, 0.0), p(256.0, 256.0, 256.0), &[5])],
        vec![entity(1, p(128.0, 128.0, 128.0))],
    )
}

/// A 512x256x256 hall cut in two by an areaportal slab between x = 252
/// and x = 260, with an entity in the left half.
pub(crate) fn split_rooms() -> Scene {
    let slab = [
        // x = 252, facing -X
        [p(252.0, 0.0, 0.0), p(252.0, 0.0, 256.0), p(252.0, 256.0, 256.0), p(252.0, 256.0, 0.0)],
        // x = 260, facing +X
        [p(260.0, 0.0, 0.0), p(260.0, 256.0, 0.0), p(260.0, 256.0, 256.0), p(260.0, 0.0, 256.0)],
    ];
    scene(
        vec![
            box_room(0, p(0.0, 0.0, 0.0), p(512.0, 256.0, 256.0), &[]),
            quads_model(1, &slab, PORTAL),
        ],
        vec![entity(2, p(128.0, 128.0, 128.0))],
    )
}
