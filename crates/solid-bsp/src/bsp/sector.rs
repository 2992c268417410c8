//! Sectors: axis aligned subdivisions of the visible geometry, used for
//! streaming and culling.
//!
//! Each area's private triangles are bisected until no axis of a sector is
//! wider than [`CompileConfig::max_sector_size`]. Triangles seen from more
//! than one area go through the same subdivision separately, and the
//! resulting sectors are shared by all of those areas.

use log::info;
use smallvec::SmallVec;

use crate::scene::{FaceRef, Overlay, Scene};
use crate::{Bounds, Classification, CompileConfig, Contents, Plane3D, Progress, Surface, Winding};

use super::{Area, AreaId, SectorId};

/// A triangle, or the piece of it that fell into a sector.
#[derive(Debug, Clone)]
pub struct SectorPoly {
    pub face: FaceRef,
    pub winding: Winding,
    /// Plane of the source triangle.
    pub plane: Plane3D,
}

#[derive(Debug, Clone)]
pub struct Sector {
    pub bounds: Bounds,
    /// Every area one of the sector's triangles was decomposed into.
    pub areas: SmallVec<[AreaId; 2]>,
    pub polys: Vec<SectorPoly>,
}

impl Sector {
    fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            areas: SmallVec::new(),
            polys: Vec::new(),
        }
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.areas.len() > 1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectorStats {
    /// Sectors belonging to a single area.
    pub sectors: usize,
    pub shared_sectors: usize,
    /// Triangle fragments across all sectors.
    pub tris: usize,
}

/// Subdivides the decomposed geometry of every area into sectors.
///
/// Sector ids are appended to [`Area::sectors`] of each area they touch, and
/// each area's bounds are recomputed from the triangles it owns alone.
pub fn build_sectors(
    scene: &Scene,
    overlay: &Overlay,
    areas: &mut [Area],
    config: &CompileConfig,
    progress: &mut Progress,
) -> (Vec<Sector>, SectorStats) {
    let mut sectorizer = Sectorizer {
        overlay,
        config,
        sectors: Vec::new(),
        stats: SectorStats::default(),
    };

    for area in areas.iter_mut() {
        let mut bounds = Bounds::empty();
        let mut polys = Vec::new();
        for &face in &area.tris {
            let info = overlay.face(face);
            if info.surface.contains(Surface::NO_DRAW) || info.areas.len() != 1 {
                continue;
            }
            if let Some(poly) = sector_poly(scene, overlay, face, &mut bounds) {
                polys.push(poly);
            }
        }
        area.bounds = bounds;
        sectorizer.subdivide(bounds, polys, Some(area.id), progress);
    }

    let mut bounds = Bounds::empty();
    let mut polys = Vec::new();
    for (m, model) in overlay.models.iter().enumerate() {
        if model.ignore
            || !model.contents.intersects(Contents::VISIBLE)
            || model.contents.contains(Contents::AREAPORTAL)
        {
            continue;
        }
        for (t, info) in overlay.faces[m].iter().enumerate() {
            if info.surface.contains(Surface::NO_DRAW) || info.areas.len() < 2 {
                continue;
            }
            if let Some(poly) = sector_poly(scene, overlay, FaceRef::new(m, t), &mut bounds) {
                polys.push(poly);
            }
        }
    }
    sectorizer.subdivide(bounds, polys, None, progress);

    let Sectorizer { sectors, stats, .. } = sectorizer;
    for (i, sector) in sectors.iter().enumerate() {
        for area in &sector.areas {
            if let Some(area) = areas.get_mut(area.index()) {
                area.sectors.push(SectorId::new(i));
            }
        }
    }

    info!(
        "Sectors (area/shared/total): {}/{}/{}",
        stats.sectors,
        stats.shared_sectors,
        stats.sectors + stats.shared_sectors
    );
    for area in areas.iter() {
        info!("Area ({}): {} sector(s), {} tri(s)", area.id, area.sectors.len(), area.tris.len());
    }
    info!("{} tri(s) in {} area(s)", stats.tris, areas.len());

    (sectors, stats)
}

fn sector_poly(scene: &Scene, overlay: &Overlay, face: FaceRef, bounds: &mut Bounds) -> Option<SectorPoly> {
    let plane = overlay.face(face).plane?;
    let [a, b, c] = scene.face_points(face);
    for p in [&a, &b, &c] {
        bounds.insert_point(p);
    }
    Some(SectorPoly {
        face,
        winding: Winding::from_triangle(a, b, c),
        plane,
    })
}

struct Sectorizer<'a> {
    overlay: &'a Overlay,
    config: &'a CompileConfig,
    sectors: Vec<Sector>,
    stats: SectorStats,
}

impl Sectorizer<'_> {
    /// Bisects `polys` through the middle of the first axis wider than the
    /// sector limit, front half first, and keeps every non-empty result.
    fn subdivide(&mut self, bounds: Bounds, polys: Vec<SectorPoly>, area: Option<AreaId>, progress: &mut Progress) {
        let mut root = Sector::new(bounds);
        root.polys = polys;
        root.areas.extend(area);
        let mut stack = vec![root];

        while let Some(sector) = stack.pop() {
            let size = sector.bounds.size();
            let Some(axis) = (0..3).find(|&i| size[i] > self.config.max_sector_size) else {
                self.finish(sector, progress);
                continue;
            };

            let center = sector.bounds.origin()[axis];
            let plane = Plane3D::axial(axis, center);
            let mut front = Sector::new(sector.bounds);
            front.bounds.mins[axis] = center;
            let mut back = Sector::new(sector.bounds);
            back.bounds.maxs[axis] = center;

            self.split(&plane, sector.polys, &mut front, &mut back);

            match (front.polys.is_empty(), back.polys.is_empty()) {
                (true, _) => stack.push(back),
                (false, true) => stack.push(front),
                (false, false) => {
                    stack.push(back);
                    stack.push(front);
                }
            }
        }
    }

    fn split(&self, plane: &Plane3D, polys: Vec<SectorPoly>, front: &mut Sector, back: &mut Sector) {
        for poly in polys {
            match poly.winding.classify(plane, self.config.sector_epsilon) {
                Classification::Front => front.polys.push(poly),
                Classification::Back => back.polys.push(poly),
                Classification::Spanning => {
                    let (f, b) = poly.winding.split(plane, 0.0);
                    if !f.is_empty() {
                        front.polys.push(SectorPoly { winding: f, ..poly.clone() });
                    }
                    if !b.is_empty() {
                        back.polys.push(SectorPoly { winding: b, ..poly });
                    }
                }
                Classification::Coplanar => match poly.winding.major_side(plane, 0.0) {
                    Classification::Front => front.polys.push(poly),
                    Classification::Back => back.polys.push(poly),
                    _ => {
                        if plane.normal().dot(&poly.plane.normal()) > 0.0 {
                            front.polys.push(poly);
                        } else {
                            back.polys.push(poly);
                        }
                    }
                },
            }
        }
    }

    fn finish(&mut self, mut sector: Sector, progress: &mut Progress) {
        if sector.polys.is_empty() {
            return;
        }

        for poly in &sector.polys {
            for &area in &self.overlay.face(poly.face).areas {
                if !sector.areas.contains(&area) {
                    sector.areas.push(area);
                }
            }
        }

        self.stats.tris += sector.polys.len();
        if sector.is_shared() {
            self.stats.shared_sectors += 1;
        } else {
            self.stats.sectors += 1;
        }
        progress.tick();
        self.sectors.push(sector);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::{decompose_area_models, BspTree, BuildContext, FloodOutcome};
    use crate::testing::{self, p};
    use crate::PlaneHash;

    struct Decomposed {
        scene: Scene,
        overlay: Overlay,
        areas: Vec<Area>,
    }

    fn decomposed(scene: Scene) -> Decomposed {
        let mut overlay = testing::overlay(&scene);
        let config = CompileConfig::default();
        let mut planes = PlaneHash::new();
        let mut progress = Progress::silent();
        let ctx = BuildContext {
            scene: &scene,
            overlay: &overlay,
            config: &config,
            flooded: false,
        };
        let mut tree = BspTree::build(&ctx, &mut planes, &mut progress).unwrap();
        tree.portalize(&mut planes, &config, &mut progress);
        assert_eq!(tree.flood_fill(&scene, &planes, &mut progress), FloodOutcome::Sealed);
        tree.fill_outside(&scene, &mut overlay);
        let mut areas = tree.find_areas(&scene, true, config.max_areas).unwrap();
        decompose_area_models(&tree, &scene, &mut overlay, &mut planes, &mut areas, true, &mut progress);
        Decomposed { scene, overlay, areas }
    }

    fn sectorize(d: &mut Decomposed) -> (Vec<Sector>, SectorStats) {
        build_sectors(
            &d.scene,
            &d.overlay,
            &mut d.areas,
            &CompileConfig::default(),
            &mut Progress::silent(),
        )
    }

    #[test]
    fn small_room_is_one_sector() {
        let mut d = decomposed(testing::sealed_room());
        let (sectors, stats) = sectorize(&mut d);

        assert_eq!(stats, SectorStats { sectors: 1, shared_sectors: 0, tris: 12 });
        assert_eq!(sectors[0].areas.as_slice(), &[AreaId::new(1)]);
        assert!(d.areas[0].sectors.is_empty());
        assert!(d.areas[0].bounds.is_empty());
        assert_eq!(d.areas[1].sectors, vec![SectorId::new(0)]);
        assert_eq!(d.areas[1].bounds, Bounds::new(p(0.0, 0.0, 0.0), p(256.0, 256.0, 256.0)));
    }

    #[test]
    fn triangles_seen_from_two_areas_share_a_sector() {
        let mut d = decomposed(testing::split_rooms());
        let (sectors, stats) = sectorize(&mut d);

        // End walls belong to one room each, the long walls to both.
        assert_eq!(stats, SectorStats { sectors: 2, shared_sectors: 1, tris: 12 });
        let shared = &sectors[2];
        assert!(shared.is_shared());
        assert_eq!(shared.polys.len(), 8);
        assert_eq!(d.areas[1].sectors, vec![SectorId::new(0), SectorId::new(2)]);
        assert_eq!(d.areas[2].sectors, vec![SectorId::new(1), SectorId::new(2)]);
    }

    #[test]
    fn long_hall_is_bisected() {
        let scene = testing::scene(
            vec![testing::box_room(0, p(0.0, 0.0, 0.0), p(1024.0, 256.0, 256.0), &[])],
            vec![testing::entity(1, p(128.0, 128.0, 128.0))],
        );
        let mut d = decomposed(scene);
        let (sectors, stats) = sectorize(&mut d);

        assert_eq!(stats.sectors, 2);
        assert_eq!(stats.tris, 20);
        // Front half first.
        assert_eq!(sectors[0].bounds.mins.x, 512.0);
        assert_eq!(sectors[1].bounds.maxs.x, 512.0);
        for sector in &sectors {
            assert_eq!(sector.polys.len(), 10);
            for poly in &sector.polys {
                let bounds = poly.winding.bounds();
                assert!(bounds.mins.x >= sector.bounds.mins.x && bounds.maxs.x <= sector.bounds.maxs.x);
            }
        }
    }

    #[test]
    fn nodraw_faces_are_left_out() {
        let mut scene = testing::sealed_room();
        for tri in &mut scene.models[0].tris[..2] {
            tri.material = Some(testing::NODRAW);
        }
        let mut d = decomposed(scene);
        let (_, stats) = sectorize(&mut d);
        assert_eq!(stats.tris, 10);
    }
}
