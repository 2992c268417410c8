//! The compile pipeline and the background job that runs it.
//!
//! [`BspBuilder::compile`] runs every phase in order on the calling thread.
//! [`CompileJob`] runs the same pipeline on a worker thread; the caller polls
//! it and receives phase and progress notifications over a channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use log::{error, info};
use parking_lot::Mutex;

use crate::bsp::{
    build_sectors, decompose_area_models, Area, BspTree, BuildContext, FillStats, FloodOutcome,
    LeakTrail, Sector,
};
use crate::scene::{load_materials, MaterialProperties, Overlay, Scene};
use crate::{CompileConfig, CompileError, CompileEvent, Phase, PlaneHash, Progress, Result};

/// Counters gathered over a whole compile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub structural_tris: usize,
    pub detail_tris: usize,
    pub nodes: usize,
    pub leafs: usize,
    pub dropped_polys: usize,
    pub portal_splits: usize,
    pub portal_faces: usize,
    /// Whether a sealed flood fill told inside from outside.
    pub flooded: bool,
    pub inside_nodes: usize,
    pub outside_nodes: usize,
    pub inside_models: usize,
    pub outside_models: usize,
    pub inside_tris: usize,
    pub outside_tris: usize,
    /// Areas found, plus the reserved sky area.
    pub areas: usize,
    pub sectors: usize,
    pub shared_sectors: usize,
}

/// Everything a finished compile produced, ready to be emitted.
#[derive(Debug)]
pub struct CompiledMap {
    pub planes: PlaneHash,
    pub tree: BspTree,
    pub areas: Vec<Area>,
    pub sectors: Vec<Sector>,
    pub overlay: Overlay,
    pub stats: CompileStats,
}

pub struct BspBuilder;

impl BspBuilder {
    /// Compiles `scene` into a BSP tree with areas and sectors.
    ///
    /// `abort` is checked between phases. A leak is fatal and its trail is
    /// sent as [`CompileEvent::Leak`] before the error is returned. When no
    /// entity can seed the flood, the map compiles without telling inside
    /// from outside.
    pub fn compile(
        scene: &Scene,
        materials: &dyn MaterialProperties,
        config: &CompileConfig,
        abort: &AtomicBool,
        events: Option<Sender<CompileEvent>>,
    ) -> Result<CompiledMap> {
        config.validate()?;
        let mut progress = Progress::new(config.progress_interval, events);

        progress.begin(Phase::LoadMaterials);
        let mut overlay = load_materials(scene, materials)?;
        check_abort(abort)?;

        let mut planes = PlaneHash::new();
        let (mut tree, outcome) = build_pass(scene, &overlay, config, false, &mut planes, &mut progress, abort)?;

        let mut fill = FillStats::default();
        let flooded = match outcome {
            FloodOutcome::Leaked(trail) => return Err(leak(trail, &progress)),
            FloodOutcome::NoSeeds => false,
            FloodOutcome::Sealed => {
                progress.begin(Phase::FillOutside);
                fill = tree.fill_outside(scene, &mut overlay);
                check_abort(abort)?;

                if config.optimize_outside {
                    let (rebuilt, outcome) =
                        build_pass(scene, &overlay, config, true, &mut planes, &mut progress, abort)?;
                    tree = rebuilt;
                    if let FloodOutcome::Leaked(trail) = outcome {
                        return Err(leak(trail, &progress));
                    }
                    progress.begin(Phase::FillOutside);
                    fill = tree.fill_outside(scene, &mut overlay);
                    check_abort(abort)?;
                }
                true
            }
        };

        progress.begin(Phase::AreaFlood);
        let mut areas = tree.find_areas(scene, flooded, config.max_areas)?;
        tree.check_areas(scene);
        tree.link_portal_models(scene, &mut overlay);
        check_abort(abort)?;

        progress.begin(Phase::Sectorize);
        let decomposed = decompose_area_models(
            &tree,
            scene,
            &mut overlay,
            &mut planes,
            &mut areas,
            flooded,
            &mut progress,
        );
        let (sectors, sector_stats) = build_sectors(scene, &overlay, &mut areas, config, &mut progress);

        let tree_stats = *tree.stats();
        let stats = CompileStats {
            structural_tris: tree_stats.structural_tris,
            detail_tris: tree_stats.detail_tris,
            nodes: tree_stats.nodes,
            leafs: tree_stats.leafs,
            dropped_polys: tree_stats.dropped_polys,
            portal_splits: tree_stats.portal_splits,
            portal_faces: tree_stats.portal_faces,
            flooded,
            inside_nodes: fill.inside_nodes,
            outside_nodes: fill.outside_nodes,
            inside_models: decomposed.inside_models,
            outside_models: decomposed.outside_models,
            inside_tris: decomposed.inside_tris,
            outside_tris: decomposed.outside_tris,
            areas: areas.len(),
            sectors: sector_stats.sectors,
            shared_sectors: sector_stats.shared_sectors,
        };
        progress.send(CompileEvent::Stats(stats.clone()));

        Ok(CompiledMap {
            planes,
            tree,
            areas,
            sectors,
            overlay,
            stats,
        })
    }
}

fn check_abort(abort: &AtomicBool) -> Result<()> {
    if abort.load(Ordering::Relaxed) {
        info!("compile aborted");
        return Err(CompileError::Aborted);
    }
    Ok(())
}

/// Builds a tree, portalizes it and floods it from the entities.
fn build_pass(
    scene: &Scene,
    overlay: &Overlay,
    config: &CompileConfig,
    flooded: bool,
    planes: &mut PlaneHash,
    progress: &mut Progress,
    abort: &AtomicBool,
) -> Result<(BspTree, FloodOutcome)> {
    progress.begin(Phase::BuildTree);
    let ctx = BuildContext {
        scene,
        overlay,
        config,
        flooded,
    };
    let mut tree = BspTree::build(&ctx, planes, progress)?;
    check_abort(abort)?;

    progress.begin(Phase::Portalize);
    tree.portalize(planes, config, progress);
    check_abort(abort)?;

    progress.begin(Phase::FloodFill);
    let outcome = tree.flood_fill(scene, planes, progress);
    check_abort(abort)?;

    Ok((tree, outcome))
}

fn leak(trail: LeakTrail, progress: &Progress) -> CompileError {
    progress.send(CompileEvent::Leak(trail.points.clone()));
    CompileError::Leak {
        entity: trail.entity,
        points: trail.points,
    }
}

/// State of a [`CompileJob`].
#[derive(Debug, Clone, PartialEq)]
pub enum CompileStatus {
    Pending,
    Succeeded,
    Failed(CompileError),
}

#[derive(Debug)]
enum JobState {
    Running(JoinHandle<Result<CompiledMap>>),
    /// Placeholder while the worker is being joined.
    Joining,
    Done(Result<CompiledMap>),
}

/// A compile running on its own thread.
#[derive(Debug)]
pub struct CompileJob {
    abort: Arc<AtomicBool>,
    state: Mutex<JobState>,
}

impl CompileJob {
    /// Starts compiling `scene` on a new thread.
    pub fn spawn<M>(
        scene: Arc<Scene>,
        materials: M,
        config: CompileConfig,
        events: Option<Sender<CompileEvent>>,
    ) -> std::io::Result<Self>
    where
        M: MaterialProperties + Send + 'static,
    {
        let abort = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&abort);

        let handle = thread::Builder::new()
            .name("solid-bsp-compile".into())
            .spawn(move || {
                let result = BspBuilder::compile(&scene, &materials, &config, &flag, events.clone());
                let message = match &result {
                    Ok(_) => None,
                    Err(err) => {
                        error!("compile failed: {err}");
                        Some(err.to_string())
                    }
                };
                if let Some(events) = events {
                    let _ = events.send(CompileEvent::Finished(message));
                }
                result
            })?;

        Ok(Self {
            abort,
            state: Mutex::new(JobState::Running(handle)),
        })
    }

    /// Asks the worker to stop at the next phase boundary.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    /// Reports the job state without blocking. The worker thread is joined
    /// by the first call after it finished.
    pub fn poll(&self) -> CompileStatus {
        let mut state = self.state.lock();
        if matches!(&*state, JobState::Running(handle) if handle.is_finished())
            && let JobState::Running(handle) = std::mem::replace(&mut *state, JobState::Joining)
        {
            *state = JobState::Done(join(handle));
        }

        match &*state {
            JobState::Running(_) | JobState::Joining => CompileStatus::Pending,
            JobState::Done(Ok(_)) => CompileStatus::Succeeded,
            JobState::Done(Err(err)) => CompileStatus::Failed(err.clone()),
        }
    }

    /// Blocks until the compile ends and returns its result.
    pub fn wait(self) -> Result<CompiledMap> {
        match self.state.into_inner() {
            JobState::Running(handle) => join(handle),
            JobState::Done(result) => result,
            JobState::Joining => Err(CompileError::WorkerPanicked),
        }
    }
}

fn join(handle: JoinHandle<Result<CompiledMap>>) -> Result<CompiledMap> {
    handle.join().unwrap_or_else(|_| {
        error!("compile worker panicked");
        Err(CompileError::WorkerPanicked)
    })
}
