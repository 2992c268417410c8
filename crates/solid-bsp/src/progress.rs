//! Compile phases, progress ticks and the event channel.

use std::fmt;
use std::sync::mpsc::Sender;

use log::{debug, info};
use nalgebra::Point3;

use crate::CompileStats;

/// The major steps of a compile, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    LoadMaterials,
    BuildTree,
    Portalize,
    FloodFill,
    FillOutside,
    AreaFlood,
    Sectorize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::LoadMaterials => "Load materials",
            Phase::BuildTree => "Build tree",
            Phase::Portalize => "Portalize",
            Phase::FloodFill => "Flood fill",
            Phase::FillOutside => "Fill outside",
            Phase::AreaFlood => "Area flood",
            Phase::Sectorize => "Sectorize",
        };
        f.write_str(name)
    }
}

/// Notifications sent to an observer of a running compile.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileEvent {
    PhaseStarted(Phase),
    Progress { phase: Phase, count: usize },
    /// Leak trail from the outside to the leaking entity.
    Leak(Vec<Point3<f64>>),
    /// The compile ended; `None` on success, otherwise the error message.
    Finished(Option<String>),
    Stats(CompileStats),
}

/// Counts work units and reports every `interval` of them.
#[derive(Debug)]
pub struct Progress {
    phase: Phase,
    count: usize,
    interval: usize,
    events: Option<Sender<CompileEvent>>,
}

impl Progress {
    pub fn new(interval: usize, events: Option<Sender<CompileEvent>>) -> Self {
        Self {
            phase: Phase::LoadMaterials,
            count: 0,
            interval: interval.max(1),
            events,
        }
    }

    /// A progress sink that only logs.
    pub fn silent() -> Self {
        Self::new(usize::MAX, None)
    }

    pub fn begin(&mut self, phase: Phase) {
        info!("------------");
        info!("{phase}...");
        self.phase = phase;
        self.count = 0;
        self.send(CompileEvent::PhaseStarted(phase));
    }

    /// Records one unit of work.
    pub fn tick(&mut self) {
        self.count += 1;
        if self.count % self.interval == 0 {
            debug!("{}: {}", self.phase, self.count);
            self.send(CompileEvent::Progress {
                phase: self.phase,
                count: self.count,
            });
        }
    }

    /// Sends an event if anyone is listening. A dropped receiver is not an error.
    pub fn send(&self, event: CompileEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn ticks_report_every_interval() {
        let (tx, rx) = channel();
        let mut progress = Progress::new(3, Some(tx));
        progress.begin(Phase::Portalize);
        for _ in 0..7 {
            progress.tick();
        }
        drop(progress);

        let events: Vec<_> = rx.iter().collect();
        assert_eq!(
            events,
            vec![
                CompileEvent::PhaseStarted(Phase::Portalize),
                CompileEvent::Progress {
                    phase: Phase::Portalize,
                    count: 3
                },
                CompileEvent::Progress {
                    phase: Phase::Portalize,
                    count: 6
                },
            ]
        );
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (tx, rx) = channel();
        drop(rx);
        let mut progress = Progress::new(1, Some(tx));
        progress.begin(Phase::FloodFill);
        progress.tick();
    }
}
