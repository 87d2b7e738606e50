//! Background measurement of reference radiances.
//!
//! The display transform needs to know how bright the scene's white wall
//! and its light are. A [`CalibrationWorker`] keeps tracing two fixed rays
//! (one at each) on its own thread, accumulating their radiance, and
//! periodically publishes a [`CalibrationSnapshot`]. Readers never block:
//! if the snapshot is being replaced they keep the one they already have.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use lumen_core::{to_rgb, ConversionMode, Light, LightAccumulator};
use lumen_math::{Ray, Vec3};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::RenderResult;
use crate::scene::Scene;
use crate::tonemap::ReferenceSamples;
use crate::tracer::{trace, TraceConfig};

/// Paths traced per ray between two publications.
pub const CALIBRATION_BATCH: u32 = 64;

/// The two probe rays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRays {
    /// Ray aimed at the brightest emitter.
    pub light: Ray,
    /// Ray aimed at a neutral white surface.
    pub wall: Ray,
}

/// Latest estimate of both reference radiances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSnapshot {
    pub light: Light,
    pub wall: Light,
    /// Paths traced per ray so far.
    pub samples: u64,
}

impl Default for CalibrationSnapshot {
    fn default() -> Self {
        Self {
            light: Light::black(),
            wall: Light::black(),
            samples: 0,
        }
    }
}

impl CalibrationSnapshot {
    /// Convert to display references. `None` until something was measured.
    pub fn references(&self, mode: ConversionMode) -> Option<ReferenceSamples> {
        if self.samples == 0 {
            return None;
        }
        Some(ReferenceSamples {
            white: Vec3::from_array(to_rgb(self.wall.spectrum(), mode)),
            bright: Vec3::from_array(to_rgb(self.light.spectrum(), mode)),
        })
    }
}

type SharedSnapshot = Arc<RwLock<Arc<CalibrationSnapshot>>>;

/// Cloneable read handle onto the published snapshot.
#[derive(Clone)]
pub struct CalibrationReader {
    shared: SharedSnapshot,
}

impl CalibrationReader {
    /// Latest snapshot, or `None` if a publication is in progress.
    pub fn try_latest(&self) -> Option<Arc<CalibrationSnapshot>> {
        self.shared.try_read().map(|snapshot| Arc::clone(&snapshot))
    }

    /// Refresh `current` if a snapshot can be read without blocking.
    pub fn refresh(&self, current: &mut Arc<CalibrationSnapshot>) -> bool {
        match self.try_latest() {
            Some(latest) => {
                let changed = !Arc::ptr_eq(current, &latest);
                *current = latest;
                changed
            }
            None => false,
        }
    }
}

/// Background thread measuring [`CalibrationRays`].
pub struct CalibrationWorker {
    stop: Arc<AtomicBool>,
    reader: CalibrationReader,
    handle: Option<JoinHandle<()>>,
}

impl CalibrationWorker {
    /// Start measuring. `history` is the accumulator history of both rays.
    pub fn spawn(
        scene: Arc<Scene>,
        rays: CalibrationRays,
        config: TraceConfig,
        history: u64,
        seed: u64,
    ) -> RenderResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let shared: SharedSnapshot = Arc::new(RwLock::new(Arc::new(CalibrationSnapshot::default())));

        let handle = {
            let stop = Arc::clone(&stop);
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("Calibration".to_string())
                .spawn(move || run(&scene, rays, &config, history, seed, &stop, &shared))?
        };

        Ok(Self {
            stop,
            reader: CalibrationReader { shared },
            handle: Some(handle),
        })
    }

    pub fn reader(&self) -> CalibrationReader {
        self.reader.clone()
    }

    /// Latest snapshot, or `None` if a publication is in progress.
    pub fn try_latest(&self) -> Option<Arc<CalibrationSnapshot>> {
        self.reader.try_latest()
    }

    /// Signal the thread to stop and wait for it.
    pub fn stop(mut self) {
        self.join();
    }

    fn join(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Calibration thread panicked");
            }
        }
    }
}

impl Drop for CalibrationWorker {
    fn drop(&mut self) {
        self.join();
    }
}

fn run(
    scene: &Scene,
    rays: CalibrationRays,
    config: &TraceConfig,
    history: u64,
    seed: u64,
    stop: &AtomicBool,
    shared: &RwLock<Arc<CalibrationSnapshot>>,
) {
    log::debug!("Calibration thread: Begin");

    let mut rng = StdRng::seed_from_u64(seed);
    let mut light = LightAccumulator::new(history);
    let mut wall = LightAccumulator::new(history);

    while !stop.load(Ordering::Relaxed) {
        for _ in 0..CALIBRATION_BATCH {
            light.accumulate(&trace(&rays.light, scene, config, &mut rng));
            wall.accumulate(&trace(&rays.wall, scene, config, &mut rng));
        }

        let snapshot = Arc::new(CalibrationSnapshot {
            light: light.color(),
            wall: wall.color(),
            samples: light.count(),
        });
        *shared.write() = snapshot;
    }

    log::debug!("Calibration thread: End after {} samples", light.count());
}
