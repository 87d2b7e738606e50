//! Long-lived render workers for progressive rendering.
//!
//! Each worker thread holds a shared reference to the immutable scene and
//! waits for [`Job`]s on its own channel. A job asks for a number of paths
//! through every pixel of one bucket; the worker answers with one averaged
//! spectrum per pixel tagged with the job's generation. The driver bumps
//! the generation whenever the view changes and drops stale answers.
//!
//! Workers stop when they receive `None` or when their channel is closed.

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bucket::{render_bucket, Bucket, BucketResult};
use crate::camera::Camera;
use crate::error::{RenderError, RenderResult};
use crate::film::Film;
use crate::renderer::stream_seed;
use crate::scene::Scene;
use crate::tracer::TraceConfig;

/// How long [`RenderPool::recv`] waits before checking that workers are
/// still running.
const LIVENESS_POLL: Duration = Duration::from_millis(50);

/// A unit of work for one worker.
#[derive(Debug, Clone, Copy)]
pub struct Job {
    /// View generation the job belongs to
    pub generation: u64,
    pub bucket: Bucket,
    /// Paths per pixel
    pub samples: u32,
    /// Seed of the job's RNG stream
    pub seed: u64,
}

/// A finished [`Job`].
#[derive(Debug, Clone)]
pub struct JobResult {
    pub generation: u64,
    pub result: BucketResult,
    pub worker: usize,
    pub elapsed_s: f32,
}

/// Shared, read-only inputs of every worker.
#[derive(Clone)]
struct WorkerContext {
    scene: Arc<Scene>,
    camera: Camera,
    config: TraceConfig,
}

struct Worker {
    sender: Sender<Option<Job>>,
    handle: Option<JoinHandle<()>>,
}

/// Fixed set of render threads fed round-robin.
pub struct RenderPool {
    workers: Vec<Worker>,
    results: Receiver<JobResult>,
    next_worker: usize,
    in_flight: usize,
}

impl RenderPool {
    /// Spawn `threads` workers rendering `scene` through `camera`.
    pub fn new(scene: Arc<Scene>, camera: Camera, config: TraceConfig, threads: usize) -> RenderResult<Self> {
        if threads == 0 {
            return Err(RenderError::NoWorkers);
        }

        let context = WorkerContext { scene, camera, config };
        let (to_parent, results) = channel();
        let mut workers = Vec::with_capacity(threads);

        for worker_id in 0..threads {
            let (sender, from_parent) = channel();
            let to_parent = to_parent.clone();
            let context = context.clone();
            let handle = thread::Builder::new()
                .name(format!("Render thread {}", worker_id))
                .spawn(move || launch(worker_id, context, &to_parent, &from_parent))?;
            workers.push(Worker {
                sender,
                handle: Some(handle),
            });
        }

        log::info!("Started {} render workers", threads);

        Ok(Self {
            workers,
            results,
            next_worker: 0,
            in_flight: 0,
        })
    }

    /// One worker per logical CPU.
    pub fn with_hardware_concurrency(scene: Arc<Scene>, camera: Camera, config: TraceConfig) -> RenderResult<Self> {
        Self::new(scene, camera, config, num_cpus::get().max(1))
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs submitted but not yet received.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Hand `job` to the next worker in turn.
    pub fn submit(&mut self, job: Job) -> RenderResult<()> {
        let id = self.next_worker;
        self.next_worker = (self.next_worker + 1) % self.workers.len();
        self.workers[id]
            .sender
            .send(Some(job))
            .map_err(|_| RenderError::Disconnected(id))?;
        self.in_flight += 1;
        Ok(())
    }

    /// Block for the next finished job.
    ///
    /// Fails with [`RenderError::Disconnected`] once any worker has exited,
    /// since its jobs will never be answered.
    pub fn recv(&mut self) -> RenderResult<JobResult> {
        loop {
            match self.results.recv_timeout(LIVENESS_POLL) {
                Ok(result) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    return Ok(result);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(id) = self.dead_worker() {
                        return Err(RenderError::Disconnected(id));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RenderError::Disconnected(self.dead_worker().unwrap_or(self.next_worker)));
                }
            }
        }
    }

    /// First worker whose thread is no longer running.
    fn dead_worker(&self) -> Option<usize> {
        let id = self
            .workers
            .iter()
            .position(|w| w.handle.as_ref().map_or(true, JoinHandle::is_finished))?;
        log::error!("Render thread {} exited with jobs outstanding", id);
        Some(id)
    }

    /// Next finished job, if one is ready.
    pub fn try_recv(&mut self) -> RenderResult<Option<JobResult>> {
        match self.results.try_recv() {
            Ok(result) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                Ok(Some(result))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RenderError::Disconnected(self.next_worker)),
        }
    }

    /// Render one pass of `samples` paths per pixel over `buckets` and
    /// merge every answer of `generation` into `film`.
    ///
    /// Answers from other generations are dropped. Returns the number of
    /// buckets merged.
    pub fn render_pass(
        &mut self,
        film: &mut Film,
        buckets: &[Bucket],
        samples: u32,
        generation: u64,
        seed: u64,
    ) -> RenderResult<usize> {
        for bucket in buckets {
            self.submit(Job {
                generation,
                bucket: *bucket,
                samples,
                seed: stream_seed(seed, generation, bucket.index),
            })?;
        }

        let mut merged = 0;
        while self.in_flight > 0 {
            let answer = self.recv()?;
            if answer.generation != generation {
                log::trace!(
                    "Dropping stale bucket {} of generation {}",
                    answer.result.bucket.index,
                    answer.generation
                );
                continue;
            }
            film.merge(&answer.result);
            merged += 1;
        }
        Ok(merged)
    }

    /// Stop every worker and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop_workers();
    }

    fn stop_workers(&mut self) {
        for worker in &self.workers {
            // A worker that already exited has dropped its receiver
            let _ = worker.sender.send(None);
        }
        for (id, worker) in self.workers.iter_mut().enumerate() {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    log::error!("Render thread {} panicked", id);
                }
            }
        }
    }
}

impl Drop for RenderPool {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

fn launch(
    worker_id: usize,
    context: WorkerContext,
    to_parent: &Sender<JobResult>,
    from_parent: &Receiver<Option<Job>>,
) {
    log::debug!("Render thread {}: Begin", worker_id);

    while let Ok(Some(job)) = from_parent.recv() {
        let start = Instant::now();
        let mut rng = StdRng::seed_from_u64(job.seed);
        let pixels = render_bucket(
            &job.bucket,
            &context.camera,
            &context.scene,
            &context.config,
            job.samples,
            &mut rng,
        );

        let answer = JobResult {
            generation: job.generation,
            result: BucketResult::new(job.bucket, pixels),
            worker: worker_id,
            elapsed_s: start.elapsed().as_secs_f32(),
        };
        if to_parent.send(answer).is_err() {
            break;
        }
    }

    log::debug!("Render thread {}: End", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::generate_buckets;
    use crate::camera::CameraSettings;
    use crate::material::{Material, MaterialSource};
    use crate::primitive::Shape;
    use crate::scene::SceneBuilder;
    use lumen_core::{Light, Spectrum};
    use lumen_math::Vec3;

    fn glowing_ball() -> (Arc<Scene>, Camera) {
        let mut b = SceneBuilder::new();
        let root = b.primitive(
            Shape::sphere(Vec3::new(0.0, 0.0, -4.0), 1.0),
            Material::emitter(Light::new(Spectrum::splat(0.5))),
        );
        let camera = Camera::new(CameraSettings {
            image_width: 16,
            image_height: 16,
            vfov: 40.0,
            ..Default::default()
        });
        (Arc::new(b.build(root).unwrap()), camera)
    }

    #[test]
    fn test_rejects_empty_pool() {
        let (scene, camera) = glowing_ball();
        assert!(matches!(
            RenderPool::new(scene, camera, TraceConfig::default(), 0),
            Err(RenderError::NoWorkers)
        ));
    }

    #[test]
    fn test_render_pass_fills_film() {
        let _ = env_logger::builder().is_test(true).try_init();

        let (scene, camera) = glowing_ball();
        let mut pool = RenderPool::new(scene, camera, TraceConfig::default(), 3).unwrap();
        assert_eq!(pool.worker_count(), 3);

        let buckets = generate_buckets(16, 16, 4);
        let mut film = Film::new(16, 16, 64);
        for pass in 0..2 {
            let merged = pool.render_pass(&mut film, &buckets, 1, 0, pass).unwrap();
            assert_eq!(merged, buckets.len());
        }
        assert_eq!(pool.in_flight(), 0);

        assert_eq!(film.sample_count(0, 0), 2);
        assert_eq!(film.pixel(8, 8), Light::new(Spectrum::splat(0.5)));
        assert!(film.pixel(0, 0).is_black());
        pool.shutdown();
    }

    #[test]
    fn test_stale_generations_are_dropped() {
        let (scene, camera) = glowing_ball();
        let mut pool = RenderPool::new(scene, camera, TraceConfig::default(), 2).unwrap();
        let buckets = generate_buckets(16, 16, 8);

        // Old-generation work still in flight when the view changes
        for bucket in &buckets {
            pool.submit(Job {
                generation: 1,
                bucket: *bucket,
                samples: 1,
                seed: 3,
            })
            .unwrap();
        }

        let mut film = Film::new(16, 16, 64);
        let merged = pool.render_pass(&mut film, &buckets, 1, 2, 0).unwrap();
        assert_eq!(merged, buckets.len());
        assert_eq!(film.sample_count(8, 8), 1);
    }

    #[test]
    fn test_dead_worker_fails_the_pass() {
        let _ = env_logger::builder().is_test(true).try_init();

        // Only the first render thread trips over the material
        let mut b = SceneBuilder::new();
        let root = b.primitive(
            Shape::sphere(Vec3::new(0.0, 0.0, -4.0), 1.0),
            MaterialSource::procedural(|_| {
                if thread::current().name() == Some("Render thread 0") {
                    panic!("material failed");
                }
                Material::emitter(Light::white())
            }),
        );
        let scene = Arc::new(b.build(root).unwrap());
        let (_, camera) = glowing_ball();

        let mut pool = RenderPool::new(scene, camera, TraceConfig::default(), 2).unwrap();
        let buckets = generate_buckets(16, 16, 8);
        let mut film = Film::new(16, 16, 64);
        assert!(matches!(
            pool.render_pass(&mut film, &buckets, 1, 0, 0),
            Err(RenderError::Disconnected(0))
        ));
    }

    #[test]
    fn test_job_results_carry_worker_and_generation() {
        let (scene, camera) = glowing_ball();
        let mut pool = RenderPool::new(scene, camera, TraceConfig::default(), 1).unwrap();
        let bucket = Bucket::new(0, 0, 2, 2, 0);
        pool.submit(Job {
            generation: 7,
            bucket,
            samples: 1,
            seed: 1,
        })
        .unwrap();

        let answer = pool.recv().unwrap();
        assert_eq!(answer.generation, 7);
        assert_eq!(answer.worker, 0);
        assert_eq!(answer.result.pixels.len(), 4);
        assert!(pool.try_recv().unwrap().is_none());
    }
}
