//! One-shot frame rendering.
//!
//! The whole frame is split into buckets rendered in parallel with rayon,
//! each bucket with its own deterministic RNG stream, and gathered into a
//! [`Film`]. Progressive rendering with long-lived worker threads lives in
//! [`crate::pool`].

use lumen_core::Light;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bucket::{generate_buckets, render_bucket, BucketResult, DEFAULT_BUCKET_SIZE};
use crate::camera::Camera;
use crate::film::Film;
use crate::scene::Scene;
use crate::tracer::{trace, TraceConfig};

/// Frame-level render settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Paths per pixel in each pass
    pub samples_per_pixel: u32,
    /// Number of passes accumulated into the film
    pub passes: u32,
    /// Edge length of a bucket in pixels
    pub bucket_size: u32,
    /// Accumulator history of each film pixel
    pub history: u64,
    /// Base seed; bucket streams are derived from it
    pub seed: u64,
    pub trace: TraceConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            samples_per_pixel: 16,
            passes: 1,
            bucket_size: DEFAULT_BUCKET_SIZE,
            history: 1 << 16,
            seed: 0,
            trace: TraceConfig::default(),
        }
    }
}

/// Seed of the RNG stream for `bucket` in `pass`.
pub fn stream_seed(base: u64, pass: u64, bucket: usize) -> u64 {
    // splitmix64 finalizer over the combined key
    let mut z = base ^ pass.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ (bucket as u64).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Average `samples` traced paths through pixel (x, y).
pub fn render_pixel(
    camera: &Camera,
    scene: &Scene,
    x: u32,
    y: u32,
    config: &TraceConfig,
    samples: u32,
    rng: &mut dyn RngCore,
) -> Light {
    let samples = samples.max(1);
    let total: Light = (0..samples)
        .map(|_| {
            // Camera.get_ray already adds random offset for anti-aliasing
            let ray = camera.get_ray(x, y, rng);
            trace(&ray, scene, config, rng)
        })
        .sum();

    total.scale(1.0 / samples as f32)
}

/// Render `config.passes` passes of the whole frame in parallel.
pub fn render_frame(camera: &Camera, scene: &Scene, config: &RenderConfig) -> Film {
    let width = camera.image_width();
    let height = camera.image_height();
    let buckets = generate_buckets(width, height, config.bucket_size);
    let mut film = Film::new(width, height, config.history);

    log::info!(
        "Rendering {}x{} in {} buckets, {} passes of {} spp",
        width,
        height,
        buckets.len(),
        config.passes,
        config.samples_per_pixel
    );

    for pass in 0..config.passes {
        let results: Vec<BucketResult> = buckets
            .par_iter()
            .map(|bucket| {
                let mut rng = StdRng::seed_from_u64(stream_seed(config.seed, pass as u64, bucket.index));
                let pixels = render_bucket(
                    bucket,
                    camera,
                    scene,
                    &config.trace,
                    config.samples_per_pixel,
                    &mut rng,
                );
                BucketResult::new(*bucket, pixels)
            })
            .collect();

        for result in &results {
            film.merge(result);
        }
        log::debug!("Pass {}/{} complete", pass + 1, config.passes);
    }

    film
}
