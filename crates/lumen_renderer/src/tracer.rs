//! Recursive spectral path tracer.
//!
//! At each surface hit the tracer collects emission, then follows a single
//! gathering direction chosen by [`sample_direction`] and weights the light
//! it brings back by the BDF. Paths end on a miss (background), at a
//! non-scattering surface, when the BDF weight is black, or past
//! `max_depth` bounces.

use lumen_core::Light;
use lumen_math::{Ray, Vec3};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::march::march;
use crate::sampling::{sample_direction, RigConfig};
use crate::scene::Scene;

/// Per-path settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Deepest bounce that still contributes; deeper paths return black.
    pub max_depth: u32,
    /// Radiance of rays that leave the scene.
    pub background: Light,
    /// Optional importance region for direction sampling.
    pub rig: Option<RigConfig>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            background: Light::black(),
            rig: None,
        }
    }
}

/// Light carried back along a path and the deepest bounce it reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceResult {
    pub light: Light,
    pub depth: u32,
}

/// Radiance arriving at `ray.origin` from `-ray.direction`.
pub fn trace(ray: &Ray, scene: &Scene, config: &TraceConfig, rng: &mut dyn RngCore) -> Light {
    trace_path(ray, scene, config, 0, rng).light
}

/// Trace one path starting at bounce `depth`.
pub fn trace_path(
    ray: &Ray,
    scene: &Scene,
    config: &TraceConfig,
    depth: u32,
    rng: &mut dyn RngCore,
) -> TraceResult {
    if depth > config.max_depth {
        return TraceResult {
            light: Light::black(),
            depth,
        };
    }

    let Some(hit) = march(scene, ray) else {
        return TraceResult {
            light: config.background,
            depth,
        };
    };

    let material = scene.material_at(hit.position);
    let view = -ray.direction;
    let normal = facing(scene.normal(hit.position), view);

    let mut light = material
        .emission
        .map_or(Light::black(), |e| e.emittance(view, normal));
    let mut reached = depth;

    if let Some(bdf) = material.bdf {
        let relative_ior = if hit.started_inside {
            1.0 / material.ior
        } else {
            material.ior
        };

        if let Some(sample) = sample_direction(&bdf, normal, hit.position, config.rig.as_ref(), rng) {
            let weight = bdf
                .evaluate(view, normal, sample.direction, relative_ior)
                .scale(1.0 / sample.compensation);

            if !weight.is_black() {
                let next = Ray::new(hit.position, sample.direction);
                let gathered = trace_path(&next, scene, config, depth + 1, rng);
                light += gathered.light.apply(&weight);
                reached = gathered.depth;
            }
        }
    }

    if hit.started_inside {
        if let Some(interior) = material.interior {
            light = light.apply(&interior.attenuation(ray.origin, ray.direction, hit.distance));
        }
    }

    TraceResult {
        light,
        depth: reached,
    }
}

/// Flip `normal` into the hemisphere containing `view`.
#[inline]
fn facing(normal: Vec3, view: Vec3) -> Vec3 {
    if normal.dot(view) < 0.0 {
        -normal
    } else {
        normal
    }
}
