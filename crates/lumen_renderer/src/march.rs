//! Ray marching against a signed distance field.
//!
//! The marcher runs in four phases:
//!
//! 1. **Escape**: a ray usually starts on the surface it just left. While
//!    `|d| < EPSILON` it creeps forward by `max(|d| * STEP_SCALE, EPSILON)`,
//!    then records which side of the surface it is on.
//! 2. **Advance**: with `d` measured relative to that side, step
//!    `max(d * STEP_SCALE, d - EPSILON / 2)` until `d < EPSILON`. Aborts past
//!    [`MAX_DIST`].
//! 3. **Correction**: if the last step crossed the surface, back off by
//!    `max(|d| * STEP_SCALE, EPSILON)` until back on the starting side.
//! 4. **Refine**: [`REFINE_STEPS`] further steps of `d * STEP_SCALE`, each
//!    shrinking the remaining gap to a quarter.

use lumen_math::{Ray, Vec3};

use crate::scene::Scene;

/// Surface proximity threshold.
pub const EPSILON: f32 = 1e-3;

/// Rays travelling further than this are misses.
pub const MAX_DIST: f32 = 1.0e3;

/// Fraction of the safe distance taken per step.
pub const STEP_SCALE: f32 = 0.75;

/// Refinement steps after reaching the surface.
pub const REFINE_STEPS: u32 = 5;

/// Hard cap on evaluations while backing off an overshoot.
pub const MAX_MARCH_STEPS: u32 = 1024;

/// Escape gives up after this many steps and continues from where it is.
const MAX_ESCAPE_STEPS: u32 = 64;

/// Surface found by [`march`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Point on (just outside, on the ray's side of) the surface.
    pub position: Vec3,
    /// Distance travelled along the ray.
    pub distance: f32,
    /// True if the ray started inside a solid.
    pub started_inside: bool,
}

/// March `ray` through `scene` to the nearest surface.
pub fn march(scene: &Scene, ray: &Ray) -> Option<Hit> {
    let direction = Some(ray.direction);
    let sdf = |t: f32| scene.distance(ray.at(t), direction);

    let mut t = 0.0;
    let mut d = sdf(t);

    let mut steps = 0;
    while d.abs() < EPSILON && steps < MAX_ESCAPE_STEPS {
        t += (d.abs() * STEP_SCALE).max(EPSILON);
        d = sdf(t);
        steps += 1;
    }
    let side = if d < 0.0 { -1.0 } else { 1.0 };

    // Every step here is at least STEP_SCALE * EPSILON, so MAX_DIST bounds
    // the loop. Grazing rays may take many short steps before a hit.
    loop {
        let rel = side * d;
        if rel < EPSILON {
            break;
        }
        t += (rel * STEP_SCALE).max(rel - EPSILON * 0.5);
        if t > MAX_DIST {
            return None;
        }
        d = sdf(t);
    }

    let mut steps = 0;
    while side * d < 0.0 && steps < MAX_MARCH_STEPS {
        t -= (d.abs() * STEP_SCALE).max(EPSILON);
        d = sdf(t);
        steps += 1;
    }
    if steps == MAX_MARCH_STEPS {
        log::trace!("Correction exhausted {} steps at t = {}", steps, t);
    }

    for _ in 0..REFINE_STEPS {
        t += side * d * STEP_SCALE;
        d = sdf(t);
    }

    Some(Hit {
        position: ray.at(t),
        distance: t,
        started_inside: side < 0.0,
    })
}
