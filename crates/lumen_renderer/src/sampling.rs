//! Direction sampling for the path tracer.
//!
//! Directions are drawn uniformly over the domain admitted by a surface's
//! BDF: the viewer's hemisphere for purely reflective surfaces, the opposite
//! hemisphere for purely transmissive ones and the whole sphere otherwise.
//!
//! A [`RigConfig`] biases sampling toward a known important region (usually
//! the light). With probability `p` a direction is drawn uniformly inside a
//! cone around the target; the mixture pdf is compensated so the estimator
//! stays unbiased.

use std::f32::consts::TAU;

use lumen_math::{orthonormal_basis, Vec3};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::material::Bdf;

/// Slack on the cone membership test for directions drawn on its rim.
const CONE_TOLERANCE: f32 = 1e-5;

/// Generate a random f32 in [0, 1).
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen::<f32>()
}

/// Uniform direction on the unit sphere.
pub fn uniform_sphere(rng: &mut dyn RngCore) -> Vec3 {
    let z = 1.0 - 2.0 * gen_f32(rng);
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = TAU * gen_f32(rng);
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Uniform direction on the hemisphere around `axis`.
pub fn uniform_hemisphere(axis: Vec3, rng: &mut dyn RngCore) -> Vec3 {
    let d = uniform_sphere(rng);
    if d.dot(axis) < 0.0 {
        -d
    } else {
        d
    }
}

/// Uniform direction within `acos(cos_max)` of unit `axis`.
pub fn uniform_cone(axis: Vec3, cos_max: f32, rng: &mut dyn RngCore) -> Vec3 {
    let cos_theta = 1.0 - gen_f32(rng) * (1.0 - cos_max);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = TAU * gen_f32(rng);
    let (t, b) = orthonormal_basis(axis);
    t * (sin_theta * phi.cos()) + b * (sin_theta * phi.sin()) + axis * cos_theta
}

/// Solid angle of a cone with half-angle `acos(cos_max)`.
#[inline]
pub fn cone_solid_angle(cos_max: f32) -> f32 {
    TAU * (1.0 - cos_max)
}

/// Importance region toward which a fraction of samples is steered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    /// Point the cone is aimed at.
    pub target: Vec3,
    /// Cone half-angle in radians.
    pub half_angle: f32,
    /// Fraction of samples drawn from the cone when it is admissible.
    pub probability: f32,
}

impl RigConfig {
    pub fn new(target: Vec3, half_angle: f32, probability: f32) -> Self {
        Self {
            target,
            half_angle,
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

/// A sampled direction and the factor its BDF weight must be divided by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionSample {
    pub direction: Vec3,
    /// Mixture pdf relative to the uniform domain pdf.
    pub compensation: f32,
}

/// Draw a gathering direction for `bdf` at `position`.
///
/// `normal` must face the viewer. Returns `None` when the sample has to be
/// discarded.
pub fn sample_direction(
    bdf: &Bdf,
    normal: Vec3,
    position: Vec3,
    rig: Option<&RigConfig>,
    rng: &mut dyn RngCore,
) -> Option<DirectionSample> {
    let domain_axis = match (bdf.is_reflective(), bdf.is_transmissive()) {
        (true, false) => Some(normal),
        (false, true) => Some(-normal),
        _ => None,
    };
    let uniform = |rng: &mut dyn RngCore| match domain_axis {
        Some(axis) => uniform_hemisphere(axis, rng),
        None => uniform_sphere(rng),
    };

    let cone = rig.and_then(|rig| {
        let axis = (rig.target - position).try_normalize()?;
        let admissible = domain_axis.map_or(true, |a| axis.dot(a) > 0.0);
        (admissible && rig.probability > 0.0).then_some((axis, rig.half_angle.cos(), rig.probability))
    });

    let Some((axis, cos_max, probability)) = cone else {
        return Some(DirectionSample {
            direction: uniform(rng),
            compensation: 1.0,
        });
    };

    let from_rig = gen_f32(rng) < probability;
    let direction = if from_rig {
        uniform_cone(axis, cos_max, rng)
    } else {
        uniform(rng)
    };

    let in_cone = direction.dot(axis) >= cos_max - CONE_TOLERANCE;
    if from_rig && !in_cone {
        debug_assert!(false, "rig sample left its cone");
        log::warn!("Rig sample left its cone; discarding");
        return None;
    }

    let amplification = bdf.domain_solid_angle() / cone_solid_angle(cos_max).max(f32::EPSILON);
    let compensation = if in_cone {
        1.0 - probability + probability * amplification
    } else {
        1.0 - probability
    };
    if compensation <= 0.0 {
        return None;
    }

    Some(DirectionSample {
        direction,
        compensation,
    })
}
