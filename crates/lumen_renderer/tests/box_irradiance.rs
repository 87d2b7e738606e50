//! Radiance of a diffuse floor lit by a square ceiling panel, checked
//! against the analytic point-to-rectangle form factor.

use std::f32::consts::PI;

use lumen_core::{Dye, Light, Spectrum};
use lumen_renderer::{trace, Material, Ray, RigConfig, Scene, SceneBuilder, Shape, TraceConfig, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;

const ALBEDO: f32 = 0.5;
const LIGHT_Y: f32 = 0.99;
const LIGHT_HALF: f32 = 0.25;
const SAMPLES: u32 = 20_000;

/// Closed box [-1, 1]^3 of grey walls with an emitting quad under the ceiling.
fn enclosed_box() -> Scene {
    let mut b = SceneBuilder::new();
    let wall = Material::lambertian(Dye::new(Spectrum::splat(ALBEDO)));

    let mut parts = Vec::new();
    for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
        // Each wall's normal points into the box
        parts.push(b.primitive(Shape::plane(-axis, axis), wall));
        parts.push(b.primitive(Shape::plane(axis, -axis), wall));
    }
    parts.push(b.primitive(
        Shape::quad(
            Vec3::new(-LIGHT_HALF, LIGHT_Y, -LIGHT_HALF),
            Vec3::new(2.0 * LIGHT_HALF, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 2.0 * LIGHT_HALF),
        ),
        Material::emitter(Light::new(Spectrum::splat(1.0))),
    ));

    let root = b.union(&parts);
    b.build(root).unwrap()
}

/// Form factor from a differential area to a parallel rectangle of sides
/// `a` x `b` with one corner straight above it at height `h`.
fn corner_form_factor(a: f32, b: f32, h: f32) -> f32 {
    let x = a / h;
    let y = b / h;
    let sx = (1.0 + x * x).sqrt();
    let sy = (1.0 + y * y).sqrt();
    (x / sx * (y / sx).atan() + y / sy * (x / sy).atan()) / (2.0 * PI)
}

fn floor_radiance(config: &TraceConfig, seed: u64) -> f32 {
    let scene = enclosed_box();
    let ray = Ray::new(Vec3::new(0.0, 0.5, 0.0), -Vec3::Y);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut total = 0.0f64;
    for _ in 0..SAMPLES {
        total += trace(&ray, &scene, config, &mut rng).spectrum().mean() as f64;
    }
    (total / SAMPLES as f64) as f32
}

#[test]
fn floor_center_matches_form_factor() {
    let _ = env_logger::builder().is_test(true).try_init();

    let height = 1.0 + LIGHT_Y;
    let expected = ALBEDO * 4.0 * corner_form_factor(LIGHT_HALF, LIGHT_HALF, height);

    let config = TraceConfig {
        max_depth: 1,
        background: Light::black(),
        rig: Some(RigConfig::new(Vec3::new(0.0, LIGHT_Y, 0.0), 0.25, 0.5)),
    };
    let got = floor_radiance(&config, 11);

    assert!(
        (got - expected).abs() < 0.1 * expected,
        "floor radiance {} vs analytic {}",
        got,
        expected
    );
}

#[test]
fn floor_without_bounces_is_black() {
    let config = TraceConfig {
        max_depth: 0,
        ..Default::default()
    };
    let scene = enclosed_box();
    let mut rng = StdRng::seed_from_u64(3);
    let ray = Ray::new(Vec3::new(0.0, 0.5, 0.0), -Vec3::Y);
    for _ in 0..100 {
        assert!(trace(&ray, &scene, &config, &mut rng).is_black());
    }
}
