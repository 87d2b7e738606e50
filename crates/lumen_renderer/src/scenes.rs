//! Built-in demo scene: a closed-on-five-sides box lit by a ceiling panel.

use std::f32::consts::FRAC_PI_8;

use lumen_core::{BuiltinSpectrum, Dye, Light};
use lumen_math::{Mat3, Ray, Vec3};

use crate::calibration::CalibrationRays;
use crate::camera::CameraSettings;
use crate::error::RenderResult;
use crate::material::{Material, MaterialSource};
use crate::primitive::Shape;
use crate::sampling::RigConfig;
use crate::scene::{Scene, SceneBuilder};

/// Height of the ceiling light panel.
pub const LIGHT_HEIGHT: f32 = 0.99;

/// Half the edge length of the square ceiling light.
pub const LIGHT_HALF_SIZE: f32 = 0.25;

const WALL_HALF_THICKNESS: f32 = 0.05;

/// A scene with everything needed to render and calibrate it.
#[derive(Debug)]
pub struct BoxScene {
    pub scene: Scene,
    pub camera: CameraSettings,
    pub rig: RigConfig,
    pub calibration: CalibrationRays,
}

/// The interior spans [-1, 1] on every axis and is open toward +Z, where
/// the camera sits.
pub fn box_scene(width: u32, height: u32) -> RenderResult<BoxScene> {
    let white = Dye::new(BuiltinSpectrum::WhitePaint.load()?);
    let red = Dye::new(BuiltinSpectrum::RedPaint.load()?);
    let green = Dye::new(BuiltinSpectrum::GreenPaint.load()?);
    let lamp = Light::new(BuiltinSpectrum::WarmLight.load()?);

    let mut b = SceneBuilder::new();

    let slab = |b: &mut SceneBuilder, center: Vec3, half_extents: Vec3, material: MaterialSource| {
        b.primitive(Shape::cuboid(center, half_extents), material)
    };
    let offset = 1.0 + WALL_HALF_THICKNESS;
    let side = Vec3::new(WALL_HALF_THICKNESS, 1.1, 1.1);
    let flat = Vec3::new(1.1, WALL_HALF_THICKNESS, 1.1);

    let checker = MaterialSource::procedural(move |p: Vec3| {
        let tile = (p.x * 4.0).floor() as i32 + (p.z * 4.0).floor() as i32;
        if tile.rem_euclid(2) == 0 {
            Material::lambertian(white)
        } else {
            Material::lambertian(white.combine(&Dye::grey(0.6)))
        }
    });

    let floor = slab(&mut b, Vec3::new(0.0, -offset, 0.0), flat, checker);
    let ceiling = slab(&mut b, Vec3::new(0.0, offset, 0.0), flat, Material::lambertian(white).into());
    let back = slab(
        &mut b,
        Vec3::new(0.0, 0.0, -offset),
        Vec3::new(1.1, 1.1, WALL_HALF_THICKNESS),
        Material::lambertian(white).into(),
    );
    let left = slab(&mut b, Vec3::new(-offset, 0.0, 0.0), side, Material::lambertian(red).into());
    let right = slab(&mut b, Vec3::new(offset, 0.0, 0.0), side, Material::lambertian(green).into());

    let light = b.primitive(
        Shape::quad(
            Vec3::new(-LIGHT_HALF_SIZE, LIGHT_HEIGHT, -LIGHT_HALF_SIZE),
            Vec3::new(2.0 * LIGHT_HALF_SIZE, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 2.0 * LIGHT_HALF_SIZE),
        ),
        Material::emitter(lamp),
    );

    // Glossy block with a spherical bite out of its top corner
    let block = b.primitive(
        Shape::cuboid(Vec3::ZERO, Vec3::new(0.3, 0.6, 0.3)),
        Material::glossy(white, 40.0),
    );
    let bite = b.primitive(Shape::sphere(Vec3::new(0.3, 0.6, 0.3), 0.25), Material::glossy(white, 40.0));
    let carved = b.difference(block, bite);
    let turned = b.rotate(carved, Mat3::from_rotation_y(FRAC_PI_8));
    let block = b.translate(turned, Vec3::new(-0.35, -0.4, -0.35));

    let ball = b.primitive(
        Shape::sphere(Vec3::new(0.4, -0.7, 0.2), 0.3),
        Material::dielectric(Dye::clear(), 30.0, 1.5, Dye::grey(0.85)),
    );

    let horizon = b.primitive(Shape::horizon(), Material::absorber());

    let root = b.union(&[floor, ceiling, back, left, right, light, block, ball, horizon]);
    let scene = b.build(root)?;

    let eye = Vec3::new(0.0, 0.0, 3.4);
    let light_center = Vec3::new(0.0, LIGHT_HEIGHT, 0.0);

    Ok(BoxScene {
        scene,
        camera: CameraSettings::default()
            .with_resolution(width, height)
            .with_position(eye, Vec3::ZERO, Vec3::Y)
            .with_fov(40.0),
        rig: RigConfig::new(light_center, 0.25, 0.5),
        calibration: CalibrationRays {
            light: Ray::towards(eye, light_center),
            wall: Ray::towards(eye, Vec3::new(0.0, 0.5, -1.0)),
        },
    })
}
