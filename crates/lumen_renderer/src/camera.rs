//! Pinhole / thin-lens camera for primary ray generation.

use lumen_math::{Ray, Vec3};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::sampling::gen_f32;

/// Camera placement and lens settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub image_width: u32,
    pub image_height: u32,
    pub look_from: Vec3,
    pub look_at: Vec3,
    pub vup: Vec3,
    /// Vertical field of view in degrees
    pub vfov: f32,
    /// Variation angle of rays through each pixel (0 = pinhole)
    pub defocus_angle: f32,
    /// Distance from camera to plane of perfect focus
    pub focus_dist: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            image_width: 512,
            image_height: 512,
            look_from: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            vfov: 40.0,
            defocus_angle: 0.0,
            focus_dist: 1.0,
        }
    }
}

impl CameraSettings {
    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    /// Set vertical field of view in degrees.
    pub fn with_fov(mut self, vfov: f32) -> Self {
        self.vfov = vfov;
        self
    }

    /// Set lens settings.
    pub fn with_lens(mut self, defocus_angle: f32, focus_dist: f32) -> Self {
        self.defocus_angle = defocus_angle;
        self.focus_dist = focus_dist;
        self
    }
}

/// Camera for generating rays into the scene.
///
/// Built from [`CameraSettings`]; all derived quantities are computed once
/// in [`Camera::new`] so the camera can be shared read-only between threads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    settings: CameraSettings,
    center: Vec3,
    pixel00_loc: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
    w: Vec3,
    defocus_disk_u: Vec3,
    defocus_disk_v: Vec3,
}

impl Camera {
    pub fn new(settings: CameraSettings) -> Self {
        let center = settings.look_from;
        let width = settings.image_width.max(1) as f32;
        let height = settings.image_height.max(1) as f32;

        // Viewport dimensions
        let theta = settings.vfov.to_radians();
        let h = (theta / 2.0).tan();
        let viewport_height = 2.0 * h * settings.focus_dist;
        let viewport_width = viewport_height * (width / height);

        // Camera basis vectors
        let w = (settings.look_from - settings.look_at)
            .try_normalize()
            .unwrap_or(Vec3::Z);
        let u = settings.vup.cross(w).try_normalize().unwrap_or(Vec3::X);
        let v = w.cross(u);

        let viewport_u = viewport_width * u;
        let viewport_v = -viewport_height * v;

        let pixel_delta_u = viewport_u / width;
        let pixel_delta_v = viewport_v / height;

        let viewport_upper_left = center - settings.focus_dist * w - viewport_u / 2.0 - viewport_v / 2.0;
        let pixel00_loc = viewport_upper_left + 0.5 * (pixel_delta_u + pixel_delta_v);

        let defocus_radius = settings.focus_dist * (settings.defocus_angle / 2.0).to_radians().tan();

        Self {
            settings,
            center,
            pixel00_loc,
            pixel_delta_u,
            pixel_delta_v,
            w,
            defocus_disk_u: u * defocus_radius,
            defocus_disk_v: v * defocus_radius,
        }
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn image_width(&self) -> u32 {
        self.settings.image_width
    }

    pub fn image_height(&self) -> u32 {
        self.settings.image_height
    }

    pub fn position(&self) -> Vec3 {
        self.center
    }

    /// Unit vector the camera looks along.
    pub fn forward(&self) -> Vec3 {
        -self.w
    }

    /// Ray through the center of pixel (i, j), without jitter or defocus.
    pub fn center_ray(&self, i: u32, j: u32) -> Ray {
        let pixel = self.pixel00_loc + i as f32 * self.pixel_delta_u + j as f32 * self.pixel_delta_v;
        Ray::towards(self.center, pixel)
    }

    /// Generate a ray for pixel (i, j) with random sampling.
    pub fn get_ray(&self, i: u32, j: u32, rng: &mut dyn RngCore) -> Ray {
        let offset = sample_square(rng);

        let pixel_sample = self.pixel00_loc
            + ((i as f32) + offset.x) * self.pixel_delta_u
            + ((j as f32) + offset.y) * self.pixel_delta_v;

        let ray_origin = if self.settings.defocus_angle <= 0.0 {
            self.center
        } else {
            self.defocus_disk_sample(rng)
        };

        Ray::towards(ray_origin, pixel_sample)
    }

    /// Sample a point on the defocus disk.
    fn defocus_disk_sample(&self, rng: &mut dyn RngCore) -> Vec3 {
        let p = random_in_unit_disk(rng);
        self.center + p.x * self.defocus_disk_u + p.y * self.defocus_disk_v
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(CameraSettings::default())
    }
}

/// Sample a random point in the unit square [-0.5, 0.5] x [-0.5, 0.5].
fn sample_square(rng: &mut dyn RngCore) -> Vec3 {
    Vec3::new(gen_f32(rng) - 0.5, gen_f32(rng) - 0.5, 0.0)
}

/// Sample a random point in the unit disk.
fn random_in_unit_disk(rng: &mut dyn RngCore) -> Vec3 {
    loop {
        let p = Vec3::new(gen_f32(rng) * 2.0 - 1.0, gen_f32(rng) * 2.0 - 1.0, 0.0);
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}
