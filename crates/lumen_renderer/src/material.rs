//! Surface and volume properties.
//!
//! A [`Material`] bundles what happens where a ray meets a surface: light
//! it emits, a bidirectional distribution function (BDF) describing how it
//! scatters light that arrives, an interior absorption model and an index
//! of refraction.
//!
//! BDFs are evaluated, never sampled: the path tracer picks directions
//! uniformly over the admissible domain (possibly biased toward a rig, see
//! [`crate::sampling`]) and asks the BDF for the Monte Carlo weight of that
//! direction.

use std::f32::consts::{PI, TAU};
use std::fmt;
use std::sync::Arc;

use lumen_core::{Dye, Light, Spectrum};
use lumen_math::Vec3;

/// Index of refraction of vacuum/air.
pub const AIR_IOR: f32 = 1.0;

/// Light emitted by a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Emission {
    /// Same radiance in every direction, from both faces.
    Uniform(Light),
    /// Radiance falling off as `cos^power` away from the surface normal.
    Cosine { radiance: Light, power: f32 },
}

impl Emission {
    /// Radiance leaving the surface toward `view`.
    ///
    /// `normal` is oriented toward the viewer.
    pub fn emittance(&self, view: Vec3, normal: Vec3) -> Light {
        match *self {
            Emission::Uniform(radiance) => radiance,
            Emission::Cosine { radiance, power } => {
                let cos = view.dot(normal).max(0.0);
                radiance.scale(cos.powf(power))
            }
        }
    }
}

/// Bidirectional distribution function.
///
/// All lobes take directions pointing away from the surface: `view` toward
/// the viewer and `sample` toward where light is gathered from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bdf {
    /// Ideal diffuse reflector.
    Lambertian { albedo: Dye },
    /// Energy-normalized Phong lobe around the mirror direction.
    Glossy { albedo: Dye, exponent: f32 },
    /// Rough dielectric interface: Fresnel-weighted reflection and refraction
    /// lobes around the mirror and refracted directions.
    Dielectric { tint: Dye, exponent: f32 },
    /// Ideal diffuse transmitter.
    Translucent { albedo: Dye },
}

impl Bdf {
    /// True if the BDF scatters light back into the viewer's hemisphere.
    pub fn is_reflective(&self) -> bool {
        !matches!(self, Bdf::Translucent { .. })
    }

    /// True if the BDF passes light through the surface.
    pub fn is_transmissive(&self) -> bool {
        matches!(self, Bdf::Dielectric { .. } | Bdf::Translucent { .. })
    }

    /// Number of hemispheres in the sampling domain.
    pub fn sides(&self) -> u32 {
        self.is_reflective() as u32 + self.is_transmissive() as u32
    }

    /// Solid angle of the sampling domain.
    pub fn domain_solid_angle(&self) -> f32 {
        TAU * self.sides() as f32
    }

    /// Monte Carlo weight `f * |cos| / pdf` of gathering light from `sample`
    /// when directions are drawn uniformly over the sampling domain.
    ///
    /// `normal` is oriented toward the viewer. `relative_ior` is the index of
    /// refraction beyond the surface divided by the one on the viewer's side.
    pub fn evaluate(&self, view: Vec3, normal: Vec3, sample: Vec3, relative_ior: f32) -> Dye {
        let cos_sample = sample.dot(normal);
        let domain = self.domain_solid_angle();

        match *self {
            Bdf::Lambertian { albedo } => {
                if cos_sample <= 0.0 {
                    return Dye::black();
                }
                scaled(&albedo, cos_sample * domain / PI)
            }
            Bdf::Translucent { albedo } => {
                if cos_sample >= 0.0 {
                    return Dye::black();
                }
                scaled(&albedo, -cos_sample * domain / PI)
            }
            Bdf::Glossy { albedo, exponent } => {
                if cos_sample <= 0.0 {
                    return Dye::black();
                }
                let mirror = reflect(-view, normal);
                scaled(&albedo, phong_lobe(mirror, sample, exponent) * cos_sample * domain)
            }
            Bdf::Dielectric { tint, exponent } => {
                let cos_view = view.dot(normal).clamp(0.0, 1.0);
                let eta = 1.0 / relative_ior;
                let sin_view = (1.0 - cos_view * cos_view).sqrt();
                let cannot_refract = eta * sin_view > 1.0;
                let fresnel = if cannot_refract {
                    1.0
                } else {
                    reflectance(cos_view, relative_ior)
                };

                let weight = if cos_sample > 0.0 {
                    let mirror = reflect(-view, normal);
                    fresnel * phong_lobe(mirror, sample, exponent) * cos_sample
                } else if cos_sample < 0.0 && !cannot_refract {
                    let refracted = refract(-view, normal, eta);
                    (1.0 - fresnel) * phong_lobe(refracted, sample, exponent) * -cos_sample
                } else {
                    0.0
                };
                scaled(&tint, weight * domain)
            }
        }
    }
}

/// Normalized Phong lobe around `axis`.
fn phong_lobe(axis: Vec3, sample: Vec3, exponent: f32) -> f32 {
    let cos_alpha = axis.dot(sample).max(0.0);
    (exponent + 2.0) / TAU * cos_alpha.powf(exponent)
}

fn scaled(dye: &Dye, factor: f32) -> Dye {
    Dye::weight(*dye.spectrum() * factor.max(0.0))
}

/// Absorption inside a closed surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interior {
    /// Beer-Lambert absorption: `transmittance` is the fraction surviving
    /// one unit of distance.
    Absorbing { transmittance: Dye },
}

impl Interior {
    /// Fraction of light surviving `distance` units of travel from `origin`
    /// along `direction`.
    pub fn attenuation(&self, _origin: Vec3, _direction: Vec3, distance: f32) -> Dye {
        match *self {
            Interior::Absorbing { transmittance } => transmittance.pow(distance.max(0.0)),
        }
    }
}

/// Complete description of a surface point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub emission: Option<Emission>,
    pub bdf: Option<Bdf>,
    pub interior: Option<Interior>,
    pub ior: f32,
}

impl Material {
    /// Black, non-emitting surface that absorbs everything.
    pub fn absorber() -> Self {
        Self {
            emission: None,
            bdf: None,
            interior: None,
            ior: AIR_IOR,
        }
    }

    pub fn lambertian(albedo: Dye) -> Self {
        Self {
            bdf: Some(Bdf::Lambertian { albedo }),
            ..Self::absorber()
        }
    }

    pub fn glossy(albedo: Dye, exponent: f32) -> Self {
        Self {
            bdf: Some(Bdf::Glossy { albedo, exponent }),
            ..Self::absorber()
        }
    }

    pub fn translucent(albedo: Dye) -> Self {
        Self {
            bdf: Some(Bdf::Translucent { albedo }),
            ..Self::absorber()
        }
    }

    /// Rough glass with Beer-Lambert absorption per unit distance.
    pub fn dielectric(tint: Dye, exponent: f32, ior: f32, transmittance: Dye) -> Self {
        Self {
            bdf: Some(Bdf::Dielectric { tint, exponent }),
            interior: Some(Interior::Absorbing { transmittance }),
            ior,
            ..Self::absorber()
        }
    }

    /// Pure emitter radiating `radiance` uniformly from both faces.
    pub fn emitter(radiance: Light) -> Self {
        Self {
            emission: Some(Emission::Uniform(radiance)),
            ..Self::absorber()
        }
    }

    pub fn with_emission(mut self, emission: Emission) -> Self {
        self.emission = Some(emission);
        self
    }

    pub fn with_ior(mut self, ior: f32) -> Self {
        self.ior = ior;
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::lambertian(Dye::new(Spectrum::splat(0.5)))
    }
}

/// Procedural material: evaluated at the node-local hit point.
pub type MaterialFn = dyn Fn(Vec3) -> Material + Send + Sync;

/// Material attached to a primitive.
#[derive(Clone)]
pub enum MaterialSource {
    Constant(Material),
    Procedural(Arc<MaterialFn>),
}

impl MaterialSource {
    pub fn procedural(f: impl Fn(Vec3) -> Material + Send + Sync + 'static) -> Self {
        MaterialSource::Procedural(Arc::new(f))
    }

    /// Resolve the material at a primitive-local point.
    pub fn at(&self, local: Vec3) -> Material {
        match self {
            MaterialSource::Constant(material) => *material,
            MaterialSource::Procedural(f) => f(local),
        }
    }
}

impl From<Material> for MaterialSource {
    fn from(material: Material) -> Self {
        MaterialSource::Constant(material)
    }
}

impl fmt::Debug for MaterialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterialSource::Constant(material) => f.debug_tuple("Constant").field(material).finish(),
            MaterialSource::Procedural(_) => f.write_str("Procedural(..)"),
        }
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// Reflect a vector about a normal.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a unit vector through a surface with normal `n` facing it.
#[inline]
pub fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}

/// Schlick's approximation for reflectance
#[inline]
pub fn reflectance(cosine: f32, ior: f32) -> f32 {
    let r0 = ((1.0 - ior) / (1.0 + ior)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::uniform_sphere;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn grey(v: f32) -> Dye {
        Dye::new(Spectrum::splat(v))
    }

    /// Average weight over uniformly drawn sphere directions, scaled to the
    /// BDF's own domain: an estimate of directional albedo.
    fn directional_albedo(bdf: &Bdf, view: Vec3, relative_ior: f32) -> f32 {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 200_000;
        let mut total = 0.0;
        for _ in 0..n {
            let s = uniform_sphere(&mut rng);
            total += bdf.evaluate(view, Vec3::Y, s, relative_ior).mean();
        }
        total / n as f32 * 2.0 / bdf.sides() as f32
    }

    #[test]
    fn test_lambertian_conserves_albedo() {
        let bdf = Bdf::Lambertian { albedo: grey(0.8) };
        let a = directional_albedo(&bdf, Vec3::Y, 1.0);
        assert!((a - 0.8).abs() < 0.02, "albedo {}", a);
    }

    #[test]
    fn test_lambertian_rejects_lower_hemisphere() {
        let bdf = Bdf::Lambertian { albedo: grey(0.8) };
        assert!(bdf.evaluate(Vec3::Y, Vec3::Y, -Vec3::Y, 1.0).is_black());
        let w = bdf.evaluate(Vec3::Y, Vec3::Y, Vec3::Y, 1.0);
        assert!((w.mean() - 1.6).abs() < 1e-5);
    }

    #[test]
    fn test_translucent_only_transmits() {
        let bdf = Bdf::Translucent { albedo: grey(0.5) };
        assert!(!bdf.is_reflective());
        assert_eq!(bdf.sides(), 1);
        assert!(bdf.evaluate(Vec3::Y, Vec3::Y, Vec3::Y, 1.0).is_black());
        assert!(!bdf.evaluate(Vec3::Y, Vec3::Y, -Vec3::Y, 1.0).is_black());
    }

    #[test]
    fn test_dielectric_is_two_sided() {
        let bdf = Bdf::Dielectric {
            tint: Dye::clear(),
            exponent: 50.0,
        };
        assert_eq!(bdf.sides(), 2);

        // Mostly transmits at normal incidence into glass
        let view = Vec3::Y;
        let reflected = bdf.evaluate(view, Vec3::Y, Vec3::Y, 1.5).mean();
        let transmitted = bdf.evaluate(view, Vec3::Y, -Vec3::Y, 1.5).mean();
        assert!(transmitted > 10.0 * reflected);
    }

    #[test]
    fn test_dielectric_total_internal_reflection() {
        let bdf = Bdf::Dielectric {
            tint: Dye::clear(),
            exponent: 20.0,
        };
        // Grazing view from inside glass toward air
        let view = Vec3::new(0.9, 0.2, 0.0).normalize();
        let below = -Vec3::Y;
        assert!(bdf.evaluate(view, Vec3::Y, below, 1.0 / 1.5).is_black());
        let mirror = reflect(-view, Vec3::Y);
        assert!(!bdf.evaluate(view, Vec3::Y, mirror, 1.0 / 1.5).is_black());
    }

    #[test]
    fn test_glossy_peaks_at_mirror_direction() {
        let bdf = Bdf::Glossy {
            albedo: grey(0.9),
            exponent: 30.0,
        };
        let view = Vec3::new(1.0, 1.0, 0.0).normalize();
        let mirror = reflect(-view, Vec3::Y);
        let at_mirror = bdf.evaluate(view, Vec3::Y, mirror, 1.0).mean();
        let off_mirror = bdf.evaluate(view, Vec3::Y, Vec3::Y, 1.0).mean();
        assert!(at_mirror > off_mirror);
    }

    #[test]
    fn test_cosine_emission() {
        let e = Emission::Cosine {
            radiance: Light::white(),
            power: 1.0,
        };
        let side = Vec3::new(1.0, 1.0, 0.0).normalize();
        let got = e.emittance(side, Vec3::Y).spectrum()[0];
        assert!((got - side.y).abs() < 1e-6);
        assert!(e.emittance(-Vec3::Y, Vec3::Y).is_black());
    }

    #[test]
    fn test_beer_lambert() {
        let interior = Interior::Absorbing {
            transmittance: grey(0.5),
        };
        let a = interior.attenuation(Vec3::ZERO, Vec3::X, 2.0);
        assert!((a.mean() - 0.25).abs() < 1e-6);
        assert_eq!(interior.attenuation(Vec3::ZERO, Vec3::X, 0.0), Dye::clear());
    }

    #[test]
    fn test_procedural_material() {
        let source = MaterialSource::procedural(|p: Vec3| {
            if p.x > 0.0 {
                Material::emitter(Light::white())
            } else {
                Material::absorber()
            }
        });
        assert!(source.at(Vec3::X).emission.is_some());
        assert!(source.at(-Vec3::X).emission.is_none());
        assert_eq!(format!("{:?}", source), "Procedural(..)");
    }

    #[test]
    fn test_reflect() {
        let v = Vec3::new(1.0, -1.0, 0.0);
        let n = Vec3::new(0.0, 1.0, 0.0);
        let r = reflect(v, n);
        assert!((r - Vec3::new(1.0, 1.0, 0.0)).length() < 0.0001);
    }

    #[test]
    fn test_schlick_at_normal_incidence() {
        let r = reflectance(1.0, 1.5);
        assert!((r - 0.04).abs() < 1e-4);
    }
}
