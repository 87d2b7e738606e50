use crate::Vec3;

/// A ray in 3D space with an origin and a unit-length direction.
///
/// Marching steps are measured in world units along the ray, so the
/// direction is normalized on construction. A degenerate direction falls
/// back to `+Z` rather than producing NaNs.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray, normalizing `direction`.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.try_normalize().unwrap_or(Vec3::Z),
        }
    }

    /// Create a ray from `origin` aimed at `target`.
    pub fn towards(origin: Vec3, target: Vec3) -> Self {
        Self::new(origin, target - origin)
    }

    /// Get the origin point of the ray.
    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Get the (unit) direction of the ray.
    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Get the point along the ray at distance t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_normalizes_direction() {
        let ray = Ray::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 4.0, 0.0));

        assert_eq!(ray.origin, Vec3::new(1.0, 2.0, 3.0));
        assert!((ray.direction - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));

        assert_eq!(ray.at(0.0), Vec3::ZERO);
        assert_eq!(ray.at(1.0), Vec3::X);
        assert_eq!(ray.at(-1.0), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_degenerate_direction_falls_back() {
        let ray = Ray::new(Vec3::ONE, Vec3::ZERO);
        assert_eq!(ray.direction, Vec3::Z);
    }

    #[test]
    fn test_towards() {
        let ray = Ray::towards(Vec3::ZERO, Vec3::new(0.0, 0.0, -5.0));
        assert!((ray.direction + Vec3::Z).length() < 1e-6);
        assert!((ray.at(5.0) - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-5);
    }
}
