// Transform utilities for Mat3
//
// Scene rotations must be rigid so that signed distances survive the
// change of frame unscaled. glam already provides inverse() and transpose().

use glam::{Mat3, Vec3};

/// Tolerance used when checking orthonormality.
const RIGID_TOLERANCE: f32 = 1e-4;

/// Extension trait for Mat3 to provide rigid-rotation utilities
pub trait Mat3Ext {
    /// True if the matrix is a proper rotation (orthonormal, determinant +1).
    fn is_rigid_rotation(&self) -> bool;

    /// Inverse of a rigid rotation (its transpose).
    fn rigid_inverse(&self) -> Mat3;
}

impl Mat3Ext for Mat3 {
    fn is_rigid_rotation(&self) -> bool {
        if !self.is_finite() {
            return false;
        }
        let gram = self.transpose() * *self;
        let identity_error = (gram - Mat3::IDENTITY).to_cols_array();
        let orthonormal = identity_error.iter().all(|e| e.abs() < RIGID_TOLERANCE);
        orthonormal && (self.determinant() - 1.0).abs() < RIGID_TOLERANCE
    }

    fn rigid_inverse(&self) -> Mat3 {
        self.transpose()
    }
}

/// Build an orthonormal basis `(t, b)` perpendicular to unit vector `n`.
///
/// Branchless construction from Duff et al., "Building an Orthonormal Basis,
/// Revisited" (2017). Valid for every unit `n`, including the poles.
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let sign = 1.0_f32.copysign(n.z);
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;
    let t = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
    let bitangent = Vec3::new(b, sign + n.y * n.y * a, -n.y);
    (t, bitangent)
}
