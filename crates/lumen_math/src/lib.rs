// Re-export glam for convenience
pub use glam::*;

// Lumen math types
mod ray;
mod transform;
pub use ray::Ray;
pub use transform::{orthonormal_basis, Mat3Ext};
