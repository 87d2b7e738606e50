//! Signed distance functions for the scene's leaf shapes.
//!
//! Solids (sphere, box, plane) return a true signed distance, negative
//! inside. Triangles and quads have no interior: they are treated as slabs
//! of half-thickness [`THIN_HALF_THICKNESS`] around the unsigned distance to
//! the face, which keeps the gradient well defined right at the surface.

use lumen_math::Vec3;

use crate::march::EPSILON;

/// Half-thickness given to zero-volume faces (triangles and quads).
///
/// Kept below the marcher's escape epsilon so a ray leaving one side of a
/// face always clears the other side in its escape phase.
pub const THIN_HALF_THICKNESS: f32 = EPSILON * 0.25;

/// Default radius of the enclosing horizon shell.
pub const HORIZON_RADIUS: f32 = 500.0;

/// Leaf shape of the scene graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { center: Vec3, radius: f32 },
    /// Axis-aligned box given by its center and half extents.
    Box { center: Vec3, half_extents: Vec3 },
    /// Half-space `dot(p - point, normal) <= 0`; `normal` points out of the solid.
    Plane { point: Vec3, normal: Vec3 },
    Triangle { a: Vec3, b: Vec3, c: Vec3 },
    /// Parallelogram spanned by `origin + s * u + t * v` for `s, t` in [0, 1].
    Quad { origin: Vec3, u: Vec3, v: Vec3 },
    /// A far shell around the origin, seen from inside.
    ///
    /// When a ray direction is available the horizon is a backdrop plane
    /// facing that ray at `radius`; otherwise it is the sphere of that radius.
    Horizon { radius: f32 },
}

impl Shape {
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Shape::Sphere { center, radius }
    }

    pub fn cuboid(center: Vec3, half_extents: Vec3) -> Self {
        Shape::Box {
            center,
            half_extents,
        }
    }

    /// Plane through `point` with outward `normal` (normalized here).
    pub fn plane(point: Vec3, normal: Vec3) -> Self {
        Shape::Plane {
            point,
            normal: normal.try_normalize().unwrap_or(Vec3::Y),
        }
    }

    pub fn triangle(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Shape::Triangle { a, b, c }
    }

    pub fn quad(origin: Vec3, u: Vec3, v: Vec3) -> Self {
        Shape::Quad { origin, u, v }
    }

    pub fn horizon() -> Self {
        Shape::Horizon {
            radius: HORIZON_RADIUS,
        }
    }

    /// Signed distance from `p`, optionally knowing the direction of the ray
    /// that is being marched.
    pub fn distance(&self, p: Vec3, direction: Option<Vec3>) -> f32 {
        match *self {
            Shape::Sphere { center, radius } => (p - center).length() - radius,
            Shape::Box {
                center,
                half_extents,
            } => box_distance(p - center, half_extents),
            Shape::Plane { point, normal } => (p - point).dot(normal),
            Shape::Triangle { a, b, c } => triangle_distance(p, a, b, c) - THIN_HALF_THICKNESS,
            Shape::Quad { origin, u, v } => {
                quad_distance(p, origin, origin + u, origin + u + v, origin + v)
                    - THIN_HALF_THICKNESS
            }
            Shape::Horizon { radius } => match direction {
                Some(dir) => radius - p.dot(dir),
                None => radius - p.length(),
            },
        }
    }
}

fn box_distance(p: Vec3, half_extents: Vec3) -> f32 {
    let q = p.abs() - half_extents;
    let outside = q.max(Vec3::ZERO).length();
    let inside = q.max_element().min(0.0);
    outside + inside
}

#[inline]
fn dot2(v: Vec3) -> f32 {
    v.dot(v)
}

#[inline]
fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Squared distance from `offset` to the segment `[0, edge]`.
#[inline]
fn edge_distance2(edge: Vec3, offset: Vec3) -> f32 {
    let t = (edge.dot(offset) / dot2(edge)).clamp(0.0, 1.0);
    dot2(edge * t - offset)
}

/// Unsigned distance to a triangle.
fn triangle_distance(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> f32 {
    let ba = b - a;
    let pa = p - a;
    let cb = c - b;
    let pb = p - b;
    let ac = a - c;
    let pc = p - c;
    let nor = ba.cross(ac);

    let outside = sign(ba.cross(nor).dot(pa)) + sign(cb.cross(nor).dot(pb)) + sign(ac.cross(nor).dot(pc))
        < 2.0;

    let d2 = if outside {
        edge_distance2(ba, pa)
            .min(edge_distance2(cb, pb))
            .min(edge_distance2(ac, pc))
    } else {
        nor.dot(pa) * nor.dot(pa) / dot2(nor)
    };
    d2.sqrt()
}

/// Unsigned distance to a planar quad with vertices in winding order.
fn quad_distance(p: Vec3, a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> f32 {
    let ba = b - a;
    let pa = p - a;
    let cb = c - b;
    let pb = p - b;
    let dc = d - c;
    let pc = p - c;
    let ad = a - d;
    let pd = p - d;
    let nor = ba.cross(ad);

    let outside = sign(ba.cross(nor).dot(pa))
        + sign(cb.cross(nor).dot(pb))
        + sign(dc.cross(nor).dot(pc))
        + sign(ad.cross(nor).dot(pd))
        < 3.0;

    let d2 = if outside {
        edge_distance2(ba, pa)
            .min(edge_distance2(cb, pb))
            .min(edge_distance2(dc, pc))
            .min(edge_distance2(ad, pd))
    } else {
        nor.dot(pa) * nor.dot(pa) / dot2(nor)
    };
    d2.sqrt()
}
