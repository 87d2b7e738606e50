//! Scene graph of signed distance fields.
//!
//! The scene is a closed set of node kinds stored in a flat arena. Children
//! are always created before their parents, so a [`NodeId`] can only refer
//! to nodes that already exist and the graph is acyclic by construction.
//! Subtrees may be shared between parents.

use lumen_math::{Mat3, Mat3Ext, Vec3};
use thiserror::Error;

use crate::march::EPSILON;
use crate::material::{Material, MaterialSource};
use crate::primitive::Shape;

/// Step used by the central-difference normal estimate.
///
/// Must stay below the half-thickness of thin faces so both probes land on
/// the same side of a triangle or quad.
pub const NORMAL_EPSILON: f32 = EPSILON * 0.05;

/// Errors that can occur while assembling a scene.
#[derive(Error, Debug, PartialEq)]
pub enum SceneError {
    #[error("Node {0} does not exist in this builder")]
    UnknownNode(usize),

    #[error("Node {0} is a union or intersection with no children")]
    EmptyCombinator(usize),

    #[error("Node {0} rotation is not a rigid rotation")]
    NonRigidRotation(usize),

    #[error("Node {0} has a non-finite translation")]
    InvalidTranslation(usize),

    #[error("Node {node} has an invalid shape: {reason}")]
    InvalidShape { node: usize, reason: &'static str },
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Handle to a node inside a [`SceneBuilder`] / [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Primitive { shape: Shape, material: usize },
    Union(Vec<NodeId>),
    Intersect(Vec<NodeId>),
    /// Swaps inside and outside.
    Negate(NodeId),
    Translate { offset: Vec3, child: NodeId },
    /// Rigid rotation; `inverse` maps world points into the child's frame.
    Rotate { rotation: Mat3, inverse: Mat3, child: NodeId },
}

/// Incremental scene construction.
#[derive(Debug, Default)]
pub struct SceneBuilder {
    nodes: Vec<Node>,
    materials: Vec<MaterialSource>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Add a leaf shape with its material.
    pub fn primitive(&mut self, shape: Shape, material: impl Into<MaterialSource>) -> NodeId {
        self.materials.push(material.into());
        let material = self.materials.len() - 1;
        self.push(Node::Primitive { shape, material })
    }

    pub fn union(&mut self, children: &[NodeId]) -> NodeId {
        self.push(Node::Union(children.to_vec()))
    }

    pub fn intersect(&mut self, children: &[NodeId]) -> NodeId {
        self.push(Node::Intersect(children.to_vec()))
    }

    pub fn negate(&mut self, child: NodeId) -> NodeId {
        self.push(Node::Negate(child))
    }

    /// `a` with `b` carved out of it.
    pub fn difference(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let not_b = self.negate(b);
        self.intersect(&[a, not_b])
    }

    pub fn translate(&mut self, child: NodeId, offset: Vec3) -> NodeId {
        self.push(Node::Translate { offset, child })
    }

    /// Rotate `child` about the origin. Rejected at [`build`](Self::build)
    /// time unless `rotation` is rigid.
    pub fn rotate(&mut self, child: NodeId, rotation: Mat3) -> NodeId {
        self.push(Node::Rotate {
            rotation,
            inverse: rotation.rigid_inverse(),
            child,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Validate the arena and freeze it into a [`Scene`] rooted at `root`.
    pub fn build(self, root: NodeId) -> SceneResult<Scene> {
        if root.0 >= self.nodes.len() {
            return Err(SceneError::UnknownNode(root.0));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            validate_node(index, node)?;
        }

        log::debug!(
            "Built scene: {} nodes, {} materials",
            self.nodes.len(),
            self.materials.len()
        );

        Ok(Scene {
            nodes: self.nodes,
            materials: self.materials,
            root,
        })
    }
}

fn validate_node(index: usize, node: &Node) -> SceneResult<()> {
    let check_child = |child: NodeId| {
        if child.0 < index {
            Ok(())
        } else {
            Err(SceneError::UnknownNode(child.0))
        }
    };

    match node {
        Node::Primitive { shape, .. } => validate_shape(index, shape),
        Node::Union(children) | Node::Intersect(children) => {
            if children.is_empty() {
                return Err(SceneError::EmptyCombinator(index));
            }
            children.iter().try_for_each(|&c| check_child(c))
        }
        Node::Negate(child) => check_child(*child),
        Node::Translate { offset, child } => {
            if !offset.is_finite() {
                return Err(SceneError::InvalidTranslation(index));
            }
            check_child(*child)
        }
        Node::Rotate {
            rotation, child, ..
        } => {
            if !rotation.is_rigid_rotation() {
                return Err(SceneError::NonRigidRotation(index));
            }
            check_child(*child)
        }
    }
}

fn validate_shape(node: usize, shape: &Shape) -> SceneResult<()> {
    let invalid = |reason| Err(SceneError::InvalidShape { node, reason });
    match *shape {
        Shape::Sphere { center, radius } => {
            if !center.is_finite() || !(radius > 0.0 && radius.is_finite()) {
                return invalid("sphere radius must be positive and finite");
            }
        }
        Shape::Box {
            center,
            half_extents,
        } => {
            if !center.is_finite() || !half_extents.is_finite() || half_extents.min_element() < 0.0 {
                return invalid("box half extents must be non-negative and finite");
            }
        }
        Shape::Plane { point, normal } => {
            if !point.is_finite() || !normal.is_finite() {
                return invalid("plane must be finite");
            }
        }
        Shape::Triangle { a, b, c } => {
            if !(a.is_finite() && b.is_finite() && c.is_finite()) || (b - a).cross(c - a).length_squared() == 0.0 {
                return invalid("triangle is degenerate");
            }
        }
        Shape::Quad { origin, u, v } => {
            if !(origin.is_finite() && u.is_finite() && v.is_finite()) || u.cross(v).length_squared() == 0.0 {
                return invalid("quad is degenerate");
            }
        }
        Shape::Horizon { radius } => {
            if !(radius > 0.0 && radius.is_finite()) {
                return invalid("horizon radius must be positive and finite");
            }
        }
    }
    Ok(())
}

/// Immutable, validated scene. Shared read-only between render threads.
#[derive(Debug)]
pub struct Scene {
    nodes: Vec<Node>,
    materials: Vec<MaterialSource>,
    root: NodeId,
}

impl Scene {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Signed distance to the scene at `p`. `direction` is the direction of
    /// the ray being marched, if any.
    pub fn distance(&self, p: Vec3, direction: Option<Vec3>) -> f32 {
        self.node_distance(self.root, p, direction)
    }

    fn node_distance(&self, id: NodeId, p: Vec3, direction: Option<Vec3>) -> f32 {
        match &self.nodes[id.0] {
            Node::Primitive { shape, .. } => shape.distance(p, direction),
            Node::Union(children) => children
                .iter()
                .map(|&c| self.node_distance(c, p, direction))
                .fold(f32::INFINITY, f32::min),
            Node::Intersect(children) => children
                .iter()
                .map(|&c| self.node_distance(c, p, direction))
                .fold(f32::NEG_INFINITY, f32::max),
            Node::Negate(child) => -self.node_distance(*child, p, direction),
            Node::Translate { offset, child } => self.node_distance(*child, p - *offset, direction),
            Node::Rotate { inverse, child, .. } => {
                self.node_distance(*child, *inverse * p, direction.map(|d| *inverse * d))
            }
        }
    }

    /// Outward surface normal at `p`, by central differences of the distance
    /// field. Falls back to `+Y` where the gradient vanishes.
    pub fn normal(&self, p: Vec3) -> Vec3 {
        let h = NORMAL_EPSILON;
        let dx = Vec3::X * h;
        let dy = Vec3::Y * h;
        let dz = Vec3::Z * h;
        let gradient = Vec3::new(
            self.distance(p + dx, None) - self.distance(p - dx, None),
            self.distance(p + dy, None) - self.distance(p - dy, None),
            self.distance(p + dz, None) - self.distance(p - dz, None),
        );
        gradient.try_normalize().unwrap_or(Vec3::Y)
    }

    /// Material of the surface nearest to `p`.
    ///
    /// Unions defer to their nearest child, intersections to the child that
    /// bounds the result. Procedural materials see the primitive-local point.
    pub fn material_at(&self, p: Vec3) -> Material {
        self.node_material(self.root, p)
    }

    fn node_material(&self, id: NodeId, p: Vec3) -> Material {
        match &self.nodes[id.0] {
            Node::Primitive { material, .. } => self.materials[*material].at(p),
            Node::Union(children) => {
                let nearest = self.select_child(children, p, |d, best| d < best);
                self.node_material(nearest, p)
            }
            Node::Intersect(children) => {
                let governing = self.select_child(children, p, |d, best| d > best);
                self.node_material(governing, p)
            }
            Node::Negate(child) => self.node_material(*child, p),
            Node::Translate { offset, child } => self.node_material(*child, p - *offset),
            Node::Rotate { inverse, child, .. } => self.node_material(*child, *inverse * p),
        }
    }

    /// Child whose distance wins under `better`. Combinators are never empty.
    fn select_child(&self, children: &[NodeId], p: Vec3, better: impl Fn(f32, f32) -> bool) -> NodeId {
        let mut best = children[0];
        let mut best_distance = self.node_distance(best, p, None);
        for &child in &children[1..] {
            let d = self.node_distance(child, p, None);
            if better(d, best_distance) {
                best = child;
                best_distance = d;
            }
        }
        best
    }
}
