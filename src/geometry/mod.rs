//! Primitive vocabulary produced by synthesis.
//!
//! Parametric primitives (`Sphere`, `Cylinder`, `Cone`) are rendered as-is.
//! SDF primitives additionally blend smoothly with the neighbors recorded
//! for them in the morphology's neighbor graph.

pub mod math;

use glam::{Affine3A, Vec3};

/// Displacement parameters `[amplitude, frequency, unused]` before scaling.
pub const DISPLACEMENT_PARAMS: [f32; 3] = [0.05, 2.0, 0.0];

/// Scales [`DISPLACEMENT_PARAMS`] by a per-category ratio.
#[inline]
pub fn displacement(ratio: f32) -> [f32; 3] {
    [
        DISPLACEMENT_PARAMS[0] * ratio,
        DISPLACEMENT_PARAMS[1] * ratio,
        DISPLACEMENT_PARAMS[2] * ratio,
    ]
}

// ── Shape ──

/// Geometric part of a primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { center: Vec3, radius: f32 },
    Cylinder { p0: Vec3, p1: Vec3, radius: f32 },
    Cone { p0: Vec3, p1: Vec3, r0: f32, r1: f32 },
    SdfSphere { center: Vec3, radius: f32, displacement: [f32; 3] },
    /// Capsule: constant radius between two endpoints
    SdfPill { p0: Vec3, p1: Vec3, radius: f32, displacement: [f32; 3] },
    /// Tapered capsule, linear radius interpolation
    SdfConePill { p0: Vec3, p1: Vec3, r0: f32, r1: f32, displacement: [f32; 3] },
    /// Tapered capsule with sigmoid radius interpolation (soma connectors)
    SdfConePillSigmoid { p0: Vec3, p1: Vec3, r0: f32, r1: f32, displacement: [f32; 3] },
}

/// Discriminant of [`Shape`], used for counting and packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    Sphere = 0,
    Cylinder = 1,
    Cone = 2,
    SdfSphere = 3,
    SdfPill = 4,
    SdfConePill = 5,
    SdfConePillSigmoid = 6,
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Sphere { .. } => ShapeKind::Sphere,
            Shape::Cylinder { .. } => ShapeKind::Cylinder,
            Shape::Cone { .. } => ShapeKind::Cone,
            Shape::SdfSphere { .. } => ShapeKind::SdfSphere,
            Shape::SdfPill { .. } => ShapeKind::SdfPill,
            Shape::SdfConePill { .. } => ShapeKind::SdfConePill,
            Shape::SdfConePillSigmoid { .. } => ShapeKind::SdfConePillSigmoid,
        }
    }

    pub fn is_sdf(&self) -> bool {
        matches!(
            self,
            Shape::SdfSphere { .. }
                | Shape::SdfPill { .. }
                | Shape::SdfConePill { .. }
                | Shape::SdfConePillSigmoid { .. }
        )
    }

    /// Endpoints `(p0, p1)`. Spheres report their center twice.
    pub fn endpoints(&self) -> (Vec3, Vec3) {
        match *self {
            Shape::Sphere { center, .. } | Shape::SdfSphere { center, .. } => (center, center),
            Shape::Cylinder { p0, p1, .. }
            | Shape::Cone { p0, p1, .. }
            | Shape::SdfPill { p0, p1, .. }
            | Shape::SdfConePill { p0, p1, .. }
            | Shape::SdfConePillSigmoid { p0, p1, .. } => (p0, p1),
        }
    }

    /// Radii `(r0, r1)`. Constant-radius shapes report the radius twice.
    pub fn radii(&self) -> (f32, f32) {
        match *self {
            Shape::Sphere { radius, .. }
            | Shape::SdfSphere { radius, .. }
            | Shape::Cylinder { radius, .. }
            | Shape::SdfPill { radius, .. } => (radius, radius),
            Shape::Cone { r0, r1, .. }
            | Shape::SdfConePill { r0, r1, .. }
            | Shape::SdfConePillSigmoid { r0, r1, .. } => (r0, r1),
        }
    }

    pub fn displacement(&self) -> [f32; 3] {
        match *self {
            Shape::SdfSphere { displacement, .. }
            | Shape::SdfPill { displacement, .. }
            | Shape::SdfConePill { displacement, .. }
            | Shape::SdfConePillSigmoid { displacement, .. } => displacement,
            _ => [0.0; 3],
        }
    }

    /// Applies `f` to every endpoint, keeping radii.
    pub fn map_points(&mut self, f: impl Fn(Vec3) -> Vec3) {
        match self {
            Shape::Sphere { center, .. } | Shape::SdfSphere { center, .. } => *center = f(*center),
            Shape::Cylinder { p0, p1, .. }
            | Shape::Cone { p0, p1, .. }
            | Shape::SdfPill { p0, p1, .. }
            | Shape::SdfConePill { p0, p1, .. }
            | Shape::SdfConePillSigmoid { p0, p1, .. } => {
                *p0 = f(*p0);
                *p1 = f(*p1);
            }
        }
    }
}

// ── Primitive ──

/// What a primitive belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Position of the owning section in the morphology's section list
    Section(usize),
    /// Soma connectors, organelles and synapse spines
    Group,
}

/// A shape plus its rendering and simulation tags.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub shape: Shape,
    pub material_id: usize,
    pub user_data: Option<u64>,
    pub owner: Owner,
    /// Blending neighborhood; primitives of different groups never blend
    pub group_id: u32,
}

/// Tags shared by every primitive emitted for one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveTag {
    pub material_id: usize,
    pub user_data: Option<u64>,
    pub owner: Owner,
    pub group_id: u32,
}

impl Primitive {
    pub fn new(shape: Shape, tag: PrimitiveTag) -> Self {
        Self {
            shape,
            material_id: tag.material_id,
            user_data: tag.user_data,
            owner: tag.owner,
            group_id: tag.group_id,
        }
    }

    pub fn is_sdf(&self) -> bool {
        self.shape.is_sdf()
    }

    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    /// Moves the primitive into world space (and optionally onto a grid).
    pub fn transform(&mut self, transform: &Affine3A, grid: f32) {
        self.shape.map_points(|p| math::align_to_grid(transform.transform_point3(p), grid));
    }
}

// ── Bounds ──

/// Axis-aligned bounding box over merged points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }
}

impl Bounds {
    pub fn merge(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn merge_bounds(&mut self, other: &Bounds) {
        if !other.is_empty() {
            self.merge(other.min);
            self.merge(other.max);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag() -> PrimitiveTag {
        PrimitiveTag {
            material_id: 3,
            user_data: Some(42),
            owner: Owner::Section(1),
            group_id: 9,
        }
    }

    #[test]
    fn test_shape_accessors() {
        let s = Shape::SdfConePill {
            p0: Vec3::ZERO,
            p1: Vec3::X,
            r0: 2.0,
            r1: 1.0,
            displacement: displacement(1.0),
        };
        assert!(s.is_sdf());
        assert_eq!(s.kind(), ShapeKind::SdfConePill);
        assert_eq!(s.endpoints(), (Vec3::ZERO, Vec3::X));
        assert_eq!(s.radii(), (2.0, 1.0));
        assert_eq!(s.displacement(), [0.05, 2.0, 0.0]);

        let c = Shape::Sphere { center: Vec3::Y, radius: 0.5 };
        assert!(!c.is_sdf());
        assert_eq!(c.endpoints(), (Vec3::Y, Vec3::Y));
        assert_eq!(c.radii(), (0.5, 0.5));
        assert_eq!(c.displacement(), [0.0; 3]);
    }

    #[test]
    fn test_primitive_tag_is_applied() {
        let p = Primitive::new(Shape::Sphere { center: Vec3::ZERO, radius: 1.0 }, tag());
        assert_eq!(p.material_id, 3);
        assert_eq!(p.user_data, Some(42));
        assert_eq!(p.owner, Owner::Section(1));
        assert_eq!(p.group_id, 9);
    }

    #[test]
    fn test_primitive_transform() {
        let mut p = Primitive::new(
            Shape::Cylinder { p0: Vec3::ZERO, p1: Vec3::X, radius: 1.0 },
            tag(),
        );
        p.transform(&Affine3A::from_translation(Vec3::new(10.0, 0.0, 0.0)), 0.0);
        assert_eq!(p.shape.endpoints(), (Vec3::new(10.0, 0.0, 0.0), Vec3::new(11.0, 0.0, 0.0)));
        assert_eq!(p.shape.radii(), (1.0, 1.0));
    }

    #[test]
    fn test_bounds() {
        let mut b = Bounds::default();
        assert!(b.is_empty());
        b.merge(Vec3::new(-1.0, 0.0, 2.0));
        b.merge(Vec3::new(3.0, 4.0, -2.0));
        assert!(!b.is_empty());
        assert_eq!(b.min, Vec3::new(-1.0, 0.0, -2.0));
        assert_eq!(b.max, Vec3::new(3.0, 4.0, 2.0));

        let mut scene = Bounds::default();
        scene.merge_bounds(&Bounds::default());
        assert!(scene.is_empty());
        scene.merge_bounds(&b);
        assert_eq!(scene, b);
    }
}
