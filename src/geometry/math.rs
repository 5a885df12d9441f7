//! Scalar helpers shared by the synthesizers: volumes, radius comparison,
//! random placement inside a spherical shell and grid snapping.

use float_cmp::{ApproxEq, F32Margin};
use glam::Vec3;
use rand::Rng;

/// ULP scale applied to the machine epsilon when comparing two radii.
pub const RADIUS_ULP_SCALE: f32 = 100_000.0;

/// Scaled-epsilon equality used to pick pills over cone-pills.
///
/// `|x - y| <= eps * |x + y| * 100000`, or the difference is subnormal.
#[inline]
pub fn almost_equal(x: f32, y: f32) -> bool {
    let margin = F32Margin {
        epsilon: f32::EPSILON * (x + y).abs() * RADIUS_ULP_SCALE,
        ulps: 0,
    };
    x.approx_eq(y, margin) || (x - y).abs() < f32::MIN_POSITIVE
}

#[inline]
pub fn sphere_volume(radius: f32) -> f32 {
    4.0 / 3.0 * std::f32::consts::PI * radius * radius * radius
}

/// Frustum volume `π h (r0² + r0 r1 + r1²) / 3`.
#[inline]
pub fn cone_volume(height: f32, r0: f32, r1: f32) -> f32 {
    std::f32::consts::PI * height * (r0 * r0 + r0 * r1 + r1 * r1) / 3.0
}

/// Polyline length of a point sequence.
pub fn polyline_length<I>(points: I) -> f32
where
    I: IntoIterator<Item = Vec3>,
{
    let mut iter = points.into_iter();
    let Some(mut previous) = iter.next() else {
        return 0.0;
    };
    let mut length = 0.0;
    for p in iter {
        length += previous.distance(p);
        previous = p;
    }
    length
}

/// Uniform random unit vector (rejection sampled in the unit cube).
pub fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        let len_sq = v.length_squared();
        if len_sq > 1e-6 && len_sq <= 1.0 {
            return v / len_sq.sqrt();
        }
    }
}

/// Uniform random point (by volume) in the shell `inner <= |p| <= outer`,
/// relative to the shell center.
pub fn random_point_in_shell<R: Rng + ?Sized>(rng: &mut R, inner: f32, outer: f32) -> Vec3 {
    let inner = inner.max(0.0);
    let outer = outer.max(inner);
    let (i3, o3) = (inner * inner * inner, outer * outer * outer);
    let u: f32 = rng.random();
    let radius = (i3 + (o3 - i3) * u).cbrt();
    random_direction(rng) * radius
}

/// Pulls `p` back into the shell `inner <= |p| <= outer` along its own
/// direction. The zero vector is pushed out along +X.
pub fn project_into_shell(p: Vec3, inner: f32, outer: f32) -> Vec3 {
    let len = p.length();
    if len <= f32::EPSILON {
        return Vec3::X * inner;
    }
    p * (len.clamp(inner, outer) / len)
}

/// Snaps a position onto a regular grid of the given cell size.
#[inline]
pub fn align_to_grid(p: Vec3, cell: f32) -> Vec3 {
    if cell <= 0.0 {
        return p;
    }
    (p / cell).trunc() * cell
}
