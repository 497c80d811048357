//! Mathematical utilities and type definitions.
//!
//! This module provides the fundamental types used throughout the workspace
//! and a few helpers for homogeneous coordinates and segment distances.

use nalgebra::{Matrix3, Matrix3x4, Point2, Point3, Vector2, Vector3, Vector4};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 4D vector with [`Real`] components (homogeneous points, plane equations).
pub type Vec4 = Vector4<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 3x4 camera projection matrix `P = K [R | t]`.
pub type Mat34 = Matrix3x4<Real>;

/// Convert a 2D point in Euclidean coordinates into homogeneous coordinates.
///
/// Given a point `p = (x, y)`, returns the homogeneous vector `(x, y, 1)`.
pub fn to_homogeneous(p: &Pt2) -> Vec3 {
    Vec3::new(p.x, p.y, 1.0)
}

/// Convert a 3D point into the homogeneous vector `(x, y, z, 1)`.
pub fn to_homogeneous_3d(p: &Pt3) -> Vec4 {
    Vec4::new(p.x, p.y, p.z, 1.0)
}

/// Convert a 3D homogeneous vector back to a 2D point.
///
/// The input is interpreted as `(x, y, w)` and the result is `(x / w, y / w)`.
/// The caller is responsible for ensuring that `w != 0`.
pub fn from_homogeneous(v: &Vec3) -> Pt2 {
    Pt2::new(v.x / v.z, v.y / v.z)
}

/// Distance from `p` to the segment `[a, b]`.
///
/// The segment is parameterized as `a + t (b - a)`; the projection of `p` is
/// clamped to `t in [0, 1]`. A zero-length segment degrades to the distance to
/// `a`.
pub fn distance_to_segment(a: &Pt2, b: &Pt2, p: &Pt2) -> Real {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= 0.0 {
        return (p - a).norm();
    }
    let t = (p - a).dot(&ab) / len2;
    if t < 0.0 {
        (p - a).norm()
    } else if t > 1.0 {
        (p - b).norm()
    } else {
        (p - (a + ab * t)).norm()
    }
}

/// Median of a slice of finite values, reordering the slice in place.
///
/// For an even count the lower middle element is returned, matching an
/// `nth_element` selection. Returns `None` for an empty slice.
pub fn median_in_place(values: &mut [Real]) -> Option<Real> {
    if values.is_empty() {
        return None;
    }
    let mid = (values.len() - 1) / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    Some(*m)
}
