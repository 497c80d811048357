//! Plane-constrained projection of clicks.
//!
//! A click defines a ray from the camera center. The ray is clipped to the
//! segment `[C, C + far_clip * dir]` and intersected with a plane; hits
//! outside the open segment are reported so the caller can fall back to
//! another strategy.

use facade_core::{Pt2, Pt3, Ray, Real, ViewCamera};
use thiserror::Error;

use crate::Plane;

/// Errors raised by plane-constrained projection.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    /// The ray is parallel to the plane.
    #[error("ray is parallel to the plane")]
    Parallel,
    /// The intersection is behind the camera or beyond the far clip.
    #[error("plane intersection outside the view segment (u = {0:.3})")]
    OutOfRange(Real),
    /// The far clip distance is not a positive finite number.
    #[error("invalid far clip distance {0}")]
    InvalidFarClip(Real),
}

/// Intersect the segment `[ray.origin, ray.point_at(far_clip)]` with `plane`.
///
/// Succeeds only when the segment parameter `u` is in the open interval
/// `(0, 1)`.
pub fn intersect_ray_plane(
    ray: &Ray,
    plane: &Plane,
    far_clip: Real,
) -> Result<Pt3, ProjectionError> {
    if !(far_clip > 0.0 && far_clip.is_finite()) {
        return Err(ProjectionError::InvalidFarClip(far_clip));
    }
    let p1 = ray.origin;
    let p2 = ray.point_at(far_clip);
    let denom = plane.normal.dot(&(p2 - p1));
    if denom.abs() <= Real::EPSILON {
        return Err(ProjectionError::Parallel);
    }
    let u = -plane.signed_distance(&p1) / denom;
    if !(u > 0.0 && u < 1.0) {
        return Err(ProjectionError::OutOfRange(u));
    }
    Ok(p1 + (p2 - p1) * u)
}

/// Project a camera-space click onto `plane` along the camera ray.
pub fn project_on_plane(
    view: &ViewCamera,
    click: &Pt2,
    plane: &Plane,
    far_clip: Real,
) -> Result<Pt3, ProjectionError> {
    intersect_ray_plane(&view.ray_through(click), plane, far_clip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facade_core::Vec3;

    fn wall(z: Real) -> Plane {
        Plane::from_normal_and_point(&Vec3::z(), &Pt3::new(0.0, 0.0, z)).unwrap()
    }

    fn ray() -> Ray {
        Ray {
            origin: Pt3::new(0.0, 0.0, 10.0),
            dir: Vec3::new(0.0, 0.6, -0.8),
        }
    }

    #[test]
    fn hit_inside_the_segment() {
        let p = intersect_ray_plane(&ray(), &wall(2.0), 100.0).unwrap();
        assert!((p - Pt3::new(0.0, 6.0, 2.0)).norm() < 1e-12);
    }

    #[test]
    fn behind_or_beyond_is_out_of_range() {
        assert!(matches!(
            intersect_ray_plane(&ray(), &wall(12.0), 100.0),
            Err(ProjectionError::OutOfRange(u)) if u < 0.0
        ));
        assert!(matches!(
            intersect_ray_plane(&ray(), &wall(2.0), 5.0),
            Err(ProjectionError::OutOfRange(u)) if u > 1.0
        ));
    }

    #[test]
    fn parallel_ray_is_reported() {
        let plane = Plane::from_normal_and_point(&Vec3::x(), &Pt3::new(3.0, 0.0, 0.0)).unwrap();
        assert_eq!(
            intersect_ray_plane(&ray(), &plane, 100.0),
            Err(ProjectionError::Parallel)
        );
        assert_eq!(
            intersect_ray_plane(&ray(), &wall(2.0), 0.0),
            Err(ProjectionError::InvalidFarClip(0.0))
        );
    }
}
