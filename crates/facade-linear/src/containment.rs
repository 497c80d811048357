//! Point-cloud containment in a clicked polygon.
//!
//! A polygon drawn in one camera selects the cloud points whose projection
//! falls inside it. Inside means a non-zero winding number; points exactly on
//! an edge are classified outside, and points behind the camera are never
//! inside.

use facade_core::{CameraId, PointCloud, Pt2, Pt3, Real, ViewCamera};
use log::debug;
use thiserror::Error;

/// Errors raised while gathering the cloud points inside a polygon.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContainmentError {
    #[error("polygon needs at least 3 vertices, got {0}")]
    DegeneratePolygon(usize),
    #[error("only {got} cloud points inside the polygon of camera {camera}, need {need}")]
    NotEnoughPoints {
        camera: CameraId,
        got: usize,
        need: usize,
    },
}

/// `> 0` when `p` is left of the line `a -> b`, `0` on it, `< 0` right of it.
fn is_left(a: &Pt2, b: &Pt2, p: &Pt2) -> Real {
    (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y)
}

fn on_segment(a: &Pt2, b: &Pt2, p: &Pt2) -> bool {
    is_left(a, b, p) == 0.0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

fn edges(polygon: &[Pt2]) -> impl Iterator<Item = (&Pt2, &Pt2)> + '_ {
    polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .take(polygon.len())
}

/// Winding number of `polygon` (implicitly closed) around `p`.
///
/// Horizontal edges never cross the upward/downward test and do not
/// contribute.
pub fn winding_number(polygon: &[Pt2], p: &Pt2) -> i32 {
    let mut wn = 0;
    for (a, b) in edges(polygon) {
        if a.y <= p.y {
            if b.y > p.y && is_left(a, b, p) > 0.0 {
                wn += 1;
            }
        } else if b.y <= p.y && is_left(a, b, p) < 0.0 {
            wn -= 1;
        }
    }
    wn
}

/// Whether `p` lies exactly on one of the polygon's edges.
pub fn on_boundary(polygon: &[Pt2], p: &Pt2) -> bool {
    edges(polygon).any(|(a, b)| on_segment(a, b, p))
}

/// Strict containment: non-zero winding number and not on an edge.
pub fn polygon_contains(polygon: &[Pt2], p: &Pt2) -> bool {
    polygon.len() >= 3 && !on_boundary(polygon, p) && winding_number(polygon, p) != 0
}

/// World points whose camera-space projection lies inside `polygon`.
///
/// `polygon` is given in camera space of `view`. Points behind the camera are
/// skipped.
pub fn contained_points(
    view: &ViewCamera,
    polygon: &[Pt2],
    candidates: &[Pt3],
) -> Result<Vec<Pt3>, ContainmentError> {
    if polygon.len() < 3 {
        return Err(ContainmentError::DegeneratePolygon(polygon.len()));
    }
    Ok(candidates
        .iter()
        .filter(|pw| view.camera.is_in_front(pw))
        .filter(|pw| polygon_contains(polygon, &view.to_camera_space(pw)))
        .copied()
        .collect())
}

/// Cloud points visible from `view` and inside `polygon`, requiring at least
/// `min_points` of them.
pub fn cloud_support(
    view: &ViewCamera,
    polygon: &[Pt2],
    cloud: &PointCloud,
    min_points: usize,
) -> Result<Vec<Pt3>, ContainmentError> {
    let visible = cloud.visible_points(view.id);
    let inside = contained_points(view, polygon, &visible)?;
    debug!(
        "camera {}: {} of {} visible cloud points inside polygon",
        view.id,
        inside.len(),
        visible.len()
    );
    if inside.len() < min_points {
        return Err(ContainmentError::NotEnoughPoints {
            camera: view.id,
            got: inside.len(),
            need: min_points,
        });
    }
    Ok(inside)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<Pt2> {
        vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn unit_square_containment() {
        let sq = unit_square();
        assert!(polygon_contains(&sq, &Pt2::new(0.5, 0.5)));
        assert!(!polygon_contains(&sq, &Pt2::new(1.5, 0.5)));
        assert!(!polygon_contains(&sq, &Pt2::new(-0.5, 0.5)));
        assert!(!polygon_contains(&sq, &Pt2::new(0.5, 1.5)));
    }

    #[test]
    fn edge_points_are_outside_on_every_call() {
        let sq = unit_square();
        let boundary = [
            Pt2::new(0.5, 0.0),
            Pt2::new(1.0, 0.5),
            Pt2::new(0.5, 1.0),
            Pt2::new(0.0, 0.5),
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 1.0),
        ];
        for _ in 0..3 {
            for p in &boundary {
                assert!(!polygon_contains(&sq, p), "{p:?} should be outside");
            }
        }
    }

    #[test]
    fn winding_sign_follows_orientation() {
        let mut sq = unit_square();
        assert_eq!(winding_number(&sq, &Pt2::new(0.5, 0.5)), 1);
        sq.reverse();
        assert_eq!(winding_number(&sq, &Pt2::new(0.5, 0.5)), -1);
        assert!(polygon_contains(&sq, &Pt2::new(0.5, 0.5)));
    }

    #[test]
    fn degenerate_polygon_is_rejected() {
        assert!(!polygon_contains(&unit_square()[..2], &Pt2::new(0.5, 0.0)));
    }

    /// U shape: two arms joined at the bottom, with a notch between them.
    fn u_shape() -> Vec<Pt2> {
        vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(3.0, 0.0),
            Pt2::new(3.0, 3.0),
            Pt2::new(2.0, 3.0),
            Pt2::new(2.0, 1.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(1.0, 3.0),
            Pt2::new(0.0, 3.0),
        ]
    }

    #[test]
    fn non_convex_polygon_excludes_its_notch() {
        let u = u_shape();
        assert!(!polygon_contains(&u, &Pt2::new(1.5, 2.0)));
        assert!(polygon_contains(&u, &Pt2::new(0.5, 2.0)));
        assert!(polygon_contains(&u, &Pt2::new(2.5, 2.0)));
        assert!(polygon_contains(&u, &Pt2::new(1.5, 0.5)));
        assert!(!polygon_contains(&u, &Pt2::new(1.5, 3.5)));
    }

    #[test]
    fn points_level_with_vertices_are_counted_once() {
        let u = u_shape();
        // y = 1 passes through the two inner vertices of the notch.
        assert_eq!(winding_number(&u, &Pt2::new(0.5, 1.0)), 1);
        assert_eq!(winding_number(&u, &Pt2::new(2.5, 1.0)), 1);
        assert_eq!(winding_number(&u, &Pt2::new(-1.0, 1.0)), 0);
        assert_eq!(winding_number(&u, &Pt2::new(4.0, 1.0)), 0);
        // On the notch floor.
        assert!(!polygon_contains(&u, &Pt2::new(1.5, 1.0)));
        // y = 3 passes through the tops of both arms.
        assert_eq!(winding_number(&u, &Pt2::new(1.5, 3.0)), 0);
        assert!(!polygon_contains(&u, &Pt2::new(0.5, 3.0)));
    }
}
