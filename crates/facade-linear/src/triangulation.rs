//! Linear N-view triangulation.
//!
//! Uses a DLT formulation on the camera projection matrices and image points.
//! A vertex is re-triangulated from its whole click history every time a click
//! is added, so each extra camera refines the estimate.

use facade_core::{BlindData, CameraSet, Mat34, Observation, PinholeCamera, Pt2, Pt3, Real};
use log::debug;
use nalgebra::DMatrix;
use thiserror::Error;

/// Errors raised by triangulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TriangulationError {
    /// Fewer than two observations.
    #[error("need at least 2 views, got {0}")]
    InsufficientInput(usize),
    /// Camera and point counts differ.
    #[error("mismatched number of cameras ({cameras}) and points ({points})")]
    Mismatched { cameras: usize, points: usize },
    /// SVD did not produce right singular vectors.
    #[error("svd failed during triangulation")]
    SvdFailed,
    /// The homogeneous solution lies at infinity.
    #[error("triangulated point is at infinity (w = {0:.3e})")]
    Degenerate(Real),
}

/// Linear triangulation from projection matrices and matching pixels.
pub fn triangulate_point_linear(
    cameras: &[Mat34],
    points: &[Pt2],
) -> Result<Pt3, TriangulationError> {
    if cameras.len() != points.len() {
        return Err(TriangulationError::Mismatched {
            cameras: cameras.len(),
            points: points.len(),
        });
    }
    if cameras.len() < 2 {
        return Err(TriangulationError::InsufficientInput(cameras.len()));
    }

    let mut a = DMatrix::<Real>::zeros(2 * cameras.len(), 4);
    for (i, (p, cam)) in points.iter().zip(cameras).enumerate() {
        // Scale-normalize each camera so rows from different views weigh alike.
        let scale = cam.row(2).fixed_columns::<3>(0).norm();
        let cam = if scale > 0.0 { cam / scale } else { *cam };
        a.row_mut(2 * i).copy_from(&(p.x * cam.row(2) - cam.row(0)));
        a.row_mut(2 * i + 1).copy_from(&(p.y * cam.row(2) - cam.row(1)));
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(TriangulationError::SvdFailed)?;
    // Singular values are sorted in decreasing order; the last row is the
    // null-space direction.
    let x_h = v_t.row(v_t.nrows() - 1);

    let w = x_h[3];
    if w.abs() <= Real::EPSILON {
        return Err(TriangulationError::Degenerate(w));
    }
    Ok(Pt3::new(x_h[0] / w, x_h[1] / w, x_h[2] / w))
}

/// Triangulate from resolved observations (camera + pixel).
pub fn triangulate(observations: &[Observation<'_>]) -> Result<Pt3, TriangulationError> {
    let cameras: Vec<Mat34> = observations.iter().map(|o| *o.camera.projection()).collect();
    let points: Vec<Pt2> = observations.iter().map(|o| o.pixel).collect();
    triangulate_point_linear(&cameras, &points)
}

/// Triangulate a vertex from its click history.
///
/// Clicks in cameras unknown to `cameras` are ignored.
pub fn triangulate_blind_data(
    blind_data: &BlindData,
    cameras: &CameraSet,
) -> Result<Pt3, TriangulationError> {
    let observations = blind_data.observations(cameras);
    let point = triangulate(&observations)?;
    debug!(
        "triangulated {:?} from {} views, rms reprojection {:.3} px",
        point,
        observations.len(),
        reprojection_rms(&observations, &point)
    );
    Ok(point)
}

/// Pixel distance between a world point's projection and a click.
pub fn reprojection_error(camera: &PinholeCamera, pixel: &Pt2, point: &Pt3) -> Real {
    (camera.project(point) - pixel).norm()
}

/// Root-mean-square reprojection error over observations.
pub fn reprojection_rms(observations: &[Observation<'_>], point: &Pt3) -> Real {
    if observations.is_empty() {
        return 0.0;
    }
    let ss: Real = observations
        .iter()
        .map(|o| reprojection_error(o.camera, &o.pixel, point).powi(2))
        .sum();
    (ss / observations.len() as Real).sqrt()
}
