//! Plane estimation from 3D support points.
//!
//! Two LMedS kernels share the same engine:
//! - [`PlaneKernel`]: minimal sample of 3 points, plane through them;
//! - [`LineConstrainedPlaneKernel`]: minimal sample of 1 point, plane through
//!   it and a fixed anchor segment (used when extending an existing edge).
//!
//! Both report collinear samples as degenerate so the engine skips them. A
//! least-squares fit ([`fit_plane_least_squares`]) is used for the planes of
//! existing faces, whose vertices are exact.

use facade_core::{lmeds, Estimator, LmedsOptions, Pt3, Real, Vec3, Vec4};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sine of the angle below which two edge vectors count as collinear.
const COLLINEAR_SIN: Real = 1e-9;
/// Allowed deviation of a unit normal from length one.
const UNIT_TOL: Real = 1e-6;
/// Eigenvalue ratio under which a point set is considered rank deficient.
const RANK_THRESHOLD: Real = 1e-10;

/// Errors raised by plane estimation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlaneFitError {
    /// Fewer points than the minimal sample.
    #[error("need at least {need} points for a plane fit, got {got}")]
    NotEnoughPoints { need: usize, got: usize },
    /// The anchor segment of a constrained fit has zero length.
    #[error("constraint segment has zero length")]
    DegenerateConstraint,
    /// Every candidate was degenerate (collinear or coincident points).
    #[error("no non-degenerate plane could be fitted")]
    Degenerate,
    /// The best candidate exceeded the configured outlier threshold.
    #[error("best plane median residual {median:.3e} exceeds the outlier threshold")]
    Rejected { median: Real },
}

/// Plane `n . x + d = 0` with unit normal `n`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub d: Real,
}

impl Plane {
    /// Plane with normal `normal` (any length) through `point`.
    ///
    /// Returns `None` for a zero or non-finite normal.
    pub fn from_normal_and_point(normal: &Vec3, point: &Pt3) -> Option<Self> {
        let n = normal.try_normalize(0.0)?;
        if !n.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Self {
            normal: n,
            d: -n.dot(&point.coords),
        })
    }

    /// Plane from its 4-vector `(a, b, c, d)`, renormalized.
    pub fn from_vec4(v: &Vec4) -> Option<Self> {
        let n = Vec3::new(v.x, v.y, v.z);
        let len = n.norm();
        if len <= 0.0 || !len.is_finite() || !v.w.is_finite() {
            return None;
        }
        Some(Self {
            normal: n / len,
            d: v.w / len,
        })
    }

    pub fn to_vec4(&self) -> Vec4 {
        Vec4::new(self.normal.x, self.normal.y, self.normal.z, self.d)
    }

    pub fn signed_distance(&self, p: &Pt3) -> Real {
        self.normal.dot(&p.coords) + self.d
    }

    pub fn distance(&self, p: &Pt3) -> Real {
        self.signed_distance(p).abs()
    }

    /// Whether the normal is finite and of unit length.
    pub fn is_valid(&self) -> bool {
        self.d.is_finite()
            && self.normal.iter().all(|v| v.is_finite())
            && (self.normal.norm() - 1.0).abs() < UNIT_TOL
    }
}

/// Whether `a` and `b` span a plane: both non-zero and not parallel.
fn spans_plane(a: &Vec3, b: &Vec3) -> bool {
    let (na, nb) = (a.norm(), b.norm());
    if na <= 0.0 || nb <= 0.0 {
        return false;
    }
    a.cross(b).norm() > COLLINEAR_SIN * na * nb
}

/// Three-point plane kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaneKernel;

impl Estimator for PlaneKernel {
    type Datum = Pt3;
    type Model = Plane;

    const MIN_SAMPLES: usize = 3;

    fn fit(&self, data: &[Pt3], sample_indices: &[usize]) -> Option<Plane> {
        let p0 = data[sample_indices[0]];
        let e1 = data[sample_indices[1]] - p0;
        let e2 = data[sample_indices[2]] - p0;
        if !spans_plane(&e1, &e2) {
            return None;
        }
        Plane::from_normal_and_point(&e1.cross(&e2), &p0)
    }

    fn residual(&self, model: &Plane, datum: &Pt3) -> Real {
        model.distance(datum)
    }
}

/// One-point kernel whose planes all contain the segment `[p0, p1]`.
#[derive(Debug, Clone, Copy)]
pub struct LineConstrainedPlaneKernel {
    p0: Pt3,
    dir: Vec3,
}

impl LineConstrainedPlaneKernel {
    /// Returns `None` when the anchors coincide.
    pub fn new(p0: Pt3, p1: Pt3) -> Option<Self> {
        let dir = p1 - p0;
        (dir.norm() > 0.0).then_some(Self { p0, dir })
    }
}

impl Estimator for LineConstrainedPlaneKernel {
    type Datum = Pt3;
    type Model = Plane;

    const MIN_SAMPLES: usize = 1;

    fn fit(&self, data: &[Pt3], sample_indices: &[usize]) -> Option<Plane> {
        let e = data[sample_indices[0]] - self.p0;
        if !spans_plane(&self.dir, &e) {
            return None;
        }
        Plane::from_normal_and_point(&self.dir.cross(&e), &self.p0)
    }

    fn residual(&self, model: &Plane, datum: &Pt3) -> Real {
        model.distance(datum)
    }
}

/// Robust plane estimate.
#[derive(Debug, Clone)]
pub struct PlaneFit {
    pub plane: Plane,
    /// Median squared point-to-plane distance.
    pub median: Real,
    /// Indices of points consistent with the plane.
    pub inliers: Vec<usize>,
}

fn run<E: Estimator<Datum = Pt3, Model = Plane>>(
    kernel: &E,
    points: &[Pt3],
    opts: &LmedsOptions,
) -> Result<PlaneFit, PlaneFitError> {
    if points.len() < E::MIN_SAMPLES {
        return Err(PlaneFitError::NotEnoughPoints {
            need: E::MIN_SAMPLES,
            got: points.len(),
        });
    }
    let res = lmeds(kernel, points, opts);
    let Some(plane) = res.model else {
        if res.median.is_finite() {
            return Err(PlaneFitError::Rejected {
                median: res.median.sqrt(),
            });
        }
        return Err(PlaneFitError::Degenerate);
    };
    if !plane.is_valid() {
        debug!("plane fit produced an invalid plane {:?}", plane.to_vec4());
        return Err(PlaneFitError::Degenerate);
    }
    Ok(PlaneFit {
        plane,
        median: res.median,
        inliers: res.inliers,
    })
}

/// Robust plane through a point set (LMedS, minimal sample 3).
pub fn fit_plane(points: &[Pt3], opts: &LmedsOptions) -> Result<PlaneFit, PlaneFitError> {
    run(&PlaneKernel, points, opts)
}

/// Robust plane through a point set that contains the segment `[p0, p1]`
/// (LMedS, minimal sample 1).
pub fn fit_plane_with_line_constraint(
    points: &[Pt3],
    p0: &Pt3,
    p1: &Pt3,
    opts: &LmedsOptions,
) -> Result<PlaneFit, PlaneFitError> {
    let kernel =
        LineConstrainedPlaneKernel::new(*p0, *p1).ok_or(PlaneFitError::DegenerateConstraint)?;
    run(&kernel, points, opts)
}

/// Least-squares plane through exact points (e.g. the corners of a face).
///
/// The normal is the eigenvector of the smallest eigenvalue of the centered
/// covariance. Collinear or coincident points are rejected.
pub fn fit_plane_least_squares(points: &[Pt3]) -> Result<Plane, PlaneFitError> {
    if points.len() < 3 {
        return Err(PlaneFitError::NotEnoughPoints {
            need: 3,
            got: points.len(),
        });
    }
    let n = points.len() as Real;
    let centroid = points.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords) / n;
    let mut cov = nalgebra::Matrix3::<Real>::zeros();
    for p in points {
        let c = p.coords - centroid;
        cov += c * c.transpose();
    }

    let eigen = cov.symmetric_eigen();
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    let (min_idx, mid, max) = (
        order[0],
        eigen.eigenvalues[order[1]],
        eigen.eigenvalues[order[2]],
    );
    if max <= 0.0 || mid / max < RANK_THRESHOLD {
        return Err(PlaneFitError::Degenerate);
    }

    let normal = eigen.eigenvectors.column(min_idx).into_owned();
    Plane::from_normal_and_point(&normal, &Pt3::from(centroid)).ok_or(PlaneFitError::Degenerate)
}
