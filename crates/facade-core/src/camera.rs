//! Pinhole camera model `P = K [R | t]`.
//!
//! [`PinholeCamera`] is an immutable value: `K`, `R`, `t`, the center `C` and
//! the projection matrix `P` are computed once at construction and never
//! mutated independently. Two construction paths are provided, from parts and
//! from an explicit 3x4 projection matrix; the latter is decomposed with an RQ
//! factorization and `P` is recomputed from the recovered parts, so both paths
//! produce the same projections up to rounding.

use nalgebra::Matrix3x4;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ImageSize, Mat3, Mat34, Pt2, Pt3, Real, Vec3};

const ORTHONORMAL_TOL: Real = 1e-6;

/// Errors raised while building a camera.
#[derive(Debug, Error)]
pub enum CameraError {
    /// Rotation matrix is not orthonormal with positive determinant.
    #[error("rotation matrix is not orthonormal (deviation {0:.3e})")]
    NotOrthonormal(Real),
    /// Intrinsics matrix cannot be inverted.
    #[error("intrinsics matrix is not invertible")]
    SingularIntrinsics,
    /// Projection matrix has a singular left 3x3 block.
    #[error("projection matrix is degenerate")]
    DegenerateProjection,
    /// Focal length must be strictly positive.
    #[error("focal length must be positive, got {0}")]
    InvalidFocal(Real),
}

/// Ray starting at a camera center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    /// Ray origin (camera center, world frame).
    pub origin: Pt3,
    /// Unit direction (world frame).
    pub dir: Vec3,
}

impl Ray {
    /// Point at distance `s` along the ray.
    pub fn point_at(&self, s: Real) -> Pt3 {
        self.origin + self.dir * s
    }

    /// Shortest distance between `p` and the (infinite) ray line.
    pub fn distance_to(&self, p: &Pt3) -> Real {
        let v = p - self.origin;
        (v - self.dir * v.dot(&self.dir)).norm()
    }
}

/// Pinhole camera with world-to-camera pose `x_c = R x_w + t`.
#[derive(Clone, Debug, PartialEq)]
pub struct PinholeCamera {
    k: Mat3,
    k_inv: Mat3,
    r: Mat3,
    t: Vec3,
    c: Pt3,
    p: Mat34,
}

impl PinholeCamera {
    /// Build a camera from intrinsics `K`, rotation `R` and translation `t`.
    pub fn from_parts(k: Mat3, r: Mat3, t: Vec3) -> Result<Self, CameraError> {
        let deviation = (r.transpose() * r - Mat3::identity()).norm();
        if deviation > ORTHONORMAL_TOL || r.determinant() <= 0.0 {
            return Err(CameraError::NotOrthonormal(deviation));
        }
        let k_inv = k.try_inverse().ok_or(CameraError::SingularIntrinsics)?;
        let c = Pt3::from(-(r.transpose() * t));
        let p = compose_projection(&k, &r, &t);
        Ok(Self {
            k,
            k_inv,
            r,
            t,
            c,
            p,
        })
    }

    /// Build a camera from a focal length in pixels and an image size.
    ///
    /// The principal point is placed at the image center and skew is zero.
    pub fn from_focal(
        focal: Real,
        image: ImageSize,
        r: Mat3,
        t: Vec3,
    ) -> Result<Self, CameraError> {
        if focal <= 0.0 || !focal.is_finite() {
            return Err(CameraError::InvalidFocal(focal));
        }
        let k = Mat3::new(
            focal,
            0.0,
            image.width * 0.5,
            0.0,
            focal,
            image.height * 0.5,
            0.0,
            0.0,
            1.0,
        );
        Self::from_parts(k, r, t)
    }

    /// Build a camera from an explicit projection matrix (any non-zero scale).
    pub fn from_projection(p: &Mat34) -> Result<Self, CameraError> {
        let (k, r, t) = decompose_projection(p)?;
        Self::from_parts(k, r, t)
    }

    /// Intrinsics matrix (normalized so that `K[2,2] = 1`).
    pub fn k(&self) -> &Mat3 {
        &self.k
    }

    /// World-to-camera rotation.
    pub fn rotation(&self) -> &Mat3 {
        &self.r
    }

    /// World-to-camera translation.
    pub fn translation(&self) -> &Vec3 {
        &self.t
    }

    /// Camera center in the world frame.
    pub fn center(&self) -> Pt3 {
        self.c
    }

    /// Projection matrix `P = K [R | t]`.
    pub fn projection(&self) -> &Mat34 {
        &self.p
    }

    /// Project a world point to image pixels.
    ///
    /// When the homogeneous divisor is exactly zero the un-divided `(x, y)`
    /// pair is returned; callers treat that as degenerate.
    pub fn project(&self, pw: &Pt3) -> Pt2 {
        let x = self.p * pw.to_homogeneous();
        if x.z == 0.0 {
            return Pt2::new(x.x, x.y);
        }
        Pt2::new(x.x / x.z, x.y / x.z)
    }

    /// Signed depth of a world point along the optical axis.
    pub fn depth(&self, pw: &Pt3) -> Real {
        (self.r * pw.coords + self.t).z
    }

    /// Whether the point lies strictly in front of the camera.
    pub fn is_in_front(&self, pw: &Pt3) -> bool {
        self.depth(pw) > 0.0
    }

    /// Ray from the camera center through an image pixel.
    pub fn unproject_ray(&self, px: &Pt2) -> Ray {
        let dir_c = self.k_inv * Vec3::new(px.x, px.y, 1.0);
        let dir_w = self.r.transpose() * dir_c;
        Ray {
            origin: self.c,
            dir: dir_w.normalize(),
        }
    }
}

fn compose_projection(k: &Mat3, r: &Mat3, t: &Vec3) -> Mat34 {
    let mut rt = Matrix3x4::<Real>::zeros();
    rt.fixed_view_mut::<3, 3>(0, 0).copy_from(r);
    rt.set_column(3, t);
    k * rt
}

/// RQ decomposition of a 3x3 matrix.
///
/// Returns `(K, R)` with `K` upper-triangular (positive diagonal) and `R`
/// orthonormal.
pub fn rq_decompose(m: &Mat3) -> (Mat3, Mat3) {
    let j = Mat3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);

    let m1 = j * m.transpose() * j;
    let qr = m1.qr();

    let mut k = j * qr.r().transpose() * j;
    let mut r = j * qr.q().transpose() * j;

    // Enforce positive diagonal in K.
    let mut d = Mat3::identity();
    for i in 0..3 {
        if k[(i, i)] < 0.0 {
            d[(i, i)] = -1.0;
        }
    }
    k *= d;
    r = d * r;

    (k, r)
}

/// Decompose `P ~ K [R | t]` with `K[2,2] = 1` and `det(R) = +1`.
pub fn decompose_projection(p: &Mat34) -> Result<(Mat3, Mat3, Vec3), CameraError> {
    let m = p.fixed_view::<3, 3>(0, 0).into_owned();
    if m.determinant().abs() <= Real::EPSILON {
        return Err(CameraError::DegenerateProjection);
    }
    // A negative overall scale flips R; compensate on the whole matrix.
    let p = if m.determinant() < 0.0 { -*p } else { *p };
    let m = p.fixed_view::<3, 3>(0, 0).into_owned();
    let (k, r) = rq_decompose(&m);

    let scale = k[(2, 2)];
    if scale.abs() <= Real::EPSILON {
        return Err(CameraError::DegenerateProjection);
    }
    let k = k / scale;
    let k_inv = k.try_inverse().ok_or(CameraError::SingularIntrinsics)?;
    let t = k_inv * (p.column(3) / scale);

    Ok((k, r, t.into_owned()))
}

/// Serializable camera description as handed over by a host scene.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CameraParams {
    /// Explicit 3x4 projection matrix, row-major.
    Projection { p: [[Real; 4]; 3] },
    /// Intrinsics and pose.
    Parts {
        k: [[Real; 3]; 3],
        r: [[Real; 3]; 3],
        t: [Real; 3],
    },
    /// Focal length in pixels with a centered principal point, and pose.
    Focal {
        focal: Real,
        r: [[Real; 3]; 3],
        t: [Real; 3],
    },
}

fn mat3_from_rows(a: &[[Real; 3]; 3]) -> Mat3 {
    Mat3::new(
        a[0][0], a[0][1], a[0][2], a[1][0], a[1][1], a[1][2], a[2][0], a[2][1], a[2][2],
    )
}

impl CameraParams {
    /// Build the camera model; `image` is only used by the focal variant.
    pub fn build(&self, image: ImageSize) -> Result<PinholeCamera, CameraError> {
        match self {
            CameraParams::Projection { p } => {
                let mut m = Mat34::zeros();
                for (i, row) in p.iter().enumerate() {
                    for (j, v) in row.iter().enumerate() {
                        m[(i, j)] = *v;
                    }
                }
                PinholeCamera::from_projection(&m)
            }
            CameraParams::Parts { k, r, t } => PinholeCamera::from_parts(
                mat3_from_rows(k),
                mat3_from_rows(r),
                Vec3::new(t[0], t[1], t[2]),
            ),
            CameraParams::Focal { focal, r, t } => PinholeCamera::from_focal(
                *focal,
                image,
                mat3_from_rows(r),
                Vec3::new(t[0], t[1], t[2]),
            ),
        }
    }
}
