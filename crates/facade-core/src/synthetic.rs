//! Deterministic synthetic scenes for tests and demos.
//!
//! - look-at camera construction,
//! - arcs of cameras facing a facade,
//! - planar point grids (a wall seen by the reconstruction),
//! - seed-keyed noise that does not depend on the internals of `rand` RNGs.

use crate::{
    CameraError, CameraId, CameraSet, ImageSize, Mat3, PinholeCamera, Pt3, Real, Vec2, Vec3,
    ViewCamera,
};

/// World-to-camera rotation looking from `eye` at `target`.
///
/// Camera axes follow the image convention: `x` right, `y` down, `z` forward.
/// Returns `None` when `eye == target` or the view direction is parallel to
/// `up`.
pub fn look_at_rotation(eye: &Pt3, target: &Pt3, up: &Vec3) -> Option<Mat3> {
    let z = (target - eye).try_normalize(1e-12)?;
    let x = z.cross(up).try_normalize(1e-12)?;
    let y = z.cross(&x);
    Some(Mat3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]))
}

/// Pinhole camera at `eye` looking at `target` with world `+Y` up.
pub fn look_at_camera(
    focal: Real,
    image: ImageSize,
    eye: &Pt3,
    target: &Pt3,
) -> Result<PinholeCamera, CameraError> {
    let r = look_at_rotation(eye, target, &Vec3::y()).ok_or(CameraError::NotOrthonormal(0.0))?;
    let t = -(r * eye.coords);
    PinholeCamera::from_focal(focal, image, r, t)
}

/// `n` cameras on a horizontal arc of `radius` around `target`, spanning
/// `spread` radians and raised by `height`. Camera ids are `0..n`.
///
/// The arc is centered on the world `+Z` axis, so the cameras face a wall
/// lying in the `z = 0` plane.
pub fn arc_cameras(
    n: usize,
    target: &Pt3,
    radius: Real,
    spread: Real,
    height: Real,
    focal: Real,
    image: ImageSize,
) -> Result<CameraSet, CameraError> {
    let mut set = CameraSet::new();
    for i in 0..n {
        let a = if n > 1 {
            -0.5 * spread + spread * i as Real / (n - 1) as Real
        } else {
            0.0
        };
        let eye = Pt3::new(
            target.x + radius * a.sin(),
            target.y + height,
            target.z + radius * a.cos(),
        );
        let camera = look_at_camera(focal, image, &eye, target)?;
        set.insert(ViewCamera::new(i as CameraId, camera, image));
    }
    Ok(set)
}

/// Grid of `nu * nv` points `origin + i * du + j * dv`, row-major in `j`.
pub fn plane_grid(origin: &Pt3, du: &Vec3, dv: &Vec3, nu: usize, nv: usize) -> Vec<Pt3> {
    let mut points = Vec::with_capacity(nu.saturating_mul(nv));
    for j in 0..nv {
        for i in 0..nu {
            points.push(origin + du * i as Real + dv * j as Real);
        }
    }
    points
}

/// Deterministic uniform noise in `[-max_abs, +max_abs]`, keyed by
/// `(stream, index)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformNoise {
    pub seed: u64,
    pub max_abs: Real,
}

impl UniformNoise {
    pub fn new(seed: u64, max_abs: Real) -> Self {
        Self { seed, max_abs }
    }

    /// Scalar sample in `[-max_abs, +max_abs)`.
    pub fn scalar(&self, stream: usize, index: usize) -> Real {
        let u = unit(splitmix64(mix_key(self.seed, stream, index)));
        (u - 0.5) * 2.0 * self.max_abs.abs()
    }

    /// 2D sample, e.g. click jitter in camera space.
    pub fn vec2(&self, stream: usize, index: usize) -> Vec2 {
        let key = mix_key(self.seed, stream, index);
        let a = unit(splitmix64(key));
        let b = unit(splitmix64(key ^ 0x94D0_49BB_1331_11EB));
        Vec2::new(a - 0.5, b - 0.5) * 2.0 * self.max_abs.abs()
    }

    /// Displace each point along `dir` by a sample of this noise.
    pub fn displace_along(&self, points: &[Pt3], dir: &Vec3) -> Vec<Pt3> {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| p + dir * self.scalar(0, i))
            .collect()
    }
}

#[inline]
fn mix_key(seed: u64, stream: usize, index: usize) -> u64 {
    seed ^ (stream as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (index as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn unit(x: u64) -> Real {
    (x >> 11) as Real * (1.0 / (1u64 << 53) as Real)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pt2;

    #[test]
    fn arc_cameras_see_the_target_at_the_image_center() {
        let image = ImageSize::new(2000.0, 1500.0);
        let target = Pt3::new(0.0, 1.5, 0.0);
        let set = arc_cameras(3, &target, 10.0, 0.8, 0.5, 1500.0, image).unwrap();
        assert_eq!(set.len(), 3);
        for view in set.iter() {
            let px = view.camera.project(&target);
            assert!((px - Pt2::new(1000.0, 750.0)).norm() < 1e-6);
            assert!(view.camera.is_in_front(&target));
        }
    }

    #[test]
    fn world_up_appears_upward_in_the_image() {
        let image = ImageSize::new(1000.0, 1000.0);
        let cam = look_at_camera(800.0, image, &Pt3::new(0.0, 0.0, 5.0), &Pt3::origin()).unwrap();
        let low = cam.project(&Pt3::new(0.0, 0.0, 0.0));
        let high = cam.project(&Pt3::new(0.0, 1.0, 0.0));
        assert!(high.y < low.y);
    }

    #[test]
    fn degenerate_look_at_is_rejected() {
        let p = Pt3::new(1.0, 2.0, 3.0);
        assert!(look_at_rotation(&p, &p, &Vec3::y()).is_none());
        assert!(look_at_rotation(&Pt3::origin(), &Pt3::new(0.0, 4.0, 0.0), &Vec3::y()).is_none());
    }

    #[test]
    fn noise_is_bounded_and_repeatable() {
        let noise = UniformNoise::new(11, 0.25);
        for i in 0..100 {
            let s = noise.scalar(1, i);
            assert!(s.abs() <= 0.25);
            assert_eq!(s, noise.scalar(1, i));
        }
        assert_ne!(noise.scalar(1, 0), noise.scalar(2, 0));
    }
}
