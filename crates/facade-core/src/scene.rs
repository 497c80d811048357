//! Camera sets and point clouds handed over by the host scene.
//!
//! Both are plain owned values; nothing here is global. Gestures and queries
//! borrow them for the duration of one call.

use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::{CameraId, ImageSize, PinholeCamera, Pt2, Pt3, Ray};

/// A calibrated camera together with the photograph it looks through.
#[derive(Clone, Debug)]
pub struct ViewCamera {
    pub id: CameraId,
    pub camera: PinholeCamera,
    pub image: ImageSize,
}

impl ViewCamera {
    pub fn new(id: CameraId, camera: PinholeCamera, image: ImageSize) -> Self {
        Self { id, camera, image }
    }

    /// World point to camera space.
    pub fn to_camera_space(&self, pw: &Pt3) -> Pt2 {
        self.image.image_to_camera(&self.camera.project(pw))
    }

    /// Ray from the camera center through a camera-space position.
    pub fn ray_through(&self, cs: &Pt2) -> Ray {
        self.camera.unproject_ray(&self.image.camera_to_image(cs))
    }
}

/// Cameras indexed by id.
#[derive(Clone, Debug, Default)]
pub struct CameraSet {
    cameras: BTreeMap<CameraId, ViewCamera>,
}

impl CameraSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a camera, replacing any camera with the same id.
    pub fn insert(&mut self, view: ViewCamera) -> Option<ViewCamera> {
        self.cameras.insert(view.id, view)
    }

    pub fn get(&self, id: CameraId) -> Option<&ViewCamera> {
        self.cameras.get(&id)
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewCamera> + '_ {
        self.cameras.values()
    }
}

impl FromIterator<ViewCamera> for CameraSet {
    fn from_iter<I: IntoIterator<Item = ViewCamera>>(iter: I) -> Self {
        Self {
            cameras: iter.into_iter().map(|v| (v.id, v)).collect(),
        }
    }
}

/// Sparse reconstruction points with per-camera visibility.
#[derive(Clone, Debug, Default)]
pub struct PointCloud {
    positions: Vec<Pt3>,
    visibility: HashMap<CameraId, Vec<usize>>,
}

impl PointCloud {
    pub fn new(positions: Vec<Pt3>) -> Self {
        Self {
            positions,
            visibility: HashMap::new(),
        }
    }

    /// Attach the indices of points seen by `camera`.
    ///
    /// Out-of-range indices are dropped.
    pub fn set_visibility(&mut self, camera: CameraId, mut indices: Vec<usize>) {
        let n = self.positions.len();
        let before = indices.len();
        indices.retain(|&i| i < n);
        if indices.len() != before {
            warn!(
                "camera {camera}: dropped {} out-of-range visibility indices",
                before - indices.len()
            );
        }
        indices.sort_unstable();
        indices.dedup();
        self.visibility.insert(camera, indices);
    }

    pub fn positions(&self) -> &[Pt3] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn has_visibility(&self, camera: CameraId) -> bool {
        self.visibility.contains_key(&camera)
    }

    /// Points seen by `camera`.
    ///
    /// A camera without visibility information sees the whole cloud.
    pub fn visible_points(&self, camera: CameraId) -> Vec<Pt3> {
        match self.visibility.get(&camera) {
            Some(indices) => indices.iter().map(|&i| self.positions[i]).collect(),
            None => {
                warn!("no visibility for camera {camera}, using the whole point cloud");
                self.positions.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mat3, Vec3};

    fn view(id: CameraId) -> ViewCamera {
        let cam = PinholeCamera::from_focal(
            800.0,
            ImageSize::new(1600.0, 1200.0),
            Mat3::identity(),
            Vec3::new(0.0, 0.0, 4.0),
        )
        .unwrap();
        ViewCamera::new(id, cam, ImageSize::new(1600.0, 1200.0))
    }

    #[test]
    fn camera_space_ray_hits_the_projected_point() {
        let v = view(1);
        let pw = Pt3::new(0.4, -0.3, 1.0);
        let cs = v.to_camera_space(&pw);
        assert!(v.ray_through(&cs).distance_to(&pw) < 1e-9);
    }

    #[test]
    fn camera_set_replaces_by_id() {
        let mut set: CameraSet = [view(2), view(5)].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.insert(view(2)).is_some());
        assert_eq!(set.len(), 2);
        let ids: Vec<_> = set.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![2, 5]);
        assert!(set.get(3).is_none());
    }

    #[test]
    fn visibility_filters_and_falls_back() {
        let mut cloud = PointCloud::new(vec![
            Pt3::new(0.0, 0.0, 0.0),
            Pt3::new(1.0, 0.0, 0.0),
            Pt3::new(2.0, 0.0, 0.0),
        ]);
        cloud.set_visibility(1, vec![2, 0, 2, 17]);
        assert_eq!(
            cloud.visible_points(1),
            vec![Pt3::new(0.0, 0.0, 0.0), Pt3::new(2.0, 0.0, 0.0)]
        );
        assert!(!cloud.has_visibility(9));
        assert_eq!(cloud.visible_points(9).len(), 3);
    }
}
