//! Conversions between image, camera and view spaces.
//!
//! - **Image space**: pixels of the photograph, as produced by
//!   [`PinholeCamera::project`].
//! - **Camera space**: image coordinates divided by the image width and
//!   centered on the image: `x = u / w - 0.5`, `y = v / w - 0.5 * h / w`.
//!   Clicks and blind data are stored in this space because it does not depend
//!   on the viewport.
//! - **View space**: viewport pixels. The viewport shows camera space scaled
//!   by `zoom` and shifted by the pan offsets.

use serde::{Deserialize, Serialize};

use crate::{PinholeCamera, Pt2, Pt3, Real};

/// Photograph dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: Real,
    pub height: Real,
}

impl ImageSize {
    pub fn new(width: Real, height: Real) -> Self {
        Self { width, height }
    }

    /// Image pixel to camera space.
    pub fn image_to_camera(&self, px: &Pt2) -> Pt2 {
        Pt2::new(
            px.x / self.width - 0.5,
            px.y / self.width - 0.5 * self.height / self.width,
        )
    }

    /// Camera space to image pixel.
    pub fn camera_to_image(&self, cs: &Pt2) -> Pt2 {
        Pt2::new(
            (cs.x + 0.5) * self.width,
            (cs.y + 0.5 * self.height / self.width) * self.width,
        )
    }
}

/// Viewport through which the operator looks at one camera.
///
/// Only zoom and pan matter to the core: they normalize pick tolerances so
/// that a radius given in viewport pixels means the same thing at any zoom
/// level and window size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Viewport width in pixels.
    pub width: Real,
    /// Viewport height in pixels.
    pub height: Real,
    /// Camera zoom; `1.0` shows the full image width.
    pub zoom: Real,
    /// Horizontal pan offset in camera space.
    pub pan_x: Real,
    /// Vertical pan offset in camera space.
    pub pan_y: Real,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl Viewport {
    /// View pixel to camera space.
    pub fn view_to_camera(&self, vs: &Pt2) -> Pt2 {
        let x = (vs.x / self.width - 0.5) * self.zoom + self.pan_x;
        let y = (vs.y / self.width - 0.5 * self.height / self.width) * self.zoom + self.pan_y;
        Pt2::new(x, y)
    }

    /// Camera space to view pixel.
    pub fn camera_to_view(&self, cs: &Pt2) -> Pt2 {
        let x = ((cs.x - self.pan_x) / self.zoom + 0.5) * self.width;
        let y = ((cs.y - self.pan_y) / self.zoom + 0.5 * self.height / self.width) * self.width;
        Pt2::new(x, y)
    }

    /// Camera-space pick radius for a tolerance given in view pixels.
    pub fn pick_threshold(&self, tolerance: Real) -> Real {
        tolerance * self.zoom / self.width
    }
}

/// World point to camera space through a camera model.
pub fn world_to_camera_space(camera: &PinholeCamera, image: &ImageSize, pw: &Pt3) -> Pt2 {
    image.image_to_camera(&camera.project(pw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_and_camera_space_are_inverse() {
        let image = ImageSize::new(4000.0, 3000.0);
        let px = Pt2::new(1234.5, 2001.0);
        let back = image.camera_to_image(&image.image_to_camera(&px));
        assert!((back - px).norm() < 1e-9);
        // Image center maps to the camera-space origin.
        let center = image.image_to_camera(&Pt2::new(2000.0, 1500.0));
        assert!(center.coords.norm() < 1e-12);
    }

    #[test]
    fn view_and_camera_space_are_inverse() {
        let vp = Viewport {
            width: 1600.0,
            height: 900.0,
            zoom: 0.4,
            pan_x: 0.05,
            pan_y: -0.02,
        };
        let vs = Pt2::new(321.0, 654.0);
        let back = vp.camera_to_view(&vp.view_to_camera(&vs));
        assert!((back - vs).norm() < 1e-9);
    }

    #[test]
    fn pick_threshold_scales_with_zoom_and_width() {
        let mut vp = Viewport::default();
        let base = vp.pick_threshold(10.0);
        vp.zoom = 0.5;
        assert!((vp.pick_threshold(10.0) - base * 0.5).abs() < 1e-15);
        vp.width *= 2.0;
        assert!((vp.pick_threshold(10.0) - base * 0.25).abs() < 1e-15);
    }
}
