//! Click accumulator for drawing faces in one camera.

use facade_core::{CameraId, Pt2};
use log::debug;

/// State after a click.
#[derive(Clone, Debug, PartialEq)]
pub enum BuildStep {
    /// More clicks are needed; the clicks so far are returned.
    Pending(Vec<Pt2>),
    /// Four corners are known; hand them to [`crate::create_face`].
    Ready([Pt2; 4]),
}

/// Collects camera-space clicks until a quad can be built.
///
/// Three clicks `p0, p1, p2` complete a parallelogram with
/// `p3 = p2 + p0 - p1`. After a face is built, its last edge `[p3, p2]`
/// seeds the next face so strips of quads can be drawn with two clicks each.
/// Clicking in another camera starts over.
#[derive(Clone, Debug, Default)]
pub struct PolygonBuilder {
    camera: Option<CameraId>,
    clicks: Vec<Pt2>,
}

impl PolygonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera(&self) -> Option<CameraId> {
        self.camera
    }

    pub fn clicks(&self) -> &[Pt2] {
        &self.clicks
    }

    /// Add a click in `camera`.
    pub fn add_click(&mut self, camera: CameraId, click: Pt2) -> BuildStep {
        if self.camera != Some(camera) {
            if !self.clicks.is_empty() {
                debug!(
                    "polygon: camera changed from {:?} to {camera}, dropping {} click(s)",
                    self.camera,
                    self.clicks.len()
                );
            }
            self.clicks.clear();
            self.camera = Some(camera);
        }
        if self.clicks.len() >= 4 {
            self.clicks.clear();
        }
        self.clicks.push(click);
        match self.quad() {
            Some(quad) => BuildStep::Ready(quad),
            None => BuildStep::Pending(self.clicks.clone()),
        }
    }

    /// Corners of the quad that would be built with `cursor` as the next
    /// click, or the rubber band so far when that is not enough.
    pub fn preview(&self, cursor: Pt2) -> Vec<Pt2> {
        let mut points = self.clicks.clone();
        points.push(cursor);
        match points.as_slice() {
            [p0, p1, p2] => vec![*p0, *p1, *p2, *p2 + (*p0 - *p1)],
            _ => points,
        }
    }

    /// The face from the last [`BuildStep::Ready`] was built; keep its closing
    /// edge as the start of the next one.
    pub fn face_built(&mut self, quad: &[Pt2; 4]) {
        self.clicks = vec![quad[3], quad[2]];
    }

    /// Drop the last click. Returns it when there was one.
    pub fn undo_click(&mut self) -> Option<Pt2> {
        self.clicks.pop()
    }

    /// Discard every click.
    pub fn cancel(&mut self) {
        self.clicks.clear();
        self.camera = None;
    }

    fn quad(&self) -> Option<[Pt2; 4]> {
        match self.clicks.as_slice() {
            [p0, p1, p2] => Some([*p0, *p1, *p2, *p2 + (*p0 - *p1)]),
            [p0, p1, p2, p3] => Some([*p0, *p1, *p2, *p3]),
            _ => None,
        }
    }
}
