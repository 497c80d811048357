//! Value-returning edit gestures.
//!
//! A gesture reads the cameras, the cloud and the cache, and answers with a
//! [`FaceEdit`] or [`MoveEdit`]. Nothing here mutates the mesh; the host
//! commits the edit and rebuilds the cache.

use facade_core::{BlindData, CameraId, CameraSet, PointCloud, Pt2, Pt3, Real, ViewCamera};
use facade_linear::{
    cloud_support, fit_plane, fit_plane_least_squares, fit_plane_with_line_constraint,
    project_on_plane, triangulate_blind_data, Plane,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    EdgeHandle, EditConfig, EditError, Intersection, IntersectionCache, MeshSnapshot, MoveMode,
    VertexRecord,
};

/// Everything a gesture reads besides the cache.
#[derive(Clone, Copy, Debug)]
pub struct EditContext<'a> {
    pub cameras: &'a CameraSet,
    pub cloud: &'a PointCloud,
    pub config: &'a EditConfig,
}

impl<'a> EditContext<'a> {
    pub fn new(cameras: &'a CameraSet, cloud: &'a PointCloud, config: &'a EditConfig) -> Self {
        Self {
            cameras,
            cloud,
            config,
        }
    }

    pub fn view(&self, id: CameraId) -> Result<&'a ViewCamera, EditError> {
        self.cameras.get(id).ok_or(EditError::UnknownCamera(id))
    }

    /// Robust plane through the cloud points inside `polygon`.
    fn cloud_plane(&self, view: &ViewCamera, polygon: &[Pt2]) -> Result<Plane, EditError> {
        let support = cloud_support(view, polygon, self.cloud, self.config.min_cloud_inliers)?;
        Ok(fit_plane(&support, &self.config.lmeds)?.plane)
    }
}

/// Corner of a face to be created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceCorner {
    /// Existing vertex reused by the face, `None` for a new vertex.
    pub vertex: Option<usize>,
    pub position: Pt3,
    pub blind_data: BlindData,
}

/// A face ready to be committed to a mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceEdit {
    /// Mesh the face extends, `None` for a face starting a new mesh.
    pub mesh: Option<String>,
    pub corners: Vec<FaceCorner>,
    /// Plane the new corners were projected on.
    pub plane: Plane,
}

/// New position and click history of one vertex.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexMove {
    pub vertex: usize,
    pub position: Pt3,
    pub blind_data: BlindData,
}

/// Vertex moves ready to be committed to a mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveEdit {
    pub mesh: String,
    pub mode: MoveMode,
    pub moves: Vec<VertexMove>,
}

/// Build a face from four camera-space corners clicked in `camera`.
///
/// The cloud points inside the quad give a robust plane; every corner is
/// projected on it and remembers its click as blind data.
pub fn create_face(
    ctx: &EditContext<'_>,
    camera: CameraId,
    corners: &[Pt2; 4],
) -> Result<FaceEdit, EditError> {
    let view = ctx.view(camera)?;
    let plane = ctx.cloud_plane(view, corners)?;
    let corners = corners
        .iter()
        .map(|click| -> Result<FaceCorner, EditError> {
            let position = project_on_plane(view, click, &plane, ctx.config.far_clip)?;
            Ok(FaceCorner {
                vertex: None,
                position,
                blind_data: BlindData::from_iter([(camera, *click)]),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    info!(
        "camera {camera}: new face on plane n = [{:.3}, {:.3}, {:.3}], d = {:.3}",
        plane.normal.x, plane.normal.y, plane.normal.z, plane.d
    );
    Ok(FaceEdit {
        mesh: None,
        corners,
        plane,
    })
}

/// Drag an existing edge out into a new quad.
///
/// `press` and `mouse` are camera-space positions of the drag. The new quad is
/// `[a, b, b + offset, a + offset]` in camera space, sharing `a` and `b` with
/// the mesh. Its plane comes from the cloud points inside the quad constrained
/// to contain the edge. When the cloud cannot support a fit, or the new
/// corners miss that plane, the face adjacent to the edge is used instead.
pub fn extend_edge(
    ctx: &EditContext<'_>,
    cache: &IntersectionCache,
    edge: EdgeHandle,
    camera: CameraId,
    press: &Pt2,
    mouse: &Pt2,
) -> Result<FaceEdit, EditError> {
    let snap = cache.edge_snapshot(edge).ok_or(EditError::StaleHandle)?;
    let (a, b) = cache.edge_vertices(edge).ok_or(EditError::StaleHandle)?;
    let view = ctx.view(camera)?;
    let offset = mouse - press;

    let a_cs = view.to_camera_space(&a.position);
    let b_cs = view.to_camera_space(&b.position);
    let (b_new, a_new) = (b_cs + offset, a_cs + offset);
    let quad = [a_cs, b_cs, b_new, a_new];

    let far_clip = ctx.config.far_clip;
    let new_clicks = [b_new, a_new];
    let placed = line_constrained_plane(ctx, view, &quad, a, b)
        .and_then(|plane| place_on(view, plane, &new_clicks, far_clip));
    let (plane, positions) = match placed {
        Ok(found) => found,
        Err(err) => {
            warn!(
                "edge {}: cloud placement failed ({err}), using adjacent face",
                edge.index()
            );
            let face = snap.face_with_edge(a.index, b.index);
            adjacent_face_plane(snap, face)
                .and_then(|plane| place_on(view, plane, &new_clicks, far_clip))
                .map_err(|_| err)?
        }
    };

    let mut corners = vec![existing_corner(a), existing_corner(b)];
    corners.extend(new_clicks.iter().zip(positions).map(|(click, position)| FaceCorner {
        vertex: None,
        position,
        blind_data: BlindData::from_iter([(camera, *click)]),
    }));
    debug!(
        "mesh {}: extended edge {}-{} from camera {camera}",
        snap.name(),
        a.index,
        b.index
    );
    Ok(FaceEdit {
        mesh: Some(snap.name().to_owned()),
        corners,
        plane,
    })
}

/// Move the vertex or the edge under the pointer.
///
/// `target` is usually the cache's intersected or selected component.
/// Positions follow `ctx.config.move_mode`:
/// - `NViewTriangulation` adds the new click to each vertex history and
///   re-triangulates; vertices seen from fewer than two cameras are rejected.
/// - `PointCloudProjection` projects on the cloud plane inside the moved face,
///   falling back to the adjacent face plane when the fit or a projection
///   fails.
/// - `AdjacentFaceProjection` projects on the adjacent face plane.
///
/// Both projection modes reset the click history to the acting camera.
pub fn move_vertices(
    ctx: &EditContext<'_>,
    cache: &IntersectionCache,
    target: Intersection,
    camera: CameraId,
    press: &Pt2,
    mouse: &Pt2,
) -> Result<MoveEdit, EditError> {
    let (snap, moved, face) = match target {
        Intersection::None => return Err(EditError::NothingToEdit),
        Intersection::Vertex(h) | Intersection::BlindData(h) => {
            let snap = cache.vertex_snapshot(h).ok_or(EditError::StaleHandle)?;
            let v = cache.resolve_vertex(h).ok_or(EditError::StaleHandle)?;
            (snap, vec![v], snap.face_with_vertex(v.index))
        }
        Intersection::Edge(h) => {
            let snap = cache.edge_snapshot(h).ok_or(EditError::StaleHandle)?;
            let (a, b) = cache.edge_vertices(h).ok_or(EditError::StaleHandle)?;
            (snap, vec![a, b], snap.face_with_edge(a.index, b.index))
        }
    };
    let view = ctx.view(camera)?;
    let offset = mouse - press;
    let from_stored = matches!(target, Intersection::BlindData(_));

    let clicks: Vec<Pt2> = moved
        .iter()
        .map(|v| {
            let base = match v.blind_data.get(camera) {
                Some(stored) if from_stored => *stored,
                _ => view.to_camera_space(&v.position),
            };
            base + offset
        })
        .collect();

    let mode = ctx.config.move_mode;
    let moves = match mode {
        MoveMode::NViewTriangulation => moved
            .iter()
            .zip(&clicks)
            .map(|(v, click)| -> Result<VertexMove, EditError> {
                let mut blind_data = v.blind_data.clone();
                blind_data.set(camera, *click);
                if blind_data.len() < 2 {
                    return Err(EditError::NotEnoughViews {
                        vertex: v.index,
                        got: blind_data.len(),
                    });
                }
                let position = triangulate_blind_data(&blind_data, ctx.cameras)?;
                Ok(VertexMove {
                    vertex: v.index,
                    position,
                    blind_data,
                })
            })
            .collect::<Result<Vec<_>, EditError>>()?,
        MoveMode::PointCloudProjection | MoveMode::AdjacentFaceProjection => {
            let far_clip = ctx.config.far_clip;
            let on_face = || {
                adjacent_face_plane(snap, face).and_then(|p| place_on(view, p, &clicks, far_clip))
            };
            let (_, positions) = if mode == MoveMode::PointCloudProjection {
                let placed = moved_face_polygon(view, snap, face, &moved, &clicks)
                    .and_then(|polygon| ctx.cloud_plane(view, &polygon))
                    .and_then(|plane| place_on(view, plane, &clicks, far_clip));
                match placed {
                    Ok(found) => found,
                    Err(err) => {
                        warn!("cloud placement failed ({err}), using adjacent face");
                        on_face().map_err(|_| err)?
                    }
                }
            } else {
                on_face()?
            };
            moved
                .iter()
                .zip(&clicks)
                .zip(positions)
                .map(|((v, click), position)| VertexMove {
                    vertex: v.index,
                    position,
                    blind_data: BlindData::from_iter([(camera, *click)]),
                })
                .collect()
        }
    };
    debug!(
        "mesh {}: moved {} vertex(es) with {mode:?} from camera {camera}",
        snap.name(),
        moves.len()
    );
    Ok(MoveEdit {
        mesh: snap.name().to_owned(),
        mode,
        moves,
    })
}

fn existing_corner(v: &VertexRecord) -> FaceCorner {
    FaceCorner {
        vertex: Some(v.index),
        position: v.position,
        blind_data: v.blind_data.clone(),
    }
}

fn line_constrained_plane(
    ctx: &EditContext<'_>,
    view: &ViewCamera,
    quad: &[Pt2],
    a: &VertexRecord,
    b: &VertexRecord,
) -> Result<Plane, EditError> {
    let support = cloud_support(view, quad, ctx.cloud, ctx.config.min_cloud_inliers)?;
    Ok(fit_plane_with_line_constraint(&support, &a.position, &b.position, &ctx.config.lmeds)?.plane)
}

/// Project every click on `plane`; fails as soon as one click misses it.
fn place_on(
    view: &ViewCamera,
    plane: Plane,
    clicks: &[Pt2],
    far_clip: Real,
) -> Result<(Plane, Vec<Pt3>), EditError> {
    let positions = clicks
        .iter()
        .map(|click| project_on_plane(view, click, &plane, far_clip))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((plane, positions))
}

fn adjacent_face_plane(snap: &MeshSnapshot, face: Option<usize>) -> Result<Plane, EditError> {
    let face = face.ok_or(EditError::NoAdjacentFace)?;
    Ok(fit_plane_least_squares(&snap.face_positions(face))?)
}

/// Camera-space outline of `face` with the moved vertices at their new clicks.
fn moved_face_polygon(
    view: &ViewCamera,
    snap: &MeshSnapshot,
    face: Option<usize>,
    moved: &[&VertexRecord],
    clicks: &[Pt2],
) -> Result<Vec<Pt2>, EditError> {
    let face = face.ok_or(EditError::NoAdjacentFace)?;
    Ok(snap.faces()[face]
        .iter()
        .map(|&v| match moved.iter().position(|m| m.index == v) {
            Some(i) => clicks[i],
            None => view.to_camera_space(&snap.vertices()[v].position),
        })
        .collect())
}
