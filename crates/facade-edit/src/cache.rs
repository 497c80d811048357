//! Per-mesh intersection cache.
//!
//! Each mesh is captured as an immutable [`MeshSnapshot`] stored in an arena
//! slot. A rebuild replaces the slot content wholesale and bumps the
//! generation, so every [`VertexHandle`] / [`EdgeHandle`] taken from the
//! previous snapshot stops resolving at that instant.
//!
//! Hit testing goes through three stages: stored clicks of the active
//! camera (optional), projected vertices, then edges. The first stage with a
//! hit wins and the nearest candidate of that stage is reported.

use std::collections::BTreeMap;

use anyhow::Result;
use facade_core::{distance_to_segment, BlindData, Pt2, Pt3, Real, ViewCamera, Viewport};
use log::{debug, trace};

use crate::MeshData;

/// Vertex of a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexRecord {
    pub index: usize,
    pub position: Pt3,
    /// Number of faces using this vertex.
    pub face_count: usize,
    /// Number of edges incident to this vertex.
    pub edge_count: usize,
    pub blind_data: BlindData,
}

/// Edge of a snapshot, referring to its vertices by index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeRecord {
    pub index: usize,
    pub vertices: [usize; 2],
}

/// Immutable capture of one mesh.
#[derive(Clone, Debug)]
pub struct MeshSnapshot {
    name: String,
    generation: u64,
    vertices: Vec<VertexRecord>,
    edges: Vec<EdgeRecord>,
    faces: Vec<Vec<usize>>,
}

impl MeshSnapshot {
    fn build(name: &str, generation: u64, mesh: &MeshData) -> Self {
        let face_counts = mesh.face_counts();
        let edges: Vec<EdgeRecord> = mesh
            .edges()
            .into_iter()
            .enumerate()
            .map(|(index, vertices)| EdgeRecord { index, vertices })
            .collect();
        let mut edge_counts = vec![0usize; mesh.positions.len()];
        for e in &edges {
            edge_counts[e.vertices[0]] += 1;
            edge_counts[e.vertices[1]] += 1;
        }
        let vertices = mesh
            .positions
            .iter()
            .enumerate()
            .map(|(index, &position)| VertexRecord {
                index,
                position,
                face_count: face_counts[index],
                edge_count: edge_counts[index],
                blind_data: mesh.vertex_blind_data(index),
            })
            .collect();
        Self {
            name: name.to_owned(),
            generation,
            vertices,
            edges,
            faces: mesh.faces.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn vertices(&self) -> &[VertexRecord] {
        &self.vertices
    }

    pub fn edges(&self) -> &[EdgeRecord] {
        &self.edges
    }

    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    /// First face using `vertex`.
    pub fn face_with_vertex(&self, vertex: usize) -> Option<usize> {
        self.faces.iter().position(|f| f.contains(&vertex))
    }

    /// First face having `a` and `b` as consecutive corners.
    pub fn face_with_edge(&self, a: usize, b: usize) -> Option<usize> {
        self.faces.iter().position(|f| {
            (0..f.len()).any(|i| {
                let (p, q) = (f[i], f[(i + 1) % f.len()]);
                (p == a && q == b) || (p == b && q == a)
            })
        })
    }

    pub fn face_positions(&self, face: usize) -> Vec<Pt3> {
        self.faces
            .get(face)
            .map(|f| f.iter().map(|&v| self.vertices[v].position).collect())
            .unwrap_or_default()
    }
}

/// Generation-checked reference to a snapshot vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexHandle {
    slot: usize,
    generation: u64,
    index: usize,
}

/// Generation-checked reference to a snapshot edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeHandle {
    slot: usize,
    generation: u64,
    index: usize,
}

impl VertexHandle {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl EdgeHandle {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Which kind of component to select by index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    Vertex,
    Edge,
}

/// Result of a hit test, or the current selection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Intersection {
    #[default]
    None,
    /// The projection of a vertex is under the pointer.
    Vertex(VertexHandle),
    /// A click stored for the active camera is under the pointer.
    BlindData(VertexHandle),
    Edge(EdgeHandle),
}

impl Intersection {
    pub fn is_none(&self) -> bool {
        matches!(self, Intersection::None)
    }

    pub fn vertex(&self) -> Option<VertexHandle> {
        match self {
            Intersection::Vertex(h) | Intersection::BlindData(h) => Some(*h),
            _ => None,
        }
    }

    pub fn edge(&self) -> Option<EdgeHandle> {
        match self {
            Intersection::Edge(h) => Some(*h),
            _ => None,
        }
    }
}

/// Arena of mesh snapshots plus the intersected and selected components.
#[derive(Debug, Default)]
pub struct IntersectionCache {
    slots: Vec<Option<MeshSnapshot>>,
    by_name: BTreeMap<String, usize>,
    next_generation: u64,
    intersected: Intersection,
    selected: Intersection,
}

impl IntersectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot of `name` with a fresh capture of `mesh`.
    ///
    /// The intersected and selected components are cleared first; handles
    /// into the previous snapshot never resolve again. A mesh that fails
    /// validation loses its snapshot.
    pub fn rebuild(&mut self, name: &str, mesh: &MeshData) -> Result<()> {
        self.intersected = Intersection::None;
        self.selected = Intersection::None;
        if let Err(err) = mesh.validate() {
            self.remove(name);
            return Err(err.context(format!("cannot cache mesh {name}")));
        }

        self.next_generation += 1;
        let snapshot = MeshSnapshot::build(name, self.next_generation, mesh);
        debug!(
            "cache: mesh {name} generation {} ({} vertices, {} edges)",
            snapshot.generation,
            snapshot.vertices.len(),
            snapshot.edges.len()
        );
        match self.by_name.get(name) {
            Some(&slot) => self.slots[slot] = Some(snapshot),
            None => {
                let slot = match self.slots.iter().position(Option::is_none) {
                    Some(free) => {
                        self.slots[free] = Some(snapshot);
                        free
                    }
                    None => {
                        self.slots.push(Some(snapshot));
                        self.slots.len() - 1
                    }
                };
                self.by_name.insert(name.to_owned(), slot);
            }
        }
        Ok(())
    }

    /// Drop the snapshot of `name`. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(slot) = self.by_name.remove(name) else {
            return false;
        };
        self.slots[slot] = None;
        self.intersected = Intersection::None;
        self.selected = Intersection::None;
        true
    }

    /// Drop every snapshot.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_name.clear();
        self.intersected = Intersection::None;
        self.selected = Intersection::None;
    }

    pub fn snapshot(&self, name: &str) -> Option<&MeshSnapshot> {
        self.by_name
            .get(name)
            .and_then(|&slot| self.slots[slot].as_ref())
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &MeshSnapshot> + '_ {
        self.slots.iter().flatten()
    }

    fn live(&self, slot: usize, generation: u64) -> Option<&MeshSnapshot> {
        let snap = self.slots.get(slot)?.as_ref()?;
        if snap.generation != generation {
            trace!(
                "cache: stale handle for {} (generation {generation}, current {})",
                snap.name,
                snap.generation
            );
            return None;
        }
        Some(snap)
    }

    /// Snapshot a vertex handle was taken from, if it is still current.
    pub fn vertex_snapshot(&self, h: VertexHandle) -> Option<&MeshSnapshot> {
        self.live(h.slot, h.generation)
    }

    /// Snapshot an edge handle was taken from, if it is still current.
    pub fn edge_snapshot(&self, h: EdgeHandle) -> Option<&MeshSnapshot> {
        self.live(h.slot, h.generation)
    }

    pub fn resolve_vertex(&self, h: VertexHandle) -> Option<&VertexRecord> {
        self.vertex_snapshot(h)?.vertices.get(h.index)
    }

    pub fn resolve_edge(&self, h: EdgeHandle) -> Option<&EdgeRecord> {
        self.edge_snapshot(h)?.edges.get(h.index)
    }

    /// Both vertices of an edge.
    pub fn edge_vertices(&self, h: EdgeHandle) -> Option<(&VertexRecord, &VertexRecord)> {
        let snap = self.edge_snapshot(h)?;
        let e = snap.edges.get(h.index)?;
        Some((
            &snap.vertices[e.vertices[0]],
            &snap.vertices[e.vertices[1]],
        ))
    }

    pub fn intersected(&self) -> Intersection {
        self.intersected
    }

    pub fn selected(&self) -> Intersection {
        self.selected
    }

    pub fn clear_intersected(&mut self) {
        self.intersected = Intersection::None;
    }

    pub fn clear_selected(&mut self) {
        self.selected = Intersection::None;
    }

    /// Promote the intersected component to the selection.
    pub fn select_intersected(&mut self) -> Intersection {
        self.selected = self.intersected;
        self.selected
    }

    /// Select a component of the current snapshot of `mesh` by index.
    ///
    /// Used to re-target a selection after a rebuild. Unknown meshes or
    /// out-of-range indices clear the selection.
    pub fn select(&mut self, mesh: &str, kind: ComponentKind, index: usize) -> Intersection {
        self.selected = self
            .by_name
            .get(mesh)
            .and_then(|&slot| {
                let snap = self.slots[slot].as_ref()?;
                let generation = snap.generation;
                match kind {
                    ComponentKind::Vertex if index < snap.vertices.len() => {
                        Some(Intersection::Vertex(VertexHandle {
                            slot,
                            generation,
                            index,
                        }))
                    }
                    ComponentKind::Edge if index < snap.edges.len() => {
                        Some(Intersection::Edge(EdgeHandle {
                            slot,
                            generation,
                            index,
                        }))
                    }
                    _ => None,
                }
            })
            .unwrap_or_default();
        self.selected
    }

    /// Find the component under `point` (camera space of `view`).
    ///
    /// `tolerance` is a radius in viewport pixels, normalized to camera space
    /// with [`Viewport::pick_threshold`]. Vertices and clicks are hit inside
    /// a square of that half-size; edges by perpendicular distance.
    pub fn check_intersection(
        &mut self,
        view: &ViewCamera,
        viewport: &Viewport,
        tolerance: Real,
        point: &Pt2,
        include_blind_data: bool,
    ) -> Intersection {
        let threshold = viewport.pick_threshold(tolerance);
        let hit = if include_blind_data {
            self.nearest_blind_data(view, threshold, point)
        } else {
            None
        };
        let hit = hit
            .or_else(|| self.nearest_vertices(view, threshold, point))
            .or_else(|| self.nearest_edges(view, threshold, point))
            .unwrap_or_default();
        trace!("cache: hit test at {point:?} -> {hit:?}");
        self.intersected = hit;
        hit
    }

    fn nearest_blind_data(
        &self,
        view: &ViewCamera,
        threshold: Real,
        point: &Pt2,
    ) -> Option<Intersection> {
        let mut best: Option<(Real, Intersection)> = None;
        for (slot, snap) in self.live_slots() {
            for v in &snap.vertices {
                let Some(click) = v.blind_data.get(view.id) else {
                    continue;
                };
                if let Some(d) = in_square(click, point, threshold) {
                    let h = VertexHandle {
                        slot,
                        generation: snap.generation,
                        index: v.index,
                    };
                    keep_nearest(&mut best, d, Intersection::BlindData(h));
                }
            }
        }
        best.map(|(_, hit)| hit)
    }

    fn nearest_vertices(
        &self,
        view: &ViewCamera,
        threshold: Real,
        point: &Pt2,
    ) -> Option<Intersection> {
        let mut best: Option<(Real, Intersection)> = None;
        for (slot, snap) in self.live_slots() {
            for v in &snap.vertices {
                if !view.camera.is_in_front(&v.position) {
                    continue;
                }
                let cs = view.to_camera_space(&v.position);
                if let Some(d) = in_square(&cs, point, threshold) {
                    let h = VertexHandle {
                        slot,
                        generation: snap.generation,
                        index: v.index,
                    };
                    keep_nearest(&mut best, d, Intersection::Vertex(h));
                }
            }
        }
        best.map(|(_, hit)| hit)
    }

    fn nearest_edges(
        &self,
        view: &ViewCamera,
        threshold: Real,
        point: &Pt2,
    ) -> Option<Intersection> {
        let mut best: Option<(Real, Intersection)> = None;
        for (slot, snap) in self.live_slots() {
            for e in &snap.edges {
                let (a, b) = (
                    &snap.vertices[e.vertices[0]].position,
                    &snap.vertices[e.vertices[1]].position,
                );
                if !view.camera.is_in_front(a) || !view.camera.is_in_front(b) {
                    continue;
                }
                let (pa, pb) = (view.to_camera_space(a), view.to_camera_space(b));
                let d = distance_to_segment(&pa, &pb, point);
                if d < threshold {
                    let h = EdgeHandle {
                        slot,
                        generation: snap.generation,
                        index: e.index,
                    };
                    keep_nearest(&mut best, d, Intersection::Edge(h));
                }
            }
        }
        best.map(|(_, hit)| hit)
    }

    fn live_slots(&self) -> impl Iterator<Item = (usize, &MeshSnapshot)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, s)| s.as_ref().map(|s| (slot, s)))
    }
}

/// Euclidean distance when `p` lies in the square of half-size `half` around
/// `center`.
fn in_square(center: &Pt2, p: &Pt2, half: Real) -> Option<Real> {
    let d = p - center;
    (d.x.abs() <= half && d.y.abs() <= half).then(|| d.norm())
}

fn keep_nearest(best: &mut Option<(Real, Intersection)>, d: Real, hit: Intersection) {
    if best.as_ref().map_or(true, |(bd, _)| d < *bd) {
        *best = Some((d, hit));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facade_core::{synthetic, ImageSize};

    fn quad_mesh() -> MeshData {
        MeshData {
            positions: vec![
                Pt3::new(-1.0, 0.0, 0.0),
                Pt3::new(1.0, 0.0, 0.0),
                Pt3::new(1.0, 2.0, 0.0),
                Pt3::new(-1.0, 2.0, 0.0),
            ],
            faces: vec![vec![0, 1, 2, 3]],
            blind_data: BTreeMap::new(),
        }
    }

    fn front_view() -> ViewCamera {
        let image = ImageSize::new(2000.0, 1500.0);
        let set =
            synthetic::arc_cameras(1, &Pt3::new(0.0, 1.0, 0.0), 10.0, 0.0, 0.0, 1500.0, image)
                .unwrap();
        set.get(0).unwrap().clone()
    }

    #[test]
    fn snapshot_counts_connectivity() {
        let mut cache = IntersectionCache::new();
        cache.rebuild("wall", &quad_mesh()).unwrap();
        let snap = cache.snapshot("wall").unwrap();
        assert_eq!(snap.vertices().len(), 4);
        assert_eq!(snap.edges().len(), 4);
        assert!(snap.vertices().iter().all(|v| v.face_count == 1 && v.edge_count == 2));
        assert_eq!(snap.face_with_edge(3, 0), Some(0));
        assert_eq!(snap.face_with_edge(0, 2), None);
    }

    #[test]
    fn hit_test_prefers_vertices_over_edges() {
        let view = front_view();
        let vp = Viewport::default();
        let mut cache = IntersectionCache::new();
        cache.rebuild("wall", &quad_mesh()).unwrap();

        let corner = view.to_camera_space(&Pt3::new(1.0, 0.0, 0.0));
        let hit = cache.check_intersection(&view, &vp, 10.0, &corner, false);
        let v = hit.vertex().expect("vertex hit");
        assert_eq!(cache.resolve_vertex(v).unwrap().index, 1);

        let mid = view.to_camera_space(&Pt3::new(0.0, 0.0, 0.0));
        let hit = cache.check_intersection(&view, &vp, 10.0, &mid, false);
        let e = hit.edge().expect("edge hit");
        let (a, b) = cache.edge_vertices(e).unwrap();
        assert_eq!((a.index, b.index), (0, 1));

        let far = Pt2::new(0.45, 0.3);
        assert!(cache.check_intersection(&view, &vp, 10.0, &far, false).is_none());
        assert!(cache.intersected().is_none());
    }

    #[test]
    fn blind_data_is_tested_first_when_requested() {
        let view = front_view();
        let vp = Viewport::default();
        let mut mesh = quad_mesh();
        let click = Pt2::new(0.2, 0.2);
        mesh.blind_data
            .insert(2, [(view.id, click)].into_iter().collect());
        let mut cache = IntersectionCache::new();
        cache.rebuild("wall", &mesh).unwrap();

        let hit = cache.check_intersection(&view, &vp, 10.0, &click, true);
        assert!(matches!(hit, Intersection::BlindData(h) if h.index() == 2));
        let hit = cache.check_intersection(&view, &vp, 10.0, &click, false);
        assert!(hit.is_none());
    }

    #[test]
    fn invalid_mesh_is_not_cached() {
        let mut mesh = quad_mesh();
        mesh.faces.push(vec![0, 1, 7]);
        let mut cache = IntersectionCache::new();
        let err = cache.rebuild("broken", &mesh).unwrap_err();
        assert!(format!("{err:#}").contains("cannot cache mesh broken"));
        assert!(cache.snapshot("broken").is_none());
    }

    #[test]
    fn failed_rebuild_drops_the_previous_snapshot() {
        let view = front_view();
        let vp = Viewport::default();
        let mut cache = IntersectionCache::new();
        cache.rebuild("wall", &quad_mesh()).unwrap();
        let corner = view.to_camera_space(&Pt3::new(1.0, 0.0, 0.0));
        let old = cache
            .check_intersection(&view, &vp, 10.0, &corner, false)
            .vertex()
            .unwrap();

        let mut broken = quad_mesh();
        broken.faces.push(vec![0, 1, 7]);
        assert!(cache.rebuild("wall", &broken).is_err());
        assert!(cache.snapshot("wall").is_none());
        assert!(cache.resolve_vertex(old).is_none());
        assert!(cache.check_intersection(&view, &vp, 10.0, &corner, false).is_none());
    }
}
