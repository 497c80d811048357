//! Mesh input as handed over by the host scene.

use std::collections::{BTreeMap, HashSet};

use anyhow::{ensure, Result};
use facade_core::{BlindData, Pt3};
use serde::{Deserialize, Serialize};

use crate::{FaceEdit, MoveEdit};

/// Vertex positions, polygonal faces and per-vertex blind data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub positions: Vec<Pt3>,
    /// Faces as vertex index loops.
    pub faces: Vec<Vec<usize>>,
    /// Click history keyed by vertex index; vertices without clicks are absent.
    #[serde(default)]
    pub blind_data: BTreeMap<usize, BlindData>,
}

impl MeshData {
    /// Check index ranges and face sizes.
    pub fn validate(&self) -> Result<()> {
        let n = self.positions.len();
        for (f, face) in self.faces.iter().enumerate() {
            ensure!(face.len() >= 3, "face {f} has {} vertices", face.len());
            for &v in face {
                ensure!(v < n, "face {f} references vertex {v}, mesh has {n}");
            }
            let unique: HashSet<_> = face.iter().collect();
            ensure!(unique.len() == face.len(), "face {f} repeats a vertex");
        }
        for &v in self.blind_data.keys() {
            ensure!(v < n, "blind data for vertex {v}, mesh has {n}");
        }
        Ok(())
    }

    /// Unique undirected edges, in order of first appearance along the faces.
    ///
    /// Each edge is stored as `[a, b]` in the direction it first appears.
    pub fn edges(&self) -> Vec<[usize; 2]> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for face in &self.faces {
            for (i, &a) in face.iter().enumerate() {
                let b = face[(i + 1) % face.len()];
                if seen.insert((a.min(b), a.max(b))) {
                    edges.push([a, b]);
                }
            }
        }
        edges
    }

    /// Number of faces using each vertex.
    pub fn face_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.positions.len()];
        for face in &self.faces {
            for &v in face {
                if let Some(c) = counts.get_mut(v) {
                    *c += 1;
                }
            }
        }
        counts
    }

    pub fn vertex_blind_data(&self, vertex: usize) -> BlindData {
        self.blind_data.get(&vertex).cloned().unwrap_or_default()
    }

    /// Commit a face edit: append its new corners and the face itself.
    ///
    /// Returns the index of the new face.
    pub fn apply_face(&mut self, edit: &FaceEdit) -> usize {
        let mut face = Vec::with_capacity(edit.corners.len());
        for corner in &edit.corners {
            let v = match corner.vertex {
                Some(v) => v,
                None => {
                    self.positions.push(corner.position);
                    self.positions.len() - 1
                }
            };
            if !corner.blind_data.is_empty() {
                self.blind_data.insert(v, corner.blind_data.clone());
            }
            face.push(v);
        }
        self.faces.push(face);
        self.faces.len() - 1
    }

    /// Commit moved vertex positions and their click histories.
    pub fn apply_moves(&mut self, edit: &MoveEdit) {
        for m in &edit.moves {
            if let Some(p) = self.positions.get_mut(m.vertex) {
                *p = m.position;
                if m.blind_data.is_empty() {
                    self.blind_data.remove(&m.vertex);
                } else {
                    self.blind_data.insert(m.vertex, m.blind_data.clone());
                }
            }
        }
    }
}
