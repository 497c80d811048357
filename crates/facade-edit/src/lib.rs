//! Interactive editing layer on top of the `facade` geometric kernels.
//!
//! This crate contains:
//! - [`MeshData`]: mesh input as handed over by the host (positions, faces,
//!   per-vertex blind data),
//! - [`IntersectionCache`]: per-mesh snapshots held in an arena, addressed by
//!   generation-checked handles, answering nearest-component queries,
//! - value-returning edit gestures ([`create_face`], [`extend_edge`],
//!   [`move_vertices`]) and the click accumulator [`PolygonBuilder`],
//! - [`EditConfig`], the serde-loadable tuning of all of the above.
//!
//! Gestures never mutate the mesh. They return [`FaceEdit`] / [`MoveEdit`]
//! values which the host commits (for instance with [`MeshData::apply_face`])
//! before rebuilding the cache.

mod cache;
mod config;
mod error;
mod gestures;
mod mesh;
mod polygon_builder;

pub use cache::*;
pub use config::*;
pub use error::*;
pub use gestures::*;
pub use mesh::*;
pub use polygon_builder::*;
