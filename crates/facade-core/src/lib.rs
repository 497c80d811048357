//! Core math and geometry primitives for `facade`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Pt2`, `Pt3`, `Mat34`, ...),
//! - the pinhole camera model (`P = K [R | t]`) and the space conversions used
//!   by interactive viewports,
//! - per-vertex blind data (clicked camera-space positions) and its packed
//!   record encoding,
//! - camera sets and point clouds as explicit, owned inputs,
//! - a generic Least-Median-of-Squares engine (`lmeds`, [`Estimator`]).
//!
//! Coordinate spaces:
//! `image (pixels) <-> camera space (width-normalized) <-> view (viewport pixels)`

/// Per-vertex clicked positions and their record table.
pub mod blind_data;
/// Pinhole camera model.
pub mod camera;
/// Generic LMedS engine and traits.
pub mod lmeds;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Camera sets and point clouds.
pub mod scene;
/// Synthetic cameras and points for tests and demos.
pub mod synthetic;
/// Image, camera and view space conversions.
pub mod viewport;

pub use blind_data::*;
pub use camera::*;
pub use lmeds::*;
pub use math::*;
pub use scene::*;
pub use viewport::*;
