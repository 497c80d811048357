//! Geometric kernels turning 2D clicks into 3D facade geometry.
//!
//! This crate contains:
//! - robust plane estimation, unconstrained ([`PlaneKernel`]) and constrained
//!   to contain an anchor segment ([`LineConstrainedPlaneKernel`]), both
//!   driven by the shared LMedS engine from `facade-core`,
//! - N-view DLT triangulation of a vertex from its click history,
//! - winding-number containment of point-cloud points in a clicked polygon,
//! - plane-constrained projection of a click along its camera ray.
//!
//! All functions are synchronous, allocate only their outputs and report
//! degenerate input as typed errors.

mod containment;
mod plane;
mod projection;
mod triangulation;

pub use containment::*;
pub use plane::*;
pub use projection::*;
pub use triangulation::*;
