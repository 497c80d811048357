use facade_core::CameraId;
use facade_linear::{ContainmentError, PlaneFitError, ProjectionError, TriangulationError};
use thiserror::Error;

/// Outcome of a gesture that could not produce geometry.
///
/// None of these are fatal: the host keeps its current mesh and may retry
/// with another move mode or more clicks.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EditError {
    #[error("camera {0} is not part of the camera set")]
    UnknownCamera(CameraId),
    /// The handle refers to a snapshot replaced by a rebuild.
    #[error("component handle is stale or unknown")]
    StaleHandle,
    #[error("no component to edit")]
    NothingToEdit,
    #[error("vertex {vertex} has clicks in {got} camera(s), triangulation needs 2")]
    NotEnoughViews { vertex: usize, got: usize },
    #[error("no face is adjacent to the edited component")]
    NoAdjacentFace,
    #[error(transparent)]
    Containment(#[from] ContainmentError),
    #[error(transparent)]
    PlaneFit(#[from] PlaneFitError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Triangulation(#[from] TriangulationError),
}
