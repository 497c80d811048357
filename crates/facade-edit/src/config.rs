use facade_core::{LmedsOptions, Real};
use serde::{Deserialize, Serialize};

/// How dragged vertices get their new world position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveMode {
    /// Re-triangulate from the vertex click history plus the new click.
    #[default]
    NViewTriangulation,
    /// Fit a plane on the cloud points inside the dragged face, then project.
    /// Falls back to the adjacent face plane.
    PointCloudProjection,
    /// Project onto the current plane of the face being edited.
    AdjacentFaceProjection,
}

/// Tuning of the interactive layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// Robust plane fit options shared by both plane kernels.
    pub lmeds: LmedsOptions,
    /// Pick radius in viewport pixels.
    pub pick_tolerance: Real,
    /// Test stored clicks before projected vertices.
    pub include_blind_data: bool,
    /// Length of the view segment used for plane-constrained projection.
    pub far_clip: Real,
    /// Minimum number of cloud points inside a polygon before fitting.
    pub min_cloud_inliers: usize,
    pub move_mode: MoveMode,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            lmeds: LmedsOptions::default(),
            pick_tolerance: 10.0,
            include_blind_data: true,
            far_clip: 10_000.0,
            min_cloud_inliers: 3,
            move_mode: MoveMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{"move_mode": "adjacent_face_projection", "lmeds": {"max_iters": 50}}"#;
        let cfg: EditConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.move_mode, MoveMode::AdjacentFaceProjection);
        assert_eq!(cfg.lmeds.max_iters, 50);
        assert_eq!(cfg.lmeds.seed, LmedsOptions::default().seed);
        assert_eq!(cfg.pick_tolerance, 10.0);
        assert!(cfg.include_blind_data);
    }
}
