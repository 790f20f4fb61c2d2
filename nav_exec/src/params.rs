//! # Navigation Executable Parameters
//!
//! This module provide parameters for the navigation executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::{
    loc::Pose2D,
    path::{GlobalPlan, Path},
    sim::transform::FrameDef,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
pub struct NavExecParams {
    /// Period of the planning loop
    pub plan_period_s: f64,

    /// Execution stops after this long even if the goal was not reached
    pub max_duration_s: f64,

    /// Only one in every `tm_decimation` telemetry publications is saved
    pub tm_decimation: u64,

    /// Initial pose of the simulated vehicle, `[x_m, y_m, heading_rad]`
    pub start_pose: [f64; 3],

    /// Maximum speed of the simulated vehicle
    pub sim_max_speed_ms: f64,

    /// Frames known to the transform service
    pub frames: Vec<FrameDef>,
}

/// A global plan as stored in a plan file.
#[derive(Deserialize, Debug, Clone)]
pub struct PlanFile {
    pub frame_id: String,

    /// `[x_m, y_m, heading_rad]` waypoints
    pub waypoints: Vec<[f64; 3]>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavExecParams {
    pub fn start_pose(&self) -> Pose2D {
        Pose2D::new(self.start_pose[0], self.start_pose[1], self.start_pose[2])
    }
}

impl From<PlanFile> for GlobalPlan {
    fn from(file: PlanFile) -> Self {
        GlobalPlan::new(
            &file.frame_id,
            Path::from_points(
                file.waypoints
                    .iter()
                    .map(|w| Pose2D::new(w[0], w[1], w[2]))
                    .collect(),
            ),
        )
    }
}
