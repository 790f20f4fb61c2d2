//! # Collaborator interfaces
//!
//! The navigation core talks to the rest of the system only through the traits in this module.
//! Implementations are injected when the plan manager and the controller runner are built, see
//! `sim` for the reference implementations used by `nav_exec`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::vehicle::{ControlCommand, Odometry, VelocityReading};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::{
    loc::Pose2D,
    path::{GlobalPlan, Path},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Symmetric search region around the start pose given to the path provider.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBound {
    /// Full width of the region along the frame's X axis
    pub width_m: f64,

    /// Full height of the region along the frame's Y axis
    pub height_m: f64,

    /// Full range of headings the provider may explore
    pub heading_range_rad: f64,
}

/// Configuration used to construct a path provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Handle to the provider's model, for the reference provider a world file
    pub model_file: String,

    pub xy_tolerance_m: f64,
    pub yaw_tolerance_rad: f64,
    pub num_samples: usize,
    pub num_paths: usize,

    /// Vehicle footprint polygon in the body frame
    pub footprint_m: Vec<Vector2<f64>>,
}

/// A telemetry sink which discards everything.
pub struct NullTm;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Failures reported by collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    #[error("No transform is known between frames {0:?} and {1:?}")]
    UnknownTransform(String, String),

    #[error("Could not load the provider model {0:?}: {1}")]
    ModelLoad(String, String),

    #[error("The path provider failed: {0}")]
    Provider(String),

    #[error("The trajectory controller cannot be reached")]
    ControllerUnreachable,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Source of the current vehicle pose in the planning frame.
pub trait PoseSource {
    /// Returns `None` if no pose is currently available.
    fn pose(&self) -> Option<Pose2D>;
}

/// Short-horizon path generator and collision oracle.
pub trait PathProvider {
    /// Request a path from `start` towards `goal` within `bound`.
    ///
    /// An empty result means no path was found.
    fn request_path(
        &mut self,
        start: &Pose2D,
        goal: &Pose2D,
        bound: &SearchBound,
    ) -> Result<Vec<Pose2D>, CollabError>;

    /// Returns false if the vehicle would be in collision at this pose.
    fn is_state_valid(&self, pose: &Pose2D) -> bool;
}

/// Builds path providers during plan manager initialisation.
pub trait PathProviderFactory {
    fn build(&self, config: &ProviderConfig) -> Result<Box<dyn PathProvider>, CollabError>;
}

/// Coordinate frame conversion of plans.
pub trait TransformService {
    fn transform_plan(
        &self,
        plan: &GlobalPlan,
        target_frame: &str,
    ) -> Result<GlobalPlan, CollabError>;
}

/// Resets the trajectory controller's internal state.
pub trait ControllerReset {
    fn reset(&self) -> Result<(), CollabError>;
}

/// The vehicle platform as seen by trajectory control.
pub trait VehicleInterface {
    /// Latest velocity reading, `None` until the first one arrives.
    fn velocity(&mut self) -> Option<VelocityReading>;

    /// Latest odometry estimate, `None` until the first one arrives.
    fn odometry(&mut self) -> Option<Odometry>;

    fn send_command(&mut self, cmd: &ControlCommand);
}

/// Output-only telemetry. Nothing published here is ever read back.
pub trait TelemetrySink {
    fn publish_footprint(&mut self, _footprint_m: &[Vector2<f64>]) {}

    fn publish_global_plan(&mut self, _plan: &GlobalPlan) {}

    fn publish_local_path(&mut self, _path: &Path) {}
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TelemetrySink for NullTm {}

impl Default for SearchBound {
    fn default() -> Self {
        Self {
            width_m: 6.0,
            height_m: 6.0,
            heading_range_rad: std::f64::consts::PI,
        }
    }
}

impl SearchBound {
    /// Returns true if `point_m` lies inside the region centred on `centre_m`.
    pub fn contains(&self, centre_m: &Vector2<f64>, point_m: &Vector2<f64>) -> bool {
        let rel = point_m - centre_m;
        rel[0].abs() <= 0.5 * self.width_m && rel[1].abs() <= 0.5 * self.height_m
    }
}
