//! Plan manager parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::iface::SearchBound;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the plan manager.
///
/// Only `model_file` has no default, without it the manager cannot be initialised.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    /// Model handle passed to the path provider
    pub model_file: Option<String>,

    /// Frame the global plan is transformed into and in which all planning happens
    pub global_frame: String,

    /// Distance from the goal under which the goal is considered reached
    pub xy_goal_tolerance: f64,

    /// Heading tolerance at the goal, carried in the goal target but not used for arrival
    pub yaw_goal_tolerance: f64,

    /// Number of samples the provider draws per request
    pub num_samples: usize,

    /// Number of candidate paths the provider considers per request
    pub num_paths: usize,

    pub search_bound: SearchBound,

    /// Vehicle footprint polygon in the body frame, `[x, y]` vertices in meters
    pub footprint: Vec<[f64; 2]>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            model_file: None,
            global_frame: String::from("odom"),
            xy_goal_tolerance: 0.1,
            yaw_goal_tolerance: 0.2,
            num_samples: 4,
            num_paths: 2,
            search_bound: SearchBound::default(),
            footprint: vec![[0.3, 0.2], [0.3, -0.2], [-0.3, -0.2], [-0.3, 0.2]],
        }
    }
}
