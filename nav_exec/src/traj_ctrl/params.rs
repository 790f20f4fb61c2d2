//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Number of steps in the prediction horizon
    pub horizon_len: usize,

    /// Duration of one prediction step
    pub step_s: f64,

    /// Period at which the controller runs
    pub ctrl_period_s: f64,

    /// Distance between the front and rear axles
    pub wheelbase_m: f64,

    /// Number of points the tracked reference is padded or truncated to
    pub path_capacity: usize,

    /// Cruise speed demand away from the goal
    pub target_speed_ms: f64,

    /// Distance from the goal within which the speed target ramps linearly down to zero
    pub slow_down_dist_m: f64,

    /// Steering angle limit, applied symmetrically
    pub max_steer_rad: f64,

    /// Acceleration limit, applied symmetrically
    pub max_accel_mss: f64,

    /// Rate limit on the executed steering angle
    pub max_steer_rate_rads: f64,

    /// Rate limit on the executed acceleration
    pub max_jerk_msss: f64,

    /// Deceleration demanded by the neutral command
    pub neutral_decel_mss: f64,

    pub weights: Weights,

    pub solver: SolverParams,
}

/// Cost function weights
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct Weights {
    pub cross_track: f64,
    pub heading: f64,
    pub speed: f64,
    pub steer: f64,
    pub accel: f64,
    pub steer_rate: f64,
    pub accel_rate: f64,
}

/// Projected gradient solver parameters
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct SolverParams {
    /// Maximum number of iterations before the solve is abandoned
    pub max_iterations: usize,

    /// Converged when the projected gradient norm falls below this
    pub grad_tol: f64,

    /// Converged when the relative change in cost falls below this
    pub cost_rel_tol: f64,

    /// Step used on the first iteration and whenever Barzilai-Borwein is undefined
    pub initial_step: f64,

    pub min_step: f64,
    pub max_step: f64,

    /// Sufficient decrease constant of the Armijo condition
    pub armijo_c: f64,

    /// Factor applied to the step on each backtrack
    pub backtrack_factor: f64,

    pub max_backtracks: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            horizon_len: 10,
            step_s: 0.1,
            ctrl_period_s: 0.05,
            wheelbase_m: 0.325,
            path_capacity: 30,
            target_speed_ms: 1.0,
            slow_down_dist_m: 1.0,
            max_steer_rad: 0.41,
            max_accel_mss: 1.5,
            max_steer_rate_rads: 3.0,
            max_jerk_msss: 10.0,
            neutral_decel_mss: 1.0,
            weights: Weights::default(),
            solver: SolverParams::default(),
        }
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            cross_track: 20.0,
            heading: 5.0,
            speed: 2.0,
            steer: 0.5,
            accel: 0.1,
            steer_rate: 10.0,
            accel_rate: 1.0,
        }
    }
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            grad_tol: 1e-5,
            cost_rel_tol: 1e-6,
            initial_step: 0.05,
            min_step: 1e-8,
            max_step: 10.0,
            armijo_c: 1e-4,
            backtrack_factor: 0.5,
            max_backtracks: 40,
        }
    }
}
