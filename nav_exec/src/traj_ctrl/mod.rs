//! # Trajectory control module
//!
//! Trajectory control is responsible for keeping the vehicle on the local path published by the
//! plan manager. It runs at a fixed rate, independently of planning, and on each cycle solves a
//! finite-horizon optimal control problem over the next `horizon_len` steps. Only the first
//! action of the solution is executed, the rest is kept to warm start the next cycle.
//!
//! The vehicle is predicted with a kinematic bicycle model. The cost penalises the cross-track
//! and heading errors to the nearest segment of the path, the error to a speed target which
//! ramps down approaching the goal, and the size and rate of change of the controls. Steering
//! and acceleration are bounded by the actuator limits, and the executed action is rate limited.
//!
//! If no usable solution is found the neutral command is issued: straight wheels and braking.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod model;
pub mod params;
pub mod problem;
pub mod runner;
pub mod solver;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::Params;
pub use runner::*;
pub use state::*;
