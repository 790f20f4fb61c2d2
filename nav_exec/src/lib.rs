//! # Navigation library.
//!
//! Local path management and receding-horizon trajectory control for a wheeled vehicle. The
//! library is split into two halves which run on independent schedules:
//!
//! - `plan_mgr` accepts a global plan, requests short-horizon local paths from a path provider,
//!   gates and prunes them and detects arrival at the goal.
//! - `traj_ctrl` tracks the latest local path at a fixed rate by solving a finite-horizon optimal
//!   control problem every cycle.
//!
//! The two halves only share the local path, through the single slot `path_channel`.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Interfaces to the collaborators surrounding the navigation core
pub mod iface;

/// Localisation data - poses and the controller's vehicle state
pub mod loc;

/// Navigation executable parameters
pub mod params;

/// Paths, plans and goals
pub mod path;

/// Always-latest conduit carrying local paths from planning to control
pub mod path_channel;

/// Plan manager - local path management around the global plan
pub mod plan_mgr;

/// Reference collaborators used to run the navigation stack stand-alone
pub mod sim;

/// Telemetry sink backed by the session
pub mod tm;

/// Trajectory control module - keeps the vehicle on the local path
pub mod traj_ctrl;
