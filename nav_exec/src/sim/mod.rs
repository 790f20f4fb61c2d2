//! # Simulation module
//!
//! Reference implementations of the collaborators, used to run the navigation stack without a
//! real vehicle. The vehicle is integrated with the same kinematic bicycle model trajectory
//! control predicts with.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod provider;
pub mod transform;

pub use provider::{SampledPathProvider, SampledProviderFactory, World};
pub use transform::StaticTransform;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use comms_if::eqpt::vehicle::{ControlCommand, Odometry, VelocityReading};

use crate::{
    iface::{PoseSource, VehicleInterface},
    loc::{Pose2D, VehicleState},
    traj_ctrl::model,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A simulated vehicle.
#[derive(Debug, Clone)]
pub struct SimVehicle {
    pub pose: Pose2D,
    pub speed_ms: f64,
    pub yaw_rate_rads: f64,

    wheelbase_m: f64,
    max_speed_ms: f64,
    max_steer_rad: f64,
}

/// Simulated vehicle shared between the planning and control threads.
pub type SharedSim = Arc<Mutex<SimVehicle>>;

/// Pose source reading the simulated vehicle.
pub struct SimPoseSource(pub SharedSim);

/// Vehicle interface driving the simulated vehicle.
///
/// Each command is applied for one control period.
pub struct SimVehicleIface {
    sim: SharedSim,
    period_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimVehicle {
    pub fn new(pose: Pose2D, wheelbase_m: f64, max_speed_ms: f64, max_steer_rad: f64) -> Self {
        Self {
            pose,
            speed_ms: 0.0,
            yaw_rate_rads: 0.0,
            wheelbase_m,
            max_speed_ms,
            max_steer_rad,
        }
    }

    pub fn shared(self) -> SharedSim {
        Arc::new(Mutex::new(self))
    }

    /// Apply the command for `dt_s` seconds.
    ///
    /// Steering is saturated at the vehicle's limit and speed is kept between standstill and the
    /// maximum speed.
    pub fn apply(&mut self, cmd: &ControlCommand, dt_s: f64) {
        let steer_rad = cmd.steering_rad.max(-self.max_steer_rad).min(self.max_steer_rad);

        let state = model::State::from_vehicle(&VehicleState {
            x_m: self.pose.position_m[0],
            y_m: self.pose.position_m[1],
            heading_rad: self.pose.heading_rad,
            linear_vel_ms: self.speed_ms,
            ..Default::default()
        });
        let next = model::step(&state, steer_rad, cmd.accel_mss, dt_s, self.wheelbase_m);

        self.pose = Pose2D::new(next.x, next.y, next.psi);
        self.speed_ms = next.v.max(0.0).min(self.max_speed_ms);
        self.yaw_rate_rads = self.speed_ms * steer_rad.tan() / self.wheelbase_m;
    }

    pub fn odometry(&self) -> Odometry {
        Odometry {
            position_m: [self.pose.position_m[0], self.pose.position_m[1]],
            heading_rad: self.pose.heading_rad,
            linear_vel_ms: self.speed_ms,
            angular_vel_rads: self.yaw_rate_rads,
        }
    }

    pub fn velocity(&self) -> VelocityReading {
        VelocityReading {
            linear_ms: self.speed_ms,
            angular_rads: self.yaw_rate_rads,
        }
    }
}

impl SimVehicleIface {
    pub fn new(sim: SharedSim, period_s: f64) -> Self {
        Self { sim, period_s }
    }
}

impl PoseSource for SimPoseSource {
    fn pose(&self) -> Option<Pose2D> {
        Some(lock(&self.0).pose)
    }
}

impl VehicleInterface for SimVehicleIface {
    fn velocity(&mut self) -> Option<VelocityReading> {
        Some(lock(&self.sim).velocity())
    }

    fn odometry(&mut self) -> Option<Odometry> {
        Some(lock(&self.sim).odometry())
    }

    fn send_command(&mut self, cmd: &ControlCommand) {
        lock(&self.sim).apply(cmd, self.period_s);
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn lock(sim: &SharedSim) -> MutexGuard<SimVehicle> {
    sim.lock().unwrap_or_else(PoisonError::into_inner)
}
