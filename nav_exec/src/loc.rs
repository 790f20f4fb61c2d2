//! # Localisation module
//!
//! Planar poses and the vehicle state estimate used by trajectory control. All quantities are
//! expressed in the planar frame shared by the local path and the vehicle odometry.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::vehicle::{ControlCommand, Odometry, VelocityReading};
use nalgebra::{Isometry2, Vector2};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A position and heading on the plane.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    /// The position in meters
    pub position_m: Vector2<f64>,

    /// The heading in radians, positive anticlockwise from the frame's X+ axis
    pub heading_rad: f64,
}

/// The vehicle state estimate owned by trajectory control.
///
/// Only updated by `TrajCtrl::observe`. The `last_*` fields hold the command issued on the
/// previous cycle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct VehicleState {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub linear_vel_ms: f64,
    pub angular_vel_rads: f64,
    pub last_accel_mss: f64,
    pub last_steering_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose2D {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            heading_rad,
        }
    }

    /// Create a pose at the given position with zero heading.
    pub fn from_position(position_m: Vector2<f64>) -> Self {
        Self {
            position_m,
            heading_rad: 0.0,
        }
    }

    /// Squared planar distance to another position.
    pub fn dist_sq_to(&self, position_m: &Vector2<f64>) -> f64 {
        (self.position_m - position_m).norm_squared()
    }

    /// Returns the isometry which takes points from this pose's body frame into the parent frame.
    pub fn to_isometry(&self) -> Isometry2<f64> {
        Isometry2::new(self.position_m, self.heading_rad)
    }

    /// Build a pose from an isometry in the parent frame.
    pub fn from_isometry(iso: &Isometry2<f64>) -> Self {
        Self {
            position_m: iso.translation.vector,
            heading_rad: iso.rotation.angle(),
        }
    }
}

impl VehicleState {
    /// Build the state from a pair of readings and the command issued on the previous cycle.
    pub fn from_readings(
        velocity: &VelocityReading,
        odometry: &Odometry,
        last_cmd: &ControlCommand,
    ) -> Self {
        Self {
            x_m: odometry.position_m[0],
            y_m: odometry.position_m[1],
            heading_rad: odometry.heading_rad,
            linear_vel_ms: velocity.linear_ms,
            angular_vel_rads: velocity.angular_rads,
            last_accel_mss: last_cmd.accel_mss,
            last_steering_rad: last_cmd.steering_rad,
        }
    }

    pub fn position_m(&self) -> Vector2<f64> {
        Vector2::new(self.x_m, self.y_m)
    }

    pub fn pose(&self) -> Pose2D {
        Pose2D::new(self.x_m, self.y_m, self.heading_rad)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_isometry_round_trip() {
        let pose = Pose2D::new(1.0, -2.0, FRAC_PI_2);
        let back = Pose2D::from_isometry(&pose.to_isometry());

        assert!((back.position_m - pose.position_m).norm() < 1e-12);
        assert!((back.heading_rad - pose.heading_rad).abs() < 1e-12);
    }

    #[test]
    fn test_state_from_readings() {
        let state = VehicleState::from_readings(
            &VelocityReading {
                linear_ms: 0.5,
                angular_rads: 0.1,
            },
            &Odometry {
                position_m: [1.0, 2.0],
                heading_rad: 0.3,
                // Odometry velocities are ignored in favour of the velocity reading
                linear_vel_ms: 9.0,
                angular_vel_rads: 9.0,
            },
            &ControlCommand {
                steering_rad: 0.2,
                accel_mss: -1.0,
            },
        );

        assert_eq!(state.x_m, 1.0);
        assert_eq!(state.y_m, 2.0);
        assert_eq!(state.heading_rad, 0.3);
        assert_eq!(state.linear_vel_ms, 0.5);
        assert_eq!(state.angular_vel_rads, 0.1);
        assert_eq!(state.last_steering_rad, 0.2);
        assert_eq!(state.last_accel_mss, -1.0);
    }
}
