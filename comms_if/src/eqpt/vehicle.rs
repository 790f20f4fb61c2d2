//! # Vehicle Equipment Interface
//!
//! Readings produced by the vehicle platform and the commands it accepts. All quantities are
//! expressed in the odometry frame, following the right hand rule about the vehicle's Z+
//! (upwards) axis.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Odometry estimate of the vehicle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Odometry {
    /// Position of the vehicle's reference point in meters.
    pub position_m: [f64; 2],

    /// Heading of the vehicle in radians, positive anticlockwise from the frame's X+ axis.
    pub heading_rad: f64,

    /// Forward speed in meters/second.
    pub linear_vel_ms: f64,

    /// Yaw rate in radians/second.
    pub angular_vel_rads: f64,
}

/// Velocity of the vehicle as reported by its wheel encoders.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityReading {
    /// Forward speed in meters/second.
    pub linear_ms: f64,

    /// Yaw rate in radians/second.
    pub angular_rads: f64,
}

/// A steering and acceleration demand sent to the vehicle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    /// Steering angle of the front axle in radians.
    ///
    /// Positive angles turn the vehicle to the left.
    pub steering_rad: f64,

    /// Longitudinal acceleration in meters/second^2.
    ///
    /// Negative values brake the vehicle.
    pub accel_mss: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControlCommand {
    /// A command which holds the wheels straight and does not accelerate.
    pub fn neutral() -> Self {
        Self::default()
    }

    /// A command with straight wheels and the given braking deceleration.
    ///
    /// Positive or non-finite decelerations are clamped so the result never accelerates.
    pub fn braking(decel_mss: f64) -> Self {
        let accel_mss = if decel_mss.is_finite() {
            -decel_mss.abs()
        } else {
            0.0
        };

        Self {
            steering_rad: 0.0,
            accel_mss,
        }
    }

    /// Returns true if both fields are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.steering_rad.is_finite() && self.accel_mss.is_finite()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_braking_never_accelerates() {
        assert_eq!(ControlCommand::braking(2.0).accel_mss, -2.0);
        assert_eq!(ControlCommand::braking(-2.0).accel_mss, -2.0);
        assert_eq!(ControlCommand::braking(std::f64::NAN).accel_mss, 0.0);
        assert_eq!(ControlCommand::braking(1.0).steering_rad, 0.0);
    }

    #[test]
    fn test_command_json() {
        let cmd = ControlCommand {
            steering_rad: 0.1,
            accel_mss: -0.5,
        };

        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"steering_rad":0.1,"accel_mss":-0.5}"#);
    }
}
