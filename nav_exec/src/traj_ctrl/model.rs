//! Kinematic bicycle model used for prediction.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_dual::DualNum;
use num_traits::Zero;

use crate::loc::VehicleState;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Predicted state, generic so that it can carry derivatives.
#[derive(Debug, Copy, Clone)]
pub struct State<T> {
    pub x: T,
    pub y: T,
    pub psi: T,
    pub v: T,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T: DualNum<f64> + Copy> State<T> {
    pub fn from_vehicle(vs: &VehicleState) -> Self {
        Self {
            x: T::zero() + vs.x_m,
            y: T::zero() + vs.y_m,
            psi: T::zero() + vs.heading_rad,
            v: T::zero() + vs.linear_vel_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Advance the state by one explicit Euler step of `dt_s`.
pub fn step<T: DualNum<f64> + Copy>(
    s: &State<T>,
    steer_rad: T,
    accel_mss: T,
    dt_s: f64,
    wheelbase_m: f64,
) -> State<T> {
    State {
        x: s.x + s.v * s.psi.cos() * dt_s,
        y: s.y + s.v * s.psi.sin() * dt_s,
        psi: s.psi + s.v * steer_rad.tan() * (dt_s / wheelbase_m),
        v: s.v + accel_mss * dt_s,
    }
}

/// Predict the states reached after each step of the interleaved `[d_0, a_0, ...]` controls.
///
/// The initial state is not included.
pub fn rollout(x0: &VehicleState, u: &[f64], dt_s: f64, wheelbase_m: f64) -> Vec<State<f64>> {
    let mut state = State::from_vehicle(x0);

    u.chunks_exact(2)
        .map(|c| {
            state = step(&state, c[0], c[1], dt_s, wheelbase_m);
            state
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_straight_line() {
        let x0 = VehicleState {
            linear_vel_ms: 1.0,
            ..Default::default()
        };

        let states = rollout(&x0, &[0.0, 0.0, 0.0, 0.0], 0.5, 0.3);

        assert_eq!(states.len(), 2);
        assert!((states[1].x - 1.0).abs() < 1e-12);
        assert!(states[1].y.abs() < 1e-12);
        assert!(states[1].psi.abs() < 1e-12);
    }

    #[test]
    fn test_step_kinematics() {
        let s = State {
            x: 0.0,
            y: 0.0,
            psi: FRAC_PI_2,
            v: 2.0,
        };

        let next = step(&s, 0.3, -1.0, 0.1, 0.5);

        assert!(next.x.abs() < 1e-12);
        assert!((next.y - 0.2).abs() < 1e-12);
        assert!((next.psi - (FRAC_PI_2 + 2.0 * 0.3f64.tan() * 0.2)).abs() < 1e-12);
        assert!((next.v - 1.9).abs() < 1e-12);
    }

    #[test]
    fn test_left_steer_turns_left() {
        let x0 = VehicleState {
            linear_vel_ms: 1.0,
            ..Default::default()
        };

        let states = rollout(&x0, &[0.2, 0.0, 0.2, 0.0, 0.2, 0.0], 0.1, 0.325);
        let last = states.last().unwrap();

        assert!(last.psi > 0.0);
        assert!(last.y > 0.0);
    }
}
