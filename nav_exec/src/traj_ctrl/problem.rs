//! # Receding horizon problem
//!
//! The finite-horizon optimal control problem solved by trajectory control on every cycle. The
//! decision vector holds one `(steering, acceleration)` pair per horizon step, interleaved as
//! `[d_0, a_0, d_1, a_1, ...]`.
//!
//! The cost is written once, generically over the scalar type, so that it can be evaluated in
//! plain `f64` during the line search and in dual numbers to get exact gradients.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use num_dual::{Dual64, DualNum};
use num_traits::{One, Zero};

// Internal
use super::{model, params::Params, solver::Objective};
use crate::{loc::VehicleState, path::PathSegment};
use util::maths::lin_map;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The problem for one control cycle.
pub struct MpcProblem<'a> {
    params: &'a Params,

    /// Initial state of the prediction
    x0: VehicleState,

    /// Non-degenerate segments of the tracked reference
    segments: &'a [PathSegment],

    goal_m: Vector2<f64>,

    lower: Vec<f64>,
    upper: Vec<f64>,

    /// Reference association of each predicted state, refreshed every solver iteration
    assoc: Vec<StepRef>,
}

/// The part of the reference a predicted state is compared against.
#[derive(Debug, Copy, Clone)]
struct StepRef {
    segment: usize,
    target_speed_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a> MpcProblem<'a> {
    /// Build the problem around the given state and reference.
    ///
    /// `segments` must not be empty.
    pub fn new(
        params: &'a Params,
        x0: VehicleState,
        segments: &'a [PathSegment],
        goal_m: Vector2<f64>,
    ) -> Self {
        let n = 2 * params.horizon_len;

        let mut lower = Vec::with_capacity(n);
        let mut upper = Vec::with_capacity(n);
        for _ in 0..params.horizon_len {
            lower.push(-params.max_steer_rad);
            lower.push(-params.max_accel_mss);
            upper.push(params.max_steer_rad);
            upper.push(params.max_accel_mss);
        }

        let mut problem = Self {
            params,
            x0,
            segments,
            goal_m,
            lower,
            upper,
            assoc: Vec::new(),
        };
        problem.associate(&vec![0.0; n]);

        problem
    }

    /// Index of the segment closest to the given position.
    pub fn nearest_segment(segments: &[PathSegment], position_m: &Vector2<f64>) -> usize {
        let mut best = 0;
        let mut best_dist_m = std::f64::INFINITY;

        for (i, seg) in segments.iter().enumerate() {
            let dist_m = seg.dist_to_m(position_m);
            if dist_m < best_dist_m {
                best = i;
                best_dist_m = dist_m;
            }
        }

        best
    }

    /// Speed demand at the given position, ramping linearly to zero at the goal.
    pub fn target_speed_ms(&self, position_m: &Vector2<f64>) -> f64 {
        let dist_m = (self.goal_m - position_m).norm();

        if self.params.slow_down_dist_m <= 0.0 {
            return self.params.target_speed_ms;
        }

        lin_map(
            (0.0, self.params.slow_down_dist_m),
            (0.0, self.params.target_speed_ms),
            dist_m.min(self.params.slow_down_dist_m),
        )
    }

    /// Recompute the reference association along the trajectory predicted from `u`.
    fn associate(&mut self, u: &[f64]) {
        let states = model::rollout(&self.x0, u, self.params.step_s, self.params.wheelbase_m);

        self.assoc = states
            .iter()
            .map(|s| {
                let position_m = Vector2::new(s.x, s.y);
                StepRef {
                    segment: Self::nearest_segment(self.segments, &position_m),
                    target_speed_ms: self.target_speed_ms(&position_m),
                }
            })
            .collect();
    }

    /// Evaluate the cost of the decision vector.
    pub fn eval<T: DualNum<f64> + Copy>(&self, u: &[T]) -> T {
        let w = &self.params.weights;
        let dt = self.params.step_s;
        let wheelbase_m = self.params.wheelbase_m;

        let mut state = model::State::from_vehicle(&self.x0);
        let mut prev_steer = T::zero() + self.x0.last_steering_rad;
        let mut prev_accel = T::zero() + self.x0.last_accel_mss;
        let mut cost = T::zero();

        for (k, step) in self.assoc.iter().enumerate() {
            let steer = u[2 * k];
            let accel = u[2 * k + 1];

            state = model::step(&state, steer, accel, dt, wheelbase_m);

            let seg = &self.segments[step.segment];

            // Cross-track error, signed distance to the left of the segment
            let lat = (state.y - seg.start_m[1]) * seg.direction[0]
                - (state.x - seg.start_m[0]) * seg.direction[1];
            cost += lat * lat * w.cross_track;

            // Heading error, 2(1 - cos(dpsi)) behaves like dpsi^2 near zero without wrapping
            let head_cos = (state.psi - seg.heading_rad).cos();
            cost += (T::one() - head_cos) * (2.0 * w.heading);

            let speed_err = state.v - step.target_speed_ms;
            cost += speed_err * speed_err * w.speed;

            cost += steer * steer * w.steer + accel * accel * w.accel;

            let steer_rate = steer - prev_steer;
            let accel_rate = accel - prev_accel;
            cost += steer_rate * steer_rate * w.steer_rate + accel_rate * accel_rate * w.accel_rate;

            prev_steer = steer;
            prev_accel = accel;
        }

        cost
    }
}

impl<'a> Objective for MpcProblem<'a> {
    fn dim(&self) -> usize {
        2 * self.params.horizon_len
    }

    fn lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    fn refresh(&mut self, u: &[f64]) {
        self.associate(u);
    }

    fn cost(&self, u: &[f64]) -> f64 {
        self.eval(u)
    }

    /// Forward mode differentiation, one pass per decision variable.
    fn cost_and_gradient(&self, u: &[f64], grad: &mut [f64]) -> f64 {
        if u.is_empty() {
            return self.eval(u);
        }

        let mut cost = 0.0;
        let mut seeded: Vec<Dual64> = u.iter().map(|&x| Dual64::new(x, 0.0)).collect();

        for i in 0..u.len() {
            seeded[i] = Dual64::new(u[i], 1.0);

            let result = self.eval(&seeded);
            grad[i] = result.eps;
            cost = result.re;

            seeded[i] = Dual64::new(u[i], 0.0);
        }

        cost
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::Pose2D;
    use crate::path::{Path, PathSegment};

    fn segments(points: &[(f64, f64)]) -> Vec<PathSegment> {
        let path = Path::from_points(points.iter().map(|&(x, y)| Pose2D::new(x, y, 0.0)).collect());
        (1..path.get_num_points())
            .filter_map(|i| path.get_segment_to_target(i))
            .collect()
    }

    fn state(x_m: f64, y_m: f64, heading_rad: f64, v: f64) -> VehicleState {
        VehicleState {
            x_m,
            y_m,
            heading_rad,
            linear_vel_ms: v,
            last_steering_rad: 0.05,
            last_accel_mss: -0.2,
            ..Default::default()
        }
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let params = Params::default();
        let segs = segments(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.5), (3.0, 1.5)]);
        let problem = MpcProblem::new(&params, state(0.1, -0.2, 0.1, 0.8), &segs, Vector2::new(3.0, 1.5));

        let u: Vec<f64> = (0..problem.dim())
            .map(|i| 0.1 * ((i as f64) * 0.7).sin())
            .collect();

        let mut grad = vec![0.0; u.len()];
        let cost = problem.cost_and_gradient(&u, &mut grad);
        assert!((cost - problem.cost(&u)).abs() < 1e-12);

        let h = 1e-6;
        for i in 0..u.len() {
            let mut up = u.clone();
            let mut down = u.clone();
            up[i] += h;
            down[i] -= h;

            let fd = (problem.cost(&up) - problem.cost(&down)) / (2.0 * h);
            assert!(
                (fd - grad[i]).abs() < 1e-5 * (1.0 + fd.abs()),
                "gradient mismatch at {}: AD {} FD {}",
                i,
                grad[i],
                fd
            );
        }
    }

    #[test]
    fn test_bounds() {
        let params = Params::default();
        let segs = segments(&[(0.0, 0.0), (1.0, 0.0)]);
        let problem = MpcProblem::new(&params, state(0.0, 0.0, 0.0, 0.0), &segs, Vector2::new(1.0, 0.0));

        assert_eq!(problem.lower_bounds().len(), 2 * params.horizon_len);
        assert_eq!(problem.upper_bounds()[0], params.max_steer_rad);
        assert_eq!(problem.lower_bounds()[1], -params.max_accel_mss);
    }

    #[test]
    fn test_target_speed_ramp() {
        let params = Params::default();
        let segs = segments(&[(0.0, 0.0), (4.0, 0.0)]);
        let problem = MpcProblem::new(&params, state(0.0, 0.0, 0.0, 0.0), &segs, Vector2::new(4.0, 0.0));

        assert_eq!(problem.target_speed_ms(&Vector2::new(0.0, 0.0)), params.target_speed_ms);
        assert!((problem.target_speed_ms(&Vector2::new(3.5, 0.0)) - 0.5).abs() < 1e-12);
        assert_eq!(problem.target_speed_ms(&Vector2::new(4.0, 0.0)), 0.0);
    }

    #[test]
    fn test_nearest_segment() {
        let segs = segments(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);

        assert_eq!(MpcProblem::nearest_segment(&segs, &Vector2::new(0.5, -0.1)), 0);
        assert_eq!(MpcProblem::nearest_segment(&segs, &Vector2::new(1.2, 0.8)), 1);
    }

    #[test]
    fn test_cost_prefers_path() {
        let params = Params::default();
        let segs = segments(&[(0.0, 0.0), (5.0, 0.0)]);
        let on_path = MpcProblem::new(&params, state(0.0, 0.0, 0.0, 1.0), &segs, Vector2::new(5.0, 0.0));
        let off_path = MpcProblem::new(&params, state(0.0, 0.5, 0.0, 1.0), &segs, Vector2::new(5.0, 0.0));

        let u = vec![0.0; on_path.dim()];
        assert!(on_path.cost(&u) < off_path.cost(&u));
    }
}
