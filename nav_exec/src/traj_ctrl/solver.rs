//! # Projected gradient solver
//!
//! Minimises a smooth objective over a box using projected gradient descent. Step sizes come from
//! the Barzilai-Borwein rule and are safeguarded by Armijo backtracking along the projection arc.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;

use super::params::SolverParams;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A box constrained objective function.
pub trait Objective {
    /// Number of decision variables
    fn dim(&self) -> usize;

    fn lower_bounds(&self) -> &[f64];

    fn upper_bounds(&self) -> &[f64];

    /// Called at the start of every iteration with the current iterate, allowing the objective to
    /// update any data it linearises around that point.
    fn refresh(&mut self, _u: &[f64]) {}

    fn cost(&self, u: &[f64]) -> f64;

    /// Evaluate the cost and write its gradient into `grad`.
    fn cost_and_gradient(&self, u: &[f64], grad: &mut [f64]) -> f64;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct Solver {
    params: SolverParams,
}

/// The result of a successful solve.
#[derive(Debug, Clone)]
pub struct Solution {
    pub u: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub termination: Termination,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The criterion which ended a successful solve.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Termination {
    /// The projected gradient vanished
    Gradient,

    /// The cost stopped changing
    CostChange,

    /// No step satisfied the sufficient decrease condition, the current point is kept
    Stalled,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SolverError {
    #[error("Solver did not converge within {0} iterations")]
    NonConvergence(usize),

    #[error("Non-finite cost or gradient after {0} iterations")]
    NonFinite(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Solver {
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    /// Minimise the objective starting from `u0`.
    ///
    /// `u0` is resized to the objective's dimension (padding with zeros) and projected onto the
    /// bounds before the first iteration.
    pub fn solve<O: Objective>(
        &self,
        objective: &mut O,
        mut u0: Vec<f64>,
    ) -> Result<Solution, SolverError> {
        let p = &self.params;
        let n = objective.dim();

        u0.resize(n, 0.0);
        project(&mut u0, objective.lower_bounds(), objective.upper_bounds());
        let mut u = u0;

        objective.refresh(&u);
        let mut grad = vec![0.0; n];
        let mut cost = objective.cost_and_gradient(&u, &mut grad);
        if !is_finite(cost, &grad) {
            return Err(SolverError::NonFinite(0));
        }

        // Previous iterate and gradient, used for the BB step
        let mut prev: Option<(Vec<f64>, Vec<f64>)> = None;

        for iteration in 1..=p.max_iterations {
            let pg_norm = projected_grad_norm(
                &u,
                &grad,
                objective.lower_bounds(),
                objective.upper_bounds(),
            );
            if pg_norm < p.grad_tol {
                return Ok(Solution {
                    u,
                    cost,
                    iterations: iteration - 1,
                    termination: Termination::Gradient,
                });
            }

            let step = match prev {
                Some((ref prev_u, ref prev_grad)) => {
                    bb_step(&u, prev_u, &grad, prev_grad).unwrap_or(p.initial_step)
                }
                None => p.initial_step,
            }
            .max(p.min_step)
            .min(p.max_step);

            // Backtracking line search along the projection arc
            let mut alpha = step;
            let mut accepted = None;
            for _ in 0..=p.max_backtracks {
                let mut candidate: Vec<f64> =
                    u.iter().zip(grad.iter()).map(|(x, g)| x - alpha * g).collect();
                project(
                    &mut candidate,
                    objective.lower_bounds(),
                    objective.upper_bounds(),
                );

                let decrease: f64 = grad
                    .iter()
                    .zip(candidate.iter().zip(u.iter()))
                    .map(|(g, (c, x))| g * (c - x))
                    .sum();

                let candidate_cost = objective.cost(&candidate);
                if candidate_cost.is_finite() && candidate_cost <= cost + p.armijo_c * decrease {
                    accepted = Some((candidate, candidate_cost));
                    break;
                }

                alpha *= p.backtrack_factor;
            }

            let (candidate, candidate_cost) = match accepted {
                Some(a) => a,
                None => {
                    trace!("Line search stalled at iteration {}", iteration);
                    return Ok(Solution {
                        u,
                        cost,
                        iterations: iteration,
                        termination: Termination::Stalled,
                    });
                }
            };

            let rel_change = (cost - candidate_cost).abs() / cost.abs().max(1.0);

            prev = Some((std::mem::replace(&mut u, candidate), grad.clone()));

            objective.refresh(&u);
            cost = objective.cost_and_gradient(&u, &mut grad);
            if !is_finite(cost, &grad) {
                return Err(SolverError::NonFinite(iteration));
            }

            if rel_change < p.cost_rel_tol {
                return Ok(Solution {
                    u,
                    cost,
                    iterations: iteration,
                    termination: Termination::CostChange,
                });
            }
        }

        Err(SolverError::NonConvergence(p.max_iterations))
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp each element of `u` into its bounds.
pub fn project(u: &mut [f64], lower: &[f64], upper: &[f64]) {
    for ((x, lo), hi) in u.iter_mut().zip(lower.iter()).zip(upper.iter()) {
        *x = x.max(*lo).min(*hi);
    }
}

/// Norm of the projected gradient step `P(u - g) - u`, zero at a constrained minimum.
fn projected_grad_norm(u: &[f64], grad: &[f64], lower: &[f64], upper: &[f64]) -> f64 {
    u.iter()
        .zip(grad.iter())
        .zip(lower.iter().zip(upper.iter()))
        .map(|((x, g), (lo, hi))| {
            let d = (x - g).max(*lo).min(*hi) - x;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Barzilai-Borwein step `s.s / s.y`, or `None` if the curvature along `s` is not positive.
fn bb_step(u: &[f64], prev_u: &[f64], grad: &[f64], prev_grad: &[f64]) -> Option<f64> {
    let mut ss = 0.0;
    let mut sy = 0.0;

    for i in 0..u.len() {
        let s = u[i] - prev_u[i];
        let y = grad[i] - prev_grad[i];
        ss += s * s;
        sy += s * y;
    }

    if sy > 0.0 {
        Some(ss / sy)
    } else {
        None
    }
}

fn is_finite(cost: f64, grad: &[f64]) -> bool {
    cost.is_finite() && grad.iter().all(|g| g.is_finite())
}
