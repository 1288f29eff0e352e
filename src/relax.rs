//! Relaxation search over constraint parameters.
//!
//! Solve, and on infeasibility loosen every bound by `increment_pct` percent
//! and solve again. The search only ever loosens, and stops after the
//! attempt made with `min_target == 0`.

use tracing::{debug, info};

use crate::error::ConfigError;
use crate::matrix::{AssignmentMatrix, CostMatrix};
use crate::solver::{ConstraintParams, SolveOutcome, solve};
use crate::traits::Id;

/// Absorbs float noise such as `10.0 * 1.1 == 11.000000000000002`.
const ROUNDING_SLACK: f64 = 1e-9;

impl ConstraintParams {
    /// One relaxation step.
    ///
    /// `min_target` is scaled down and floored, always dropping by at least
    /// one while positive; `max_target` is scaled up and ceiled; both costs
    /// are scaled up.
    pub fn relaxed(&self, increment_pct: f64) -> Self {
        let down = 1.0 - increment_pct / 100.0;
        let up = 1.0 + increment_pct / 100.0;

        let min_target = if self.min_target == 0 {
            0
        } else {
            let scaled = (f64::from(self.min_target) * down + ROUNDING_SLACK).floor() as u32;
            scaled.min(self.min_target - 1)
        };
        let max_target = ((f64::from(self.max_target) * up - ROUNDING_SLACK).ceil() as u32).max(self.max_target);

        Self {
            min_target,
            max_target,
            max_cost: self.max_cost * up,
            max_total_cost: self.max_total_cost * up,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelaxationOutcome {
    Solved {
        assignment: AssignmentMatrix,
        /// Parameters of the successful attempt.
        params: ConstraintParams,
        /// Every parameter set tried, in order; the last one is `params`.
        attempts: Vec<ConstraintParams>,
    },
    /// No attempt down to `min_target == 0` was feasible.
    Exhausted { attempts: Vec<ConstraintParams> },
}

impl RelaxationOutcome {
    pub fn attempts(&self) -> &[ConstraintParams] {
        match self {
            RelaxationOutcome::Solved { attempts, .. } | RelaxationOutcome::Exhausted { attempts } => {
                attempts
            }
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, RelaxationOutcome::Solved { .. })
    }
}

/// Solve `costs`, loosening `params` by `increment_pct` percent per retry.
///
/// `max_cost` is first raised to [`CostMatrix::max_cost_floor`] when below it.
pub fn solve_with_relaxation<I: Id>(
    costs: &CostMatrix<I>,
    params: ConstraintParams,
    increment_pct: f64,
) -> Result<RelaxationOutcome, ConfigError> {
    if !(increment_pct > 0.0 && increment_pct < 100.0) {
        return Err(ConfigError::InvalidIncrement(increment_pct));
    }
    params.validate()?;

    let mut current = params;
    if let Some(floor) = costs.max_cost_floor() {
        if current.max_cost < floor {
            debug!(max_cost = current.max_cost, floor, "raising max_cost to feasibility floor");
            current = current.with_max_cost(floor);
        }
    }

    let mut attempts = Vec::new();
    loop {
        attempts.push(current);
        debug!(attempt = attempts.len(), params = ?current, "solving assignment");

        match solve(costs, &current) {
            SolveOutcome::Optimal(assignment) => {
                info!(attempts = attempts.len(), params = ?current, "feasible assignment found");
                return Ok(RelaxationOutcome::Solved {
                    assignment,
                    params: current,
                    attempts,
                });
            }
            SolveOutcome::Infeasible if current.min_target == 0 => {
                info!(attempts = attempts.len(), "relaxation exhausted without a feasible assignment");
                return Ok(RelaxationOutcome::Exhausted { attempts });
            }
            SolveOutcome::Infeasible => current = current.relaxed(increment_pct),
        }
    }
}
