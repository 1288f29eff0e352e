//! Constrained minimum-cost assignment of targets to enumerators.
//!
//! One binary variable per known, affordable (target, enumerator) cell:
//! - every target is assigned to exactly one enumerator;
//! - every enumerator gets between `min_target` and `max_target` targets;
//! - no assigned cell costs more than `max_cost`;
//! - the costs assigned to one enumerator sum to at most `max_total_cost`.
//!
//! The objective is the total assigned cost. The mixed integer program is
//! handed to `good_lp` with the pure-Rust `microlp` backend.

use good_lp::solvers::microlp::microlp;
use good_lp::{Expression, ProblemVariables, Solution, SolverModel, Variable, constraint, variable};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::matrix::{AssignmentMatrix, CostMatrix};
use crate::traits::Id;

/// Bounds handed to the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstraintParams {
    /// Fewest targets per enumerator.
    pub min_target: u32,
    /// Most targets per enumerator.
    pub max_target: u32,
    /// Cap on any single assigned cost.
    pub max_cost: f64,
    /// Cap on the summed cost of one enumerator's targets.
    pub max_total_cost: f64,
}

impl ConstraintParams {
    pub fn new(min_target: u32, max_target: u32, max_cost: f64, max_total_cost: f64) -> Self {
        Self {
            min_target,
            max_target,
            max_cost,
            max_total_cost,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_target > self.max_target {
            return Err(ConfigError::InvalidWorkload {
                min_target: self.min_target,
                max_target: self.max_target,
            });
        }
        Ok(())
    }

    /// Same bounds with `max_cost` replaced.
    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = max_cost;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Optimal(AssignmentMatrix),
    /// No assignment satisfies the constraints, or the solver gave up.
    Infeasible,
}

impl SolveOutcome {
    pub fn into_assignment(self) -> Option<AssignmentMatrix> {
        match self {
            SolveOutcome::Optimal(assignment) => Some(assignment),
            SolveOutcome::Infeasible => None,
        }
    }
}

/// Cells that may be chosen: known and within `max_cost`.
struct Candidate {
    target: usize,
    enumerator: usize,
    cost: f64,
    var: Variable,
}

/// Solve the assignment for `costs` under `params`.
///
/// Unknown cells and cells above `max_cost` are never assigned.
pub fn solve<I: Id>(costs: &CostMatrix<I>, params: &ConstraintParams) -> SolveOutcome {
    let (n_targets, n_enums) = costs.shape();
    let min_target = f64::from(params.min_target);
    let max_target = f64::from(params.max_target);

    let mut vars = ProblemVariables::new();
    let mut candidates = Vec::new();
    for target in 0..n_targets {
        for enumerator in 0..n_enums {
            if let Some(cost) = costs.get(target, enumerator).filter(|c| *c <= params.max_cost) {
                candidates.push(Candidate {
                    target,
                    enumerator,
                    cost,
                    var: vars.add(variable().binary()),
                });
            }
        }
    }

    let mut rows = vec![Expression::with_capacity(n_enums); n_targets];
    let mut counts = vec![Expression::with_capacity(n_targets); n_enums];
    let mut totals = vec![Expression::with_capacity(n_targets); n_enums];
    let mut row_sizes = vec![0usize; n_targets];
    let mut column_sizes = vec![0usize; n_enums];
    let mut objective = Expression::with_capacity(candidates.len());
    for candidate in &candidates {
        rows[candidate.target] += candidate.var;
        counts[candidate.enumerator] += candidate.var;
        totals[candidate.enumerator] += candidate.cost * candidate.var;
        objective += candidate.cost * candidate.var;
        row_sizes[candidate.target] += 1;
        column_sizes[candidate.enumerator] += 1;
    }

    if let Some(target) = row_sizes.iter().position(|&size| size == 0) {
        debug!(target, "target has no affordable enumerator");
        return SolveOutcome::Infeasible;
    }
    if params.min_target > 0 && column_sizes.iter().any(|&size| size == 0) {
        debug!("an enumerator has no affordable target but min_target is positive");
        return SolveOutcome::Infeasible;
    }
    if candidates.is_empty() {
        // No targets at all; every count is zero.
        return if params.min_target == 0 {
            SolveOutcome::Optimal(AssignmentMatrix::empty(n_targets, n_enums))
        } else {
            SolveOutcome::Infeasible
        };
    }

    let mut problem = vars.minimise(objective).using(microlp);
    for row in rows {
        problem = problem.with(constraint!(row == 1.0));
    }
    for ((count, total), size) in counts.into_iter().zip(totals).zip(column_sizes) {
        if size == 0 {
            continue;
        }
        problem = problem
            .with(constraint!(count.clone() >= min_target))
            .with(constraint!(count <= max_target))
            .with(constraint!(total <= params.max_total_cost));
    }

    let solution = match problem.solve() {
        Ok(solution) => solution,
        Err(err) => {
            debug!(error = %err, ?params, "assignment problem has no optimal solution");
            return SolveOutcome::Infeasible;
        }
    };

    let mut assignment = AssignmentMatrix::empty(n_targets, n_enums);
    let mut total_cost = 0.0;
    for candidate in &candidates {
        if solution.value(candidate.var) > 0.5 {
            assignment.assign(candidate.target, candidate.enumerator);
            total_cost += candidate.cost;
        }
    }
    debug!(total_cost, ?params, "assignment solved");

    SolveOutcome::Optimal(assignment)
}
