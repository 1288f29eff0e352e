//! End-to-end planning flows.
//!
//! Location sets in, assignment table (and optionally visit plan) out.

use tracing::info;

use crate::error::PlanError;
use crate::location::LocationSet;
use crate::matrix::CostMatrix;
use crate::postprocess::{AssignmentTable, to_table};
use crate::relax::{RelaxationOutcome, solve_with_relaxation};
use crate::route::{VisitPlan, sequence};
use crate::solver::{ConstraintParams, SolveOutcome, solve};
use crate::traits::{CostMatrixProvider, Id, TripService};

/// Result of [`relaxed_min_cost_flow`].
#[derive(Debug, Clone, PartialEq)]
pub enum RelaxedPlan<I> {
    Assigned {
        table: AssignmentTable<I>,
        /// Parameters the assignment was found with.
        params: ConstraintParams,
    },
    NoSolution {
        attempts: Vec<ConstraintParams>,
    },
}

/// Compute the cost matrix and reject targets no enumerator can reach.
async fn compute_costs<I, P>(
    enumerators: &LocationSet<I>,
    targets: &LocationSet<I>,
    provider: &P,
) -> Result<CostMatrix<I>, PlanError>
where
    I: Id,
    P: CostMatrixProvider,
{
    let costs = provider.compute(enumerators, targets).await;
    if let Some(target) = costs.first_unreachable_target() {
        return Err(PlanError::UnreachableTarget(format!("{:?}", costs.target_ids()[target])));
    }
    if costs.unknown_count() > 0 {
        info!(unknown = costs.unknown_count(), "cost matrix has unknown cells");
    }
    Ok(costs)
}

/// Solve once with `params`.
///
/// A `max_cost` below the matrix's floor is rejected up front, and an
/// infeasible problem is an error.
pub async fn basic_min_cost_flow<I, P>(
    enumerators: &LocationSet<I>,
    targets: &LocationSet<I>,
    provider: &P,
    params: ConstraintParams,
) -> Result<AssignmentTable<I>, PlanError>
where
    I: Id,
    P: CostMatrixProvider,
{
    params.validate()?;
    let costs = compute_costs(enumerators, targets, provider).await?;

    if let Some(floor) = costs.max_cost_floor() {
        if params.max_cost < floor {
            return Err(PlanError::MaxCostBelowFloor {
                max_cost: params.max_cost,
                floor,
            });
        }
    }

    match solve(&costs, &params) {
        SolveOutcome::Optimal(assignment) => to_table(&assignment, enumerators, targets, Some(&costs)),
        SolveOutcome::Infeasible => Err(PlanError::Infeasible),
    }
}

/// Solve with the relaxation search.
pub async fn relaxed_min_cost_flow<I, P>(
    enumerators: &LocationSet<I>,
    targets: &LocationSet<I>,
    provider: &P,
    params: ConstraintParams,
    increment_pct: f64,
) -> Result<RelaxedPlan<I>, PlanError>
where
    I: Id,
    P: CostMatrixProvider,
{
    let costs = compute_costs(enumerators, targets, provider).await?;

    match solve_with_relaxation(&costs, params, increment_pct)? {
        RelaxationOutcome::Solved {
            assignment, params, ..
        } => Ok(RelaxedPlan::Assigned {
            table: to_table(&assignment, enumerators, targets, Some(&costs))?,
            params,
        }),
        RelaxationOutcome::Exhausted { attempts } => Ok(RelaxedPlan::NoSolution { attempts }),
    }
}

/// Add visit order to an assignment table.
pub async fn with_visit_order<I, T>(
    table: &AssignmentTable<I>,
    targets: &LocationSet<I>,
    trips: &T,
) -> Result<VisitPlan<I>, PlanError>
where
    I: Id,
    T: TripService,
{
    let plan = sequence(table, targets, trips).await?;
    info!(stops = plan.stops().len(), "visit order computed");
    Ok(plan)
}
