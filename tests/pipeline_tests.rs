//! End-to-end planning tests on Bengaluru fixtures.
//!
//! Costs come from the great-circle provider so no service is needed;
//! the trip service is a mock.

mod fixtures;

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;

use survey_planner::error::{PlanError, RoutingError};
use survey_planner::flow::{RelaxedPlan, basic_min_cost_flow, relaxed_min_cost_flow, with_visit_order};
use survey_planner::haversine::HaversineMatrix;
use survey_planner::osrm::{Trip, TripLeg, TripResponse, TripWaypoint};
use survey_planner::postprocess::{AssignmentTable, to_table};
use survey_planner::provider::{Provider, ProviderSettings};
use survey_planner::solver::ConstraintParams;
use survey_planner::traits::TripService;

use fixtures::{enumerators, targets};

// ============================================================================
// Test Infrastructure
// ============================================================================

/// Visits coordinates in input order, 1 km per leg.
struct InputOrderTrips;

#[async_trait]
impl TripService for InputOrderTrips {
    async fn trip(&self, coordinates: &[(f64, f64)]) -> Result<TripResponse, RoutingError> {
        Ok(TripResponse {
            code: "Ok".to_string(),
            message: None,
            waypoints: (0..coordinates.len())
                .map(|waypoint_index| TripWaypoint { waypoint_index, trips_index: 0 })
                .collect(),
            trips: vec![Trip {
                distance: coordinates.len() as f64 * 1000.0,
                duration: 0.0,
                legs: coordinates
                    .iter()
                    .map(|_| TripLeg { distance: 1000.0, duration: 120.0 })
                    .collect(),
                geometry: None,
            }],
        })
    }
}

/// Checks every property an assignment table must satisfy.
fn assert_valid_table(table: &AssignmentTable<String>, n_targets: usize, n_enums: usize, params: &ConstraintParams) {
    assert_eq!(table.len(), n_targets, "one row per target");
    let unique: HashSet<&String> = table.rows().iter().map(|row| &row.target_id).collect();
    assert_eq!(unique.len(), n_targets, "no target assigned twice");

    let mut per_enum: BTreeMap<&String, (u32, f64)> = BTreeMap::new();
    for row in table.rows() {
        assert!(row.cost >= 0.0);
        assert!(row.cost <= params.max_cost + 1e-9, "{} costs {}", row.target_id, row.cost);
        let entry = per_enum.entry(&row.enum_id).or_default();
        entry.0 += 1;
        entry.1 += row.cost;
    }
    // Enumerators without targets are only allowed when min_target is 0.
    if params.min_target > 0 {
        assert_eq!(per_enum.len(), n_enums);
    }
    for (enum_id, (count, total)) in per_enum {
        assert!(count >= params.min_target && count <= params.max_target, "{enum_id} has {count}");
        assert!(total <= params.max_total_cost + 1e-9, "{enum_id} totals {total}");
    }
}

// ============================================================================
// Assignment
// ============================================================================

#[tokio::test]
async fn test_min_cost_flow_ten_targets_three_enumerators() {
    let enums = enumerators(3);
    let sites = targets(10);
    let params = ConstraintParams::new(0, 10, 42.0, 500.0);

    let table = basic_min_cost_flow(&enums, &sites, &HaversineMatrix, params).await.unwrap();

    assert_valid_table(&table, 10, 3, &params);
}

#[tokio::test]
async fn test_min_cost_flow_balanced_workload() {
    let enums = enumerators(3);
    let sites = targets(10);
    let params = ConstraintParams::new(2, 4, 35.0, 300.0);

    let plan = relaxed_min_cost_flow(&enums, &sites, &HaversineMatrix, params, 10.0).await.unwrap();

    let RelaxedPlan::Assigned { table, params: used } = plan else {
        panic!("expected an assignment");
    };
    assert_eq!(used.min_target, 2, "feasible without relaxing");
    assert_valid_table(&table, 10, 3, &used);
}

#[tokio::test]
async fn test_relaxation_recovers_from_infeasible_workload() {
    // Four enumerators with at least two sites each need eight sites.
    let enums = enumerators(4);
    let sites = targets(5);
    let params = ConstraintParams::new(2, 2, 40.0, 300.0);

    let basic = basic_min_cost_flow(&enums, &sites, &HaversineMatrix, params).await;
    assert!(matches!(basic, Err(PlanError::Infeasible)));

    let plan = relaxed_min_cost_flow(&enums, &sites, &HaversineMatrix, params, 10.0).await.unwrap();
    let RelaxedPlan::Assigned { table, params: used } = plan else {
        panic!("expected an assignment");
    };
    assert!(used.min_target < 2);
    assert!(used.max_target >= 2);
    assert_valid_table(&table, 5, 4, &used);
}

#[tokio::test]
async fn test_relaxation_exhausts_on_tiny_budget() {
    let enums = enumerators(2);
    let sites = targets(6);
    // Any enumerator's total is far above 1 km; two steps only add 10% each.
    let params = ConstraintParams::new(1, 6, 40.0, 1.0);

    let plan = relaxed_min_cost_flow(&enums, &sites, &HaversineMatrix, params, 10.0).await.unwrap();

    let RelaxedPlan::NoSolution { attempts } = plan else {
        panic!("expected exhaustion");
    };
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1].min_target, 0);
}

#[tokio::test]
async fn test_table_round_trips_through_matrix() {
    let enums = enumerators(3);
    let sites = targets(10);
    let params = ConstraintParams::new(0, 10, 42.0, 500.0);
    let table = basic_min_cost_flow(&enums, &sites, &HaversineMatrix, params).await.unwrap();

    let matrix = table.to_matrix(&enums, &sites).unwrap();
    let costs = HaversineMatrix.matrix_for(&enums, &sites);

    assert_eq!(to_table(&matrix, &enums, &sites, Some(&costs)).unwrap(), table);
}

#[tokio::test]
async fn test_provider_selected_by_name() {
    let provider = Provider::from_name("haversine", &ProviderSettings::default()).unwrap();
    let params = ConstraintParams::new(1, 5, 40.0, 200.0);

    let table = basic_min_cost_flow(&enumerators(2), &targets(6), &provider, params).await.unwrap();

    assert_valid_table(&table, 6, 2, &params);
}

// ============================================================================
// Visit order
// ============================================================================

#[tokio::test]
async fn test_visit_plan_is_anchored_permutation() {
    let enums = enumerators(3);
    let sites = targets(12);
    let params = ConstraintParams::new(2, 6, 42.0, 500.0);
    let table = basic_min_cost_flow(&enums, &sites, &HaversineMatrix, params).await.unwrap();

    let plan = with_visit_order(&table, &sites, &InputOrderTrips).await.unwrap();

    assert_eq!(plan.stops().len(), table.len());
    for (enum_id, rows) in table.by_enumerator() {
        let route = plan.route(enum_id);
        let ranks: Vec<usize> = route.iter().map(|stop| stop.visit_rank).collect();
        assert_eq!(ranks, (0..rows.len()).collect::<Vec<_>>());

        let cheapest = rows
            .iter()
            .map(|row| row.cost)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(route[0].cost, cheapest);

        let mut assigned: Vec<&String> = rows.iter().map(|row| &row.target_id).collect();
        let mut visited: Vec<&String> = route.iter().map(|stop| &stop.target_id).collect();
        assigned.sort();
        visited.sort();
        assert_eq!(assigned, visited);

        if rows.len() > 1 {
            assert!(route.iter().all(|stop| stop.distance_to_next_km == Some(1.0)));
        }
    }
}
