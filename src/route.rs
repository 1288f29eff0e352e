//! Route sequencing.
//!
//! Every enumerator's assigned targets are ordered by the trip service, one
//! request per enumerator, all in flight together. The returned tour is a
//! cycle with an arbitrary starting point, so it is rotated to start at the
//! target with the lowest assignment cost.

use std::collections::BTreeMap;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PlanError;
use crate::location::LocationSet;
use crate::osrm::TripResponse;
use crate::polyline::{DEFAULT_PRECISION, Polyline};
use crate::postprocess::{AssignmentRow, AssignmentTable};
use crate::traits::{Id, TripService};

/// An assignment row with its place in the enumerator's route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitStop<I> {
    pub target_id: I,
    pub enum_id: I,
    pub cost: f64,
    /// 0 for the first target visited.
    pub visit_rank: usize,
    /// Kilometres to the next stop of the round trip; `None` when unknown.
    pub distance_to_next_km: Option<f64>,
}

/// Sequenced assignment: stops sorted by enumerator then visit rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitPlan<I: Ord> {
    stops: Vec<VisitStop<I>>,
    geometries: BTreeMap<I, Polyline>,
}

impl<I: Id> VisitPlan<I> {
    pub fn stops(&self) -> &[VisitStop<I>] {
        &self.stops
    }

    pub fn into_stops(self) -> Vec<VisitStop<I>> {
        self.stops
    }

    /// Stops of one enumerator, in visit order.
    pub fn route(&self, enum_id: &I) -> Vec<&VisitStop<I>> {
        self.stops.iter().filter(|stop| &stop.enum_id == enum_id).collect()
    }

    /// Tour geometry of one enumerator, when the trip service returned one.
    pub fn geometry(&self, enum_id: &I) -> Option<&Polyline> {
        self.geometries.get(enum_id)
    }
}

/// Rotate tour ranks so that the input at `start` gets rank 0.
pub fn reanchor(ranks: &[usize], start: usize) -> Vec<usize> {
    let len = ranks.len();
    let Some(&start_rank) = ranks.get(start) else {
        return ranks.to_vec();
    };
    ranks.iter().map(|&rank| (rank + len - start_rank) % len).collect()
}

/// Order every enumerator's targets into a visit sequence.
///
/// Fails only when a target id of `table` is missing from `targets`; trip
/// service failures fall back to nearest-first ordering.
pub async fn sequence<I, T>(
    table: &AssignmentTable<I>,
    targets: &LocationSet<I>,
    trips: &T,
) -> Result<VisitPlan<I>, PlanError>
where
    I: Id,
    T: TripService,
{
    let mut groups = Vec::new();
    for (enum_id, rows) in table.by_enumerator() {
        let ids: Vec<I> = rows.iter().map(|row| row.target_id.clone()).collect();
        let coordinates = targets.subset(&ids)?.coordinates();
        groups.push((enum_id.clone(), rows, coordinates));
    }
    debug!(groups = groups.len(), "sequencing routes");

    let routes = join_all(
        groups
            .into_iter()
            .map(|(enum_id, rows, coordinates)| sequence_group(enum_id, rows, coordinates, trips)),
    )
    .await;

    let mut stops = Vec::with_capacity(table.len());
    let mut geometries = BTreeMap::new();
    for route in routes {
        if let Some(geometry) = route.geometry {
            geometries.insert(route.enum_id, geometry);
        }
        stops.extend(route.stops);
    }
    stops.sort_by(|a, b| (&a.enum_id, a.visit_rank).cmp(&(&b.enum_id, b.visit_rank)));

    Ok(VisitPlan { stops, geometries })
}

struct GroupRoute<I> {
    enum_id: I,
    stops: Vec<VisitStop<I>>,
    geometry: Option<Polyline>,
}

/// Tour as returned by the trip service, indexed by input position.
struct Tour {
    ranks: Vec<usize>,
    /// Leg leaving each tour position, in kilometres.
    legs_km: Vec<Option<f64>>,
    geometry: Option<String>,
}

async fn sequence_group<I: Id, T: TripService>(
    enum_id: I,
    rows: Vec<&AssignmentRow<I>>,
    coordinates: Vec<(f64, f64)>,
    trips: &T,
) -> GroupRoute<I> {
    let costs: Vec<f64> = rows.iter().map(|row| row.cost).collect();

    let tour = if rows.len() < 2 {
        None
    } else {
        match trips.trip(&coordinates).await {
            Ok(response) => {
                let tour = tour_from_response(response, rows.len());
                if tour.is_none() {
                    warn!(enum_id = ?enum_id, "trip response does not cover the group; using nearest-first order");
                }
                tour
            }
            Err(err) => {
                warn!(enum_id = ?enum_id, error = %err, "trip request failed; using nearest-first order");
                None
            }
        }
    };

    let (ranks, legs_km, geometry) = match tour {
        Some(tour) => {
            let start = cheapest(&costs);
            let ranks = reanchor(&tour.ranks, start);
            // Legs follow the service's tour positions, not the rotated ranks.
            let legs_km: Vec<Option<f64>> = tour.ranks.iter().map(|&rank| tour.legs_km[rank]).collect();
            (ranks, legs_km, tour.geometry.and_then(|encoded| decode_geometry(&enum_id, &encoded)))
        }
        None => (nearest_first(&costs), vec![None; rows.len()], None),
    };

    let stops = rows
        .into_iter()
        .zip(ranks)
        .zip(legs_km)
        .map(|((row, visit_rank), distance_to_next_km)| VisitStop {
            target_id: row.target_id.clone(),
            enum_id: row.enum_id.clone(),
            cost: row.cost,
            visit_rank,
            distance_to_next_km,
        })
        .collect();

    GroupRoute {
        enum_id,
        stops,
        geometry,
    }
}

/// Extract a single round trip over exactly `len` inputs.
fn tour_from_response(response: TripResponse, len: usize) -> Option<Tour> {
    if response.waypoints.len() != len || response.waypoints.iter().any(|w| w.trips_index != 0) {
        return None;
    }
    let ranks: Vec<usize> = response.waypoints.iter().map(|w| w.waypoint_index).collect();
    let mut seen = vec![false; len];
    for &rank in &ranks {
        if rank >= len || std::mem::replace(&mut seen[rank], true) {
            return None;
        }
    }

    let trip = response.trips.into_iter().next()?;
    let legs_km = (0..len)
        .map(|position| trip.legs.get(position).map(|leg| leg.distance / 1000.0))
        .collect();

    Some(Tour {
        ranks,
        legs_km,
        geometry: trip.geometry,
    })
}

/// Index of the lowest cost; the first one on ties.
fn cheapest(costs: &[f64]) -> usize {
    let mut best = 0;
    for (index, cost) in costs.iter().enumerate() {
        if cost.total_cmp(&costs[best]).is_lt() {
            best = index;
        }
    }
    best
}

/// Ranks by ascending cost, ties in input order.
fn nearest_first(costs: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..costs.len()).collect();
    order.sort_by(|&a, &b| costs[a].total_cmp(&costs[b]));
    let mut ranks = vec![0; costs.len()];
    for (rank, index) in order.into_iter().enumerate() {
        ranks[index] = rank;
    }
    ranks
}

fn decode_geometry<I: Id>(enum_id: &I, encoded: &str) -> Option<Polyline> {
    match Polyline::decode(encoded, DEFAULT_PRECISION) {
        Ok(polyline) => Some(polyline),
        Err(err) => {
            warn!(enum_id = ?enum_id, error = %err, "undecodable trip geometry dropped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::RoutingError;
    use crate::location::Location;
    use crate::osrm::{Trip, TripLeg, TripWaypoint};

    /// Tours visit targets by descending latitude; the leg leaving tour
    /// position `p` is `(p + 1)` km. Groups containing a negative latitude
    /// fail. Larger groups answer sooner.
    struct FakeTrips {
        calls: AtomicUsize,
    }

    impl FakeTrips {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl TripService for FakeTrips {
        async fn trip(&self, coordinates: &[(f64, f64)]) -> Result<TripResponse, RoutingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100 / coordinates.len() as u64)).await;
            if coordinates.iter().any(|(lat, _)| *lat < 0.0) {
                return Err(RoutingError::Service {
                    code: "NoTrips".to_string(),
                    message: "no trip".to_string(),
                });
            }

            let mut order: Vec<usize> = (0..coordinates.len()).collect();
            order.sort_by(|&a, &b| coordinates[b].0.total_cmp(&coordinates[a].0));
            let mut waypoints = vec![0; coordinates.len()];
            for (position, index) in order.into_iter().enumerate() {
                waypoints[index] = position;
            }

            Ok(TripResponse {
                code: "Ok".to_string(),
                message: None,
                waypoints: waypoints
                    .into_iter()
                    .map(|waypoint_index| TripWaypoint { waypoint_index, trips_index: 0 })
                    .collect(),
                trips: vec![Trip {
                    distance: 0.0,
                    duration: 0.0,
                    legs: (0..coordinates.len())
                        .map(|p| TripLeg { distance: (p as f64 + 1.0) * 1000.0, duration: 60.0 })
                        .collect(),
                    geometry: Some("_p~iF~ps|U_ulLnnqC".to_string()),
                }],
            })
        }
    }

    fn targets() -> LocationSet<&'static str> {
        LocationSet::new(vec![
            Location::new("t1", 1.0, 0.0),
            Location::new("t2", 2.0, 0.0),
            Location::new("t3", 3.0, 0.0),
            Location::new("t4", 4.0, 0.0),
            Location::new("t5", 5.0, 0.0),
            Location::new("t6", -1.0, 0.0),
            Location::new("t7", 6.0, 0.0),
        ])
        .unwrap()
    }

    fn row(target_id: &'static str, enum_id: &'static str, cost: f64) -> AssignmentRow<&'static str> {
        AssignmentRow { target_id, enum_id, cost }
    }

    fn ranks_of<'a>(plan: &'a VisitPlan<&'static str>, enum_id: &'static str) -> Vec<(&'a str, usize, Option<f64>)> {
        plan.route(&enum_id)
            .into_iter()
            .map(|stop| (stop.target_id, stop.visit_rank, stop.distance_to_next_km))
            .collect()
    }

    #[test]
    fn test_reanchor_rotates_to_start() {
        assert_eq!(reanchor(&[3, 2, 1, 0], 1), vec![1, 0, 3, 2]);
        assert_eq!(reanchor(&[0, 1, 2], 0), vec![0, 1, 2]);
        assert_eq!(reanchor(&[2, 0, 1], 0), vec![0, 1, 2]);
    }

    #[test]
    fn test_ties_pick_first_row() {
        assert_eq!(cheapest(&[3.0, 1.0, 1.0]), 1);
        assert_eq!(nearest_first(&[3.0, 1.0, 1.0]), vec![2, 0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tour_starts_at_cheapest_target() {
        let table = AssignmentTable::new(vec![
            row("t1", "e1", 5.0),
            row("t2", "e1", 2.0),
            row("t3", "e1", 7.0),
            row("t4", "e1", 3.0),
        ]);

        let plan = sequence(&table, &targets(), &FakeTrips::new()).await.unwrap();

        // Service tour: t4, t3, t2, t1; rotated to start at t2.
        assert_eq!(
            ranks_of(&plan, "e1"),
            vec![
                ("t2", 0, Some(3.0)),
                ("t1", 1, Some(4.0)),
                ("t4", 2, Some(1.0)),
                ("t3", 3, Some(2.0)),
            ]
        );
        assert_eq!(plan.geometry(&"e1").unwrap().points().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_groups_sequenced_independently() {
        let table = AssignmentTable::new(vec![
            row("t1", "e2", 1.0),
            row("t2", "e1", 4.0),
            row("t3", "e2", 9.0),
            row("t4", "e1", 1.0),
            row("t5", "e1", 6.0),
            row("t7", "e3", 2.0),
        ]);
        let trips = FakeTrips::new();

        let plan = sequence(&table, &targets(), &trips).await.unwrap();

        assert_eq!(plan.stops().len(), 6);
        let order: Vec<(&str, usize)> = plan.stops().iter().map(|s| (s.enum_id, s.visit_rank)).collect();
        assert_eq!(order, vec![("e1", 0), ("e1", 1), ("e1", 2), ("e2", 0), ("e2", 1), ("e3", 0)]);
        assert_eq!(plan.route(&"e1")[0].target_id, "t4");
        assert_eq!(plan.route(&"e2")[0].target_id, "t1");
        // The single-target group needs no request.
        assert_eq!(ranks_of(&plan, "e3"), vec![("t7", 0, None)]);
        assert_eq!(trips.calls.load(Ordering::SeqCst), 2);
        assert!(plan.geometry(&"e3").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_requests_overlap() {
        // Two targets answer after 50 ms, four after 25 ms.
        let table = AssignmentTable::new(vec![
            row("t1", "e1", 1.0),
            row("t2", "e1", 2.0),
            row("t3", "e2", 1.0),
            row("t4", "e2", 2.0),
            row("t5", "e2", 3.0),
            row("t7", "e2", 4.0),
        ]);
        let trips = FakeTrips::new();

        let start = tokio::time::Instant::now();
        let plan = sequence(&table, &targets(), &trips).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(plan.stops().len(), 6);
        assert_eq!(trips.calls.load(Ordering::SeqCst), 2);
        assert!(elapsed >= Duration::from_millis(50), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(75), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trip_falls_back_to_cost_order() {
        let table = AssignmentTable::new(vec![
            row("t6", "e1", 4.0),
            row("t1", "e1", 1.0),
            row("t2", "e1", 2.5),
        ]);

        let plan = sequence(&table, &targets(), &FakeTrips::new()).await.unwrap();

        assert_eq!(
            ranks_of(&plan, "e1"),
            vec![("t1", 0, None), ("t2", 1, None), ("t6", 2, None)]
        );
        assert!(plan.geometry(&"e1").is_none());
    }

    #[tokio::test]
    async fn test_unknown_target_rejected() {
        let table = AssignmentTable::new(vec![row("t1", "e1", 1.0), row("t9", "e1", 2.0)]);
        let result = sequence(&table, &targets(), &FakeTrips::new()).await;
        assert!(matches!(result, Err(PlanError::Location(_))));
    }

    #[test]
    fn test_incomplete_response_rejected() {
        let response = TripResponse {
            code: "Ok".to_string(),
            message: None,
            waypoints: vec![
                TripWaypoint { waypoint_index: 0, trips_index: 0 },
                TripWaypoint { waypoint_index: 0, trips_index: 0 },
            ],
            trips: Vec::new(),
        };
        assert!(tour_from_response(response, 2).is_none());
    }
}
