//! Core traits for the survey planner.
//!
//! Providers and external services are consumed through these traits so
//! callers (and tests) can plug in their own implementations.

use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;

use crate::error::RoutingError;
use crate::google::DistanceMatrixResponse;
use crate::location::LocationSet;
use crate::matrix::CostMatrix;
use crate::osrm::{TableResponse, TripResponse};

/// Unique identifier for enumerators and targets.
///
/// Identifiers are carried through every stage untouched, so any owned key
/// type works (`u64`, `String`, a newtype...).
pub trait Id: Clone + Eq + Ord + Hash + Debug + Send + Sync {}

impl<T> Id for T where T: Clone + Eq + Ord + Hash + Debug + Send + Sync {}

/// Computes a target x enumerator cost matrix.
///
/// Rows follow the order of `targets`, columns the order of `enumerators`.
/// Failures for individual cells are reported as unknown cells, never as an
/// error for the whole matrix.
#[async_trait]
pub trait CostMatrixProvider: Send + Sync {
    async fn compute<I: Id>(
        &self,
        enumerators: &LocationSet<I>,
        targets: &LocationSet<I>,
    ) -> CostMatrix<I>;
}

/// Distance-table capability of a routing engine.
///
/// `coordinates` are `(lat, lng)` pairs; `sources` are indices into
/// `coordinates` used as table rows.
#[async_trait]
pub trait TableService: Send + Sync {
    async fn table(
        &self,
        coordinates: &[(f64, f64)],
        sources: &[usize],
    ) -> Result<TableResponse, RoutingError>;
}

/// Tour-construction capability of a routing engine.
#[async_trait]
pub trait TripService: Send + Sync {
    /// Request a round trip over `coordinates` (`(lat, lng)` pairs).
    async fn trip(&self, coordinates: &[(f64, f64)]) -> Result<TripResponse, RoutingError>;
}

/// Commercial origin/destination distance-matrix capability.
#[async_trait]
pub trait DistanceMatrixService: Send + Sync {
    async fn distance_matrix(
        &self,
        origins: &[(f64, f64)],
        destinations: &[(f64, f64)],
    ) -> Result<DistanceMatrixResponse, RoutingError>;
}
