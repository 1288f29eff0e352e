//! Great-circle cost matrix provider.
//!
//! Straight-line distance in kilometres. Ignores roads but needs no network
//! and never fails for validated coordinates.

use async_trait::async_trait;
use rayon::prelude::*;

use crate::location::LocationSet;
use crate::matrix::CostMatrix;
use crate::traits::{CostMatrixProvider, Id};

/// Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine-based cost matrix provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineMatrix;

impl HaversineMatrix {
    pub fn new() -> Self {
        Self
    }

    /// Calculate haversine distance between two `(lat, lng)` points in kilometers.
    pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }

    /// Pairwise distances, one row per target.
    pub fn matrix_for<I: Id>(
        &self,
        enumerators: &LocationSet<I>,
        targets: &LocationSet<I>,
    ) -> CostMatrix<I> {
        let enum_coords = enumerators.coordinates();
        let rows: Vec<Vec<f64>> = targets
            .coordinates()
            .par_iter()
            .map(|target| {
                enum_coords
                    .iter()
                    .map(|enumerator| Self::haversine_km(*target, *enumerator))
                    .collect()
            })
            .collect();

        CostMatrix::from_values(targets.ids(), enumerators.ids(), rows)
    }
}

#[async_trait]
impl CostMatrixProvider for HaversineMatrix {
    async fn compute<I: Id>(
        &self,
        enumerators: &LocationSet<I>,
        targets: &LocationSet<I>,
    ) -> CostMatrix<I> {
        self.matrix_for(enumerators, targets)
    }
}
