//! Location sets for enumerators and targets.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::LocationError;
use crate::traits::Id;

/// A single identified point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location<I> {
    pub id: I,
    pub lat: f64,
    pub lng: f64,
}

impl<I> Location<I> {
    pub fn new(id: I, lat: f64, lng: f64) -> Self {
        Self { id, lat, lng }
    }

    /// Coordinates as `(lat, lng)`.
    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

/// An ordered, validated collection of locations of one role.
///
/// Ids are unique and coordinates are within range. The set is never
/// mutated; [`LocationSet::subset`] produces a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSet<I> {
    locations: Vec<Location<I>>,
}

impl<I: Id> LocationSet<I> {
    /// Validates and constructs a [`LocationSet`].
    pub fn new(locations: Vec<Location<I>>) -> Result<Self, LocationError> {
        let mut seen = HashSet::with_capacity(locations.len());
        for location in &locations {
            if !seen.insert(&location.id) {
                return Err(LocationError::DuplicateId(format!("{:?}", location.id)));
            }
            if !(-90.0..=90.0).contains(&location.lat) {
                return Err(LocationError::LatitudeOutOfRange {
                    id: format!("{:?}", location.id),
                    lat: location.lat,
                });
            }
            if !(-180.0..=180.0).contains(&location.lng) {
                return Err(LocationError::LongitudeOutOfRange {
                    id: format!("{:?}", location.id),
                    lng: location.lng,
                });
            }
        }

        Ok(Self { locations })
    }

    /// Number of locations.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether the set has no locations.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Locations in input order.
    pub fn locations(&self) -> &[Location<I>] {
        &self.locations
    }

    /// Ids in input order.
    pub fn ids(&self) -> Vec<I> {
        self.locations.iter().map(|location| location.id.clone()).collect()
    }

    /// Coordinates as `(lat, lng)`, in the same order as [`LocationSet::ids`].
    pub fn coordinates(&self) -> Vec<(f64, f64)> {
        self.locations.iter().map(Location::coords).collect()
    }

    /// Project the set onto `ids`, in the order given.
    pub fn subset(&self, ids: &[I]) -> Result<Self, LocationError> {
        let by_id: HashMap<&I, &Location<I>> = self
            .locations
            .iter()
            .map(|location| (&location.id, location))
            .collect();

        let locations = ids
            .iter()
            .map(|id| {
                by_id
                    .get(id)
                    .map(|location| (*location).clone())
                    .ok_or_else(|| LocationError::UnknownId(format!("{id:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(locations)
    }
}
