//! OSRM HTTP adapter: distance tables and trips.
//!
//! [`OsrmClient`] talks to an `osrm-routed` instance and implements both
//! [`TableService`] and [`TripService`]. [`OsrmMatrix`] builds a cost matrix
//! with one table request per target.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, RoutingError};
use crate::location::LocationSet;
use crate::matrix::CostMatrix;
use crate::provider::CostValue;
use crate::traits::{CostMatrixProvider, Id, TableService, TripService};

/// Environment variable consulted when no base URL is given explicitly.
pub const OSRM_URL_ENV: &str = "OSRM_URL";

pub const DEFAULT_OSRM_URL: &str = "http://localhost:5001";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
    /// Upper bound on table requests in flight at once.
    pub max_in_flight: usize,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OSRM_URL.to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
            max_in_flight: 32,
        }
    }
}

impl OsrmConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Resolve the base URL from `explicit`, then `OSRM_URL`, then the default.
    pub fn resolve(explicit: Option<&str>) -> Self {
        let from_env = std::env::var(OSRM_URL_ENV).ok();
        Self::new(resolve_base_url(explicit, from_env.as_deref()))
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }
}

fn resolve_base_url(explicit: Option<&str>, from_env: Option<&str>) -> String {
    explicit
        .filter(|url| !url.is_empty())
        .or(from_env.filter(|url| !url.is_empty()))
        .unwrap_or(DEFAULT_OSRM_URL)
        .to_string()
}

/// OSRM Table service response.
///
/// `distances` are metres and `durations` seconds; `None` cells mean no
/// route was found.
#[derive(Debug, Clone, Deserialize)]
pub struct TableResponse {
    pub code: String,
    pub message: Option<String>,
    pub distances: Option<Vec<Vec<Option<f64>>>>,
    pub durations: Option<Vec<Vec<Option<f64>>>>,
}

impl TableResponse {
    pub fn is_ok(&self) -> bool {
        self.code == "Ok"
    }
}

/// OSRM Trip service response.
#[derive(Debug, Clone, Deserialize)]
pub struct TripResponse {
    pub code: String,
    pub message: Option<String>,
    /// One waypoint per input coordinate, in input order.
    #[serde(default)]
    pub waypoints: Vec<TripWaypoint>,
    #[serde(default)]
    pub trips: Vec<Trip>,
}

impl TripResponse {
    pub fn is_ok(&self) -> bool {
        self.code == "Ok"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripWaypoint {
    /// Position of this input coordinate within its trip.
    pub waypoint_index: usize,
    #[serde(default)]
    pub trips_index: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trip {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    /// Leg `k` goes from trip position `k` to `k + 1` (wrapping for round trips).
    #[serde(default)]
    pub legs: Vec<TripLeg>,
    /// Encoded polyline of the overview geometry.
    pub geometry: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripLeg {
    /// Metres.
    pub distance: f64,
    /// Seconds.
    pub duration: f64,
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    fn service_url(&self, service: &str, coordinates: &[(f64, f64)]) -> String {
        format!(
            "{}/{}/v1/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            service,
            self.config.profile,
            format_coordinates(coordinates)
        )
    }

    fn table_url(&self, coordinates: &[(f64, f64)], sources: &[usize]) -> String {
        let sources = sources
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}?sources={}&annotations=distance,duration",
            self.service_url("table", coordinates),
            sources
        )
    }

    fn trip_url(&self, coordinates: &[(f64, f64)]) -> String {
        format!(
            "{}?steps=false&geometries=polyline&overview=simplified&annotations=false",
            self.service_url("trip", coordinates)
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RoutingError> {
        let timeout_secs = self.config.timeout_secs;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| RoutingError::from_reqwest(&err, url, timeout_secs))?;

        response.json::<T>().await.map_err(|err| RoutingError::Parse {
            message: err.to_string(),
        })
    }
}

/// `lng,lat` pairs joined by `;`, as OSRM expects.
fn format_coordinates(coordinates: &[(f64, f64)]) -> String {
    coordinates
        .iter()
        .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
        .collect::<Vec<_>>()
        .join(";")
}

#[async_trait]
impl TableService for OsrmClient {
    async fn table(
        &self,
        coordinates: &[(f64, f64)],
        sources: &[usize],
    ) -> Result<TableResponse, RoutingError> {
        let url = self.table_url(coordinates, sources);
        let response: TableResponse = self.get_json(&url).await?;
        if !response.is_ok() {
            return Err(RoutingError::Service {
                code: response.code,
                message: response.message.unwrap_or_default(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl TripService for OsrmClient {
    async fn trip(&self, coordinates: &[(f64, f64)]) -> Result<TripResponse, RoutingError> {
        let url = self.trip_url(coordinates);
        let response: TripResponse = self.get_json(&url).await?;
        if !response.is_ok() {
            return Err(RoutingError::Service {
                code: response.code,
                message: response.message.unwrap_or_default(),
            });
        }
        Ok(response)
    }
}

/// How per-target table requests are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    /// At most `max_in_flight` requests outstanding at once.
    Concurrent { max_in_flight: usize },
}

/// Routed driving cost matrix built from OSRM table requests.
///
/// Each target gets its own request containing the target followed by all
/// enumerators, with the target as the only source.
#[derive(Debug, Clone)]
pub struct OsrmMatrix<S = OsrmClient> {
    service: S,
    value: CostValue,
    mode: ExecutionMode,
}

impl OsrmMatrix<OsrmClient> {
    pub fn new(config: OsrmConfig) -> Result<Self, ConfigError> {
        let mode = ExecutionMode::Concurrent {
            max_in_flight: config.max_in_flight,
        };
        Ok(Self::with_service(OsrmClient::new(config)?).with_mode(mode))
    }
}

impl<S: TableService> OsrmMatrix<S> {
    pub fn with_service(service: S) -> Self {
        Self {
            service,
            value: CostValue::Distance,
            mode: ExecutionMode::Sequential,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_value(mut self, value: CostValue) -> Self {
        self.value = value;
        self
    }

    /// Costs from one target to every enumerator; empty when the request fails.
    async fn row_for(
        &self,
        index: usize,
        target: (f64, f64),
        enum_coords: &[(f64, f64)],
    ) -> (usize, Vec<Option<f64>>) {
        let mut coordinates = Vec::with_capacity(enum_coords.len() + 1);
        coordinates.push(target);
        coordinates.extend_from_slice(enum_coords);

        let row = match self.service.table(&coordinates, &[0]).await {
            Ok(response) => extract_source_row(response, self.value).unwrap_or_else(|| {
                warn!(target_index = index, "OSRM table response lacks cost data; row left unknown");
                Vec::new()
            }),
            Err(err) => {
                warn!(target_index = index, error = %err, "OSRM table request failed; row left unknown");
                Vec::new()
            }
        };

        (index, row)
    }
}

/// First source row without the leading self-to-self cell, in output units.
fn extract_source_row(response: TableResponse, value: CostValue) -> Option<Vec<Option<f64>>> {
    let (table, scale) = match value {
        CostValue::Distance => (response.distances, 1000.0),
        CostValue::Duration => (response.durations, 1.0),
    };
    let row = table?.into_iter().next()?;

    Some(
        row.into_iter()
            .skip(1)
            .map(|cell| cell.map(|v| v / scale))
            .collect(),
    )
}

#[async_trait]
impl<S: TableService> CostMatrixProvider for OsrmMatrix<S> {
    async fn compute<I: Id>(
        &self,
        enumerators: &LocationSet<I>,
        targets: &LocationSet<I>,
    ) -> CostMatrix<I> {
        let enum_coords = enumerators.coordinates();
        let target_coords = targets.coordinates();
        debug!(requests = target_coords.len(), mode = ?self.mode, "requesting OSRM table rows");

        let mut rows: Vec<Vec<Option<f64>>> = vec![Vec::new(); target_coords.len()];
        match self.mode {
            ExecutionMode::Sequential => {
                for (i, target) in target_coords.iter().enumerate() {
                    let (index, row) = self.row_for(i, *target, &enum_coords).await;
                    rows[index] = row;
                }
            }
            ExecutionMode::Concurrent { max_in_flight } => {
                let requests: Vec<_> = target_coords
                    .iter()
                    .enumerate()
                    .map(|(i, target)| self.row_for(i, *target, &enum_coords))
                    .collect();
                let mut completed = stream::iter(requests).buffer_unordered(max_in_flight.max(1));
                while let Some((index, row)) = completed.next().await {
                    rows[index] = row;
                }
            }
        }

        CostMatrix::from_rows(targets.ids(), enumerators.ids(), rows)
    }
}
