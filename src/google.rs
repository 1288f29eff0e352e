//! Google Distance Matrix adapter.
//!
//! The service caps every request (destinations, origin x destination
//! elements, URL length) and the element rate, so the full
//! enumerator x target grid is tiled into blocks, each block is requested
//! on its own and the answers are reassembled by `(origin, destination)`
//! index.

use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ConfigError, RoutingError};
use crate::location::LocationSet;
use crate::matrix::CostMatrix;
use crate::provider::CostValue;
use crate::traits::{CostMatrixProvider, DistanceMatrixService, Id};

pub const API_KEY_ENV: &str = "GOOGLE_MAPS_PLATFORM_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

/// Longest request URL the service accepts.
pub const MAX_URL_LENGTH: usize = 8192;

/// Per-request and per-second quotas of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLimits {
    pub max_destinations: usize,
    pub max_elements: usize,
    /// `None` disables pacing.
    pub max_elements_per_second: Option<u32>,
}

impl Default for RequestLimits {
    fn default() -> Self {
        // Targets outnumber enumerators, so destinations get the wide side:
        // 25 destinations x 4 origins = 100 elements.
        Self {
            max_destinations: 25,
            max_elements: 100,
            max_elements_per_second: Some(1000),
        }
    }
}

impl RequestLimits {
    pub fn max_origins(&self) -> usize {
        self.max_elements / self.max_destinations.max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_destinations == 0 {
            return Err(ConfigError::InvalidLimits(
                "max_destinations must be positive".to_string(),
            ));
        }
        if self.max_origins() == 0 {
            return Err(ConfigError::InvalidLimits(format!(
                "max_elements {} is below max_destinations {}",
                self.max_elements, self.max_destinations
            )));
        }
        if self.max_elements_per_second == Some(0) {
            return Err(ConfigError::InvalidLimits(
                "max_elements_per_second must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Region bias passed with every request.
    pub region: Option<String>,
    pub timeout_secs: u64,
    pub limits: RequestLimits,
    pub max_in_flight: usize,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            region: Some("in".to_string()),
            timeout_secs: 30,
            limits: RequestLimits::default(),
            max_in_flight: 8,
        }
    }
}

impl GoogleConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Default configuration with the API key taken from the environment.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty()),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn with_limits(mut self, limits: RequestLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistanceMatrixResponse {
    pub status: String,
    pub error_message: Option<String>,
    /// One row per origin, in request order.
    #[serde(default)]
    pub rows: Vec<ResponseRow>,
}

impl DistanceMatrixResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseRow {
    /// One element per destination, in request order.
    pub elements: Vec<ResponseElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseElement {
    pub status: String,
    pub distance: Option<TextValue>,
    pub duration: Option<TextValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextValue {
    pub text: String,
    /// Metres for distances, seconds for durations.
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct GoogleClient {
    config: GoogleConfig,
    api_key: String,
    client: reqwest::Client,
}

impl GoogleClient {
    pub fn new(config: GoogleConfig) -> Result<Self, ConfigError> {
        let api_key = config.api_key.clone().ok_or(ConfigError::MissingApiKey)?;
        config.limits.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    fn request_url(
        &self,
        origins: &[(f64, f64)],
        destinations: &[(f64, f64)],
    ) -> Result<reqwest::Url, RoutingError> {
        let mut params = vec![
            ("key", self.api_key.clone()),
            ("origins", format_coordinates(origins)),
            ("destinations", format_coordinates(destinations)),
        ];
        if let Some(region) = &self.config.region {
            params.push(("region", region.clone()));
        }

        let url = reqwest::Url::parse_with_params(&self.config.base_url, &params).map_err(|err| {
            RoutingError::Parse {
                message: format!("invalid base URL {}: {err}", self.config.base_url),
            }
        })?;
        let length = url.as_str().len();
        if length > MAX_URL_LENGTH {
            return Err(RoutingError::RequestTooLarge {
                length,
                limit: MAX_URL_LENGTH,
            });
        }
        Ok(url)
    }
}

/// `lat,lng` pairs joined by `|`.
fn format_coordinates(coordinates: &[(f64, f64)]) -> String {
    coordinates
        .iter()
        .map(|(lat, lng)| format!("{},{}", lat, lng))
        .collect::<Vec<_>>()
        .join("|")
}

#[async_trait]
impl DistanceMatrixService for GoogleClient {
    async fn distance_matrix(
        &self,
        origins: &[(f64, f64)],
        destinations: &[(f64, f64)],
    ) -> Result<DistanceMatrixResponse, RoutingError> {
        let url = self.request_url(origins, destinations)?;
        // Keep the API key out of error messages.
        let display_url = self.config.base_url.clone();
        let timeout_secs = self.config.timeout_secs;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| RoutingError::from_reqwest(&err.without_url(), &display_url, timeout_secs))?;

        response
            .json::<DistanceMatrixResponse>()
            .await
            .map_err(|err| RoutingError::Parse {
                message: err.without_url().to_string(),
            })
    }
}

/// One request-sized tile of the origin x destination grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBlock {
    pub origins: Range<usize>,
    pub destinations: Range<usize>,
}

impl RequestBlock {
    pub fn elements(&self) -> usize {
        self.origins.len() * self.destinations.len()
    }
}

/// Tile `n_origins x n_destinations` into blocks within `limits`.
///
/// Blocks are ordered origin-major: every destination block of the first
/// origin block, then the next origin block.
pub fn request_blocks(
    n_origins: usize,
    n_destinations: usize,
    limits: &RequestLimits,
) -> Vec<RequestBlock> {
    let origin_step = limits.max_origins().max(1);
    let destination_step = limits.max_destinations.max(1);

    let mut blocks = Vec::new();
    for origin_start in (0..n_origins).step_by(origin_step) {
        let origins = origin_start..(origin_start + origin_step).min(n_origins);
        for destination_start in (0..n_destinations).step_by(destination_step) {
            let destinations =
                destination_start..(destination_start + destination_step).min(n_destinations);
            blocks.push(RequestBlock {
                origins: origins.clone(),
                destinations,
            });
        }
    }
    blocks
}

/// Costs keyed by global `(origin, destination)` index.
type KeyedCells = Vec<((usize, usize), Option<f64>)>;

/// Turn one block's response into keyed cells.
///
/// A failed request, a non-OK status or a response of the wrong shape marks
/// every cell of the block unknown. Non-OK elements, and OK elements missing
/// the requested value, mark their own cell unknown.
fn parse_block(
    block: &RequestBlock,
    response: Result<DistanceMatrixResponse, RoutingError>,
    value: CostValue,
) -> KeyedCells {
    let unknown_block = || -> KeyedCells {
        block
            .origins
            .clone()
            .flat_map(|o| block.destinations.clone().map(move |d| ((o, d), None)))
            .collect()
    };

    let response = match response {
        Ok(response) => response,
        Err(err) => {
            warn!(origins = ?block.origins, destinations = ?block.destinations, error = %err,
                "distance matrix request failed; block left unknown");
            return unknown_block();
        }
    };
    if !response.is_ok() {
        warn!(origins = ?block.origins, destinations = ?block.destinations, status = %response.status,
            message = response.error_message.as_deref().unwrap_or_default(),
            "distance matrix response status not OK; block left unknown");
        return unknown_block();
    }
    let well_formed = response.rows.len() == block.origins.len()
        && response
            .rows
            .iter()
            .all(|row| row.elements.len() == block.destinations.len());
    if !well_formed {
        warn!(origins = ?block.origins, destinations = ?block.destinations,
            "distance matrix response shape does not match request; block left unknown");
        return unknown_block();
    }

    let mut cells = Vec::with_capacity(block.elements());
    for (origin, row) in block.origins.clone().zip(response.rows) {
        for (destination, element) in block.destinations.clone().zip(row.elements) {
            let cost = element_cost(&element, value);
            if element.status != "OK" {
                warn!(origin, destination, status = %element.status, "element status not OK; cell left unknown");
            } else if cost.is_none() {
                warn!(origin, destination, ?value, "element has no value for the requested cost; cell left unknown");
            }
            cells.push(((origin, destination), cost));
        }
    }
    cells
}

fn element_cost(element: &ResponseElement, value: CostValue) -> Option<f64> {
    if element.status != "OK" {
        return None;
    }
    match value {
        CostValue::Distance => element.distance.as_ref().map(|d| d.value / 1000.0),
        CostValue::Duration => element.duration.as_ref().map(|d| d.value),
    }
}

/// Cost matrix from the commercial distance-matrix service.
///
/// Enumerators are sent as origins and targets as destinations.
#[derive(Debug, Clone)]
pub struct GoogleDistanceMatrix<S = GoogleClient> {
    service: S,
    value: CostValue,
    limits: RequestLimits,
    max_in_flight: usize,
}

impl GoogleDistanceMatrix<GoogleClient> {
    pub fn new(config: GoogleConfig, value: CostValue) -> Result<Self, ConfigError> {
        let limits = config.limits;
        let max_in_flight = config.max_in_flight;
        Ok(Self {
            service: GoogleClient::new(config)?,
            value,
            limits,
            max_in_flight,
        })
    }
}

impl<S: DistanceMatrixService> GoogleDistanceMatrix<S> {
    pub fn with_service(service: S, value: CostValue) -> Self {
        Self {
            service,
            value,
            limits: RequestLimits::default(),
            max_in_flight: 1,
        }
    }

    pub fn with_limits(mut self, limits: RequestLimits) -> Result<Self, ConfigError> {
        limits.validate()?;
        self.limits = limits;
        Ok(self)
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Request one block, no earlier than `not_before`.
    async fn fetch_block(
        &self,
        block: RequestBlock,
        not_before: Instant,
        enum_coords: &[(f64, f64)],
        target_coords: &[(f64, f64)],
    ) -> KeyedCells {
        tokio::time::sleep_until(not_before).await;
        let response = self
            .service
            .distance_matrix(
                &enum_coords[block.origins.clone()],
                &target_coords[block.destinations.clone()],
            )
            .await;
        parse_block(&block, response, self.value)
    }

    /// Start offset of each block so that cumulative elements stay within
    /// the per-second quota.
    fn pacing(&self, blocks: &[RequestBlock]) -> Vec<Duration> {
        let mut issued = 0usize;
        blocks
            .iter()
            .map(|block| {
                let offset = match self.limits.max_elements_per_second {
                    Some(rate) => Duration::from_secs_f64(issued as f64 / f64::from(rate)),
                    None => Duration::ZERO,
                };
                issued += block.elements();
                offset
            })
            .collect()
    }
}

#[async_trait]
impl<S: DistanceMatrixService> CostMatrixProvider for GoogleDistanceMatrix<S> {
    async fn compute<I: Id>(
        &self,
        enumerators: &LocationSet<I>,
        targets: &LocationSet<I>,
    ) -> CostMatrix<I> {
        let enum_coords = enumerators.coordinates();
        let target_coords = targets.coordinates();
        let blocks = request_blocks(enum_coords.len(), target_coords.len(), &self.limits);
        let offsets = self.pacing(&blocks);
        debug!(
            origins = enum_coords.len(),
            destinations = target_coords.len(),
            requests = blocks.len(),
            "requesting distance matrix blocks"
        );

        let start = Instant::now();
        let requests: Vec<_> = blocks
            .into_iter()
            .zip(offsets)
            .map(|(block, offset)| self.fetch_block(block, start + offset, &enum_coords, &target_coords))
            .collect();
        let mut completed = stream::iter(requests).buffer_unordered(self.max_in_flight.max(1));

        // rows are targets (destinations), columns enumerators (origins)
        let mut rows = vec![vec![None; enum_coords.len()]; target_coords.len()];
        while let Some(cells) = completed.next().await {
            for ((origin, destination), cost) in cells {
                rows[destination][origin] = cost;
            }
        }

        CostMatrix::from_rows(targets.ids(), enumerators.ids(), rows)
    }
}
