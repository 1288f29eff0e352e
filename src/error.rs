//! Error types for the survey planner.

use thiserror::Error;

/// Invalid location data. Raised before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("duplicate location id {0}")]
    DuplicateId(String),
    #[error("latitude {lat} of location {id} is outside [-90, 90]")]
    LatitudeOutOfRange { id: String, lat: f64 },
    #[error("longitude {lng} of location {id} is outside [-180, 180]")]
    LongitudeOutOfRange { id: String, lng: f64 },
    #[error("location id {0} is not in the set")]
    UnknownId(String),
}

/// Failure of a single call to an external routing or distance service.
///
/// Providers absorb these: the affected cells become unknown and a warning
/// is logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },
    #[error("request to {url} failed with HTTP {status}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
    },
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("failed to parse service response: {message}")]
    Parse { message: String },
    #[error("service returned {code}: {message}")]
    Service { code: String, message: String },
    #[error("request URL is {length} bytes, above the {limit} byte limit")]
    RequestTooLarge { length: usize, limit: usize },
}

impl RoutingError {
    pub(crate) fn from_reqwest(error: &reqwest::Error, url: &str, timeout_secs: u64) -> Self {
        if error.is_timeout() {
            return Self::Timeout {
                url: url.to_owned(),
                timeout_secs,
            };
        }
        if let Some(status) = error.status() {
            return Self::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }
        if error.is_decode() {
            return Self::Parse {
                message: error.to_string(),
            };
        }
        Self::Network {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

/// Rejected configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "unsupported cost function {0:?}; choose from 'haversine', 'osrm', 'google_distance' or 'google_duration'"
    )]
    UnsupportedCostFunction(String),
    #[error("no API key configured for the distance matrix service")]
    MissingApiKey,
    #[error("parameter increment must be within (0, 100) percent, got {0}")]
    InvalidIncrement(f64),
    #[error("invalid request limits: {0}")]
    InvalidLimits(String),
    #[error("min_target {min_target} exceeds max_target {max_target}")]
    InvalidWorkload { min_target: u32, max_target: u32 },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors surfaced by the planning flows.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(
        "minimum possible max_cost is {floor}; got {max_cost}, please provide a value greater than or equal to the minimum"
    )]
    MaxCostBelowFloor { max_cost: f64, floor: f64 },
    #[error("target {0} has no known cost to any enumerator")]
    UnreachableTarget(String),
    #[error("no assignment satisfies the constraints")]
    Infeasible,
    #[error("target {target_id} is assigned to enumerator {enum_id} but their cost is unknown")]
    UnknownCost { target_id: String, enum_id: String },
    #[error("assignment matrix is {rows}x{cols} but locations need {targets}x{enumerators}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        targets: usize,
        enumerators: usize,
    },
}
