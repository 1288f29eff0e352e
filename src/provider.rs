//! Cost function selection.
//!
//! The set of providers is closed: a [`CostFunction`] names one, and
//! [`Provider::from_cost_function`] builds it from explicit configuration.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::google::{GoogleConfig, GoogleDistanceMatrix};
use crate::haversine::HaversineMatrix;
use crate::location::LocationSet;
use crate::matrix::CostMatrix;
use crate::osrm::{OsrmConfig, OsrmMatrix};
use crate::traits::{CostMatrixProvider, Id};

/// Which annotation of a routed service becomes the cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostValue {
    /// Kilometres.
    #[default]
    Distance,
    /// Seconds.
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostFunction {
    Haversine,
    Osrm,
    GoogleDistance,
    GoogleDuration,
}

impl CostFunction {
    pub const ALL: [CostFunction; 4] = [
        CostFunction::Haversine,
        CostFunction::Osrm,
        CostFunction::GoogleDistance,
        CostFunction::GoogleDuration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CostFunction::Haversine => "haversine",
            CostFunction::Osrm => "osrm",
            CostFunction::GoogleDistance => "google_distance",
            CostFunction::GoogleDuration => "google_duration",
        }
    }
}

impl fmt::Display for CostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CostFunction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|function| function.name() == s)
            .ok_or_else(|| ConfigError::UnsupportedCostFunction(s.to_string()))
    }
}

/// Settings for every provider; only the selected one is read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub osrm: OsrmConfig,
    pub google: GoogleConfig,
}

/// A configured cost matrix provider.
#[derive(Debug, Clone)]
pub enum Provider {
    Haversine(HaversineMatrix),
    Osrm(OsrmMatrix),
    Google(GoogleDistanceMatrix),
}

impl Provider {
    pub fn from_cost_function(
        function: CostFunction,
        settings: &ProviderSettings,
    ) -> Result<Self, ConfigError> {
        let provider = match function {
            CostFunction::Haversine => Provider::Haversine(HaversineMatrix::new()),
            CostFunction::Osrm => Provider::Osrm(OsrmMatrix::new(settings.osrm.clone())?),
            CostFunction::GoogleDistance => Provider::Google(GoogleDistanceMatrix::new(
                settings.google.clone(),
                CostValue::Distance,
            )?),
            CostFunction::GoogleDuration => Provider::Google(GoogleDistanceMatrix::new(
                settings.google.clone(),
                CostValue::Duration,
            )?),
        };
        Ok(provider)
    }

    /// Parse `name` and build the provider it names.
    pub fn from_name(name: &str, settings: &ProviderSettings) -> Result<Self, ConfigError> {
        Self::from_cost_function(name.parse()?, settings)
    }
}

#[async_trait]
impl CostMatrixProvider for Provider {
    async fn compute<I: Id>(
        &self,
        enumerators: &LocationSet<I>,
        targets: &LocationSet<I>,
    ) -> CostMatrix<I> {
        match self {
            Provider::Haversine(provider) => provider.compute(enumerators, targets).await,
            Provider::Osrm(provider) => provider.compute(enumerators, targets).await,
            Provider::Google(provider) => provider.compute(enumerators, targets).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Location;
    use rstest::rstest;

    #[rstest]
    #[case("haversine", CostFunction::Haversine)]
    #[case("osrm", CostFunction::Osrm)]
    #[case("google_distance", CostFunction::GoogleDistance)]
    #[case("google_duration", CostFunction::GoogleDuration)]
    fn test_cost_function_names(#[case] name: &str, #[case] expected: CostFunction) {
        let parsed: CostFunction = name.parse().unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), name);
    }

    #[rstest]
    #[case("")]
    #[case("euclidean")]
    #[case("Haversine")]
    #[case("google")]
    fn test_unsupported_cost_function(#[case] name: &str) {
        let err = name.parse::<CostFunction>().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedCostFunction(ref n) if n == name));
    }

    #[test]
    fn test_cost_function_serde_matches_names() {
        let json = serde_json::to_string(&CostFunction::GoogleDuration).unwrap();
        assert_eq!(json, "\"google_duration\"");
        let parsed: CostFunction = serde_json::from_str("\"osrm\"").unwrap();
        assert_eq!(parsed, CostFunction::Osrm);
    }

    #[test]
    fn test_google_provider_needs_api_key() {
        let result = Provider::from_name("google_distance", &ProviderSettings::default());
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_unknown_name_rejected_before_building() {
        let result = Provider::from_name("manhattan", &ProviderSettings::default());
        assert!(matches!(result, Err(ConfigError::UnsupportedCostFunction(_))));
    }

    #[tokio::test]
    async fn test_haversine_provider_dispatch() {
        let provider = Provider::from_name("haversine", &ProviderSettings::default()).unwrap();
        let enumerators = LocationSet::new(vec![Location::new("e1", 0.0, 0.0)]).unwrap();
        let targets = LocationSet::new(vec![
            Location::new("t1", 0.0, 0.0),
            Location::new("t2", 0.0, 1.0),
        ])
        .unwrap();

        let matrix = provider.compute(&enumerators, &targets).await;

        assert_eq!(matrix.shape(), (2, 1));
        assert!(matrix.get(0, 0).unwrap() < 0.001);
        assert!(matrix.get(1, 0).unwrap() > 100.0);
    }
}
