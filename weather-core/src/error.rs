//! Error types shared across the core.
//!
//! Weather fetch errors are collapsed into one cloneable enum so a single
//! in-flight request can hand the same failure to every waiter. Subtypes
//! only matter for display text, never for control flow.

use thiserror::Error;

use crate::model::CityId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeatherError {
    #[error("No API key configured. Run `weather configure` first.")]
    MissingApiKey,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Weather request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode weather response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        WeatherError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("Location permission denied. Enable location access in Settings.")]
    PermissionDenied,

    #[error("Failed to get location: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse store file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize store: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine platform data directory")]
    NoDataDir,
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error("No saved city with identity '{0}'")]
    UnknownCity(CityId),

    #[error("Cannot move city from position {from} to {to}: list has {len} entries")]
    InvalidIndex { from: usize, to: usize, len: usize },

    #[error("Coordinator has stopped")]
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_mentions_code() {
        let err = WeatherError::Status { status: 503, body: "busy".into() };
        assert_eq!(err.to_string(), "Weather request failed with status 503: busy");
    }

    #[test]
    fn invalid_index_error_is_descriptive() {
        let err = CoordinatorError::InvalidIndex { from: 4, to: 0, len: 2 };
        assert!(err.to_string().contains("list has 2 entries"));
    }
}
