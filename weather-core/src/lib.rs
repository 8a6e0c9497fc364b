//! Core library for the `weather` client.
//!
//! This crate defines:
//! - City identity, equivalence and reconciliation with the device location
//! - A per-city weather cache that shares in-flight fetches
//! - The coordinator that turns location and fetch events into a content state
//! - Configuration, persistence and the WeatherAPI.com provider
//!
//! It is used by `weather-cli`, but any front end can drive the
//! [`CoordinatorHandle`] and render the [`CoordinatorView`] it publishes.

pub mod cache;
pub mod city;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod location;
pub mod model;
pub mod provider;
pub mod state;
pub mod store;
pub mod units;

#[cfg(test)]
mod testing;

pub use cache::WeatherCache;
pub use config::Config;
pub use coordinator::{
    Coordinator, CoordinatorHandle, CoordinatorTiming, CoordinatorView, Dependencies,
};
pub use error::{CoordinatorError, LocationError, StoreError, WeatherError};
pub use location::{AuthorizationStatus, LocationEvent, LocationProvider};
pub use model::{City, CityId, Coordinates, WeatherQuery, WeatherSnapshot};
pub use provider::{RetryPolicy, WeatherProvider, provider_from_config};
pub use state::ContentState;
pub use store::{FileStore, MemoryStore, PreferenceStore, Preferences, SavedCities};
pub use units::{PressureUnit, TemperatureUnit, ThemeMode, WindSpeedUnit};
