//! Fakes for the weather and location collaborators.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use std::time::Duration;

use crate::{
    error::WeatherError,
    location::{AuthorizationStatus, LocationProvider},
    model::{
        Astronomy, Condition, Coordinates, CurrentConditions, DaySummary, ForecastDay,
        SnapshotLocation, WeatherQuery, WeatherSnapshot,
    },
    provider::WeatherProvider,
};

pub fn snapshot(name: &str, latitude: f64, longitude: f64) -> WeatherSnapshot {
    let condition = Condition { text: "Sunny".into(), code: 1000 };
    WeatherSnapshot {
        location: SnapshotLocation {
            name: name.into(),
            region: String::new(),
            country: String::new(),
            latitude,
            longitude,
            timezone: "UTC".into(),
        },
        current: CurrentConditions {
            temperature_c: 20.0,
            feels_like_c: 19.0,
            condition: condition.clone(),
            wind_kph: 10.0,
            wind_direction: "N".into(),
            pressure_mb: 1013.0,
            humidity_pct: 50,
            uv_index: 3.0,
            is_day: true,
            updated_at: Utc::now(),
        },
        forecast: vec![ForecastDay {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default(),
            day: DaySummary {
                max_temp_c: 24.0,
                min_temp_c: 14.0,
                avg_temp_c: 19.0,
                max_wind_kph: 15.0,
                total_precip_mm: 0.0,
                chance_of_rain_pct: 0,
                condition,
                uv_index: 5.0,
            },
            astro: Astronomy {
                sunrise: "05:30 AM".into(),
                sunset: "09:15 PM".into(),
                moonrise: "11:00 PM".into(),
                moonset: "08:00 AM".into(),
                moon_phase: "Waxing Gibbous".into(),
            },
            hours: Vec::new(),
        }],
        alerts: Vec::new(),
        fetched_at: Utc::now(),
    }
}

/// Weather provider that answers from a table of known places.
#[derive(Debug, Default)]
pub struct FakeWeather {
    delay: Duration,
    places: Vec<(String, Coordinates)>,
    calls: Mutex<Vec<WeatherQuery>>,
    error: Mutex<Option<WeatherError>>,
}

impl FakeWeather {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_place(mut self, name: &str, latitude: f64, longitude: f64) -> Self {
        self.places.push((name.into(), Coordinates::new(latitude, longitude)));
        self
    }

    pub fn fail_with(&self, error: Option<WeatherError>) {
        *self.error.lock() = error;
    }

    pub fn calls(&self) -> Vec<WeatherQuery> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    async fn answer(&self, query: WeatherQuery) -> Result<WeatherSnapshot, WeatherError> {
        self.calls.lock().push(query.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = self.error.lock().clone() {
            return Err(err);
        }

        let (name, coords) = match &query {
            WeatherQuery::Coordinates(c) => self
                .places
                .iter()
                .find(|(_, p)| p.is_near(c))
                .map(|(n, _)| (n.clone(), *c))
                .unwrap_or_else(|| (format!("{:.2},{:.2}", c.latitude, c.longitude), *c)),
            WeatherQuery::Name(name) => self
                .places
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(n, p)| (n.clone(), *p))
                .unwrap_or_else(|| (name.clone(), Coordinates::new(0.0, 0.0))),
        };
        Ok(snapshot(&name, coords.latitude, coords.longitude))
    }
}

#[async_trait]
impl WeatherProvider for FakeWeather {
    async fn fetch_by_coordinates(
        &self,
        coordinates: Coordinates,
    ) -> Result<WeatherSnapshot, WeatherError> {
        self.answer(WeatherQuery::Coordinates(coordinates)).await
    }

    async fn fetch_by_name(&self, name: &str) -> Result<WeatherSnapshot, WeatherError> {
        self.answer(WeatherQuery::Name(name.to_string())).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationCommand {
    RequestAuthorization,
    StartUpdating,
    StopUpdating,
}

/// Location provider that records the commands it receives.
#[derive(Debug)]
pub struct FakeLocation {
    status: Mutex<AuthorizationStatus>,
    commands: Mutex<Vec<LocationCommand>>,
}

impl FakeLocation {
    pub fn new(status: AuthorizationStatus) -> Self {
        Self {
            status: Mutex::new(status),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status(&self, status: AuthorizationStatus) {
        *self.status.lock() = status;
    }

    pub fn commands(&self) -> Vec<LocationCommand> {
        self.commands.lock().clone()
    }
}

impl LocationProvider for FakeLocation {
    fn authorization_status(&self) -> AuthorizationStatus {
        *self.status.lock()
    }

    fn request_authorization(&self) {
        self.commands.lock().push(LocationCommand::RequestAuthorization);
    }

    fn start_updating(&self) {
        self.commands.lock().push(LocationCommand::StartUpdating);
    }

    fn stop_updating(&self) {
        self.commands.lock().push(LocationCommand::StopUpdating);
    }
}
