use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::WeatherError,
    model::{
        Astronomy, Condition, Coordinates, CurrentConditions, DaySummary, ForecastDay,
        HourlyForecast, SnapshotLocation, WeatherAlert, WeatherSnapshot,
    },
};

use super::{RetryPolicy, WeatherProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    days: u8,
    retry: RetryPolicy,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String, base_url: String, days: u8, retry: RetryPolicy) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            days: days.max(1),
            retry,
            http: Client::new(),
        }
    }

    async fn fetch_forecast(&self, query: &str) -> Result<WeatherSnapshot, WeatherError> {
        if self.api_key.is_empty() {
            return Err(WeatherError::MissingApiKey);
        }
        tracing::info!("Fetching forecast for '{query}'");
        self.retry.run(move || self.request_forecast(query)).await
    }

    async fn request_forecast(&self, query: &str) -> Result<WeatherSnapshot, WeatherError> {
        let url = format!("{}/forecast.json", self.base_url);
        let days = self.days.to_string();

        let res = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", query),
                ("days", days.as_str()),
                ("alerts", "yes"),
                ("aqi", "no"),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(WeatherError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: WaForecastResponse =
            serde_json::from_str(&body).map_err(|e| WeatherError::Decode(e.to_string()))?;

        Ok(parsed.into_snapshot(Utc::now()))
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    async fn fetch_by_coordinates(
        &self,
        coordinates: Coordinates,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let q = format!("{},{}", coordinates.latitude, coordinates.longitude);
        self.fetch_forecast(&q).await
    }

    async fn fetch_by_name(&self, name: &str) -> Result<WeatherSnapshot, WeatherError> {
        self.fetch_forecast(name).await
    }
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    tz_id: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    #[serde(default)]
    code: u32,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    last_updated_epoch: Option<i64>,
    temp_c: f64,
    feelslike_c: f64,
    #[serde(default)]
    is_day: u8,
    condition: WaCondition,
    wind_kph: f64,
    #[serde(default)]
    wind_dir: String,
    pressure_mb: f64,
    humidity: u8,
    #[serde(default)]
    uv: f64,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: f64,
    mintemp_c: f64,
    avgtemp_c: f64,
    maxwind_kph: f64,
    totalprecip_mm: f64,
    #[serde(default)]
    daily_chance_of_rain: u8,
    condition: WaCondition,
    #[serde(default)]
    uv: f64,
}

#[derive(Debug, Deserialize)]
struct WaAstro {
    sunrise: String,
    sunset: String,
    #[serde(default)]
    moonrise: String,
    #[serde(default)]
    moonset: String,
    #[serde(default)]
    moon_phase: String,
}

#[derive(Debug, Deserialize)]
struct WaHour {
    time_epoch: i64,
    temp_c: f64,
    condition: WaCondition,
    #[serde(default)]
    chance_of_rain: u8,
    wind_kph: f64,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: NaiveDate,
    day: WaDay,
    astro: WaAstro,
    #[serde(default)]
    hour: Vec<WaHour>,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaAlert {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    event: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    areas: String,
    #[serde(default)]
    desc: String,
    effective: Option<String>,
    expires: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WaAlerts {
    #[serde(default)]
    alert: Vec<WaAlert>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    location: WaLocation,
    current: WaCurrent,
    forecast: WaForecast,
    #[serde(default)]
    alerts: WaAlerts,
}

impl From<WaCondition> for Condition {
    fn from(c: WaCondition) -> Self {
        Condition { text: c.text, code: c.code }
    }
}

impl WaForecastResponse {
    fn into_snapshot(self, fetched_at: DateTime<Utc>) -> WeatherSnapshot {
        let current = self.current;
        let updated_at = current
            .last_updated_epoch
            .and_then(unix_to_utc)
            .unwrap_or(fetched_at);

        WeatherSnapshot {
            location: SnapshotLocation {
                name: self.location.name,
                region: self.location.region,
                country: self.location.country,
                latitude: self.location.lat,
                longitude: self.location.lon,
                timezone: self.location.tz_id,
            },
            current: CurrentConditions {
                temperature_c: current.temp_c,
                feels_like_c: current.feelslike_c,
                condition: current.condition.into(),
                wind_kph: current.wind_kph,
                wind_direction: current.wind_dir,
                pressure_mb: current.pressure_mb,
                humidity_pct: current.humidity,
                uv_index: current.uv,
                is_day: current.is_day == 1,
                updated_at,
            },
            forecast: self
                .forecast
                .forecastday
                .into_iter()
                .map(|d| ForecastDay {
                    date: d.date,
                    day: DaySummary {
                        max_temp_c: d.day.maxtemp_c,
                        min_temp_c: d.day.mintemp_c,
                        avg_temp_c: d.day.avgtemp_c,
                        max_wind_kph: d.day.maxwind_kph,
                        total_precip_mm: d.day.totalprecip_mm,
                        chance_of_rain_pct: d.day.daily_chance_of_rain,
                        condition: d.day.condition.into(),
                        uv_index: d.day.uv,
                    },
                    astro: Astronomy {
                        sunrise: d.astro.sunrise,
                        sunset: d.astro.sunset,
                        moonrise: d.astro.moonrise,
                        moonset: d.astro.moonset,
                        moon_phase: d.astro.moon_phase,
                    },
                    hours: d
                        .hour
                        .into_iter()
                        .filter_map(|h| {
                            Some(HourlyForecast {
                                time: unix_to_utc(h.time_epoch)?,
                                temperature_c: h.temp_c,
                                condition: h.condition.into(),
                                chance_of_rain_pct: h.chance_of_rain,
                                wind_kph: h.wind_kph,
                            })
                        })
                        .collect(),
                })
                .collect(),
            alerts: self
                .alerts
                .alert
                .into_iter()
                .map(|a| WeatherAlert {
                    headline: a.headline,
                    event: a.event,
                    severity: a.severity,
                    areas: a.areas,
                    description: a.desc,
                    effective: a.effective.as_deref().and_then(parse_timestamp),
                    expires: a.expires.as_deref().and_then(parse_timestamp),
                })
                .collect(),
            fetched_at,
        }
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    const FORECAST_JSON: &str = r#"{
        "location": {
            "name": "Zurich", "region": "Zurich", "country": "Switzerland",
            "lat": 47.37, "lon": 8.55, "tz_id": "Europe/Zurich"
        },
        "current": {
            "last_updated_epoch": 1700000000,
            "temp_c": 6.0, "feelslike_c": 3.2, "is_day": 1,
            "condition": { "text": "Partly cloudy", "code": 1003 },
            "wind_kph": 14.4, "wind_dir": "SW", "pressure_mb": 1012.0,
            "humidity": 81, "uv": 1.0
        },
        "forecast": {
            "forecastday": [{
                "date": "2023-11-14",
                "day": {
                    "maxtemp_c": 8.1, "mintemp_c": 2.4, "avgtemp_c": 5.0,
                    "maxwind_kph": 20.2, "totalprecip_mm": 1.3,
                    "daily_chance_of_rain": 64,
                    "condition": { "text": "Light rain", "code": 1183 },
                    "uv": 1.0
                },
                "astro": {
                    "sunrise": "07:32 AM", "sunset": "04:58 PM",
                    "moonrise": "08:01 AM", "moonset": "05:12 PM",
                    "moon_phase": "New Moon"
                },
                "hour": [{
                    "time_epoch": 1699916400, "temp_c": 3.0,
                    "condition": { "text": "Clear", "code": 1000 },
                    "chance_of_rain": 0, "wind_kph": 7.2
                }]
            }]
        },
        "alerts": {
            "alert": [{
                "headline": "Wind warning", "event": "Wind", "severity": "Moderate",
                "areas": "Zurich", "desc": "Gusts up to 80 km/h",
                "effective": "2023-11-14T10:00:00+01:00",
                "expires": "2023-11-14T22:00:00+01:00"
            }]
        }
    }"#;

    fn provider(server: &MockServer, attempts: u32) -> WeatherApiProvider {
        WeatherApiProvider::new(
            "KEY".into(),
            server.uri(),
            3,
            RetryPolicy::new(attempts, Duration::ZERO),
        )
    }

    #[test]
    fn maps_wire_response_into_snapshot() {
        let parsed: WaForecastResponse = serde_json::from_str(FORECAST_JSON).expect("valid json");
        let snapshot = parsed.into_snapshot(Utc::now());

        assert_eq!(snapshot.location.name, "Zurich");
        assert_eq!(snapshot.current.condition.code, 1003);
        assert!(snapshot.current.is_day);
        assert_eq!(snapshot.forecast.len(), 1);
        assert_eq!(snapshot.forecast[0].day.chance_of_rain_pct, 64);
        assert_eq!(snapshot.forecast[0].astro.moon_phase, "New Moon");
        assert_eq!(snapshot.forecast[0].hours.len(), 1);
        assert_eq!(snapshot.alerts.len(), 1);
        assert!(snapshot.alerts[0].effective.is_some());
    }

    #[test]
    fn missing_alerts_block_is_empty() {
        let mut value: serde_json::Value = serde_json::from_str(FORECAST_JSON).expect("valid json");
        if let Some(obj) = value.as_object_mut() {
            obj.remove("alerts");
        }
        let parsed: WaForecastResponse = serde_json::from_value(value).expect("valid json");
        assert!(parsed.into_snapshot(Utc::now()).alerts.is_empty());
    }

    #[test]
    fn truncates_long_bodies() {
        let long = "x".repeat(500);
        let t = truncate_body(&long);
        assert_eq!(t.len(), 203);
        assert_eq!(truncate_body("short"), "short");
    }

    #[tokio::test]
    async fn fetches_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .and(query_param("q", "Zurich"))
            .and(query_param("alerts", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FORECAST_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = provider(&server, 3).fetch_by_name("Zurich").await.expect("fetch ok");
        assert_eq!(snapshot.location.country, "Switzerland");
    }

    #[tokio::test]
    async fn fetches_by_coordinates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .and(query_param("q", "47.37,8.55"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FORECAST_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = provider(&server, 3)
            .fetch_by_coordinates(Coordinates::new(47.37, 8.55))
            .await
            .expect("fetch ok");
        assert_eq!(snapshot.location.name, "Zurich");
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FORECAST_JSON))
            .mount(&server)
            .await;

        let result = provider(&server, 3).fetch_by_name("Zurich").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(ResponseTemplate::new(400).set_body_string("No matching location found."))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider(&server, 3).fetch_by_name("Nowhere").await.unwrap_err();
        assert_eq!(
            err,
            WeatherError::Status { status: 400, body: "No matching location found.".into() }
        );
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let err = provider(&server, 3).fetch_by_name("Zurich").await.unwrap_err();
        assert!(matches!(err, WeatherError::Decode(_)));
    }

    #[tokio::test]
    async fn empty_api_key_is_rejected_locally() {
        let p = WeatherApiProvider::new(
            String::new(),
            DEFAULT_BASE_URL.into(),
            3,
            RetryPolicy::default(),
        );
        assert_eq!(p.fetch_by_name("Zurich").await.unwrap_err(), WeatherError::MissingApiKey);
    }
}
