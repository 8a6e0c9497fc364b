use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Within 0.01 degrees on both axes (~1.1 km).
    pub fn is_near(&self, other: &Coordinates) -> bool {
        (self.latitude - other.latitude).abs() < crate::city::NEARBY_DEGREES
            && (self.longitude - other.longitude).abs() < crate::city::NEARBY_DEGREES
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

/// Derived identity of a [`City`], used as the cache and list key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(String);

impl CityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named place: either the device's current location or a user-saved city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub is_current: bool,
    /// Added through a name search; weather is looked up by name instead of coordinates.
    #[serde(default)]
    pub searched: bool,
}

impl City {
    pub fn saved(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            is_current: false,
            searched: false,
        }
    }

    pub fn current(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            name: name.into(),
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            is_current: true,
            searched: false,
        }
    }

    /// Build a saved city from a name-search result.
    pub fn from_search(snapshot: &WeatherSnapshot) -> Self {
        Self {
            name: snapshot.location.name.clone(),
            latitude: snapshot.location.latitude,
            longitude: snapshot.location.longitude,
            is_current: false,
            searched: true,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    pub fn id(&self) -> CityId {
        crate::city::identity_key(self)
    }

    /// How the weather provider should be asked about this city.
    pub fn query(&self) -> WeatherQuery {
        if self.searched {
            WeatherQuery::Name(self.name.clone())
        } else {
            WeatherQuery::Coordinates(self.coordinates())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    Coordinates(Coordinates),
    Name(String),
}

impl fmt::Display for WeatherQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherQuery::Coordinates(c) => write!(f, "{c}"),
            WeatherQuery::Name(name) => f.write_str(name),
        }
    }
}

/// Point-in-time weather payload for one place. Replaced wholesale on refetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: SnapshotLocation,
    pub current: CurrentConditions,
    pub forecast: Vec<ForecastDay>,
    #[serde(default)]
    pub alerts: Vec<WeatherAlert>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotLocation {
    pub name: String,
    pub region: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub text: String,
    pub code: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub condition: Condition,
    pub wind_kph: f64,
    pub wind_direction: String,
    pub pressure_mb: f64,
    pub humidity_pct: u8,
    pub uv_index: f64,
    pub is_day: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub avg_temp_c: f64,
    pub max_wind_kph: f64,
    pub total_precip_mm: f64,
    pub chance_of_rain_pct: u8,
    pub condition: Condition,
    pub uv_index: f64,
}

/// Sun and moon times, kept as the provider's local-time strings ("06:12 AM").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Astronomy {
    pub sunrise: String,
    pub sunset: String,
    pub moonrise: String,
    pub moonset: String,
    pub moon_phase: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub time: DateTime<Utc>,
    pub temperature_c: f64,
    pub condition: Condition,
    pub chance_of_rain_pct: u8,
    pub wind_kph: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub day: DaySummary,
    pub astro: Astronomy,
    pub hours: Vec<HourlyForecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub headline: String,
    pub event: String,
    pub severity: String,
    pub areas: String,
    pub description: String,
    pub effective: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn searched_city_queries_by_name() {
        let mut city = City::saved("Oslo", 59.91, 10.75);
        assert_eq!(city.query(), WeatherQuery::Coordinates(Coordinates::new(59.91, 10.75)));

        city.searched = true;
        assert_eq!(city.query(), WeatherQuery::Name("Oslo".into()));
    }

    #[test]
    fn nearby_requires_both_axes() {
        let a = Coordinates::new(47.3769, 8.5417);
        assert!(a.is_near(&Coordinates::new(47.3770, 8.5418)));
        assert!(!a.is_near(&Coordinates::new(47.3769, 8.6)));
        assert!(!a.is_near(&Coordinates::new(47.4, 8.5417)));
    }

    #[test]
    fn city_deserializes_without_flags() {
        let city: City =
            serde_json::from_str(r#"{"name":"Lima","latitude":-12.05,"longitude":-77.04}"#)
                .expect("valid city json");
        assert!(!city.is_current);
        assert!(!city.searched);
    }
}
