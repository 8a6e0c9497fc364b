//! Human-friendly rendering of snapshots and coordinator views.

use weather_core::{
    City, ContentState, CoordinatorView, Preferences, SavedCities, WeatherSnapshot,
};

pub fn snapshot(snapshot: &WeatherSnapshot, prefs: &Preferences) -> String {
    let loc = &snapshot.location;
    let now = &snapshot.current;
    let mut lines = Vec::new();

    let place = [loc.name.as_str(), loc.region.as_str(), loc.country.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    lines.push(format!("{place} ({:.4}, {:.4})", loc.latitude, loc.longitude));
    lines.push(format!(
        "  {} {}, feels like {}",
        prefs.temperature.format(now.temperature_c),
        now.condition.text,
        prefs.temperature.format(now.feels_like_c),
    ));
    lines.push(format!(
        "  Wind {} {}, pressure {}, humidity {}%, UV {:.0}",
        prefs.wind_speed.format(now.wind_kph),
        now.wind_direction,
        prefs.pressure.format(now.pressure_mb),
        now.humidity_pct,
        now.uv_index,
    ));

    for day in &snapshot.forecast {
        lines.push(format!(
            "  {}  {} / {}  {}  rain {}%  sunrise {} sunset {}",
            day.date.format("%a %d %b"),
            prefs.temperature.format(day.day.max_temp_c),
            prefs.temperature.format(day.day.min_temp_c),
            day.day.condition.text,
            day.day.chance_of_rain_pct,
            day.astro.sunrise,
            day.astro.sunset,
        ));
    }

    for alert in &snapshot.alerts {
        lines.push(format!("  ! {} ({})", alert.headline, alert.severity));
    }

    lines.join("\n")
}

pub fn saved_cities(cities: &SavedCities) -> String {
    if cities.is_empty() {
        return "No saved cities.".to_string();
    }
    cities
        .as_slice()
        .iter()
        .enumerate()
        .map(|(i, city)| {
            format!(
                "{i:>2}. {:<20} {:>9.4} {:>9.4}  {}",
                city.name,
                city.latitude,
                city.longitude,
                city.id()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn state_label(state: &ContentState) -> String {
    match state {
        ContentState::RequestingLocation => "Requesting location...".to_string(),
        ContentState::Loading => "Loading...".to_string(),
        ContentState::Ready => "Ready".to_string(),
        ContentState::LocationError(msg) | ContentState::Error(msg) => {
            let mut label = format!("Error: {msg}\n  [retry]");
            if state.offers_settings_action() {
                label.push_str(" [open settings]");
            }
            label
        }
    }
}

fn city_line(city: &City, view: &CoordinatorView, prefs: &Preferences) -> String {
    let marker = if city.is_current { "*" } else { " " };
    let weather = match view.weather_for(city) {
        Some(snapshot) => format!(
            "{:>6}  {}",
            prefs.temperature.format(snapshot.current.temperature_c),
            snapshot.current.condition.text
        ),
        None => "    --  loading".to_string(),
    };
    format!("{marker} {:<20} {weather}", city.name)
}

pub fn view(view: &CoordinatorView, prefs: &Preferences) -> String {
    let mut lines = vec![state_label(&view.state)];
    if let Some(advisory) = &view.advisory {
        lines.push(format!("  ! {advisory}"));
    }
    if view.state.is_ready() {
        lines.extend(view.cities.iter().map(|city| city_line(city, view, prefs)));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use weather_core::{Coordinates, TemperatureUnit};

    #[test]
    fn saved_cities_lists_index_and_identity() {
        let cities = SavedCities::new(vec![City::saved("Paris", 48.8566, 2.3522)]);
        let out = saved_cities(&cities);
        assert!(out.starts_with(" 0. Paris"));
        assert!(out.ends_with("paris_48.8566_2.3522"));
        assert_eq!(saved_cities(&SavedCities::default()), "No saved cities.");
    }

    #[test]
    fn permission_error_offers_settings() {
        let view = CoordinatorView {
            state: ContentState::LocationError(
                "Location permission denied. Enable location access in Settings.".into(),
            ),
            ..Default::default()
        };
        let out = super::view(&view, &Preferences::default());
        assert!(out.contains("[retry] [open settings]"));
    }

    #[test]
    fn ready_view_marks_current_city() {
        let view = CoordinatorView {
            cities: vec![
                City::current("Berlin", Coordinates::new(52.52, 13.405)),
                City::saved("Rome", 41.9, 12.5),
            ],
            state: ContentState::Ready,
            advisory: Some("Network error: offline".into()),
            ..Default::default()
        };
        let prefs = Preferences {
            temperature: TemperatureUnit::Fahrenheit,
            ..Default::default()
        };

        let out = super::view(&view, &prefs);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "Ready");
        assert_eq!(lines[1], "  ! Network error: offline");
        assert!(lines[2].starts_with("* Berlin"));
        assert!(lines[3].starts_with("  Rome"));
        assert!(lines[3].ends_with("loading"));
    }
}
