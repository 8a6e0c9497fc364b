use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use weather_core::{
    City, CityId, Config, Coordinator, CoordinatorError, CoordinatorHandle, Coordinates,
    Dependencies, FileStore, PreferenceStore, PressureUnit, SavedCities, TemperatureUnit,
    ThemeMode, WindSpeedUnit, provider::weatherapi::WeatherApiProvider, provider_from_config,
};

use crate::{location::FixedLocation, output};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the WeatherAPI.com API key.
    Configure,

    /// Show current weather and forecast for a place name.
    Search {
        /// City or place name.
        name: String,

        /// Add the place to the saved cities.
        #[arg(long)]
        save: bool,
    },

    /// List saved cities with their identity keys.
    Cities,

    /// Remove a saved city.
    Delete {
        /// Identity key as printed by `weather cities`.
        id: String,
    },

    /// Move a saved city to another position.
    Move { from: usize, to: usize },

    /// Remove every saved city.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },

    /// Show display preferences, or change the ones given.
    Prefs {
        #[arg(long)]
        temperature: Option<TemperatureUnit>,

        #[arg(long)]
        wind: Option<WindSpeedUnit>,

        #[arg(long)]
        pressure: Option<PressureUnit>,

        #[arg(long)]
        theme: Option<ThemeMode>,
    },

    /// Follow weather for the saved cities and a fixed location until Ctrl-C.
    Watch {
        /// Latitude of the device location; without it location access is treated as denied.
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Search { name, save } => search(&name, save).await,
            Command::Cities => {
                let store = FileStore::at_default_location()?;
                println!("{}", output::saved_cities(&store.load_cities()?));
                Ok(())
            }
            Command::Delete { id } => delete(CityId::from(id)).await,
            Command::Move { from, to } => {
                let editor = list_editor()?;
                let result = editor.reorder_cities(from, to).await;
                editor.shutdown();
                result?;
                println!("{}", output::saved_cities(&saved_list(&editor)));
                Ok(())
            }
            Command::Clear { yes } => clear(yes).await,
            Command::Prefs { temperature, wind, pressure, theme } => {
                let store = FileStore::at_default_location()?;
                let mut prefs = store.load_preferences()?;
                let changed = temperature.is_some()
                    || wind.is_some()
                    || pressure.is_some()
                    || theme.is_some();

                prefs.temperature = temperature.unwrap_or(prefs.temperature);
                prefs.wind_speed = wind.unwrap_or(prefs.wind_speed);
                prefs.pressure = pressure.unwrap_or(prefs.pressure);
                prefs.theme = theme.unwrap_or(prefs.theme);
                if changed {
                    store.save_preferences(&prefs)?;
                }

                println!("temperature: {}", prefs.temperature);
                println!("wind:        {}", prefs.wind_speed);
                println!("pressure:    {}", prefs.pressure);
                println!("theme:       {}", prefs.theme);
                Ok(())
            }
            Command::Watch { lat, lon } => {
                let coordinates = lat.zip(lon).map(|(lat, lon)| Coordinates::new(lat, lon));
                watch(coordinates).await
            }
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let key = inquire::Password::new("WeatherAPI.com API key:")
        .without_confirmation()
        .with_help_message("A free key is available at https://www.weatherapi.com")
        .prompt()?;
    config.set_api_key(key);
    if !config.is_configured() {
        bail!("API key must not be empty.");
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn search(name: &str, save: bool) -> Result<()> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;
    let store = FileStore::at_default_location()?;
    let prefs = store.load_preferences()?;

    let snapshot = provider
        .fetch_by_name(name)
        .await
        .with_context(|| format!("Failed to fetch weather for '{name}'"))?;
    println!("{}", output::snapshot(&snapshot, &prefs));

    if save {
        let city = City::from_search(&snapshot);
        let editor = list_editor()?;
        let added = editor.save_city(city.clone()).await;
        editor.shutdown();
        if added? {
            println!("Saved {}.", city.name);
        } else {
            println!("{} is already saved.", city.name);
        }
    }
    Ok(())
}

/// Coordinator over the saved-city list alone: no location source, and the
/// provider is only called when an edit needs weather.
fn list_editor() -> Result<CoordinatorHandle> {
    let config = Config::load()?;
    Ok(list_editor_with(&config, FileStore::at_default_location()?))
}

fn list_editor_with(config: &Config, store: FileStore) -> CoordinatorHandle {
    let weather = Arc::new(WeatherApiProvider::new(
        config.api_key.clone().unwrap_or_default(),
        config.base_url.clone(),
        config.forecast_days,
        config.retry_policy(),
    ));
    let (location, _events) = FixedLocation::new(None);

    Coordinator::spawn(
        Dependencies {
            weather,
            location: Arc::new(location),
            store: Arc::new(store),
        },
        config.coordinator_timing(),
    )
}

fn saved_list(editor: &CoordinatorHandle) -> SavedCities {
    SavedCities::new(editor.view().cities)
}

async fn delete(id: CityId) -> Result<()> {
    let editor = list_editor()?;
    let name = saved_list(&editor)
        .as_slice()
        .iter()
        .find(|c| c.id() == id)
        .map(|c| c.name.clone());
    let result = editor.delete_city(id.clone()).await;
    editor.shutdown();

    if let Err(CoordinatorError::UnknownCity(_)) = result {
        bail!("No saved city with identity '{id}'. Run `weather cities` to list them.");
    }
    result?;
    println!("Removed {}.", name.unwrap_or_else(|| id.to_string()));
    Ok(())
}

async fn clear(yes: bool) -> Result<()> {
    let editor = list_editor()?;
    let cities = saved_list(&editor);
    if cities.is_empty() {
        println!("No saved cities.");
        return Ok(());
    }

    let confirmed = yes
        || inquire::Confirm::new(&format!("Remove all {} saved cities?", cities.len()))
            .with_default(false)
            .prompt()?;
    if !confirmed {
        editor.shutdown();
        return Ok(());
    }

    let result = editor.clear_all_cities().await;
    editor.shutdown();
    result?;
    println!("Removed all saved cities.");
    Ok(())
}

async fn watch(coordinates: Option<Coordinates>) -> Result<()> {
    let config = Config::load()?;
    let weather = provider_from_config(&config)?;
    let store = Arc::new(FileStore::at_default_location()?);
    let prefs = store.load_preferences()?;
    let (location, mut events) = FixedLocation::new(coordinates);

    let handle = Coordinator::spawn(
        Dependencies {
            weather,
            location: Arc::new(location),
            store,
        },
        config.coordinator_timing(),
    );

    let forwarder = {
        let handle = handle.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if handle.location_event(event).is_err() {
                    break;
                }
            }
        })
    };

    let mut views = handle.subscribe();
    handle.on_appear()?;
    println!("{}", output::view(&views.borrow_and_update(), &prefs));

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                println!("\n{}", output::view(&view, &prefs));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown();
    forwarder.abort();
    Ok(())
}
