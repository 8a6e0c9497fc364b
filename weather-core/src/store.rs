//! On-device persistence of the saved-city list and display preferences.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    city::is_same_city,
    error::{CoordinatorError, StoreError},
    model::{City, CityId},
    units::{PressureUnit, TemperatureUnit, ThemeMode, WindSpeedUnit},
};

/// User display preferences. Every field is independently settable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub temperature: TemperatureUnit,
    pub wind_speed: WindSpeedUnit,
    pub pressure: PressureUnit,
    pub theme: ThemeMode,
}

/// User-ordered list of saved cities.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SavedCities(Vec<City>);

impl SavedCities {
    pub fn new(cities: Vec<City>) -> Self {
        Self(cities)
    }

    pub fn as_slice(&self) -> &[City] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &CityId) -> bool {
        self.0.iter().any(|c| &c.id() == id)
    }

    /// Append a city unless an equivalent one is already saved.
    pub fn add(&mut self, mut city: City) -> bool {
        if self.0.iter().any(|c| is_same_city(c, &city)) {
            return false;
        }
        city.is_current = false;
        self.0.push(city);
        true
    }

    pub fn remove(&mut self, id: &CityId) -> Option<City> {
        let idx = self.0.iter().position(|c| &c.id() == id)?;
        Some(self.0.remove(idx))
    }

    /// Move the city at `from` so it ends up at `to`.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), CoordinatorError> {
        let len = self.0.len();
        if from >= len || to >= len {
            return Err(CoordinatorError::InvalidIndex { from, to, len });
        }
        let city = self.0.remove(from);
        self.0.insert(to, city);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Durable key-value storage for saved cities and preferences.
pub trait PreferenceStore: Send + Sync {
    fn load_cities(&self) -> Result<SavedCities, StoreError>;
    fn save_cities(&self, cities: &SavedCities) -> Result<(), StoreError>;
    fn load_preferences(&self) -> Result<Preferences, StoreError>;
    fn save_preferences(&self, preferences: &Preferences) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoreDocument {
    preferences: Preferences,
    saved_cities: SavedCities,
}

/// Single TOML document on disk holding both preferences and saved cities.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at the platform data directory.
    pub fn at_default_location() -> Result<Self, StoreError> {
        let dirs = crate::config::project_dirs().map_err(|_| StoreError::NoDataDir)?;
        Ok(Self::new(dirs.data_dir().join("state.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoreDocument, StoreError> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&contents)?)
    }

    fn write(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(doc)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut StoreDocument)) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut doc = self.read()?;
        f(&mut doc);
        self.write(&doc)
    }
}

impl PreferenceStore for FileStore {
    fn load_cities(&self) -> Result<SavedCities, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.read()?.saved_cities)
    }

    fn save_cities(&self, cities: &SavedCities) -> Result<(), StoreError> {
        tracing::debug!("Persisting {} saved cities to {}", cities.len(), self.path.display());
        self.update(|doc| doc.saved_cities = cities.clone())
    }

    fn load_preferences(&self) -> Result<Preferences, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.read()?.preferences)
    }

    fn save_preferences(&self, preferences: &Preferences) -> Result<(), StoreError> {
        self.update(|doc| doc.preferences = *preferences)
    }
}

/// Volatile store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Mutex<StoreDocument>,
}

impl MemoryStore {
    pub fn with_cities(cities: Vec<City>) -> Self {
        Self {
            doc: Mutex::new(StoreDocument {
                preferences: Preferences::default(),
                saved_cities: SavedCities::new(cities),
            }),
        }
    }
}

impl PreferenceStore for MemoryStore {
    fn load_cities(&self) -> Result<SavedCities, StoreError> {
        Ok(self.doc.lock().saved_cities.clone())
    }

    fn save_cities(&self, cities: &SavedCities) -> Result<(), StoreError> {
        self.doc.lock().saved_cities = cities.clone();
        Ok(())
    }

    fn load_preferences(&self) -> Result<Preferences, StoreError> {
        Ok(self.doc.lock().preferences)
    }

    fn save_preferences(&self, preferences: &Preferences) -> Result<(), StoreError> {
        self.doc.lock().preferences = *preferences;
        Ok(())
    }
}
