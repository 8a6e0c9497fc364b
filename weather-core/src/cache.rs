//! Per-city weather snapshot cache with in-flight request sharing.
//!
//! A miss registers one shared fetch under the city identity; concurrent
//! misses for the same identity await that fetch instead of starting their
//! own. A fetch only writes its result back if it is still the registered
//! one, so an eviction or a newer refresh wins over a stale completion.

use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    error::WeatherError,
    model::{City, CityId, WeatherQuery, WeatherSnapshot},
    provider::WeatherProvider,
};

pub type FetchResult = Result<Arc<WeatherSnapshot>, WeatherError>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct InFlight {
    ticket: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CityId, Arc<WeatherSnapshot>>,
    in_flight: HashMap<CityId, InFlight>,
    next_ticket: u64,
}

#[derive(Clone)]
pub struct WeatherCache {
    provider: Arc<dyn WeatherProvider>,
    state: Arc<Mutex<CacheState>>,
}

impl std::fmt::Debug for WeatherCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WeatherCache")
            .field("entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

impl WeatherCache {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self {
            provider,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn get(&self, id: &CityId) -> Option<Arc<WeatherSnapshot>> {
        self.state.lock().entries.get(id).cloned()
    }

    pub fn contains(&self, id: &CityId) -> bool {
        self.state.lock().entries.contains_key(id)
    }

    pub fn is_loading(&self, id: &CityId) -> bool {
        self.state.lock().in_flight.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Copy of the current identity → snapshot map.
    pub fn entries(&self) -> HashMap<CityId, Arc<WeatherSnapshot>> {
        self.state.lock().entries.clone()
    }

    pub fn insert(&self, id: CityId, snapshot: Arc<WeatherSnapshot>) {
        let mut state = self.state.lock();
        state.in_flight.remove(&id);
        state.entries.insert(id, snapshot);
    }

    pub fn remove(&self, id: &CityId) -> Option<Arc<WeatherSnapshot>> {
        let mut state = self.state.lock();
        state.in_flight.remove(id);
        state.entries.remove(id)
    }

    /// Return the cached snapshot, or fetch it once and cache it.
    pub async fn ensure_loaded(&self, city: &City) -> FetchResult {
        let id = city.id();
        let fetch = {
            let mut state = self.state.lock();
            if let Some(snapshot) = state.entries.get(&id) {
                tracing::debug!("Cache hit for {id}");
                return Ok(Arc::clone(snapshot));
            }
            match state.in_flight.get(&id) {
                Some(pending) => {
                    tracing::debug!("Joining in-flight fetch for {id}");
                    pending.fetch.clone()
                }
                None => self.register_fetch(&mut state, id, city.query()),
            }
        };
        fetch.await
    }

    /// Fetch again regardless of what is cached, replacing the entry on success.
    pub async fn refresh(&self, city: &City) -> FetchResult {
        let fetch = {
            let mut state = self.state.lock();
            self.register_fetch(&mut state, city.id(), city.query())
        };
        fetch.await
    }

    /// `ensure_loaded` once per distinct identity, concurrently.
    pub async fn preload_all(&self, cities: &[City]) -> Vec<(CityId, FetchResult)> {
        let mut seen = HashSet::new();
        let unique: Vec<&City> = cities.iter().filter(|c| seen.insert(c.id())).collect();

        join_all(unique.into_iter().map(move |city| async move {
            let result = self.ensure_loaded(city).await;
            if let Err(err) = &result {
                tracing::warn!("Failed to preload weather for {}: {err}", city.name);
            }
            (city.id(), result)
        }))
        .await
    }

    /// Drop every entry except the one keyed by `current`.
    pub fn evict_all_except_current(&self, current: Option<&CityId>) {
        let mut state = self.state.lock();
        let keep = |id: &CityId| Some(id) == current;
        state.entries.retain(|id, _| keep(id));
        state.in_flight.retain(|id, _| keep(id));
        tracing::debug!("Evicted cache down to {} entries", state.entries.len());
    }

    fn register_fetch(&self, state: &mut CacheState, id: CityId, query: WeatherQuery) -> SharedFetch {
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        let provider = Arc::clone(&self.provider);
        let shared_state = Arc::clone(&self.state);
        let key = id.clone();

        let fetch = async move {
            tracing::info!("Fetching weather for {key} ({query})");
            let result = provider.fetch(&query).await.map(Arc::new);

            let mut state = shared_state.lock();
            if state.in_flight.get(&key).is_some_and(|f| f.ticket == ticket) {
                state.in_flight.remove(&key);
                if let Ok(snapshot) = &result {
                    state.entries.insert(key, Arc::clone(snapshot));
                }
            } else {
                tracing::debug!("Discarding superseded fetch for {key}");
            }
            result
        }
        .boxed()
        .shared();

        state.in_flight.insert(id, InFlight { ticket, fetch: fetch.clone() });
        fetch
    }
}
