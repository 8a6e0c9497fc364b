//! City reconciliation and cache coordinator.
//!
//! One task owns the saved-city list, the current-location city, the error
//! signals and the timers. Everything else talks to it through a
//! [`CoordinatorHandle`], and it publishes a fresh [`CoordinatorView`] after
//! each handled event (only when something visible changed).
//!
//! Location fixes are debounced before they trigger a fetch. At most one
//! current-location fetch runs at a time; a fix that arrives meanwhile waits
//! in a single pending slot, replacing whatever was waiting there. After the
//! first current-location snapshot lands, `Ready` is held back for a settle
//! window, which restarts whenever a new fix arrives before it has elapsed.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Instant, sleep_until},
};

use crate::{
    cache::WeatherCache,
    city::reconcile,
    error::{CoordinatorError, LocationError, WeatherError},
    location::{AuthorizationStatus, LocationEvent, LocationProvider},
    model::{City, CityId, Coordinates, WeatherSnapshot},
    provider::WeatherProvider,
    state::{self, ContentState, Signals},
    store::{PreferenceStore, SavedCities},
};

pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;
pub const DEFAULT_SETTLE_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorTiming {
    /// Quiet period after the last location fix before fetching.
    pub debounce: Duration,
    /// Delay between the first current-location snapshot and `Ready`.
    pub settle: Duration,
}

impl Default for CoordinatorTiming {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
        }
    }
}

/// The three collaborators, constructed once by the caller.
#[derive(Clone)]
pub struct Dependencies {
    pub weather: Arc<dyn WeatherProvider>,
    pub location: Arc<dyn LocationProvider>,
    pub store: Arc<dyn PreferenceStore>,
}

/// Everything a UI layer reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorView {
    /// Current location first (if any), then saved cities not equivalent to it.
    pub cities: Vec<City>,
    pub weather: HashMap<CityId, Arc<WeatherSnapshot>>,
    pub state: ContentState,
    pub advisory: Option<String>,
    pub authorization: AuthorizationStatus,
}

impl CoordinatorView {
    pub fn current_city(&self) -> Option<&City> {
        self.cities.first().filter(|c| c.is_current)
    }

    pub fn weather_for(&self, city: &City) -> Option<&WeatherSnapshot> {
        self.weather.get(&city.id()).map(Arc::as_ref)
    }
}

type Reply<T> = oneshot::Sender<Result<T, CoordinatorError>>;

enum Command {
    OnAppear,
    RetryLocationFlow,
    Location(LocationEvent),
    SaveCity(City, Reply<bool>),
    DeleteCity(CityId, Reply<()>),
    ReorderCities { from: usize, to: usize, reply: Reply<()> },
    ClearAllCities(Reply<()>),
    Refresh(CityId, Reply<()>),
    Shutdown,
}

enum Internal {
    CurrentFetched {
        coordinates: Coordinates,
        result: Result<WeatherSnapshot, WeatherError>,
    },
    CacheUpdated,
}

#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<CoordinatorView>,
}

impl CoordinatorHandle {
    fn send(&self, command: Command) -> Result<(), CoordinatorError> {
        self.commands.send(command).map_err(|_| CoordinatorError::Stopped)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await.map_err(|_| CoordinatorError::Stopped)?
    }

    /// Load saved cities, preload their weather and start the location flow.
    pub fn on_appear(&self) -> Result<(), CoordinatorError> {
        self.send(Command::OnAppear)
    }

    /// Clear location and weather errors and go through authorization again.
    pub fn retry_location_flow(&self) -> Result<(), CoordinatorError> {
        self.send(Command::RetryLocationFlow)
    }

    pub fn location_event(&self, event: LocationEvent) -> Result<(), CoordinatorError> {
        self.send(Command::Location(event))
    }

    /// Returns `false` when an equivalent city is already saved.
    pub async fn save_city(&self, city: City) -> Result<bool, CoordinatorError> {
        self.request(|reply| Command::SaveCity(city, reply)).await
    }

    pub async fn delete_city(&self, id: CityId) -> Result<(), CoordinatorError> {
        self.request(|reply| Command::DeleteCity(id, reply)).await
    }

    pub async fn reorder_cities(&self, from: usize, to: usize) -> Result<(), CoordinatorError> {
        self.request(|reply| Command::ReorderCities { from, to, reply }).await
    }

    pub async fn clear_all_cities(&self) -> Result<(), CoordinatorError> {
        self.request(Command::ClearAllCities).await
    }

    /// Pull-to-refresh for one city of the display list.
    pub async fn refresh(&self, id: CityId) -> Result<(), CoordinatorError> {
        self.request(|reply| Command::Refresh(id, reply)).await
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorView> {
        self.view.clone()
    }

    pub fn view(&self) -> CoordinatorView {
        self.view.borrow().clone()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

pub struct Coordinator {
    deps: Dependencies,
    timing: CoordinatorTiming,
    cache: WeatherCache,
    saved: SavedCities,
    current: Option<City>,
    location: Option<Coordinates>,
    authorization: AuthorizationStatus,
    location_error: Option<String>,
    weather_error: Option<String>,
    debounce_deadline: Option<Instant>,
    fetch_in_flight: bool,
    pending_fetch: Option<Coordinates>,
    last_fetched: Option<Coordinates>,
    settle_deadline: Option<Instant>,
    settled: bool,
    internal: mpsc::UnboundedSender<Internal>,
    view: watch::Sender<CoordinatorView>,
}

impl Coordinator {
    /// Start the coordinator task on the current tokio runtime.
    pub fn spawn(deps: Dependencies, timing: CoordinatorTiming) -> CoordinatorHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(CoordinatorView::default());

        let coordinator = Coordinator {
            cache: WeatherCache::new(Arc::clone(&deps.weather)),
            authorization: deps.location.authorization_status(),
            saved: load_saved(deps.store.as_ref()).unwrap_or_default(),
            deps,
            timing,
            current: None,
            location: None,
            location_error: None,
            weather_error: None,
            debounce_deadline: None,
            fetch_in_flight: false,
            pending_fetch: None,
            last_fetched: None,
            settle_deadline: None,
            settled: false,
            internal: internal_tx,
            view: view_tx,
        };
        coordinator.publish();
        tokio::spawn(coordinator.run(command_rx, internal_rx));

        CoordinatorHandle {
            commands: command_tx,
            view: view_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            let debounce = self.debounce_deadline;
            let settle = self.settle_deadline;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = internal.recv() => self.handle_internal(event),
                _ = sleep_until(debounce.unwrap_or_else(Instant::now)), if debounce.is_some() => {
                    self.on_debounce_elapsed();
                }
                _ = sleep_until(settle.unwrap_or_else(Instant::now)), if settle.is_some() => {
                    self.on_settle_elapsed();
                }
            }
            self.publish();
        }

        tracing::info!("Coordinator stopped");
        self.deps.location.stop_updating();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::OnAppear => self.on_appear(),
            Command::RetryLocationFlow => self.retry_location_flow(),
            Command::Location(event) => self.on_location_event(event),
            Command::SaveCity(city, reply) => {
                let result = self.save_city(city);
                self.respond(reply, result);
            }
            Command::DeleteCity(id, reply) => {
                let result = self.delete_city(&id);
                self.respond(reply, result);
            }
            Command::ReorderCities { from, to, reply } => {
                let result = self.update_saved(|saved| saved.reorder(from, to));
                self.respond(reply, result);
            }
            Command::ClearAllCities(reply) => {
                let result = self.clear_all_cities();
                self.respond(reply, result);
            }
            Command::Refresh(id, reply) => self.refresh(id, reply),
            Command::Shutdown => {}
        }
    }

    /// Publish before replying so the caller sees its change in `view()`.
    fn respond<T>(&self, reply: Reply<T>, result: Result<T, CoordinatorError>) {
        self.publish();
        let _ = reply.send(result);
    }

    fn handle_internal(&mut self, event: Internal) {
        match event {
            Internal::CurrentFetched { coordinates, result } => {
                self.on_current_fetched(coordinates, result)
            }
            Internal::CacheUpdated => {}
        }
    }

    fn on_appear(&mut self) {
        if let Some(saved) = load_saved(self.deps.store.as_ref()) {
            self.saved = saved;
        }
        tracing::info!("Appeared with {} saved cities", self.saved.len());
        self.load_in_background(self.saved.as_slice().to_vec());
        self.begin_location_flow();
    }

    fn retry_location_flow(&mut self) {
        self.location_error = None;
        self.weather_error = None;
        if let Some(coordinates) = self.location {
            self.request_current_fetch(coordinates);
        }
        self.begin_location_flow();
    }

    fn begin_location_flow(&mut self) {
        self.authorization = self.deps.location.authorization_status();
        match self.authorization {
            AuthorizationStatus::NotDetermined => self.deps.location.request_authorization(),
            AuthorizationStatus::Granted => self.deps.location.start_updating(),
            AuthorizationStatus::Denied => {
                self.location_error = Some(LocationError::PermissionDenied.to_string());
            }
        }
    }

    fn on_location_event(&mut self, event: LocationEvent) {
        match event {
            LocationEvent::Updated(Some(coordinates)) => {
                tracing::debug!("Location update: {coordinates}");
                self.location = Some(coordinates);
                self.location_error = None;
                let now = Instant::now();
                self.debounce_deadline = Some(now + self.timing.debounce);
                if self.settle_deadline.is_some() {
                    tracing::debug!("Restarting settle window");
                    self.settle_deadline = Some(now + self.timing.settle);
                }
            }
            LocationEvent::Updated(None) => tracing::debug!("Location provider reported no fix"),
            LocationEvent::AuthorizationChanged(status) => {
                tracing::info!("Location authorization: {status:?}");
                self.authorization = status;
                match status {
                    AuthorizationStatus::Granted => {
                        self.location_error = None;
                        self.deps.location.start_updating();
                    }
                    AuthorizationStatus::Denied => {
                        self.location_error = Some(LocationError::PermissionDenied.to_string());
                    }
                    AuthorizationStatus::NotDetermined => {}
                }
            }
            LocationEvent::Failed(err) => {
                tracing::warn!("Location error: {err}");
                self.location_error = Some(err.to_string());
            }
        }
    }

    fn on_debounce_elapsed(&mut self) {
        self.debounce_deadline = None;
        let Some(coordinates) = self.location else {
            return;
        };

        let idle = !self.fetch_in_flight && self.pending_fetch.is_none();
        let unchanged = self
            .last_fetched
            .is_some_and(|last| last.is_near(&coordinates));
        if idle && unchanged && self.current_weather_ready() {
            tracing::debug!("Location {coordinates} unchanged, keeping current weather");
            return;
        }
        self.request_current_fetch(coordinates);
    }

    fn request_current_fetch(&mut self, coordinates: Coordinates) {
        if self.fetch_in_flight {
            tracing::debug!("Fetch in flight, queueing {coordinates}");
            self.pending_fetch = Some(coordinates);
        } else {
            self.start_current_fetch(coordinates);
        }
    }

    fn start_current_fetch(&mut self, coordinates: Coordinates) {
        self.fetch_in_flight = true;
        let weather = Arc::clone(&self.deps.weather);
        let tx = self.internal.clone();

        tracing::info!("Fetching current-location weather for {coordinates}");
        tokio::spawn(async move {
            let result = weather.fetch_by_coordinates(coordinates).await;
            let _ = tx.send(Internal::CurrentFetched { coordinates, result });
        });
    }

    fn on_current_fetched(
        &mut self,
        coordinates: Coordinates,
        result: Result<WeatherSnapshot, WeatherError>,
    ) {
        self.fetch_in_flight = false;

        match result {
            Ok(snapshot) => {
                let city = City::current(snapshot.location.name.clone(), coordinates);
                let id = city.id();
                tracing::info!("Current location resolved to {}", city.name);

                if let Some(previous) = self.current_id().filter(|previous| *previous != id) {
                    self.cache.remove(&previous);
                }
                self.cache.insert(id, Arc::new(snapshot));
                self.current = Some(city);
                self.last_fetched = Some(coordinates);
                self.weather_error = None;

                if !self.settled && self.settle_deadline.is_none() {
                    self.settle_deadline = Some(Instant::now() + self.timing.settle);
                }
            }
            Err(err) => {
                tracing::warn!("Current-location weather fetch failed: {err}");
                self.weather_error = Some(err.to_string());
            }
        }

        if let Some(next) = self.pending_fetch.take() {
            self.start_current_fetch(next);
        }
    }

    fn on_settle_elapsed(&mut self) {
        self.settle_deadline = None;
        if self.current_weather_ready() {
            self.settled = true;
        }
    }

    fn save_city(&mut self, mut city: City) -> Result<bool, CoordinatorError> {
        // saved under its own identity, even when it was the current location
        city.is_current = false;
        let mut next = self.saved.clone();
        if !next.add(city.clone()) {
            tracing::debug!("{} is already saved", city.name);
            return Ok(false);
        }
        self.deps.store.save_cities(&next)?;
        self.saved = next;
        self.load_in_background(vec![city]);
        Ok(true)
    }

    fn delete_city(&mut self, id: &CityId) -> Result<(), CoordinatorError> {
        self.update_saved(|saved| {
            saved
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| CoordinatorError::UnknownCity(id.clone()))
        })?;
        if self.current_id().as_ref() != Some(id) {
            self.cache.remove(id);
        }
        Ok(())
    }

    fn clear_all_cities(&mut self) -> Result<(), CoordinatorError> {
        self.update_saved(|saved| {
            saved.clear();
            Ok(())
        })?;
        self.cache.evict_all_except_current(self.current_id().as_ref());
        Ok(())
    }

    /// Apply `f` to a copy of the saved list and keep it only once persisted.
    fn update_saved(
        &mut self,
        f: impl FnOnce(&mut SavedCities) -> Result<(), CoordinatorError>,
    ) -> Result<(), CoordinatorError> {
        let mut next = self.saved.clone();
        f(&mut next)?;
        self.deps.store.save_cities(&next)?;
        self.saved = next;
        Ok(())
    }

    fn refresh(&mut self, id: CityId, reply: Reply<()>) {
        if self.current_id().as_ref() == Some(&id) {
            if let Some(coordinates) = self.location {
                self.request_current_fetch(coordinates);
            }
            let _ = reply.send(Ok(()));
            return;
        }

        let Some(city) = self.saved.as_slice().iter().find(|c| c.id() == id).cloned() else {
            let _ = reply.send(Err(CoordinatorError::UnknownCity(id)));
            return;
        };

        let cache = self.cache.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            let result = cache.refresh(&city).await;
            let _ = tx.send(Internal::CacheUpdated);
            let _ = reply.send(result.map(|_| ()).map_err(CoordinatorError::from));
        });
    }

    fn load_in_background(&self, cities: Vec<City>) {
        if cities.is_empty() {
            return;
        }
        let cache = self.cache.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            cache.preload_all(&cities).await;
            let _ = tx.send(Internal::CacheUpdated);
        });
    }

    fn current_id(&self) -> Option<CityId> {
        self.current.as_ref().map(City::id)
    }

    fn current_weather_ready(&self) -> bool {
        self.current_id().is_some_and(|id| self.cache.contains(&id))
    }

    fn publish(&self) {
        let derived = state::derive(&Signals {
            has_location: self.location.is_some(),
            location_error: self.location_error.as_deref(),
            weather_error: self.weather_error.as_deref(),
            has_saved_cities: !self.saved.is_empty(),
            current_weather_ready: self.current_weather_ready(),
            settled: self.settled,
        });

        let view = CoordinatorView {
            cities: reconcile(self.current.as_ref(), self.saved.as_slice()),
            weather: self.cache.entries(),
            state: derived.state,
            advisory: derived.advisory,
            authorization: self.authorization,
        };

        self.view.send_if_modified(|published| {
            if *published == view {
                return false;
            }
            if published.state != view.state {
                tracing::info!("Content state {:?} -> {:?}", published.state, view.state);
            }
            *published = view;
            true
        });
    }
}

fn load_saved(store: &dyn PreferenceStore) -> Option<SavedCities> {
    store
        .load_cities()
        .inspect_err(|err| tracing::warn!("Failed to load saved cities: {err}"))
        .ok()
}
