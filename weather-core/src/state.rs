//! Top-level content state, derived level-triggered from current signals.
//!
//! Nothing here remembers previous states: the coordinator recomputes the
//! state from scratch whenever one of its inputs changes.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ContentState {
    #[default]
    RequestingLocation,
    LocationError(String),
    Error(String),
    Loading,
    Ready,
}

const PERMISSION_HINTS: &[&str] = &["permission", "denied", "not authorized", "settings"];

impl ContentState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ContentState::Ready)
    }

    /// Full-screen error with a retry action.
    pub fn blocking_message(&self) -> Option<&str> {
        match self {
            ContentState::LocationError(msg) | ContentState::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// Whether the blocking error reads like a permission problem, in which
    /// case an "open settings" action is offered next to retry.
    pub fn offers_settings_action(&self) -> bool {
        self.blocking_message().is_some_and(|msg| {
            let lower = msg.to_lowercase();
            PERMISSION_HINTS.iter().any(|hint| lower.contains(hint))
        })
    }
}

/// Inputs to [`derive`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Signals<'a> {
    pub has_location: bool,
    pub location_error: Option<&'a str>,
    pub weather_error: Option<&'a str>,
    pub has_saved_cities: bool,
    pub current_weather_ready: bool,
    pub settled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Derived {
    pub state: ContentState,
    /// Error demoted to a non-blocking message because saved cities exist.
    pub advisory: Option<String>,
}

impl Derived {
    fn state(state: ContentState) -> Self {
        Self { state, advisory: None }
    }
}

/// First matching rule wins:
/// 1. location error: advisory with saved cities, else `LocationError`
/// 2. no location and no saved cities: `RequestingLocation`
/// 3. weather error: advisory with saved cities, else `Error`
/// 4. saved cities: `Ready`
/// 5. current weather missing or not settled: `Loading`
/// 6. `Ready`
pub fn derive(signals: &Signals<'_>) -> Derived {
    let mut advisory = None;

    if let Some(msg) = signals.location_error {
        if !signals.has_saved_cities {
            return Derived::state(ContentState::LocationError(msg.to_string()));
        }
        advisory = Some(msg.to_string());
    }

    if !signals.has_location && !signals.has_saved_cities {
        return Derived::state(ContentState::RequestingLocation);
    }

    if let Some(msg) = signals.weather_error {
        if !signals.has_saved_cities {
            return Derived::state(ContentState::Error(msg.to_string()));
        }
        advisory.get_or_insert_with(|| msg.to_string());
    }

    if signals.has_saved_cities {
        return Derived { state: ContentState::Ready, advisory };
    }

    if !signals.current_weather_ready || !signals.settled {
        return Derived::state(ContentState::Loading);
    }

    Derived::state(ContentState::Ready)
}
