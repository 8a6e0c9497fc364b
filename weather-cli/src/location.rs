use tokio::sync::mpsc;
use weather_core::{AuthorizationStatus, Coordinates, LocationEvent, LocationProvider};

/// Location source for a terminal: either a fixed point given on the command
/// line, or nothing at all (reported as denied access).
#[derive(Debug)]
pub struct FixedLocation {
    coordinates: Option<Coordinates>,
    events: mpsc::UnboundedSender<LocationEvent>,
}

impl FixedLocation {
    /// Returns the provider and the receiving end of its event stream, which
    /// the caller forwards into the coordinator.
    pub fn new(
        coordinates: Option<Coordinates>,
    ) -> (Self, mpsc::UnboundedReceiver<LocationEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { coordinates, events }, rx)
    }

    fn emit(&self, event: LocationEvent) {
        let _ = self.events.send(event);
    }
}

impl LocationProvider for FixedLocation {
    fn authorization_status(&self) -> AuthorizationStatus {
        match self.coordinates {
            Some(_) => AuthorizationStatus::Granted,
            None => AuthorizationStatus::Denied,
        }
    }

    fn request_authorization(&self) {
        self.emit(LocationEvent::AuthorizationChanged(self.authorization_status()));
    }

    fn start_updating(&self) {
        if let Some(coordinates) = self.coordinates {
            self.emit(LocationEvent::Updated(Some(coordinates)));
        }
    }

    fn stop_updating(&self) {
        tracing::debug!("Location updates stopped");
    }
}
