//! Device location collaborator.
//!
//! Commands go to the provider through [`LocationProvider`]; the provider
//! reports back asynchronously by feeding [`LocationEvent`]s into the
//! coordinator handle.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::{error::LocationError, model::Coordinates};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    #[default]
    NotDetermined,
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    /// A new fix, or `None` when the provider lost its position.
    Updated(Option<Coordinates>),
    AuthorizationChanged(AuthorizationStatus),
    Failed(LocationError),
}

pub trait LocationProvider: Send + Sync + Debug {
    fn authorization_status(&self) -> AuthorizationStatus;
    fn request_authorization(&self);
    fn start_updating(&self);
    fn stop_updating(&self);
}
