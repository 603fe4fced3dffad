//! Push-style device position updates.
//!
//! A registration yields a [`LocationUpdates`] stream that delivers zero or
//! more fixes over its lifetime. Dropping the stream deregisters. Fixes are
//! not deduplicated or debounced.

use std::{fmt::Debug, time::Duration};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    error::LocationError,
    model::{Coordinates, Fix},
};

/// Power/accuracy trade-off requested from the location source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    HighAccuracy,
    /// Favours battery over fix latency; the default.
    #[default]
    BalancedPowerAccuracy,
    LowPower,
    /// Only fixes other clients requested.
    Passive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequest {
    pub priority: Priority,
    pub interval: Duration,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self { priority: Priority::default(), interval: Duration::from_secs(10) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    Granted,
    #[default]
    Denied,
}

/// OS-level prerequisites for acquiring a position, supplied by the host
/// (settings screen, permission dialog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocationServices {
    pub enabled: bool,
    pub permission: Permission,
}

impl LocationServices {
    pub fn ready() -> Self {
        Self { enabled: true, permission: Permission::Granted }
    }

    /// Disabled services are reported before a denied permission.
    pub fn ensure_ready(&self) -> Result<(), LocationError> {
        if !self.enabled {
            return Err(LocationError::ServicesDisabled);
        }
        if self.permission == Permission::Denied {
            return Err(LocationError::PermissionDenied);
        }
        Ok(())
    }
}

/// Stream of fixes from one registration.
#[derive(Debug)]
pub struct LocationUpdates {
    rx: mpsc::Receiver<Fix>,
}

impl LocationUpdates {
    pub fn new(rx: mpsc::Receiver<Fix>) -> Self {
        Self { rx }
    }

    /// Next fix, or `None` once the source has stopped.
    pub async fn next(&mut self) -> Option<Fix> {
        self.rx.recv().await
    }
}

pub trait LocationProvider: Send + Sync + Debug {
    fn services(&self) -> LocationServices;

    /// Starts delivering fixes. Called only once the prerequisites hold.
    fn register(&self, request: LocationRequest) -> Result<LocationUpdates, LocationError>;

    fn request_location_updates(
        &self,
        request: LocationRequest,
    ) -> Result<LocationUpdates, LocationError> {
        if let Err(e) = self.services().ensure_ready() {
            warn!(error = %e, "location updates not started");
            return Err(e);
        }
        self.register(request)
    }
}

/// Replays a fixed list of positions, the first immediately and the rest one
/// per request interval.
///
/// Must be registered from inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct StaticLocationProvider {
    positions: Vec<Coordinates>,
    services: LocationServices,
}

impl StaticLocationProvider {
    pub fn new(positions: Vec<Coordinates>) -> Self {
        Self { positions, services: LocationServices::ready() }
    }

    pub fn with_services(mut self, services: LocationServices) -> Self {
        self.services = services;
        self
    }
}

impl LocationProvider for StaticLocationProvider {
    fn services(&self) -> LocationServices {
        self.services
    }

    fn register(&self, request: LocationRequest) -> Result<LocationUpdates, LocationError> {
        if let Some(bad) = self.positions.iter().find(|c| !c.is_valid()) {
            return Err(LocationError::InvalidRequest(format!("invalid position {bad}")));
        }

        info!(
            priority = ?request.priority,
            interval_ms = request.interval.as_millis() as u64,
            positions = self.positions.len(),
            "registering for location updates"
        );

        let (tx, rx) = mpsc::channel(self.positions.len().max(1));
        let positions = self.positions.clone();

        tokio::spawn(async move {
            for (i, coordinates) in positions.into_iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(request.interval).await;
                }
                let fix = Fix::now(coordinates);
                debug!(latitude = coordinates.latitude, longitude = coordinates.longitude, "fix");
                if tx.send(fix).await.is_err() {
                    debug!("location updates dropped; stopping");
                    return;
                }
            }
        });

        Ok(LocationUpdates::new(rx))
    }
}
