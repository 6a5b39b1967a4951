use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use url::Url;

use crate::capabilities::geocode::ReverseGeocoder;
use crate::capabilities::launcher::{LaunchError, MapsLauncher};
use crate::capabilities::location::{FixRequest, LocationProvider, PermissionStatus, ProviderError};
use crate::model::Coordinates;

type FixResult = Result<Option<Coordinates>, ProviderError>;

/// Location provider that replays configured answers.
#[derive(Debug)]
pub struct ScriptedLocationProvider {
    permission: Mutex<PermissionStatus>,
    request_answer: PermissionStatus,
    current: Mutex<FixResult>,
    current_delay: Option<Duration>,
    hold: Option<Arc<Notify>>,
    last_known: Mutex<FixResult>,
    permission_requests: AtomicUsize,
    current_calls: AtomicUsize,
    last_known_calls: AtomicUsize,
}

impl ScriptedLocationProvider {
    /// `initial` is what a permission check reports before any request;
    /// `on_request` is what the user answers when asked.
    pub fn new(initial: PermissionStatus, on_request: PermissionStatus) -> Self {
        Self {
            permission: Mutex::new(initial),
            request_answer: on_request,
            current: Mutex::new(Ok(None)),
            current_delay: None,
            hold: None,
            last_known: Mutex::new(Ok(None)),
            permission_requests: AtomicUsize::new(0),
            current_calls: AtomicUsize::new(0),
            last_known_calls: AtomicUsize::new(0),
        }
    }

    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted, PermissionStatus::Granted)
    }

    #[must_use]
    pub fn with_current(self, result: FixResult) -> Self {
        *lock(&self.current) = result;
        self
    }

    #[must_use]
    pub fn with_last_known(self, result: FixResult) -> Self {
        *lock(&self.last_known) = result;
        self
    }

    #[must_use]
    pub fn with_current_delay(mut self, delay: Duration) -> Self {
        self.current_delay = Some(delay);
        self
    }

    /// Fresh-fix calls park until `notify` is signalled.
    #[must_use]
    pub fn with_hold(mut self, notify: Arc<Notify>) -> Self {
        self.hold = Some(notify);
        self
    }

    pub fn set_current(&self, result: FixResult) {
        *lock(&self.current) = result;
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn last_known_calls(&self) -> usize {
        self.last_known_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LocationProvider for ScriptedLocationProvider {
    async fn check_permission(&self) -> PermissionStatus {
        *lock(&self.permission)
    }

    async fn request_permission(&self) -> PermissionStatus {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        *lock(&self.permission) = self.request_answer;
        self.request_answer
    }

    async fn current_location(&self, _request: FixRequest) -> FixResult {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hold) = &self.hold {
            hold.notified().await;
        }
        if let Some(delay) = self.current_delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.current).clone()
    }

    async fn last_known_location(&self) -> FixResult {
        self.last_known_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.last_known).clone()
    }
}

/// Geocoder that always answers with the same address (or none).
#[derive(Debug, Default)]
pub struct StubGeocoder {
    address: Option<String>,
    calls: AtomicUsize,
}

impl StubGeocoder {
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ReverseGeocoder for StubGeocoder {
    async fn resolve(&self, _at: Coordinates) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.address.clone()
    }
}

/// Launcher that records every URI it is asked to open.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    opened: Mutex<Vec<Url>>,
    fail: bool,
}

impl RecordingLauncher {
    pub fn failing() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn opened(&self) -> Vec<Url> {
        lock(&self.opened).clone()
    }
}

#[async_trait::async_trait]
impl MapsLauncher for RecordingLauncher {
    async fn open(&self, uri: &Url) -> Result<(), LaunchError> {
        if self.fail {
            return Err(LaunchError::Unavailable {
                uri: uri.to_string(),
            });
        }
        lock(&self.opened).push(uri.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
