use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use url::Url;

#[cfg(not(target_arch = "wasm32"))]
use crate::capabilities::geocode::{AzureMapsGeocoder, DisabledGeocoder};
use crate::capabilities::geocode::ReverseGeocoder;
use crate::capabilities::launcher::{directions_uri, MapsLauncher};
use crate::capabilities::location::{LocationAcquirer, LocationProvider, DEFAULT_FIX_TIMEOUT};
use crate::error::{AppError, ErrorKind};
use crate::form::{EntryForm, FormError};
use crate::model::{Coordinates, LocationRecord, NewLocation};
use crate::notify::{ChangeNotifier, ChangeSet, Field};
use crate::points::PointOfInterest;
use crate::store::LocationStore;

pub const BUSY_TEXT: &str = "Retrieving location...";
pub const PROMPT_TEXT: &str = "Tap 'My Location' to fetch.";
pub const NO_ROUTE_ORIGIN_TEXT: &str = "Unable to determine current location.";

const ADD_FAILED_PREFIX: &str = "Error adding location";
const LOAD_FAILED_PREFIX: &str = "Error loading locations";
const DELETE_FAILED_PREFIX: &str = "Error deleting location";

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub is_busy: bool,
    pub current_coordinates: Option<Coordinates>,
    pub address: Option<String>,
    pub status_message: Option<String>,
    /// Highest id first, as the store lists them.
    pub saved_locations: Vec<LocationRecord>,
    pub new_entry: EntryForm,
}

impl ViewState {
    /// Busy, then status, then the prompt, then address and coordinates.
    pub fn display_text(&self) -> String {
        if self.is_busy {
            return BUSY_TEXT.to_string();
        }
        if let Some(status) = non_blank(self.status_message.as_deref()) {
            return status.to_string();
        }
        let Some(coordinates) = self.current_coordinates else {
            return PROMPT_TEXT.to_string();
        };
        match non_blank(self.address.as_deref()) {
            Some(address) => format!("{address}\n{coordinates}"),
            None => coordinates.to_string(),
        }
    }

    pub fn can_execute(&self, command: Command) -> bool {
        match command {
            Command::AcquireLocation | Command::RouteTo => !self.is_busy,
            Command::AddLocation | Command::DeleteLocation | Command::LoadLocations => true,
        }
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    AcquireLocation,
    AddLocation,
    DeleteLocation,
    LoadLocations,
    RouteTo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    Acquired {
        coordinates: Coordinates,
        address: Option<String>,
    },
    /// Another acquisition was already in flight; nothing was changed.
    AlreadyRunning,
    Failed(ErrorKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added { name: String },
    Rejected(FormError),
    Failed(ErrorKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted,
    NoRecord,
    Failed(ErrorKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded { count: usize },
    Failed(ErrorKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Launched(Url),
    AlreadyRunning,
    NoLocation,
    /// The launcher refused the URI. Logged only; the view state is untouched.
    LaunchFailed,
}

/// The collaborators a view model runs against.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn LocationStore>,
    pub locator: Arc<dyn LocationProvider>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
    pub launcher: Arc<dyn MapsLauncher>,
}

/// Setters that record what actually changed.
struct Tracked<'a> {
    state: &'a mut ViewState,
    changes: ChangeSet,
}

impl Tracked<'_> {
    fn set_busy(&mut self, busy: bool) {
        if self.state.is_busy != busy {
            self.state.is_busy = busy;
            self.changes.push(Field::IsBusy);
        }
    }

    fn set_coordinates(&mut self, coordinates: Option<Coordinates>) {
        if self.state.current_coordinates != coordinates {
            self.state.current_coordinates = coordinates;
            self.changes.push(Field::CurrentCoordinates);
        }
    }

    fn set_address(&mut self, address: Option<String>) {
        if self.state.address != address {
            self.state.address = address;
            self.changes.push(Field::Address);
        }
    }

    fn set_status(&mut self, status: Option<String>) {
        if self.state.status_message != status {
            self.state.status_message = status;
            self.changes.push(Field::StatusMessage);
        }
    }

    fn set_saved(&mut self, records: Vec<LocationRecord>) {
        if self.state.saved_locations != records {
            self.state.saved_locations = records;
            self.changes.push(Field::SavedLocations);
        }
    }

    fn remove_saved(&mut self, record: &LocationRecord) {
        let before = self.state.saved_locations.len();
        self.state.saved_locations.retain(|r| r.id != record.id);
        if self.state.saved_locations.len() != before {
            self.changes.push(Field::SavedLocations);
        }
    }

    fn set_entry_name(&mut self, name: String) {
        if self.state.new_entry.name != name {
            self.state.new_entry.name = name;
            self.changes.push(Field::NewEntryName);
        }
    }

    fn set_entry_latitude(&mut self, latitude: String) {
        if self.state.new_entry.latitude != latitude {
            self.state.new_entry.latitude = latitude;
            self.changes.push(Field::NewEntryLatitude);
        }
    }

    fn set_entry_longitude(&mut self, longitude: String) {
        if self.state.new_entry.longitude != longitude {
            self.state.new_entry.longitude = longitude;
            self.changes.push(Field::NewEntryLongitude);
        }
    }

    fn clear_entry(&mut self) {
        self.set_entry_name(String::new());
        self.set_entry_latitude(String::new());
        self.set_entry_longitude(String::new());
    }
}

/// Clears the busy gate however the acquisition ends, including when its
/// future is dropped mid-flight.
struct BusyGuard<'a> {
    model: &'a ViewModel,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.model.update(|s| s.set_busy(false));
        self.model.busy.store(false, Ordering::SeqCst);
    }
}

pub struct ViewModel {
    store: Arc<dyn LocationStore>,
    acquirer: LocationAcquirer,
    geocoder: Arc<dyn ReverseGeocoder>,
    launcher: Arc<dyn MapsLauncher>,
    fix_timeout: Duration,
    state: Mutex<ViewState>,
    busy: AtomicBool,
    /// Serializes store workflows so the saved list reflects the latest
    /// completed store call. Acquisition is gated by `busy` alone.
    workflow: tokio::sync::Mutex<()>,
    notifier: ChangeNotifier,
}

impl std::fmt::Debug for ViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewModel")
            .field("fix_timeout", &self.fix_timeout)
            .field("state", &*self.lock_state())
            .finish_non_exhaustive()
    }
}

impl ViewModel {
    pub fn new(services: Services) -> Self {
        Self {
            store: services.store,
            acquirer: LocationAcquirer::new(services.locator),
            geocoder: services.geocoder,
            launcher: services.launcher,
            fix_timeout: DEFAULT_FIX_TIMEOUT,
            state: Mutex::new(ViewState::default()),
            busy: AtomicBool::new(false),
            workflow: tokio::sync::Mutex::new(()),
            notifier: ChangeNotifier::new(),
        }
    }

    #[must_use]
    pub fn with_fix_timeout(mut self, timeout: Duration) -> Self {
        self.fix_timeout = timeout;
        self
    }

    /// Wires the SQLite store and the Azure Maps geocoder from configuration.
    /// Without a subscription key, fixes are kept without an address. The
    /// device-facing collaborators always come from the host.
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn from_config(
        config: &crate::config::AppConfig,
        locator: Arc<dyn LocationProvider>,
        launcher: Arc<dyn MapsLauncher>,
    ) -> Result<Self, crate::error::SetupError> {
        config.validate()?;
        let store = crate::store::SqliteLocationStore::open(&config.database_path).await?;
        let geocoder: Arc<dyn ReverseGeocoder> = if config.geocoder.api_key().is_some() {
            Arc::new(AzureMapsGeocoder::new(&config.geocoder)?)
        } else {
            warn!("no geocoder API key configured, addresses disabled");
            Arc::new(DisabledGeocoder)
        };
        Ok(Self::new(Services {
            store: Arc::new(store),
            locator,
            geocoder,
            launcher,
        })
        .with_fix_timeout(config.location_timeout()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.notifier.subscribe()
    }

    pub fn snapshot(&self) -> ViewState {
        self.lock_state().clone()
    }

    pub fn display_text(&self) -> String {
        self.lock_state().display_text()
    }

    pub fn can_execute(&self, command: Command) -> bool {
        self.lock_state().can_execute(command)
    }

    pub fn set_new_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.update(|s| s.set_entry_name(name));
    }

    pub fn set_new_latitude(&self, latitude: impl Into<String>) {
        let latitude = latitude.into();
        self.update(|s| s.set_entry_latitude(latitude));
    }

    pub fn set_new_longitude(&self, longitude: impl Into<String>) {
        let longitude = longitude.into();
        self.update(|s| s.set_entry_longitude(longitude));
    }

    /// Permission, fix, then address. Rejected while another acquisition is
    /// in flight.
    #[instrument(skip(self))]
    pub async fn acquire_location(&self) -> AcquireOutcome {
        let Some(_busy) = self.try_begin_busy() else {
            debug!("acquisition already in flight");
            return AcquireOutcome::AlreadyRunning;
        };

        self.update(|s| {
            s.set_address(None);
            s.set_status(None);
        });

        let acquisition = match self.acquirer.acquire(self.fix_timeout).await {
            Ok(acquisition) => acquisition,
            Err(e) => {
                let error = AppError::from(e);
                warn!(
                    code = error.code(),
                    retryable = error.is_retryable(),
                    "acquisition failed"
                );
                self.update(|s| s.set_status(Some(error.user_facing_message())));
                return AcquireOutcome::Failed(error.kind);
            }
        };

        let coordinates = acquisition.coordinates;
        self.update(|s| {
            if let Some(failure) = acquisition.fresh_failure {
                s.set_status(Some(failure.user_message().to_string()));
            }
            s.set_coordinates(Some(coordinates));
        });

        let address = self.geocoder.resolve(coordinates).await;
        if let Some(address) = &address {
            self.update(|s| s.set_address(Some(address.clone())));
        }

        info!(
            source = ?acquisition.source,
            has_address = address.is_some(),
            "location acquired"
        );
        AcquireOutcome::Acquired {
            coordinates,
            address,
        }
    }

    /// Validates the form, saves, then reloads the list from the store.
    #[instrument(skip(self))]
    pub async fn add_location(&self) -> AddOutcome {
        let _workflow = self.workflow.lock().await;

        let form = self.lock_state().new_entry.clone();
        let entry = match form.validate() {
            Ok(entry) => entry,
            Err(reason) => {
                debug!(?reason, "entry rejected");
                let error = AppError::from(reason);
                self.update(|s| s.set_status(Some(error.user_facing_message())));
                return AddOutcome::Rejected(reason);
            }
        };

        let location = NewLocation::new(entry.name.clone(), entry.coordinates);
        if let Err(e) = self.store.save(&location).await {
            let error = AppError::storage(ADD_FAILED_PREFIX, &e);
            warn!(error = %e, retryable = error.is_retryable(), "save failed");
            self.update(|s| s.set_status(Some(error.user_facing_message())));
            return AddOutcome::Failed(error.kind);
        }

        info!(name = %entry.name, "location added");
        self.update(|s| {
            s.set_status(Some(format!("Added '{}' successfully.", entry.name)));
            s.clear_entry();
        });
        self.reload().await;

        AddOutcome::Added { name: entry.name }
    }

    #[instrument(skip(self, record), fields(id = record.map(|r| r.id.0)))]
    pub async fn delete_location(&self, record: Option<&LocationRecord>) -> DeleteOutcome {
        let Some(record) = record else {
            return DeleteOutcome::NoRecord;
        };
        let _workflow = self.workflow.lock().await;

        if let Err(e) = self.store.delete(record.id).await {
            let error = AppError::storage(DELETE_FAILED_PREFIX, &e);
            warn!(error = %e, retryable = error.is_retryable(), "delete failed");
            self.update(|s| s.set_status(Some(error.user_facing_message())));
            return DeleteOutcome::Failed(error.kind);
        }

        info!("location deleted");
        self.update(|s| {
            s.remove_saved(record);
            s.set_status(Some(format!("Deleted '{}'.", record.name)));
        });
        DeleteOutcome::Deleted
    }

    #[instrument(skip(self))]
    pub async fn load_locations(&self) -> LoadOutcome {
        let _workflow = self.workflow.lock().await;
        self.reload().await
    }

    /// Caller holds the workflow lock.
    async fn reload(&self) -> LoadOutcome {
        match self.store.list_all().await {
            Ok(records) => {
                let count = records.len();
                debug!(count, "locations loaded");
                self.update(|s| s.set_saved(records));
                LoadOutcome::Loaded { count }
            }
            Err(e) => {
                let error = AppError::storage(LOAD_FAILED_PREFIX, &e);
                warn!(error = %e, retryable = error.is_retryable(), "load failed");
                self.update(|s| s.set_status(Some(error.user_facing_message())));
                LoadOutcome::Failed(error.kind)
            }
        }
    }

    /// Opens driving directions from the current fix to `destination`,
    /// acquiring a fix first if there is none yet.
    #[instrument(skip(self, destination), fields(destination = %destination))]
    pub async fn route_to(&self, name: &str, destination: Coordinates) -> RouteOutcome {
        if self.busy.load(Ordering::SeqCst) {
            return RouteOutcome::AlreadyRunning;
        }

        let mut origin = self.lock_state().current_coordinates;
        if origin.is_none() {
            match self.acquire_location().await {
                AcquireOutcome::AlreadyRunning => return RouteOutcome::AlreadyRunning,
                AcquireOutcome::Acquired { coordinates, .. } => origin = Some(coordinates),
                AcquireOutcome::Failed(_) => {}
            }
        }

        let Some(origin) = origin else {
            let _workflow = self.workflow.lock().await;
            self.update(|s| s.set_status(Some(NO_ROUTE_ORIGIN_TEXT.to_string())));
            return RouteOutcome::NoLocation;
        };

        let uri = match directions_uri(origin, destination) {
            Ok(uri) => uri,
            Err(e) => {
                warn!(error = %e, "could not build directions uri");
                return RouteOutcome::LaunchFailed;
            }
        };

        match self.launcher.open(&uri).await {
            Ok(()) => {
                info!(name, "directions opened");
                RouteOutcome::Launched(uri)
            }
            Err(e) => {
                warn!(name, error = %e, "could not open directions");
                RouteOutcome::LaunchFailed
            }
        }
    }

    pub async fn route_to_point(&self, point: &PointOfInterest) -> RouteOutcome {
        self.route_to(point.name, point.coordinates).await
    }

    fn try_begin_busy(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        self.update(|s| s.set_busy(true));
        Some(BusyGuard { model: self })
    }

    fn lock_state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `f` under the state lock, then publishes what changed after
    /// the lock is released.
    fn update<R>(&self, f: impl FnOnce(&mut Tracked<'_>) -> R) -> R {
        let (result, changes) = {
            let mut state = self.lock_state();
            let mut tracked = Tracked {
                state: &mut state,
                changes: ChangeSet::new(),
            };
            let result = f(&mut tracked);
            (result, tracked.changes)
        };
        self.notifier.publish(changes);
        result
    }
}
