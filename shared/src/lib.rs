// lib.rs - Location capture and persistence core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod config;
pub mod error;
pub mod form;
pub mod model;
pub mod notify;
pub mod points;
pub mod store;
pub mod testing;
pub mod view;

pub use capabilities::{
    AcquireError, LocationProvider, MapsLauncher, PermissionStatus, ProviderError,
    ReverseGeocoder,
};
pub use config::{AppConfig, ConfigError, GeocoderConfig};
pub use error::{AppError, ErrorKind, SetupError};
pub use form::{validate_entry, EntryForm, FormError, ValidatedEntry};
pub use model::{Coordinates, LocationRecord, NewLocation, RecordId, UnixTimeMs};
pub use notify::{ChangeNotifier, ChangeSet, Field};
pub use points::{PointOfInterest, POINTS_OF_INTEREST};
pub use store::{InMemoryLocationStore, LocationStore, StoreError};
#[cfg(not(target_arch = "wasm32"))]
pub use store::SqliteLocationStore;
pub use view::{
    AcquireOutcome, AddOutcome, Command, DeleteOutcome, LoadOutcome, RouteOutcome, Services,
    ViewModel, ViewState,
};
