pub mod geocode;
pub mod launcher;
pub mod location;

pub use self::geocode::{AzureMapsGeocoder, DisabledGeocoder, GeocodeError, ReverseGeocoder};
pub use self::launcher::{directions_uri, LaunchError, MapsLauncher, DIRECTIONS_BASE_URL};
pub use self::location::{
    AcquireError, Acquisition, FixRequest, FixSource, FreshFixFailure, LocationAcquirer,
    LocationProvider, PermissionStatus, ProviderError, DEFAULT_FIX_TIMEOUT,
};
