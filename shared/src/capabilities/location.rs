use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::model::Coordinates;

/// Fresh-fix timeout used when the caller does not configure one.
pub const DEFAULT_FIX_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionStatus {
    NotDetermined,
    Denied,
    Granted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accuracy {
    Lowest,
    Low,
    Medium,
    High,
    Best,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRequest {
    pub accuracy: Accuracy,
    pub timeout: Duration,
}

impl FixRequest {
    pub const fn medium(timeout: Duration) -> Self {
        Self {
            accuracy: Accuracy::Medium,
            timeout,
        }
    }
}

/// Failures reported by the device positioning API.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderError {
    #[error("location feature is not enabled")]
    FeatureNotEnabled,

    #[error("location permission was revoked")]
    PermissionRevoked,

    #[error("positioning failed: {0}")]
    Failed(String),
}

/// The device positioning API, implemented by the host shell.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    async fn check_permission(&self) -> PermissionStatus;

    async fn request_permission(&self) -> PermissionStatus;

    /// A fresh fix. The provider should honour `request.timeout`; the
    /// adapter also enforces it.
    async fn current_location(
        &self,
        request: FixRequest,
    ) -> Result<Option<Coordinates>, ProviderError>;

    /// The cached fix, if the platform has one. Never waits on hardware.
    async fn last_known_location(&self) -> Result<Option<Coordinates>, ProviderError>;
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcquireError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location services disabled")]
    ServicesDisabled,
    #[error("location unavailable")]
    Unavailable,
}

/// Why the fresh-fix attempt produced nothing before the cached fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FreshFixFailure {
    ServicesDisabled,
    Failed,
}

impl FreshFixFailure {
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::ServicesDisabled => "Location services disabled.",
            Self::Failed => "Failed to get active location.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixSource {
    Fresh,
    LastKnown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Acquisition {
    pub coordinates: Coordinates,
    pub source: FixSource,
    /// Set when the fix came from the cache because the fresh attempt failed.
    pub fresh_failure: Option<FreshFixFailure>,
}

/// Permission check, fresh fix with timeout, then cached fix.
///
/// Every provider condition resolves to an [`Acquisition`] or one of the
/// three [`AcquireError`] outcomes; nothing the provider does escapes as a
/// panic or a raw provider error.
#[derive(Clone)]
pub struct LocationAcquirer {
    provider: Arc<dyn LocationProvider>,
}

impl std::fmt::Debug for LocationAcquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationAcquirer")
            .field("provider", &"<dyn LocationProvider>")
            .finish()
    }
}

impl LocationAcquirer {
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        Self { provider }
    }

    #[instrument(skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    pub async fn acquire(&self, timeout: Duration) -> Result<Acquisition, AcquireError> {
        self.ensure_permission().await?;

        let (fresh, fresh_failure) = self.fresh_fix(timeout).await;
        if let Some(coordinates) = fresh {
            info!("fresh fix acquired");
            return Ok(Acquisition {
                coordinates,
                source: FixSource::Fresh,
                fresh_failure: None,
            });
        }

        match self.provider.last_known_location().await {
            Ok(Some(coordinates))
                if Coordinates::validated(coordinates.latitude, coordinates.longitude).is_ok() =>
            {
                info!(?fresh_failure, "using last known fix");
                Ok(Acquisition {
                    coordinates,
                    source: FixSource::LastKnown,
                    fresh_failure,
                })
            }
            Ok(_) => {
                warn!(?fresh_failure, "no fix available");
                Err(Self::no_fix_error(fresh_failure))
            }
            Err(e) => {
                warn!(error = %e, ?fresh_failure, "last known fix failed");
                Err(Self::no_fix_error(fresh_failure))
            }
        }
    }

    async fn ensure_permission(&self) -> Result<(), AcquireError> {
        let mut status = self.provider.check_permission().await;
        if status != PermissionStatus::Granted {
            debug!(?status, "requesting location permission");
            status = self.provider.request_permission().await;
        }
        if status == PermissionStatus::Granted {
            Ok(())
        } else {
            warn!(?status, "location permission not granted");
            Err(AcquireError::PermissionDenied)
        }
    }

    async fn fresh_fix(
        &self,
        timeout: Duration,
    ) -> (Option<Coordinates>, Option<FreshFixFailure>) {
        let request = FixRequest::medium(timeout);
        match tokio::time::timeout(timeout, self.provider.current_location(request)).await {
            Ok(Ok(Some(c))) if Coordinates::validated(c.latitude, c.longitude).is_ok() => {
                (Some(c), None)
            }
            Ok(Ok(Some(c))) => {
                warn!(
                    latitude = c.latitude,
                    longitude = c.longitude,
                    "provider returned invalid fix"
                );
                (None, Some(FreshFixFailure::Failed))
            }
            Ok(Ok(None)) => (None, None),
            Ok(Err(ProviderError::FeatureNotEnabled)) => {
                (None, Some(FreshFixFailure::ServicesDisabled))
            }
            Ok(Err(e)) => {
                debug!(error = %e, "fresh fix failed");
                (None, Some(FreshFixFailure::Failed))
            }
            // A request that runs out of time yields no fix, same as the
            // platform API does; only the cached fallback remains.
            Err(_) => {
                debug!("fresh fix timed out");
                (None, None)
            }
        }
    }

    fn no_fix_error(fresh_failure: Option<FreshFixFailure>) -> AcquireError {
        match fresh_failure {
            Some(FreshFixFailure::ServicesDisabled) => AcquireError::ServicesDisabled,
            _ => AcquireError::Unavailable,
        }
    }
}
