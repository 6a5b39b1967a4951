use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::capabilities::geocode::GeocodeError;
use crate::capabilities::location::AcquireError;
use crate::config::ConfigError;
use crate::form::FormError;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    LocationPermissionDenied,
    LocationServicesDisabled,
    LocationUnavailable,
    Validation,
    Storage,
    Launcher,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::LocationPermissionDenied => "LOCATION_PERMISSION_DENIED",
            Self::LocationServicesDisabled => "LOCATION_SERVICES_DISABLED",
            Self::LocationUnavailable => "LOCATION_UNAVAILABLE",
            Self::Validation => "VALIDATION_ERROR",
            Self::Storage => "STORAGE_ERROR",
            Self::Launcher => "LAUNCHER_ERROR",
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::LocationUnavailable | Self::Storage | Self::Launcher
        )
    }
}

/// A workflow fault after it has been caught at the workflow boundary.
///
/// Nothing past the view model sees a raw collaborator error: it sees the
/// kind and the text produced by [`AppError::user_facing_message`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Status text shown to the user for this fault.
    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::LocationPermissionDenied => {
                "Location permission denied. Please enable location access in Settings.".into()
            }
            ErrorKind::LocationServicesDisabled => "Location services disabled.".into(),
            ErrorKind::LocationUnavailable => "Location not available.".into(),
            ErrorKind::Validation | ErrorKind::Storage | ErrorKind::Launcher => {
                self.message.clone()
            }
        }
    }

    /// Wraps a store failure with the workflow's status prefix, keeping the
    /// underlying cause in the text as the status line always has.
    #[must_use]
    pub fn storage(prefix: &str, error: &StoreError) -> Self {
        Self::new(ErrorKind::Storage, format!("{prefix}: {error}"))
            .with_internal(format!("{error:?}"))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<AcquireError> for AppError {
    fn from(e: AcquireError) -> Self {
        let kind = match e {
            AcquireError::PermissionDenied => ErrorKind::LocationPermissionDenied,
            AcquireError::ServicesDisabled => ErrorKind::LocationServicesDisabled,
            AcquireError::Unavailable => ErrorKind::LocationUnavailable,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<FormError> for AppError {
    fn from(e: FormError) -> Self {
        AppError::new(ErrorKind::Validation, e.user_message())
            .with_context("reason", format!("{e:?}"))
    }
}

/// Failures while wiring the view model from configuration at process start.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("geocoder error: {0}")]
    Geocoder(#[from] GeocodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_errors_map_to_location_kinds() {
        assert_eq!(
            AppError::from(AcquireError::PermissionDenied).kind,
            ErrorKind::LocationPermissionDenied
        );
        assert_eq!(
            AppError::from(AcquireError::ServicesDisabled).user_facing_message(),
            "Location services disabled."
        );
        assert_eq!(
            AppError::from(AcquireError::Unavailable).user_facing_message(),
            "Location not available."
        );
    }

    #[test]
    fn validation_errors_keep_field_message() {
        let err = AppError::from(FormError::MissingLatitude);
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.user_facing_message(), FormError::MissingLatitude.user_message());
        assert_eq!(err.context.get("reason").map(String::as_str), Some("MissingLatitude"));
    }

    #[test]
    fn storage_error_message_carries_prefix() {
        let err = AppError::storage(
            "Error loading locations",
            &StoreError::Unavailable("disk gone".into()),
        );
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert!(err.is_retryable());
        assert_eq!(
            err.user_facing_message(),
            "Error loading locations: store unavailable: disk gone"
        );
    }

    #[test]
    fn display_includes_code_and_internal() {
        let err = AppError::new(ErrorKind::Launcher, "no maps app").with_internal("exit 1");
        assert_eq!(err.to_string(), "[LAUNCHER_ERROR] no maps app (internal: exit 1)");
    }
}
