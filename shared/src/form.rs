use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CoordinateError, Coordinates};

/// Why a form submission was rejected. Checked in declaration order, so an
/// empty name wins over every other problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum FormError {
    #[error("name is missing")]
    MissingName,
    #[error("latitude is missing")]
    MissingLatitude,
    #[error("longitude is missing")]
    MissingLongitude,
    #[error("latitude is not a number")]
    InvalidLatitudeFormat,
    #[error("longitude is not a number")]
    InvalidLongitudeFormat,
    #[error("latitude is outside -90..90")]
    LatitudeOutOfRange,
    #[error("longitude is outside -180..180")]
    LongitudeOutOfRange,
}

impl From<CoordinateError> for FormError {
    fn from(e: CoordinateError) -> Self {
        match e {
            CoordinateError::LatitudeOutOfRange(_) => Self::LatitudeOutOfRange,
            CoordinateError::LongitudeOutOfRange(_) => Self::LongitudeOutOfRange,
            // parse_decimal never yields NaN or infinity
            CoordinateError::NonFinite => Self::InvalidLatitudeFormat,
        }
    }
}

impl FormError {
    /// Field-specific status line for the user.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::MissingName => "Please enter a name for the location.",
            Self::MissingLatitude => "Please enter a latitude.",
            Self::MissingLongitude => "Please enter a longitude.",
            Self::InvalidLatitudeFormat => "Invalid latitude.",
            Self::InvalidLongitudeFormat => "Invalid longitude.",
            Self::LatitudeOutOfRange => "Latitude must be between -90 and 90.",
            Self::LongitudeOutOfRange => "Longitude must be between -180 and 180.",
        }
    }
}

/// Raw, unvalidated input of the add-location form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryForm {
    pub name: String,
    pub latitude: String,
    pub longitude: String,
}

impl EntryForm {
    pub fn new(
        name: impl Into<String>,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            latitude: latitude.into(),
            longitude: longitude.into(),
        }
    }

    pub fn validate(&self) -> Result<ValidatedEntry, FormError> {
        validate_entry(&self.name, &self.latitude, &self.longitude)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedEntry {
    pub name: String,
    pub coordinates: Coordinates,
}

pub fn validate_entry(
    name: &str,
    latitude: &str,
    longitude: &str,
) -> Result<ValidatedEntry, FormError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FormError::MissingName);
    }
    if latitude.trim().is_empty() {
        return Err(FormError::MissingLatitude);
    }
    if longitude.trim().is_empty() {
        return Err(FormError::MissingLongitude);
    }

    let lat = parse_decimal(latitude).ok_or(FormError::InvalidLatitudeFormat)?;
    let lon = parse_decimal(longitude).ok_or(FormError::InvalidLongitudeFormat)?;

    Ok(ValidatedEntry {
        name: name.to_string(),
        coordinates: Coordinates::validated(lat, lon)?,
    })
}

/// Parses a decimal number typed by a user. Accepts `,` as the decimal
/// separator and U+2212 as a minus sign. NaN and infinities are rejected.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let normalised: String = text
        .trim()
        .chars()
        .map(|c| match c {
            ',' => '.',
            '\u{2212}' => '-',
            other => other,
        })
        .collect();

    normalised
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
