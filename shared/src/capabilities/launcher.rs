use thiserror::Error;
use url::Url;

use crate::model::Coordinates;

/// Driving directions in an external maps application.
pub const DIRECTIONS_BASE_URL: &str = "https://www.google.com/maps/dir/?api=1";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("invalid directions uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("no application can open {uri}")]
    Unavailable { uri: String },
}

/// Opens a URI in whatever application the host has registered for it.
#[async_trait::async_trait]
pub trait MapsLauncher: Send + Sync {
    async fn open(&self, uri: &Url) -> Result<(), LaunchError>;
}

/// `origin=<lat>,<lon>&destination=<lat>,<lon>&travelmode=driving`
///
/// Coordinates are written with `.` decimals and the comma between them is
/// left unescaped.
#[must_use]
pub fn directions_query(origin: Coordinates, destination: Coordinates) -> String {
    format!(
        "origin={}&destination={}&travelmode=driving",
        origin.query_text(),
        destination.query_text()
    )
}

pub fn directions_uri(origin: Coordinates, destination: Coordinates) -> Result<Url, LaunchError> {
    let uri = format!(
        "{DIRECTIONS_BASE_URL}&{}",
        directions_query(origin, destination)
    );
    Ok(Url::parse(&uri)?)
}
