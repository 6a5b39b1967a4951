use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::GeocoderConfig;
use crate::model::Coordinates;

pub const DEFAULT_USER_AGENT: &str = "location-core/0.1";

/// Best-effort address lookup. Failures never reach the caller; they are
/// logged and collapsed to `None`.
#[async_trait::async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Free-form address of the first candidate, if the lookup produced one.
    async fn resolve(&self, at: Coordinates) -> Option<String>;
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder API key is not configured")]
    MissingApiKey,

    #[error("invalid geocoder url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("geocoder returned HTTP {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response has no free-form address")]
    MissingAddress,
}

/// Body of a reverse address search.
#[derive(Debug, Deserialize)]
pub struct ReverseSearchResponse {
    #[serde(default)]
    pub addresses: Vec<AddressCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct AddressCandidate {
    #[serde(default)]
    pub address: Option<AddressFields>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressFields {
    #[serde(default)]
    pub freeform_address: Option<String>,
}

impl ReverseSearchResponse {
    /// Only the first candidate is considered. Blank text counts as absent.
    #[must_use]
    pub fn first_freeform_address(&self) -> Option<String> {
        self.addresses
            .first()?
            .address
            .as_ref()?
            .freeform_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug)]
pub struct AzureMapsGeocoder {
    client: Client,
    base_url: Url,
    api_version: String,
    api_key: SecretString,
}

impl AzureMapsGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let api_key = config.api_key().ok_or(GeocodeError::MissingApiKey)?;
        let base_url = Url::parse(&config.base_url)?;
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .connect_timeout(config.timeout())
            .timeout(config.timeout())
            .build()
            .map_err(GeocodeError::Client)?;

        Ok(Self {
            client,
            base_url,
            api_version: config.api_version.clone(),
            api_key: SecretString::new(api_key.expose_secret().clone()),
        })
    }

    /// `<base>?api-version=..&query=<lat>,<lon>&subscription-key=..`
    pub fn request_url(&self, at: Coordinates) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version)
            .append_pair("query", &at.query_text())
            .append_pair("subscription-key", self.api_key.expose_secret());
        url
    }

    /// One lookup, with the failure cause preserved.
    #[instrument(skip(self))]
    pub async fn lookup(&self, at: Coordinates) -> Result<String, GeocodeError> {
        // Transport errors carry the request URL, which holds the key.
        let response = self
            .client
            .get(self.request_url(at))
            .send()
            .await
            .map_err(|e| GeocodeError::Transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GeocodeError::Transport(e.without_url()))?;
        let parsed: ReverseSearchResponse = serde_json::from_str(&body)?;
        parsed
            .first_freeform_address()
            .ok_or(GeocodeError::MissingAddress)
    }
}

#[async_trait::async_trait]
impl ReverseGeocoder for AzureMapsGeocoder {
    async fn resolve(&self, at: Coordinates) -> Option<String> {
        match self.lookup(at).await {
            Ok(address) => Some(address),
            Err(GeocodeError::MissingAddress) => {
                debug!("no address for fix");
                None
            }
            Err(e) => {
                warn!(error = %e, "reverse geocoding failed");
                None
            }
        }
    }
}

/// Stands in when no subscription key is configured: every fix stays
/// without an address.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGeocoder;

#[async_trait::async_trait]
impl ReverseGeocoder for DisabledGeocoder {
    async fn resolve(&self, _at: Coordinates) -> Option<String> {
        None
    }
}
