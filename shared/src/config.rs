use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_DATABASE_PATH: &str = "locations.db";
pub const DEFAULT_CONFIG_FILE: &str = "locations";
pub const ENV_PREFIX: &str = "LOCATIONS";
pub const DEFAULT_GEOCODER_URL: &str = "https://atlas.microsoft.com/search/address/reverse/json";
pub const DEFAULT_GEOCODER_API_VERSION: &str = "1.0";
const DEFAULT_LOCATION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_GEOCODER_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

fn default_location_timeout_secs() -> u64 {
    DEFAULT_LOCATION_TIMEOUT_SECS
}

fn default_geocoder_url() -> String {
    DEFAULT_GEOCODER_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_GEOCODER_API_VERSION.to_string()
}

fn default_geocoder_timeout_secs() -> u64 {
    DEFAULT_GEOCODER_TIMEOUT_SECS
}

#[derive(Debug, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Subscription key. Never logged.
    #[serde(default)]
    pub api_key: Option<SecretString>,

    #[serde(default = "default_geocoder_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_url(),
            api_version: default_api_version(),
            api_key: None,
            timeout_secs: default_geocoder_timeout_secs(),
        }
    }
}

impl GeocoderConfig {
    pub fn new(base_url: impl Into<String>, api_key: &str) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: Some(SecretString::new(api_key.to_string())),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The subscription key, if one is configured and not blank.
    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key
            .as_ref()
            .filter(|key| !key.expose_secret().trim().is_empty())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Validation(format!("geocoder.base_url is not a URL: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "geocoder.base_url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.api_version.trim().is_empty() {
            return Err(ConfigError::Validation(
                "geocoder.api_version must not be empty".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "geocoder.timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Bound on the fresh-fix attempt.
    #[serde(default = "default_location_timeout_secs")]
    pub location_timeout_secs: u64,

    #[serde(default)]
    pub geocoder: GeocoderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            location_timeout_secs: default_location_timeout_secs(),
            geocoder: GeocoderConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `locations.toml` from the working directory if present,
    /// then `LOCATIONS__*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(File::with_name(DEFAULT_CONFIG_FILE).required(false))
    }

    /// Loads from an explicit file, which must exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::build(File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = Config::builder()
            .set_default("database_path", DEFAULT_DATABASE_PATH)?
            .set_default("location_timeout_secs", DEFAULT_LOCATION_TIMEOUT_SECS as i64)?
            .set_default("geocoder.base_url", DEFAULT_GEOCODER_URL)?
            .set_default("geocoder.api_version", DEFAULT_GEOCODER_API_VERSION)?
            .set_default("geocoder.timeout_secs", DEFAULT_GEOCODER_TIMEOUT_SECS as i64)?
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        info!(
            database = %loaded.database_path.display(),
            location_timeout_secs = loaded.location_timeout_secs,
            geocoder = %loaded.geocoder.base_url,
            "configuration loaded"
        );
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "database_path must not be empty".into(),
            ));
        }
        if self.location_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "location_timeout_secs must be greater than zero".into(),
            ));
        }
        self.geocoder.validate()
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, PoisonError};

    // Every loader reads the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_guard() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn valid() -> AppConfig {
        AppConfig {
            geocoder: GeocoderConfig::new(DEFAULT_GEOCODER_URL, "key"),
            ..AppConfig::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.database_path, PathBuf::from("locations.db"));
        assert_eq!(config.location_timeout(), Duration::from_secs(10));
        assert_eq!(config.geocoder.timeout(), Duration::from_secs(15));
        assert_eq!(config.geocoder.api_version, "1.0");
        assert_eq!(config.geocoder.base_url, DEFAULT_GEOCODER_URL);
    }

    #[test]
    fn missing_key_is_not_a_validation_error() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.geocoder.api_key().is_none());
    }

    #[test]
    fn blank_key_counts_as_absent() {
        let mut config = valid();
        config.geocoder.api_key = Some(SecretString::new("   ".into()));
        assert!(config.validate().is_ok());
        assert!(config.geocoder.api_key().is_none());
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(valid().validate().is_ok());

        let mut config = valid();
        config.location_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.database_path = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.geocoder.base_url = "ftp://example.com/reverse".into();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.geocoder.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = valid();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("\"key\""));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
database_path = "/tmp/custom.db"
location_timeout_secs = 5

[geocoder]
api_key = "file-key"
timeout_secs = 3
"#
        )
        .unwrap();

        let _env = env_guard();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/custom.db"));
        assert_eq!(config.location_timeout(), Duration::from_secs(5));
        assert_eq!(config.geocoder.timeout(), Duration::from_secs(3));
        assert_eq!(config.geocoder.base_url, DEFAULT_GEOCODER_URL);
        assert_eq!(
            config.geocoder.api_key.as_ref().map(|k| k.expose_secret().as_str()),
            Some("file-key")
        );
    }

    #[test]
    fn load_from_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let _env = env_guard();
        let result = AppConfig::load_from(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn load_from_file_without_key_is_valid() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "location_timeout_secs = 5").unwrap();

        let _env = env_guard();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.location_timeout(), Duration::from_secs(5));
        assert!(config.geocoder.api_key().is_none());
    }

    #[test]
    fn load_from_file_with_zero_timeout_is_invalid() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "location_timeout_secs = 0").unwrap();

        let _env = env_guard();
        let result = AppConfig::load_from(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn environment_overrides_defaults() {
        const VARS: [(&str, &str); 3] = [
            ("LOCATIONS__GEOCODER__API_KEY", "12345"),
            ("LOCATIONS__LOCATION_TIMEOUT_SECS", "7"),
            ("LOCATIONS__DATABASE_PATH", "/tmp/env.db"),
        ];

        let _env = env_guard();
        for (name, value) in VARS {
            std::env::set_var(name, value);
        }
        let result = AppConfig::load();
        for (name, _) in VARS {
            std::env::remove_var(name);
        }

        let config = result.unwrap();
        assert_eq!(config.location_timeout(), Duration::from_secs(7));
        assert_eq!(config.database_path, PathBuf::from("/tmp/env.db"));
        // Numeric-looking keys are parsed as integers first and must survive
        // as text.
        assert_eq!(
            config.geocoder.api_key().map(|k| k.expose_secret().as_str()),
            Some("12345")
        );
        assert_eq!(config.geocoder.timeout(), Duration::from_secs(15));
    }
}
