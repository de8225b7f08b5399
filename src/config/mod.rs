//! Configuration management.
//!
//! Settings come from, in increasing precedence:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, `PEOPLESYNC_CONFIG_PATH`, or
//!    `<config dir>/peoplesync/config.toml`)
//! 3. `PEOPLESYNC_*` environment variables
//!
//! Planning Center credentials are read from `PCO_APP_ID` and `PCO_SECRET`
//! and held as [`SecretString`].
//!
//! # Environment Variables
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `PEOPLESYNC_DB_PATH` | `source.database` |
//! | `PEOPLESYNC_OUTPUT_DIR` | `output.directory` |
//! | `PEOPLESYNC_DUPLICATE_WINDOW` | `matching.duplicate_window` |
//! | `PEOPLESYNC_DISTANCE_KM` | `matching.distance_threshold_km` |
//! | `PEOPLESYNC_REGION` | `matching.region` |
//! | `PEOPLESYNC_STALE_CUTOFF` | `matching.stale_cutoff` |
//! | `PEOPLESYNC_PCO_BASE_URL` | `remote.base_url` |
//! | `PEOPLESYNC_GEOCODER_URL` | `geocoder.base_url` |
//! | `PEOPLESYNC_LOG_FORMAT` | `logging.format` |
//! | `PEOPLESYNC_LOG_FILE` | `logging.file` |

use crate::observability::LogFormat;
use crate::{Error, Result};
use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "PEOPLESYNC_CONFIG_PATH";

/// Duplicate detection, address matching and screening settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    /// Earlier records inspected by duplicate detection.
    pub duplicate_window: usize,
    /// Distance under which two addresses are the same place.
    pub distance_threshold_km: f64,
    /// Region whose numbering plan parses local phone numbers.
    pub region: String,
    /// Records not updated since this date are skipped.
    pub stale_cutoff: Option<NaiveDate>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            duplicate_window: 20,
            distance_threshold_km: 0.5,
            region: "US".to_string(),
            stale_cutoff: None,
        }
    }
}

/// Planning Center People API settings.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// API base URL.
    pub base_url: String,
    /// Page size for list requests.
    pub per_page: usize,
    /// Request timeout in milliseconds (0 disables).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 disables).
    pub connect_timeout_ms: u64,
    /// Application id for basic auth.
    pub app_id: Option<SecretString>,
    /// Secret for basic auth.
    pub secret: Option<SecretString>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.planningcenteronline.com".to_string(),
            per_page: 100,
            timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            app_id: None,
            secret: None,
        }
    }
}

impl RemoteConfig {
    /// Returns both credentials, or a configuration error naming the
    /// missing variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either credential is unset or empty.
    pub fn credentials(&self) -> Result<(&SecretString, &SecretString)> {
        let app_id = self
            .app_id
            .as_ref()
            .filter(|s| !s.expose_secret().is_empty())
            .ok_or_else(|| Error::Config("PCO_APP_ID is not set".to_string()))?;
        let secret = self
            .secret
            .as_ref()
            .filter(|s| !s.expose_secret().is_empty())
            .ok_or_else(|| Error::Config("PCO_SECRET is not set".to_string()))?;
        Ok((app_id, secret))
    }
}

/// Geocoding service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocoderConfig {
    /// Nominatim-compatible base URL.
    pub base_url: String,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Cached lookups.
    pub cache_capacity: usize,
    /// Request timeout in milliseconds (0 disables).
    pub timeout_ms: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("peoplesync/", env!("CARGO_PKG_VERSION")).to_string(),
            cache_capacity: 1024,
            timeout_ms: 10_000,
        }
    }
}

/// Source database settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Path to the source `SQLite` database.
    pub database: PathBuf,
    /// Index of the first sorted row to load.
    pub start: usize,
    /// Index one past the last sorted row to load.
    pub end: Option<usize>,
    /// Only load these primary keys.
    pub ids: Vec<i64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("people.db"),
            start: 0,
            end: None,
            ids: Vec::new(),
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Directory the CSV audit files are written to.
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("out_files"),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// Also append logs to this file.
    pub file: Option<PathBuf>,
    /// Filter directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

/// Main configuration for peoplesync.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Matching settings.
    pub matching: MatchingConfig,
    /// Remote API settings.
    pub remote: RemoteConfig,
    /// Geocoder settings.
    pub geocoder: GeocoderConfig,
    /// Source database settings.
    pub source: SourceConfig,
    /// Export settings.
    pub output: OutputConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Matching section.
    pub matching: Option<ConfigFileMatching>,
    /// Remote section.
    pub remote: Option<ConfigFileRemote>,
    /// Geocoder section.
    pub geocoder: Option<ConfigFileGeocoder>,
    /// Source section.
    pub source: Option<ConfigFileSource>,
    /// Output section.
    pub output: Option<ConfigFileOutput>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Matching section in config file.
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileMatching {
    /// Duplicate window.
    pub duplicate_window: Option<usize>,
    /// Address distance threshold in km.
    pub distance_threshold_km: Option<f64>,
    /// Phone region.
    pub region: Option<String>,
    /// Stale cutoff as `YYYY-MM-DD`.
    pub stale_cutoff: Option<String>,
}

/// Remote section in config file.
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileRemote {
    /// Base URL.
    pub base_url: Option<String>,
    /// Page size.
    pub per_page: Option<usize>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Application id.
    pub app_id: Option<String>,
    /// Secret.
    pub secret: Option<String>,
}

/// Geocoder section in config file.
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileGeocoder {
    /// Base URL.
    pub base_url: Option<String>,
    /// User agent.
    pub user_agent: Option<String>,
    /// Cache capacity.
    pub cache_capacity: Option<usize>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
}

/// Source section in config file.
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileSource {
    /// Database path.
    pub database: Option<String>,
    /// First row.
    pub start: Option<usize>,
    /// End row.
    pub end: Option<usize>,
    /// Id filter.
    pub ids: Option<Vec<i64>>,
}

/// Output section in config file.
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileOutput {
    /// Export directory.
    pub directory: Option<String>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
}

fn parse_cutoff(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| Error::Config(format!("invalid stale cutoff '{value}': {e}")))
}

const REDACTED: &str = "<redacted>";

impl SyncConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not a valid config file.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        Self::from_config_file(file)
    }

    /// Returns the default config file location, if a config dir exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("peoplesync").join("config.toml"))
    }

    /// Loads configuration the way the CLI does.
    ///
    /// An explicit path (or `PEOPLESYNC_CONFIG_PATH`) must exist; the
    /// default location is optional. Environment overrides are applied
    /// last and the result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a named file is missing or any setting
    /// is invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let config = match named {
            Some(path) => Self::load_from_file(&path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::load_from_file(&path)?,
                None => Self::default(),
            },
        };

        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `PEOPLESYNC_*` and `PCO_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable holds an unusable value.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable holds an unusable value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, value: &str| {
            Error::Config(format!("{key} must be a number, got '{value}'"))
        };

        if let Some(v) = get("PEOPLESYNC_DB_PATH") {
            self.source.database = PathBuf::from(v);
        }
        if let Some(v) = get("PEOPLESYNC_OUTPUT_DIR") {
            self.output.directory = PathBuf::from(v);
        }
        if let Some(v) = get("PEOPLESYNC_DUPLICATE_WINDOW") {
            self.matching.duplicate_window = v
                .trim()
                .parse()
                .map_err(|_| number("PEOPLESYNC_DUPLICATE_WINDOW", &v))?;
        }
        if let Some(v) = get("PEOPLESYNC_DISTANCE_KM") {
            self.matching.distance_threshold_km = v
                .trim()
                .parse()
                .map_err(|_| number("PEOPLESYNC_DISTANCE_KM", &v))?;
        }
        if let Some(v) = get("PEOPLESYNC_REGION") {
            self.matching.region = v.trim().to_uppercase();
        }
        if let Some(v) = get("PEOPLESYNC_STALE_CUTOFF") {
            self.matching.stale_cutoff = Some(parse_cutoff(&v)?);
        }
        if let Some(v) = get("PEOPLESYNC_PCO_BASE_URL") {
            self.remote.base_url = v;
        }
        if let Some(v) = get("PEOPLESYNC_GEOCODER_URL") {
            self.geocoder.base_url = v;
        }
        if let Some(v) = get("PEOPLESYNC_LOG_FORMAT") {
            self.logging.format = LogFormat::parse(&v)?;
        }
        if let Some(v) = get("PEOPLESYNC_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("PCO_APP_ID") {
            self.remote.app_id = Some(SecretString::from(v));
        }
        if let Some(v) = get("PCO_SECRET") {
            self.remote.secret = Some(SecretString::from(v));
        }

        Ok(self)
    }

    /// Checks settings that cannot be expressed in the types.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        let region = &self.matching.region;
        if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::Config(format!(
                "region must be a two-letter country code, got '{region}'"
            )));
        }
        let km = self.matching.distance_threshold_km;
        if !km.is_finite() || km <= 0.0 {
            return Err(Error::Config(format!(
                "distance threshold must be a positive number of km, got {km}"
            )));
        }
        if let Some(end) = self.source.end {
            if end < self.source.start {
                return Err(Error::Config(format!(
                    "source end ({end}) is before start ({})",
                    self.source.start
                )));
            }
        }
        if self.remote.per_page == 0 {
            return Err(Error::Config("remote per_page must be positive".to_string()));
        }
        Ok(())
    }

    /// Converts a `ConfigFile` to `SyncConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(matching) = file.matching {
            if let Some(v) = matching.duplicate_window {
                config.matching.duplicate_window = v;
            }
            if let Some(v) = matching.distance_threshold_km {
                config.matching.distance_threshold_km = v;
            }
            if let Some(v) = matching.region {
                config.matching.region = v.trim().to_uppercase();
            }
            if let Some(v) = matching.stale_cutoff {
                config.matching.stale_cutoff = Some(parse_cutoff(&v)?);
            }
        }
        if let Some(remote) = file.remote {
            if let Some(v) = remote.base_url {
                config.remote.base_url = v;
            }
            if let Some(v) = remote.per_page {
                config.remote.per_page = v;
            }
            if let Some(v) = remote.timeout_ms {
                config.remote.timeout_ms = v;
            }
            if let Some(v) = remote.connect_timeout_ms {
                config.remote.connect_timeout_ms = v;
            }
            config.remote.app_id = remote.app_id.map(SecretString::from);
            config.remote.secret = remote.secret.map(SecretString::from);
        }
        if let Some(geocoder) = file.geocoder {
            if let Some(v) = geocoder.base_url {
                config.geocoder.base_url = v;
            }
            if let Some(v) = geocoder.user_agent {
                config.geocoder.user_agent = v;
            }
            if let Some(v) = geocoder.cache_capacity {
                config.geocoder.cache_capacity = v;
            }
            if let Some(v) = geocoder.timeout_ms {
                config.geocoder.timeout_ms = v;
            }
        }
        if let Some(source) = file.source {
            if let Some(v) = source.database {
                config.source.database = PathBuf::from(v);
            }
            if let Some(v) = source.start {
                config.source.start = v;
            }
            config.source.end = source.end;
            if let Some(v) = source.ids {
                config.source.ids = v;
            }
        }
        if let Some(v) = file.output.and_then(|output| output.directory) {
            config.output.directory = PathBuf::from(v);
        }
        if let Some(logging) = file.logging {
            if let Some(v) = logging.format {
                config.logging.format = LogFormat::parse(&v)?;
            }
            config.logging.file = logging.file.map(PathBuf::from);
            config.logging.filter = logging.filter;
        }

        Ok(config)
    }

    /// Renders the effective configuration as TOML with credentials
    /// redacted.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        let redact = |secret: Option<&SecretString>| secret.map(|_| REDACTED.to_string());
        let file = ConfigFile {
            matching: Some(ConfigFileMatching {
                duplicate_window: Some(self.matching.duplicate_window),
                distance_threshold_km: Some(self.matching.distance_threshold_km),
                region: Some(self.matching.region.clone()),
                stale_cutoff: self
                    .matching
                    .stale_cutoff
                    .map(|d| d.format("%Y-%m-%d").to_string()),
            }),
            remote: Some(ConfigFileRemote {
                base_url: Some(self.remote.base_url.clone()),
                per_page: Some(self.remote.per_page),
                timeout_ms: Some(self.remote.timeout_ms),
                connect_timeout_ms: Some(self.remote.connect_timeout_ms),
                app_id: redact(self.remote.app_id.as_ref()),
                secret: redact(self.remote.secret.as_ref()),
            }),
            geocoder: Some(ConfigFileGeocoder {
                base_url: Some(self.geocoder.base_url.clone()),
                user_agent: Some(self.geocoder.user_agent.clone()),
                cache_capacity: Some(self.geocoder.cache_capacity),
                timeout_ms: Some(self.geocoder.timeout_ms),
            }),
            source: Some(ConfigFileSource {
                database: Some(self.source.database.display().to_string()),
                start: Some(self.source.start),
                end: self.source.end,
                ids: Some(self.source.ids.clone()),
            }),
            output: Some(ConfigFileOutput {
                directory: Some(self.output.directory.display().to_string()),
            }),
            logging: Some(ConfigFileLogging {
                format: Some(self.logging.format.as_str().to_string()),
                file: self.logging.file.as_ref().map(|p| p.display().to_string()),
                filter: self.logging.filter.clone(),
            }),
        };
        toml::to_string_pretty(&file).map_err(|e| Error::failed("serialize_config", e))
    }

    /// Sets the source database path.
    #[must_use]
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.source.database = path.into();
        self
    }

    /// Sets the export directory.
    #[must_use]
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output.directory = path.into();
        self
    }

    /// Sets the duplicate window.
    #[must_use]
    pub const fn with_duplicate_window(mut self, window: usize) -> Self {
        self.matching.duplicate_window = window;
        self
    }

    /// Sets the stale cutoff.
    #[must_use]
    pub const fn with_stale_cutoff(mut self, cutoff: Option<NaiveDate>) -> Self {
        self.matching.stale_cutoff = cutoff;
        self
    }

    /// Sets the source row window.
    #[must_use]
    pub const fn with_rows(mut self, start: usize, end: Option<usize>) -> Self {
        self.source.start = start;
        self.source.end = end;
        self
    }
}
