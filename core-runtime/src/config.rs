//! # Connector Configuration
//!
//! Provides the validated configuration surface for the SharePoint connector.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `ConnectorConfig` holding the scope strings, batch size, size ceiling, and
//! retry policy. Validation is fail-fast: a config that would make the
//! connector misbehave (zero batch size, a backoff base above its cap) is
//! rejected at build time with an actionable message.
//!
//! Three sources are supported:
//!
//! - The builder, for hosts that assemble settings themselves
//! - Environment variables via [`ConnectorConfig::from_env`]
//! - A [`SettingsStore`] via [`ConnectorConfig::load_from_settings`], which
//!   writes defaults back for any key that is missing
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::ConnectorConfig;
//!
//! let config = ConnectorConfig::builder()
//!     .site("https://contoso.sharepoint.com/sites/hr/Shared Documents/Policies")
//!     .batch_size(32)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::SettingsStore;
use std::time::Duration;
use tracing::{debug, info};

/// Documents per yielded batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Items larger than this are skipped before their content is fetched.
pub const DEFAULT_SIZE_THRESHOLD_BYTES: u64 = 20 * 1024 * 1024;

/// Additional attempts after the first throttled response.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(5);
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(30);

pub const SETTING_BATCH_SIZE: &str = "sharepoint.batch_size";
pub const SETTING_SIZE_THRESHOLD: &str = "sharepoint.size_threshold_bytes";
pub const SETTING_MAX_RETRIES: &str = "sharepoint.max_retries";
pub const SETTING_SITES: &str = "sharepoint.sites";

pub const ENV_SITES: &str = "SHAREPOINT_SITES";
pub const ENV_BATCH_SIZE: &str = "SHAREPOINT_BATCH_SIZE";
pub const ENV_SIZE_THRESHOLD: &str = "SHAREPOINT_CONNECTOR_SIZE_THRESHOLD";

/// Connector configuration.
///
/// Use [`ConnectorConfigBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// Raw scope strings. Empty means every site visible to the credential.
    pub sites: Vec<String>,

    /// Maximum number of documents per yielded batch
    pub batch_size: usize,

    /// Size ceiling in bytes for content retrieval
    pub size_threshold_bytes: u64,

    /// Retry attempts after a 429/503 response
    pub max_retries: u32,

    /// Base delay of the exponential backoff
    pub backoff_base: Duration,

    /// Upper bound of the exponential backoff
    pub backoff_cap: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            size_threshold_bytes: DEFAULT_SIZE_THRESHOLD_BYTES,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_cap: DEFAULT_BACKOFF_CAP,
        }
    }
}

impl ConnectorConfig {
    /// Creates a new builder for constructing a `ConnectorConfig`.
    pub fn builder() -> ConnectorConfigBuilder {
        ConnectorConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Batch size is greater than zero
    /// - Size threshold is greater than zero
    /// - Backoff base does not exceed the backoff cap
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.size_threshold_bytes == 0 {
            return Err(Error::Config(
                "Size threshold must be greater than 0 bytes".to_string(),
            ));
        }

        if self.backoff_base > self.backoff_cap {
            return Err(Error::Config(format!(
                "Backoff base ({:?}) exceeds backoff cap ({:?})",
                self.backoff_base, self.backoff_cap
            )));
        }

        Ok(())
    }

    /// Builds a configuration from the process environment.
    ///
    /// Reads `SHAREPOINT_SITES` (comma-separated), `SHAREPOINT_BATCH_SIZE`,
    /// and `SHAREPOINT_CONNECTOR_SIZE_THRESHOLD`. Unset variables keep their
    /// defaults; set but unparsable ones are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(raw) = lookup(ENV_SITES) {
            builder = builder.sites(split_sites(&raw));
        }
        if let Some(raw) = lookup(ENV_BATCH_SIZE) {
            builder = builder.batch_size(parse_setting(ENV_BATCH_SIZE, &raw)?);
        }
        if let Some(raw) = lookup(ENV_SIZE_THRESHOLD) {
            builder = builder.size_threshold_bytes(parse_setting(ENV_SIZE_THRESHOLD, &raw)?);
        }

        builder.build()
    }

    /// Loads the configuration from a settings store.
    ///
    /// Keys that are missing are written back with their default value, so a
    /// fresh store ends up fully populated after the first load.
    pub async fn load_from_settings(store: &dyn SettingsStore) -> Result<Self> {
        let defaults = Self::default();

        let batch_size = load_or_store_i64(
            store,
            SETTING_BATCH_SIZE,
            defaults.batch_size as i64,
        )
        .await?;
        let size_threshold = load_or_store_i64(
            store,
            SETTING_SIZE_THRESHOLD,
            defaults.size_threshold_bytes as i64,
        )
        .await?;
        let max_retries = load_or_store_i64(
            store,
            SETTING_MAX_RETRIES,
            i64::from(defaults.max_retries),
        )
        .await?;

        let sites = match store.get_string(SETTING_SITES).await? {
            Some(raw) => split_sites(&raw),
            None => {
                store.set_string(SETTING_SITES, "").await?;
                debug!(key = SETTING_SITES, "Stored default setting");
                Vec::new()
            }
        };

        let config = Self::builder()
            .sites(sites)
            .batch_size(non_negative(SETTING_BATCH_SIZE, batch_size)?)
            .size_threshold_bytes(non_negative(SETTING_SIZE_THRESHOLD, size_threshold)?)
            .max_retries(non_negative(SETTING_MAX_RETRIES, max_retries)?)
            .build()?;

        info!(
            sites = config.sites.len(),
            batch_size = config.batch_size,
            max_retries = config.max_retries,
            "Loaded connector settings"
        );
        Ok(config)
    }

    /// Persists this configuration into a settings store.
    pub async fn save_to_settings(&self, store: &dyn SettingsStore) -> Result<()> {
        store
            .set_i64(SETTING_BATCH_SIZE, self.batch_size as i64)
            .await?;
        store
            .set_i64(SETTING_SIZE_THRESHOLD, self.size_threshold_bytes as i64)
            .await?;
        store
            .set_i64(SETTING_MAX_RETRIES, i64::from(self.max_retries))
            .await?;
        store
            .set_string(SETTING_SITES, &self.sites.join(","))
            .await?;
        Ok(())
    }

    /// Opens the default SQLite settings store at `db_path` and loads from it.
    #[cfg(feature = "desktop-shims")]
    pub async fn load_from_sqlite(db_path: impl Into<std::path::PathBuf>) -> Result<Self> {
        use bridge_desktop::SqliteSettingsStore;

        let store = SqliteSettingsStore::new(db_path.into()).await?;
        Self::load_from_settings(&store).await
    }
}

async fn load_or_store_i64(store: &dyn SettingsStore, key: &str, default: i64) -> Result<i64> {
    match store.get_i64(key).await? {
        Some(value) => Ok(value),
        None => {
            store.set_i64(key, default).await?;
            debug!(key = key, value = default, "Stored default setting");
            Ok(default)
        }
    }
}

fn non_negative<T>(key: &str, value: i64) -> Result<T>
where
    T: TryFrom<i64>,
{
    T::try_from(value).map_err(|_| Error::InvalidSetting {
        key: key.to_string(),
        message: format!("{} is out of range", value),
    })
}

fn parse_setting<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| Error::InvalidSetting {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn split_sites(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|site| !site.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builder for constructing [`ConnectorConfig`] instances.
///
/// Unset fields fall back to the connector defaults. Call
/// [`build()`](ConnectorConfigBuilder::build) to validate and produce the
/// final config.
#[derive(Debug, Default)]
pub struct ConnectorConfigBuilder {
    sites: Vec<String>,
    batch_size: Option<usize>,
    size_threshold_bytes: Option<u64>,
    max_retries: Option<u32>,
    backoff_base: Option<Duration>,
    backoff_cap: Option<Duration>,
}

impl ConnectorConfigBuilder {
    /// Adds one scope string.
    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.sites.push(site.into());
        self
    }

    /// Replaces the scope strings.
    pub fn sites<I, S>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sites = sites.into_iter().map(Into::into).collect();
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn size_threshold_bytes(mut self, bytes: u64) -> Self {
        self.size_threshold_bytes = Some(bytes);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = Some(base);
        self
    }

    pub fn backoff_cap(mut self, cap: Duration) -> Self {
        self.backoff_cap = Some(cap);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when [`ConnectorConfig::validate`] fails.
    pub fn build(self) -> Result<ConnectorConfig> {
        let defaults = ConnectorConfig::default();
        let config = ConnectorConfig {
            sites: self.sites,
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            size_threshold_bytes: self
                .size_threshold_bytes
                .unwrap_or(defaults.size_threshold_bytes),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            backoff_base: self.backoff_base.unwrap_or(defaults.backoff_base),
            backoff_cap: self.backoff_cap.unwrap_or(defaults.backoff_cap),
        };

        config.validate()?;
        Ok(config)
    }
}
