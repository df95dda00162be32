use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use condaview_utils::{path::xdg_config_home, time::parse_duration};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    channel::{default_channels, ChannelConfig, DEFAULT_ARCHITECTURES},
    error::{ConfigError, Result},
};

pub const DEFAULT_CACHE_TTL: &str = "1h";
pub const DEFAULT_REFRESH_INTERVAL: &str = "15m";
pub const DEFAULT_REQUEST_TIMEOUT: &str = "5m";
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Application's configuration
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Cache store endpoint: `redis://host:port/db` or `memory`.
    /// Default: no cache store, every fetch goes upstream
    pub cache_url: Option<String>,

    /// How long cached feed bodies live in the cache store.
    /// Default: 1h
    pub cache_ttl: Option<String>,

    /// Interval between two reloads of every channel.
    /// Default: 15m
    pub refresh_interval: Option<String>,

    /// Maximum number of architecture feeds fetched at once per channel.
    /// Default: 20
    pub concurrency: Option<usize>,

    /// Timeout applied to every upstream request.
    /// Default: 5m
    pub request_timeout: Option<String>,

    /// User agent sent upstream.
    /// Default: condaview/<version>
    pub user_agent: Option<String>,

    /// Architecture subdirectories to fetch, in fold order.
    /// Default: every known conda subdir
    pub architectures: Option<Vec<String>>,

    /// Channels to load, in lookup order.
    pub channels: Vec<ChannelConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_url: None,
            cache_ttl: Some(DEFAULT_CACHE_TTL.to_string()),
            refresh_interval: Some(DEFAULT_REFRESH_INTERVAL.to_string()),
            concurrency: Some(DEFAULT_CONCURRENCY),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT.to_string()),
            user_agent: None,
            architectures: None,
            channels: default_channels(),
        }
    }
}

/// Location of the configuration file: `CONDAVIEW_CONFIG` when set,
/// `$XDG_CONFIG_HOME/condaview/config.toml` otherwise.
pub fn config_path() -> PathBuf {
    match std::env::var("CONDAVIEW_CONFIG") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => xdg_config_home().join("condaview").join("config.toml"),
    }
}

impl Config {
    /// Loads the configuration from `path`, or from [`config_path`] when
    /// `path` is `None`.
    ///
    /// A missing file yields the default configuration. The loaded
    /// configuration is validated before it is returned.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);

        let config = if path.exists() {
            debug!(path = %path.display(), "loading configuration");
            let content = fs::read_to_string(&path).map_err(|err| {
                ConfigError::IoError {
                    action: format!("reading config file {}", path.display()),
                    source: err,
                }
            })?;
            Self::from_toml_str(&content)?
        } else {
            info!(
                "Config file {} not found, using default configuration",
                path.display()
            );
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for channel in &self.channels {
            channel.validate()?;
            if !seen.insert(channel.label.as_str()) {
                return Err(ConfigError::DuplicateChannelLabel(channel.label.clone()));
            }
        }

        if self.enabled_channels().is_empty() {
            return Err(ConfigError::NoChannels);
        }

        if self.concurrency == Some(0) {
            return Err(ConfigError::InvalidConcurrency);
        }

        self.cache_ttl()?;
        self.refresh_interval()?;
        self.request_timeout()?;

        Ok(())
    }

    pub fn enabled_channels(&self) -> Vec<ChannelConfig> {
        self.channels
            .iter()
            .filter(|channel| channel.is_enabled())
            .cloned()
            .collect()
    }

    pub fn cache_ttl(&self) -> Result<Duration> {
        duration_field("cache_ttl", self.cache_ttl.as_deref(), DEFAULT_CACHE_TTL)
    }

    /// Interval between reloads. Never zero.
    pub fn refresh_interval(&self) -> Result<Duration> {
        let interval = duration_field(
            "refresh_interval",
            self.refresh_interval.as_deref(),
            DEFAULT_REFRESH_INTERVAL,
        )?;
        non_zero("refresh_interval", interval)
    }

    /// Per-request timeout. Never zero.
    pub fn request_timeout(&self) -> Result<Duration> {
        let timeout = duration_field(
            "request_timeout",
            self.request_timeout.as_deref(),
            DEFAULT_REQUEST_TIMEOUT,
        )?;
        non_zero("request_timeout", timeout)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1)
    }

    pub fn architectures(&self) -> Vec<String> {
        match &self.architectures {
            Some(arches) if !arches.is_empty() => arches.clone(),
            _ => DEFAULT_ARCHITECTURES.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("condaview/{}", env!("CARGO_PKG_VERSION")))
    }
}

fn non_zero(field: &'static str, duration: Duration) -> Result<Duration> {
    if duration.is_zero() {
        return Err(ConfigError::ZeroDuration {
            field,
        });
    }
    Ok(duration)
}

fn duration_field(field: &'static str, value: Option<&str>, default: &str) -> Result<Duration> {
    parse_duration(value.unwrap_or(default)).map_err(|source| {
        ConfigError::InvalidDuration {
            field,
            source,
        }
    })
}
