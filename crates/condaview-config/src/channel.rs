use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Architecture subdirectories published by conda channels.
///
/// Order matters: a fetch pass folds architectures in this order, so the
/// first architecture listing a version number is the one kept when
/// versions are deduplicated.
pub const DEFAULT_ARCHITECTURES: [&str; 19] = [
    "emscripten-wasm32",
    "freebsd-64",
    "linux-32",
    "linux-64",
    "linux-aarch64",
    "linux-armv6l",
    "linux-armv7l",
    "linux-ppc64",
    "linux-ppc64le",
    "linux-riscv64",
    "linux-s390x",
    "noarch",
    "osx-64",
    "osx-arm64",
    "wasi-wasm32",
    "win-32",
    "win-64",
    "win-arm64",
    "zos-z",
];

/// An upstream conda channel mounted under a label.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChannelConfig {
    /// Label the channel is served under (e.g. `CondaForge`).
    pub label: String,

    /// Upstream channel name (e.g. `conda-forge`).
    pub channel: String,

    /// Upstream domain, without scheme (e.g. `conda.anaconda.org`).
    pub domain: String,

    /// Whether the channel is loaded.
    /// Default: true
    pub enabled: Option<bool>,
}

impl ChannelConfig {
    pub fn new(label: &str, channel: &str, domain: &str) -> Self {
        Self {
            label: label.to_string(),
            channel: channel.to_string(),
            domain: domain.to_string(),
            enabled: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Base URL of the channel, `https://{domain}/{channel}`.
    pub fn base_url(&self) -> String {
        format!(
            "https://{}/{}",
            self.domain.trim_end_matches('/'),
            self.channel.trim_matches('/')
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            ConfigError::InvalidChannel {
                label: self.label.clone(),
                reason: reason.to_string(),
            }
        };

        if self.label.trim().is_empty() {
            return Err(invalid("label is empty"));
        }
        if self.channel.trim().is_empty() {
            return Err(invalid("channel name is empty"));
        }
        if self.domain.contains("://") {
            return Err(invalid("domain must not include a scheme"));
        }

        let url = Url::parse(&self.base_url()).map_err(|err| invalid(&err.to_string()))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("domain has no host"));
        }

        Ok(())
    }
}

/// Channels served when no configuration file exists.
pub fn default_channels() -> Vec<ChannelConfig> {
    vec![
        ChannelConfig::new("Main", "main", "repo.anaconda.com/pkgs"),
        ChannelConfig::new("Msys2", "msys2", "repo.anaconda.com/pkgs"),
        ChannelConfig::new("R", "r", "repo.anaconda.com/pkgs"),
        ChannelConfig::new("CondaForge", "conda-forge", "conda.anaconda.org"),
        ChannelConfig::new("BioConda", "bioconda", "conda.anaconda.org"),
    ]
}
