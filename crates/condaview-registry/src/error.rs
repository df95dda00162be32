//! Error types for the registry crate.

use condaview_dl::DownloadError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error("Channel '{0}' not found")]
    #[diagnostic(
        code(condaview_registry::channel_not_found),
        help("Check the channel label against the configured channels")
    )]
    ChannelNotFound(String),

    #[error("Package '{name}' not found in channel '{channel}'")]
    #[diagnostic(code(condaview_registry::package_not_found))]
    PackageNotFound { channel: String, name: String },

    #[error("Package '{0}' not found in any channel")]
    #[diagnostic(code(condaview_registry::package_not_found))]
    PackageNotFoundAnywhere(String),

    #[error("Failed to fetch {url}: {source}")]
    #[diagnostic(
        code(condaview_registry::fetch_remote),
        help("Verify the channel domain is correct and reachable")
    )]
    FailedToFetchRemote {
        url: String,
        #[diagnostic_source]
        source: DownloadError,
    },

    #[error("Failed to parse {url}: {source}")]
    #[diagnostic(
        code(condaview_registry::json),
        help("The upstream feed may be truncated or in an unexpected format")
    )]
    Json {
        url: String,
        source: serde_json::Error,
    },

    #[error("Background task failed: {0}")]
    #[diagnostic(code(condaview_registry::task))]
    TaskFailed(String),
}

impl RegistryError {
    /// Whether the error means the requested channel or package does not
    /// exist, as opposed to a failure obtaining data.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ChannelNotFound(_)
                | Self::PackageNotFound { .. }
                | Self::PackageNotFoundAnywhere(_)
        )
    }
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
