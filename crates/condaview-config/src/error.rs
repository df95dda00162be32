use condaview_utils::error::DurationError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(condaview_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(condaview_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(condaview_config::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("Invalid value for `{field}`: {source}")]
    #[diagnostic(code(condaview_config::invalid_duration))]
    InvalidDuration {
        field: &'static str,
        #[diagnostic_source]
        source: DurationError,
    },

    #[error("`{field}` must be longer than zero")]
    #[diagnostic(
        code(condaview_config::zero_duration),
        help("Use a positive duration such as `30s` or `15m`")
    )]
    ZeroDuration { field: &'static str },

    #[error("No enabled channels configured")]
    #[diagnostic(
        code(condaview_config::no_channels),
        help("Add at least one [[channels]] entry with a label, channel and domain")
    )]
    NoChannels,

    #[error("Duplicate channel label: {0}")]
    #[diagnostic(
        code(condaview_config::duplicate_channel),
        help("Each channel must have a unique label")
    )]
    DuplicateChannelLabel(String),

    #[error("Invalid channel `{label}`: {reason}")]
    #[diagnostic(
        code(condaview_config::invalid_channel),
        help("The channel name and domain must form a valid https URL, e.g. conda.anaconda.org/conda-forge")
    )]
    InvalidChannel { label: String, reason: String },

    #[error("Concurrency must be at least 1")]
    #[diagnostic(code(condaview_config::invalid_concurrency))]
    InvalidConcurrency,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
