use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum DurationError {
    #[error("Invalid duration `{0}`")]
    #[diagnostic(
        code(condaview_utils::invalid_duration),
        help("Use a combination of <number><unit> with units s, m, h, d (e.g. `15m`, `1h30m`)")
    )]
    Invalid(String),

    #[error("Duration `{0}` is too large")]
    #[diagnostic(code(condaview_utils::duration_overflow))]
    Overflow(String),
}

pub type DurationResult<T> = std::result::Result<T, DurationError>;
