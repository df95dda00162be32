use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error("Network request failed: {0}")]
    #[diagnostic(
        code(condaview_dl::network),
        help("Check your network connection and the channel domain")
    )]
    Network(Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(condaview_dl::http_status))]
    HttpStatus { status: u16, url: String },
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl From<ureq::Error> for DownloadError {
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}

/// Errors talking to the cache store. These are logged and swallowed by the
/// cache client, never surfaced from a fetch.
#[derive(Error, Diagnostic, Debug)]
pub enum StoreError {
    #[error("Cache store error: {0}")]
    #[diagnostic(
        code(condaview_dl::store),
        help("Check that the cache store is reachable at the configured cache_url")
    )]
    Redis(#[from] redis::RedisError),

    #[error("Cache store lock poisoned")]
    #[diagnostic(code(condaview_dl::store_poisoned))]
    Poisoned,
}
