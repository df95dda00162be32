use ureq::{
    http::{
        header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED},
        HeaderName,
    },
    Agent,
};

use crate::{error::Result, http_client::ClientConfig};

/// Upper bound on a single feed body. Channel indexes for large channels run
/// to hundreds of megabytes.
const MAX_BODY_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Validators sent with a conditional request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Validators {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// What came back from the upstream server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }
}

/// A plain HTTP GET.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status, and `Err` only when no response was obtained.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, validators: &Validators) -> Result<TransportResponse>;
}

/// [`Transport`] backed by a ureq agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            agent: config.build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, validators: &Validators) -> Result<TransportResponse> {
        let mut req = self.agent.get(url);

        if let Some(etag) = &validators.etag {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &validators.last_modified {
            req = req.header(IF_MODIFIED_SINCE, last_modified);
        }

        let mut resp = req.call()?;
        let status = resp.status().as_u16();

        let header = |name: HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(String::from)
        };
        let etag = header(ETAG);
        let last_modified = header(LAST_MODIFIED);

        let body = if status == 304 {
            Vec::new()
        } else {
            resp.body_mut()
                .with_config()
                .limit(MAX_BODY_SIZE)
                .read_to_vec()?
        };

        Ok(TransportResponse {
            status,
            body,
            etag,
            last_modified,
        })
    }
}
