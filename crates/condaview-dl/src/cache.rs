use std::{sync::Arc, time::Duration};

use condaview_utils::hash::cache_key;
use tracing::{debug, trace, warn};

use crate::{
    error::{DownloadError, Result},
    http::{Transport, TransportResponse, Validators},
    store::{CacheEntry, CacheStore},
};

const KEY_NAMESPACE: &str = "condaview:feed";

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Conditional-GET HTTP client backed by a shared cache store.
///
/// Stored bodies that carry an `ETag` or `Last-Modified` validator are
/// revalidated instead of downloaded again; a `304 Not Modified` extends the
/// entry's expiry and returns the stored body. Stored bodies without a
/// validator are downloaded again with a plain GET. Whenever the upstream
/// request fails, the most recently stored body is served if there is one.
///
/// Cache-store failures are logged and otherwise ignored: the client then
/// behaves as if no cache store were configured.
#[derive(Clone)]
pub struct HttpCache {
    transport: Arc<dyn Transport>,
    store: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
}

impl HttpCache {
    pub fn new(transport: Arc<dyn Transport>, store: Option<Arc<dyn CacheStore>>) -> Self {
        Self {
            transport,
            store,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Fetches `url`, going through the cache store when one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] only when no body could be obtained: the
    /// upstream request failed or returned a non-success status and nothing
    /// usable was cached.
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let key = cache_key(KEY_NAMESPACE, url);

        match self.lookup(&key) {
            Some(entry) if entry.is_revalidatable() => self.revalidate(url, &key, entry),
            stale => self.fetch_fresh(url, &key, stale),
        }
    }

    fn revalidate(&self, url: &str, key: &str, cached: CacheEntry) -> Result<Vec<u8>> {
        match self.transport.get(url, &cached.validators()) {
            Ok(resp) if resp.is_not_modified() => {
                trace!(url, "not modified, serving cached body");
                if let Some(store) = &self.store {
                    if let Err(err) = store.touch(key, self.ttl) {
                        debug!(url, "failed to extend cache entry: {}", err);
                    }
                }
                Ok(cached.body)
            }
            Ok(resp) if resp.is_success() => {
                debug!(url, status = resp.status, "cached body replaced");
                self.remember(url, key, &resp);
                Ok(resp.body)
            }
            Ok(resp) => {
                warn!(
                    url,
                    status = resp.status,
                    "revalidation failed, serving cached body"
                );
                Ok(cached.body)
            }
            Err(err) => {
                warn!(url, "revalidation failed, serving cached body: {}", err);
                Ok(cached.body)
            }
        }
    }

    /// Plain GET. `stale` is a stored entry without validators, served when
    /// the request fails.
    fn fetch_fresh(&self, url: &str, key: &str, stale: Option<CacheEntry>) -> Result<Vec<u8>> {
        let result = self
            .transport
            .get(url, &Validators::default())
            .and_then(|resp| {
                if resp.is_success() {
                    Ok(resp)
                } else {
                    Err(DownloadError::HttpStatus {
                        status: resp.status,
                        url: url.to_string(),
                    })
                }
            });

        match (result, stale) {
            (Ok(resp), _) => {
                self.remember(url, key, &resp);
                Ok(resp.body)
            }
            (Err(err), Some(stale)) => {
                warn!(url, "fetch failed, serving cached body: {}", err);
                Ok(stale.body)
            }
            (Err(err), None) => Err(err),
        }
    }

    fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let store = self.store.as_ref()?;
        match store.get(key) {
            Ok(entry) => entry,
            Err(err) => {
                debug!("cache store lookup failed, fetching directly: {}", err);
                None
            }
        }
    }

    /// Stores a successful response, replacing any previous entry. An entry
    /// without validators is never revalidated; it only backs up the next
    /// plain GET.
    fn remember(&self, url: &str, key: &str, resp: &TransportResponse) {
        let Some(store) = &self.store else {
            return;
        };

        let entry = CacheEntry {
            body: resp.body.clone(),
            etag: resp.etag.clone(),
            last_modified: resp.last_modified.clone(),
        };
        if !entry.is_revalidatable() {
            trace!(url, "response has no validators, storing as fallback only");
        }

        if let Err(err) = store.put(key, &entry, self.ttl) {
            debug!(url, "failed to store response: {}", err);
        }
    }
}
