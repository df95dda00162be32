//! Cache stores holding fetched feed bodies and their validators.
//!
//! Stores are shared by every concurrent fetch and keyed by URL digest, so
//! implementations only need ordinary key-value semantics on distinct keys.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use redis::Commands;
use tracing::{debug, info};

use crate::{error::StoreError, http::Validators};

const FIELD_BODY: &str = "body";
const FIELD_ETAG: &str = "etag";
const FIELD_LAST_MODIFIED: &str = "last_modified";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle Redis connections kept for reuse. Matches the default number of
/// architecture fetches in flight for one channel.
pub const DEFAULT_MAX_IDLE: usize = 20;

/// A cached response body with the validators it was served with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: Vec<u8>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CacheEntry {
    pub fn validators(&self) -> Validators {
        Validators {
            etag: self.etag.clone(),
            last_modified: self.last_modified.clone(),
        }
    }

    /// An entry can only be revalidated if it carries at least one validator.
    pub fn is_revalidatable(&self) -> bool {
        !self.validators().is_empty()
    }
}

pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Replaces the entry under `key`, expiring it after `ttl`.
    fn put(&self, key: &str, entry: &CacheEntry, ttl: Duration) -> Result<(), StoreError>;

    /// Pushes the expiry of an existing entry out to `ttl` from now.
    fn touch(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;
}

/// Opens the cache store configured by `cache_url`.
///
/// `None` means no caching. `memory` selects an in-process store; anything
/// else is treated as a Redis connection URL. Opening a Redis store only
/// parses the URL, connections are made per operation.
pub fn open_store(cache_url: Option<&str>) -> Result<Option<Arc<dyn CacheStore>>, StoreError> {
    match cache_url.map(str::trim) {
        None | Some("") => {
            debug!("No cache store configured");
            Ok(None)
        }
        Some("memory") => {
            info!("Using in-process cache store");
            Ok(Some(Arc::new(MemoryStore::default())))
        }
        Some(url) => {
            info!("Using redis cache store");
            Ok(Some(Arc::new(RedisStore::open(url)?)))
        }
    }
}

/// In-process cache store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (CacheEntry, Instant)>>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((entry, _)) => Ok(Some(entry.clone())),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, entry: &CacheEntry, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), (entry.clone(), Instant::now() + ttl));
        Ok(())
    }

    fn touch(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some((_, expires_at)) = entries.get_mut(key) {
            *expires_at = Instant::now() + ttl;
        }
        Ok(())
    }
}

/// Bounded stack of idle connections.
struct IdlePool<C> {
    idle: Mutex<Vec<C>>,
    max_idle: usize,
}

impl<C> IdlePool<C> {
    fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    fn checkout(&self) -> Option<C> {
        self.idle.lock().ok()?.pop()
    }

    /// Returns a connection to the pool, dropping it when the pool is full.
    fn checkin(&self, conn: C) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.max_idle {
                idle.push(conn);
            }
        }
    }

    fn len(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

/// Redis-backed cache store. Each entry is a hash with `body`, `etag` and
/// `last_modified` fields and a key expiry.
///
/// Connections are reused across calls. A connection whose command failed
/// is dropped rather than returned to the pool.
pub struct RedisStore {
    client: redis::Client,
    pool: IdlePool<redis::Connection>,
}

impl RedisStore {
    pub fn open(url: &str) -> Result<Self, StoreError> {
        Self::with_max_idle(url, DEFAULT_MAX_IDLE)
    }

    pub fn with_max_idle(url: &str, max_idle: usize) -> Result<Self, StoreError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            pool: IdlePool::new(max_idle),
        })
    }

    pub fn idle_connections(&self) -> usize {
        self.pool.len()
    }

    fn with_connection<T>(
        &self,
        command: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
    ) -> Result<T, StoreError> {
        let mut conn = match self.pool.checkout() {
            Some(conn) => conn,
            None => {
                debug!("opening redis connection");
                self.client.get_connection_with_timeout(CONNECT_TIMEOUT)?
            }
        };

        let value = command(&mut conn)?;
        self.pool.checkin(conn);
        Ok(value)
    }
}

fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1)
}

impl CacheStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let mut fields: HashMap<String, Vec<u8>> =
            self.with_connection(|conn| conn.hgetall(key))?;

        let Some(body) = fields.remove(FIELD_BODY) else {
            return Ok(None);
        };
        let text = |value: Vec<u8>| String::from_utf8(value).ok();

        Ok(Some(CacheEntry {
            body,
            etag: fields.remove(FIELD_ETAG).and_then(text),
            last_modified: fields.remove(FIELD_LAST_MODIFIED).and_then(text),
        }))
    }

    fn put(&self, key: &str, entry: &CacheEntry, ttl: Duration) -> Result<(), StoreError> {
        let mut fields: Vec<(&str, &[u8])> = vec![(FIELD_BODY, entry.body.as_slice())];
        if let Some(etag) = &entry.etag {
            fields.push((FIELD_ETAG, etag.as_bytes()));
        }
        if let Some(last_modified) = &entry.last_modified {
            fields.push((FIELD_LAST_MODIFIED, last_modified.as_bytes()));
        }

        self.with_connection(|conn| {
            redis::pipe()
                .atomic()
                .del(key)
                .ignore()
                .hset_multiple(key, &fields)
                .ignore()
                .expire(key, ttl_secs(ttl))
                .ignore()
                .query::<()>(conn)
        })
    }

    fn touch(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let _: i64 = self.with_connection(|conn| conn.expire(key, ttl_secs(ttl)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(body: &str, etag: Option<&str>) -> CacheEntry {
        CacheEntry {
            body: body.as_bytes().to_vec(),
            etag: etag.map(String::from),
            last_modified: None,
        }
    }

    #[test]
    fn test_entry_revalidatable() {
        assert!(entry("{}", Some("\"v1\"")).is_revalidatable());
        assert!(!entry("{}", None).is_revalidatable());

        let with_date = CacheEntry {
            last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
            ..entry("{}", None)
        };
        assert!(with_date.is_revalidatable());
        assert_eq!(
            with_date.validators().last_modified.as_deref(),
            Some("Wed, 21 Oct 2015 07:28:00 GMT")
        );
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::default();
        assert!(store.is_empty());
        assert_eq!(store.get("missing").unwrap(), None);

        let stored = entry("{\"packages\":{}}", Some("\"v1\""));
        store.put("k", &stored, Duration::from_secs(60)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(stored));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryStore::default();
        store
            .put("k", &entry("old", Some("\"v1\"")), Duration::from_secs(60))
            .unwrap();
        store
            .put("k", &entry("new", None), Duration::from_secs(60))
            .unwrap();

        let current = store.get("k").unwrap().unwrap();
        assert_eq!(current.body, b"new");
        assert_eq!(current.etag, None);
    }

    #[test]
    fn test_memory_store_expiry() {
        let store = MemoryStore::default();
        store
            .put("k", &entry("body", Some("\"v1\"")), Duration::ZERO)
            .unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_touch_extends() {
        let store = MemoryStore::default();
        store
            .put("k", &entry("body", Some("\"v1\"")), Duration::ZERO)
            .unwrap();
        store.touch("k", Duration::from_secs(60)).unwrap();
        assert!(store.get("k").unwrap().is_some());

        store.touch("absent", Duration::from_secs(60)).unwrap();
        assert_eq!(store.get("absent").unwrap(), None);
    }

    #[test]
    fn test_open_store() {
        assert!(open_store(None).unwrap().is_none());
        assert!(open_store(Some("  ")).unwrap().is_none());
        assert!(open_store(Some("memory")).unwrap().is_some());
        assert!(open_store(Some("redis://127.0.0.1:6379/0")).unwrap().is_some());
        assert!(open_store(Some("not a url")).is_err());
    }

    #[test]
    fn test_ttl_secs() {
        assert_eq!(ttl_secs(Duration::from_secs(3600)), 3600);
        assert_eq!(ttl_secs(Duration::ZERO), 1);
        assert_eq!(ttl_secs(Duration::from_secs(u64::MAX)), i64::MAX);
    }

    #[test]
    fn test_idle_pool_is_bounded() {
        let pool = IdlePool::new(2);
        assert_eq!(pool.checkout(), None::<u32>);

        pool.checkin(1);
        pool.checkin(2);
        pool.checkin(3);
        assert_eq!(pool.len(), 2);

        assert_eq!(pool.checkout(), Some(2));
        assert_eq!(pool.checkout(), Some(1));
        assert_eq!(pool.checkout(), None);
    }

    #[test]
    fn test_redis_store_starts_without_connections() {
        let store = RedisStore::open("redis://127.0.0.1:6379/0").unwrap();
        assert_eq!(store.idle_connections(), 0);
    }

    #[test]
    #[ignore] // Requires Redis server
    fn test_redis_store_roundtrip() {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let store = RedisStore::open(&url).unwrap();

        let stored = CacheEntry {
            body: b"{\"packages\":{}}".to_vec(),
            etag: Some("\"v1\"".to_string()),
            last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
        };
        store
            .put("condaview:test:roundtrip", &stored, Duration::from_secs(30))
            .unwrap();
        assert_eq!(store.get("condaview:test:roundtrip").unwrap(), Some(stored));
        store
            .touch("condaview:test:roundtrip", Duration::from_secs(30))
            .unwrap();
        assert_eq!(store.get("condaview:test:absent").unwrap(), None);
        // Every call above reused the single connection.
        assert_eq!(store.idle_connections(), 1);
    }
}
