//! Cached HTTP fetching for condaview.
//!
//! [`cache::HttpCache`] wraps a [`http::Transport`] with a shared
//! [`store::CacheStore`], revalidating stored feed bodies with conditional
//! requests (`If-None-Match` / `If-Modified-Since`) instead of downloading
//! them again. The cache store is optional and failures talking to it never
//! fail a fetch.

pub mod cache;
pub mod error;
pub mod http;
pub mod http_client;
pub mod store;

pub use cache::HttpCache;
pub use error::{DownloadError, Result, StoreError};
pub use http::{Transport, TransportResponse, UreqTransport, Validators};
pub use store::{open_store, CacheEntry, CacheStore, MemoryStore, RedisStore};
