//! Channel ingestion and the merged package registry.
//!
//! A [`Channel`] owns one upstream conda channel. Each reload runs a
//! [`FeedFetcher`] pass that downloads the channel's `channeldata.json`
//! catalog and every architecture's `repodata.json` index (a bounded number
//! at a time), folds them into a package map and swaps it in together with a
//! view holding one version per version number.
//!
//! The [`Registry`] owns every channel in lookup order and keeps a merged
//! package map built from each channel's deduplicated view.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use condaview_config::config::Config;
//! use condaview_dl::{HttpCache, UreqTransport};
//! use condaview_registry::{FeedFetcher, Registry};
//!
//! async fn serve() -> condaview_registry::Result<()> {
//!     let config = Config::default();
//!     let cache = HttpCache::new(Arc::new(UreqTransport::default()), None);
//!     let fetcher = Arc::new(FeedFetcher::new(cache));
//!     let registry = Registry::open(config.enabled_channels(), fetcher).await;
//!
//!     let numpy = registry.find_package("numpy")?;
//!     println!("{} has {} versions", numpy.name, numpy.versions.len());
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod package;
pub mod registry;

#[cfg(test)]
mod test_utils;

pub use channel::{Channel, ReloadOutcome, Snapshot};
pub use error::{RegistryError, Result};
pub use fetcher::{FeedFetcher, FetchOutcome, FetchReport, SkippedArch};
pub use package::{Package, PackageMap, PackageVersion};
pub use registry::{MergedSnapshot, Registry, ReloadSummary};
