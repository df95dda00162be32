//! A single upstream channel and its current snapshot.

use std::{
    sync::{Arc, RwLock},
    time::Instant,
};

use chrono::{DateTime, Utc};
use condaview_config::channel::ChannelConfig;
use condaview_events::FeedEvent;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    error::{RegistryError, Result},
    fetcher::{FeedFetcher, FetchReport},
    package::{Package, PackageMap, PackageVersion},
};

/// The package maps produced by one fetch pass.
///
/// A snapshot is never modified after it is built. Reloading swaps in a
/// whole new one, so a reader holding a snapshot always sees both maps from
/// the same pass.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub packages: Arc<PackageMap>,
    /// One version per distinct version number, first seen wins.
    pub deduplicated: Arc<PackageMap>,
    /// When the pass that built this snapshot finished. `None` until the
    /// first successful pass.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Snapshot {
    fn build(packages: PackageMap) -> Self {
        let deduplicated = deduplicate(&packages);
        Self {
            packages: Arc::new(packages),
            deduplicated: Arc::new(deduplicated),
            timestamp: Some(Utc::now()),
        }
    }
}

fn deduplicate(packages: &PackageMap) -> PackageMap {
    packages
        .par_iter()
        .map(|(name, package)| (name.clone(), package.deduplicated()))
        .collect()
}

#[derive(Debug, Clone)]
pub enum ReloadOutcome {
    /// A new snapshot was swapped in.
    Reloaded(FetchReport),
    /// Another reload of this channel was in flight; nothing was done.
    AlreadyRunning,
}

/// One upstream channel mounted under a label.
pub struct Channel {
    upstream: ChannelConfig,
    fetcher: Arc<FeedFetcher>,
    snapshot: RwLock<Arc<Snapshot>>,
    reloading: tokio::sync::Mutex<()>,
}

impl Channel {
    /// Creates a channel with an empty snapshot. Nothing is fetched until
    /// [`Channel::reload`] is called.
    pub fn new(upstream: ChannelConfig, fetcher: Arc<FeedFetcher>) -> Self {
        Self {
            upstream,
            fetcher,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            reloading: tokio::sync::Mutex::new(()),
        }
    }

    /// Creates a channel and runs its initial fetch.
    ///
    /// A failed initial fetch is logged and leaves the channel empty; the
    /// next reload retries it.
    pub async fn open(upstream: ChannelConfig, fetcher: Arc<FeedFetcher>) -> Self {
        let channel = Self::new(upstream, fetcher);
        if let Err(err) = channel.reload().await {
            warn!("Initial fetch of channel {} failed: {}", channel.label(), err);
        }
        channel
    }

    pub fn label(&self) -> &str {
        &self.upstream.label
    }

    pub fn upstream(&self) -> &ChannelConfig {
        &self.upstream
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self
            .snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Every package with every version from the last successful pass.
    pub fn packages(&self) -> Arc<PackageMap> {
        Arc::clone(&self.snapshot().packages)
    }

    /// Every package with one version per version number.
    pub fn only_one_version_packages(&self) -> Arc<PackageMap> {
        Arc::clone(&self.snapshot().deduplicated)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.snapshot().timestamp
    }

    /// Looks up a package in the current snapshot.
    pub fn package(&self, name: &str) -> Result<Package> {
        self.snapshot()
            .packages
            .get(name)
            .cloned()
            .ok_or_else(|| self.not_found(name))
    }

    /// Versions of `name` whose number is exactly `version`.
    ///
    /// An existing package without a matching version yields an empty list.
    pub fn package_version(&self, name: &str, version: &str) -> Result<Vec<PackageVersion>> {
        let snapshot = self.snapshot();
        let package = snapshot
            .packages
            .get(name)
            .ok_or_else(|| self.not_found(name))?;
        Ok(package.versions_matching(version))
    }

    /// Runs a fetch pass and swaps in the resulting snapshot.
    ///
    /// Readers keep seeing the previous snapshot for the whole pass; the
    /// write lock is only taken for the swap. If the pass fails, the
    /// previous snapshot and its timestamp stay in place. A call made while
    /// another reload of this channel is running returns
    /// [`ReloadOutcome::AlreadyRunning`] without fetching.
    pub async fn reload(&self) -> Result<ReloadOutcome> {
        let Ok(_guard) = self.reloading.try_lock() else {
            debug!(channel = self.label(), "reload already in flight");
            return Ok(ReloadOutcome::AlreadyRunning);
        };

        let started = Instant::now();
        let events = self.fetcher.events();

        let outcome = match self.fetcher.retrieve_packages(&self.upstream).await {
            Ok(outcome) => outcome,
            Err(err) => {
                events.emit(FeedEvent::ChannelReloadFailed {
                    label: self.label().to_string(),
                    error: err.to_string(),
                });
                return Err(err);
            }
        };

        let packages = outcome.packages;
        let snapshot = tokio::task::spawn_blocking(move || Snapshot::build(packages))
            .await
            .map_err(|err| RegistryError::TaskFailed(err.to_string()))?;
        let count = snapshot.packages.len();

        self.swap(Arc::new(snapshot));

        let report = outcome.report;
        let elapsed = started.elapsed();
        info!(
            channel = self.label(),
            packages = count,
            skipped = report.skipped.len(),
            "Reloaded channel {} in {:.1} sec",
            self.label(),
            elapsed.as_secs_f64()
        );
        events.emit(FeedEvent::ChannelReloaded {
            label: self.label().to_string(),
            packages: count,
            skipped: report.skipped.len(),
            elapsed_ms: elapsed.as_millis() as u64,
        });

        Ok(ReloadOutcome::Reloaded(report))
    }

    fn swap(&self, snapshot: Arc<Snapshot>) {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = snapshot;
    }

    fn not_found(&self, name: &str) -> RegistryError {
        RegistryError::PackageNotFound {
            channel: self.label().to_string(),
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use condaview_dl::{DownloadError, HttpCache, Transport, TransportResponse, Validators};

    use super::*;
    use crate::test_utils::{catalog, catalog_url, harness, index, index_url, serve_channel, upstream};

    fn forge() -> ChannelConfig {
        upstream("CondaForge", "conda-forge")
    }

    #[tokio::test]
    async fn test_new_channel_is_empty() {
        let h = harness();
        let channel = Channel::new(forge(), h.fetcher.clone());

        assert!(channel.packages().is_empty());
        assert!(channel.only_one_version_packages().is_empty());
        assert_eq!(channel.timestamp(), None);
        assert!(h.transport.calls().is_empty());

        let err = channel.package("numpy").unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_open_and_query() {
        let h = harness();
        serve_channel(
            &h.transport,
            &forge(),
            &["numpy"],
            &[
                ("linux-64", &[("numpy", "1.24.3"), ("numpy", "1.26.0")]),
                ("osx-arm64", &[("numpy", "1.24.3")]),
            ],
        );

        let channel = Channel::open(forge(), h.fetcher.clone()).await;
        assert_eq!(channel.label(), "CondaForge");
        assert_eq!(channel.upstream().channel, "conda-forge");
        assert!(channel.timestamp().is_some());

        let numpy = channel.package("numpy").unwrap();
        assert_eq!(numpy.versions.len(), 3);

        let matching = channel.package_version("numpy", "1.24.3").unwrap();
        let arches: Vec<_> = matching.iter().map(|v| v.arch.as_str()).collect();
        assert_eq!(arches, vec!["linux-64", "osx-arm64"]);

        // Existing package, no such version: empty, not an error.
        assert!(channel.package_version("numpy", "0.0.1").unwrap().is_empty());

        let err = channel.package_version("scipy", "1.0").unwrap_err();
        assert!(matches!(
            err,
            RegistryError::PackageNotFound { ref channel, ref name }
                if channel == "CondaForge" && name == "scipy"
        ));
    }

    #[tokio::test]
    async fn test_deduplicated_view() {
        let h = harness();
        serve_channel(
            &h.transport,
            &forge(),
            &["numpy"],
            &[
                ("linux-64", &[("numpy", "1.24.3")]),
                ("noarch", &[("numpy", "1.26.0")]),
                ("osx-arm64", &[("numpy", "1.24.3"), ("numpy", "1.26.0")]),
            ],
        );

        let channel = Channel::open(forge(), h.fetcher.clone()).await;
        let dedup = channel.only_one_version_packages();
        let versions = &dedup["numpy"].versions;

        let seen: Vec<_> = versions
            .iter()
            .map(|v| (v.number.as_str(), v.arch.as_str()))
            .collect();
        assert_eq!(seen, vec![("1.24.3", "linux-64"), ("1.26.0", "noarch")]);
        assert_eq!(channel.packages()["numpy"].versions.len(), 4);
    }

    #[tokio::test]
    async fn test_reads_return_same_snapshot() {
        let h = harness();
        serve_channel(&h.transport, &forge(), &[], &[("noarch", &[("tzdata", "2023c")])]);

        let channel = Channel::open(forge(), h.fetcher.clone()).await;
        assert!(Arc::ptr_eq(&channel.packages(), &channel.packages()));
        assert!(Arc::ptr_eq(
            &channel.only_one_version_packages(),
            &channel.only_one_version_packages()
        ));

        let before = channel.snapshot();
        channel.reload().await.unwrap();
        let after = channel.snapshot();
        assert!(!Arc::ptr_eq(&before, &after));
        // A held snapshot is unaffected by the swap.
        assert_eq!(before.packages.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_snapshot() {
        let h = harness();
        serve_channel(&h.transport, &forge(), &["numpy"], &[("noarch", &[("numpy", "1.0")])]);

        let channel = Channel::open(forge(), h.fetcher.clone()).await;
        let before = channel.snapshot();
        let stamp = channel.timestamp();

        h.transport.fail(&catalog_url(&forge()), 502);
        let err = channel.reload().await.unwrap_err();
        assert!(matches!(err, RegistryError::FailedToFetchRemote { .. }));

        assert!(Arc::ptr_eq(&before, &channel.snapshot()));
        assert_eq!(channel.timestamp(), stamp);
        assert!(h
            .events
            .for_channel("CondaForge")
            .iter()
            .any(|e| matches!(e, FeedEvent::ChannelReloadFailed { .. })));
    }

    #[tokio::test]
    async fn test_failed_initial_fetch_leaves_channel_empty() {
        let h = harness();
        let channel = Channel::open(forge(), h.fetcher.clone()).await;
        assert!(channel.packages().is_empty());
        assert_eq!(channel.timestamp(), None);
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_versions() {
        let h = harness();
        serve_channel(&h.transport, &forge(), &["numpy"], &[("noarch", &[("numpy", "1.0")])]);
        let channel = Channel::open(forge(), h.fetcher.clone()).await;

        h.transport
            .serve(&index_url(&forge(), "noarch"), index("noarch", &[("numpy", "1.0"), ("numpy", "2.0")]));
        h.transport.serve(&catalog_url(&forge()), catalog(&["numpy"]));

        let outcome = channel.reload().await.unwrap();
        assert!(matches!(outcome, ReloadOutcome::Reloaded(ref r) if r.fetched == vec!["noarch"]));
        assert_eq!(channel.packages()["numpy"].versions.len(), 2);
    }

    /// Transport that holds every request until released.
    struct GatedTransport {
        gate: std::sync::Mutex<bool>,
        released: std::sync::Condvar,
    }

    impl GatedTransport {
        fn new() -> Self {
            Self {
                gate: std::sync::Mutex::new(false),
                released: std::sync::Condvar::new(),
            }
        }

        fn release(&self) {
            *self.gate.lock().unwrap() = true;
            self.released.notify_all();
        }
    }

    impl Transport for GatedTransport {
        fn get(
            &self,
            _url: &str,
            _validators: &Validators,
        ) -> std::result::Result<TransportResponse, DownloadError> {
            let mut open = self.gate.lock().unwrap();
            while !*open {
                open = self.released.wait(open).unwrap();
            }
            Ok(TransportResponse {
                status: 200,
                body: br#"{"packages": {}}"#.to_vec(),
                etag: None,
                last_modified: None,
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlapping_reloads_are_coalesced() {
        let transport = Arc::new(GatedTransport::new());
        let fetcher = Arc::new(
            FeedFetcher::new(HttpCache::new(transport.clone(), None))
                .with_architectures(vec!["noarch".to_string()]),
        );
        let channel = Arc::new(Channel::new(forge(), fetcher));

        let first = tokio::spawn({
            let channel = channel.clone();
            async move { channel.reload().await }
        });
        // Let the first reload take the lock and block on the transport.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let second = channel.reload().await.unwrap();
        assert!(matches!(second, ReloadOutcome::AlreadyRunning));

        transport.release();
        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, ReloadOutcome::Reloaded(_)));
        assert!(channel.timestamp().is_some());
    }
}
