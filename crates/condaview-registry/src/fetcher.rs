//! One fetch pass over a channel's catalog and architecture indexes.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use condaview_config::{
    channel::{ChannelConfig, DEFAULT_ARCHITECTURES},
    config::DEFAULT_CONCURRENCY,
};
use condaview_dl::HttpCache;
use condaview_events::{EventSinkHandle, FeedEvent, NullSink};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{
    error::{RegistryError, Result},
    feed::{ChannelData, RepoData, RepoDataEntry},
    package::{Package, PackageMap, PackageVersion},
};

/// An architecture left out of a pass, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArch {
    pub arch: String,
    pub reason: String,
}

/// What a fetch pass managed to fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Architectures folded into the package map, in fold order.
    pub fetched: Vec<String>,
    pub skipped: Vec<SkippedArch>,
    pub elapsed: Duration,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub packages: PackageMap,
    pub report: FetchReport,
}

/// Result of one architecture task.
enum ArchFetch {
    Fetched {
        arch: String,
        entries: Vec<(String, RepoDataEntry)>,
    },
    Skipped {
        arch: String,
        reason: String,
    },
}

/// Fetches channel feeds through an [`HttpCache`].
///
/// Architecture indexes are downloaded concurrently, at most `concurrency`
/// at a time. Their results are folded into the package map one after the
/// other in architecture order once every download has finished, so the
/// outcome does not depend on which download completes first.
pub struct FeedFetcher {
    cache: HttpCache,
    architectures: Arc<[String]>,
    concurrency: usize,
    events: EventSinkHandle,
}

impl FeedFetcher {
    pub fn new(cache: HttpCache) -> Self {
        Self {
            cache,
            architectures: DEFAULT_ARCHITECTURES.iter().map(|a| a.to_string()).collect(),
            concurrency: DEFAULT_CONCURRENCY,
            events: Arc::new(NullSink),
        }
    }

    pub fn with_architectures(mut self, architectures: Vec<String>) -> Self {
        self.architectures = architectures.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_events(mut self, events: EventSinkHandle) -> Self {
        self.events = events;
        self
    }

    pub fn architectures(&self) -> &[String] {
        &self.architectures
    }

    pub fn events(&self) -> &EventSinkHandle {
        &self.events
    }

    /// Runs a full pass over `upstream`.
    ///
    /// # Errors
    ///
    /// Fails only when the catalog cannot be fetched or parsed. An
    /// architecture whose index cannot be fetched or parsed is left out and
    /// listed in [`FetchReport::skipped`].
    pub async fn retrieve_packages(&self, upstream: &ChannelConfig) -> Result<FetchOutcome> {
        let started = Instant::now();
        let base_url = upstream.base_url();

        info!("Fetching packages for channel {}...", base_url);
        self.events.emit(FeedEvent::ChannelFetchStarted {
            channel: upstream.channel.clone(),
            url: base_url.clone(),
        });

        let catalog: ChannelData = self
            .fetch_json(format!("{base_url}/channeldata.json"))
            .await?;
        debug!(
            channel = upstream.channel,
            packages = catalog.packages.len(),
            "catalog fetched"
        );

        let results = self.fetch_architectures(&base_url).await;
        let mut outcome = self.fold(upstream, &catalog, results);
        outcome.report.elapsed = started.elapsed();

        info!(
            channel = upstream.channel,
            packages = outcome.packages.len(),
            skipped = outcome.report.skipped.len(),
            elapsed_ms = outcome.report.elapsed.as_millis() as u64,
            "Finished {} in {:.1} sec",
            base_url,
            outcome.report.elapsed.as_secs_f64()
        );

        Ok(outcome)
    }

    async fn fetch_json<T>(&self, url: String) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || fetch_document(&cache, &url))
            .await
            .map_err(|err| RegistryError::TaskFailed(err.to_string()))?
    }

    /// Fetches every architecture index, returning one result per
    /// architecture in architecture order.
    async fn fetch_architectures(&self, base_url: &str) -> Vec<ArchFetch> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(self.architectures.len());

        for arch in self.architectures.iter() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    handles.push((arch.clone(), Err(err.to_string())));
                    continue;
                }
            };
            let cache = self.cache.clone();
            let url = format!("{base_url}/{arch}/repodata.json");

            let handle = tokio::task::spawn_blocking(move || {
                debug!("fetching {}", url);
                let result = fetch_document::<RepoData>(&cache, &url);
                drop(permit);
                result
            });
            handles.push((arch.clone(), Ok(handle)));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (arch, handle) in handles {
            let result = match handle {
                Ok(handle) => {
                    match handle.await {
                        Ok(Ok(index)) => {
                            ArchFetch::Fetched {
                                arch,
                                entries: index.packages.into_iter().collect(),
                            }
                        }
                        Ok(Err(err)) => {
                            ArchFetch::Skipped {
                                arch,
                                reason: err.to_string(),
                            }
                        }
                        Err(err) => {
                            ArchFetch::Skipped {
                                arch,
                                reason: format!("task failed: {err}"),
                            }
                        }
                    }
                }
                Err(reason) => {
                    ArchFetch::Skipped {
                        arch,
                        reason,
                    }
                }
            };
            results.push(result);
        }

        results
    }

    /// Folds architecture results into a package map, in order.
    ///
    /// A package is created from its catalog entry the first time any
    /// architecture lists it; later architectures only append versions.
    fn fold(
        &self,
        upstream: &ChannelConfig,
        catalog: &ChannelData,
        results: Vec<ArchFetch>,
    ) -> FetchOutcome {
        let mut packages = PackageMap::new();
        let mut report = FetchReport::default();

        for result in results {
            match result {
                ArchFetch::Fetched {
                    arch,
                    entries,
                } => {
                    self.events.emit(FeedEvent::ArchFetched {
                        channel: upstream.channel.clone(),
                        arch: arch.clone(),
                        entries: entries.len(),
                    });

                    for (artifact, entry) in entries {
                        let Some(name) = entry.name.clone() else {
                            debug!(arch, artifact, "index entry has no name, skipping");
                            continue;
                        };
                        let package = packages.entry(name).or_insert_with_key(|name| {
                            Package::from_catalog(name, catalog.packages.get(name))
                        });
                        package
                            .versions
                            .push(PackageVersion::from_entry(upstream, &arch, artifact, entry));
                    }

                    report.fetched.push(arch);
                }
                ArchFetch::Skipped {
                    arch,
                    reason,
                } => {
                    warn!(
                        "Failed to fetch for {} {}/{}/repodata.json: {}",
                        arch,
                        upstream.base_url(),
                        arch,
                        reason
                    );
                    self.events.emit(FeedEvent::ArchSkipped {
                        channel: upstream.channel.clone(),
                        arch: arch.clone(),
                        reason: reason.clone(),
                    });
                    report.skipped.push(SkippedArch {
                        arch,
                        reason,
                    });
                }
            }
        }

        FetchOutcome {
            packages,
            report,
        }
    }
}

fn fetch_document<T: DeserializeOwned>(cache: &HttpCache, url: &str) -> Result<T> {
    let body = cache.fetch(url).map_err(|source| {
        RegistryError::FailedToFetchRemote {
            url: url.to_string(),
            source,
        }
    })?;
    serde_json::from_slice(&body).map_err(|source| {
        RegistryError::Json {
            url: url.to_string(),
            source,
        }
    })
}
