//! The set of mounted channels and the package map merged across them.

use std::{
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use condaview_config::channel::ChannelConfig;
use condaview_events::{EventSinkHandle, FeedEvent, NullSink};
use tracing::{error, info};

use crate::{
    channel::{Channel, ReloadOutcome},
    error::{RegistryError, Result},
    fetcher::FeedFetcher,
    package::{Package, PackageMap, PackageVersion},
};

/// The merged package map and when it was built.
#[derive(Debug, Default)]
pub struct MergedSnapshot {
    pub packages: Arc<PackageMap>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Per-channel results of a [`Registry::reload_all`] call, in channel order.
#[derive(Debug, Default)]
pub struct ReloadSummary {
    pub channels: Vec<(String, Result<ReloadOutcome>)>,
    pub packages: usize,
    pub elapsed: Duration,
}

impl ReloadSummary {
    pub fn failed(&self) -> impl Iterator<Item = (&str, &RegistryError)> {
        self.channels.iter().filter_map(|(label, result)| {
            result.as_ref().err().map(|err| (label.as_str(), err))
        })
    }
}

/// Every mounted channel, in lookup order.
pub struct Registry {
    channels: Vec<Arc<Channel>>,
    merged: RwLock<Arc<MergedSnapshot>>,
    events: EventSinkHandle,
}

impl Registry {
    /// Mounts already constructed channels and merges their current
    /// snapshots. Nothing is fetched.
    pub fn new(channels: Vec<Channel>) -> Self {
        let channels: Vec<Arc<Channel>> = channels.into_iter().map(Arc::new).collect();
        let registry = Self {
            channels,
            merged: RwLock::new(Arc::new(MergedSnapshot::default())),
            events: Arc::new(NullSink),
        };
        registry.merge();
        registry
    }

    /// Mounts a channel per entry of `upstreams`, in order, and runs the
    /// initial fetch of all of them.
    ///
    /// Channels whose initial fetch fails start out empty.
    pub async fn open(upstreams: Vec<ChannelConfig>, fetcher: Arc<FeedFetcher>) -> Self {
        let events = fetcher.events().clone();
        let channels = upstreams
            .into_iter()
            .map(|upstream| Arc::new(Channel::new(upstream, fetcher.clone())))
            .collect();
        let registry = Self {
            channels,
            merged: RwLock::new(Arc::new(MergedSnapshot::default())),
            events,
        };

        let summary = registry.reload_all().await;
        for (label, err) in summary.failed() {
            error!("Initial fetch of channel {} failed: {}", label, err);
        }

        registry
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().map(|c| c.as_ref())
    }

    pub fn channel_labels(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.label().to_string()).collect()
    }

    pub fn channel(&self, label: &str) -> Result<&Channel> {
        self.channels
            .iter()
            .find(|c| c.label() == label)
            .map(|c| c.as_ref())
            .ok_or_else(|| RegistryError::ChannelNotFound(label.to_string()))
    }

    pub fn merged(&self) -> Arc<MergedSnapshot> {
        let guard = self
            .merged
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// The merged map of every channel's deduplicated packages.
    pub fn packages(&self) -> Arc<PackageMap> {
        Arc::clone(&self.merged().packages)
    }

    /// The raw package map of one channel.
    pub fn packages_by_channel(&self, label: &str) -> Result<Arc<PackageMap>> {
        Ok(self.channel(label)?.packages())
    }

    pub fn package(&self, label: &str, name: &str) -> Result<Package> {
        self.channel(label)?.package(name)
    }

    pub fn package_by_channel(
        &self,
        label: &str,
        name: &str,
        version: &str,
    ) -> Result<Vec<PackageVersion>> {
        self.channel(label)?.package_version(name, version)
    }

    /// The package as recorded by the first channel, in mount order, that
    /// has it. Later channels are not consulted.
    pub fn find_package(&self, name: &str) -> Result<Package> {
        self.channels
            .iter()
            .find_map(|c| c.packages().get(name).cloned())
            .ok_or_else(|| RegistryError::PackageNotFoundAnywhere(name.to_string()))
    }

    /// Like [`Registry::find_package`], keeping only versions numbered
    /// exactly `version`.
    pub fn find_package_version(&self, name: &str, version: &str) -> Result<Package> {
        let package = self.find_package(name)?;
        let versions = package.versions_matching(version);
        Ok(Package {
            versions,
            ..package
        })
    }

    /// When the first channel last reloaded successfully.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.channels.first().and_then(|c| c.timestamp())
    }

    /// Reloads every channel concurrently, then rebuilds the merged map.
    ///
    /// A channel whose reload fails keeps serving its previous snapshot and
    /// still contributes it to the merge.
    pub async fn reload_all(&self) -> ReloadSummary {
        let started = Instant::now();

        let handles: Vec<_> = self
            .channels
            .iter()
            .map(|channel| {
                let channel = channel.clone();
                tokio::spawn(async move { channel.reload().await })
            })
            .collect();

        let mut channels = Vec::with_capacity(handles.len());
        for (channel, handle) in self.channels.iter().zip(handles) {
            let result = handle
                .await
                .unwrap_or_else(|err| Err(RegistryError::TaskFailed(err.to_string())));
            if let Err(err) = &result {
                error!("Failed to reload channel {}: {}", channel.label(), err);
            }
            channels.push((channel.label().to_string(), result));
        }

        let packages = self.merge();
        let elapsed = started.elapsed();
        info!(
            channels = self.channels.len(),
            packages,
            "Reloaded all channels in {:.1} sec",
            elapsed.as_secs_f64()
        );

        ReloadSummary {
            channels,
            packages,
            elapsed,
        }
    }

    /// Rebuilds the merged map from each channel's deduplicated view and
    /// swaps it in. Returns the number of merged packages.
    fn merge(&self) -> usize {
        let mut packages = PackageMap::new();
        for channel in &self.channels {
            for (name, package) in channel.only_one_version_packages().iter() {
                match packages.get_mut(name) {
                    Some(merged) => merged.versions.extend(package.versions.iter().cloned()),
                    None => {
                        packages.insert(name.clone(), package.clone());
                    }
                }
            }
        }

        let count = packages.len();
        let snapshot = Arc::new(MergedSnapshot {
            packages: Arc::new(packages),
            timestamp: Some(Utc::now()),
        });
        {
            let mut guard = self
                .merged
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = snapshot;
        }

        self.events.emit(FeedEvent::RegistryMerged {
            channels: self.channels.len(),
            packages: count,
        });
        count
    }
}
