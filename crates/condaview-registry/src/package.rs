//! Package records served by channels and the registry.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use condaview_config::channel::ChannelConfig;
use serde::{Deserialize, Serialize};

use crate::feed::{ChannelDataEntry, RepoDataEntry};

/// Packages keyed by name.
pub type PackageMap = BTreeMap<String, Package>;

/// One artifact of a package as listed in an architecture index.
///
/// The artifact, architecture and channel together identify the index entry
/// the record was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
    /// Artifact file name, the key of the index entry.
    pub artifact: String,
    pub download_url: String,
    /// Version string exactly as published; never parsed or normalized.
    pub number: String,
    pub original_license: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub dependencies: Option<Vec<String>>,
    pub arch: String,
    pub channel: String,
}

impl PackageVersion {
    /// Builds a version from an index entry of `arch`.
    ///
    /// The entry's own `subdir` wins over `arch` when present. The publish
    /// time is the entry's millisecond timestamp truncated to whole seconds.
    pub fn from_entry(
        upstream: &ChannelConfig,
        arch: &str,
        artifact: String,
        entry: RepoDataEntry,
    ) -> Self {
        let subdir = entry.subdir.unwrap_or_else(|| arch.to_string());
        let download_url = format!("{}/{}/{}", upstream.base_url(), subdir, artifact);
        let published_at = entry
            .timestamp
            .and_then(|millis| DateTime::from_timestamp(millis.div_euclid(1000), 0));

        Self {
            artifact,
            download_url,
            number: entry.version.unwrap_or_default(),
            original_license: entry.license,
            published_at,
            dependencies: entry.depends,
            arch: subdir,
            channel: upstream.channel.clone(),
        }
    }
}

/// A named package with its versions in fold order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub repository_url: Option<String>,
    pub homepage: Option<String>,
    pub licenses: Option<String>,
    pub description: Option<String>,
    pub versions: Vec<PackageVersion>,
}

impl Package {
    /// Creates an empty package described by its catalog entry, if the
    /// catalog has one.
    pub fn from_catalog(name: &str, catalog: Option<&ChannelDataEntry>) -> Self {
        let catalog = catalog.cloned().unwrap_or_default();
        Self {
            name: name.to_string(),
            repository_url: catalog.dev_url,
            homepage: catalog.home,
            licenses: catalog.license,
            description: catalog.description,
            versions: Vec::new(),
        }
    }

    /// Versions whose number is exactly `version`.
    pub fn versions_matching(&self, version: &str) -> Vec<PackageVersion> {
        self.versions
            .iter()
            .filter(|v| v.number == version)
            .cloned()
            .collect()
    }

    /// Copy of the package keeping only the first version seen for each
    /// distinct version number.
    pub fn deduplicated(&self) -> Package {
        let mut seen = HashSet::new();
        let versions = self
            .versions
            .iter()
            .filter(|v| seen.insert(v.number.as_str()))
            .cloned()
            .collect();

        Package {
            versions,
            ..self.without_versions()
        }
    }

    fn without_versions(&self) -> Package {
        Package {
            name: self.name.clone(),
            repository_url: self.repository_url.clone(),
            homepage: self.homepage.clone(),
            licenses: self.licenses.clone(),
            description: self.description.clone(),
            versions: Vec::new(),
        }
    }
}
