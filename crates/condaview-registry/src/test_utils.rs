use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use condaview_config::channel::ChannelConfig;
use condaview_dl::{DownloadError, HttpCache, Transport, TransportResponse, Validators};
use condaview_events::{CollectorSink, EventSinkHandle};
use serde_json::{json, Value};

use crate::fetcher::FeedFetcher;

pub const ARCHES: [&str; 3] = ["linux-64", "noarch", "osx-arm64"];

/// Transport serving canned bodies per URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, TransportResponse>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn serve(&self, url: &str, body: Value) {
        self.respond(
            url,
            TransportResponse {
                status: 200,
                body: serde_json::to_vec(&body).unwrap(),
                etag: None,
                last_modified: None,
            },
        );
    }

    pub fn serve_raw(&self, url: &str, body: &str) {
        self.respond(
            url,
            TransportResponse {
                status: 200,
                body: body.as_bytes().to_vec(),
                etag: None,
                last_modified: None,
            },
        );
    }

    pub fn fail(&self, url: &str, status: u16) {
        self.respond(
            url,
            TransportResponse {
                status,
                ..TransportResponse::default()
            },
        );
    }

    pub fn respond(&self, url: &str, resp: TransportResponse) {
        self.routes.lock().unwrap().insert(url.to_string(), resp);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn get(
        &self,
        url: &str,
        _validators: &Validators,
    ) -> Result<TransportResponse, DownloadError> {
        self.calls.lock().unwrap().push(url.to_string());
        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(TransportResponse {
                status: 404,
                ..TransportResponse::default()
            }))
    }
}

pub fn upstream(label: &str, channel: &str) -> ChannelConfig {
    ChannelConfig::new(label, channel, "conda.example.org")
}

pub fn catalog_url(upstream: &ChannelConfig) -> String {
    format!("{}/channeldata.json", upstream.base_url())
}

pub fn index_url(upstream: &ChannelConfig, arch: &str) -> String {
    format!("{}/{}/repodata.json", upstream.base_url(), arch)
}

pub fn catalog(names: &[&str]) -> Value {
    let packages: serde_json::Map<String, Value> = names
        .iter()
        .map(|name| {
            (
                name.to_string(),
                json!({
                    "dev_url": format!("https://github.com/{name}/{name}"),
                    "home": format!("https://{name}.org"),
                    "license": "BSD-3-Clause",
                    "description": format!("The {name} package"),
                }),
            )
        })
        .collect();
    json!({ "packages": packages })
}

/// Builds an index for `arch` from `(name, version)` pairs. Artifact names
/// embed the arch so the same version on two arches stays distinct.
pub fn index(arch: &str, entries: &[(&str, &str)]) -> Value {
    let packages: serde_json::Map<String, Value> = entries
        .iter()
        .map(|(name, version)| {
            (
                format!("{name}-{version}-{arch}_0.tar.bz2"),
                json!({
                    "name": name,
                    "version": version,
                    "license": "BSD-3-Clause",
                    "depends": ["python >=3.11"],
                    "subdir": arch,
                    "timestamp": 1684929335287_i64,
                }),
            )
        })
        .collect();
    json!({ "info": { "subdir": arch }, "packages": packages })
}

/// Serves a channel whose catalog lists `names` and whose indexes come from
/// `indexes` as `(arch, entries)`. Arches without an index answer 404.
pub fn serve_channel(
    transport: &FakeTransport,
    upstream: &ChannelConfig,
    names: &[&str],
    indexes: &[(&str, &[(&str, &str)])],
) {
    transport.serve(&catalog_url(upstream), catalog(names));
    for (arch, entries) in indexes {
        transport.serve(&index_url(upstream, arch), index(arch, entries));
    }
}

pub struct Harness {
    pub transport: Arc<FakeTransport>,
    pub events: Arc<CollectorSink>,
    pub fetcher: Arc<FeedFetcher>,
}

pub fn harness() -> Harness {
    let transport = Arc::new(FakeTransport::default());
    let events = Arc::new(CollectorSink::default());
    let sink: EventSinkHandle = events.clone();
    let cache = HttpCache::new(transport.clone(), None);
    let fetcher = Arc::new(
        FeedFetcher::new(cache)
            .with_architectures(ARCHES.iter().map(|a| a.to_string()).collect())
            .with_concurrency(2)
            .with_events(sink),
    );

    Harness {
        transport,
        events,
        fetcher,
    }
}
