use chrono::{DateTime, Utc};
use condaview_registry::Registry;
use nu_ansi_term::Color::{Blue, Cyan, Green, LightRed};
use serde::Serialize;
use tracing::info;

use crate::utils::{print_json, Colored};

pub fn print_packages(registry: &Registry) -> miette::Result<()> {
    print_json(registry.packages().as_ref())
}

pub fn print_package(registry: &Registry, name: &str, version: Option<&str>) -> miette::Result<()> {
    let package = match version {
        Some(version) => registry.find_package_version(name, version)?,
        None => registry.find_package(name)?,
    };
    print_json(&package)
}

pub fn print_channel(
    registry: &Registry,
    label: &str,
    name: Option<&str>,
    version: Option<&str>,
) -> miette::Result<()> {
    match (name, version) {
        (Some(name), Some(version)) => {
            print_json(&registry.package_by_channel(label, name, version)?)
        }
        (Some(name), None) => print_json(&registry.package(label, name)?),
        (None, _) => print_json(registry.packages_by_channel(label)?.as_ref()),
    }
}

#[derive(Serialize)]
struct ChannelStatus {
    label: String,
    channel: String,
    url: String,
    packages: usize,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct RegistryStatus {
    last_updated: Option<DateTime<Utc>>,
    packages: usize,
    channels: Vec<ChannelStatus>,
}

fn collect_status(registry: &Registry) -> RegistryStatus {
    let channels = registry
        .channels()
        .map(|channel| {
            let snapshot = channel.snapshot();
            ChannelStatus {
                label: channel.label().to_string(),
                channel: channel.upstream().channel.clone(),
                url: channel.upstream().base_url(),
                packages: snapshot.packages.len(),
                updated_at: snapshot.timestamp,
            }
        })
        .collect();

    RegistryStatus {
        last_updated: registry.last_updated(),
        packages: registry.packages().len(),
        channels,
    }
}

pub fn print_status(registry: &Registry, json: bool) -> miette::Result<()> {
    let status = collect_status(registry);
    if json {
        return print_json(&status);
    }

    for channel in &status.channels {
        let updated = channel
            .updated_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        info!(
            "{} ({}) {} packages, updated {}",
            Colored(Blue, &channel.label),
            Colored(Cyan, &channel.url),
            Colored(Green, channel.packages),
            Colored(LightRed, updated)
        );
    }
    info!(
        "{} packages across {} channels",
        Colored(Green, status.packages),
        status.channels.len()
    );

    Ok(())
}
