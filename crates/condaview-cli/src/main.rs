use std::{sync::Arc, time::Duration};

use clap::Parser;
use cli::{Args, Commands};
use condaview_config::config::Config;
use condaview_dl::{http_client::ClientConfig, open_store, HttpCache, UreqTransport};
use condaview_events::{ChannelSink, EventSinkHandle, NullSink};
use condaview_registry::{FeedFetcher, Registry};
use condaview_utils::time::parse_duration;
use events::{spawn_event_handler, EventGuard};
use logging::setup_logging;
use miette::miette;
use query::{print_channel, print_package, print_packages, print_status};
use tracing::{debug, warn};
use ureq::Proxy;
use utils::set_color;
use watch::watch;

mod cli;
mod events;
mod logging;
mod query;
mod utils;
mod watch;

fn create_events(args: &Args) -> (EventSinkHandle, Option<EventGuard>) {
    if args.verbose > 0 && !args.quiet {
        let (sink, receiver) = ChannelSink::new();
        let events: EventSinkHandle = Arc::new(sink);
        (events, Some(spawn_event_handler(receiver)))
    } else {
        (Arc::new(NullSink), None)
    }
}

fn client_config(args: &Args, config: &Config) -> miette::Result<ClientConfig> {
    let proxy = args
        .proxy
        .as_deref()
        .map(|proxy| Proxy::new(proxy).map_err(|err| miette!("Invalid proxy '{proxy}': {err}")))
        .transpose()?;

    Ok(ClientConfig {
        user_agent: Some(
            args.user_agent
                .clone()
                .unwrap_or_else(|| config.user_agent()),
        ),
        proxy,
        timeout: Some(config.request_timeout()?),
    })
}

/// Builds the registry described by `config` and runs the initial fetch of
/// every enabled channel.
async fn open_registry(
    args: &Args,
    config: &Config,
    events: EventSinkHandle,
) -> miette::Result<Registry> {
    let transport = Arc::new(UreqTransport::new(&client_config(args, config)?));

    let store = match open_store(config.cache_url.as_deref()) {
        Ok(store) => store,
        Err(err) => {
            warn!("Cache store unavailable, fetching without cache: {}", err);
            None
        }
    };

    let cache = HttpCache::new(transport, store).with_ttl(config.cache_ttl()?);
    debug!(cached = cache.has_store(), "http cache ready");

    let fetcher = FeedFetcher::new(cache)
        .with_architectures(config.architectures())
        .with_concurrency(config.concurrency())
        .with_events(events);

    Ok(Registry::open(config.enabled_channels(), Arc::new(fetcher)).await)
}

fn refresh_interval(config: &Config, interval: Option<&str>) -> miette::Result<Duration> {
    match interval {
        Some(interval) => {
            let parsed = parse_duration(interval)?;
            if parsed.is_zero() {
                return Err(miette!("Refresh interval '{interval}' must be longer than zero"));
            }
            Ok(parsed)
        }
        None => Ok(config.refresh_interval()?),
    }
}

async fn handle_cli(args: Args) -> miette::Result<()> {
    if matches!(args.command, Commands::DefConfig) {
        println!("{}", Config::default().to_toml()?);
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;
    let (events, event_guard) = create_events(&args);
    let registry = open_registry(&args, &config, events).await?;

    let result = match &args.command {
        Commands::Packages => print_packages(&registry),
        Commands::Package {
            name,
            version,
        } => print_package(&registry, name, version.as_deref()),
        Commands::Channel {
            label,
            name,
            version,
        } => print_channel(&registry, label, name.as_deref(), version.as_deref()),
        Commands::Status => print_status(&registry, args.json),
        Commands::Watch {
            interval,
        } => {
            match refresh_interval(&config, interval.as_deref()) {
                Ok(interval) => watch(&registry, interval).await,
                Err(err) => Err(err),
            }
        }
        Commands::DefConfig => Ok(()),
    };

    // The registry owns the last event sender; drop it so the handler drains.
    drop(registry);
    if let Some(guard) = event_guard {
        guard.finish();
    }

    result
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    let args = Args::parse();
    setup_logging(&args);
    if args.no_color {
        set_color(false);
    }

    handle_cli(args).await
}
