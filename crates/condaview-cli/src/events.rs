use std::{sync::mpsc::Receiver, thread::JoinHandle};

use condaview_events::FeedEvent;
use nu_ansi_term::Color::{Cyan, Green, Red, Yellow};
use tracing::debug;

use crate::utils::Colored;

/// Joins the event handler thread once every sender is gone.
pub struct EventGuard {
    handle: Option<JoinHandle<()>>,
}

impl EventGuard {
    /// Waits for the handler to drain the remaining events.
    ///
    /// The registry holding the sink must be dropped first, otherwise this
    /// blocks forever.
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

pub fn spawn_event_handler(receiver: Receiver<FeedEvent>) -> EventGuard {
    let handle = std::thread::spawn(move || {
        while let Ok(event) = receiver.recv() {
            match event {
                FeedEvent::ChannelFetchStarted {
                    channel,
                    url,
                } => debug!("{} fetching {}", Colored(Cyan, &channel), url),
                FeedEvent::ArchFetched {
                    channel,
                    arch,
                    entries,
                } => debug!("{}/{}: {} entries", Colored(Cyan, &channel), arch, entries),
                FeedEvent::ArchSkipped {
                    channel,
                    arch,
                    reason,
                } => {
                    debug!(
                        "{}/{}: {} ({})",
                        Colored(Cyan, &channel),
                        arch,
                        Colored(Yellow, "skipped"),
                        reason
                    )
                }
                FeedEvent::ChannelReloaded {
                    label,
                    packages,
                    skipped,
                    elapsed_ms,
                } => {
                    debug!(
                        "{} {} with {} packages, {} architectures skipped, {} ms",
                        Colored(Cyan, &label),
                        Colored(Green, "reloaded"),
                        packages,
                        skipped,
                        elapsed_ms
                    )
                }
                FeedEvent::ChannelReloadFailed {
                    label,
                    error,
                } => debug!("{} {}: {}", Colored(Cyan, &label), Colored(Red, "failed"), error),
                FeedEvent::RegistryMerged {
                    channels,
                    packages,
                } => debug!("merged {} packages from {} channels", packages, channels),
            }
        }
    });

    EventGuard {
        handle: Some(handle),
    }
}
