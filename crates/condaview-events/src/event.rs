/// Events emitted while channels are fetched, reloaded and merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// A fetch pass started for an upstream channel.
    ChannelFetchStarted { channel: String, url: String },
    /// An architecture index was fetched and parsed.
    ArchFetched {
        channel: String,
        arch: String,
        entries: usize,
    },
    /// An architecture index could not be fetched or parsed and was left out
    /// of the pass.
    ArchSkipped {
        channel: String,
        arch: String,
        reason: String,
    },
    /// A channel swapped in a new snapshot.
    ChannelReloaded {
        label: String,
        packages: usize,
        skipped: usize,
        elapsed_ms: u64,
    },
    /// A channel reload failed; the previous snapshot stays in place.
    ChannelReloadFailed { label: String, error: String },
    /// The registry swapped in a new merged package map.
    RegistryMerged { channels: usize, packages: usize },
}

impl FeedEvent {
    /// The upstream channel name or mount label the event concerns, if any.
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::ChannelFetchStarted { channel, .. }
            | Self::ArchFetched { channel, .. }
            | Self::ArchSkipped { channel, .. } => Some(channel.as_str()),
            Self::ChannelReloaded { label, .. } | Self::ChannelReloadFailed { label, .. } => {
                Some(label.as_str())
            }
            Self::RegistryMerged { .. } => None,
        }
    }

    /// Whether the event reports data left out of a pass.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ArchSkipped { .. } | Self::ChannelReloadFailed { .. }
        )
    }
}
