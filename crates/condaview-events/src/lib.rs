mod event;
mod sink;

use std::sync::Arc;

pub use event::*;
pub use sink::*;

/// Shared handle to an event sink.
pub type EventSinkHandle = Arc<dyn EventSink>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sink() {
        let sink = NullSink;
        sink.emit(FeedEvent::ChannelFetchStarted {
            channel: "main".to_string(),
            url: "https://repo.anaconda.com/pkgs/main".to_string(),
        });
    }

    #[test]
    fn test_channel_sink() {
        let (sink, rx) = ChannelSink::new();
        sink.emit(FeedEvent::ArchFetched {
            channel: "conda-forge".to_string(),
            arch: "noarch".to_string(),
            entries: 42,
        });
        sink.emit(FeedEvent::ArchSkipped {
            channel: "conda-forge".to_string(),
            arch: "linux-64".to_string(),
            reason: "HTTP 500".to_string(),
        });

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            FeedEvent::ArchFetched {
                entries: 42,
                ..
            }
        ));
        assert!(matches!(&events[1], FeedEvent::ArchSkipped { arch, .. } if arch == "linux-64"));
    }

    #[test]
    fn test_channel_sink_receiver_dropped() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(FeedEvent::RegistryMerged {
            channels: 1,
            packages: 0,
        });
    }

    #[test]
    fn test_collector_sink() {
        let sink = CollectorSink::default();
        assert!(sink.is_empty());

        sink.emit(FeedEvent::ChannelReloadFailed {
            label: "Main".to_string(),
            error: "timeout".to_string(),
        });
        sink.emit(FeedEvent::ChannelReloaded {
            label: "BioConda".to_string(),
            packages: 10,
            skipped: 1,
            elapsed_ms: 1200,
        });

        assert_eq!(sink.len(), 2);
        let events = sink.events();
        assert!(matches!(&events[0], FeedEvent::ChannelReloadFailed { .. }));
        assert!(matches!(
            &events[1],
            FeedEvent::ChannelReloaded {
                packages: 10,
                ..
            }
        ));
    }

    #[test]
    fn test_collector_filters() {
        let sink = CollectorSink::default();
        sink.emit(FeedEvent::ArchSkipped {
            channel: "conda-forge".to_string(),
            arch: "linux-64".to_string(),
            reason: "HTTP 500".to_string(),
        });
        sink.emit(FeedEvent::ChannelReloaded {
            label: "CondaForge".to_string(),
            packages: 3,
            skipped: 1,
            elapsed_ms: 10,
        });
        sink.emit(FeedEvent::RegistryMerged {
            channels: 1,
            packages: 3,
        });

        assert_eq!(sink.for_channel("conda-forge").len(), 1);
        assert_eq!(sink.for_channel("CondaForge").len(), 1);
        assert_eq!(sink.failures().len(), 1);
        assert!(matches!(&sink.failures()[0], FeedEvent::ArchSkipped { .. }));
    }

    #[test]
    fn test_sink_handle_is_shareable() {
        let collector = Arc::new(CollectorSink::default());
        let handle: EventSinkHandle = collector.clone();

        let threads: Vec<_> = (0..4)
            .map(|i| {
                let handle = handle.clone();
                std::thread::spawn(move || {
                    handle.emit(FeedEvent::ArchFetched {
                        channel: "main".to_string(),
                        arch: format!("arch-{i}"),
                        entries: i,
                    });
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(collector.len(), 4);
    }
}
