//! Destinations for [`FeedEvent`]s.
//!
//! Fetch passes run on blocking worker threads, so sinks must accept events
//! from any thread and must never block the pass or fail it.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::FeedEvent;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: FeedEvent);
}

/// Forwards events to a [`Receiver`], typically drained by a display thread.
///
/// Events emitted after the receiver is dropped are discarded.
pub struct ChannelSink {
    sender: Sender<FeedEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<FeedEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender,
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: FeedEvent) {
        let _ = self.sender.send(event);
    }
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: FeedEvent) {}
}

/// Keeps every event in emission order, for assertions in tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct CollectorSink {
    events: std::sync::Mutex<Vec<FeedEvent>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl CollectorSink {
    pub fn events(&self) -> Vec<FeedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events concerning the channel or label `name`.
    pub fn for_channel(&self, name: &str) -> Vec<FeedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.channel() == Some(name))
            .collect()
    }

    /// Skipped architectures and failed reloads.
    pub fn failures(&self) -> Vec<FeedEvent> {
        self.events()
            .into_iter()
            .filter(FeedEvent::is_failure)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl EventSink for CollectorSink {
    fn emit(&self, event: FeedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
