//! Change notification seam injected into tracks.

use std::sync::Mutex;

use tokio::sync::broadcast::Sender;

use crate::protocol::{Message, TrackMessage};
use crate::tags::TagKey;
use crate::track::Track;

/// Receives committed track mutations.
///
/// Called synchronously on the mutating thread, after the track's state lock
/// has been released. Never called while the track is scanning.
pub trait ChangeNotifier: Send + Sync {
    fn tags_changed(&self, track: &Track, tag: &TagKey);

    fn stream_song_changed(&self, _track: &Track) {}
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl ChangeNotifier for NullNotifier {
    fn tags_changed(&self, _track: &Track, _tag: &TagKey) {}
}

/// Forwards notifications onto the broadcast bus.
#[derive(Debug, Clone)]
pub struct BusNotifier {
    bus_producer: Sender<Message>,
}

impl BusNotifier {
    pub fn new(bus_producer: Sender<Message>) -> Self {
        Self { bus_producer }
    }
}

impl ChangeNotifier for BusNotifier {
    fn tags_changed(&self, track: &Track, tag: &TagKey) {
        // No subscribers is not an error.
        let _ = self
            .bus_producer
            .send(Message::Track(TrackMessage::TagsChanged {
                location: track.location(),
                tag: tag.as_str().to_string(),
            }));
    }

    fn stream_song_changed(&self, track: &Track) {
        let _ = self
            .bus_producer
            .send(Message::Track(TrackMessage::StreamSongChanged {
                location: track.location(),
            }));
    }
}

/// Records notifications in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<TrackMessage>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains everything recorded so far.
    pub fn take(&self) -> Vec<TrackMessage> {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::take(&mut *events)
    }

    /// Tag names of the recorded `TagsChanged` events, draining the log.
    pub fn take_tags(&self) -> Vec<String> {
        self.take()
            .into_iter()
            .filter_map(|event| match event {
                TrackMessage::TagsChanged { tag, .. } => Some(tag),
                TrackMessage::StreamSongChanged { .. } => None,
            })
            .collect()
    }

    fn push(&self, event: TrackMessage) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }
}

impl ChangeNotifier for RecordingNotifier {
    fn tags_changed(&self, track: &Track, tag: &TagKey) {
        self.push(TrackMessage::TagsChanged {
            location: track.location(),
            tag: tag.as_str().to_string(),
        });
    }

    fn stream_song_changed(&self, track: &Track) {
        self.push(TrackMessage::StreamSongChanged {
            location: track.location(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use super::{BusNotifier, ChangeNotifier};
    use crate::protocol::{Message, TrackMessage};
    use crate::track::{Track, TrackContext};

    #[test]
    fn test_bus_notifier_publishes_tags_changed_topic() {
        let (bus_producer, mut bus_consumer) = broadcast::channel(8);
        let notifier: Arc<dyn ChangeNotifier> = Arc::new(BusNotifier::new(bus_producer));
        let track = Track::transient(Arc::new(TrackContext::detached(notifier)));

        track.set_tag("artist", "Broadcast", false);

        match bus_consumer.try_recv() {
            Ok(Message::Track(message)) => {
                assert_eq!(message.topic(), "track_tags_changed");
                assert_eq!(
                    message,
                    TrackMessage::TagsChanged {
                        location: None,
                        tag: "artist".to_string(),
                    }
                );
            }
            other => panic!("expected TagsChanged, got {other:?}"),
        }
    }

    #[test]
    fn test_bus_notifier_without_subscribers_does_not_fail() {
        let (bus_producer, bus_consumer) = broadcast::channel::<Message>(1);
        drop(bus_consumer);
        let notifier: Arc<dyn ChangeNotifier> = Arc::new(BusNotifier::new(bus_producer));
        let track = Track::transient(Arc::new(TrackContext::detached(notifier)));

        track.set_tag("title", "Nobody listening", false);
        assert_eq!(track.get_tag_display("title"), "Nobody listening");
    }
}
