//! Event-bus protocol published by the track metadata core.
//!
//! Consumers (GUI, playlist, scanner) subscribe to a
//! `tokio::sync::broadcast` channel carrying these messages.

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Track(TrackMessage),
}

/// Track-domain notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackMessage {
    /// Topic `track_tags_changed`: a committed edit changed `tag`.
    TagsChanged {
        /// Canonical location; `None` for transient tracks.
        location: Option<String>,
        tag: String,
    },
    /// A live stream started a new logical song; cover/metadata should be refreshed.
    StreamSongChanged { location: Option<String> },
}

impl TrackMessage {
    /// Bus topic name for this notification.
    pub fn topic(&self) -> &'static str {
        match self {
            TrackMessage::TagsChanged { .. } => "track_tags_changed",
            TrackMessage::StreamSongChanged { .. } => "stream_song_changed",
        }
    }
}
