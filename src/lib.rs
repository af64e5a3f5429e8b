//! Track metadata core of a media player.
//!
//! A [`TrackRegistry`] hands out one shared [`Track`] per canonical location.
//! Tracks hold a tag bag which is filled from a pluggable tag codec, edited
//! through [`Track::set_tag`] and fed by live streams through the
//! [`StreamTagReconciler`]. Committed edits are reported to an injected
//! [`ChangeNotifier`].

pub mod codec;
pub mod config;
pub mod discovery;
pub mod error;
pub mod location;
pub mod notifier;
pub mod protocol;
pub mod registry;
pub mod stream_tags;
pub mod summary;
pub mod tags;
pub mod track;

pub use codec::{LoftyCodecRegistry, NoCodecs, TagCodecRegistry, TagCodecResult, TagFormat};
pub use config::{Config, StreamConfig, StreamNotifyPolicy};
pub use error::{ConfigError, RegistryError, TagError};
pub use notifier::{BusNotifier, ChangeNotifier, NullNotifier, RecordingNotifier};
pub use protocol::{Message, TrackMessage};
pub use registry::TrackRegistry;
pub use stream_tags::{StreamBurst, StreamTagReconciler, StreamValue};
pub use summary::{format_length, LengthFormat, TrackListSummary};
pub use tags::{InternalTag, TagInput, TagKey, TagMap, TagValue};
pub use track::{SortKey, Track, TrackContext, TrackNumber, TrackSettings, TrackSnapshot};
