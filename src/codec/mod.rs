//! Pluggable tag codec capability.
//!
//! The track core never parses files itself. It asks a [`TagCodecRegistry`]
//! for the format handling a location and calls `read_all`/`write_tags` on it.

mod lofty_codec;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use lofty_codec::{LoftyCodecRegistry, LoftyFormat, SUPPORTED_AUDIO_EXTENSIONS};

use crate::error::TagError;
use crate::tags::{TagMap, TagValue};

/// Everything a codec read produced, keyed by tag name.
pub type TagCodecResult = BTreeMap<String, TagValue>;

/// Reader/writer for one file format.
pub trait TagFormat: Send + Sync {
    /// Short format name, used in logs.
    fn name(&self) -> &str;

    /// Reads every tag the container holds. Blocking I/O.
    fn read_all(&self, location: &str) -> Result<TagCodecResult, TagError>;

    /// Writes `tags` back to the container. Blocking I/O.
    fn write_tags(&self, location: &str, tags: &TagMap) -> Result<(), TagError>;
}

/// Maps a location to the format able to handle it.
pub trait TagCodecRegistry: Send + Sync {
    /// `None` means the format is not supported.
    fn format_for(&self, location: &str) -> Option<Arc<dyn TagFormat>>;
}

/// Registry that supports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCodecs;

impl TagCodecRegistry for NoCodecs {
    fn format_for(&self, _location: &str) -> Option<Arc<dyn TagFormat>> {
        None
    }
}
