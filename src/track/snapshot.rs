//! Persistable copies of a track's tag bag.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{TagBag, Track, TrackContext};
use crate::tags::{InternalTag, TagKey, TagValue};

/// Deep copy of every tag, internal ones included.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub tags: BTreeMap<String, TagValue>,
}

impl TrackSnapshot {
    /// The `__loc` the snapshot was taken at, if any.
    pub fn location(&self) -> Option<String> {
        self.tags
            .get(InternalTag::Loc.as_str())
            .and_then(TagValue::first)
    }

    fn to_bag(&self) -> TagBag {
        self.tags
            .iter()
            .map(|(name, value)| (TagKey::parse(name), value.clone()))
            .collect()
    }
}

impl Track {
    pub fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            tags: self
                .lock()
                .tags
                .iter()
                .map(|(key, value)| (key.as_str().to_string(), value.clone()))
                .collect(),
        }
    }

    /// Takes a snapshot and marks the track clean.
    pub fn persist_snapshot(&self) -> TrackSnapshot {
        let mut state = self.lock();
        let snapshot = TrackSnapshot {
            tags: state
                .tags
                .iter()
                .map(|(key, value)| (key.as_str().to_string(), value.clone()))
                .collect(),
        };
        state.dirty = false;
        snapshot
    }

    pub(crate) fn from_snapshot(context: Arc<TrackContext>, snapshot: &TrackSnapshot) -> Self {
        Self::with_tags(context, snapshot.to_bag())
    }

    /// Replaces the whole bag with the snapshot's tags. The location is kept.
    pub(crate) fn restore_from(&self, snapshot: &TrackSnapshot) {
        let mut bag = snapshot.to_bag();
        let mut state = self.lock();
        let loc = TagKey::Internal(InternalTag::Loc);
        match state.tags.get(&loc) {
            Some(current) => {
                bag.insert(loc, current.clone());
            }
            None => {
                bag.remove(&loc);
            }
        }
        state.tags = bag;
        state.dirty = false;
    }
}
