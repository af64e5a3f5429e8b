//! The track entity: a tag bag keyed by canonical location.
//!
//! All mutation goes through one normalization routine (see [`Track::set_tag`]).
//! State sits behind a mutex; change notifications are delivered after the
//! lock is released, so subscribers may read the track they were told about.
//! While a bulk read is in progress (`scanning`) no notifications are sent.

mod accessors;
mod snapshot;

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::UNIX_EPOCH;

use log::{debug, warn};

pub use accessors::{SortKey, TrackNumber};
pub use snapshot::TrackSnapshot;

use crate::codec::{NoCodecs, TagCodecRegistry, TagFormat};
use crate::config::{Config, StreamConfig};
use crate::error::TagError;
use crate::location;
use crate::notifier::ChangeNotifier;
use crate::tags::{normalize, InternalTag, TagInput, TagKey, TagMap, TagValue};

pub(crate) type TagBag = BTreeMap<TagKey, TagValue>;

/// Preferences the accessors and the stream reconciler read.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSettings {
    pub rating_steps: u32,
    pub stream: StreamConfig,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl TrackSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            rating_steps: config.tracks.rating_steps.max(1),
            stream: config.stream.clone(),
        }
    }
}

/// Collaborators shared by every track created through one registry.
pub struct TrackContext {
    notifier: Arc<dyn ChangeNotifier>,
    codecs: Arc<dyn TagCodecRegistry>,
    settings: TrackSettings,
}

impl TrackContext {
    pub fn new(
        notifier: Arc<dyn ChangeNotifier>,
        codecs: Arc<dyn TagCodecRegistry>,
        settings: TrackSettings,
    ) -> Self {
        Self {
            notifier,
            codecs,
            settings,
        }
    }

    /// Context without codecs and with default settings, for scratch tracks.
    pub fn detached(notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self::new(notifier, Arc::new(NoCodecs), TrackSettings::default())
    }

    pub fn notifier(&self) -> &dyn ChangeNotifier {
        self.notifier.as_ref()
    }

    pub fn codecs(&self) -> &dyn TagCodecRegistry {
        self.codecs.as_ref()
    }

    pub fn settings(&self) -> &TrackSettings {
        &self.settings
    }
}

#[derive(Debug, Default)]
struct TrackState {
    tags: TagBag,
    /// Whether the last `read_tags` succeeded.
    scan_valid: bool,
    scanning: bool,
    dirty: bool,
}

/// Result of applying several updates as one batch.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct BatchOutcome {
    /// Every key written, in first-write order, without duplicates.
    pub applied: Vec<TagKey>,
    /// The subset whose stored value differs from before the batch.
    pub changed: Vec<TagKey>,
    /// Whether the track was scanning when the batch committed.
    pub scanning: bool,
}

/// A single media item and its tags.
pub struct Track {
    context: Arc<TrackContext>,
    state: Mutex<TrackState>,
}

/// Resets `scanning` however `read_tags` exits.
struct ScanGuard<'a> {
    track: &'a Track,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.track.lock().scanning = false;
    }
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

/// Applies one update to `tags`. Returns `false` if nothing was written.
fn apply_update(tags: &mut TagBag, key: TagKey, input: TagInput, append: bool) -> bool {
    let encoding = tags
        .get(&TagKey::Internal(InternalTag::Encoding))
        .and_then(TagValue::first);
    let clearing = matches!(input, TagInput::Clear);
    let normalized = normalize(&key, input, encoding.as_deref());

    match normalized {
        None if append && !clearing => false,
        None => {
            tags.remove(&key);
            true
        }
        Some(value) if append => {
            let merged = match tags.get(&key) {
                Some(existing) => {
                    let mut values = existing.to_strings();
                    values.extend(value.to_strings());
                    TagValue::List(values)
                }
                None => value,
            };
            tags.insert(key, merged);
            true
        }
        Some(value) => {
            tags.insert(key, value);
            true
        }
    }
}

impl Track {
    fn with_tags(context: Arc<TrackContext>, tags: TagBag) -> Self {
        Self {
            context,
            state: Mutex::new(TrackState {
                tags,
                ..TrackState::default()
            }),
        }
    }

    /// A track with no location. Never registered.
    pub fn transient(context: Arc<TrackContext>) -> Arc<Track> {
        Arc::new(Self::with_tags(context, TagBag::new()))
    }

    pub(crate) fn at_location(context: Arc<TrackContext>, location: String) -> Self {
        let mut tags = TagBag::new();
        tags.insert(TagKey::Internal(InternalTag::Loc), TagValue::Text(location));
        Self::with_tags(context, tags)
    }

    fn lock(&self) -> MutexGuard<'_, TrackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn context(&self) -> &Arc<TrackContext> {
        &self.context
    }

    /// Canonical location, `None` for transient tracks.
    pub fn location(&self) -> Option<String> {
        self.lock()
            .tags
            .get(&TagKey::Internal(InternalTag::Loc))
            .and_then(TagValue::first)
    }

    /// Stored value for `name`, or `None` when absent.
    pub fn get_tag(&self, name: impl Into<TagKey>) -> Option<TagValue> {
        let key = name.into();
        self.lock().tags.get(&key).cloned()
    }

    /// Like [`Track::get_tag`], with `__playcount` defaulting to zero and
    /// `__basedir` wrapped as a one-element list.
    pub fn get(&self, name: impl Into<TagKey>) -> Option<TagValue> {
        let key = name.into();
        let value = self.get_tag(&key);
        match key {
            TagKey::Internal(InternalTag::Playcount) => value.or(Some(TagValue::Int(0))),
            TagKey::Internal(InternalTag::Basedir) => {
                value.map(|basedir| TagValue::List(basedir.to_strings()))
            }
            _ => value,
        }
    }

    /// Every tag name currently set.
    pub fn tag_names(&self) -> Vec<String> {
        self.lock()
            .tags
            .keys()
            .map(|key| key.as_str().to_string())
            .collect()
    }

    /// Sets, appends to or clears one tag.
    ///
    /// Display tags get scalars wrapped into a one-element list; internal
    /// tags keep them as given. Empty entries are dropped and an empty
    /// result removes the key. Raw bytes are decoded with the track's
    /// `__encoding`. `__loc` can only be changed through
    /// [`crate::TrackRegistry::relocate`].
    ///
    /// Appending nothing leaves the tag unchanged and neither marks the
    /// track dirty nor notifies.
    pub fn set_tag(&self, name: impl Into<TagKey>, values: impl Into<TagInput>, append: bool) {
        let key = name.into();
        if key == TagKey::Internal(InternalTag::Loc) {
            warn!("Ignoring direct write to __loc; relocate the track instead");
            return;
        }
        self.commit(key, values.into(), append);
    }

    /// Replaces a tag; shorthand for `set_tag(name, values, false)`.
    pub fn set(&self, name: impl Into<TagKey>, values: impl Into<TagInput>) {
        self.set_tag(name, values, false);
    }

    pub(crate) fn set_location(&self, location: String) {
        self.commit(
            TagKey::Internal(InternalTag::Loc),
            TagInput::Text(location),
            false,
        );
    }

    fn commit(&self, key: TagKey, input: TagInput, append: bool) {
        let scanning = {
            let mut state = self.lock();
            if !apply_update(&mut state.tags, key.clone(), input, append) {
                return;
            }
            state.dirty = true;
            state.scanning
        };
        if !scanning {
            self.context.notifier().tags_changed(self, &key);
        }
    }

    /// Applies `updates` on a copy of the tag bag and swaps it in at once.
    /// Sends no notifications; callers decide which to send.
    pub(crate) fn apply_batch(&self, updates: Vec<(TagKey, TagInput)>) -> BatchOutcome {
        let mut state = self.lock();
        let before = state.tags.clone();
        let mut staged = before.clone();
        let mut outcome = BatchOutcome {
            scanning: state.scanning,
            ..BatchOutcome::default()
        };

        for (key, input) in updates {
            if key == TagKey::Internal(InternalTag::Loc) {
                continue;
            }
            if apply_update(&mut staged, key.clone(), input, false) && !outcome.applied.contains(&key) {
                outcome.applied.push(key);
            }
        }
        outcome.changed = outcome
            .applied
            .iter()
            .filter(|key| before.get(*key) != staged.get(*key))
            .cloned()
            .collect();

        if !outcome.applied.is_empty() {
            state.tags = staged;
            state.dirty = true;
        }
        outcome
    }

    pub(crate) fn notify_tags_changed(&self, key: &TagKey) {
        if !self.is_scanning() {
            self.context.notifier().tags_changed(self, key);
        }
    }

    pub(crate) fn notify_stream_song_changed(&self) {
        if !self.is_scanning() {
            self.context.notifier().stream_song_changed(self);
        }
    }

    /// Repopulates the tag bag from the location's codec.
    ///
    /// Codec values are merged over the current bag on a staged copy which
    /// only replaces the live bag once the whole read succeeded. No change
    /// notifications are sent for the read.
    pub fn read_tags(&self) -> Result<Arc<dyn TagFormat>, TagError> {
        {
            let mut state = self.lock();
            state.scanning = true;
            state.scan_valid = false;
        }
        let _guard = ScanGuard { track: self };

        let result = self.scan();
        match &result {
            Ok(format) => debug!(
                "Read tags via {} for {}",
                format.name(),
                self.location().unwrap_or_default()
            ),
            Err(TagError::UnsupportedFormat(location)) => {
                debug!("No tag codec for {}", location)
            }
            Err(error) => warn!("Failed to read tags: {}", error),
        }
        result
    }

    fn scan(&self) -> Result<Arc<dyn TagFormat>, TagError> {
        let location = self
            .location()
            .ok_or_else(|| TagError::UnsupportedFormat(String::new()))?;
        let format = self
            .context
            .codecs()
            .format_for(&location)
            .ok_or_else(|| TagError::UnsupportedFormat(location.clone()))?;

        let read = catch_unwind(AssertUnwindSafe(|| format.read_all(&location))).map_err(
            |payload| {
                TagError::codec(
                    &location,
                    format!("codec panicked: {}", panic_payload_to_string(payload.as_ref())),
                )
            },
        )??;

        let mut staged = self.lock().tags.clone();
        for (name, value) in read {
            let key = TagKey::parse(&name);
            if key == TagKey::Internal(InternalTag::Loc) {
                continue;
            }
            apply_update(&mut staged, key, TagInput::from(value), false);
        }

        if let Some(path) = location::local_path(&location) {
            match std::fs::metadata(&path).and_then(|meta| meta.modified()) {
                Ok(modified) => {
                    let seconds = modified
                        .duration_since(UNIX_EPOCH)
                        .map(|elapsed| elapsed.as_secs_f64())
                        .unwrap_or(0.0);
                    staged.insert(
                        TagKey::Internal(InternalTag::Modified),
                        TagValue::Float(seconds),
                    );
                }
                Err(error) => warn!("Could not read mtime of {}: {}", path.display(), error),
            }
            if let Some(parent) = path.parent() {
                staged.insert(
                    TagKey::Internal(InternalTag::Basedir),
                    TagValue::Text(parent.to_string_lossy().into_owned()),
                );
            }
        }

        let mut state = self.lock();
        state.tags = staged;
        state.dirty = true;
        state.scan_valid = true;
        Ok(format)
    }

    /// Writes the tag bag back through the location's codec.
    ///
    /// Leaves the dirty flag alone; see [`Track::mark_clean`].
    pub fn write_tags(&self) -> Result<Arc<dyn TagFormat>, TagError> {
        let location = self
            .location()
            .ok_or_else(|| TagError::UnsupportedFormat(String::new()))?;
        let format = self
            .context
            .codecs()
            .format_for(&location)
            .ok_or_else(|| TagError::UnsupportedFormat(location.clone()))?;
        let tags = self.tag_map();

        catch_unwind(AssertUnwindSafe(|| format.write_tags(&location, &tags)))
            .map_err(|payload| {
                TagError::codec(
                    &location,
                    format!("codec panicked: {}", panic_payload_to_string(payload.as_ref())),
                )
            })?
            .inspect_err(|error| warn!("Failed to write tags: {}", error))?;
        Ok(format)
    }

    /// Every tag rendered as text, in codec form.
    pub fn tag_map(&self) -> TagMap {
        self.lock()
            .tags
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value.to_strings()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Marks the current tags as persisted.
    pub fn mark_clean(&self) {
        self.lock().dirty = false;
    }

    pub fn is_scanning(&self) -> bool {
        self.lock().scanning
    }

    /// Whether the last `read_tags` succeeded.
    pub fn is_scan_valid(&self) -> bool {
        self.lock().scan_valid
    }
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Track")
            .field("tags", &state.tags)
            .field("dirty", &state.dirty)
            .field("scanning", &state.scanning)
            .field("scan_valid", &state.scan_valid)
            .finish()
    }
}
