//! Merges live-stream metadata bursts into a track.
//!
//! A source pushes an unordered set of key/value pairs per burst. Each
//! recognized key maps to one tag; the title is the pivot used to detect
//! that the stream moved on to a new song.

use std::collections::HashMap;

use log::debug;

use crate::config::{StreamConfig, StreamNotifyPolicy};
use crate::location;
use crate::tags::{decode_text, InternalTag, TagInput, TagKey, TagValue};
use crate::track::Track;

/// A value as reported by the stream source.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamValue {
    Text(String),
    /// Undecoded bytes, expected to be UTF-8.
    Bytes(Vec<u8>),
    UInt(u64),
    Float(f64),
}

impl StreamValue {
    fn as_text(&self) -> Result<String, String> {
        match self {
            StreamValue::Text(text) => Ok(text.clone()),
            StreamValue::Bytes(bytes) => decode_text(bytes, None),
            StreamValue::UInt(value) => Ok(value.to_string()),
            StreamValue::Float(value) => Ok(value.to_string()),
        }
    }

    fn as_u64(&self) -> Result<u64, String> {
        match self {
            StreamValue::UInt(value) => Ok(*value),
            StreamValue::Float(value) if value.is_finite() && *value >= 0.0 => {
                Ok(value.trunc() as u64)
            }
            StreamValue::Float(value) => Err(format!("not a count: {value}")),
            other => {
                let text = other.as_text()?;
                text.trim()
                    .parse::<u64>()
                    .map_err(|error| format!("'{text}': {error}"))
            }
        }
    }
}

impl From<&str> for StreamValue {
    fn from(value: &str) -> Self {
        StreamValue::Text(value.to_string())
    }
}

impl From<String> for StreamValue {
    fn from(value: String) -> Self {
        StreamValue::Text(value)
    }
}

impl From<u64> for StreamValue {
    fn from(value: u64) -> Self {
        StreamValue::UInt(value)
    }
}

/// One burst of stream metadata.
pub type StreamBurst = HashMap<String, StreamValue>;

/// Applies stream bursts according to a [`StreamConfig`].
#[derive(Debug, Clone, Default)]
pub struct StreamTagReconciler {
    config: StreamConfig,
}

fn text_tag(name: &str, value: String) -> (TagKey, TagInput) {
    (TagKey::parse(name), TagInput::List(vec![Some(value)]))
}

impl StreamTagReconciler {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Uses the stream settings of the track's own context.
    pub fn for_track(track: &Track) -> Self {
        Self::new(track.context().settings().stream.clone())
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    fn extension_listed(list: &[String], extension: Option<&str>) -> bool {
        extension.is_some_and(|ext| list.iter().any(|listed| listed == ext))
    }

    /// Merges `burst` into `track`. Returns `true` when a new song started.
    ///
    /// Never fails: values that cannot be decoded or parsed are logged and
    /// skipped. The burst is committed as a single batch.
    pub fn reconcile(&self, track: &Track, burst: &StreamBurst) -> bool {
        let extension = track
            .location()
            .and_then(|loc| location::extension(&loc));
        let comment_overloaded =
            Self::extension_listed(&self.config.comment_overload_extensions, extension.as_deref());
        let keep_full_title =
            Self::extension_listed(&self.config.unsplit_title_extensions, extension.as_deref());
        let previous_raw_title = track
            .get_tag(InternalTag::RawTitle)
            .and_then(|value| value.first());

        let mut log_lines = vec!["Stream tag:".to_string()];
        let mut updates = Vec::new();
        let mut title_artist = None;
        let mut new_song = false;

        let mut keys: Vec<&String> = burst.keys().collect();
        keys.sort();

        for key in keys {
            let raw = &burst[key];
            let text = match raw.as_text() {
                Ok(text) => text,
                Err(reason) => {
                    log_lines.push(format!("  {key} [can't decode]: {raw:?} ({reason})"));
                    continue;
                }
            };
            log_lines.push(format!("  {key}: {text}"));

            match key.as_str() {
                "bitrate" | "__bitrate" => match raw.as_u64() {
                    Ok(bps) => updates.push((
                        TagKey::Internal(InternalTag::Bitrate),
                        TagInput::Int((bps / 1000) as i64),
                    )),
                    Err(reason) => log_lines.push(format!("  {key} skipped: {reason}")),
                },
                "comment" => {
                    if !comment_overloaded && !burst.contains_key("album") {
                        updates.push(text_tag("album", text));
                    }
                }
                "album" | "artist" | "genre" => updates.push(text_tag(key, text)),
                "track-number" => updates.push(text_tag("tracknumber", text)),
                "duration" => match raw.as_u64() {
                    Ok(nanos) => updates.push((
                        TagKey::Internal(InternalTag::Length),
                        TagInput::Float(nanos as f64 / 1_000_000_000.0),
                    )),
                    Err(reason) => log_lines.push(format!("  {key} skipped: {reason}")),
                },
                "title" => {
                    if text.is_empty() {
                        continue;
                    }
                    if previous_raw_title.as_deref() != Some(text.as_str()) {
                        new_song = true;
                    }
                    updates.push((
                        TagKey::Internal(InternalTag::RawTitle),
                        TagInput::Text(text.clone()),
                    ));
                    match text.split_once(" - ") {
                        Some((artist, title)) if !keep_full_title => {
                            title_artist = Some(artist.to_string());
                            updates.push(text_tag("title", title.to_string()));
                        }
                        _ => updates.push(text_tag("title", text)),
                    }
                }
                _ => {}
            }
        }

        // An explicit artist key wins over one split out of the title.
        if let Some(artist) = title_artist {
            if !burst.contains_key("artist") {
                updates.push(text_tag("artist", artist));
            }
        }

        if new_song {
            log_lines.push("  New song, fetching cover.".to_string());
        }
        for line in &log_lines {
            debug!("{}", line);
        }

        let outcome = track.apply_batch(updates);
        if !outcome.scanning {
            let notify: &[TagKey] = match self.config.notify_policy {
                StreamNotifyPolicy::PerTag => &outcome.applied,
                StreamNotifyPolicy::Coalesced => &outcome.changed,
                StreamNotifyPolicy::Suppressed => &[],
            };
            for key in notify {
                track.notify_tags_changed(key);
            }
            if new_song {
                track.notify_stream_song_changed();
            }
        }
        new_song
    }
}

/// Reads the last raw stream title recorded on `track`.
pub fn raw_title(track: &Track) -> Option<String> {
    track
        .get_tag(InternalTag::RawTitle)
        .as_ref()
        .and_then(TagValue::first)
}
