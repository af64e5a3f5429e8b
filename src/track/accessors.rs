//! Derived views over a track's tags.

use std::fmt;
use std::path::PathBuf;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::Track;
use crate::error::TagError;
use crate::location;
use crate::tags::{InternalTag, TagKey, TagValue};

const MULTI_VALUE_SEPARATOR: &str = " / ";

/// Numeric fields that sort by value rather than text.
const NUMERIC_SORT_FIELDS: [&str; 5] = [
    "__playcount",
    "__rating",
    "__last_played",
    "__date_added",
    "__modified",
];

/// Comparable sort value. Numbers order before text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Int(i64),
    Text(String),
}

/// Parsed `tracknumber`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackNumber {
    /// `-1` when the tag is absent.
    Number(i64),
    /// Present but not numeric, kept verbatim.
    Text(String),
}

/// Lower-cased, accent-free text with leading punctuation removed.
pub(crate) fn sort_text(value: &str, strip_article: bool) -> String {
    let folded: String = value
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect::<String>()
        .to_lowercase();
    let trimmed = folded.trim_start_matches(|ch: char| !ch.is_alphanumeric());
    if strip_article {
        if let Some(rest) = trimmed.strip_prefix("the ") {
            return rest.to_string();
        }
    }
    trimmed.to_string()
}

impl Track {
    fn internal(&self, tag: InternalTag) -> Option<TagValue> {
        self.get_tag(TagKey::Internal(tag))
    }

    fn joined(&self, name: &str) -> Option<String> {
        self.get_tag(name)
            .map(|value| value.joined(MULTI_VALUE_SEPARATOR))
    }

    /// Values of `name` joined with `" / "`, or an empty string.
    pub fn get_tag_display(&self, name: impl Into<TagKey>) -> String {
        self.get_tag(name)
            .map(|value| value.joined(MULTI_VALUE_SEPARATOR))
            .unwrap_or_default()
    }

    /// Rating on the configured step scale.
    pub fn get_rating(&self) -> u32 {
        let steps = self.context.settings().rating_steps.max(1);
        let Some(stored) = self.internal(InternalTag::Rating).and_then(|v| v.as_f64()) else {
            return 0;
        };
        if !stored.is_finite() {
            return 0;
        }
        let rating = (stored * f64::from(steps) / 100.0).round();
        rating.clamp(0.0, f64::from(steps)) as u32
    }

    /// Stores `step` (clamped to the scale) as a 0-100 value.
    pub fn set_rating(&self, step: f64) {
        if !step.is_finite() {
            return;
        }
        let steps = f64::from(self.context.settings().rating_steps.max(1));
        let step = step.clamp(0.0, steps);
        self.set_tag(InternalTag::Rating, step * 100.0 / steps, false);
    }

    /// `(album artist, album)` grouping key.
    ///
    /// An album artist wins, then an explicit `__compilation` pair, then the
    /// plain artist and album.
    pub fn get_album_key(&self) -> (String, String) {
        if let Some(album_artist) = self.joined("albumartist") {
            return (album_artist.clone(), album_artist);
        }
        if let Some(compilation) = self.internal(InternalTag::Compilation) {
            let values = compilation.to_strings();
            if let [first, second] = values.as_slice() {
                return (first.clone(), second.clone());
            }
        }
        (
            self.joined("artist").unwrap_or_default(),
            self.joined("album").unwrap_or_default(),
        )
    }

    pub fn get_track_number(&self) -> TrackNumber {
        let Some(raw) = self.get_tag("tracknumber").and_then(|value| value.first()) else {
            return TrackNumber::Number(-1);
        };
        let number = raw.split('/').next().unwrap_or_default().trim();
        match number.parse::<i64>() {
            Ok(number) => TrackNumber::Number(number),
            Err(_) => TrackNumber::Text(raw),
        }
    }

    /// Whole seconds from `__length`.
    pub fn get_duration(&self) -> i64 {
        self.internal(InternalTag::Length)
            .and_then(|value| value.as_f64())
            .filter(|seconds| seconds.is_finite())
            .map(|seconds| seconds.trunc() as i64)
            .unwrap_or(0)
    }

    pub fn playcount(&self) -> i64 {
        self.internal(InternalTag::Playcount)
            .and_then(|value| value.as_i64())
            .unwrap_or(0)
    }

    pub fn sort_key(&self, field: &str) -> SortKey {
        match field {
            "tracknumber" => match self.get_track_number() {
                TrackNumber::Number(number) => SortKey::Int(number),
                TrackNumber::Text(text) => SortKey::Text(sort_text(&text, false)),
            },
            "__length" => SortKey::Int(self.get_duration()),
            numeric if NUMERIC_SORT_FIELDS.contains(&numeric) => SortKey::Int(
                self.get_tag(numeric)
                    .and_then(|value| value.as_i64())
                    .unwrap_or(0),
            ),
            "artist" => SortKey::Text(
                self.get_tag("artist")
                    .and_then(|value| value.first())
                    .map(|artist| sort_text(&artist, true))
                    .unwrap_or_default(),
            ),
            "__loc" => SortKey::Text(
                self.location()
                    .map(|loc| sort_text(&loc, false))
                    .unwrap_or_default(),
            ),
            other => SortKey::Text(
                self.get_tag(other)
                    .and_then(|value| value.first())
                    .map(|value| sort_text(&value, false))
                    .unwrap_or_default(),
            ),
        }
    }

    /// Bitrate as shown to users, e.g. `"320k"`.
    pub fn get_bitrate_display(&self) -> String {
        let Some(bitrate) = self.internal(InternalTag::Bitrate) else {
            return String::new();
        };
        if self.get_type().as_deref() != Some("file") {
            // Streams report kbps, sometimes already suffixed.
            return match bitrate {
                TagValue::Int(0) => String::new(),
                TagValue::Int(kbps) => format!("{kbps}k"),
                TagValue::Float(kbps) if kbps == 0.0 => String::new(),
                TagValue::Float(kbps) => format!("{}k", kbps.trunc() as i64),
                other => match other.first() {
                    Some(text) => {
                        let bare = text.replace('k', "");
                        if bare.trim().is_empty() || bare.trim() == "0" {
                            String::new()
                        } else {
                            format!("{bare}k")
                        }
                    }
                    None => String::new(),
                },
            };
        }
        match bitrate.as_i64() {
            Some(bps) if bps / 1000 == 0 => String::new(),
            Some(bps) => format!("{}k", bps / 1000),
            None => bitrate.first().unwrap_or_default(),
        }
    }

    /// Filesystem path for `file://` locations.
    pub fn local_file_name(&self) -> Option<PathBuf> {
        self.location().and_then(|loc| location::local_path(&loc))
    }

    pub fn is_local(&self) -> bool {
        self.local_file_name().is_some()
    }

    /// Whether a local track's file is present. Remote tracks report `false`.
    pub fn exists(&self) -> bool {
        self.local_file_name().is_some_and(|path| path.exists())
    }

    /// URI scheme of the location, e.g. `file` or `http`.
    pub fn get_type(&self) -> Option<String> {
        self.location().and_then(|loc| location::scheme(&loc))
    }

    /// File size in bytes. Only local tracks have one.
    pub fn get_size(&self) -> Result<u64, TagError> {
        let path = self
            .local_file_name()
            .ok_or_else(|| TagError::UnsupportedFormat(self.location().unwrap_or_default()))?;
        Ok(std::fs::metadata(path)?.len())
    }

    pub fn get_loc_for_display(&self) -> String {
        self.location()
            .map(|loc| location::display_form(&loc))
            .unwrap_or_default()
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.joined("title") {
            Some(title) => write!(f, "'{title}'")?,
            None => f.write_str("'Unknown'")?,
        }
        if let Some(artist) = self.joined("artist") {
            write!(f, " by '{artist}'")?;
        }
        if let Some(album) = self.joined("album") {
            write!(f, " from '{album}'")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{sort_text, SortKey, TrackNumber};
    use crate::config::Config;
    use crate::notifier::NullNotifier;
    use crate::tags::{TagInput, TagValue};
    use crate::track::{Track, TrackContext, TrackSettings};

    fn track_at(location: &str) -> Track {
        let context = Arc::new(TrackContext::detached(Arc::new(NullNotifier)));
        Track::at_location(context, location.to_string())
    }

    fn track_with_steps(steps: u32) -> Arc<Track> {
        let mut config = Config::default();
        config.tracks.rating_steps = steps;
        let context = Arc::new(TrackContext::new(
            Arc::new(NullNotifier),
            Arc::new(crate::codec::NoCodecs),
            TrackSettings::from_config(&config),
        ));
        Track::transient(context)
    }

    #[test]
    fn test_rating_round_trips_on_step_scale() {
        let track = track_with_steps(5);
        assert_eq!(track.get_rating(), 0);

        track.set_rating(3.0);
        assert_eq!(track.get_tag("__rating"), Some(TagValue::Float(60.0)));
        assert_eq!(track.get_rating(), 3);

        track.set_rating(9.0);
        assert_eq!(track.get_rating(), 5);
        track.set_rating(-2.0);
        assert_eq!(track.get_rating(), 0);
    }

    #[test]
    fn test_set_rating_ignores_non_finite_input() {
        let track = track_with_steps(10);
        track.set_rating(7.0);
        track.set_rating(f64::NAN);
        track.set_rating(f64::INFINITY);
        assert_eq!(track.get_rating(), 7);
    }

    #[test]
    fn test_get_rating_tolerates_malformed_and_out_of_range_values() {
        let track = track_with_steps(5);
        track.set_tag("__rating", "not a number", false);
        assert_eq!(track.get_rating(), 0);
        track.set_tag("__rating", 250.0, false);
        assert_eq!(track.get_rating(), 5);
    }

    #[test]
    fn test_album_key_prefers_album_artist_then_compilation() {
        let track = track_at("file:///m/a.flac");
        track.set_tag("artist", "Artist", false);
        track.set_tag("album", "Album", false);
        assert_eq!(track.get_album_key(), ("Artist".to_string(), "Album".to_string()));

        track.set_tag(
            "__compilation",
            ("Soundtracks".to_string(), "Drive".to_string()),
            false,
        );
        assert_eq!(
            track.get_album_key(),
            ("Soundtracks".to_string(), "Drive".to_string())
        );

        track.set_tag("albumartist", vec!["X", "Y"], false);
        assert_eq!(track.get_album_key(), ("X / Y".to_string(), "X / Y".to_string()));
    }

    #[test]
    fn test_track_number_parsing() {
        let track = track_at("file:///m/a.flac");
        assert_eq!(track.get_track_number(), TrackNumber::Number(-1));
        track.set_tag("tracknumber", "4/12", false);
        assert_eq!(track.get_track_number(), TrackNumber::Number(4));
        track.set_tag("tracknumber", "A2", false);
        assert_eq!(track.get_track_number(), TrackNumber::Text("A2".to_string()));
    }

    #[test]
    fn test_sort_text_folds_accents_punctuation_and_article() {
        assert_eq!(sort_text("Éclair", false), "eclair");
        assert_eq!(sort_text("...And You Will Know Us", false), "and you will know us");
        assert_eq!(sort_text("The Beatles", true), "beatles");
        assert_eq!(sort_text("The Beatles", false), "the beatles");
    }

    #[test]
    fn test_sort_key_numeric_and_text_fields() {
        let track = track_at("file:///m/a.flac");
        track.set_tag("artist", vec!["The Álbum Leaf", "Other"], false);
        track.set_tag("__length", 245.9, false);
        track.set_tag("__playcount", "oops", false);
        track.set_tag("tracknumber", "7", false);

        assert_eq!(track.sort_key("artist"), SortKey::Text("album leaf".to_string()));
        assert_eq!(track.sort_key("__length"), SortKey::Int(245));
        assert_eq!(track.sort_key("__playcount"), SortKey::Int(0));
        assert_eq!(track.sort_key("tracknumber"), SortKey::Int(7));
        assert_eq!(track.sort_key("genre"), SortKey::Text(String::new()));
        assert!(SortKey::Int(1000) < SortKey::Text("a".to_string()));
    }

    #[test]
    fn test_bitrate_display_for_files_and_streams() {
        let file = track_at("file:///m/a.flac");
        assert_eq!(file.get_bitrate_display(), "");
        file.set_tag("__bitrate", 320_000_i64, false);
        assert_eq!(file.get_bitrate_display(), "320k");
        file.set_tag("__bitrate", 0_i64, false);
        assert_eq!(file.get_bitrate_display(), "");
        file.set_tag("__bitrate", "vbr", false);
        assert_eq!(file.get_bitrate_display(), "vbr");

        let stream = track_at("http://radio.example.com/live");
        stream.set_tag("__bitrate", 128_i64, false);
        assert_eq!(stream.get_bitrate_display(), "128k");
        stream.set_tag("__bitrate", "96k", false);
        assert_eq!(stream.get_bitrate_display(), "96k");
        stream.set_tag("__bitrate", TagInput::Clear, false);
        assert_eq!(stream.get_bitrate_display(), "");
    }

    #[test]
    fn test_location_helpers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("My Song.ogg");
        std::fs::write(&path, b"12345").expect("write fixture");

        let track = track_at(&crate::location::path_to_uri(&path));
        assert!(track.is_local());
        assert!(track.exists());
        assert_eq!(track.get_type().as_deref(), Some("file"));
        assert_eq!(track.get_size().expect("size"), 5);
        assert!(track.get_loc_for_display().ends_with("/My Song.ogg"));

        let remote = track_at("http://radio.example.com/live");
        assert!(!remote.is_local());
        assert!(!remote.exists());
        assert!(remote.get_size().is_err());
        assert_eq!(remote.get_type().as_deref(), Some("http"));
    }

    #[test]
    fn test_display_formats_title_artist_album() {
        let track = track_at("file:///m/a.flac");
        assert_eq!(track.to_string(), "'Unknown'");
        track.set_tag("title", "Words", false);
        track.set_tag("artist", vec!["Low", "Guest"], false);
        track.set_tag("album", "I Could Live in Hope", false);
        assert_eq!(
            track.to_string(),
            "'Words' by 'Low / Guest' from 'I Could Live in Hope'"
        );
    }

    #[test]
    fn test_duration_playcount_and_tag_display() {
        let track = track_at("file:///m/a.flac");
        assert_eq!(track.get_duration(), 0);
        assert_eq!(track.playcount(), 0);
        track.set_tag("__length", 61.8, false);
        track.set_tag("__playcount", 3_i64, false);
        track.set_tag("genre", vec!["Dub", "Ambient"], false);
        assert_eq!(track.get_duration(), 61);
        assert_eq!(track.playcount(), 3);
        assert_eq!(track.get_tag_display("genre"), "Dub / Ambient");
        assert_eq!(track.get_tag_display("missing"), "");
    }
}
