//! Tag codec backed by `lofty`.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lofty::config::{ParseOptions, ParsingMode, WriteOptions};
use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{ItemKey, ItemValue, Tag, TagItem};
use log::debug;

use super::{TagCodecRegistry, TagCodecResult, TagFormat};
use crate::error::TagError;
use crate::location;
use crate::tags::{TagMap, TagValue};

/// Extensions the lofty codec is registered for.
pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 8] =
    ["mp3", "wav", "ogg", "flac", "aac", "m4a", "mp4", "opus"];

/// Tag names used in the bag for each lofty key. Order is the write order.
const ITEM_KEY_TAGS: [(ItemKey, &str); 14] = [
    (ItemKey::TrackTitle, "title"),
    (ItemKey::TrackArtist, "artist"),
    (ItemKey::AlbumTitle, "album"),
    (ItemKey::AlbumArtist, "albumartist"),
    (ItemKey::TrackNumber, "tracknumber"),
    (ItemKey::DiscNumber, "discnumber"),
    (ItemKey::Genre, "genre"),
    (ItemKey::RecordingDate, "date"),
    (ItemKey::Comment, "comment"),
    (ItemKey::Composer, "composer"),
    (ItemKey::Publisher, "organization"),
    (ItemKey::CopyrightMessage, "copyright"),
    (ItemKey::Isrc, "isrc"),
    (ItemKey::Bpm, "bpm"),
];

fn parse_options(parsing_mode: ParsingMode, max_junk_bytes: usize) -> ParseOptions {
    ParseOptions::new()
        .read_properties(true)
        .read_cover_art(false)
        .parsing_mode(parsing_mode)
        .max_junk_bytes(max_junk_bytes)
}

/// Extension-based probe first, then a relaxed content-based guess.
fn read_tagged_file(path: &Path) -> Result<TaggedFile, String> {
    let primary_options = parse_options(ParsingMode::BestAttempt, 1024);
    let relaxed_options = parse_options(ParsingMode::Relaxed, 64 * 1024);

    match Probe::open(path) {
        Ok(probe) => match probe.options(primary_options).read() {
            Ok(tagged_file) => return Ok(tagged_file),
            Err(primary_error) => {
                debug!(
                    "Tag read primary parse failed for {}: {}",
                    path.display(),
                    primary_error
                );
            }
        },
        Err(open_error) => {
            debug!(
                "Tag read could not open {} with extension-based probe: {}",
                path.display(),
                open_error
            );
        }
    }

    let file = File::open(path).map_err(|error| error.to_string())?;
    let guessed = Probe::new(BufReader::new(file))
        .options(relaxed_options)
        .guess_file_type()
        .map_err(|error| error.to_string())?;
    let tagged_file = guessed.read().map_err(|error| error.to_string())?;
    debug!(
        "Tag read recovered via relaxed/content-based parsing for {}",
        path.display()
    );
    Ok(tagged_file)
}

fn non_empty_strings(tag: &Tag, key: ItemKey) -> Vec<String> {
    tag.get_strings(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// Values from the primary tag, falling back to the first other tag that has any.
fn first_non_empty_values(primary_tag: Option<&Tag>, tags: &[Tag], key: ItemKey) -> Vec<String> {
    if let Some(tag) = primary_tag {
        let values = non_empty_strings(tag, key);
        if !values.is_empty() {
            return values;
        }
    }
    for tag in tags {
        let values = non_empty_strings(tag, key);
        if !values.is_empty() {
            return values;
        }
    }
    Vec::new()
}

fn collect_tags(tagged_file: &TaggedFile) -> TagCodecResult {
    let primary_tag = tagged_file.primary_tag();
    let tags = tagged_file.tags();
    let mut result = TagCodecResult::new();

    for (key, name) in ITEM_KEY_TAGS {
        let values = first_non_empty_values(primary_tag, tags, key);
        if !values.is_empty() {
            result.insert(name.to_string(), TagValue::List(values));
        }
    }

    let total = first_non_empty_values(primary_tag, tags, ItemKey::TrackTotal);
    if let (Some(TagValue::List(numbers)), Some(total)) = (result.get_mut("tracknumber"), total.first()) {
        if let Some(number) = numbers.first_mut() {
            if !number.contains('/') {
                *number = format!("{number}/{total}");
            }
        }
    }

    let properties = tagged_file.properties();
    let duration = properties.duration();
    if !duration.is_zero() {
        result.insert("__length".to_string(), TagValue::Float(duration.as_secs_f64()));
    }
    if let Some(kbps) = properties.audio_bitrate() {
        result.insert("__bitrate".to_string(), TagValue::Int(i64::from(kbps) * 1000));
    }

    result
}

fn apply_values(tag: &mut Tag, key: ItemKey, values: &[String]) {
    tag.remove_key(key);
    let mut values = values.iter().map(|value| value.trim()).filter(|value| !value.is_empty());
    if let Some(first) = values.next() {
        tag.insert_text(key, first.to_string());
    }
    for value in values {
        tag.push(TagItem::new(key, ItemValue::Text(value.to_string())));
    }
}

fn apply_track_number(tag: &mut Tag, values: &[String]) {
    let Some(raw) = values.first() else {
        tag.remove_key(ItemKey::TrackNumber);
        return;
    };
    match raw.split_once('/') {
        Some((number, total)) => {
            apply_values(tag, ItemKey::TrackNumber, &[number.to_string()]);
            apply_values(tag, ItemKey::TrackTotal, &[total.to_string()]);
        }
        None => apply_values(tag, ItemKey::TrackNumber, values),
    }
}

/// One lofty-handled file format.
#[derive(Debug, Clone)]
pub struct LoftyFormat {
    extension: String,
}

impl LoftyFormat {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    fn path_for(location: &str) -> Result<PathBuf, TagError> {
        location::local_path(location).ok_or_else(|| TagError::UnsupportedFormat(location.to_string()))
    }
}

impl TagFormat for LoftyFormat {
    fn name(&self) -> &str {
        &self.extension
    }

    fn read_all(&self, location: &str) -> Result<TagCodecResult, TagError> {
        let path = Self::path_for(location)?;
        let tagged_file = read_tagged_file(&path).map_err(|reason| TagError::codec(location, reason))?;
        Ok(collect_tags(&tagged_file))
    }

    fn write_tags(&self, location: &str, tags: &TagMap) -> Result<(), TagError> {
        let path = Self::path_for(location)?;
        let mut tagged_file =
            read_tagged_file(&path).map_err(|reason| TagError::codec(location, reason))?;
        let tag_type = tagged_file.primary_tag_type();
        if tagged_file.tag(tag_type).is_none() {
            tagged_file.insert_tag(Tag::new(tag_type));
        }
        let tag = tagged_file
            .tag_mut(tag_type)
            .ok_or_else(|| TagError::codec(location, format!("no writable {tag_type:?} tag")))?;

        let empty = Vec::new();
        for (key, name) in ITEM_KEY_TAGS {
            let values = tags.get(name).unwrap_or(&empty);
            if name == "tracknumber" {
                apply_track_number(tag, values);
            } else {
                apply_values(tag, key, values);
            }
        }

        tag.remove_empty();
        tagged_file
            .save_to_path(&path, WriteOptions::default())
            .map_err(|error| TagError::codec(location, error))
    }
}

/// Extension-based lookup over the lofty-supported formats, local files only.
pub struct LoftyCodecRegistry {
    formats: HashMap<String, Arc<dyn TagFormat>>,
}

impl LoftyCodecRegistry {
    pub fn new() -> Self {
        let formats = SUPPORTED_AUDIO_EXTENSIONS
            .iter()
            .map(|ext| {
                let format: Arc<dyn TagFormat> = Arc::new(LoftyFormat::new(*ext));
                (ext.to_string(), format)
            })
            .collect();
        Self { formats }
    }
}

impl Default for LoftyCodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TagCodecRegistry for LoftyCodecRegistry {
    fn format_for(&self, location: &str) -> Option<Arc<dyn TagFormat>> {
        location::local_path(location)?;
        let extension = location::extension(location)?;
        self.formats.get(&extension).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::LoftyCodecRegistry;
    use crate::codec::TagCodecRegistry;
    use crate::error::TagError;
    use crate::location::path_to_uri;

    #[test]
    fn test_registry_selects_by_extension_for_local_files_only() {
        let registry = LoftyCodecRegistry::new();
        let flac = registry
            .format_for("file:///music/a.FLAC")
            .expect("flac should be supported");
        assert_eq!(flac.name(), "flac");
        assert!(registry.format_for("file:///music/a.txt").is_none());
        assert!(registry.format_for("http://radio.example.com/live.mp3").is_none());
        assert!(registry.format_for("file:///music/no_extension").is_none());
    }

    #[test]
    fn test_read_all_reports_codec_failure_for_garbage_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"definitely not an mpeg stream").expect("write fixture");

        let location = path_to_uri(&path);
        let format = LoftyCodecRegistry::new()
            .format_for(&location)
            .expect("mp3 should be supported");
        match format.read_all(&location) {
            Err(TagError::CodecFailure { location: failed, .. }) => assert_eq!(failed, location),
            other => panic!("expected CodecFailure, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_read_all_reports_codec_failure_for_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let location = path_to_uri(&dir.path().join("gone.flac"));
        let format = LoftyCodecRegistry::new()
            .format_for(&location)
            .expect("flac should be supported");
        assert!(matches!(
            format.read_all(&location),
            Err(TagError::CodecFailure { .. })
        ));
    }
}
