//! Tag names and values stored in a track's tag bag.
//!
//! Display tags (`artist`, `title`, ...) always hold a list of strings.
//! Internal tags live under the reserved `__` namespace and may keep scalar
//! values verbatim (`__length` is a float, `__compilation` a pair).

use std::collections::BTreeMap;
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::TagError;

/// Prefix reserved for internal/computed tags.
pub const INTERNAL_PREFIX: &str = "__";

/// Codec-facing mapping of tag name to its values.
pub type TagMap = BTreeMap<String, Vec<String>>;

/// Internal tags known to the core. Unknown `__` names are kept as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InternalTag {
    Loc,
    Length,
    Rating,
    Playcount,
    Basedir,
    Modified,
    Compilation,
    Bitrate,
    Encoding,
    RawTitle,
    LastPlayed,
    DateAdded,
    /// Full name including the `__` prefix.
    Other(String),
}

impl InternalTag {
    /// Parses a full internal name such as `__length`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "__loc" => InternalTag::Loc,
            "__length" => InternalTag::Length,
            "__rating" => InternalTag::Rating,
            "__playcount" => InternalTag::Playcount,
            "__basedir" => InternalTag::Basedir,
            "__modified" => InternalTag::Modified,
            "__compilation" => InternalTag::Compilation,
            "__bitrate" => InternalTag::Bitrate,
            "__encoding" => InternalTag::Encoding,
            "__rawtitle" => InternalTag::RawTitle,
            "__last_played" => InternalTag::LastPlayed,
            "__date_added" => InternalTag::DateAdded,
            other => InternalTag::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InternalTag::Loc => "__loc",
            InternalTag::Length => "__length",
            InternalTag::Rating => "__rating",
            InternalTag::Playcount => "__playcount",
            InternalTag::Basedir => "__basedir",
            InternalTag::Modified => "__modified",
            InternalTag::Compilation => "__compilation",
            InternalTag::Bitrate => "__bitrate",
            InternalTag::Encoding => "__encoding",
            InternalTag::RawTitle => "__rawtitle",
            InternalTag::LastPlayed => "__last_played",
            InternalTag::DateAdded => "__date_added",
            InternalTag::Other(name) => name.as_str(),
        }
    }
}

/// A tag name, split into the internal and display namespaces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagKey {
    Internal(InternalTag),
    Display(String),
}

impl TagKey {
    pub fn parse(name: &str) -> Self {
        if name.starts_with(INTERNAL_PREFIX) {
            TagKey::Internal(InternalTag::from_name(name))
        } else {
            TagKey::Display(name.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TagKey::Internal(tag) => tag.as_str(),
            TagKey::Display(name) => name.as_str(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, TagKey::Internal(_))
    }
}

impl From<&str> for TagKey {
    fn from(name: &str) -> Self {
        TagKey::parse(name)
    }
}

impl From<String> for TagKey {
    fn from(name: String) -> Self {
        TagKey::parse(&name)
    }
}

impl From<&TagKey> for TagKey {
    fn from(key: &TagKey) -> Self {
        key.clone()
    }
}

impl From<InternalTag> for TagKey {
    fn from(tag: InternalTag) -> Self {
        TagKey::Internal(tag)
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored tag value. Never empty once inside a tag bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagValue {
    List(Vec<String>),
    Text(String),
    Int(i64),
    Float(f64),
    Pair(String, String),
}

impl TagValue {
    /// Every value rendered as text, in order.
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            TagValue::List(values) => values.clone(),
            TagValue::Text(value) => vec![value.clone()],
            TagValue::Int(value) => vec![value.to_string()],
            TagValue::Float(value) => vec![value.to_string()],
            TagValue::Pair(first, second) => vec![first.clone(), second.clone()],
        }
    }

    /// First value rendered as text.
    pub fn first(&self) -> Option<String> {
        match self {
            TagValue::List(values) => values.first().cloned(),
            TagValue::Pair(first, _) => Some(first.clone()),
            other => other.to_strings().into_iter().next(),
        }
    }

    pub fn joined(&self, separator: &str) -> String {
        self.to_strings().join(separator)
    }

    /// Numeric view; text forms are parsed from their first value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Float(value) => Some(*value),
            TagValue::Int(value) => Some(*value as f64),
            other => other.first()?.trim().parse::<f64>().ok(),
        }
    }

    /// Integer view; floats are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TagValue::Int(value) => Some(*value),
            TagValue::Float(value) if value.is_finite() => Some(value.trunc() as i64),
            TagValue::Float(_) => None,
            other => {
                let text = other.first()?;
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
            }
        }
    }
}

/// Input accepted by `Track::set_tag` before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum TagInput {
    /// Multi-valued text; `None` and empty entries are dropped.
    List(Vec<Option<String>>),
    /// Undecoded bytes, converted using the track's `__encoding`.
    Raw(Vec<Vec<u8>>),
    Text(String),
    Int(i64),
    Float(f64),
    Pair(String, String),
    /// Removes the tag.
    Clear,
}

impl From<&str> for TagInput {
    fn from(value: &str) -> Self {
        TagInput::Text(value.to_string())
    }
}

impl From<String> for TagInput {
    fn from(value: String) -> Self {
        TagInput::Text(value)
    }
}

impl From<Vec<String>> for TagInput {
    fn from(values: Vec<String>) -> Self {
        TagInput::List(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<&str>> for TagInput {
    fn from(values: Vec<&str>) -> Self {
        TagInput::List(values.into_iter().map(|v| Some(v.to_string())).collect())
    }
}

impl From<Vec<Option<String>>> for TagInput {
    fn from(values: Vec<Option<String>>) -> Self {
        TagInput::List(values)
    }
}

impl From<i64> for TagInput {
    fn from(value: i64) -> Self {
        TagInput::Int(value)
    }
}

impl From<u32> for TagInput {
    fn from(value: u32) -> Self {
        TagInput::Int(i64::from(value))
    }
}

impl From<f64> for TagInput {
    fn from(value: f64) -> Self {
        TagInput::Float(value)
    }
}

impl From<(String, String)> for TagInput {
    fn from((first, second): (String, String)) -> Self {
        TagInput::Pair(first, second)
    }
}

impl From<TagValue> for TagInput {
    fn from(value: TagValue) -> Self {
        match value {
            TagValue::List(values) => TagInput::List(values.into_iter().map(Some).collect()),
            TagValue::Text(value) => TagInput::Text(value),
            TagValue::Int(value) => TagInput::Int(value),
            TagValue::Float(value) => TagInput::Float(value),
            TagValue::Pair(first, second) => TagInput::Pair(first, second),
        }
    }
}

/// Decodes raw tag bytes with the named encoding. UTF-8 when unnamed.
pub fn decode_text(bytes: &[u8], encoding: Option<&str>) -> Result<String, String> {
    let label = encoding.map(|e| e.trim().to_ascii_lowercase());
    match label.as_deref() {
        None | Some("") | Some("utf-8") | Some("utf8") => {
            String::from_utf8(bytes.to_vec()).map_err(|error| error.to_string())
        }
        Some("latin-1") | Some("latin1") | Some("iso-8859-1") | Some("iso8859-1") => {
            Ok(bytes.iter().map(|&b| char::from(b)).collect())
        }
        Some("ascii") | Some("us-ascii") => {
            if bytes.is_ascii() {
                Ok(bytes.iter().map(|&b| char::from(b)).collect())
            } else {
                Err("non-ascii byte in ascii value".to_string())
            }
        }
        Some(other) => Err(format!("unknown encoding '{other}'")),
    }
}

fn filter_values(values: impl IntoIterator<Item = String>) -> Option<TagValue> {
    let values: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
    if values.is_empty() {
        None
    } else {
        Some(TagValue::List(values))
    }
}

/// Normalizes `input` for storage under `key`. `None` means "remove the key".
///
/// Scalars are wrapped into a one-element list for display tags and kept
/// verbatim for internal tags.
pub(crate) fn normalize(key: &TagKey, input: TagInput, encoding: Option<&str>) -> Option<TagValue> {
    let internal = key.is_internal();
    match input {
        TagInput::Clear => None,
        TagInput::List(values) => filter_values(values.into_iter().flatten()),
        TagInput::Raw(chunks) => filter_values(chunks.into_iter().filter_map(|chunk| {
            match decode_text(&chunk, encoding) {
                Ok(text) => Some(text),
                Err(reason) => {
                    warn!("Skipping value: {}", TagError::malformed(key.as_str(), reason));
                    None
                }
            }
        })),
        TagInput::Text(value) if value.is_empty() => None,
        TagInput::Text(value) if internal => Some(TagValue::Text(value)),
        TagInput::Text(value) => Some(TagValue::List(vec![value])),
        TagInput::Int(value) if internal => Some(TagValue::Int(value)),
        TagInput::Int(value) => Some(TagValue::List(vec![value.to_string()])),
        TagInput::Float(value) if internal => Some(TagValue::Float(value)),
        TagInput::Float(value) => Some(TagValue::List(vec![value.to_string()])),
        TagInput::Pair(first, second) if internal => Some(TagValue::Pair(first, second)),
        TagInput::Pair(first, second) => filter_values([first, second]),
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_text, normalize, InternalTag, TagInput, TagKey, TagValue};

    #[test]
    fn test_tag_key_parse_splits_namespaces() {
        assert_eq!(TagKey::parse("__length"), TagKey::Internal(InternalTag::Length));
        assert_eq!(
            TagKey::parse("__custom_thing"),
            TagKey::Internal(InternalTag::Other("__custom_thing".to_string()))
        );
        assert_eq!(TagKey::parse("artist"), TagKey::Display("artist".to_string()));
        assert_eq!(TagKey::parse("__custom_thing").as_str(), "__custom_thing");
        assert!(!TagKey::parse("_single").is_internal());
    }

    #[test]
    fn test_normalize_wraps_scalars_for_display_tags_only() {
        let artist = TagKey::parse("artist");
        let length = TagKey::parse("__length");

        assert_eq!(
            normalize(&artist, TagInput::from("Low"), None),
            Some(TagValue::List(vec!["Low".to_string()]))
        );
        assert_eq!(
            normalize(&length, TagInput::from(201.5), None),
            Some(TagValue::Float(201.5))
        );
        assert_eq!(
            normalize(&artist, TagInput::from(7_i64), None),
            Some(TagValue::List(vec!["7".to_string()]))
        );
    }

    #[test]
    fn test_normalize_drops_empty_entries_and_empty_results() {
        let genre = TagKey::parse("genre");
        let input = TagInput::List(vec![None, Some(String::new()), Some("Dub".to_string())]);
        assert_eq!(
            normalize(&genre, input, None),
            Some(TagValue::List(vec!["Dub".to_string()]))
        );
        assert_eq!(normalize(&genre, TagInput::List(vec![None]), None), None);
        assert_eq!(normalize(&genre, TagInput::from(""), None), None);
        assert_eq!(normalize(&genre, TagInput::Clear, None), None);
    }

    #[test]
    fn test_normalize_raw_uses_encoding_and_skips_bad_chunks() {
        let title = TagKey::parse("title");
        let latin1 = TagInput::Raw(vec![vec![0x43, 0x61, 0x66, 0xE9]]);
        assert_eq!(
            normalize(&title, latin1, Some("iso-8859-1")),
            Some(TagValue::List(vec!["Café".to_string()]))
        );

        let mixed = TagInput::Raw(vec![vec![0xFF, 0xFE], b"ok".to_vec()]);
        assert_eq!(
            normalize(&title, mixed, None),
            Some(TagValue::List(vec!["ok".to_string()]))
        );
    }

    #[test]
    fn test_decode_text_rejects_unknown_encoding() {
        assert!(decode_text(b"abc", Some("klingon")).is_err());
        assert_eq!(decode_text(b"abc", Some("ASCII")).as_deref(), Ok("abc"));
    }

    #[test]
    fn test_tag_value_numeric_views() {
        assert_eq!(TagValue::Text("4.7".to_string()).as_f64(), Some(4.7));
        assert_eq!(TagValue::List(vec!["12".to_string()]).as_i64(), Some(12));
        assert_eq!(TagValue::Float(3.9).as_i64(), Some(3));
        assert_eq!(TagValue::Text("n/a".to_string()).as_i64(), None);
    }
}
