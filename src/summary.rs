//! Overview of a list of tracks: shared album/artist labels, total length
//! and the first few rows.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::tags::InternalTag;
use crate::track::{Track, TrackNumber};

const MAX_ROWS: usize = 3;

/// How [`format_length`] renders a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthFormat {
    /// `1:02:42`
    Short,
    /// `1h, 2m, 42s`
    Long,
    /// `1 hour, 2 minutes, 42 seconds`
    Verbose,
}

fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Formats a length in seconds. Fractions are dropped.
pub fn format_length(seconds: f64, format: LengthFormat) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };
    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let secs = total % 60;

    match format {
        LengthFormat::Short => {
            let hours = days * 24 + hours;
            if hours > 0 {
                format!("{hours}:{minutes:02}:{secs:02}")
            } else {
                format!("{minutes}:{secs:02}")
            }
        }
        LengthFormat::Long => {
            let mut text = String::new();
            if days > 0 {
                text.push_str(&format!("{days}d, "));
            }
            if hours > 0 {
                text.push_str(&format!("{hours}h, "));
            }
            text.push_str(&format!("{minutes}m, {secs}s"));
            text
        }
        LengthFormat::Verbose => {
            let parts: Vec<String> = [(days, "day"), (hours, "hour"), (minutes, "minute"), (secs, "second")]
                .into_iter()
                .filter(|(count, _)| *count > 0)
                .map(|(count, unit)| plural(count, unit))
                .collect();
            if parts.is_empty() {
                plural(0, "second")
            } else {
                parts.join(", ")
            }
        }
    }
}

/// One displayed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub tracknumber: String,
    pub title: String,
    pub length: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackListSummary {
    /// The shared album, or `Various`.
    pub album: String,
    /// The shared artist, or `Various Artists`.
    pub artist: String,
    pub track_count: usize,
    /// Sum of `__length` in seconds.
    pub total_length: f64,
    /// At most three rows, in (album, tracknumber) order.
    pub rows: Vec<SummaryRow>,
    /// Whether tracks were left out of `rows`.
    pub truncated: bool,
}

impl TrackListSummary {
    /// Empty input gives empty labels and no rows.
    pub fn from_tracks(tracks: &[Arc<Track>]) -> Self {
        let mut sorted: Vec<&Arc<Track>> = tracks.iter().collect();
        sorted.sort_by_key(|track| (track.sort_key("album"), track.sort_key("tracknumber")));

        let albums: BTreeSet<String> = sorted.iter().map(|t| t.get_tag_display("album")).collect();
        let artists: BTreeSet<String> = sorted.iter().map(|t| t.get_tag_display("artist")).collect();
        let total_length = sorted
            .iter()
            .filter_map(|track| track.get_tag(InternalTag::Length))
            .filter_map(|length| length.as_f64())
            .filter(|seconds| seconds.is_finite())
            .sum::<f64>();

        let rows = sorted
            .iter()
            .take(MAX_ROWS)
            .map(|track| SummaryRow {
                tracknumber: match track.get_track_number() {
                    TrackNumber::Number(number) if number >= 0 => number.to_string(),
                    TrackNumber::Number(_) => String::new(),
                    TrackNumber::Text(text) => text,
                },
                title: track.get_tag_display("title"),
                length: format_length(track.get_duration() as f64, LengthFormat::Short),
            })
            .collect();

        Self {
            album: single_or(albums, "Various", tracks.is_empty()),
            artist: single_or(artists, "Various Artists", tracks.is_empty()),
            track_count: tracks.len(),
            total_length,
            rows,
            truncated: tracks.len() > MAX_ROWS,
        }
    }

    /// `"<count> in total (<long length>)"`.
    pub fn total_label(&self) -> String {
        format!(
            "{} in total ({})",
            self.track_count,
            format_length(self.total_length, LengthFormat::Long)
        )
    }
}

fn single_or(values: BTreeSet<String>, various: &str, empty: bool) -> String {
    if empty {
        return String::new();
    }
    let mut values = values.into_iter();
    match (values.next(), values.next()) {
        (Some(only), None) => only,
        _ => various.to_string(),
    }
}
