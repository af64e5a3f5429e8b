use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::codec::SUPPORTED_AUDIO_EXTENSIONS;
use crate::location;
use crate::registry::TrackRegistry;
use crate::track::Track;

/// Whether `location` has one of the known audio extensions.
pub fn is_valid_track(location: &str) -> bool {
    location::extension(location)
        .map(|ext| SUPPORTED_AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Canonical locations of every supported file below `folder_path`,
/// ordered by path. Unreadable directories and entries are logged and skipped.
pub fn audio_locations_below(folder_path: &Path) -> Vec<String> {
    let mut pending = vec![folder_path.to_path_buf()];
    let mut found: Vec<PathBuf> = Vec::new();

    while let Some(directory) = pending.pop() {
        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Skipping unreadable directory {}: {}", directory.display(), err);
                continue;
            }
        };

        for entry in entries.filter_map(|entry| {
            entry
                .inspect_err(|err| debug!("Skipping entry in {}: {}", directory.display(), err))
                .ok()
        }) {
            let path = entry.path();
            match entry.file_type() {
                Ok(kind) if kind.is_dir() => pending.push(path),
                Ok(kind) if kind.is_file() => {
                    if is_valid_track(&path.to_string_lossy()) {
                        found.push(path);
                    }
                }
                Ok(_) => {}
                Err(err) => debug!("Skipping {}: {}", path.display(), err),
            }
        }
    }

    found.sort_unstable();
    found.iter().map(|path| location::path_to_uri(path)).collect()
}

/// Tracks found at `uri`.
///
/// A local directory expands to every supported file below it. Anything
/// else resolves to the single track at that location.
pub fn tracks_from_uri(registry: &TrackRegistry, uri: &str) -> Vec<Arc<Track>> {
    let canonical = location::canonicalize(uri);
    let locations = match location::local_path(&canonical) {
        Some(folder) if folder.is_dir() => audio_locations_below(&folder),
        _ => vec![canonical],
    };
    locations
        .iter()
        .map(|location| registry.resolve_or_create(location))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{audio_locations_below, is_valid_track, tracks_from_uri};
    use crate::notifier::NullNotifier;
    use crate::registry::TrackRegistry;
    use crate::track::TrackContext;

    #[test]
    fn test_is_valid_track_checks_extension() {
        assert!(is_valid_track("file:///m/a.FLAC"));
        assert!(is_valid_track("/m/b.opus"));
        assert!(!is_valid_track("file:///m/cover.jpg"));
        assert!(!is_valid_track("http://radio.example.com/live"));
    }

    #[test]
    fn test_audio_locations_below_recurses_and_sorts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("disc 2");
        std::fs::create_dir(&nested).expect("create nested");
        std::fs::write(dir.path().join("b.mp3"), b"").expect("write");
        std::fs::write(dir.path().join("a.flac"), b"").expect("write");
        std::fs::write(dir.path().join("notes.txt"), b"").expect("write");
        std::fs::write(nested.join("c.ogg"), b"").expect("write");

        let root = crate::location::path_to_uri(dir.path());
        let locations = audio_locations_below(dir.path());
        let names: Vec<&str> = locations
            .iter()
            .map(|loc| loc.strip_prefix(root.as_str()).expect("under tempdir"))
            .collect();
        assert_eq!(names, vec!["/a.flac", "/b.mp3", "/disc%202/c.ogg"]);
    }

    #[test]
    fn test_tracks_from_uri_expands_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("one.mp3"), b"").expect("write");
        std::fs::write(dir.path().join("two.wav"), b"").expect("write");

        let registry = TrackRegistry::new(Arc::new(TrackContext::detached(Arc::new(NullNotifier))));
        let tracks = tracks_from_uri(&registry, &dir.path().to_string_lossy());
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0]
            .location()
            .is_some_and(|loc| loc.ends_with("/one.mp3")));
        assert_eq!(registry.live_count(), 2);

        let single = tracks_from_uri(&registry, "http://radio.example.com/live");
        assert_eq!(single.len(), 1);
        assert_eq!(
            single[0].location().as_deref(),
            Some("http://radio.example.com/live")
        );
    }
}
