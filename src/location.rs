//! Canonical track locations.
//!
//! Every track is identified by an absolute URI string. Plain filesystem
//! paths are turned into percent-encoded `file://` URIs; anything that
//! already carries a scheme is kept as given.

use std::path::{Component, Path, PathBuf};

const FILE_SCHEME_PREFIX: &str = "file://";

fn split_scheme(location: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = location.split_once("://")?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.')) {
        return None;
    }
    Some((scheme, rest))
}

/// Drops `.` segments and resolves `..` against the preceding segment
/// without touching the filesystem. `..` never climbs above the root.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() && !path.has_root() {
                    normalized.push(component);
                }
            }
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component)
            }
        }
    }
    normalized
}

/// Encodes a filesystem path as a `file://` URI. Relative paths are made
/// absolute and the result is lexically normalized.
pub fn path_to_uri(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let raw = normalize_lexically(&absolute)
        .to_string_lossy()
        .replace('\\', "/");
    let encoded: Vec<String> = raw
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    let joined = encoded.join("/");
    if joined.starts_with('/') {
        format!("{FILE_SCHEME_PREFIX}{joined}")
    } else {
        format!("{FILE_SCHEME_PREFIX}/{joined}")
    }
}

/// Resolves a path or URI into the canonical location string.
///
/// Local `file` URIs and plain paths share one spelling: decoded, normalized
/// and re-encoded. Other schemes are kept as given.
pub fn canonicalize(location: &str) -> String {
    match split_scheme(location) {
        Some((scheme, _)) if scheme.eq_ignore_ascii_case("file") => local_path(location)
            .map(|path| path_to_uri(&path))
            .unwrap_or_else(|| location.to_string()),
        Some(_) => location.to_string(),
        None => path_to_uri(Path::new(location)),
    }
}

/// Lower-cased URI scheme, e.g. `file` or `http`.
pub fn scheme(location: &str) -> Option<String> {
    split_scheme(location).map(|(scheme, _)| scheme.to_ascii_lowercase())
}

/// Filesystem path for `file://` locations, `None` for anything remote.
pub fn local_path(location: &str) -> Option<PathBuf> {
    let (scheme, rest) = split_scheme(location)?;
    if !scheme.eq_ignore_ascii_case("file") {
        return None;
    }
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    if !rest.starts_with('/') {
        return None;
    }
    let decoded = urlencoding::decode(rest).ok()?;
    Some(PathBuf::from(decoded.into_owned()))
}

/// Percent-decoded form for showing to users. Not safe for I/O.
pub fn display_form(location: &str) -> String {
    urlencoding::decode(location)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| location.to_string())
}

/// Lower-cased extension of the last path segment, ignoring query/fragment.
pub fn extension(location: &str) -> Option<String> {
    let path_part = match split_scheme(location) {
        Some((_, rest)) => rest.split(['?', '#']).next().unwrap_or(rest),
        None => location,
    };
    let basename = path_part.rsplit('/').next()?;
    let (stem, ext) = basename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
