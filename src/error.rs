//! Error types shared by the track metadata core.

use thiserror::Error;

/// Failures around reading, writing and converting tag values.
///
/// None of these are fatal: callers log them and fall back to a sentinel.
#[derive(Debug, Error)]
pub enum TagError {
    /// No codec handles this location's format. A normal negative result.
    #[error("no tag codec for {0}")]
    UnsupportedFormat(String),

    /// The codec failed to read or write the file.
    #[error("tag codec failed for {location}: {reason}")]
    CodecFailure { location: String, reason: String },

    /// A single value could not be parsed or decoded.
    #[error("malformed value for tag '{tag}': {reason}")]
    MalformedValue { tag: String, reason: String },

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl TagError {
    pub fn codec(location: impl Into<String>, reason: impl ToString) -> Self {
        TagError::CodecFailure {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(tag: impl Into<String>, reason: impl ToString) -> Self {
        TagError::MalformedValue {
            tag: tag.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failures updating the location table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Another live track already owns the location.
    #[error("location already held by another track: {0}")]
    LocationTaken(String),

    /// Transient tracks have no `__loc` and cannot be registered.
    #[error("track has no location")]
    MissingLocation,
}

/// Failures loading or saving `trackmeta.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine the config directory")]
    NoConfigDir,
}
