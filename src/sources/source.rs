//! Source trait - common interface for everything a module can be read from.

use std::io::Read;
use std::path::Path;

use crate::core::errors::BuildError;

/// Something module source text can be read from.
pub trait Source: Send + Sync {
    /// Open a fresh reader, or `None` if the source cannot be read (any more).
    fn try_open(&self) -> Option<Box<dyn Read + Send>>;

    /// Whether a call to [`try_open`](Source::try_open) is expected to succeed.
    fn can_open(&self) -> bool;

    /// Single-use sources can be opened at most once.
    fn is_single_use(&self) -> bool {
        false
    }

    /// Backing file, if any.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Short description for messages and logs.
    fn describe(&self) -> String;
}

/// Read the whole source as UTF-8 text.
pub fn read_to_string(source: &dyn Source) -> Result<String, BuildError> {
    let unavailable = |reason: String| BuildError::SourceUnavailable {
        source_name: source.describe(),
        reason,
    };

    let mut reader = source
        .try_open()
        .ok_or_else(|| unavailable("source cannot be opened".to_string()))?;
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|e| unavailable(e.to_string()))?;
    Ok(text)
}
