//! In-memory and stream sources.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::BuildError;
use crate::sources::{read_to_string, Source};

/// Module text held in memory, optionally remembering where it came from.
#[derive(Debug, Clone)]
pub struct TextSource {
    text: Arc<str>,
    path: Option<PathBuf>,
}

impl TextSource {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        TextSource {
            text: text.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Source for TextSource {
    fn try_open(&self) -> Option<Box<dyn Read + Send>> {
        Some(Box::new(Cursor::new(self.text.as_bytes().to_vec())))
    }

    fn can_open(&self) -> bool {
        true
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "<memory>".to_string(),
        }
    }
}

/// A stream that can be read exactly once.
pub struct ReaderSource {
    reader: Mutex<Option<Box<dyn Read + Send>>>,
    label: String,
}

impl ReaderSource {
    pub fn new(reader: impl Read + Send + 'static, label: impl Into<String>) -> Self {
        ReaderSource {
            reader: Mutex::new(Some(Box::new(reader))),
            label: label.into(),
        }
    }
}

impl Source for ReaderSource {
    fn try_open(&self) -> Option<Box<dyn Read + Send>> {
        self.reader.lock().take()
    }

    fn can_open(&self) -> bool {
        self.reader.lock().is_some()
    }

    fn is_single_use(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Make `source` safe to read more than once.
///
/// Single-use sources are drained into a [`TextSource`]; everything else is
/// returned unchanged.
pub fn buffer(source: Arc<dyn Source>) -> Result<Arc<dyn Source>, BuildError> {
    if !source.is_single_use() {
        return Ok(source);
    }
    let text = read_to_string(source.as_ref())?;
    let mut buffered = TextSource::new(text);
    if let Some(path) = source.path() {
        buffered = buffered.with_path(path);
    }
    Ok(Arc::new(buffered))
}
