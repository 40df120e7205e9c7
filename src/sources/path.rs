//! Path source - modules stored as files on the local filesystem.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::sources::Source;

/// A module backed by a file. Can be opened any number of times.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }
}

impl Source for FileSource {
    fn try_open(&self) -> Option<Box<dyn Read + Send>> {
        match File::open(&self.path) {
            Ok(file) => Some(Box::new(file)),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "cannot open source file");
                None
            }
        }
    }

    fn can_open(&self) -> bool {
        self.path.is_file()
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::read_to_string;
    use tempfile::TempDir;

    #[test]
    fn test_file_source_reopens() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("m.pxs");
        std::fs::write(&path, "name m;\n").unwrap();

        let source = FileSource::new(&path);
        assert!(source.can_open());
        assert!(!source.is_single_use());
        assert_eq!(read_to_string(&source).unwrap(), "name m;\n");
        assert_eq!(read_to_string(&source).unwrap(), "name m;\n");
        assert_eq!(source.path(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let source = FileSource::new(tmp.path().join("missing.pxs"));
        assert!(!source.can_open());
        assert!(source.try_open().is_none());
        assert!(read_to_string(&source).is_err());
    }
}
