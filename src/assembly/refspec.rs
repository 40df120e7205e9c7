//! References from one module to another.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::{BuildError, ModuleName};
use crate::sources::Source;

/// A reference as declared in a module header, filled in while it is being
/// resolved.
///
/// A reference names a module, a file, or both. Resolution records the file
/// it settled on in `resolved_path` and `source`, or the reason it gave up in
/// `error`.
#[derive(Clone, Default)]
pub struct RefSpec {
    pub module_name: Option<ModuleName>,
    pub raw_path: Option<PathBuf>,
    pub resolved_path: Option<PathBuf>,
    pub source: Option<Arc<dyn Source>>,
    pub error: Option<Arc<BuildError>>,
}

impl RefSpec {
    pub fn by_name(name: ModuleName) -> Self {
        RefSpec {
            module_name: Some(name),
            ..Default::default()
        }
    }

    pub fn by_path(path: impl Into<PathBuf>) -> Self {
        RefSpec {
            raw_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// A reference that is already known to be broken.
    pub fn failed(error: BuildError) -> Self {
        RefSpec {
            error: Some(Arc::new(error)),
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_path.is_some() || self.source.is_some()
    }

    /// Record why resolution gave up and return the shared error.
    pub fn fail(&mut self, error: BuildError) -> Arc<BuildError> {
        let error = Arc::new(error);
        self.error = Some(Arc::clone(&error));
        error
    }
}

impl fmt::Display for RefSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.module_name, &self.raw_path) {
            (Some(name), _) => write!(f, "{}", name),
            (None, Some(path)) => write!(f, "\"{}\"", path.display()),
            (None, None) => match &self.resolved_path {
                Some(path) => write!(f, "\"{}\"", path.display()),
                None => f.write_str("<unnamed>"),
            },
        }
    }
}

impl fmt::Debug for RefSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefSpec")
            .field("module_name", &self.module_name)
            .field("raw_path", &self.raw_path)
            .field("resolved_path", &self.resolved_path)
            .field("source", &self.source.as_ref().map(|s| s.describe()))
            .field("error", &self.error)
            .finish()
    }
}
