//! Where referenced modules are looked for.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::assembly::refspec::RefSpec;

/// The ordered list of directories searched for modules.
///
/// Shared by every assembly on a plan. Readers take a snapshot under the lock
/// and search without holding it. Directories are stored canonicalized when
/// they exist, and never twice.
#[derive(Debug, Default)]
pub struct SearchPaths {
    paths: Mutex<Vec<PathBuf>>,
}

impl SearchPaths {
    pub fn new(initial: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut paths = Vec::new();
        for path in initial {
            push_unique(&mut paths, canonical_or_self(&path));
        }
        SearchPaths {
            paths: Mutex::new(paths),
        }
    }

    /// Current list of directories.
    pub async fn snapshot(&self) -> Vec<PathBuf> {
        self.paths.lock().await.clone()
    }

    /// Append `dir` unless it is already present. Returns whether it was
    /// added.
    pub async fn add(&self, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        let canonical = tokio::fs::canonicalize(dir)
            .await
            .unwrap_or_else(|_| dir.to_path_buf());
        let added = push_unique(&mut *self.paths.lock().await, canonical);
        if added {
            tracing::debug!(dir = %dir.display(), "added search path");
        }
        added
    }
}

fn push_unique(paths: &mut Vec<PathBuf>, dir: PathBuf) -> bool {
    if paths.contains(&dir) {
        return false;
    }
    paths.push(dir);
    true
}

/// Canonical form of `path` if it exists, otherwise the path itself.
pub(crate) fn canonical_or_self(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// File-name forms of a dotted module id, most literal first.
///
/// `a.b.c` yields `a.b.c`, `a/b.c` and `a/b/c`: each step folds the first
/// `.` of the trailing file segment into a directory separator.
pub fn name_forms(id: &str) -> Vec<PathBuf> {
    let segments: Vec<&str> = id.split('.').collect();
    (0..segments.len())
        .map(|split| {
            let mut form: PathBuf = segments[..split].iter().collect();
            form.push(segments[split..].join("."));
            form
        })
        .collect()
}

/// The files to try for `reference`, in order, generated lazily.
///
/// A resolved path is tried alone. A raw path is tried alone when absolute
/// and under every prefix otherwise. A module name is tried in every name
/// form, each under every prefix before moving on to the next form.
pub fn candidates<'a>(
    reference: &'a RefSpec,
    prefixes: &'a [PathBuf],
    extension: &'a str,
) -> Box<dyn Iterator<Item = PathBuf> + Send + 'a> {
    if let Some(resolved) = &reference.resolved_path {
        return Box::new(std::iter::once(resolved.clone()));
    }
    if let Some(raw) = &reference.raw_path {
        if raw.is_absolute() {
            return Box::new(std::iter::once(raw.clone()));
        }
        return Box::new(prefixes.iter().map(move |prefix| prefix.join(raw)));
    }
    if let Some(name) = &reference.module_name {
        let forms = name_forms(name.id().as_str());
        return Box::new(forms.into_iter().flat_map(move |form| {
            let mut file = form.into_os_string();
            file.push(".");
            file.push(extension);
            let file = PathBuf::from(file);
            prefixes.iter().map(move |prefix| prefix.join(&file))
        }));
    }
    Box::new(std::iter::empty())
}
