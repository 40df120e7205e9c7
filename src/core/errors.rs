//! Build error taxonomy.
//!
//! Unresolved dependencies, version conflicts and cycles are detected eagerly
//! and returned before any asynchronous work starts. Everything else is
//! captured inside the failing module's [`Target`](crate::core::Target) so
//! that callers inspect `is_successful()` rather than catching errors.

use std::path::PathBuf;
use std::sync::Arc;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::ModuleName;
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::task_cache::TaskError;

/// Error raised while planning, assembling or building modules.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum BuildError {
    #[error("no target description for `{name}`")]
    #[diagnostic(code(weave::plan::unresolved_dependency))]
    UnresolvedDependency {
        name: ModuleName,
        /// The module that declared the dependency, if any.
        dependent: Option<ModuleName>,
    },

    #[error("version conflict for `{}`: `{existing}` vs `{new}` in `{dependent}`", .existing.id())]
    #[diagnostic(
        code(weave::plan::version_conflict),
        help("every module may only depend on one version of a given module")
    )]
    VersionConflict {
        existing: ModuleName,
        new: ModuleName,
        dependent: ModuleName,
    },

    #[error("dependency cycle: {}", format_cycle(.modules))]
    #[diagnostic(code(weave::plan::dependency_cycle))]
    DependencyCycle { modules: Vec<ModuleName> },

    #[error("failed to compile `{name}`: {message}")]
    #[diagnostic(code(weave::build::compile_failure))]
    CompileFailure { name: ModuleName, message: String },

    #[error("`{name}` was not built because {} of its dependencies failed", .failed.len())]
    #[diagnostic(code(weave::build::dependency_failed))]
    DependencyFailed {
        name: ModuleName,
        failed: Vec<ModuleName>,
        /// Root causes collected from the failed dependencies.
        causes: Vec<Arc<BuildError>>,
    },

    #[error("could not find `{reference}` ({candidates} candidate(s) searched)")]
    #[diagnostic(
        code(weave::assembly::reference_not_found),
        help("add the directory containing the module to the search paths")
    )]
    ReferenceNotFound { reference: String, candidates: usize },

    #[error("source `{source_name}` could not be opened: {reason}")]
    #[diagnostic(code(weave::source::unavailable))]
    SourceUnavailable { source_name: String, reason: String },

    #[error("preflight of `{}` failed: {message}", .path.display())]
    #[diagnostic(code(weave::assembly::preflight))]
    Preflight { path: PathBuf, message: String },

    #[error("source `{source_name}` declares no module name")]
    #[diagnostic(code(weave::assembly::missing_name))]
    MissingModuleName { source_name: String },

    #[error("no module named `{name}` is registered")]
    #[diagnostic(code(weave::registry::not_found))]
    NotFound { name: ModuleName },

    #[error("I/O error on `{}`", .path.display())]
    #[diagnostic(code(weave::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("build was cancelled")]
    #[diagnostic(code(weave::cancelled))]
    Cancelled,

    #[error("internal task failure: {0}")]
    #[diagnostic(code(weave::task))]
    Task(TaskError),
}

impl Clone for BuildError {
    fn clone(&self) -> Self {
        match self {
            BuildError::UnresolvedDependency { name, dependent } => {
                BuildError::UnresolvedDependency {
                    name: *name,
                    dependent: *dependent,
                }
            }
            BuildError::VersionConflict {
                existing,
                new,
                dependent,
            } => BuildError::VersionConflict {
                existing: *existing,
                new: *new,
                dependent: *dependent,
            },
            BuildError::DependencyCycle { modules } => BuildError::DependencyCycle {
                modules: modules.clone(),
            },
            BuildError::CompileFailure { name, message } => BuildError::CompileFailure {
                name: *name,
                message: message.clone(),
            },
            BuildError::DependencyFailed {
                name,
                failed,
                causes,
            } => BuildError::DependencyFailed {
                name: *name,
                failed: failed.clone(),
                causes: causes.clone(),
            },
            BuildError::ReferenceNotFound {
                reference,
                candidates,
            } => BuildError::ReferenceNotFound {
                reference: reference.clone(),
                candidates: *candidates,
            },
            BuildError::SourceUnavailable {
                source_name,
                reason,
            } => BuildError::SourceUnavailable {
                source_name: source_name.clone(),
                reason: reason.clone(),
            },
            BuildError::Preflight { path, message } => BuildError::Preflight {
                path: path.clone(),
                message: message.clone(),
            },
            BuildError::MissingModuleName { source_name } => BuildError::MissingModuleName {
                source_name: source_name.clone(),
            },
            BuildError::NotFound { name } => BuildError::NotFound { name: *name },
            // io::Error is not Clone; keep its kind and text.
            BuildError::Io { path, source } => BuildError::Io {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            BuildError::Cancelled => BuildError::Cancelled,
            BuildError::Task(err) => BuildError::Task(err.clone()),
        }
    }
}

fn format_cycle(modules: &[ModuleName]) -> String {
    modules
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl From<TaskError> for BuildError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Cancelled => BuildError::Cancelled,
            other => BuildError::Task(other),
        }
    }
}

impl BuildError {
    /// Whether this error is a cancellation rather than a build failure.
    pub fn is_cancellation(&self) -> bool {
        match self {
            BuildError::Cancelled | BuildError::Task(TaskError::Cancelled) => true,
            _ => false,
        }
    }

    /// Take the error back out of an `Arc`, cloning it when other holders
    /// remain.
    pub fn unshare(error: Arc<BuildError>) -> BuildError {
        Arc::try_unwrap(error).unwrap_or_else(|shared| (*shared).clone())
    }

    /// The errors that actually caused this one, flattening dependency
    /// failures down to the modules that failed on their own.
    pub fn root_causes(self: &Arc<Self>) -> Vec<Arc<BuildError>> {
        match self.as_ref() {
            BuildError::DependencyFailed { causes, .. } if !causes.is_empty() => {
                causes.iter().flat_map(|c| c.root_causes()).collect()
            }
            _ => vec![Arc::clone(self)],
        }
    }

    /// Convert to a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BuildError::UnresolvedDependency { name, dependent } => {
                let mut diag =
                    Diagnostic::error(format!("could not find a target description for `{}`", name));
                if let Some(dependent) = dependent {
                    diag = diag.with_context(format!("required by `{}`", dependent));
                }
                diag.with_suggestion(suggestions::REGISTER_MODULE)
            }

            BuildError::VersionConflict {
                existing,
                new,
                dependent,
            } => Diagnostic::error(format!("version conflict for `{}`", existing.id()))
                .with_context(format!("`{}` already depends on `{}`", dependent, existing))
                .with_context(format!("a second reference asks for `{}`", new))
                .with_suggestion(suggestions::ALIGN_VERSIONS),

            BuildError::DependencyCycle { modules } => {
                Diagnostic::error("cycle detected in module graph")
                    .with_context(format!("cycle: {}", format_cycle(modules)))
                    .with_suggestion(suggestions::BREAK_CYCLE)
            }

            BuildError::ReferenceNotFound {
                reference,
                candidates,
            } => Diagnostic::error(format!("could not find module `{}`", reference))
                .with_context(format!("{} candidate path(s) were searched", candidates))
                .with_suggestion(suggestions::SEARCH_PATHS),

            BuildError::DependencyFailed { name, failed, .. } => {
                let mut diag = Diagnostic::error(format!("`{}` was not built", name));
                for dep in failed {
                    diag = diag.with_context(format!("dependency `{}` failed", dep));
                }
                diag
            }

            BuildError::Preflight { path, message } => {
                Diagnostic::error(format!("invalid module header: {}", message)).with_location(path)
            }

            other => Diagnostic::error(other.to_string()),
        }
    }
}
