//! Target descriptions - how to obtain a module's [`Target`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::dependency::DependencySet;
use crate::core::errors::BuildError;
use crate::core::message::Message;
use crate::core::target::Target;
use crate::core::ModuleName;
use crate::sources::Source;

/// How the target of a description is produced.
#[derive(Clone)]
pub enum Recipe {
    /// Compile the module from source.
    Source(Arc<dyn Source>),
    /// Reuse an already built target.
    Provided(Arc<Target>),
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipe::Source(source) => write!(f, "Source({})", source.describe()),
            Recipe::Provided(target) => write!(f, "Provided({})", target.name()),
        }
    }
}

/// Everything the plan needs to know to build one module.
///
/// Descriptions are immutable. Registries replace them as a whole.
#[derive(Debug, Clone)]
pub struct TargetDescription {
    name: ModuleName,
    dependencies: DependencySet,
    recipe: Recipe,
    build_messages: Vec<Message>,
    exception: Option<Arc<BuildError>>,
    source_path: Option<PathBuf>,
    fingerprint: Option<String>,
}

impl TargetDescription {
    /// Describe a module compiled from `source`.
    ///
    /// Fails with `VersionConflict` if `dependencies` names two versions of
    /// the same module.
    pub fn from_source(
        name: ModuleName,
        dependencies: impl IntoIterator<Item = ModuleName>,
        source: Arc<dyn Source>,
    ) -> Result<Self, BuildError> {
        let source_path = source.path().map(Path::to_path_buf);
        Ok(TargetDescription {
            name,
            dependencies: DependencySet::from_names(name, dependencies)?,
            recipe: Recipe::Source(source),
            build_messages: Vec::new(),
            exception: None,
            source_path,
            fingerprint: None,
        })
    }

    /// Describe a module whose target already exists.
    pub fn provided(
        target: Arc<Target>,
        dependencies: impl IntoIterator<Item = ModuleName>,
    ) -> Result<Self, BuildError> {
        let name = target.name();
        Ok(TargetDescription {
            name,
            dependencies: DependencySet::from_names(name, dependencies)?,
            recipe: Recipe::Provided(target),
            build_messages: Vec::new(),
            exception: None,
            source_path: None,
            fingerprint: None,
        })
    }

    /// The same module, now backed by a built target.
    pub fn with_provided(&self, target: Arc<Target>) -> Self {
        TargetDescription {
            recipe: Recipe::Provided(target),
            ..self.clone()
        }
    }

    /// Messages produced while assembling this description. They are copied
    /// into the built target.
    pub fn with_messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.build_messages.extend(messages);
        self
    }

    /// Mark the description as unbuildable. The plan produces a failed
    /// target carrying `exception` instead of compiling.
    pub fn with_exception(mut self, exception: Arc<BuildError>) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn name(&self) -> ModuleName {
        self.name
    }

    pub fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn is_provided(&self) -> bool {
        matches!(self.recipe, Recipe::Provided(_))
    }

    pub fn build_messages(&self) -> &[Message] {
        &self.build_messages
    }

    pub fn exception(&self) -> Option<&Arc<BuildError>> {
        self.exception.as_ref()
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }
}
