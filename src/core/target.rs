//! Build results.
//!
//! A [`Target`] is the immutable outcome of building one module: the
//! compiled artifact (when compilation succeeded), the symbols the module
//! exports, and every message produced along the way.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::errors::BuildError;
use crate::core::message::{Message, Severity};
use crate::core::symbols::SymbolTable;
use crate::core::ModuleName;

/// Opaque compiled module, produced by the compiler and consumed by linking.
pub type Artifact = Arc<dyn Any + Send + Sync>;

/// Named resources a module carries alongside its code.
pub type Resources = BTreeMap<String, Vec<u8>>;

/// The result of building one module.
#[derive(Clone)]
pub struct Target {
    name: ModuleName,
    module: Option<Artifact>,
    exports: SymbolTable,
    resources: Resources,
    messages: Vec<Message>,
    exception: Option<Arc<BuildError>>,
}

impl Target {
    /// A target built from a successful compile.
    pub fn compiled(
        name: ModuleName,
        module: Artifact,
        exports: SymbolTable,
        resources: Resources,
        messages: Vec<Message>,
    ) -> Self {
        Target {
            name,
            module: Some(module),
            exports,
            resources,
            messages,
            exception: None,
        }
    }

    /// A target that failed with `exception`. No artifact is attached.
    pub fn failed(name: ModuleName, exception: BuildError, messages: Vec<Message>) -> Self {
        Target::failed_with(name, Arc::new(exception), messages)
    }

    /// Like [`Target::failed`], sharing an exception raised elsewhere.
    pub fn failed_with(
        name: ModuleName,
        exception: Arc<BuildError>,
        messages: Vec<Message>,
    ) -> Self {
        Target {
            name,
            module: None,
            exports: SymbolTable::new(),
            resources: Resources::new(),
            messages,
            exception: Some(exception),
        }
    }

    pub fn name(&self) -> ModuleName {
        self.name
    }

    pub fn module(&self) -> Option<&Artifact> {
        self.module.as_ref()
    }

    /// Downcast the compiled artifact.
    pub fn module_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.module.as_ref()?.downcast_ref::<T>()
    }

    pub fn exports(&self) -> &SymbolTable {
        &self.exports
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn exception(&self) -> Option<&Arc<BuildError>> {
        self.exception.as_ref()
    }

    /// No exception and no error-severity message.
    pub fn is_successful(&self) -> bool {
        self.exception.is_none() && !self.messages.iter().any(Message::is_error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.messages
            .iter()
            .filter(|m| m.severity == severity)
            .count()
    }

    /// Human-readable summary of the outcome, messages and exception.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let status = if self.is_successful() { "ok" } else { "FAILED" };
        out.push_str(&format!(
            "{} [{}] {} error(s), {} warning(s)\n",
            self.name,
            status,
            self.count(Severity::Error),
            self.count(Severity::Warning)
        ));
        for message in &self.messages {
            out.push_str(&format!("  {}\n", message));
        }
        if let Some(exception) = &self.exception {
            out.push_str(&format!("  exception: {}\n", exception));
            for cause in exception.root_causes() {
                if !Arc::ptr_eq(&cause, exception) {
                    out.push_str(&format!("    caused by: {}\n", cause));
                }
            }
        }
        out
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("has_module", &self.module.is_some())
            .field("exports", &self.exports.len())
            .field("resources", &self.resources.len())
            .field("messages", &self.messages)
            .field("exception", &self.exception)
            .finish()
    }
}
