//! Build environment - everything one module's compilation sees.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;

use crate::builder::engine::{CompileOutput, CompileUnit, EngineLease, EnginePool};
use crate::core::{Message, ModuleName, SymbolTable, Target};

/// Per-module compilation context.
///
/// Holds the merged exports of the module's dependencies and a leased
/// compiler engine. The engine goes back to its pool when the environment is
/// dropped, whichever way the build ends.
pub struct BuildEnvironment {
    name: ModuleName,
    externals: Arc<SymbolTable>,
    messages: Vec<Message>,
    engine: EngineLease,
}

impl BuildEnvironment {
    /// Merge the exports of `dependencies` (in declaration order) and lease
    /// an engine from `pool`.
    pub fn assemble(
        name: ModuleName,
        dependencies: &[Arc<Target>],
        pool: &Arc<EnginePool>,
    ) -> Self {
        let (externals, messages) = SymbolTable::merge_first_wins(
            name,
            dependencies.iter().map(|t| (t.name(), t.exports())),
        );
        BuildEnvironment {
            name,
            externals: Arc::new(externals),
            messages,
            engine: pool.lease(),
        }
    }

    pub fn name(&self) -> ModuleName {
        self.name
    }

    pub fn externals(&self) -> &SymbolTable {
        &self.externals
    }

    /// Messages produced while merging dependency exports.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Compile `text` in this environment, consuming it.
    pub fn compile(self, text: String, path: Option<PathBuf>) -> anyhow::Result<CompileOutput> {
        let BuildEnvironment {
            name,
            externals,
            mut engine,
            ..
        } = self;
        engine
            .compile(CompileUnit {
                name,
                text,
                path,
                externals,
            })
            .with_context(|| format!("compiler crashed on `{}`", name))
    }
}

impl fmt::Debug for BuildEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildEnvironment")
            .field("name", &self.name)
            .field("externals", &self.externals.len())
            .field("messages", &self.messages)
            .finish()
    }
}
