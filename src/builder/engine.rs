//! Compiler engines and the pool that recycles them.
//!
//! An [`Engine`] turns module text into a compiled artifact. Engines are
//! stateful and not shareable, so each build leases one from the
//! [`EnginePool`] and hands it back when the lease is dropped.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{Artifact, Message, ModuleName, Resources, SymbolTable};

/// Input of one compilation.
#[derive(Debug, Clone)]
pub struct CompileUnit {
    pub name: ModuleName,
    pub text: String,
    pub path: Option<PathBuf>,
    /// Symbols exported by the module's dependencies.
    pub externals: Arc<SymbolTable>,
}

/// Output of one compilation.
pub struct CompileOutput {
    pub module: Artifact,
    pub exports: SymbolTable,
    pub resources: Resources,
    pub messages: Vec<Message>,
}

impl fmt::Debug for CompileOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOutput")
            .field("exports", &self.exports.len())
            .field("resources", &self.resources.len())
            .field("messages", &self.messages)
            .finish()
    }
}

/// A compiler instance.
pub trait Engine: Send {
    /// Compile one module. An `Err` is a compiler crash; ordinary source
    /// errors are reported as error messages in the output.
    fn compile(&mut self, unit: CompileUnit) -> anyhow::Result<CompileOutput>;
}

/// Creates compiler engines.
pub trait Toolchain: Send + Sync {
    fn create_engine(&self) -> Box<dyn Engine>;

    /// Name for logs.
    fn name(&self) -> &str {
        "toolchain"
    }
}

/// A bounded pool of idle engines.
pub struct EnginePool {
    toolchain: Arc<dyn Toolchain>,
    idle: Mutex<Vec<Box<dyn Engine>>>,
    capacity: usize,
}

impl EnginePool {
    /// A pool that keeps at most `capacity` idle engines.
    pub fn new(toolchain: Arc<dyn Toolchain>, capacity: usize) -> Arc<Self> {
        Arc::new(EnginePool {
            toolchain,
            idle: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        })
    }

    /// Take an idle engine, creating one if the pool is empty.
    pub fn lease(self: &Arc<Self>) -> EngineLease {
        let reused = self.idle.lock().pop();
        let engine = match reused {
            Some(engine) => engine,
            None => {
                tracing::debug!(toolchain = self.toolchain.name(), "creating engine");
                self.toolchain.create_engine()
            }
        };
        EngineLease {
            pool: Arc::clone(self),
            engine: Some(engine),
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn give_back(&self, engine: Box<dyn Engine>) {
        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            idle.push(engine);
        }
    }
}

impl fmt::Debug for EnginePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnginePool")
            .field("toolchain", &self.toolchain.name())
            .field("idle", &self.idle_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// An engine on loan from an [`EnginePool`]; returned on drop.
pub struct EngineLease {
    pool: Arc<EnginePool>,
    engine: Option<Box<dyn Engine>>,
}

impl Deref for EngineLease {
    type Target = dyn Engine;

    fn deref(&self) -> &Self::Target {
        // Only `Drop` takes the engine out.
        match &self.engine {
            Some(engine) => engine.as_ref(),
            None => unreachable!("engine lease used after release"),
        }
    }
}

impl DerefMut for EngineLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.engine {
            Some(engine) => engine.as_mut(),
            None => unreachable!("engine lease used after release"),
        }
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.pool.give_back(engine);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CountingToolchain;

    #[test]
    fn test_lease_returns_engine_on_drop() {
        let toolchain = Arc::new(CountingToolchain::new());
        let pool = EnginePool::new(toolchain.clone(), 2);

        {
            let _a = pool.lease();
            let _b = pool.lease();
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(toolchain.engines_created(), 2);

        let _c = pool.lease();
        assert_eq!(toolchain.engines_created(), 2);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_pool_keeps_at_most_capacity() {
        let toolchain = Arc::new(CountingToolchain::new());
        let pool = EnginePool::new(toolchain.clone(), 1);

        let leases: Vec<_> = (0..3).map(|_| pool.lease()).collect();
        drop(leases);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(toolchain.engines_created(), 3);
    }

    #[test]
    fn test_lease_returned_when_compile_panics() {
        let toolchain = Arc::new(CountingToolchain::new());
        let pool = EnginePool::new(toolchain.clone(), 2);

        let pool_in_thread = Arc::clone(&pool);
        let result = std::thread::spawn(move || {
            let _lease = pool_in_thread.lease();
            panic!("compiler crashed");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(pool.idle_count(), 1);
    }
}
