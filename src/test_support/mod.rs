//! Test utilities and mocks for weave unit tests.
//!
//! This module is only available when compiling with `--cfg test`. It
//! provides a compiler toolchain that counts what it is asked to do, and
//! helpers for registering and writing modules.
//!
//! # Example
//!
//! ```rust,ignore
//! use weave::test_support::{describe, CountingToolchain};
//!
//! let toolchain = Arc::new(CountingToolchain::new());
//! let plan = Plan::new(toolchain.clone());
//! plan.register(describe("app", &["lib"], "export main;"));
//! ```
//!
//! The counting engine understands a tiny line-based language:
//! `export NAME;` exports a symbol, `warn;` and `fail;` emit a warning or an
//! error message, `crash;` makes the engine itself fail and `panic;` panics.

pub mod fixtures;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::bail;
use parking_lot::Mutex;

use crate::builder::engine::{CompileOutput, CompileUnit, Engine, Toolchain};
use crate::core::{Message, ModuleName, Resources, Symbol, SymbolTable, TargetDescription};
use crate::sources::TextSource;

pub use fixtures::*;

/// What a counting engine produces for a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    pub name: ModuleName,
    pub exports: Vec<String>,
}

#[derive(Default)]
struct Counters {
    engines: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    compiles: Mutex<HashMap<ModuleName, usize>>,
    externals: Mutex<HashMap<ModuleName, Vec<String>>>,
}

/// A toolchain whose engines record every compilation.
#[derive(Clone, Default)]
pub struct CountingToolchain {
    counters: Arc<Counters>,
    delay: Option<Duration>,
}

impl CountingToolchain {
    pub fn new() -> Self {
        CountingToolchain::default()
    }

    /// Make every compilation take at least `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn engines_created(&self) -> usize {
        self.counters.engines.load(Ordering::SeqCst)
    }

    /// How often `name` was compiled.
    pub fn compiled(&self, name: &ModuleName) -> usize {
        self.counters.compiles.lock().get(name).copied().unwrap_or(0)
    }

    pub fn total_compiles(&self) -> usize {
        self.counters.compiles.lock().values().sum()
    }

    /// The external symbol names the last compilation of `name` saw, sorted.
    pub fn externals_seen(&self, name: &ModuleName) -> Vec<String> {
        self.counters
            .externals
            .lock()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Most compilations that ever ran at once.
    pub fn peak_concurrency(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

impl Toolchain for CountingToolchain {
    fn create_engine(&self) -> Box<dyn Engine> {
        self.counters.engines.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingEngine {
            counters: Arc::clone(&self.counters),
            delay: self.delay,
        })
    }

    fn name(&self) -> &str {
        "counting"
    }
}

struct CountingEngine {
    counters: Arc<Counters>,
    delay: Option<Duration>,
}

struct ActiveGuard<'a>(&'a Counters);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Engine for CountingEngine {
    fn compile(&mut self, unit: CompileUnit) -> anyhow::Result<CompileOutput> {
        let now = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);
        let _active = ActiveGuard(&self.counters);

        *self.counters.compiles.lock().entry(unit.name).or_insert(0) += 1;
        let mut seen: Vec<String> = unit.externals.iter().map(|(n, _)| n.to_string()).collect();
        seen.sort();
        self.counters.externals.lock().insert(unit.name, seen);

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let mut exports = SymbolTable::new();
        let mut messages = Vec::new();
        for line in unit.text.lines().map(str::trim) {
            if let Some(symbol) = line
                .strip_prefix("export ")
                .and_then(|rest| rest.strip_suffix(';'))
            {
                exports.declare(symbol.trim(), Symbol::new(unit.name, symbol.trim()));
            } else if line == "warn;" {
                messages.push(Message::warning(format!("warning in {}", unit.name)));
            } else if line == "fail;" {
                messages.push(Message::error(format!("compile error in {}", unit.name)));
            } else if line == "crash;" {
                bail!("engine crashed compiling {}", unit.name);
            } else if line == "panic;" {
                panic!("engine panicked compiling {}", unit.name);
            }
        }

        let module = CompiledModule {
            name: unit.name,
            exports: exports.iter().map(|(n, _)| n.to_string()).collect(),
        };
        Ok(CompileOutput {
            module: Arc::new(module),
            exports,
            resources: Resources::new(),
            messages,
        })
    }
}

/// Describe module `name` with dependencies `deps` and body `text`.
pub fn describe(name: &str, deps: &[&str], text: &str) -> TargetDescription {
    let parse = |s: &str| ModuleName::parse(s).unwrap();
    TargetDescription::from_source(
        parse(name),
        deps.iter().map(|d| parse(d)),
        Arc::new(TextSource::new(text)),
    )
    .unwrap()
}

/// Install a tracing subscriber honouring `RUST_LOG`, once per process.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_engine_language() {
        let toolchain = CountingToolchain::new();
        let mut engine = toolchain.create_engine();
        let name = ModuleName::parse("m").unwrap();

        let output = engine
            .compile(CompileUnit {
                name,
                text: "export a;\nwarn;\nfail;\n".into(),
                path: None,
                externals: Arc::new(SymbolTable::new()),
            })
            .unwrap();
        assert!(output.exports.contains("a"));
        assert_eq!(output.messages.len(), 2);
        assert_eq!(toolchain.compiled(&name), 1);
        assert_eq!(toolchain.engines_created(), 1);

        let crashed = engine.compile(CompileUnit {
            name,
            text: "crash;".into(),
            path: None,
            externals: Arc::new(SymbolTable::new()),
        });
        assert!(crashed.is_err());
        assert_eq!(toolchain.peak_concurrency(), 1);
    }
}
