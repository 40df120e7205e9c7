//! Shared helpers for integration tests.
//!
//! Integration tests only see the public API, so they bring their own
//! toolchain: engines export every `export NAME;` line, turn `fail;` into an
//! error message and count what they compile.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use weave::builder::{CompileOutput, CompileUnit, Engine, Toolchain};
use weave::core::{Message, ModuleName, Resources, Symbol, SymbolTable};

#[derive(Default)]
struct Counts {
    compiles: Mutex<HashMap<ModuleName, usize>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// A toolchain for scripted module text.
#[derive(Clone, Default)]
pub struct ScriptToolchain {
    counts: Arc<Counts>,
    delay: Option<Duration>,
}

impl ScriptToolchain {
    pub fn new() -> Arc<Self> {
        Arc::new(ScriptToolchain::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(ScriptToolchain {
            delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn compiled(&self, name: &str) -> usize {
        let name = ModuleName::parse(name).unwrap();
        self.counts.compiles.lock().get(&name).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.compiles.lock().values().sum()
    }

    pub fn peak(&self) -> usize {
        self.counts.peak.load(Ordering::SeqCst)
    }
}

impl Toolchain for ScriptToolchain {
    fn create_engine(&self) -> Box<dyn Engine> {
        Box::new(ScriptEngine {
            counts: Arc::clone(&self.counts),
            delay: self.delay,
        })
    }

    fn name(&self) -> &str {
        "script"
    }
}

struct ScriptEngine {
    counts: Arc<Counts>,
    delay: Option<Duration>,
}

impl Engine for ScriptEngine {
    fn compile(&mut self, unit: CompileUnit) -> anyhow::Result<CompileOutput> {
        let now = self.counts.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counts.peak.fetch_max(now, Ordering::SeqCst);
        *self.counts.compiles.lock().entry(unit.name).or_insert(0) += 1;

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let mut exports = SymbolTable::new();
        let mut messages = Vec::new();
        for line in unit.text.lines().map(str::trim) {
            if let Some(symbol) = line.strip_prefix("export ").and_then(|l| l.strip_suffix(';')) {
                exports.declare(symbol, Symbol::new(unit.name, symbol));
            } else if line == "fail;" {
                messages.push(Message::error(format!("{} refuses to compile", unit.name)));
            }
        }

        self.counts.active.fetch_sub(1, Ordering::SeqCst);
        Ok(CompileOutput {
            module: Arc::new(unit.name.to_string()),
            exports,
            resources: Resources::new(),
            messages,
        })
    }
}

pub fn name(text: &str) -> ModuleName {
    ModuleName::parse(text).unwrap()
}

/// Write a module file under `root`, creating directories.
pub fn write_module(root: &Path, relative: &str, text: &str) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, text).unwrap();
    path
}
