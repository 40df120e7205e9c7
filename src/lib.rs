//! Weave - an incremental, concurrency-safe module build orchestrator
//!
//! This crate builds interdependent modules for a language runtime. It
//! memoizes one build per module, shares it between concurrent callers,
//! links compiled modules into instances, and can discover modules on disk
//! from the references they declare.

pub mod assembly;
pub mod builder;
pub mod core;
pub mod sources;
pub mod util;

/// Test utilities and mocks for weave unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a counting compiler toolchain and on-disk module fixtures.
#[cfg(test)]
pub mod test_support;

pub use assembly::{HeaderPreflight, Preflight, SelfAssemblingPlan};
pub use builder::{
    BuildEvent, Engine, EventSink, IncrementalPlan, Plan, PlanOptions, TargetFuture, Toolchain,
};
pub use core::{
    BuildError, Instance, Message, ModuleName, Severity, Target, TargetDescription,
    TargetDescriptionSet,
};
pub use sources::{FileSource, ReaderSource, Source, TextSource};
pub use util::{CancellationSource, CancellationToken, Config};
