//! Module build orchestration.
//!
//! This module implements plans that build registered modules concurrently,
//! the compiler engine pool they share, and the events they report.

pub mod context;
pub mod engine;
pub mod events;
pub mod graph;
pub mod incremental;
pub mod plan;

pub use context::BuildEnvironment;
pub use engine::{CompileOutput, CompileUnit, Engine, EngineLease, EnginePool, Toolchain};
pub use events::{BuildEvent, EventLog, EventSink, JsonLinesSink};
pub use graph::BuildGraph;
pub use incremental::IncrementalPlan;
pub use plan::{BuildHook, Plan, PlanBuilder, PlanOptions, TargetFuture};
