//! Core data structures for weave.
//!
//! This module contains the foundational types used throughout the crate:
//! - Interned module names and dependency sets
//! - Messages, symbols and built targets
//! - Linked instances
//! - Target descriptions and their registry

pub mod dependency;
pub mod description;
pub mod errors;
pub mod instance;
pub mod message;
pub mod module_name;
pub mod registry;
pub mod symbols;
pub mod target;

pub use dependency::DependencySet;
pub use description::{Recipe, TargetDescription};
pub use errors::BuildError;
pub use instance::Instance;
pub use message::{Message, Position, Severity};
pub use module_name::{ModuleName, ModuleNameError};
pub use registry::TargetDescriptionSet;
pub use symbols::{Symbol, SymbolTable};
pub use target::{Artifact, Resources, Target};
