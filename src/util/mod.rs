//! Shared utilities

pub mod cancel;
pub mod cancellable_cache;
pub mod config;
pub mod diagnostic;
pub mod hash;
pub mod interning;
pub mod task_cache;

pub use cancel::{CancellationSource, CancellationToken};
pub use cancellable_cache::ReferenceCancellableCache;
pub use config::Config;
pub use diagnostic::Diagnostic;
pub use interning::InternedString;
pub use task_cache::{TaskCache, TaskError, TaskHandle};
