//! Self-assembly - registering modules from their source files.
//!
//! Modules name themselves and their references in a short header. This
//! module reads those headers, finds referenced modules on a list of search
//! paths and registers everything it finds with a plan.

pub mod plan;
pub mod preflight;
pub mod refspec;
pub mod search;

pub use plan::{SelfAssemblingPlan, SelfAssemblingPlanBuilder};
pub use preflight::{HeaderPreflight, Preflight, PreflightResult};
pub use refspec::RefSpec;
pub use search::{candidates, name_forms, SearchPaths};
