//! Incremental plans - keep built targets across builds.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use dashmap::DashMap;

use crate::builder::engine::Toolchain;
use crate::builder::events::EventSink;
use crate::builder::plan::{BuildHook, Plan, PlanOptions};
use crate::core::{ModuleName, Recipe, Target, TargetDescription, TargetDescriptionSet};

/// A [`Plan`] that replaces each built module's description with one
/// providing the built target, so later builds reuse it instead of
/// recompiling.
///
/// Dereferences to the wrapped plan for building and loading.
#[derive(Clone)]
pub struct IncrementalPlan {
    plan: Plan,
    retained: Arc<Retainer>,
}

/// Swaps descriptions for provided ones and remembers the originals.
struct Retainer {
    registry: Arc<TargetDescriptionSet>,
    originals: DashMap<ModuleName, Arc<TargetDescription>>,
}

impl BuildHook for Retainer {
    fn target_built(&self, description: &Arc<TargetDescription>, target: &Arc<Target>) {
        let provided = Arc::new(description.with_provided(Arc::clone(target)));
        if self.registry.compare_and_replace(description, provided) {
            tracing::debug!(module = %description.name(), "retained built target");
            self.originals
                .insert(description.name(), Arc::clone(description));
        }
    }
}

impl IncrementalPlan {
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        IncrementalPlan::with_options(toolchain, PlanOptions::default(), None)
    }

    pub fn with_options(
        toolchain: Arc<dyn Toolchain>,
        options: PlanOptions,
        events: Option<Arc<dyn EventSink>>,
    ) -> Self {
        let registry = Arc::new(TargetDescriptionSet::new());
        let retained = Arc::new(Retainer {
            registry: Arc::clone(&registry),
            originals: DashMap::new(),
        });

        let mut builder = Plan::builder(toolchain)
            .options(options)
            .registry(registry)
            .hook(retained.clone());
        if let Some(sink) = events {
            builder = builder.event_sink(sink);
        }

        IncrementalPlan {
            plan: builder.build(),
            retained,
        }
    }

    /// The target retained for `name`, if it was built.
    pub fn cached(&self, name: &ModuleName) -> Option<Arc<Target>> {
        match self.plan.registry().get(name)?.recipe() {
            Recipe::Provided(target) => Some(Arc::clone(target)),
            Recipe::Source(_) => None,
        }
    }

    /// Throw away the retained target of `name` so it is compiled again.
    ///
    /// The original source description is restored and the memoized build is
    /// dropped. Returns `false` if nothing was retained for `name`.
    pub fn invalidate(&self, name: &ModuleName) -> bool {
        let Some((_, original)) = self.retained.originals.remove(name) else {
            return false;
        };
        let restored = match self.plan.registry().get(name) {
            Some(current) => self.plan.registry().compare_and_replace(&current, original),
            None => self.plan.registry().insert_if_absent(original),
        };
        self.plan.forget(name);
        tracing::debug!(module = %name, restored, "invalidated retained target");
        restored
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }
}

impl Deref for IncrementalPlan {
    type Target = Plan;

    fn deref(&self) -> &Plan {
        &self.plan
    }
}

impl fmt::Debug for IncrementalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncrementalPlan")
            .field("plan", &self.plan)
            .field("retained", &self.retained.originals.len())
            .finish()
    }
}
