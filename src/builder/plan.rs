//! Build plans.
//!
//! A [`Plan`] owns a registry of target descriptions and builds modules from
//! it. Every module is built at most once per plan: concurrent and repeated
//! requests share one memoized build, which is torn down only when nobody
//! is interested in it any more.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;

use crate::builder::context::BuildEnvironment;
use crate::builder::engine::{EnginePool, Toolchain};
use crate::builder::events::{BuildEvent, EventSink};
use crate::builder::graph::BuildGraph;
use crate::core::errors::BuildError;
use crate::core::{
    Instance, Message, ModuleName, Recipe, Target, TargetDescription, TargetDescriptionSet,
};
use crate::sources::read_to_string;
use crate::util::cancel::{CancellationSource, CancellationToken};
use crate::util::cancellable_cache::ReferenceCancellableCache;
use crate::util::config::Config;
use crate::util::task_cache::TaskError;

/// The eventual target of one requested module.
pub type TargetFuture = Pin<Box<dyn Future<Output = Result<Arc<Target>, BuildError>> + Send>>;

type BuiltFuture = Pin<Box<dyn Future<Output = Result<Built, BuildError>> + Send>>;

/// A memoized module build: its target and the instance linking it.
#[derive(Clone)]
struct Built {
    target: Arc<Target>,
    instance: Arc<Instance>,
}

/// Called with every target a plan produces from a registered description.
pub trait BuildHook: Send + Sync {
    fn target_built(&self, description: &Arc<TargetDescription>, target: &Arc<Target>);
}

/// Tuning knobs of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    /// Maximum number of modules compiled at once.
    pub max_parallel: usize,
    /// Idle engines kept for reuse.
    pub engine_pool_size: usize,
}

impl PlanOptions {
    pub fn from_config(config: &Config) -> Self {
        PlanOptions {
            max_parallel: config.max_parallel(),
            engine_pool_size: config.engine_pool_size(),
        }
    }
}

impl Default for PlanOptions {
    fn default() -> Self {
        PlanOptions::from_config(&Config::default())
    }
}

/// Configures a [`Plan`].
pub struct PlanBuilder {
    toolchain: Arc<dyn Toolchain>,
    options: PlanOptions,
    registry: Option<Arc<TargetDescriptionSet>>,
    events: Option<Arc<dyn EventSink>>,
    hook: Option<Arc<dyn BuildHook>>,
}

impl PlanBuilder {
    pub fn options(mut self, options: PlanOptions) -> Self {
        self.options = options;
        self
    }

    /// Share an existing registry instead of starting with an empty one.
    pub fn registry(mut self, registry: Arc<TargetDescriptionSet>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn BuildHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn build(self) -> Plan {
        let max_parallel = self.options.max_parallel.max(1);
        Plan {
            inner: Arc::new(PlanInner {
                registry: self.registry.unwrap_or_default(),
                pool: EnginePool::new(self.toolchain, self.options.engine_pool_size),
                builds: ReferenceCancellableCache::new(),
                limiter: Semaphore::new(max_parallel),
                shutdown: CancellationSource::new(),
                events: self.events,
                hook: self.hook,
            }),
        }
    }
}

/// Builds registered modules, each at most once.
#[derive(Clone)]
pub struct Plan {
    inner: Arc<PlanInner>,
}

struct PlanInner {
    registry: Arc<TargetDescriptionSet>,
    pool: Arc<EnginePool>,
    builds: ReferenceCancellableCache<ModuleName, Result<Built, TaskError>>,
    limiter: Semaphore,
    shutdown: CancellationSource,
    events: Option<Arc<dyn EventSink>>,
    hook: Option<Arc<dyn BuildHook>>,
}

impl Plan {
    /// A plan with default options and an empty registry.
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        Plan::builder(toolchain).build()
    }

    pub fn builder(toolchain: Arc<dyn Toolchain>) -> PlanBuilder {
        PlanBuilder {
            toolchain,
            options: PlanOptions::default(),
            registry: None,
            events: None,
            hook: None,
        }
    }

    pub fn registry(&self) -> &Arc<TargetDescriptionSet> {
        &self.inner.registry
    }

    pub fn engine_pool(&self) -> &Arc<EnginePool> {
        &self.inner.pool
    }

    /// Register `description` unless its module already has one.
    pub fn register(&self, description: TargetDescription) -> bool {
        self.inner.registry.insert_if_absent(Arc::new(description))
    }

    /// Start building `names`.
    ///
    /// Unresolved dependencies and cycles are reported here, before any
    /// build starts. Otherwise every requested module gets a future for its
    /// target; dropping a future or cancelling `token` withdraws this
    /// caller's interest without disturbing other callers.
    pub fn build(
        &self,
        names: &[ModuleName],
        token: &CancellationToken,
    ) -> Result<BTreeMap<ModuleName, TargetFuture>, BuildError> {
        let graph = BuildGraph::validate(&self.inner.registry, names)?;

        let mut futures = BTreeMap::new();
        for &requested in names {
            let resolved = self.resolve(&graph, requested)?;
            let pending = self.inner.join(resolved, token);
            let future: TargetFuture = Box::pin(async move { Ok(pending.await?.target) });
            futures.insert(requested, future);
        }
        Ok(futures)
    }

    /// Build `names` and wait for all of them.
    pub async fn build_all(
        &self,
        names: &[ModuleName],
        token: &CancellationToken,
    ) -> Result<BTreeMap<ModuleName, Arc<Target>>, BuildError> {
        let futures = self.build(names, token)?;
        let mut targets = BTreeMap::new();
        for (name, future) in futures {
            targets.insert(name, future.await?);
        }
        Ok(targets)
    }

    /// Build one module and return its target.
    pub async fn build_one(
        &self,
        name: ModuleName,
        token: &CancellationToken,
    ) -> Result<Arc<Target>, BuildError> {
        let mut futures = self.build(&[name], token)?;
        match futures.remove(&name) {
            Some(future) => future.await,
            None => Err(BuildError::UnresolvedDependency {
                name,
                dependent: None,
            }),
        }
    }

    /// Build one module and return a fresh instance linked against its
    /// dependencies, along with its target.
    pub async fn load(
        &self,
        name: ModuleName,
        token: &CancellationToken,
    ) -> Result<(Instance, Arc<Target>), BuildError> {
        let graph = BuildGraph::validate(&self.inner.registry, &[name])?;
        let resolved = self.resolve(&graph, name)?;
        let built = self.inner.join(resolved, token).await?;
        Ok((Instance::clone(&built.instance), built.target))
    }

    fn resolve(&self, graph: &BuildGraph, requested: ModuleName) -> Result<ModuleName, BuildError> {
        self.inner
            .registry
            .find_satisfying(&requested)
            .map(|d| d.name())
            .filter(|name| graph.contains(name))
            .ok_or(BuildError::UnresolvedDependency {
                name: requested,
                dependent: None,
            })
    }

    /// Drop the memoized build of `name` so the next request rebuilds it.
    pub fn forget(&self, name: &ModuleName) -> bool {
        self.inner.builds.remove(name)
    }

    /// Whether a build of `name` is running or memoized.
    pub fn is_building(&self, name: &ModuleName) -> bool {
        self.inner.builds.contains_key(name)
    }

    /// Callers currently waiting for `name`; `Some(-1)` once it finished.
    pub fn interest(&self, name: &ModuleName) -> Option<isize> {
        self.inner.builds.interest(name)
    }

    /// Cancel every build on this plan. Further builds fail with `Cancelled`.
    pub fn shutdown(&self) {
        tracing::info!("shutting down plan");
        self.inner.shutdown.cancel();
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("registered", &self.inner.registry.len())
            .field("builds", &self.inner.builds.len())
            .field("pool", &self.inner.pool)
            .finish()
    }
}

impl PlanInner {
    /// Join the shared build of `name` on behalf of a caller holding `token`.
    fn join(self: &Arc<Self>, name: ModuleName, token: &CancellationToken) -> BuiltFuture {
        let inner = Arc::clone(self);
        let pending = self.builds.get_or_add(
            name,
            move |work_token| {
                let build: Pin<Box<dyn Future<Output = Result<Built, TaskError>> + Send>> =
                    Box::pin(inner.build_module(name, work_token));
                build
            },
            token,
        );
        Box::pin(async move {
            match pending.await {
                Ok(Ok(built)) => Ok(built),
                Ok(Err(e)) | Err(e) => Err(BuildError::from(e)),
            }
        })
    }

    fn is_cancelled(&self, token: &CancellationToken) -> bool {
        token.is_cancelled() || self.shutdown.is_cancelled()
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(sink) = &self.events {
            sink.emit(&event);
        }
    }

    async fn build_module(
        self: Arc<Self>,
        name: ModuleName,
        token: CancellationToken,
    ) -> Result<Built, TaskError> {
        if self.is_cancelled(&token) {
            return Err(TaskError::Cancelled);
        }

        let Some(description) = self.registry.get(&name) else {
            let target = Target::failed(
                name,
                BuildError::UnresolvedDependency {
                    name,
                    dependent: None,
                },
                vec![],
            );
            return Ok(self.finish(None, Arc::new(target), vec![], true, None));
        };

        // Start every dependency before waiting on any of them.
        let mut pending = Vec::new();
        let mut failed = Vec::new();
        let mut causes = Vec::new();
        let mut inherited = Vec::new();
        for dependency in description.dependencies().iter() {
            match self.registry.find_satisfying(&dependency) {
                Some(found) => pending.push((found.name(), self.join(found.name(), &token))),
                None => {
                    failed.push(dependency);
                    causes.push(Arc::new(BuildError::UnresolvedDependency {
                        name: dependency,
                        dependent: Some(name),
                    }));
                }
            }
        }

        let mut ready = Vec::with_capacity(pending.len());
        for (dependency, future) in pending {
            match future.await {
                Ok(built) => {
                    if !built.target.is_successful() {
                        failed.push(dependency);
                        causes.push(failure_cause(&built.target));
                        inherited.extend(built.target.messages().iter().cloned());
                    }
                    ready.push(built);
                }
                Err(e) if e.is_cancellation() => return Err(TaskError::Cancelled),
                Err(e) => {
                    failed.push(dependency);
                    causes.push(Arc::new(e));
                }
            }
        }

        if self.is_cancelled(&token) {
            return Err(TaskError::Cancelled);
        }

        if !failed.is_empty() {
            tracing::info!(module = %name, failed = failed.len(), "skipping module with failed dependencies");
            let mut messages = description.build_messages().to_vec();
            messages.extend(inherited);
            for dependency in &failed {
                messages.push(Message::error(format!(
                    "dependency `{}` of `{}` failed",
                    dependency, name
                )));
            }
            let target = Target::failed(
                name,
                BuildError::DependencyFailed {
                    name,
                    failed,
                    causes,
                },
                messages,
            );
            return Ok(self.finish(Some(&description), Arc::new(target), ready, true, None));
        }

        if let Some(exception) = description.exception() {
            tracing::info!(module = %name, "module could not be assembled");
            let target = Target::failed_with(
                name,
                Arc::clone(exception),
                description.build_messages().to_vec(),
            );
            return Ok(self.finish(Some(&description), Arc::new(target), ready, true, None));
        }

        let source = match description.recipe() {
            Recipe::Provided(target) => {
                tracing::debug!(module = %name, "reusing provided target");
                let target = Arc::clone(target);
                return Ok(self.finish(None, target, ready, false, None));
            }
            Recipe::Source(source) => Arc::clone(source),
        };

        let shutdown = self.shutdown.token();
        let _permit = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(TaskError::Cancelled),
            _ = shutdown.cancelled() => return Err(TaskError::Cancelled),
            permit = self.limiter.acquire() => permit.map_err(|_| TaskError::Cancelled)?,
        };

        self.emit(BuildEvent::started(name, description.fingerprint()));
        tracing::info!(module = %name, "compiling");
        let started = Instant::now();

        let dependency_targets: Vec<_> = ready.iter().map(|b| Arc::clone(&b.target)).collect();
        let environment = BuildEnvironment::assemble(name, &dependency_targets, &self.pool);
        let path = description.source_path().map(Path::to_path_buf);

        let merge_messages = environment.messages().to_vec();
        let compiled = tokio::task::spawn_blocking(move || {
            let text = read_to_string(source.as_ref())?;
            environment
                .compile(text, path)
                .map_err(|e| BuildError::CompileFailure {
                    name,
                    message: format!("{:#}", e),
                })
        })
        .await;

        let mut messages = description.build_messages().to_vec();
        messages.extend(merge_messages);
        let target = match compiled {
            Ok(Ok(output)) => {
                messages.extend(output.messages);
                Target::compiled(name, output.module, output.exports, output.resources, messages)
            }
            Ok(Err(e)) => Target::failed(name, e, messages),
            Err(join) => Target::failed(
                name,
                BuildError::CompileFailure {
                    name,
                    message: format!("compiler panicked: {}", join),
                },
                messages,
            ),
        };

        let elapsed = started.elapsed().as_millis() as u64;
        Ok(self.finish(
            Some(&description),
            Arc::new(target),
            ready,
            true,
            Some(elapsed),
        ))
    }

    /// Link the instance, notify the hook and report the outcome.
    fn finish(
        &self,
        description: Option<&Arc<TargetDescription>>,
        target: Arc<Target>,
        dependencies: Vec<Built>,
        fresh: bool,
        duration_ms: Option<u64>,
    ) -> Built {
        let mut instance = Instance::for_target(&target);
        for dependency in &dependencies {
            instance.link(&dependency.instance);
        }

        if target.is_successful() {
            tracing::info!(module = %target.name(), fresh, "module ready");
        } else {
            tracing::info!(module = %target.name(), "module failed");
        }
        self.emit(BuildEvent::outcome(&target, fresh, duration_ms));

        if let (Some(description), Some(hook)) = (description, &self.hook) {
            hook.target_built(description, &target);
        }

        Built {
            target,
            instance: Arc::new(instance),
        }
    }
}

/// The error to blame when a dependency's target failed.
fn failure_cause(target: &Target) -> Arc<BuildError> {
    if let Some(exception) = target.exception() {
        return Arc::clone(exception);
    }
    let message = target
        .messages()
        .iter()
        .find(|m| m.is_error())
        .map(|m| m.text.clone())
        .unwrap_or_else(|| "build failed".to_string());
    Arc::new(BuildError::CompileFailure {
        name: target.name(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::events::EventLog;
    use crate::core::Severity;
    use crate::test_support::{describe, init_tracing, CountingToolchain};
    use std::time::Duration;

    fn name(text: &str) -> ModuleName {
        ModuleName::parse(text).unwrap()
    }

    fn plan_with(toolchain: &Arc<CountingToolchain>) -> Plan {
        Plan::builder(toolchain.clone())
            .options(PlanOptions {
                max_parallel: 4,
                engine_pool_size: 2,
            })
            .build()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_builds_and_links_dependencies() {
        let toolchain = Arc::new(CountingToolchain::new());
        let plan = plan_with(&toolchain);
        plan.register(describe("base", &[], "export print;"));
        plan.register(describe("lib", &["base"], "export helper;"));
        plan.register(describe("app", &["lib"], "export main;"));

        let token = CancellationToken::none();
        let (instance, target) = plan.load(name("app"), &token).await.unwrap();

        assert!(target.is_successful());
        assert!(target.exports().contains("main"));
        assert!(instance.is_linked_to(&name("lib")));
        assert!(instance.is_linked_to(&name("base")));
        assert_eq!(toolchain.compiled(&name("base")), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dependency_exports_reach_compiler() {
        let toolchain = Arc::new(CountingToolchain::new());
        let plan = plan_with(&toolchain);
        plan.register(describe("a", &[], "export shared;"));
        plan.register(describe("b", &[], "export shared;\nexport extra;"));
        plan.register(describe("app", &["a", "b"], ""));

        let target = plan
            .build_one(name("app"), &CancellationToken::none())
            .await
            .unwrap();
        assert_eq!(
            toolchain.externals_seen(&name("app")),
            vec!["extra".to_string(), "shared".to_string()]
        );
        assert_eq!(target.count(Severity::Info), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_diamond_compiles_shared_dependency_once() {
        let toolchain = Arc::new(CountingToolchain::new().with_delay(Duration::from_millis(20)));
        let plan = plan_with(&toolchain);
        plan.register(describe("base", &[], ""));
        plan.register(describe("left", &["base"], ""));
        plan.register(describe("right", &["base"], ""));
        plan.register(describe("app", &["left", "right"], ""));

        let token = CancellationToken::none();
        let targets = plan
            .build_all(&[name("app"), name("left"), name("right")], &token)
            .await
            .unwrap();

        assert!(targets.values().all(|t| t.is_successful()));
        assert_eq!(toolchain.compiled(&name("base")), 1);
        assert_eq!(toolchain.total_compiles(), 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_repeated_build_is_memoized() {
        let toolchain = Arc::new(CountingToolchain::new());
        let plan = plan_with(&toolchain);
        plan.register(describe("m", &[], ""));

        let token = CancellationToken::none();
        let first = plan.build_one(name("m"), &token).await.unwrap();
        let second = plan.build_one(name("m"), &token).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(toolchain.compiled(&name("m")), 1);
        assert_eq!(plan.interest(&name("m")), Some(-1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_propagates_without_compiling_dependents() {
        let toolchain = Arc::new(CountingToolchain::new());
        let log = EventLog::new();
        let plan = Plan::builder(toolchain.clone()).event_sink(log.clone()).build();
        plan.register(describe("leaf", &[], "fail;"));
        plan.register(describe("mid", &["leaf"], ""));
        plan.register(describe("app", &["mid"], ""));

        let target = plan
            .build_one(name("app"), &CancellationToken::none())
            .await
            .unwrap();

        assert!(!target.is_successful());
        assert_eq!(toolchain.compiled(&name("mid")), 0);
        assert_eq!(toolchain.compiled(&name("app")), 0);

        let exception = target.exception().unwrap();
        match exception.as_ref() {
            BuildError::DependencyFailed { failed, .. } => assert_eq!(failed, &vec![name("mid")]),
            other => panic!("expected dependency failure, got {other:?}"),
        }
        let roots = exception.root_causes();
        assert_eq!(roots.len(), 1);
        assert!(matches!(
            roots[0].as_ref(),
            BuildError::CompileFailure { name: n, .. } if *n == name("leaf")
        ));
        assert!(target.messages().iter().any(|m| m.text.contains("compile error in leaf")));
        assert!(log
            .for_module(name("app"))
            .iter()
            .all(|e| matches!(e, BuildEvent::ModuleFailed { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_compiler_crash_becomes_failed_target() {
        let toolchain = Arc::new(CountingToolchain::new());
        let plan = plan_with(&toolchain);
        plan.register(describe("boom", &[], "crash;"));

        let target = plan
            .build_one(name("boom"), &CancellationToken::none())
            .await
            .unwrap();
        assert!(!target.is_successful());
        assert!(matches!(
            target.exception().map(|e| e.as_ref()),
            Some(BuildError::CompileFailure { .. })
        ));
        assert_eq!(plan.engine_pool().idle_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_crashed_target_keeps_shadowing_messages() {
        init_tracing();
        let toolchain = Arc::new(CountingToolchain::new());
        let plan = plan_with(&toolchain);
        plan.register(describe("a", &[], "export shared;"));
        plan.register(describe("b", &[], "export shared;"));
        plan.register(describe("app", &["a", "b"], "crash;"));

        let target = plan
            .build_one(name("app"), &CancellationToken::none())
            .await
            .unwrap();
        assert!(!target.is_successful());
        assert_eq!(target.count(Severity::Info), 1);
        assert!(target
            .messages()
            .iter()
            .any(|m| m.classification.as_deref() == Some("symbol-shadowed")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_eager_validation() {
        let toolchain = Arc::new(CountingToolchain::new());
        let plan = plan_with(&toolchain);
        plan.register(describe("app", &["missing"], ""));
        plan.register(describe("x", &["y"], ""));
        plan.register(describe("y", &["x"], ""));

        let token = CancellationToken::none();
        assert!(matches!(
            plan.build(&[name("app")], &token),
            Err(BuildError::UnresolvedDependency { .. })
        ));
        assert!(matches!(
            plan.build(&[name("x")], &token),
            Err(BuildError::DependencyCycle { .. })
        ));
        assert_eq!(toolchain.total_compiles(), 0);
        assert!(!plan.is_building(&name("app")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_caller_does_not_stop_shared_build() {
        let toolchain = Arc::new(CountingToolchain::new().with_delay(Duration::from_millis(100)));
        let plan = plan_with(&toolchain);
        plan.register(describe("slow", &[], ""));

        let impatient = CancellationSource::new();
        let mut first = plan.build(&[name("slow")], &impatient.token()).unwrap();
        let mut second = plan.build(&[name("slow")], &CancellationToken::none()).unwrap();
        assert_eq!(plan.interest(&name("slow")), Some(2));

        impatient.cancel();
        let cancelled = first.remove(&name("slow")).unwrap().await;
        assert!(matches!(cancelled, Err(BuildError::Cancelled)));

        let target = second.remove(&name("slow")).unwrap().await.unwrap();
        assert!(target.is_successful());
        assert_eq!(toolchain.compiled(&name("slow")), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_last_withdrawal_cancels_build() {
        let toolchain = Arc::new(CountingToolchain::new().with_delay(Duration::from_millis(50)));
        let plan = plan_with(&toolchain);
        plan.register(describe("dep", &[], ""));
        plan.register(describe("top", &["dep"], ""));

        let source = CancellationSource::new();
        let futures = plan.build(&[name("top")], &source.token()).unwrap();
        assert_eq!(plan.interest(&name("top")), Some(1));

        drop(futures);
        assert!(!plan.is_building(&name("top")));

        // The next request starts afresh.
        let target = plan
            .build_one(name("top"), &CancellationToken::none())
            .await
            .unwrap();
        assert!(target.is_successful());
        assert_eq!(toolchain.compiled(&name("top")), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_rejects_new_builds() {
        let toolchain = Arc::new(CountingToolchain::new());
        let plan = plan_with(&toolchain);
        plan.register(describe("m", &[], ""));
        plan.shutdown();

        let result = plan.build_one(name("m"), &CancellationToken::none()).await;
        assert!(matches!(result, Err(BuildError::Cancelled)));
        assert_eq!(toolchain.total_compiles(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_max_parallel_bounds_compiles() {
        let toolchain = Arc::new(CountingToolchain::new().with_delay(Duration::from_millis(30)));
        let plan = Plan::builder(toolchain.clone())
            .options(PlanOptions {
                max_parallel: 1,
                engine_pool_size: 1,
            })
            .build();
        let names: Vec<_> = (0..4)
            .map(|i| {
                let module = format!("m{}", i);
                plan.register(describe(&module, &[], ""));
                name(&module)
            })
            .collect();

        plan.build_all(&names, &CancellationToken::none()).await.unwrap();
        assert_eq!(toolchain.peak_concurrency(), 1);
        assert_eq!(toolchain.engines_created(), 1);
    }
}
