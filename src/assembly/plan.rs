//! Self-assembling plans.
//!
//! A [`SelfAssemblingPlan`] registers modules straight from their source
//! text. A preflight pass reads each module's header for its name and its
//! references; references that no registered description satisfies are
//! looked up on the search paths, and the files found there are assembled in
//! turn through a work queue until every reachable module is registered.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::assembly::preflight::{HeaderPreflight, Preflight, PreflightResult};
use crate::assembly::refspec::RefSpec;
use crate::assembly::search::{candidates, canonical_or_self, SearchPaths};
use crate::builder::{EventSink, IncrementalPlan, PlanOptions, TargetFuture, Toolchain};
use crate::core::{
    BuildError, Instance, Message, ModuleName, Position, Target, TargetDescription,
    TargetDescriptionSet,
};
use crate::sources::{buffer, read_to_string, FileSource, Source};
use crate::util::cancel::CancellationToken;
use crate::util::config::{load_for_project, Config, DEFAULT_EXTENSION};
use crate::util::hash::module_fingerprint;
use crate::util::task_cache::TaskCache;

/// How references of a module being assembled are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Mode {
    /// Search the filesystem and assemble whatever is found.
    Recurse,
    /// Every reference must already be registered.
    RegisterOnly,
}

/// A candidate file that was read and preflighted.
#[derive(Debug)]
struct Scanned {
    path: PathBuf,
    text: Arc<str>,
    header: PreflightResult,
}

/// Module text ready to be described.
struct Unit {
    source: Arc<dyn Source>,
    text: Arc<str>,
    header: PreflightResult,
}

impl Unit {
    fn from_scanned(scanned: &Scanned) -> Self {
        Unit {
            source: Arc::new(FileSource::new(&scanned.path)),
            text: Arc::clone(&scanned.text),
            header: scanned.header.clone(),
        }
    }
}

/// A registered description and the files its references led to.
#[derive(Clone)]
struct Described {
    description: Arc<TargetDescription>,
    discovered: Vec<Arc<Scanned>>,
}

enum Resolution {
    /// A registered description satisfies the reference.
    Registered(ModuleName),
    /// A file declaring this module was found and still has to be described.
    Found(ModuleName, Arc<Scanned>),
}

/// Configures a [`SelfAssemblingPlan`].
pub struct SelfAssemblingPlanBuilder {
    toolchain: Arc<dyn Toolchain>,
    options: PlanOptions,
    events: Option<Arc<dyn EventSink>>,
    search_paths: Vec<PathBuf>,
    standard_library: Vec<ModuleName>,
    extension: String,
    preflight: Arc<dyn Preflight>,
}

impl SelfAssemblingPlanBuilder {
    pub fn options(mut self, options: PlanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    pub fn search_paths(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.search_paths.extend(dirs);
        self
    }

    /// Modules every assembled module depends on unless it opts out.
    pub fn standard_library(mut self, names: impl IntoIterator<Item = ModuleName>) -> Self {
        self.standard_library.extend(names);
        self
    }

    pub fn extension(mut self, extension: impl AsRef<str>) -> Self {
        self.extension = extension.as_ref().trim_start_matches('.').to_string();
        self
    }

    pub fn preflight(mut self, preflight: Arc<dyn Preflight>) -> Self {
        self.preflight = preflight;
        self
    }

    pub fn build(self) -> SelfAssemblingPlan {
        let plan = IncrementalPlan::with_options(self.toolchain, self.options, self.events);
        let assembler = Assembler {
            registry: Arc::clone(plan.registry()),
            search_paths: SearchPaths::new(self.search_paths),
            preflight: self.preflight,
            extension: self.extension,
            standard_library: self.standard_library,
            scans: TaskCache::new(),
            described: TaskCache::new(),
        };
        SelfAssemblingPlan {
            plan,
            assembler: Arc::new(assembler),
        }
    }
}

/// An [`IncrementalPlan`] that assembles its own registry from sources.
///
/// Dereferences to the incremental plan; `build`, `build_one` and `load` are
/// shadowed by versions that first assemble requested modules which are not
/// registered yet.
#[derive(Clone)]
pub struct SelfAssemblingPlan {
    plan: IncrementalPlan,
    assembler: Arc<Assembler>,
}

struct Assembler {
    registry: Arc<TargetDescriptionSet>,
    search_paths: SearchPaths,
    preflight: Arc<dyn Preflight>,
    extension: String,
    standard_library: Vec<ModuleName>,
    /// Preflight outcomes by canonical path. `None` for unreadable files.
    scans: TaskCache<PathBuf, Option<Arc<Scanned>>>,
    /// Successful description creation by path and mode. Failures are
    /// evicted so a retry sees the registry as it is then.
    described: TaskCache<(PathBuf, Mode), Result<Described, Arc<BuildError>>>,
}

impl SelfAssemblingPlan {
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        SelfAssemblingPlan::builder(toolchain).build()
    }

    pub fn builder(toolchain: Arc<dyn Toolchain>) -> SelfAssemblingPlanBuilder {
        SelfAssemblingPlanBuilder {
            toolchain,
            options: PlanOptions::default(),
            events: None,
            search_paths: Vec::new(),
            standard_library: Vec::new(),
            extension: DEFAULT_EXTENSION.to_string(),
            preflight: Arc::new(HeaderPreflight),
        }
    }

    /// A plan set up from the `[build]` and `[assembly]` sections of `config`.
    pub fn from_config(toolchain: Arc<dyn Toolchain>, config: &Config) -> anyhow::Result<Self> {
        Ok(SelfAssemblingPlan::configured(toolchain, config)?.build())
    }

    /// A plan for the project at `root`, configured from the global and
    /// project config files. Relative search paths are taken from `root`,
    /// which is itself searched last.
    pub fn for_project(toolchain: Arc<dyn Toolchain>, root: &Path) -> anyhow::Result<Self> {
        let mut config = load_for_project(root);
        for path in &mut config.assembly.search_paths {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        tracing::debug!(root = %root.display(), ?config, "loaded project configuration");
        Ok(SelfAssemblingPlan::configured(toolchain, &config)?
            .search_path(root)
            .build())
    }

    fn configured(
        toolchain: Arc<dyn Toolchain>,
        config: &Config,
    ) -> anyhow::Result<SelfAssemblingPlanBuilder> {
        let standard_library = config
            .assembly
            .standard_library
            .iter()
            .map(|text| {
                ModuleName::parse(text)
                    .with_context(|| format!("invalid standard library module `{}`", text))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(SelfAssemblingPlan::builder(toolchain)
            .options(PlanOptions::from_config(config))
            .search_paths(config.assembly.search_paths.iter().cloned())
            .standard_library(standard_library)
            .extension(config.extension()))
    }

    /// Register the module in `source`, searching for everything it
    /// references.
    ///
    /// Header errors and a missing module name fail here. References that
    /// cannot be found do not: the description records them and building it
    /// yields a failed target.
    pub async fn assemble(
        &self,
        source: Arc<dyn Source>,
        token: &CancellationToken,
    ) -> Result<Arc<TargetDescription>, BuildError> {
        self.assembler.assemble(source, Mode::Recurse, token).await
    }

    /// Register the module in `source` without searching. Every reference,
    /// including the standard library, must already be registered.
    pub async fn register_module(
        &self,
        source: Arc<dyn Source>,
        token: &CancellationToken,
    ) -> Result<Arc<TargetDescription>, BuildError> {
        self.assembler.assemble(source, Mode::RegisterOnly, token).await
    }

    pub fn search_paths(&self) -> &SearchPaths {
        &self.assembler.search_paths
    }

    pub fn standard_library(&self) -> &[ModuleName] {
        &self.assembler.standard_library
    }

    /// Assemble whichever of `names` are not registered, then start building
    /// all of them.
    pub async fn build(
        &self,
        names: &[ModuleName],
        token: &CancellationToken,
    ) -> Result<BTreeMap<ModuleName, TargetFuture>, BuildError> {
        self.ensure_registered(names, token).await?;
        self.plan.build(names, token)
    }

    pub async fn build_all(
        &self,
        names: &[ModuleName],
        token: &CancellationToken,
    ) -> Result<BTreeMap<ModuleName, Arc<Target>>, BuildError> {
        self.ensure_registered(names, token).await?;
        self.plan.build_all(names, token).await
    }

    pub async fn build_one(
        &self,
        name: ModuleName,
        token: &CancellationToken,
    ) -> Result<Arc<Target>, BuildError> {
        self.ensure_registered(&[name], token).await?;
        self.plan.build_one(name, token).await
    }

    pub async fn load(
        &self,
        name: ModuleName,
        token: &CancellationToken,
    ) -> Result<(Instance, Arc<Target>), BuildError> {
        self.ensure_registered(&[name], token).await?;
        self.plan.load(name, token).await
    }

    /// Assemble `source` and build it.
    pub async fn build_source(
        &self,
        source: Arc<dyn Source>,
        token: &CancellationToken,
    ) -> Result<Arc<Target>, BuildError> {
        let description = self.assemble(source, token).await?;
        self.plan.build_one(description.name(), token).await
    }

    pub fn plan(&self) -> &IncrementalPlan {
        &self.plan
    }

    async fn ensure_registered(
        &self,
        names: &[ModuleName],
        token: &CancellationToken,
    ) -> Result<(), BuildError> {
        for &name in names {
            if self.plan.registry().find_satisfying(&name).is_none() {
                self.assembler.assemble_reference(name, token).await?;
            }
        }
        Ok(())
    }
}

impl Deref for SelfAssemblingPlan {
    type Target = IncrementalPlan;

    fn deref(&self) -> &IncrementalPlan {
        &self.plan
    }
}

impl fmt::Debug for SelfAssemblingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfAssemblingPlan")
            .field("plan", &self.plan)
            .field("extension", &self.assembler.extension)
            .field("standard_library", &self.assembler.standard_library)
            .field("scanned", &self.assembler.scans.len())
            .finish()
    }
}

impl Assembler {
    async fn assemble(
        self: &Arc<Self>,
        source: Arc<dyn Source>,
        mode: Mode,
        token: &CancellationToken,
    ) -> Result<Arc<TargetDescription>, BuildError> {
        token.check()?;
        let unit = self.open(source).await?;
        let path = unit.header.path.clone();

        if mode == Mode::Recurse {
            if let Some(dir) = path.as_deref().and_then(Path::parent) {
                self.search_paths.add(dir).await;
            }
        }

        let described = match path {
            Some(path) => self.describe_shared(path, unit, mode, token).await,
            None => Arc::clone(self).describe(unit, mode, token.clone()).await,
        }
        .map_err(BuildError::unshare)?;

        self.drain(described.discovered, token).await?;
        Ok(described.description)
    }

    /// Find and assemble a module that was requested by name only.
    async fn assemble_reference(
        self: &Arc<Self>,
        name: ModuleName,
        token: &CancellationToken,
    ) -> Result<(), BuildError> {
        let mut reference = RefSpec::by_name(name);
        let resolution = self
            .resolve(&mut reference, Mode::Recurse, None, token)
            .await
            .map_err(BuildError::unshare)?;
        match resolution {
            Resolution::Registered(_) => Ok(()),
            Resolution::Found(_, scanned) => self.drain(vec![scanned], token).await,
        }
    }

    /// Read and preflight a root source, buffering it if it is single-use.
    async fn open(&self, source: Arc<dyn Source>) -> Result<Unit, BuildError> {
        let label = source.describe();
        let preflight = Arc::clone(&self.preflight);
        let unit = tokio::task::spawn_blocking(move || -> Result<Unit, BuildError> {
            let source = buffer(source)?;
            let text: Arc<str> = read_to_string(source.as_ref())?.into();
            let path = source.path().map(canonical_or_self);
            let header = preflight.preflight(&text, path.as_deref());
            Ok(Unit {
                source,
                text,
                header,
            })
        })
        .await
        .map_err(|e| BuildError::SourceUnavailable {
            source_name: label.clone(),
            reason: e.to_string(),
        })??;

        if let Some(message) = unit.header.first_error() {
            return Err(BuildError::Preflight {
                path: unit
                    .header
                    .path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(&label)),
                message,
            });
        }
        if unit.header.module_name.is_none() {
            return Err(BuildError::MissingModuleName { source_name: label });
        }
        Ok(unit)
    }

    /// Describe the module at `path`, at most once per path and mode while
    /// that succeeds.
    async fn describe_shared(
        self: &Arc<Self>,
        path: PathBuf,
        unit: Unit,
        mode: Mode,
        token: &CancellationToken,
    ) -> Result<Described, Arc<BuildError>> {
        let key = (path, mode);
        let this = Arc::clone(self);
        // Shared work must not die with the first caller's token.
        let handle = self.described.get_or_add(key.clone(), move || {
            this.describe(unit, mode, CancellationToken::none())
        });
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Arc::new(BuildError::Cancelled)),
            outcome = handle.wait() => outcome,
        };
        match outcome {
            Ok(Ok(described)) => Ok(described),
            Ok(Err(e)) => {
                self.described.remove(&key);
                Err(e)
            }
            Err(e) => {
                self.described.remove(&key);
                Err(Arc::new(BuildError::from(e)))
            }
        }
    }

    /// Assemble discovered files until none are left.
    async fn drain(
        self: &Arc<Self>,
        discovered: Vec<Arc<Scanned>>,
        token: &CancellationToken,
    ) -> Result<(), BuildError> {
        let mut queue: VecDeque<Arc<Scanned>> = discovered.into();
        let mut seen = HashSet::new();
        while let Some(scanned) = queue.pop_front() {
            token.check()?;
            if !seen.insert(scanned.path.clone()) {
                continue;
            }
            let unit = Unit::from_scanned(&scanned);
            match self
                .describe_shared(scanned.path.clone(), unit, Mode::Recurse, token)
                .await
            {
                Ok(described) => queue.extend(described.discovered),
                Err(e) if e.is_cancellation() => return Err(BuildError::unshare(e)),
                Err(e) => self.register_broken(&scanned, e),
            }
        }
        Ok(())
    }

    /// Resolve every reference of `unit` and register its description.
    async fn describe(
        self: Arc<Self>,
        unit: Unit,
        mode: Mode,
        token: CancellationToken,
    ) -> Result<Described, Arc<BuildError>> {
        let Some(name) = unit.header.module_name else {
            return Err(Arc::new(BuildError::MissingModuleName {
                source_name: unit.source.describe(),
            }));
        };
        if let Some(existing) = self.registry.get(&name) {
            tracing::debug!(module = %name, "module already registered");
            return Ok(Described {
                description: existing,
                discovered: Vec::new(),
            });
        }

        let mut references = unit.header.references.clone();
        // Standard library members only get the references they declare.
        let in_library = self.standard_library.iter().any(|l| l.id() == name.id());
        if !unit.header.suppress_stdlib && !in_library {
            for &library in &self.standard_library {
                let declared = references
                    .iter()
                    .any(|r| r.module_name.is_some_and(|n| n.id() == library.id()));
                if !declared {
                    references.push(RefSpec::by_name(library));
                }
            }
        }

        let position = Position {
            file: unit.header.path.clone(),
            line: 0,
            column: 0,
        };
        let mut dependencies = Vec::with_capacity(references.len());
        let mut discovered = Vec::new();
        let mut messages = Vec::new();
        let mut exception = None;
        for reference in references.iter_mut() {
            match self.resolve(reference, mode, Some(name), &token).await {
                Ok(Resolution::Registered(dependency)) => dependencies.push(dependency),
                Ok(Resolution::Found(dependency, scanned)) => {
                    dependencies.push(dependency);
                    discovered.push(scanned);
                }
                Err(e) if e.is_cancellation() || mode == Mode::RegisterOnly => return Err(e),
                Err(e) => {
                    tracing::info!(module = %name, reference = %reference, "unresolved reference");
                    messages.push(
                        Message::error(e.to_string())
                            .at(position.clone())
                            .classified("reference-not-found"),
                    );
                    exception.get_or_insert(e);
                }
            }
        }

        let fingerprint = module_fingerprint(name, dependencies.iter().copied(), &unit.text);
        let source = unit.source;
        let description = self
            .registry
            .get_or_create(name, || {
                let mut description = TargetDescription::from_source(name, dependencies, source)?
                    .with_messages(messages)
                    .with_fingerprint(fingerprint);
                if let Some(exception) = exception {
                    description = description.with_exception(exception);
                }
                Ok::<_, BuildError>(description)
            })
            .map_err(Arc::new)?;

        tracing::debug!(
            module = %name,
            dependencies = description.dependencies().len(),
            discovered = discovered.len(),
            "assembled module"
        );
        Ok(Described {
            description,
            discovered,
        })
    }

    async fn resolve(
        &self,
        reference: &mut RefSpec,
        mode: Mode,
        dependent: Option<ModuleName>,
        token: &CancellationToken,
    ) -> Result<Resolution, Arc<BuildError>> {
        if let Some(error) = &reference.error {
            return Err(Arc::clone(error));
        }
        if let Some(expected) = reference.module_name {
            if let Some(found) = self.registry.find_satisfying(&expected) {
                return Ok(Resolution::Registered(found.name()));
            }
        }
        if mode == Mode::RegisterOnly {
            let error = match reference.module_name {
                Some(name) => BuildError::UnresolvedDependency { name, dependent },
                None => BuildError::ReferenceNotFound {
                    reference: reference.to_string(),
                    candidates: 0,
                },
            };
            return Err(reference.fail(error));
        }

        let prefixes = self.search_paths.snapshot().await;
        let lookup = reference.clone();
        let mut tried = 0;
        for candidate in candidates(&lookup, &prefixes, &self.extension) {
            if token.is_cancelled() {
                return Err(Arc::new(BuildError::Cancelled));
            }
            tried += 1;
            let Some(scanned) = self.scan(&candidate).await else {
                continue;
            };
            let name = match accept(&lookup, &scanned) {
                Ok(name) => name,
                Err(reason) => {
                    tracing::debug!(candidate = %candidate.display(), %reason, "rejected candidate");
                    continue;
                }
            };

            reference.module_name = Some(name);
            reference.resolved_path = Some(scanned.path.clone());
            reference.source = Some(Arc::new(FileSource::new(&scanned.path)));
            if let Some(dir) = scanned.path.parent() {
                self.search_paths.add(dir).await;
            }
            tracing::debug!(reference = %lookup, path = %scanned.path.display(), "resolved reference");

            return Ok(if self.registry.contains(&name) {
                Resolution::Registered(name)
            } else {
                Resolution::Found(name, scanned)
            });
        }

        Err(reference.fail(BuildError::ReferenceNotFound {
            reference: lookup.to_string(),
            candidates: tried,
        }))
    }

    /// Read and preflight `candidate`, once per canonical path.
    async fn scan(&self, candidate: &Path) -> Option<Arc<Scanned>> {
        let path = tokio::fs::canonicalize(candidate).await.ok()?;
        let preflight = Arc::clone(&self.preflight);
        let handle = self.scans.get_or_add(path.clone(), move || async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    let header = preflight.preflight(&text, Some(&path));
                    Some(Arc::new(Scanned {
                        path,
                        text: text.into(),
                        header,
                    }))
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "candidate unreadable");
                    None
                }
            }
        });
        handle.wait().await.ok().flatten()
    }

    /// Register a description that fails with `error` for a found module
    /// that could not be described, so dependents fail instead of dangling.
    fn register_broken(&self, scanned: &Scanned, error: Arc<BuildError>) {
        let Some(name) = scanned.header.module_name else {
            return;
        };
        tracing::warn!(module = %name, error = %error, "module could not be assembled");
        let source: Arc<dyn Source> = Arc::new(FileSource::new(&scanned.path));
        if let Ok(description) = TargetDescription::from_source(name, [], source) {
            let description = description
                .with_messages([Message::error(error.to_string())])
                .with_exception(error);
            self.registry.insert_if_absent(Arc::new(description));
        }
    }
}

/// The module name `scanned` declares, if it may stand in for `reference`.
fn accept(reference: &RefSpec, scanned: &Scanned) -> Result<ModuleName, String> {
    if let Some(error) = scanned.header.first_error() {
        return Err(format!("invalid header: {}", error));
    }
    let Some(declared) = scanned.header.module_name else {
        return Err("declares no module name".to_string());
    };
    match reference.module_name {
        Some(expected) if !declared.satisfies(&expected) => Err(format!(
            "declares `{}` instead of `{}`",
            declared, expected
        )),
        _ => Ok(declared),
    }
}
