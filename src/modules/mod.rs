//=====================================================
// File: modules/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Asynchronous, deduplicating module loader
// Objective: Issue fetches for resource batches, resolve each loaded
//            module's dependencies, and run the execution engine whenever
//            the in-flight set drains
//=====================================================

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use futures::future::{FutureExt, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{LoaderConfig, StartMode};
use crate::engine::{self, CycleLog, ExecutionEngine, ExecutionReport};
use crate::error::{FetchError, Result};
use crate::fetch::LoadedResource;
use crate::handler_registry::HandlerRegistry;
use crate::path::{PathContext, PathResolver};
use crate::registry::{ExecutionRecord, ModuleRegistry, RecordSnapshot};
use crate::resolver::DependencyResolver;
use crate::scope::ModuleScope;
use crate::symbol::ResourceId;
use crate::version::ActiveConfiguration;

/// Runs once the batch it was registered with (and everything that batch
/// pulled in) has finished loading and executing.
pub type BatchCallback = Box<dyn FnOnce(&mut BatchContext<'_>)>;

type BatchRequest = (Vec<String>, Option<BatchCallback>);

/// What a batch callback sees: the registry, plus a way to start new batches.
pub struct BatchContext<'a> {
    registry: &'a ModuleRegistry,
    requests: Vec<BatchRequest>,
}

impl<'a> BatchContext<'a> {
    pub fn registry(&self) -> &ModuleRegistry {
        self.registry
    }

    pub fn load<I, S>(&mut self, identifiers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requests
            .push((identifiers.into_iter().map(Into::into).collect(), None));
    }

    pub fn load_with<I, S, F>(&mut self, identifiers: I, on_complete: F)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(&mut BatchContext<'_>) + 'static,
    {
        self.requests.push((
            identifiers.into_iter().map(Into::into).collect(),
            Some(Box::new(on_complete)),
        ));
    }
}

enum Completion {
    Fetched {
        id: ResourceId,
        outcome: std::result::Result<LoadedResource, FetchError>,
    },
    /// Imports discovered after their batch finished, requested one tick later.
    Deferred(Vec<ResourceId>),
}

/// Summary of everything `run` did so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Number of times the in-flight set drained.
    pub rounds: usize,
    pub execution: ExecutionReport,
    pub fetch_failures: Vec<(ResourceId, String)>,
    /// Records that are still not processed.
    pub pending: Vec<ResourceId>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.execution.cycles.is_empty()
            && self.execution.failed.is_empty()
            && self.fetch_failures.is_empty()
            && self.pending.is_empty()
    }
}

pub struct ModuleLoader {
    config: LoaderConfig,
    paths: PathResolver,
    active: ActiveConfiguration,
    registry: ModuleRegistry,
    handlers: HandlerRegistry,
    fetch_timeout: Option<Duration>,
    in_flight: FuturesUnordered<LocalBoxFuture<'static, Completion>>,
    on_complete: Vec<BatchCallback>,
    seen_cycles: CycleLog,
    execution: ExecutionReport,
    fetch_failures: Vec<(ResourceId, String)>,
    rounds: usize,
}

impl ModuleLoader {
    pub fn new(config: LoaderConfig, handlers: HandlerRegistry) -> Result<Self> {
        config.validate()?;
        let active = config.active()?;
        let mut paths = PathResolver::new(config.platform, &config.app_base)?;
        if let Some(home) = config.home.as_deref() {
            paths.set_home(home);
        }
        debug!(
            platform = %config.platform,
            base = %config.app_base,
            handlers = ?handlers.extensions(),
            "module loader configured"
        );
        Ok(Self {
            fetch_timeout: config.fetch_timeout_ms.map(Duration::from_millis),
            config,
            paths,
            active,
            registry: ModuleRegistry::new(),
            handlers,
            in_flight: FuturesUnordered::new(),
            on_complete: Vec::new(),
            seen_cycles: CycleLog::new(),
            execution: ExecutionReport::default(),
            fetch_failures: Vec::new(),
            rounds: 0,
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn active(&self) -> &ActiveConfiguration {
        &self.active
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Request a batch. Relative identifiers resolve against the application
    /// base; identifiers already registered are skipped.
    pub fn load<I, S>(&mut self, identifiers: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identifiers = identifiers.into_iter().map(Into::into).collect();
        self.request(identifiers, None)
    }

    /// Like [`ModuleLoader::load`], with a callback for when the batch completes.
    pub fn load_with<I, S, F>(&mut self, identifiers: I, on_complete: F) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(&mut BatchContext<'_>) + 'static,
    {
        let identifiers = identifiers.into_iter().map(Into::into).collect();
        self.request(identifiers, Some(Box::new(on_complete)))
    }

    /// Drive outstanding fetches until nothing is left in flight and no
    /// callback or deferred request produced new work.
    pub async fn run(&mut self) -> Result<LoadReport> {
        loop {
            loop {
                let Some(completion) = self.in_flight.next().await else {
                    break;
                };
                match completion {
                    Completion::Fetched { id, outcome } => self.on_item_loaded(id, outcome)?,
                    Completion::Deferred(ids) => self.issue(ids),
                }
            }
            let issued = self.loading_complete()?;
            if !issued && self.in_flight.is_empty() {
                break;
            }
        }
        Ok(self.report())
    }

    /// Load the splash resource (if any) and then the main module.
    pub fn start(&mut self) -> Result<()> {
        let Some(main) = self.config.main.clone().filter(|main| !main.is_empty()) else {
            warn!("Application entry point is not defined.");
            return Ok(());
        };
        match self.config.splash.clone().filter(|splash| !splash.is_empty()) {
            Some(splash) => {
                debug!(%splash, "loading splash before main module");
                self.load_with([splash], move |batch| {
                    info!(%main, "starting application");
                    batch.load([main]);
                })
            }
            None => {
                info!(%main, "starting application");
                self.load([main])
            }
        }
    }

    /// Start according to the configured mode. `manual` waits for an
    /// explicit [`ModuleLoader::start`].
    pub fn boot(&mut self) -> Result<()> {
        match self.config.mode {
            StartMode::Node | StartMode::Onload => self.start(),
            StartMode::Manual => {
                debug!("manual start mode, waiting for start()");
                Ok(())
            }
        }
    }

    pub async fn run_application(&mut self) -> Result<LoadReport> {
        self.start()?;
        self.run().await
    }

    pub fn list_all(&self) -> Vec<RecordSnapshot> {
        self.registry.all()
    }

    pub fn list_processed(&self) -> Vec<RecordSnapshot> {
        self.registry.processed()
    }

    pub fn list_pending(&self) -> Vec<RecordSnapshot> {
        self.registry.pending()
    }

    /// Returns the variable table after the update.
    pub fn set_path_variable(&mut self, name: &str, value: &str) -> Result<BTreeMap<String, String>> {
        Ok(self.paths.set_path_variable(name, value)?)
    }

    pub fn path_variables(&self) -> BTreeMap<String, String> {
        self.paths.path_variables()
    }

    pub fn report(&self) -> LoadReport {
        LoadReport {
            rounds: self.rounds,
            execution: self.execution.clone(),
            fetch_failures: self.fetch_failures.clone(),
            pending: self
                .registry
                .iter()
                .filter(|record| !record.is_processed())
                .map(|record| record.id().clone())
                .collect(),
        }
    }

    fn request(&mut self, identifiers: Vec<String>, on_complete: Option<BatchCallback>) -> Result<()> {
        let mut resolved = Vec::with_capacity(identifiers.len());
        for identifier in &identifiers {
            if let Some(id) = self.paths.resolve(identifier, self.paths.app_context())? {
                resolved.push(id);
            }
        }
        if let Some(callback) = on_complete {
            self.on_complete.push(callback);
        }
        self.issue(resolved);
        Ok(())
    }

    /// Register and fetch every identifier not yet in the registry.
    fn issue(&mut self, ids: Vec<ResourceId>) {
        for id in ids {
            if self.registry.has(&id) {
                continue;
            }
            let Some(fetcher) = self.handlers.resolve(&id) else {
                debug!(resource = %id, "no handler, registering as asset");
                self.registry.put(ExecutionRecord::asset(id));
                continue;
            };
            debug!(resource = %id, "requesting resource");
            self.registry.put(ExecutionRecord::requested(id.clone()));
            let fetch = fetcher.fetch(&id);
            let fetch = match self.fetch_timeout {
                Some(limit) => {
                    let timed_out = id.clone();
                    async move {
                        tokio::time::timeout(limit, fetch)
                            .await
                            .unwrap_or(Err(FetchError::TimedOut(timed_out)))
                    }
                    .boxed_local()
                }
                None => fetch,
            };
            self.in_flight
                .push(async move { Completion::Fetched { id, outcome: fetch.await } }.boxed_local());
        }
    }

    fn on_item_loaded(&mut self, id: ResourceId, outcome: std::result::Result<LoadedResource, FetchError>) -> Result<()> {
        let Some(rid) = self.registry.id_of(&id) else {
            warn!(resource = %id, "completion for an unregistered resource");
            return Ok(());
        };
        let descriptor = match outcome {
            Ok(LoadedResource::Module(descriptor)) => descriptor,
            Ok(LoadedResource::Asset) => {
                debug!(resource = %id, "asset loaded");
                let record = self.registry.record_mut(rid);
                record.mark_loaded_asset();
                record.mark_processed();
                return Ok(());
            }
            Err(err) => {
                warn!(resource = %id, error = %err, "fetch failed");
                self.registry.record_mut(rid).mark_failed(err.to_string());
                self.fetch_failures.push((id, err.to_string()));
                return Ok(());
            }
        };

        let context = self.paths.context(&id);
        let resolver = DependencyResolver::new(&self.paths, &self.active);
        let resolved = resolver
            .resolve_prerequisites(&descriptor, &context)
            .and_then(|prerequisites| Ok((prerequisites, resolver.resolve_required(&descriptor, &context)?)));
        let (prerequisites, imports) = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                self.registry.record_mut(rid).mark_failed(err.to_string());
                return Err(err.into());
            }
        };

        let next = if prerequisites
            .resources
            .iter()
            .all(|prerequisite| self.registry.is_processed(prerequisite))
        {
            imports.resources.clone()
        } else {
            prerequisites.resources.clone()
        };
        let standalone = prerequisites.is_empty() && imports.is_empty();
        debug!(
            module = %id,
            prerequisites = prerequisites.resources.len(),
            imports = imports.resources.len(),
            "module loaded"
        );

        let scope = ModuleScope::new(id, context, self.active.clone());
        self.registry.record_mut(rid).mark_loaded_module(
            scope,
            descriptor.definition,
            prerequisites.imports,
            imports.imports,
        );
        self.issue(next);

        if standalone {
            let mut engine = ExecutionEngine::new(&mut self.registry, &mut self.seen_cycles);
            engine.execute_one(rid)?;
            let report = engine.into_report();
            self.absorb(report)?;
        }
        Ok(())
    }

    /// Completion hook: execute what can run, fire batch callbacks newest
    /// first, then pick up imports nobody has requested yet. Returns whether
    /// new work was queued.
    fn loading_complete(&mut self) -> Result<bool> {
        self.rounds += 1;
        debug!(round = self.rounds, "loading complete, running dependency tree");
        let before = self.registry.len();

        let report = engine::execute_pass(&mut self.registry, &mut self.seen_cycles)?;
        self.absorb(report)?;

        let callbacks = std::mem::take(&mut self.on_complete);
        let mut requests = Vec::new();
        for callback in callbacks.into_iter().rev() {
            let mut batch = BatchContext {
                registry: &self.registry,
                requests: Vec::new(),
            };
            callback(&mut batch);
            requests.extend(batch.requests);
        }
        let mut issued = !requests.is_empty();
        for (identifiers, on_complete) in requests {
            self.request(identifiers, on_complete)?;
        }

        issued |= self.continue_loading();
        Ok(issued || self.registry.len() != before)
    }

    /// Records whose imports were never requested (their prerequisites had
    /// not run at the time) get them requested on the next tick, once every
    /// prerequisite is processed.
    fn continue_loading(&mut self) -> bool {
        let mut scheduled = false;
        for record in self.registry.iter() {
            if record.is_processed() {
                continue;
            }
            let prerequisites_ready = record
                .prerequisites()
                .iter()
                .all(|prerequisite| self.registry.is_processed(&prerequisite.id));
            if !prerequisites_ready {
                continue;
            }
            let missing: Vec<ResourceId> = record
                .imports()
                .iter()
                .filter(|import| !self.registry.has(&import.id))
                .map(|import| import.id.clone())
                .collect();
            if missing.is_empty() {
                continue;
            }
            debug!(module = %record.id(), missing = missing.len(), "deferring import requests");
            self.in_flight.push(
                async move {
                    tokio::task::yield_now().await;
                    Completion::Deferred(missing)
                }
                .boxed_local(),
            );
            scheduled = true;
        }
        scheduled
    }

    /// Fold an execution report in and issue the loads module bodies queued.
    fn absorb(&mut self, mut report: ExecutionReport) -> Result<()> {
        let requests = std::mem::take(&mut report.requests);
        self.execution.merge(report);
        for (context, identifiers) in requests {
            self.request_from(&context, identifiers)?;
        }
        Ok(())
    }

    fn request_from(&mut self, context: &PathContext, identifiers: Vec<String>) -> Result<()> {
        let mut resolved = Vec::with_capacity(identifiers.len());
        for identifier in &identifiers {
            if let Some(id) = self.paths.resolve_dependency(identifier, context)? {
                resolved.push(id);
            }
        }
        self.issue(resolved);
        Ok(())
    }
}

/// Run a loader future to completion on a current-thread runtime.
pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
