//=====================================================
// File: engine/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Dependency-first execution of loaded modules
// Objective: Walk the registry depth-first, run each definition body once
//            after its prerequisites and imports, and report cycles without
//            aborting unrelated branches
//=====================================================

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{CycleError, NamespaceError};
use crate::namespace::Namespace;
use crate::path::PathContext;
use crate::registry::{ModuleRegistry, RecordId, RecordStatus};
use crate::symbol::ResourceId;

/// Outcome of visiting one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Processed,
    /// Not runnable yet: a dependency is missing, still loading, or failed.
    Deferred,
}

enum Abort {
    Cycle(CycleError),
    Namespace(NamespaceError),
}

/// What one execution pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    /// Records that reached `processed`, in execution order.
    pub processed: Vec<ResourceId>,
    /// Distinct cycles found, each starting and ending with the same identifier.
    pub cycles: Vec<Vec<ResourceId>>,
    /// Modules whose body returned an error.
    pub failed: Vec<(ResourceId, String)>,
    /// Loads requested by bodies through `ModuleScope::load`.
    #[serde(skip)]
    pub(crate) requests: Vec<(PathContext, Vec<String>)>,
}

impl ExecutionReport {
    pub fn merge(&mut self, other: ExecutionReport) {
        self.processed.extend(other.processed);
        self.cycles.extend(other.cycles);
        self.failed.extend(other.failed);
        self.requests.extend(other.requests);
    }
}

/// Cycles already reported, keyed by their sorted members.
pub type CycleLog = HashSet<Vec<ResourceId>>;

/// Execute every record that can run. Cycles abort only their own branch; a
/// namespace conflict while mounting imports is fatal.
pub fn execute_all(registry: &mut ModuleRegistry) -> Result<ExecutionReport, NamespaceError> {
    let mut seen = CycleLog::new();
    execute_pass(registry, &mut seen)
}

/// Like [`execute_all`], but cycles already present in `seen` are not reported again.
pub fn execute_pass(registry: &mut ModuleRegistry, seen: &mut CycleLog) -> Result<ExecutionReport, NamespaceError> {
    let mut engine = ExecutionEngine::new(registry, seen);
    let ids: Vec<RecordId> = engine.registry.ids().collect();
    for rid in ids {
        if engine.registry.record(rid).is_processed() {
            continue;
        }
        engine.execute_one(rid)?;
    }
    Ok(engine.into_report())
}

pub struct ExecutionEngine<'r> {
    registry: &'r mut ModuleRegistry,
    seen_cycles: &'r mut CycleLog,
    report: ExecutionReport,
}

impl<'r> ExecutionEngine<'r> {
    pub fn new(registry: &'r mut ModuleRegistry, seen_cycles: &'r mut CycleLog) -> Self {
        Self {
            registry,
            seen_cycles,
            report: ExecutionReport::default(),
        }
    }

    /// Visit one record with a fresh traversal stack.
    pub fn execute_one(&mut self, rid: RecordId) -> Result<Visit, NamespaceError> {
        let mut stack = Vec::new();
        match self.visit(rid, &mut stack) {
            Ok(visit) => Ok(visit),
            Err(Abort::Cycle(cycle)) => {
                debug!(%cycle, "branch deferred");
                Ok(Visit::Deferred)
            }
            Err(Abort::Namespace(err)) => Err(err),
        }
    }

    pub fn into_report(self) -> ExecutionReport {
        self.report
    }

    fn visit(&mut self, rid: RecordId, stack: &mut Vec<RecordId>) -> Result<Visit, Abort> {
        let record = self.registry.record(rid);
        if record.is_processed() {
            return Ok(Visit::Processed);
        }
        if let Some(start) = stack.iter().position(|on_stack| *on_stack == rid) {
            let mut cycle: Vec<ResourceId> = stack[start..]
                .iter()
                .map(|frame| self.registry.record(*frame).id().clone())
                .collect();
            cycle.push(record.id().clone());
            let cycle = CycleError { cycle };
            self.report_cycle(&cycle, stack);
            return Err(Abort::Cycle(cycle));
        }
        if matches!(record.status(), RecordStatus::Requested | RecordStatus::Failed(_)) {
            return Ok(Visit::Deferred);
        }

        stack.push(rid);
        let dependencies = self.visit_dependencies(rid, stack);
        stack.pop();
        match dependencies? {
            Visit::Processed => self.run(rid),
            Visit::Deferred => Ok(Visit::Deferred),
        }
    }

    /// Prerequisites first, then imports. A dependency with no record at all
    /// defers the branch right away.
    fn visit_dependencies(&mut self, rid: RecordId, stack: &mut Vec<RecordId>) -> Result<Visit, Abort> {
        let record = self.registry.record(rid);
        let dependencies: Vec<ResourceId> = record
            .prerequisites()
            .iter()
            .chain(record.imports())
            .map(|dep| dep.id.clone())
            .collect();

        let mut outcome = Visit::Processed;
        for dependency in dependencies {
            let Some(dep_rid) = self.registry.id_of(&dependency) else {
                return Ok(Visit::Deferred);
            };
            if self.visit(dep_rid, stack)? == Visit::Deferred {
                outcome = Visit::Deferred;
            }
        }
        Ok(outcome)
    }

    fn run(&mut self, rid: RecordId) -> Result<Visit, Abort> {
        let mounts = self.collect_mounts(rid);
        let record = self.registry.record_mut(rid);
        let (Some(mut scope), Some(definition)) = (record.scope.take(), record.definition.take()) else {
            record.mark_processed();
            self.report.processed.push(record.id().clone());
            return Ok(Visit::Processed);
        };

        for (alias, exports) in &mounts {
            if let Err(err) = scope.mount(alias, exports) {
                record.scope = Some(scope);
                record.definition = Some(definition);
                return Err(Abort::Namespace(err));
            }
        }

        debug!(module = %record.id(), "executing module definition");
        let result = definition(&mut scope);
        let requests = scope.take_requests();
        if !requests.is_empty() {
            self.report.requests.push((scope.context().clone(), requests));
        }
        record.scope = Some(scope);
        match result {
            Ok(()) => {
                record.mark_processed();
                self.report.processed.push(record.id().clone());
                Ok(Visit::Processed)
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(module = %record.id(), %reason, "module definition failed");
                record.mark_failed(reason.clone());
                self.report.failed.push((record.id().clone(), reason));
                Ok(Visit::Deferred)
            }
        }
    }

    fn collect_mounts(&self, rid: RecordId) -> Vec<(String, Namespace)> {
        let record = self.registry.record(rid);
        record
            .prerequisites()
            .iter()
            .chain(record.imports())
            .filter_map(|dep| {
                let alias = dep.alias.as_ref()?;
                let exports = self.registry.get(&dep.id)?.exports()?;
                Some((alias.clone(), exports.clone()))
            })
            .collect()
    }

    fn report_cycle(&mut self, cycle: &CycleError, stack: &[RecordId]) {
        let mut key = cycle.cycle[..cycle.cycle.len() - 1].to_vec();
        key.sort();
        if !self.seen_cycles.insert(key) {
            return;
        }
        error!(%cycle, "cyclic dependency detected, branch abandoned");
        for frame in stack.iter().rev() {
            error!("  {}", self.registry.record(*frame).id());
        }
        self.report.cycles.push(cycle.cycle.clone());
    }
}
