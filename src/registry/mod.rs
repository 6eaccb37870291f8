//=====================================================
// File: registry/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Per-loader table of execution records
// Objective: Map each ResourceId to exactly one record, the single point of
//            deduplication for fetches and the source for introspection
//=====================================================

use std::collections::HashMap;

use serde::Serialize;

use crate::namespace::Namespace;
use crate::resolver::{Definition, DependencySpec};
use crate::scope::ModuleScope;
use crate::symbol::ResourceId;

/// Index of a record in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(usize);

impl RecordId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// `Requested -> Loaded -> Processed`, or `Failed` when the fetch or the body fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum RecordStatus {
    Requested,
    Loaded,
    Processed,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Resource whose source declared a module descriptor.
    Module,
    /// Anything else: no dependencies, no body.
    Asset,
}

pub struct ExecutionRecord {
    id: ResourceId,
    status: RecordStatus,
    kind: RecordKind,
    pub(crate) prerequisites: Option<Vec<DependencySpec>>,
    pub(crate) imports: Option<Vec<DependencySpec>>,
    pub(crate) scope: Option<ModuleScope>,
    pub(crate) definition: Option<Definition>,
}

impl std::fmt::Debug for ExecutionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRecord")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("kind", &self.kind)
            .field("prerequisites", &self.prerequisites)
            .field("imports", &self.imports)
            .finish_non_exhaustive()
    }
}

impl ExecutionRecord {
    pub fn requested(id: ResourceId) -> Self {
        Self {
            id,
            status: RecordStatus::Requested,
            kind: RecordKind::Asset,
            prerequisites: None,
            imports: None,
            scope: None,
            definition: None,
        }
    }

    /// A resource with nothing to fetch or resolve.
    pub fn asset(id: ResourceId) -> Self {
        Self {
            status: RecordStatus::Loaded,
            ..Self::requested(id)
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn status(&self) -> &RecordStatus {
        &self.status
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn is_processed(&self) -> bool {
        self.status == RecordStatus::Processed
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RecordStatus::Failed(_))
    }

    pub fn prerequisites(&self) -> &[DependencySpec] {
        self.prerequisites.as_deref().unwrap_or_default()
    }

    pub fn imports(&self) -> &[DependencySpec] {
        self.imports.as_deref().unwrap_or_default()
    }

    pub fn scope(&self) -> Option<&ModuleScope> {
        self.scope.as_ref()
    }

    /// Exports published by the body; empty until processed.
    pub fn exports(&self) -> Option<&Namespace> {
        self.scope.as_ref().map(ModuleScope::exports)
    }

    pub(crate) fn mark_loaded_module(
        &mut self,
        scope: ModuleScope,
        definition: Definition,
        prerequisites: Vec<DependencySpec>,
        imports: Vec<DependencySpec>,
    ) {
        self.kind = RecordKind::Module;
        self.status = RecordStatus::Loaded;
        self.scope = Some(scope);
        self.definition = Some(definition);
        self.prerequisites = Some(prerequisites);
        self.imports = Some(imports);
    }

    pub(crate) fn mark_loaded_asset(&mut self) {
        self.kind = RecordKind::Asset;
        self.status = RecordStatus::Loaded;
    }

    pub(crate) fn mark_processed(&mut self) {
        self.status = RecordStatus::Processed;
    }

    pub(crate) fn mark_failed(&mut self, reason: impl Into<String>) {
        if !self.is_processed() {
            self.status = RecordStatus::Failed(reason.into());
        }
    }

    pub fn snapshot(&self) -> RecordSnapshot {
        RecordSnapshot {
            id: self.id.clone(),
            status: self.status.clone(),
            kind: self.kind,
            prerequisites: self.prerequisites().iter().map(|dep| dep.id.clone()).collect(),
            imports: self.imports().to_vec(),
            exports: self
                .exports()
                .map(|ns| ns.keys().map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

/// Read-only copy of a record for tooling and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSnapshot {
    pub id: ResourceId,
    pub status: RecordStatus,
    pub kind: RecordKind,
    pub prerequisites: Vec<ResourceId>,
    pub imports: Vec<DependencySpec>,
    pub exports: Vec<String>,
}

/// Insertion-ordered arena of records keyed by [`ResourceId`].
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    records: Vec<ExecutionRecord>,
    index: HashMap<ResourceId, RecordId>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn id_of(&self, id: &str) -> Option<RecordId> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&ExecutionRecord> {
        self.id_of(id).map(|rid| &self.records[rid.0])
    }

    /// True only for a registered record whose body has run.
    pub fn is_processed(&self, id: &str) -> bool {
        self.get(id).is_some_and(ExecutionRecord::is_processed)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ExecutionRecord> {
        let rid = self.id_of(id)?;
        Some(&mut self.records[rid.0])
    }

    pub fn record(&self, rid: RecordId) -> &ExecutionRecord {
        &self.records[rid.0]
    }

    pub(crate) fn record_mut(&mut self, rid: RecordId) -> &mut ExecutionRecord {
        &mut self.records[rid.0]
    }

    /// Register a record. An existing entry is kept and its id returned.
    pub fn put(&mut self, record: ExecutionRecord) -> RecordId {
        if let Some(existing) = self.id_of(record.id()) {
            return existing;
        }
        let rid = RecordId(self.records.len());
        self.index.insert(record.id().clone(), rid);
        self.records.push(record);
        rid
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        (0..self.records.len()).map(RecordId)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn all(&self) -> Vec<RecordSnapshot> {
        self.records.iter().map(ExecutionRecord::snapshot).collect()
    }

    pub fn processed(&self) -> Vec<RecordSnapshot> {
        self.records
            .iter()
            .filter(|record| record.is_processed())
            .map(ExecutionRecord::snapshot)
            .collect()
    }

    pub fn pending(&self) -> Vec<RecordSnapshot> {
        self.records
            .iter()
            .filter(|record| !record.is_processed())
            .map(ExecutionRecord::snapshot)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_is_idempotent_per_identifier() {
        let mut registry = ModuleRegistry::new();
        let first = registry.put(ExecutionRecord::requested("/app/a.js".into()));
        let again = registry.put(ExecutionRecord::asset("/app/a.js".into()));
        assert_eq!(first, again);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("/app/a.js").map(ExecutionRecord::status),
            Some(&RecordStatus::Requested)
        );
    }

    #[test]
    fn snapshots_follow_insertion_order_and_status() {
        let mut registry = ModuleRegistry::new();
        registry.put(ExecutionRecord::requested("/app/b.js".into()));
        let asset = registry.put(ExecutionRecord::asset("/app/logo.png".into()));
        registry.record_mut(asset).mark_processed();

        let all: Vec<_> = registry.all().into_iter().map(|s| s.id.into_string()).collect();
        assert_eq!(all, vec!["/app/b.js", "/app/logo.png"]);
        assert_eq!(registry.processed().len(), 1);
        assert_eq!(registry.pending()[0].id.as_str(), "/app/b.js");
        assert!(registry.is_processed("/app/logo.png"));
        assert!(!registry.is_processed("/app/b.js"));
        assert!(!registry.is_processed("/app/unknown.js"));
    }

    #[test]
    fn failure_never_overrides_processed() {
        let mut record = ExecutionRecord::asset("/app/x.css".into());
        record.mark_processed();
        record.mark_failed("late timeout");
        assert!(record.is_processed());
    }

    #[test]
    fn snapshot_serialises_status_tag() {
        let mut record = ExecutionRecord::requested("/app/x.js".into());
        record.mark_failed("not found");
        let json = serde_json::to_value(record.snapshot()).unwrap();
        assert_eq!(json["status"]["state"], "failed");
        assert_eq!(json["status"]["reason"], "not found");
    }
}
