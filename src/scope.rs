//=====================================================
// File: scope.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Capability object handed to module bodies
// Objective: Carry mounted imports, collect exports and queue follow-up
//            loads for the module currently executing
//=====================================================

use crate::error::NamespaceError;
use crate::namespace::{Function, Namespace, Value};
use crate::path::PathContext;
use crate::symbol::ResourceId;
use crate::version::ActiveConfiguration;

#[derive(Debug, Clone)]
pub struct ModuleScope {
    uri: ResourceId,
    context: PathContext,
    config: ActiveConfiguration,
    imports: Namespace,
    exports: Namespace,
    requests: Vec<String>,
}

impl ModuleScope {
    pub fn new(uri: ResourceId, context: PathContext, config: ActiveConfiguration) -> Self {
        Self {
            uri,
            context,
            config,
            imports: Namespace::new(),
            exports: Namespace::new(),
            requests: Vec::new(),
        }
    }

    pub fn uri(&self) -> &ResourceId {
        &self.uri
    }

    /// Location the module's own relative identifiers resolve against.
    pub fn context(&self) -> &PathContext {
        &self.context
    }

    pub fn config(&self) -> &ActiveConfiguration {
        &self.config
    }

    pub fn imports(&self) -> &Namespace {
        &self.imports
    }

    /// Look up a mounted import, e.g. `"ui.Button"`.
    pub fn import(&self, path: &str) -> Option<&Value> {
        self.imports.lookup(path)
    }

    pub fn exports(&self) -> &Namespace {
        &self.exports
    }

    pub fn export(&mut self, name: &str, value: impl Into<Value>) -> Result<(), NamespaceError> {
        self.exports.add(name, value.into(), false)
    }

    pub fn export_fn(&mut self, func: Function) -> Result<(), NamespaceError> {
        self.exports.add_function(func, false)
    }

    pub fn export_all<I, K>(&mut self, mapping: I) -> Result<(), NamespaceError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        self.exports.add_mapping(mapping, false)
    }

    /// Request further resources. They are resolved against this module's
    /// context and issued once the current execution round finishes.
    pub fn load<I, S>(&mut self, identifiers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requests
            .extend(identifiers.into_iter().map(Into::into));
    }

    pub(crate) fn mount(&mut self, alias: &str, exports: &Namespace) -> Result<(), NamespaceError> {
        for (key, value) in exports.iter() {
            self.imports
                .add(&format!("{alias}.{key}"), value.clone(), false)?;
        }
        Ok(())
    }

    pub(crate) fn take_requests(&mut self) -> Vec<String> {
        std::mem::take(&mut self.requests)
    }
}
