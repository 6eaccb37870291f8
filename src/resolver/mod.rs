//=====================================================
// File: resolver.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Dependency resolution for module descriptors
// Objective: Turn a descriptor's declared prerequisites and requirements into
//            ordered, version-qualified, absolute resource identifiers
//=====================================================

use std::fmt;

use crate::error::ConfigError;
use crate::path::{PathContext, PathResolver};
use crate::scope::ModuleScope;
use crate::symbol::ResourceId;
use crate::version::ActiveConfiguration;

/// Module body. Runs once, after every prerequisite and import has run.
pub type Definition = Box<dyn FnOnce(&mut ModuleScope) -> anyhow::Result<()>>;

/// A dependency as written by a module author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyEntry {
    /// `"lib/x.js"` or `"lib/x.js|WEB:1.0-2.0"`.
    Bare(String),
    /// `{ alias: "lib/x.js" }`; exports get mounted under `alias`.
    Aliased { alias: String, identifier: String },
}

impl DependencyEntry {
    pub fn aliased(alias: impl Into<String>, identifier: impl Into<String>) -> Self {
        DependencyEntry::Aliased {
            alias: alias.into(),
            identifier: identifier.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            DependencyEntry::Bare(identifier) => identifier,
            DependencyEntry::Aliased { identifier, .. } => identifier,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            DependencyEntry::Bare(_) => None,
            DependencyEntry::Aliased { alias, .. } => Some(alias),
        }
    }
}

impl From<&str> for DependencyEntry {
    fn from(value: &str) -> Self {
        DependencyEntry::Bare(value.to_string())
    }
}

impl From<String> for DependencyEntry {
    fn from(value: String) -> Self {
        DependencyEntry::Bare(value)
    }
}

impl From<(&str, &str)> for DependencyEntry {
    fn from((alias, identifier): (&str, &str)) -> Self {
        DependencyEntry::aliased(alias, identifier)
    }
}

/// A resolved dependency.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DependencySpec {
    pub alias: Option<String>,
    pub id: ResourceId,
}

/// Either a plain list or a map from qualifier keys to lists, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirements {
    List(Vec<DependencyEntry>),
    Versioned(Vec<(String, Vec<DependencyEntry>)>),
}

impl Default for Requirements {
    fn default() -> Self {
        Requirements::List(Vec::new())
    }
}

/// Author-supplied module record.
pub struct ModuleDescriptor {
    pub required: Requirements,
    pub prerequisite: Vec<DependencyEntry>,
    /// Extra versioned requirements appended after `required`.
    pub version: Vec<(String, Vec<DependencyEntry>)>,
    pub definition: Definition,
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("required", &self.required)
            .field("prerequisite", &self.prerequisite)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl ModuleDescriptor {
    pub fn new<F>(definition: F) -> Self
    where
        F: FnOnce(&mut ModuleScope) -> anyhow::Result<()> + 'static,
    {
        Self {
            required: Requirements::default(),
            prerequisite: Vec::new(),
            version: Vec::new(),
            definition: Box::new(definition),
        }
    }

    /// A module whose body does nothing.
    pub fn empty() -> Self {
        Self::new(|_| Ok(()))
    }

    /// Append to the plain requirement list. On a versioned map the entry goes
    /// into an unconditional `*` group.
    pub fn require(mut self, entry: impl Into<DependencyEntry>) -> Self {
        let entry = entry.into();
        match &mut self.required {
            Requirements::List(entries) => entries.push(entry),
            Requirements::Versioned(groups) => match groups.iter_mut().find(|(key, _)| key == "*") {
                Some((_, entries)) => entries.push(entry),
                None => groups.push(("*".to_string(), vec![entry])),
            },
        }
        self
    }

    pub fn with_required(mut self, required: Requirements) -> Self {
        self.required = required;
        self
    }

    pub fn require_versioned<I, E>(mut self, qualifier: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<DependencyEntry>,
    {
        self.version.push((
            qualifier.to_string(),
            entries.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn prerequisite(mut self, entry: impl Into<DependencyEntry>) -> Self {
        self.prerequisite.push(entry.into());
        self
    }
}

/// Resolved output: load-request order plus the alias for each dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    pub resources: Vec<ResourceId>,
    pub imports: Vec<DependencySpec>,
}

impl Dependencies {
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }
}

/// Applies version qualification and path resolution to descriptor entries.
pub struct DependencyResolver<'a> {
    paths: &'a PathResolver,
    active: &'a ActiveConfiguration,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(paths: &'a PathResolver, active: &'a ActiveConfiguration) -> Self {
        Self { paths, active }
    }

    /// The module's `required` entries (both forms) followed by its `version` map.
    pub fn resolve_required(
        &self,
        descriptor: &ModuleDescriptor,
        context: &PathContext,
    ) -> Result<Dependencies, ConfigError> {
        let mut entries = self.effective(&descriptor.required)?;
        entries.extend(self.qualifying_groups(&descriptor.version)?);
        self.resolve(entries, context)
    }

    pub fn resolve_prerequisites(
        &self,
        descriptor: &ModuleDescriptor,
        context: &PathContext,
    ) -> Result<Dependencies, ConfigError> {
        self.resolve(descriptor.prerequisite.iter(), context)
    }

    /// Flatten a requirement set into the entries that apply to the active configuration.
    pub fn effective<'r>(&self, requirements: &'r Requirements) -> Result<Vec<&'r DependencyEntry>, ConfigError> {
        match requirements {
            Requirements::List(entries) => Ok(entries.iter().collect()),
            Requirements::Versioned(groups) => self.qualifying_groups(groups),
        }
    }

    fn qualifying_groups<'r>(
        &self,
        groups: &'r [(String, Vec<DependencyEntry>)],
    ) -> Result<Vec<&'r DependencyEntry>, ConfigError> {
        let mut entries = Vec::new();
        for (key, group) in groups {
            if self.active.accepts_key(key)? {
                entries.extend(group.iter());
            }
        }
        Ok(entries)
    }

    /// Qualify and resolve entries. Non-qualifying entries are dropped;
    /// `/`-prefixed identifiers resolve against the application base.
    pub fn resolve<'e, I>(&self, entries: I, context: &PathContext) -> Result<Dependencies, ConfigError>
    where
        I: IntoIterator<Item = &'e DependencyEntry>,
    {
        let mut resolved = Dependencies::default();
        for entry in entries {
            let Some(identifier) = self.active.qualify_identifier(entry.identifier())? else {
                continue;
            };
            let Some(id) = self.paths.resolve_dependency(identifier, context)? else {
                continue;
            };
            resolved.resources.push(id.clone());
            resolved.imports.push(DependencySpec {
                alias: entry.alias().filter(|alias| !alias.is_empty()).map(str::to_string),
                id,
            });
        }
        Ok(resolved)
    }
}


//=====================================================
// End of file
//=====================================================
