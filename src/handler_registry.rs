//==================================================
// File: handler_registry.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Track which fetcher handles which resource type
// Objective: Map file extensions to fetch collaborators; resources with no
//            handler are registered as assets without being fetched
//==================================================

use std::collections::HashMap;
use std::rc::Rc;

use crate::fetch::ResourceFetcher;
use crate::symbol::ResourceId;

//==================================================
// Section 1.0 - Registry Types
//==================================================
// @ZNOTE[Loader]: First registration for an extension wins; later ones are ignored.

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Rc<dyn ResourceFetcher>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with one fetcher for `.js` resources.
    pub fn with_script_handler(fetcher: Rc<dyn ResourceFetcher>) -> Self {
        let mut registry = Self::new();
        registry.register(".js", fetcher);
        registry
    }

    /// Returns `false` when the extension already has a handler.
    pub fn register(&mut self, extension: &str, fetcher: Rc<dyn ResourceFetcher>) -> bool {
        let key = normalise_extension(extension);
        if self.handlers.contains_key(&key) {
            return false;
        }
        self.handlers.insert(key, fetcher);
        true
    }

    pub fn resolve(&self, id: &ResourceId) -> Option<Rc<dyn ResourceFetcher>> {
        let extension = normalise_extension(id.extension()?);
        self.handlers.get(&extension).cloned()
    }

    pub fn extensions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

fn normalise_extension(extension: &str) -> String {
    let lower = extension.trim().to_ascii_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}


//==================================================
// End of file
//==================================================
