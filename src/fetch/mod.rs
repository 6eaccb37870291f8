//=====================================================
// File: fetch/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Boundary to the platform resource fetch mechanism
// Objective: Define the fetch collaborator contract and an in-memory
//            implementation used by the manifest runner and tests
//=====================================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use futures::future::{FutureExt, LocalBoxFuture};

use crate::error::FetchError;
use crate::resolver::ModuleDescriptor;
use crate::symbol::ResourceId;

/// What a completed fetch yields.
#[derive(Debug)]
pub enum LoadedResource {
    /// The resource declared a module descriptor when it was evaluated.
    Module(ModuleDescriptor),
    /// Plain asset (style, image, data).
    Asset,
}

/// Performs the platform-specific retrieval of a resource. The returned
/// future resolves exactly once.
pub trait ResourceFetcher {
    fn fetch(&self, id: &ResourceId) -> LocalBoxFuture<'static, Result<LoadedResource, FetchError>>;
}

type Factory = Box<dyn Fn() -> LoadedResource>;

struct Entry {
    factory: Factory,
    delay: Option<Duration>,
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<ResourceId, Entry>,
    fetches: HashMap<ResourceId, usize>,
    order: Vec<ResourceId>,
}

/// Serves registered resources from memory, optionally after a delay, and
/// counts how often each identifier was fetched.
#[derive(Clone, Default)]
pub struct MemoryFetcher {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a module. The factory runs on every fetch, so each fetch gets a
    /// fresh descriptor.
    pub fn module<F>(&self, id: impl Into<ResourceId>, factory: F) -> &Self
    where
        F: Fn() -> ModuleDescriptor + 'static,
    {
        self.insert(id.into(), Box::new(move || LoadedResource::Module(factory())), None);
        self
    }

    pub fn delayed_module<F>(&self, id: impl Into<ResourceId>, delay: Duration, factory: F) -> &Self
    where
        F: Fn() -> ModuleDescriptor + 'static,
    {
        self.insert(
            id.into(),
            Box::new(move || LoadedResource::Module(factory())),
            Some(delay),
        );
        self
    }

    pub fn asset(&self, id: impl Into<ResourceId>) -> &Self {
        self.insert(id.into(), Box::new(|| LoadedResource::Asset), None);
        self
    }

    pub fn set_delay(&self, id: &str, delay: Duration) {
        if let Some(entry) = self.state.borrow_mut().entries.get_mut(id) {
            entry.delay = Some(delay);
        }
    }

    fn insert(&self, id: ResourceId, factory: Factory, delay: Option<Duration>) {
        self.state
            .borrow_mut()
            .entries
            .insert(id, Entry { factory, delay });
    }

    pub fn fetch_count(&self, id: &str) -> usize {
        self.state.borrow().fetches.get(id).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.state.borrow().fetches.values().sum()
    }

    /// Identifiers in the order their fetches were issued.
    pub fn fetch_order(&self) -> Vec<ResourceId> {
        self.state.borrow().order.clone()
    }
}

impl ResourceFetcher for MemoryFetcher {
    fn fetch(&self, id: &ResourceId) -> LocalBoxFuture<'static, Result<LoadedResource, FetchError>> {
        let mut state = self.state.borrow_mut();
        *state.fetches.entry(id.clone()).or_insert(0) += 1;
        state.order.push(id.clone());
        let prepared = state
            .entries
            .get(id)
            .map(|entry| ((entry.factory)(), entry.delay));
        let id = id.clone();
        async move {
            let Some((resource, delay)) = prepared else {
                return Err(FetchError::NotFound(id));
            };
            match delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }
            Ok(resource)
        }
        .boxed_local()
    }
}
