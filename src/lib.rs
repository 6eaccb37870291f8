//=====================================================
// File: lib.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: splice_loader library root
// Objective: Dependency-aware asynchronous module loading: path resolution,
//            version qualification, namespaces, and bottom-up execution
//=====================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod handler_registry;
pub mod manifest;
pub mod modules;
pub mod namespace;
pub mod path;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod symbol;
pub mod version;

pub use config::{LoaderConfig, Platform, StartMode};
pub use error::{ConfigError, CycleError, FetchError, LoaderError, NamespaceError, Result};
pub use fetch::{LoadedResource, MemoryFetcher, ResourceFetcher};
pub use handler_registry::HandlerRegistry;
pub use modules::{BatchContext, LoadReport, ModuleLoader};
pub use namespace::{Function, Namespace, Value};
pub use resolver::{DependencyEntry, ModuleDescriptor, Requirements};
pub use scope::ModuleScope;
pub use symbol::ResourceId;
