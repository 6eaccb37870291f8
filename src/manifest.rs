//=====================================================
// File: manifest.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: TOML application manifests
// Objective: Turn a manifest into loader configuration plus an in-memory
//            module graph for the splice CLI
//=====================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::config::LoaderConfig;
use crate::error::{ConfigError, Result};
use crate::fetch::{MemoryFetcher, ResourceFetcher};
use crate::handler_registry::HandlerRegistry;
use crate::modules::ModuleLoader;
use crate::namespace::Value;
use crate::path::PathResolver;
use crate::resolver::{DependencyEntry, ModuleDescriptor, Requirements};

fn default_handlers() -> Vec<String> {
    vec![".js".to_string()]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    app: LoaderConfig,
    #[serde(default = "default_handlers")]
    handlers: Vec<String>,
    #[serde(default)]
    modules: BTreeMap<String, RawModule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawModule {
    required: RawRequired,
    prerequisite: Vec<RawEntry>,
    version: toml::Table,
    exports: BTreeMap<String, serde_json::Value>,
    loads: Vec<String>,
    fail: Option<String>,
    delay_ms: Option<u64>,
    asset: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRequired {
    List(Vec<RawEntry>),
    Versioned(toml::Table),
}

impl Default for RawRequired {
    fn default() -> Self {
        RawRequired::List(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Bare(String),
    Aliased(BTreeMap<String, String>),
}

impl RawEntry {
    fn into_entry(self, module: &str) -> Result<DependencyEntry, ConfigError> {
        match self {
            RawEntry::Bare(identifier) => Ok(DependencyEntry::Bare(identifier)),
            RawEntry::Aliased(map) => {
                let mut pairs = map.into_iter();
                match (pairs.next(), pairs.next()) {
                    (Some((alias, identifier)), None) => Ok(DependencyEntry::aliased(alias, identifier)),
                    _ => Err(ConfigError::Manifest(format!(
                        "module '{module}': aliased dependency must have exactly one alias"
                    ))),
                }
            }
        }
    }
}

fn entries(raw: Vec<RawEntry>, module: &str) -> Result<Vec<DependencyEntry>, ConfigError> {
    raw.into_iter().map(|entry| entry.into_entry(module)).collect()
}

/// Versioned groups in the order the manifest declares them.
fn groups(raw: toml::Table, module: &str) -> Result<Vec<(String, Vec<DependencyEntry>)>, ConfigError> {
    raw.into_iter()
        .map(|(key, group)| {
            let group = group.try_into::<Vec<RawEntry>>().map_err(|err| {
                ConfigError::Manifest(format!("module '{module}': versioned group '{key}': {err}"))
            })?;
            Ok((key, entries(group, module)?))
        })
        .collect()
}

/// One module as declared in a manifest.
#[derive(Debug, Clone, Default)]
pub struct ModuleSpec {
    pub required: Requirements,
    pub prerequisite: Vec<DependencyEntry>,
    pub version: Vec<(String, Vec<DependencyEntry>)>,
    pub exports: Vec<(String, serde_json::Value)>,
    /// Loads the body requests when it runs.
    pub loads: Vec<String>,
    /// When set, the body fails with this message.
    pub fail: Option<String>,
    pub delay: Option<Duration>,
    /// Served as a plain asset instead of a module.
    pub asset: bool,
}

impl ModuleSpec {
    fn from_raw(raw: RawModule, module: &str) -> Result<Self, ConfigError> {
        let required = match raw.required {
            RawRequired::List(list) => Requirements::List(entries(list, module)?),
            RawRequired::Versioned(map) => Requirements::Versioned(groups(map, module)?),
        };
        Ok(Self {
            required,
            prerequisite: entries(raw.prerequisite, module)?,
            version: groups(raw.version, module)?,
            exports: raw.exports.into_iter().collect(),
            loads: raw.loads,
            fail: raw.fail,
            delay: raw.delay_ms.map(Duration::from_millis),
            asset: raw.asset,
        })
    }

    /// A fresh descriptor whose body exports the declared values.
    pub fn descriptor(&self) -> ModuleDescriptor {
        let exports = self.exports.clone();
        let loads = self.loads.clone();
        let fail = self.fail.clone();
        let mut descriptor = ModuleDescriptor::new(move |scope| {
            if let Some(reason) = fail {
                anyhow::bail!("{reason}");
            }
            for (name, value) in exports {
                scope.export(&name, Value::from(value))?;
            }
            if !loads.is_empty() {
                scope.load(loads);
            }
            debug!(module = %scope.uri(), "manifest module executed");
            Ok(())
        })
        .with_required(self.required.clone());
        descriptor.prerequisite = self.prerequisite.clone();
        descriptor.version = self.version.clone();
        descriptor
    }
}

/// Parsed manifest. Module keys resolve against `app.app_base`.
///
/// ```toml
/// handlers = [".js"]
///
/// [app]
/// app_base = "/app/"
/// main = "main.js"
/// version = "WEB:2.1.0"
///
/// [modules."main.js"]
/// required = ["lib/util.js", { ui = "ui/widgets.js" }]
/// exports = { title = "demo" }
/// ```
#[derive(Debug, Clone)]
pub struct Manifest {
    pub config: LoaderConfig,
    /// Extensions served by the manifest's fetcher.
    pub handlers: Vec<String>,
    /// Module keys as written; resolved against the application base.
    pub modules: Vec<(String, ModuleSpec)>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw: RawManifest = toml::from_str(text).map_err(|err| ConfigError::Manifest(err.to_string()))?;
        raw.app.validate()?;
        let modules = raw
            .modules
            .into_iter()
            .map(|(key, module)| {
                let spec = ModuleSpec::from_raw(module, &key)?;
                Ok((key, spec))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            config: raw.app,
            handlers: raw.handlers,
            modules,
        })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("parsing manifest {}", path.display()))
    }

    /// Serve every declared module from memory.
    pub fn fetcher(&self, paths: &PathResolver) -> Result<MemoryFetcher, ConfigError> {
        let fetcher = MemoryFetcher::new();
        for (key, spec) in &self.modules {
            let Some(id) = paths.resolve_from_app(key)? else {
                return Err(ConfigError::Manifest("empty module identifier".to_string()));
            };
            if spec.asset {
                fetcher.asset(id.clone());
            } else {
                let spec = spec.clone();
                fetcher.module(id.clone(), move || spec.descriptor());
            }
            if let Some(delay) = spec.delay {
                fetcher.set_delay(&id, delay);
            }
        }
        Ok(fetcher)
    }

    /// Loader plus the fetcher backing it.
    pub fn loader(&self) -> Result<(ModuleLoader, MemoryFetcher)> {
        let mut paths = PathResolver::new(self.config.platform, &self.config.app_base)?;
        if let Some(home) = self.config.home.as_deref() {
            paths.set_home(home);
        }
        let fetcher = self.fetcher(&paths)?;
        let shared: Rc<dyn ResourceFetcher> = Rc::new(fetcher.clone());
        let mut handlers = HandlerRegistry::new();
        for extension in &self.handlers {
            handlers.register(extension, shared.clone());
        }
        let loader = ModuleLoader::new(self.config.clone(), handlers)?;
        Ok((loader, fetcher))
    }
}
