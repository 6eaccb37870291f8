//=====================================================
// File: path/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Resource identifier resolution
// Objective: Substitute path variables, resolve relative identifiers against a
//            base context and collapse the result into a ResourceId
//=====================================================

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Platform;
use crate::error::ConfigError;
use crate::symbol::ResourceId;

/// Name of the framework-home variable; only the loader itself may set it.
pub const RESERVED_VARIABLE: &str = "sjshome";

const MAX_SUBSTITUTION_DEPTH: usize = 16;

static VARIABLE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("variable token regex"));
static WINDOWS_ABSOLUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]:\\").expect("windows absolute regex"));
static WEB_ABSOLUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+://").expect("web absolute regex"));

/// A base location identifiers are resolved against. Always empty or
/// terminated by the platform separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathContext {
    path: String,
}

impl PathContext {
    pub fn new(path: impl Into<String>, platform: Platform) -> Result<Self, ConfigError> {
        let path = path.into();
        let separator = platform.separator();
        if !path.is_empty() && !path.ends_with(separator) {
            return Err(ConfigError::ContextSeparator { path, separator });
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Owns the platform rules, the path-variable table and the application base.
#[derive(Debug, Clone)]
pub struct PathResolver {
    platform: Platform,
    variables: BTreeMap<String, String>,
    app: PathContext,
}

impl PathResolver {
    pub fn new(platform: Platform, app_base: &str) -> Result<Self, ConfigError> {
        let app_base = app_base.replace(platform.foreign_separator(), &platform.separator().to_string());
        Ok(Self {
            platform,
            variables: BTreeMap::new(),
            app: PathContext::new(app_base, platform)?,
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn app_context(&self) -> &PathContext {
        &self.app
    }

    /// Context for a resource: everything up to and including its last
    /// separator, falling back to the application base.
    pub fn context(&self, url: &str) -> PathContext {
        let separator = self.platform.separator();
        let normalised = self.normalise(url);
        let path = normalised
            .rfind(separator)
            .map(|idx| normalised[..=idx].to_string())
            .unwrap_or_default();
        let path = if path.is_empty() {
            self.app.path.clone()
        } else {
            path
        };
        PathContext { path }
    }

    pub fn is_absolute(&self, url: &str) -> bool {
        match self.platform {
            Platform::Unix => url.starts_with('/'),
            Platform::Windows => WINDOWS_ABSOLUTE.is_match(url),
            Platform::Web => WEB_ABSOLUTE.is_match(url),
        }
    }

    /// Resolve `identifier` against `context`. Empty identifiers resolve to nothing.
    pub fn resolve(&self, identifier: &str, context: &PathContext) -> Result<Option<ResourceId>, ConfigError> {
        if identifier.is_empty() {
            return Ok(None);
        }
        let url = self.substitute(&self.normalise(identifier), 0)?;
        let joined = if self.is_absolute(&url) {
            url
        } else {
            format!("{}{}", context.path, url)
        };
        Ok(Some(ResourceId::from(self.collapse(&joined))))
    }

    /// Resolve against the application base.
    pub fn resolve_from_app(&self, identifier: &str) -> Result<Option<ResourceId>, ConfigError> {
        self.resolve(identifier, &self.app)
    }

    /// Resolve an identifier named by a module: `/`-prefixed identifiers
    /// are rooted at the application base, everything else at `context`.
    pub fn resolve_dependency(&self, identifier: &str, context: &PathContext) -> Result<Option<ResourceId>, ConfigError> {
        match identifier.strip_prefix('/') {
            Some(from_root) => self.resolve_from_app(from_root),
            None => self.resolve(identifier, context),
        }
    }

    /// Collapse `.`/`..` segments and repeated separators, keeping scheme
    /// separators such as `http://` and `file:///`.
    pub fn collapse(&self, path: &str) -> String {
        let separator = self.platform.separator();
        let mut stack: Vec<&str> = Vec::new();
        for part in path.split(separator) {
            match part {
                "" | "." => continue,
                ".." if stack.last().is_some_and(|last| *last != "..") => {
                    stack.pop();
                }
                other => stack.push(other),
            }
        }

        let mut collapsed = String::with_capacity(path.len());
        if path.starts_with(separator) {
            collapsed.push(separator);
        }
        let mut joiner = String::new();
        for (idx, part) in stack.iter().enumerate() {
            collapsed.push_str(&joiner);
            collapsed.push_str(part);
            joiner = if idx == 0 && is_scheme(part) {
                if part.eq_ignore_ascii_case("file:") {
                    "///".to_string()
                } else {
                    "//".to_string()
                }
            } else {
                separator.to_string()
            };
        }
        collapsed
    }

    /// Set a path variable and return a snapshot of the table. An empty name
    /// or value leaves the table unchanged.
    pub fn set_path_variable(&mut self, name: &str, value: &str) -> Result<BTreeMap<String, String>, ConfigError> {
        let name = strip_braces(name);
        if name == RESERVED_VARIABLE {
            return Err(ConfigError::ReservedVariable(name.to_string()));
        }
        if !name.is_empty() && !value.is_empty() {
            self.variables.insert(name.to_string(), value.to_string());
        }
        Ok(self.path_variables())
    }

    pub fn path_variables(&self) -> BTreeMap<String, String> {
        self.variables.clone()
    }

    pub(crate) fn set_home(&mut self, home: &str) {
        self.variables
            .insert(RESERVED_VARIABLE.to_string(), home.to_string());
    }

    fn normalise(&self, url: &str) -> String {
        url.replace(self.platform.foreign_separator(), &self.platform.separator().to_string())
    }

    fn substitute(&self, url: &str, depth: usize) -> Result<String, ConfigError> {
        if !VARIABLE_TOKEN.is_match(url) {
            return Ok(url.to_string());
        }
        if depth >= MAX_SUBSTITUTION_DEPTH {
            return Err(ConfigError::PathVariableCycle(url.to_string()));
        }
        let separator = self.platform.separator();
        let mut result = String::with_capacity(url.len());
        let mut cursor = 0;
        for caps in VARIABLE_TOKEN.captures_iter(url) {
            let Some(token) = caps.get(0) else {
                continue;
            };
            push_segment(&mut result, &url[cursor..token.start()], separator);
            let replacement = match self.variables.get(&caps[1]) {
                Some(value) => self.substitute(&self.normalise(value), depth + 1)?,
                None => token.as_str().to_string(),
            };
            push_segment(&mut result, &replacement, separator);
            cursor = token.end();
        }
        push_segment(&mut result, &url[cursor..], separator);
        Ok(result)
    }
}

fn push_segment(result: &mut String, segment: &str, separator: char) {
    if result.ends_with(separator) && segment.starts_with(separator) {
        result.pop();
    }
    result.push_str(segment);
}

fn strip_braces(name: &str) -> &str {
    name.trim()
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .unwrap_or(name.trim())
}

fn is_scheme(part: &str) -> bool {
    part.len() > 2
        && part.ends_with(':')
        && part[..part.len() - 1].chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web(base: &str) -> PathResolver {
        PathResolver::new(Platform::Web, base).expect("valid base")
    }

    #[test]
    fn resolves_relative_segments_against_context() {
        let paths = web("/app/");
        let id = paths.resolve_from_app("a/../b/c.js").unwrap().unwrap();
        assert_eq!(id.as_str(), "/app/b/c.js");
        let id = paths.resolve_from_app("./x/./y.js").unwrap().unwrap();
        assert_eq!(id.as_str(), "/app/x/y.js");
    }

    #[test]
    fn keeps_scheme_separators() {
        let paths = web("http://host/app/");
        let id = paths.resolve_from_app("../lib//x.js").unwrap().unwrap();
        assert_eq!(id.as_str(), "http://host/lib/x.js");
        assert_eq!(paths.collapse("file:///tmp/a/../b.js"), "file:///tmp/b.js");
    }

    #[test]
    fn absolute_identifiers_ignore_context() {
        let paths = web("/app/");
        let ctx = paths.context("http://cdn/lib/core.js");
        let id = paths
            .resolve("https://other/x/../y.js", &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(id.as_str(), "https://other/y.js");
    }

    #[test]
    fn rooted_dependencies_ignore_module_context() {
        let paths = web("/app/");
        let ctx = paths.context("/app/sub/main.js");
        let id = paths.resolve_dependency("/lib/x.js", &ctx).unwrap().unwrap();
        assert_eq!(id.as_str(), "/app/lib/x.js");
        let id = paths.resolve_dependency("lib/x.js", &ctx).unwrap().unwrap();
        assert_eq!(id.as_str(), "/app/sub/lib/x.js");
    }

    #[test]
    fn platform_absoluteness() {
        let unix = PathResolver::new(Platform::Unix, "/srv/").unwrap();
        assert!(unix.is_absolute("/etc/app.js"));
        assert!(!unix.is_absolute("etc/app.js"));
        let win = PathResolver::new(Platform::Windows, "C:\\app\\").unwrap();
        assert!(win.is_absolute("D:\\lib\\x.js"));
        assert!(!win.is_absolute("lib\\x.js"));
        let id = win.resolve_from_app("lib/../mod/x.js").unwrap().unwrap();
        assert_eq!(id.as_str(), "C:\\app\\mod\\x.js");
    }

    #[test]
    fn context_strips_leaf_and_falls_back_to_app() {
        let paths = web("/app/");
        assert_eq!(paths.context("/app/lib/x.js").path(), "/app/lib/");
        assert_eq!(paths.context("x.js").path(), "/app/");
        assert_eq!(paths.context("\\mods\\y.js").path(), "/mods/");
    }

    #[test]
    fn context_must_end_in_separator() {
        assert!(matches!(
            PathContext::new("/app", Platform::Unix),
            Err(ConfigError::ContextSeparator { .. })
        ));
        assert!(PathContext::new("", Platform::Unix).is_ok());
        assert!(PathResolver::new(Platform::Web, "/app").is_err());
    }

    #[test]
    fn substitutes_variables_recursively() {
        let mut paths = web("/app/");
        paths.set_home("http://cdn/sjs/");
        paths.set_path_variable("widgets", "{sjshome}/modules/").unwrap();
        let id = paths.resolve_from_app("{widgets}/grid.js").unwrap().unwrap();
        assert_eq!(id.as_str(), "http://cdn/sjs/modules/grid.js");
        paths.set_path_variable("{local}", "lib/").unwrap();
        let id = paths.resolve_from_app("{local}x.js").unwrap().unwrap();
        assert_eq!(id.as_str(), "/app/lib/x.js");
        let id = paths.resolve_from_app("{unknown}/x.js").unwrap().unwrap();
        assert_eq!(id.as_str(), "/app/{unknown}/x.js");
    }

    #[test]
    fn self_referencing_variable_is_reported() {
        let mut paths = web("/app/");
        paths.set_path_variable("loop", "{loop}/x").unwrap();
        assert!(matches!(
            paths.resolve_from_app("{loop}.js"),
            Err(ConfigError::PathVariableCycle(_))
        ));
    }

    #[test]
    fn reserved_variable_cannot_be_set() {
        let mut paths = web("/app/");
        assert!(matches!(
            paths.set_path_variable("sjshome", "/elsewhere/"),
            Err(ConfigError::ReservedVariable(_))
        ));
        assert!(matches!(
            paths.set_path_variable("{sjshome}", "/elsewhere/"),
            Err(ConfigError::ReservedVariable(_))
        ));
        let snapshot = paths.set_path_variable("", "").unwrap();
        assert!(snapshot.is_empty());
    }
}
