//=====================================================
// File: config.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Loader configuration
// Objective: Platform selection, application locations and start-up
//            options, loaded from TOML
//=====================================================

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::version::ActiveConfiguration;

/// Runtime platform; decides the path separator and the absoluteness test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    #[serde(rename = "WEB")]
    Web,
    #[serde(rename = "UNX")]
    Unix,
    #[serde(rename = "WIN")]
    Windows,
}

impl Platform {
    pub fn separator(self) -> char {
        match self {
            Platform::Web | Platform::Unix => '/',
            Platform::Windows => '\\',
        }
    }

    /// The separator that gets rewritten into [`Platform::separator`].
    pub fn foreign_separator(self) -> char {
        match self {
            Platform::Web | Platform::Unix => '\\',
            Platform::Windows => '/',
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Platform::Web => "WEB",
            Platform::Unix => "UNX",
            Platform::Windows => "WIN",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WEB" => Ok(Platform::Web),
            "UNX" | "UNIX" => Ok(Platform::Unix),
            "WIN" | "WINDOWS" => Ok(Platform::Windows),
            other => Err(ConfigError::UnknownPlatform(other.to_string())),
        }
    }
}

/// When the application entry point is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    /// Start once the host signals it finished loading.
    Onload,
    /// Start immediately after configuration.
    Node,
    /// Start only when the embedder calls `start`.
    #[default]
    Manual,
}

/// Application configuration for a loader instance.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub platform: Platform,
    /// Application base context; must end with the platform separator.
    pub app_base: String,
    /// Framework home, exposed as the reserved `{sjshome}` path variable.
    pub home: Option<String>,
    /// Main module, resolved against the application base.
    pub main: Option<String>,
    /// Resource loaded before the main module.
    pub splash: Option<String>,
    /// Active version, `[target:]min[-max]`.
    pub version: Option<String>,
    pub mode: StartMode,
    pub debug: bool,
    /// Fetches that do not complete in time are marked failed. `None` waits forever.
    pub fetch_timeout_ms: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Web,
            app_base: "/".to_string(),
            home: None,
            main: None,
            splash: None,
            version: None,
            mode: StartMode::Manual,
            debug: false,
            fetch_timeout_ms: None,
        }
    }
}

impl LoaderConfig {
    pub fn with_base(platform: Platform, app_base: impl Into<String>) -> Self {
        Self {
            platform,
            app_base: app_base.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_main(mut self, main: impl Into<String>) -> Self {
        self.main = Some(main.into());
        self
    }

    /// Check the invariants that would otherwise fail late during resolution.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let separator = self.platform.separator();
        if !self.app_base.is_empty() && !self.app_base.ends_with(separator) {
            return Err(ConfigError::ContextSeparator {
                path: self.app_base.clone(),
                separator,
            });
        }
        self.active()?;
        Ok(())
    }

    /// The runtime configuration dependencies are qualified against.
    pub fn active(&self) -> Result<ActiveConfiguration, ConfigError> {
        ActiveConfiguration::new(self.platform, self.version.as_deref())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        let cfg: Self = toml::from_str(&data)
            .with_context(|| format!("parsing configuration {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("validating configuration {}", path.display()))?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_platform_codes() {
        assert_eq!("web".parse::<Platform>(), Ok(Platform::Web));
        assert_eq!("UNX".parse::<Platform>(), Ok(Platform::Unix));
        assert_eq!("win".parse::<Platform>(), Ok(Platform::Windows));
        assert!("beos".parse::<Platform>().is_err());
    }

    #[test]
    fn base_without_separator_is_rejected() {
        let cfg = LoaderConfig::with_base(Platform::Unix, "/srv/app");
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ContextSeparator { separator: '/', .. })
        ));
    }

    #[test]
    fn malformed_version_is_rejected() {
        let cfg = LoaderConfig::with_base(Platform::Web, "/app/").with_version("two.one");
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidVersion(_))));
    }

    #[test]
    fn loads_toml_with_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("loader.toml");
        fs::write(
            &path,
            "platform = \"UNX\"\napp_base = \"/srv/app/\"\nmain = \"main.js\"\nfetch_timeout_ms = 250\n",
        )
        .expect("write config");
        let cfg = LoaderConfig::load(&path).expect("load config");
        assert_eq!(cfg.platform, Platform::Unix);
        assert_eq!(cfg.main.as_deref(), Some("main.js"));
        assert_eq!(cfg.fetch_timeout_ms, Some(250));
        assert_eq!(cfg.mode, StartMode::Manual);
        assert!(!cfg.debug);
    }
}
