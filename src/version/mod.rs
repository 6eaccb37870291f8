//=====================================================
// File: version/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Version and platform qualifiers for conditional dependencies
// Objective: Parse `target:min-max` qualifiers, compare versions component-wise
//            and decide whether a dependency applies to the active runtime
//=====================================================

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Platform;
use crate::error::ConfigError;

static QUALIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(\*|[A-Za-z]+)\s*:)?\s*(\*|\d+(?:\.\d+){0,2})?\s*(?:-\s*(\*|\d+(?:\.\d+){0,2})?)?\s*$",
    )
    .expect("qualifier grammar is a valid regex")
});

/// One end of a version range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// `*`, compares equal to anything.
    Any,
    Exact([u64; 3]),
}

impl Bound {
    fn parse(text: &str) -> Option<Bound> {
        let text = text.trim();
        if text == "*" {
            return Some(Bound::Any);
        }
        let mut parts = [0u64; 3];
        for (slot, piece) in parts.iter_mut().zip(text.split('.')) {
            *slot = piece.parse().ok()?;
        }
        Some(Bound::Exact(parts))
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Any => f.write_str("*"),
            Bound::Exact([major, minor, patch]) => write!(f, "{major}.{minor}.{patch}"),
        }
    }
}

/// Compare two optional bounds. `*` on either side is `Equal`; a missing
/// bound makes the comparison undefined (`None`).
pub fn compare(a: Option<Bound>, b: Option<Bound>) -> Option<Ordering> {
    match (a?, b?) {
        (Bound::Any, _) | (_, Bound::Any) => Some(Ordering::Equal),
        (Bound::Exact(lhs), Bound::Exact(rhs)) => Some(lhs.cmp(&rhs)),
    }
}

/// Parsed `target:min-max` qualifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionQualifier {
    pub target: Option<String>,
    pub min: Option<Bound>,
    pub max: Option<Bound>,
}

impl VersionQualifier {
    /// Parse a qualifier. With `wildcard_if_missing` absent bounds become `*`,
    /// which is how the active configuration and versioned-map keys are read.
    pub fn parse(text: &str, wildcard_if_missing: bool) -> Result<Self, ConfigError> {
        let caps = QUALIFIER
            .captures(text)
            .ok_or_else(|| ConfigError::InvalidQualifier(text.to_string()))?;
        let target = caps.get(1).map(|m| m.as_str().to_string());
        let bound = |idx: usize| -> Result<Option<Bound>, ConfigError> {
            match caps.get(idx) {
                Some(m) => Bound::parse(m.as_str())
                    .map(Some)
                    .ok_or_else(|| ConfigError::InvalidQualifier(text.to_string())),
                None if wildcard_if_missing => Ok(Some(Bound::Any)),
                None => Ok(None),
            }
        };
        let min = bound(2)?;
        let mut max = bound(3)?;
        if max.is_none() && min == Some(Bound::Any) {
            max = Some(Bound::Any);
        }
        Ok(Self { target, min, max })
    }

    fn matches_target(&self, active: &str) -> bool {
        match self.target.as_deref() {
            None | Some("*") => true,
            Some(target) => target == active,
        }
    }
}

/// True when `candidate` applies to `active`: targets agree and the active
/// minimum version lies within `[candidate.min, candidate.max]`.
pub fn qualifies(candidate: &VersionQualifier, active: &VersionQualifier) -> bool {
    let active_target = active.target.as_deref().unwrap_or("*");
    if active_target != "*" && !candidate.matches_target(active_target) {
        return false;
    }
    let lower = compare(candidate.min, active.min);
    let upper = compare(candidate.max, active.min);
    matches!(lower, Some(Ordering::Less | Ordering::Equal))
        && matches!(upper, Some(Ordering::Greater | Ordering::Equal))
}

/// Platform and version the loader runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConfiguration {
    platform: Platform,
    version: Option<String>,
    qualifier: VersionQualifier,
}

impl ActiveConfiguration {
    /// A malformed version string is fatal. Without a version every
    /// versioned-map entry qualifies, but `|`-qualified identifiers do not.
    pub fn new(platform: Platform, version: Option<&str>) -> Result<Self, ConfigError> {
        let mut qualifier = match version {
            Some(text) => VersionQualifier::parse(text, true)
                .map_err(|_| ConfigError::InvalidVersion(text.to_string()))?,
            None => VersionQualifier {
                target: None,
                min: Some(Bound::Any),
                max: Some(Bound::Any),
            },
        };
        if qualifier.target.is_none() {
            qualifier.target = Some(platform.code().to_string());
        }
        Ok(Self {
            platform,
            version: version.map(str::to_string),
            qualifier,
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn qualifier(&self) -> &VersionQualifier {
        &self.qualifier
    }

    /// Strip and evaluate an `identifier|qualifier` suffix. Returns the bare
    /// identifier when it applies, `None` when it does not.
    pub fn qualify_identifier<'a>(&self, entry: &'a str) -> Result<Option<&'a str>, ConfigError> {
        let Some((identifier, qualifier)) = entry.split_once('|') else {
            return Ok(Some(entry));
        };
        if self.version.is_none() {
            return Ok(None);
        }
        let candidate = VersionQualifier::parse(qualifier, false)?;
        if qualifies(&candidate, &self.qualifier) {
            Ok(Some(identifier.trim()))
        } else {
            Ok(None)
        }
    }

    /// Evaluate a versioned-map key.
    pub fn accepts_key(&self, key: &str) -> Result<bool, ConfigError> {
        let candidate = VersionQualifier::parse(key, true)?;
        Ok(qualifies(&candidate, &self.qualifier))
    }
}
