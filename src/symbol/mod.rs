//==================================================
// File: symbol.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Resource identifier newtype
// Objective: Provide ResourceId, the absolute collapsed registry key
//==================================================

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Absolute, collapsed address of a loadable unit. Produced by
/// [`crate::path::PathResolver::resolve`] and used as the registry key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// File extension including the leading dot, used to pick a fetch handler.
    pub fn extension(&self) -> Option<&str> {
        let leaf_start = self
            .0
            .rfind(['/', '\\'])
            .map(|idx| idx + 1)
            .unwrap_or(0);
        let leaf = &self.0[leaf_start..];
        leaf.rfind('.').map(|idx| &leaf[idx..])
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        ResourceId(value)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        ResourceId(value.to_string())
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl Deref for ResourceId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ResourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}


//==================================================
// End of file
//==================================================
