//! Package identifier and component name validation.
//!
//! A [`PackageId`] is the only untrusted string that reaches the package
//! manager's argument vector, so its grammar is deliberately narrow:
//! `vendor/name`, ASCII letters, digits, `-`, `_` and `.`, exactly one
//! `/`, and every segment starts and ends with a letter or digit. That
//! rules out shell metacharacters, option injection (`-x`), absolute
//! paths and `..` traversal before any process is spawned.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum accepted length of a package identifier.
pub const MAX_PACKAGE_ID_LEN: usize = 128;

/// Maximum accepted length of a component name.
pub const MAX_COMPONENT_NAME_LEN: usize = 64;

static PACKAGE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?/[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?$")
        .expect("package id pattern is valid")
});

/// A validated `vendor/name` package identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId(String);

impl PackageId {
    /// Validate `id` against the package identifier grammar.
    pub fn parse(id: &str) -> Result<Self> {
        let reject = |reason: &str| Error::InvalidPackageIdentifier {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        if id.is_empty() {
            return Err(reject("identifier must not be empty"));
        }
        if id.len() > MAX_PACKAGE_ID_LEN {
            return Err(reject(&format!(
                "identifier exceeds {MAX_PACKAGE_ID_LEN} characters"
            )));
        }
        if id.starts_with('-') {
            return Err(reject("identifier must not start with '-'"));
        }
        if id.starts_with('/') || id.starts_with('\\') || id.contains(':') {
            return Err(reject("absolute paths are not allowed"));
        }
        if id.contains("..") {
            return Err(reject("path traversal sequences are not allowed"));
        }
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')))
        {
            return Err(reject(&format!("disallowed character {bad:?}")));
        }
        if id.matches('/').count() != 1 {
            return Err(reject("expected exactly one '/' separating vendor and name"));
        }
        if !PACKAGE_ID_RE.is_match(id) {
            return Err(reject(
                "vendor and name must start and end with a letter or digit",
            ));
        }

        Ok(Self(id.to_string()))
    }

    /// The identifier as passed to the package manager.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the `/`.
    pub fn vendor(&self) -> &str {
        self.split().0
    }

    /// The part after the `/`.
    pub fn name(&self) -> &str {
        self.split().1
    }

    fn split(&self) -> (&str, &str) {
        // Validated to contain exactly one '/'.
        self.0.split_once('/').unwrap_or((&self.0, ""))
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PackageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackageId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.0
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate a component name (the registry key, e.g. `github`).
pub fn validate_component_name(name: &str) -> Result<()> {
    let reject = |reason: &str| Error::InvalidComponentName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(reject("component name must not be empty"));
    }
    if name.len() > MAX_COMPONENT_NAME_LEN {
        return Err(reject(&format!(
            "component name exceeds {MAX_COMPONENT_NAME_LEN} characters"
        )));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(reject("component name must start with a letter or digit"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(reject(
            "component name must contain only alphanumeric characters, hyphens, or underscores",
        ));
    }
    Ok(())
}
