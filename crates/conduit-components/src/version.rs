//! Version constraint parsing and checking.
//!
//! Constraints use the package manager's range syntax and are mapped
//! onto [`semver::VersionReq`]:
//!
//! - caret and wildcard ranges: `^1.0`, `1.0.*`, `*`
//! - tilde ranges with Composer semantics: `~1.2` means `>=1.2.0 <2.0.0`,
//!   `~1.2.3` means `>=1.2.3 <1.3.0`
//! - comparators joined by spaces or commas: `>=1.0 <2.0`, `>=1.0,<2.0`
//! - exclusions: `!=1.4.2`
//! - hyphen ranges: `1.0 - 2.0`
//! - alternatives: `^1.0 || ^2.0`
//!
//! A bare version (`1.2`) is an exact match on `1.2.0`.
//!
//! # Examples
//!
//! ```
//! use conduit_components::version::VersionConstraint;
//!
//! let constraint = VersionConstraint::parse("^1.0").unwrap();
//! assert!(constraint.satisfies("1.4.2"));
//! assert!(!constraint.satisfies("2.0.0"));
//!
//! let constraint = VersionConstraint::parse("~1.2 || ^3.0").unwrap();
//! assert!(constraint.satisfies("1.9.0"));
//! assert!(constraint.satisfies("v3.1.0"));
//! assert!(!constraint.satisfies("2.0.0"));
//! ```

use semver::{Version, VersionReq};

use crate::error::{Error, Result};

/// One `||`-separated branch of a constraint.
#[derive(Debug, Clone)]
struct Alternative {
    req: VersionReq,
    excluded: Vec<Version>,
}

impl Alternative {
    fn matches(&self, candidate: &Version) -> bool {
        self.req.matches(candidate) && !self.excluded.contains(candidate)
    }
}

/// A parsed version constraint that can be checked against concrete versions.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    alternatives: Vec<Alternative>,
    /// The original constraint string for display.
    raw: String,
}

impl VersionConstraint {
    /// Parse a version constraint string.
    pub fn parse(constraint: &str) -> Result<Self> {
        let raw = constraint.to_string();
        let fail = |reason: String| Error::VersionConstraint {
            constraint: raw.clone(),
            reason,
        };

        if constraint.trim().is_empty() {
            return Err(fail("empty constraint".to_string()));
        }

        let mut alternatives = Vec::new();
        for branch in constraint.replace("||", "|").split('|') {
            let branch = branch.trim();
            if branch.is_empty() {
                return Err(fail("empty alternative around '||'".to_string()));
            }
            alternatives.push(parse_alternative(branch).map_err(fail)?);
        }

        Ok(Self { alternatives, raw })
    }

    /// Check if a version string satisfies this constraint.
    ///
    /// Accepts `1`, `1.2`, `1.2.3` and a leading `v`. Returns `false` if
    /// the version string cannot be parsed.
    pub fn satisfies(&self, version: &str) -> bool {
        match normalize_version(version) {
            Ok(parsed) => self.satisfies_version(&parsed),
            Err(_) => false,
        }
    }

    /// Check if a `semver::Version` satisfies this constraint.
    pub fn satisfies_version(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(version))
    }

    /// Return the original constraint string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for VersionConstraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_alternative(branch: &str) -> std::result::Result<Alternative, String> {
    if let Some((low, high)) = branch.split_once(" - ") {
        let low = strip_v(low.trim());
        let high = strip_v(high.trim());
        let req = parse_req(&format!(">={low}, <={high}"))?;
        return Ok(Alternative {
            req,
            excluded: Vec::new(),
        });
    }

    let mut comparators = Vec::new();
    let mut excluded = Vec::new();
    for token in tokenize(branch) {
        if let Some(rest) = token.strip_prefix("!=") {
            let version = normalize_version(rest).map_err(|e| format!("invalid version: {e}"))?;
            excluded.push(version);
        } else {
            comparators.push(translate_comparator(&token)?);
        }
    }

    let req = if comparators.is_empty() {
        VersionReq::STAR
    } else {
        parse_req(&comparators.join(", "))?
    };
    Ok(Alternative { req, excluded })
}

/// Split on spaces and commas, gluing detached operators (`>= 1.0`) to
/// the version that follows them.
fn tokenize(branch: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for piece in branch
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
    {
        if is_bare_operator(piece) {
            pending_op = Some(piece);
            continue;
        }
        match pending_op.take() {
            Some(op) => tokens.push(format!("{op}{piece}")),
            None => tokens.push(piece.to_string()),
        }
    }
    if let Some(op) = pending_op {
        // Dangling operator; let the semver parser report it.
        tokens.push(op.to_string());
    }
    tokens
}

fn is_bare_operator(piece: &str) -> bool {
    matches!(piece, ">=" | "<=" | ">" | "<" | "=" | "==" | "!=" | "^" | "~")
}

fn translate_comparator(token: &str) -> std::result::Result<String, String> {
    if token == "*" {
        return Ok("*".to_string());
    }

    for op in [">=", "<=", ">", "<"] {
        if let Some(rest) = token.strip_prefix(op) {
            return Ok(format!("{op}{}", strip_v(rest)));
        }
    }

    if let Some(rest) = token.strip_prefix('^') {
        return Ok(format!("^{}", strip_v(rest)));
    }

    if let Some(rest) = token.strip_prefix('~') {
        return translate_tilde(strip_v(rest.trim_start_matches('>')));
    }

    let exact = token
        .strip_prefix("==")
        .or_else(|| token.strip_prefix('='))
        .unwrap_or(token);
    let exact = strip_v(exact);
    if is_wildcard(exact) {
        Ok(exact.to_string())
    } else {
        Ok(format!("={}", pad_version(exact)))
    }
}

/// `~M.m` allows any later minor within the major; longer forms behave
/// like the semver tilde.
fn translate_tilde(version: &str) -> std::result::Result<String, String> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() == 2 && !is_wildcard(version) {
        if let Ok(major) = parts[0].parse::<u64>() {
            let next = major
                .checked_add(1)
                .ok_or_else(|| format!("major version {major} has no upper bound"))?;
            return Ok(format!(">={}.{}.0, <{next}.0.0", parts[0], parts[1]));
        }
    }
    Ok(format!("~{version}"))
}

fn parse_req(req: &str) -> std::result::Result<VersionReq, String> {
    VersionReq::parse(req).map_err(|e| e.to_string())
}

fn is_wildcard(version: &str) -> bool {
    version
        .split('.')
        .any(|part| matches!(part, "*" | "x" | "X"))
}

fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}

/// Pad `1` and `1.2` to three numeric components.
fn pad_version(version: &str) -> String {
    let (core, suffix) = match version.find(['-', '+']) {
        Some(idx) => version.split_at(idx),
        None => (version, ""),
    };
    let missing = 3usize.saturating_sub(core.split('.').count());
    format!("{core}{}{suffix}", ".0".repeat(missing))
}

/// Parse a concrete version, tolerating a `v` prefix and a missing
/// minor or patch.
fn normalize_version(s: &str) -> std::result::Result<Version, String> {
    let s = strip_v(s.trim());
    if let Ok(v) = Version::parse(s) {
        return Ok(v);
    }
    Version::parse(&pad_version(s)).map_err(|e| format!("invalid version '{s}': {e}"))
}
