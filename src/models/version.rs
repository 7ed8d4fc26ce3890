//! Version parsing, ordering and pattern matching.
//!
//! Versions follow semver. Patterns accept a bare version (exact match),
//! `*` or an empty string (anything), and every requirement syntax the
//! `semver` crate understands: `^1.2`, `~1.2.3`, `>=1.0, <2.0`, `1.x`.

use crate::RepoError;
use semver::{Version, VersionReq};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Parses a version string, tolerating a leading `v`.
pub fn parse_version(input: &str) -> Result<Version, RepoError> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).map_err(|_| RepoError::MalformedVersion(input.to_string()))
}

/// Total order over version strings.
///
/// Parseable versions compare by semver precedence, so a pre-release sorts
/// below its release and build metadata breaks remaining ties. Strings that
/// do not parse sort below every valid version and compare lexically among
/// themselves. Equal precedence with different spellings (`1.0.0`, `v1.0.0`)
/// falls back to the raw string.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Ok(_)) => Ordering::Less,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Returns true when `version` equals `pattern` verbatim or satisfies it.
///
/// Unparseable inputs never satisfy anything except their own spelling.
pub fn satisfies(version: &str, pattern: &str) -> bool {
    if version == pattern {
        return true;
    }

    let Ok(pattern) = pattern.parse::<VersionPattern>() else {
        return false;
    };

    parse_version(version)
        .map(|v| pattern.matches(&v))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionPattern {
    Any,
    Exact(Version),
    Range(VersionReq),
}

impl VersionPattern {
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(exact) => exact == version,
            Self::Range(req) => req.matches(version),
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

impl FromStr for VersionPattern {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::Any);
        }

        if let Ok(version) = parse_version(trimmed) {
            return Ok(Self::Exact(version));
        }

        VersionReq::parse(trimmed)
            .map(Self::Range)
            .map_err(|_| RepoError::MalformedPattern(s.to_string()))
    }
}

impl fmt::Display for VersionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(version) => write!(f, "{}", version),
            Self::Range(req) => write!(f, "{}", req),
        }
    }
}
