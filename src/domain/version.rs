//! Versions of wrapped tools and requested Kubernetes releases.

use std::fmt;

use crate::error::{Error, Result};

/// A `major.minor.patch` version, ordered numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ToolVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a single version token such as `v0.20.0`, `1.27` or `v1.27.3-k3s1`.
    pub fn parse(token: &str) -> Option<Self> {
        let core = token.trim().trim_start_matches('v');
        let core = core.split(['-', '+']).next()?;
        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }

    /// Find the first version-looking token in a tool's `version` output.
    ///
    /// Tokens glued to a prefix (`go1.21.1`) are skipped.
    pub fn find_in(output: &str) -> Option<Self> {
        output
            .split_whitespace()
            .filter(|t| t.starts_with('v') || t.starts_with(|c: char| c.is_ascii_digit()))
            .find_map(Self::parse)
    }

    /// Parse a requested Kubernetes version, reporting a validation error.
    pub fn parse_kubernetes(version: &str) -> Result<Self> {
        Self::parse(version).ok_or_else(|| {
            Error::Validation(format!(
                "invalid kubernetesVersion {version:?}: expected something like v1.27.3"
            ))
        })
    }

    /// `major.minor` key used by the node image tables.
    pub fn minor_key(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    pub fn same_minor(&self, other: &ToolVersion) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_version_in_tool_output() {
        assert_eq!(
            ToolVersion::find_in("kind v0.20.0 go1.20.4 linux/amd64"),
            Some(ToolVersion::new(0, 20, 0))
        );
        assert_eq!(
            ToolVersion::find_in("k3d version v5.4.6\nk3s version v1.24.4-k3s1 (default)"),
            Some(ToolVersion::new(5, 4, 6))
        );
        assert_eq!(ToolVersion::find_in("no version here"), None);
    }

    #[test]
    fn orders_numerically() {
        assert!(ToolVersion::new(0, 10, 0) > ToolVersion::new(0, 9, 9));
        assert!(ToolVersion::parse("v1.27").unwrap() < ToolVersion::parse("1.27.1").unwrap());
    }

    #[test]
    fn strips_prerelease_and_build_metadata() {
        assert_eq!(
            ToolVersion::parse("v1.24.4-k3s1"),
            Some(ToolVersion::new(1, 24, 4))
        );
        assert_eq!(ToolVersion::parse("1.2.3.4"), None);
        assert_eq!(ToolVersion::new(1, 27, 3).minor_key(), "1.27");
    }
}
