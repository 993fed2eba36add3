use std::fmt;

use semver::Version;
use thiserror::Error;

/// Errors from lenient version and constraint parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VersionError {
    #[error("failed to parse version string: {0}")]
    ParseError(String),
    #[error("invalid version constraint: {0}")]
    InvalidConstraint(String),
}

/// Parse a dotted-numeric version string leniently.
///
/// Accepts a leading `v`, fewer than three components (missing components
/// default to zero) and surrounding whitespace. Anything non-numeric in a
/// component is an error.
pub fn parse_lenient(input: &str) -> Result<Version, VersionError> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(VersionError::ParseError(input.to_string()));
    }

    let mut components = [0u64; 3];
    for (i, part) in trimmed.split('.').enumerate() {
        if i >= 3 {
            // Extra components (build counters etc.) are ignored.
            break;
        }
        components[i] = part
            .trim()
            .parse::<u64>()
            .map_err(|_| VersionError::ParseError(input.to_string()))?;
    }

    Ok(Version::new(components[0], components[1], components[2]))
}

/// A minimum-version requirement on a dependency.
///
/// Only `>=X` and the wildcard are supported; the descriptor format has
/// never needed anything richer.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionConstraint {
    /// Any version satisfies the dependency.
    Any,
    /// The dependency's version must be at least this.
    AtLeast(Version),
}

impl VersionConstraint {
    /// Parse a constraint string. Empty or `*` means any version; a bare
    /// version string is treated like `>=` that version.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(VersionConstraint::Any);
        }
        let version_part = trimmed.strip_prefix(">=").unwrap_or(trimmed);
        let version = parse_lenient(version_part)
            .map_err(|_| VersionError::InvalidConstraint(input.to_string()))?;
        Ok(VersionConstraint::AtLeast(version))
    }

    /// Whether the given version satisfies this constraint.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::AtLeast(min) => version >= min,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::AtLeast(v) => write!(f, ">={v}"),
        }
    }
}

/// Check a plugin's declared host-version window against the running host.
///
/// Bounds that fail to parse are logged and ignored rather than rejecting
/// the plugin; a typo in a manifest bound should not hide the plugin.
pub fn host_compatible(host: &Version, min: Option<&str>, max: Option<&str>) -> bool {
    if let Some(raw) = min {
        match parse_lenient(raw) {
            Ok(min_version) => {
                if *host < min_version {
                    return false;
                }
            }
            Err(e) => log::warn!("Ignoring unparsable min_app_version '{raw}': {e}"),
        }
    }
    if let Some(raw) = max {
        match parse_lenient(raw) {
            Ok(max_version) => {
                if *host > max_version {
                    return false;
                }
            }
            Err(e) => log::warn!("Ignoring unparsable max_app_version '{raw}': {e}"),
        }
    }
    true
}
