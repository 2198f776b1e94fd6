//! Version numbers reported by external tool suites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tool suite version, compared component-wise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    /// Major component
    pub major: u64,
    /// Minor component
    pub minor: u64,
    /// Patch component
    pub patch: u64,
}

impl Version {
    /// Create a new version
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse from a version string as tools print it.
    ///
    /// Accepts a leading `v`, one to three dotted numeric components, and
    /// ignores any trailing build metadata (`2.1.0.post789-g0740f`,
    /// `6.0.5:9a9f8ea`, `7.4.1-rc`).
    ///
    /// # Errors
    ///
    /// Returns error if the string does not start with a number
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let mut parts = [0u64; 3];
        let mut seen = 0;
        for part in body.split('.').take(3) {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                break;
            }
            parts[seen] = digits
                .parse()
                .map_err(|_| VersionError::InvalidComponent(part.to_string()))?;
            seen += 1;
            if digits.len() != part.len() {
                break;
            }
        }

        if seen == 0 {
            return Err(VersionError::InvalidFormat(s.to_string()));
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }

    /// Get as array
    #[must_use]
    pub const fn as_array(&self) -> [u64; 3] {
        [self.major, self.minor, self.patch]
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Version error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// Not a version string
    #[error("invalid version format: {0}")]
    InvalidFormat(String),
    /// Component out of range
    #[error("invalid version component: {0}")]
    InvalidComponent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        assert_eq!(Version::parse("2.1.0").unwrap(), Version::new(2, 1, 0));
        assert_eq!(Version::parse("v2.3").unwrap(), Version::new(2, 3, 0));
        assert_eq!(Version::parse("6").unwrap(), Version::new(6, 0, 0));
    }

    #[test]
    fn test_version_parse_build_metadata() {
        assert_eq!(
            Version::parse("2.1.0.post789-g0740f").unwrap(),
            Version::new(2, 1, 0)
        );
        assert_eq!(Version::parse("6.0.5:9a9f8ea").unwrap(), Version::new(6, 0, 5));
        assert_eq!(Version::parse("7.4.1-rc").unwrap(), Version::new(7, 4, 1));
        assert_eq!(Version::parse("2.3rc1").unwrap(), Version::new(2, 3, 0));
    }

    #[test]
    fn test_version_parse_invalid() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("dev").is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(Version::new(2, 0, 3) < Version::new(2, 1, 0));
        assert!(Version::new(2, 1, 0) <= Version::parse("2.1.0").unwrap());
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::new(6, 0, 5).to_string(), "6.0.5");
    }
}
