//! Component versions and interval-notation version ranges.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version '{0}'")]
    InvalidVersion(String),
    #[error("invalid version range '{0}'")]
    InvalidRange(String),
}

/// `major[.minor[.micro[.qualifier]]]`; missing numeric parts are zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub qualifier: String,
}

impl Version {
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.micro)
            .cmp(&(other.major, other.minor, other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || VersionError::InvalidVersion(s.to_owned());
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let mut parts = trimmed.splitn(4, '.');
        let mut numbers = [0u32; 3];
        for slot in &mut numbers {
            match parts.next() {
                Some(p) => *slot = p.parse().map_err(|_| invalid())?,
                None => break,
            }
        }
        let qualifier = match parts.next() {
            Some("") => return Err(invalid()),
            Some(q) => q.to_owned(),
            None => String::new(),
        };

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

/// A version constraint.
///
/// Accepts interval notation (`[1,2)`, `(1.0,1.5]`, `[1,1]`) or a bare version
/// meaning "at least this version".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    floor: Version,
    floor_inclusive: bool,
    ceiling: Option<(Version, bool)>,
}

impl VersionRange {
    /// Range admitting every version.
    pub fn any() -> Self {
        Self {
            floor: Version::default(),
            floor_inclusive: true,
            ceiling: None,
        }
    }

    pub fn includes(&self, version: &Version) -> bool {
        let above_floor = if self.floor_inclusive {
            *version >= self.floor
        } else {
            *version > self.floor
        };
        let below_ceiling = match &self.ceiling {
            None => true,
            Some((ceiling, true)) => version <= ceiling,
            Some((ceiling, false)) => version < ceiling,
        };
        above_floor && below_ceiling
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || VersionError::InvalidRange(s.to_owned());

        let floor_inclusive = match trimmed.chars().next() {
            Some('[') => true,
            Some('(') => false,
            Some(_) => {
                let floor = trimmed.parse().map_err(|_| invalid())?;
                return Ok(Self {
                    floor,
                    floor_inclusive: true,
                    ceiling: None,
                });
            }
            None => return Err(invalid()),
        };
        let ceiling_inclusive = if trimmed.len() < 2 {
            return Err(invalid());
        } else if trimmed.ends_with(']') {
            true
        } else if trimmed.ends_with(')') {
            false
        } else {
            return Err(invalid());
        };

        let inner = &trimmed[1..trimmed.len() - 1];
        let (low, high) = inner.split_once(',').ok_or_else(invalid)?;
        let floor: Version = low.parse().map_err(|_| invalid())?;
        let ceiling: Version = high.parse().map_err(|_| invalid())?;
        if ceiling < floor {
            return Err(invalid());
        }

        Ok(Self {
            floor,
            floor_inclusive,
            ceiling: Some((ceiling, ceiling_inclusive)),
        })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ceiling {
            None => write!(f, "{}", self.floor),
            Some((ceiling, inclusive)) => write!(
                f,
                "{}{},{}{}",
                if self.floor_inclusive { '[' } else { '(' },
                self.floor,
                ceiling,
                if *inclusive { ']' } else { ')' }
            ),
        }
    }
}
