use core::fmt;
use core::str::FromStr;

use thiserror::Error;

/// Error returned when a version string cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Invalid version `{0}`, expected `MAJOR[.MINOR[.PATCH]]`")]
pub struct VersionError(pub String);

/// Version of a deployed module implementation.
///
/// Versions are parsed from `MAJOR[.MINOR[.PATCH]]`, missing components
/// default to zero. Only the major component (the [`Band`]) takes part
/// in upgrade decisions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub const fn band(&self) -> Band {
        Band(self.major)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VersionError(s.to_owned());

        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<u32, VersionError> {
            match parts.next() {
                Some(part) => part.parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };

        let version = Self::new(next(true)?, next(false)?, next(false)?);

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(version)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Major-version grouping used for upgrade-vs-skip decisions (eg. `1.x`, `2.x`).
///
/// Minor and patch versions never affect the band, so a module recorded
/// at `2.3.0` is current for a step targeting `2.1.0`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Band(pub u32);

impl Band {
    /// Band of modules recorded without any version, below every parsed version.
    pub const OLDEST: Band = Band(0);

    /// Band of an optional version, absent versions fall into [`Band::OLDEST`].
    pub fn of(version: Option<&Version>) -> Band {
        version.map_or(Band::OLDEST, Version::band)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Band::OLDEST {
            f.write_str("legacy")
        } else {
            write!(f, "{}.x", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_versions() {
        assert_eq!("2".parse(), Ok(Version::new(2, 0, 0)));
        assert_eq!("2.1".parse(), Ok(Version::new(2, 1, 0)));
        assert_eq!(" 1.0.3 ".parse(), Ok(Version::new(1, 0, 3)));
        assert!("".parse::<Version>().is_err());
        assert!("v2".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
    }

    #[test]
    fn bands_ignore_minor_versions() {
        let v21: Version = "2.1".parse().unwrap();
        let v23: Version = "2.3.7".parse().unwrap();
        assert_eq!(v21.band(), v23.band());
        assert!(Band::of(None) < Version::new(1, 0, 0).band());
        assert_eq!(Band(2).to_string(), "2.x");
    }
}
