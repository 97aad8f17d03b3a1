use core::fmt;
use core::str::FromStr;

use alloy_primitives::B256;
use thiserror::Error;

/// Suffix appended to a logical name to keep a superseded address resolvable.
pub const DEPRECATED_SUFFIX: &str = "Deprecated";

/// Errors that can occur when building a [`LogicalName`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NameError {
    /// The name is empty.
    #[error("Logical name is empty")]
    Empty,

    /// The name does not fit into a `bytes32` Hub key.
    #[error("Logical name `{name}` is {len} bytes long, at most {max} bytes fit a Hub key", max = LogicalName::MAX_LEN)]
    TooLong { name: String, len: usize },

    /// The name contains a character outside of `[A-Za-z0-9_]`.
    #[error("Logical name `{name}` contains invalid character {invalid:?}")]
    InvalidCharacter { name: String, invalid: char },
}

/// Stable identifier of a module's role in the Hub, independent of the
/// implementation or version backing it (eg. `Staking` whether backed by
/// `Staking` or `StakingV2`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct LogicalName(String);

impl LogicalName {
    /// Longest name that still leaves room for the terminating zero byte
    /// of a `bytes32` string key.
    pub const MAX_LEN: usize = 31;

    /// Name under which the Hub itself is recorded.
    pub const HUB: &'static str = "Hub";

    /// Name under which the Hub Controller is recorded.
    pub const HUB_CONTROLLER: &'static str = "HubController";

    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();

        if name.is_empty() {
            return Err(NameError::Empty);
        }

        if name.len() > Self::MAX_LEN {
            let len = name.len();
            return Err(NameError::TooLong { name, len });
        }

        if let Some(invalid) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(NameError::InvalidCharacter { name, invalid });
        }

        Ok(Self(name))
    }

    /// The logical name of the Hub.
    pub fn hub() -> Self {
        Self(Self::HUB.to_owned())
    }

    /// The logical name of the Hub Controller.
    pub fn hub_controller() -> Self {
        Self(Self::HUB_CONTROLLER.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_hub(&self) -> bool {
        self.0 == Self::HUB
    }

    /// Name under which the address formerly bound to this name is retained
    /// after a rename-and-replace upgrade, ie. `"<name>Deprecated"`.
    pub fn deprecated(&self) -> Result<Self, NameError> {
        Self::new(format!("{}{DEPRECATED_SUFFIX}", self.0))
    }

    /// The `bytes32` Hub key for this name: UTF-8 bytes, right-padded with zeros.
    pub fn to_bytes32(&self) -> B256 {
        let mut key = [0u8; 32];
        key[..self.0.len()].copy_from_slice(self.0.as_bytes());
        B256::from(key)
    }
}

impl fmt::Display for LogicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for LogicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl FromStr for LogicalName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LogicalName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LogicalName> for String {
    fn from(value: LogicalName) -> Self {
        value.0
    }
}

impl AsRef<str> for LogicalName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
