use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Teardown scope applied to the old side once a migration or restore has landed.
///
/// On the wire this is one of the literal strings `"-1"`, `"0"` or `"1"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeletePolicy {
    /// `"-1"`: delete nothing.
    KeepAll,
    /// `"0"`: stop and undeploy only the old instance.
    InstanceOnly,
    /// `"1"`: stop and undeploy the whole subtree of the old root.
    WholeRoot,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid delete-old-root value '{0}', expected '-1', '0' or '1'")]
pub struct ParseDeletePolicyError(pub String);

impl DeletePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepAll => "-1",
            Self::InstanceOnly => "0",
            Self::WholeRoot => "1",
        }
    }
}

impl FromStr for DeletePolicy {
    type Err = ParseDeletePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-1" => Ok(Self::KeepAll),
            "0" => Ok(Self::InstanceOnly),
            "1" => Ok(Self::WholeRoot),
            other => Err(ParseDeletePolicyError(other.to_string())),
        }
    }
}

impl TryFrom<String> for DeletePolicy {
    type Error = ParseDeletePolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeletePolicy> for String {
    fn from(value: DeletePolicy) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
