use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment lifecycle of an instance.
///
/// Root instances map to machines: `DeployedStarted` means the machine is up and
/// its agent reachable. `Problem` is only ever set by heartbeat liveness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    #[default]
    NotDeployed,
    Deploying,
    DeployedStopped,
    Starting,
    DeployedStarted,
    Stopping,
    Undeploying,
    Problem,
}

impl InstanceStatus {
    /// Stable states are the ones an agent can leave an instance in.
    pub fn is_stable(&self) -> bool {
        matches!(
            self,
            Self::NotDeployed | Self::DeployedStopped | Self::DeployedStarted
        )
    }

    pub fn is_deployed(&self) -> bool {
        matches!(self, Self::DeployedStopped | Self::DeployedStarted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotDeployed => "NOT_DEPLOYED",
            Self::Deploying => "DEPLOYING",
            Self::DeployedStopped => "DEPLOYED_STOPPED",
            Self::Starting => "STARTING",
            Self::DeployedStarted => "DEPLOYED_STARTED",
            Self::Stopping => "STOPPING",
            Self::Undeploying => "UNDEPLOYING",
            Self::Problem => "PROBLEM",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
