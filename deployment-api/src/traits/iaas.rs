use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Everything a virtualization backend needs to provision one machine.
#[derive(Debug, Clone, Default)]
pub struct MachineRequest {
    pub application_name: String,
    pub root_instance_name: String,
    /// Messaging routing hint handed over to the agent.
    pub channel: Option<String>,
    /// Backend specific settings (image, flavor, credentials...).
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum IaasError {
    #[error("invalid IaaS properties: {0}")]
    InvalidProperties(String),

    #[error("machine '{0}' is unknown to the provider")]
    UnknownMachine(String),

    #[error("provisioning failed: {0}")]
    Provisioning(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// The abstraction over virtualization backends.
///
/// Implementations may block for a long time (polling the backend until the
/// machine is running), so callers must never hold model locks across these calls.
#[async_trait]
pub trait IaasProvider: Send + Sync {
    /// Provisions a machine and returns the backend's identifier for it.
    async fn create_machine(&self, request: &MachineRequest) -> Result<String, IaasError>;

    /// Terminates a machine previously returned by [`IaasProvider::create_machine`].
    async fn terminate_machine(&self, machine_id: &str) -> Result<(), IaasError>;
}
