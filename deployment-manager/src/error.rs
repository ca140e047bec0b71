use axum::http::StatusCode;
use deployment::{IaasError, ParseDeletePolicyError};
use deployment_core::application::DescriptionError;
use deployment_core::tree::duplicate::DuplicationError;
use deployment_core::tree::insert::InsertionError;
use thiserror::Error;

/// Failures of the manager operations.
#[derive(Debug, Error)]
pub enum DmError {
    #[error("application {0} does not exist")]
    ApplicationNotFound(String),

    #[error("instance {0} was not found")]
    InstanceNotFound(String),

    #[error("impossible insertion: {0}")]
    ImpossibleInsertion(#[from] InsertionError),

    #[error("unauthorized action: {0}")]
    UnauthorizedAction(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("provisioning failure: {0}")]
    Iaas(#[from] IaasError),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("messaging failure: {0:#}")]
    Messaging(anyhow::Error),

    #[error("persistence failure: {0:#}")]
    Persistence(anyhow::Error),

    #[error("{0:#}")]
    Internal(anyhow::Error),
}

impl DmError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::UnauthorizedAction(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(msg.into()))
    }

    /// HTTP status reported by the REST API.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DmError::ApplicationNotFound(_) | DmError::InstanceNotFound(_) => StatusCode::NOT_FOUND,
            DmError::ImpossibleInsertion(_) => StatusCode::NOT_ACCEPTABLE,
            DmError::UnauthorizedAction(_)
            | DmError::Iaas(_)
            | DmError::Io(_)
            | DmError::Messaging(_)
            | DmError::Persistence(_) => StatusCode::FORBIDDEN,
            DmError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            DmError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ParseDeletePolicyError> for DmError {
    fn from(e: ParseDeletePolicyError) -> Self {
        DmError::InvalidParameter(e.to_string())
    }
}

impl From<DuplicationError> for DmError {
    fn from(e: DuplicationError) -> Self {
        DmError::Internal(e.into())
    }
}

impl From<DescriptionError> for DmError {
    fn from(e: DescriptionError) -> Self {
        match e {
            DescriptionError::Insertion { source, .. } => DmError::ImpossibleInsertion(source),
            other => DmError::InvalidParameter(other.to_string()),
        }
    }
}
