//! # Deployment API
//!
//! Shared vocabulary of the deployment manager and its agents.
//!
//! ## Modules
//! - `model`: Instance statuses, the component graph, imports and the teardown policy.
//! - `traits`: Collaborator seams (virtualization backends).

pub mod model;
pub mod traits;

pub use model::component::{Component, Graph, GraphBuilder, GraphError};
pub use model::import::{Import, Imports};
pub use model::policy::{DeletePolicy, ParseDeletePolicyError};
pub use model::status::InstanceStatus;
pub use traits::iaas::{IaasError, IaasProvider, MachineRequest};

/// Key under which an agent-reported IP address is stored in instance data.
pub const IP_ADDRESS: &str = "ip-address";

/// Key under which the virtualization backend's machine id is stored in instance data.
pub const MACHINE_ID: &str = "machine-id";
