use async_trait::async_trait;
use deployment::{IaasError, IaasProvider, MachineRequest};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Simulated backend: machines are entries in a map.
///
/// Useful for development and tests. Agents still have to report `MachineUp`
/// on their own; nothing is started here.
#[derive(Debug, Default)]
pub struct LocalIaas {
    machines: Mutex<HashMap<String, MachineRequest>>,
    next_id: AtomicU64,
    failing: AtomicBool,
    boot_delay: Duration,
}

impl LocalIaas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the polling a real backend does before a machine is running.
    pub fn with_boot_delay(mut self, boot_delay: Duration) -> Self {
        self.boot_delay = boot_delay;
        self
    }

    /// Makes provisioning fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn running_machines(&self) -> Vec<String> {
        let mut ids: Vec<String> = match self.machines.lock() {
            Ok(machines) => machines.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        };
        ids.sort();
        ids
    }

    pub fn machine(&self, machine_id: &str) -> Option<MachineRequest> {
        match self.machines.lock() {
            Ok(machines) => machines.get(machine_id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(machine_id).cloned(),
        }
    }
}

#[async_trait]
impl IaasProvider for LocalIaas {
    async fn create_machine(&self, request: &MachineRequest) -> Result<String, IaasError> {
        if request.root_instance_name.is_empty() {
            return Err(IaasError::InvalidProperties("a root instance name is required".into()));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(IaasError::Provisioning(format!(
                "no capacity left for {}",
                request.root_instance_name
            )));
        }
        if !self.boot_delay.is_zero() {
            tokio::time::sleep(self.boot_delay).await;
        }

        let machine_id = format!("local-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        info!(
            "IaaS: machine {} created for {}/{}",
            machine_id, request.application_name, request.root_instance_name
        );
        self.machines
            .lock()
            .map_err(|_| IaasError::Provisioning("machine table lock poisoned".into()))?
            .insert(machine_id.clone(), request.clone());
        Ok(machine_id)
    }

    async fn terminate_machine(&self, machine_id: &str) -> Result<(), IaasError> {
        let removed = self
            .machines
            .lock()
            .map_err(|_| IaasError::Provisioning("machine table lock poisoned".into()))?
            .remove(machine_id);
        match removed {
            Some(request) => {
                info!(
                    "IaaS: machine {} of {}/{} terminated",
                    machine_id, request.application_name, request.root_instance_name
                );
                Ok(())
            }
            None => {
                warn!("IaaS: machine {} is unknown", machine_id);
                Err(IaasError::UnknownMachine(machine_id.to_string()))
            }
        }
    }
}
