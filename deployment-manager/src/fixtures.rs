//! Shared setup of the unit tests.

use crate::event_bus::EventBus;
use crate::gateway::RecordingGateway;
use crate::iaas::LocalIaas;
use crate::manager::{lock, Manager};
use crate::persistence::StateStore;
use crate::registry::SharedApplication;
use agent_protocol::Command;
use deployment::InstanceStatus;
use deployment_core::{ApplicationDescription, InstanceId};
use std::sync::Arc;
use tempfile::TempDir;

/// `vm` hosts `tomcat` and `mysql`, `tomcat` hosts `war`.
pub const LAMP: &str = r#"{
    "name": "lamp",
    "components": [
        { "name": "vm", "children": ["tomcat", "mysql"] },
        { "name": "tomcat", "exports": { "port": "8080" }, "children": ["war"] },
        { "name": "mysql", "exports": { "port": "3306" } },
        { "name": "war" }
    ],
    "instances": [
        { "name": "vm1", "component": "vm", "children": [
            { "name": "tomcat", "component": "tomcat", "children": [
                { "name": "rubis", "component": "war" }
            ]}
        ]},
        { "name": "vm2", "component": "vm", "children": [
            { "name": "mysql", "component": "mysql" }
        ]}
    ]
}"#;

pub const THRESHOLD: u32 = 2;

pub struct Fixture {
    pub manager: Arc<Manager>,
    pub gateway: Arc<RecordingGateway>,
    pub iaas: Arc<LocalIaas>,
    pub events: EventBus,
    pub app: SharedApplication,
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(RecordingGateway::new());
        let iaas = Arc::new(LocalIaas::new());
        let events = EventBus::new();
        let manager = Manager::new(
            gateway.clone(),
            iaas.clone(),
            StateStore::new(dir.path()),
            events.clone(),
        )
        .with_missed_heartbeats_threshold(THRESHOLD);

        let description: ApplicationDescription = serde_json::from_str(LAMP).unwrap();
        let app = manager.register_application(&description).unwrap();
        Self {
            manager: Arc::new(manager),
            gateway,
            iaas,
            events,
            app,
            dir,
        }
    }

    pub fn id(&self, path: &str) -> InstanceId {
        lock(&self.app)
            .unwrap()
            .application()
            .find(path)
            .unwrap_or_else(|| panic!("{path} not found"))
    }

    pub fn exists(&self, path: &str) -> bool {
        lock(&self.app).unwrap().application().find(path).is_some()
    }

    pub fn status(&self, path: &str) -> InstanceStatus {
        let id = self.id(path);
        lock(&self.app).unwrap().application().instance(id).unwrap().status()
    }

    pub fn data(&self, path: &str, key: &str) -> Option<String> {
        let id = self.id(path);
        lock(&self.app)
            .unwrap()
            .application()
            .instance(id)
            .unwrap()
            .data()
            .get(key)
            .cloned()
    }

    pub fn set_status(&self, path: &str, status: InstanceStatus) {
        let id = self.id(path);
        lock(&self.app)
            .unwrap()
            .application_mut()
            .instance_mut(id)
            .unwrap()
            .set_status(status);
    }

    pub fn instance_count(&self) -> usize {
        lock(&self.app).unwrap().application().all_instances().len()
    }

    pub fn awaiting(&self, root: &str) -> Vec<Command> {
        let id = self.id(root);
        lock(&self.app).unwrap().awaiting_messages(id).to_vec()
    }

    /// Commands delivered to agents since the last call.
    pub fn sent(&self) -> Vec<(String, Command)> {
        self.gateway
            .take()
            .into_iter()
            .map(|s| (s.root_instance_name, s.command))
            .collect()
    }
}
