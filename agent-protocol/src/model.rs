use deployment::{InstanceStatus, IP_ADDRESS};
use deployment_core::{Application, InstanceId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Routing topic of the machine hosting `root_instance_name`.
///
/// The trailing slash keeps `vm1` subscribers away from `vm10` traffic.
pub fn topic(application_name: &str, root_instance_name: &str) -> String {
    format!("{}/{}/", application_name, root_instance_name)
}

/// Read-only view of an instance, as exposed to operators.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InstanceSnapshot {
    pub path: String,
    pub name: String,
    pub component: Option<String>,
    pub channel: Option<String>,
    pub status: InstanceStatus,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub exports: BTreeMap<String, String>,
}

impl InstanceSnapshot {
    pub fn capture(application: &Application, id: InstanceId) -> Option<Self> {
        let instance = application.instance(id)?;
        let data: HashMap<_, _> = instance.data().clone();
        Some(Self {
            path: application.path_of(id),
            name: instance.name().to_string(),
            component: instance.component_name().map(str::to_string),
            channel: instance.channel().map(str::to_string),
            status: instance.status(),
            ip_address: instance.data().get(IP_ADDRESS).cloned(),
            data: data.into_iter().collect(),
            exports: instance.exported_variables().into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployment_core::ApplicationDescription;

    #[test]
    fn test_topic_is_prefix_safe() {
        assert_eq!(topic("lamp", "vm1"), "lamp/vm1/");
        assert!(!topic("lamp", "vm10").starts_with(&topic("lamp", "vm1")));
    }

    #[test]
    fn test_capture() {
        let description: ApplicationDescription = serde_json::from_str(
            r#"{
                "name": "lamp",
                "components": [
                    { "name": "vm", "children": ["tomcat"] },
                    { "name": "tomcat", "exports": { "port": "8080" } }
                ],
                "instances": [
                    { "name": "vm1", "component": "vm", "children": [
                        { "name": "tomcat", "component": "tomcat" }
                    ]}
                ]
            }"#,
        )
        .unwrap();
        let mut app = Application::from_description(&description).unwrap();
        let vm1 = app.find("/vm1").unwrap();
        app.instance_mut(vm1)
            .unwrap()
            .data_mut()
            .insert(IP_ADDRESS.into(), "10.0.0.5".into());

        let snapshot = InstanceSnapshot::capture(&app, vm1).unwrap();
        assert_eq!(snapshot.path, "/vm1");
        assert_eq!(snapshot.ip_address.as_deref(), Some("10.0.0.5"));

        let tomcat = InstanceSnapshot::capture(&app, app.find("/vm1/tomcat").unwrap()).unwrap();
        assert_eq!(tomcat.exports["port"], "8080");
        assert_eq!(tomcat.status, InstanceStatus::NotDeployed);
    }
}
