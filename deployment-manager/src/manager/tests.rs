use super::*;
use crate::fixtures::{Fixture, LAMP, THRESHOLD};
use deployment::MACHINE_ID;
use deployment_core::InstanceDescription;

fn deploy_cmd(path: &str) -> Command {
    Command::Deploy {
        instance_path: path.into(),
    }
}

fn start_cmd(path: &str) -> Command {
    Command::Start {
        instance_path: path.into(),
    }
}

fn restore_cmd(path: &str, old: &str, policy: DeletePolicy) -> Command {
    Command::Restore {
        instance_path: path.into(),
        old_instance_path: Some(old.into()),
        dest_path: None,
        delete_old_root: Some(policy),
    }
}

#[test]
fn test_register_application() {
    let f = Fixture::new();
    let description: ApplicationDescription = serde_json::from_str(LAMP).unwrap();
    assert!(matches!(
        f.manager.register_application(&description),
        Err(DmError::InvalidParameter(_))
    ));
    assert_eq!(f.manager.registry().names(), vec!["lamp".to_string()]);
    assert!(f.dir.path().join("lamp").join("instances.json").is_file());
}

#[test]
fn test_restore_saved_applications() {
    let f = Fixture::new();
    f.set_status("/vm1", InstanceStatus::DeployedStarted);
    f.manager.save(&f.app).unwrap();

    let other = Manager::new(
        f.gateway.clone(),
        f.iaas.clone(),
        StateStore::new(f.dir.path()),
        EventBus::new(),
    );
    assert_eq!(other.restore_saved_applications().unwrap(), 1);
    let (app, vm1) = other.resolve("lamp", "/vm1").unwrap();
    assert_eq!(
        lock(&app).unwrap().application().instance(vm1).unwrap().status(),
        InstanceStatus::DeployedStarted
    );
}

#[test]
fn test_resolve() {
    let f = Fixture::new();
    assert!(matches!(
        f.manager.resolve("nope", "/vm1"),
        Err(DmError::ApplicationNotFound(_))
    ));
    assert!(matches!(
        f.manager.resolve("lamp", "/vm3"),
        Err(DmError::InstanceNotFound(_))
    ));
    assert!(f.manager.resolve("lamp", "/vm1/tomcat/rubis").is_ok());
}

#[test]
fn test_action_names() {
    assert_eq!("deploy".parse::<Action>().unwrap(), Action::Deploy);
    assert_eq!("backup".parse::<Action>().unwrap(), Action::Backup);
    assert!(matches!(
        "explode".parse::<Action>(),
        Err(DmError::InvalidParameter(_))
    ));
    assert!(matches!(parse_policy(None), Err(DmError::InvalidParameter(_))));
    assert!(matches!(parse_policy(Some("2")), Err(DmError::InvalidParameter(_))));
    assert_eq!(parse_policy(Some("0")).unwrap(), DeletePolicy::InstanceOnly);
}

#[tokio::test]
async fn test_deploy_root_provisions_a_machine() {
    let f = Fixture::new();
    f.manager.perform("lamp", Action::Deploy, "/vm1").await.unwrap();

    assert_eq!(f.status("/vm1"), InstanceStatus::Deploying);
    let machine_id = f.data("/vm1", MACHINE_ID).unwrap();
    assert_eq!(f.iaas.running_machines(), vec![machine_id]);

    // The agent gets its model once the machine is up
    assert!(f.sent().is_empty());
    let awaiting = f.awaiting("/vm1");
    assert_eq!(awaiting.len(), 1);
    match &awaiting[0] {
        Command::SetRootInstance { root } => {
            assert_eq!(root.name, "vm1");
            assert_eq!(root.children[0].name, "tomcat");
        }
        other => panic!("unexpected command {other:?}"),
    }

    assert!(matches!(
        f.manager.perform("lamp", Action::Deploy, "/vm1").await,
        Err(DmError::UnauthorizedAction(_))
    ));
}

#[tokio::test]
async fn test_deploy_root_failure_resets_the_root() {
    let f = Fixture::new();
    f.iaas.set_failing(true);

    let err = f.manager.perform("lamp", Action::Deploy, "/vm1").await.unwrap_err();
    assert!(matches!(err, DmError::Iaas(_)));
    assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    assert_eq!(f.status("/vm1"), InstanceStatus::NotDeployed);
    assert!(f.awaiting("/vm1").is_empty());
}

#[tokio::test]
async fn test_child_lifecycle() {
    let f = Fixture::new();
    f.set_status("/vm1", InstanceStatus::DeployedStarted);

    assert!(matches!(
        f.manager.perform("lamp", Action::Start, "/vm1/tomcat").await,
        Err(DmError::UnauthorizedAction(_))
    ));
    assert!(matches!(
        f.manager.perform("lamp", Action::Backup, "/vm1/tomcat").await,
        Err(DmError::UnauthorizedAction(_))
    ));

    f.manager.perform("lamp", Action::Deploy, "/vm1/tomcat").await.unwrap();
    assert_eq!(f.status("/vm1/tomcat"), InstanceStatus::Deploying);
    assert_eq!(f.sent(), vec![("vm1".to_string(), deploy_cmd("/vm1/tomcat"))]);

    f.set_status("/vm1/tomcat", InstanceStatus::DeployedStopped);
    f.manager.perform("lamp", Action::Start, "/vm1/tomcat").await.unwrap();
    assert_eq!(f.status("/vm1/tomcat"), InstanceStatus::Starting);

    f.set_status("/vm1/tomcat", InstanceStatus::DeployedStarted);
    f.manager.perform("lamp", Action::Backup, "/vm1/tomcat").await.unwrap();
    f.manager.perform("lamp", Action::Stop, "/vm1/tomcat").await.unwrap();
    assert_eq!(f.status("/vm1/tomcat"), InstanceStatus::Stopping);

    f.manager.perform("lamp", Action::Undeploy, "/vm1/tomcat").await.unwrap();
    assert_eq!(f.status("/vm1/tomcat"), InstanceStatus::Undeploying);

    let sent: Vec<Command> = f.sent().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        sent,
        vec![
            start_cmd("/vm1/tomcat"),
            Command::Backup {
                instance_path: "/vm1/tomcat".into()
            },
            Command::Stop {
                instance_path: "/vm1/tomcat".into()
            },
            Command::Undeploy {
                instance_path: "/vm1/tomcat".into()
            },
        ]
    );
}

#[tokio::test]
async fn test_roots_are_not_started_by_operators() {
    let f = Fixture::new();
    f.set_status("/vm1", InstanceStatus::DeployedStopped);
    assert!(matches!(
        f.manager.perform("lamp", Action::Start, "/vm1").await,
        Err(DmError::UnauthorizedAction(_))
    ));
}

#[tokio::test]
async fn test_commands_wait_for_the_machine() {
    let f = Fixture::new();
    f.manager.perform("lamp", Action::Deploy, "/vm1").await.unwrap();
    f.manager.perform("lamp", Action::Deploy, "/vm1/tomcat").await.unwrap();
    assert!(f.sent().is_empty());
    assert_eq!(f.awaiting("/vm1").len(), 2);

    // Not started yet: nothing moves
    let vm1 = f.id("/vm1");
    assert_eq!(f.manager.flush_awaiting_messages(&f.app, vm1).await.unwrap(), 0);

    f.set_status("/vm1", InstanceStatus::DeployedStarted);
    assert_eq!(f.manager.flush_awaiting_messages(&f.app, vm1).await.unwrap(), 2);
    let sent = f.sent();
    assert!(matches!(sent[0].1, Command::SetRootInstance { .. }));
    assert_eq!(sent[1].1, deploy_cmd("/vm1/tomcat"));
    assert!(f.awaiting("/vm1").is_empty());
}

#[tokio::test]
async fn test_failed_flush_keeps_the_order() {
    let f = Fixture::new();
    f.set_status("/vm1/tomcat", InstanceStatus::DeployedStopped);
    f.manager.perform("lamp", Action::Start, "/vm1/tomcat").await.unwrap();
    f.set_status("/vm1/tomcat/rubis", InstanceStatus::NotDeployed);
    f.manager
        .perform("lamp", Action::Deploy, "/vm1/tomcat/rubis")
        .await
        .unwrap();

    f.set_status("/vm1", InstanceStatus::DeployedStarted);
    f.gateway.set_failing(true);
    assert!(matches!(
        f.manager.flush_awaiting_messages(&f.app, f.id("/vm1")).await,
        Err(DmError::Messaging(_))
    ));
    assert_eq!(
        f.awaiting("/vm1"),
        vec![start_cmd("/vm1/tomcat"), deploy_cmd("/vm1/tomcat/rubis")]
    );

    f.gateway.set_failing(false);
    f.manager.flush_all().await;
    assert_eq!(f.sent().len(), 2);
}

#[tokio::test]
async fn test_undeploy_root() {
    let f = Fixture::new();
    f.manager.perform("lamp", Action::Deploy, "/vm1").await.unwrap();
    f.set_status("/vm1", InstanceStatus::DeployedStarted);
    f.set_status("/vm1/tomcat", InstanceStatus::DeployedStarted);
    f.set_status("/vm1/tomcat/rubis", InstanceStatus::DeployedStopped);

    f.manager.perform("lamp", Action::Undeploy, "/vm1").await.unwrap();
    assert_eq!(f.status("/vm1"), InstanceStatus::NotDeployed);
    assert_eq!(f.status("/vm1/tomcat"), InstanceStatus::NotDeployed);
    assert_eq!(f.status("/vm1/tomcat/rubis"), InstanceStatus::NotDeployed);
    assert!(f.iaas.running_machines().is_empty());
    assert!(f.awaiting("/vm1").is_empty());
    assert_eq!(f.data("/vm1", MACHINE_ID), None);

    assert!(matches!(
        f.manager.perform("lamp", Action::Undeploy, "/vm1").await,
        Err(DmError::UnauthorizedAction(_))
    ));
}

#[tokio::test]
async fn test_add_instance() {
    let f = Fixture::new();
    let before = f.instance_count();

    let path = f
        .manager
        .add_instance(
            "lamp",
            Some("/vm2"),
            &InstanceDescription::new("tomcat", "tomcat")
                .with_child(InstanceDescription::new("shop", "war")),
        )
        .await
        .unwrap();
    assert_eq!(path, "/vm2/tomcat");
    assert!(f.exists("/vm2/tomcat/shop"));
    assert_eq!(f.instance_count(), before + 2);
    assert!(matches!(f.awaiting("/vm2")[0], Command::AddInstance { .. }));

    // Same name twice
    let err = f
        .manager
        .add_instance("lamp", Some("/vm2"), &InstanceDescription::new("tomcat", "tomcat"))
        .await
        .unwrap_err();
    assert!(matches!(err, DmError::ImpossibleInsertion(_)));
    assert_eq!(err.status_code(), axum::http::StatusCode::NOT_ACCEPTABLE);

    // A war cannot run directly on a machine
    assert!(matches!(
        f.manager
            .add_instance("lamp", Some("/vm2"), &InstanceDescription::new("app", "war"))
            .await,
        Err(DmError::ImpossibleInsertion(_))
    ));
    assert_eq!(f.instance_count(), before + 2);

    let path = f
        .manager
        .add_instance("lamp", None, &InstanceDescription::new("vm3", "vm"))
        .await
        .unwrap();
    assert_eq!(path, "/vm3");
    assert!(matches!(
        f.manager
            .add_instance("lamp", Some("/vm9"), &InstanceDescription::new("x", "tomcat"))
            .await,
        Err(DmError::InstanceNotFound(_))
    ));
}

#[tokio::test]
async fn test_remove_instance() {
    let f = Fixture::new();
    f.set_status("/vm1/tomcat/rubis", InstanceStatus::DeployedStopped);
    assert!(matches!(
        f.manager.perform("lamp", Action::Remove, "/vm1/tomcat").await,
        Err(DmError::UnauthorizedAction(_))
    ));
    assert!(f.exists("/vm1/tomcat/rubis"));

    f.set_status("/vm1/tomcat/rubis", InstanceStatus::NotDeployed);
    f.manager.perform("lamp", Action::Remove, "/vm1/tomcat").await.unwrap();
    assert!(!f.exists("/vm1/tomcat"));
    assert_eq!(f.instance_count(), 3);
    assert_eq!(
        f.awaiting("/vm1"),
        vec![Command::RemoveInstance {
            instance_path: "/vm1/tomcat".into()
        }]
    );

    f.manager.perform("lamp", Action::Remove, "/vm2").await.unwrap();
    assert!(!f.exists("/vm2/mysql"));
}

#[tokio::test]
async fn test_deploy_and_start_all() {
    let f = Fixture::new();
    let vm1 = f.id("/vm1");
    f.manager.deploy_and_start_all(&f.app, None).await.unwrap();

    assert_eq!(f.iaas.running_machines().len(), 2);
    assert_eq!(f.status("/vm1/tomcat/rubis"), InstanceStatus::Deploying);
    assert_eq!(f.status("/vm2/mysql"), InstanceStatus::Deploying);

    f.set_status("/vm1", InstanceStatus::DeployedStarted);
    f.manager.flush_awaiting_messages(&f.app, vm1).await.unwrap();
    let sent: Vec<Command> = f.sent().into_iter().map(|(_, c)| c).collect();
    assert_eq!(sent.len(), 5);
    assert!(matches!(sent[0], Command::SetRootInstance { .. }));
    assert_eq!(
        sent[1..].to_vec(),
        vec![
            deploy_cmd("/vm1/tomcat"),
            deploy_cmd("/vm1/tomcat/rubis"),
            start_cmd("/vm1/tomcat"),
            start_cmd("/vm1/tomcat/rubis"),
        ]
    );
}

#[tokio::test]
async fn test_bulk_operations_skip_what_they_cannot_do() {
    let f = Fixture::new();
    f.set_status("/vm1", InstanceStatus::DeployedStarted);
    f.set_status("/vm1/tomcat", InstanceStatus::DeployedStarted);
    f.set_status("/vm1/tomcat/rubis", InstanceStatus::DeployedStarted);
    f.set_status("/vm2", InstanceStatus::DeployedStarted);
    f.set_status("/vm2/mysql", InstanceStatus::DeployedStopped);

    f.manager.stop_all(&f.app, None).await.unwrap();
    let sent: Vec<Command> = f.sent().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        sent,
        vec![
            Command::Stop {
                instance_path: "/vm1/tomcat/rubis".into()
            },
            Command::Stop {
                instance_path: "/vm1/tomcat".into()
            },
        ]
    );

    f.manager.start_all(&f.app, Some(f.id("/vm2"))).await.unwrap();
    assert_eq!(f.sent(), vec![("vm2".to_string(), start_cmd("/vm2/mysql"))]);

    // Below a root, instances are undeployed one by one
    f.manager.undeploy_all(&f.app, Some(f.id("/vm1/tomcat"))).await.unwrap();
    assert_eq!(f.status("/vm1/tomcat"), InstanceStatus::Undeploying);
    assert_eq!(f.status("/vm1"), InstanceStatus::DeployedStarted);
    assert_eq!(f.sent().len(), 2);
}

#[tokio::test]
async fn test_undeploy_all_terminates_machines() {
    let f = Fixture::new();
    f.manager.deploy_all(&f.app, None).await.unwrap();
    assert_eq!(f.iaas.running_machines().len(), 2);

    f.manager.undeploy_all(&f.app, None).await.unwrap();
    assert!(f.iaas.running_machines().is_empty());
    assert_eq!(f.status("/vm1/tomcat/rubis"), InstanceStatus::NotDeployed);
    assert_eq!(f.status("/vm2"), InstanceStatus::NotDeployed);
}

#[tokio::test]
async fn test_thorough_operations_ignore_the_status() {
    let f = Fixture::new();
    f.manager.perform("lamp", Action::Deploy, "/vm1").await.unwrap();
    f.set_status("/vm1", InstanceStatus::DeployedStarted);
    f.set_status("/vm1/tomcat", InstanceStatus::Problem);
    f.set_status("/vm1/tomcat/rubis", InstanceStatus::Starting);
    f.manager.flush_all().await;
    f.sent();

    let tomcat = f.id("/vm1/tomcat");
    f.manager.stop_all_thoroughly(&f.app, Some(tomcat)).await.unwrap();
    assert_eq!(f.status("/vm1/tomcat"), InstanceStatus::Stopping);
    assert_eq!(f.sent().len(), 2);

    f.manager.undeploy_all_thoroughly(&f.app, Some(tomcat)).await.unwrap();
    assert_eq!(f.status("/vm1/tomcat/rubis"), InstanceStatus::Undeploying);
    assert_eq!(f.sent().len(), 2);

    f.manager.undeploy_all_thoroughly(&f.app, Some(f.id("/vm1"))).await.unwrap();
    assert_eq!(f.status("/vm1"), InstanceStatus::NotDeployed);
    assert!(f.iaas.running_machines().is_empty());
}

#[tokio::test]
async fn test_restore_to_validation() {
    let f = Fixture::new();

    let err = f
        .manager
        .restore_to("lamp", "/vm1/tomcat/rubis", Some("/vm3/t/r"), Some("2"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

    assert!(matches!(
        f.manager
            .restore_to("lamp", "/vm1/tomcat/rubis", None, Some("1"))
            .await,
        Err(DmError::InvalidParameter(_))
    ));

    let err = f
        .manager
        .restore_to("lamp", "/vm1/tomcat/rubis", Some("/vm3/tomcat"), Some("1"))
        .await
        .unwrap_err();
    assert!(matches!(err, DmError::InvalidParameter(_)));
    assert!(err
        .to_string()
        .contains("/instance_of_vm/instance_of_tomcat/instance_of_war"));

    assert!(matches!(
        f.manager
            .restore_to("lamp", "/vm1/nope", Some("/a/b"), Some("1"))
            .await,
        Err(DmError::InstanceNotFound(_))
    ));
    assert_eq!(f.instance_count(), 5);
}

#[tokio::test]
async fn test_restore_to_a_new_machine() {
    let f = Fixture::new();
    f.manager
        .restore_to("lamp", "/vm1/tomcat/rubis", Some("/vm3/tomcat/rubis"), Some("1"))
        .await
        .unwrap();

    assert!(f.exists("/vm3/tomcat/rubis"));
    assert_eq!(f.status("/vm3"), InstanceStatus::Deploying);
    assert_eq!(f.iaas.running_machines().len(), 1);

    let awaiting = f.awaiting("/vm3");
    assert!(matches!(awaiting[0], Command::SetRootInstance { .. }));
    assert_eq!(
        awaiting[1..].to_vec(),
        vec![
            deploy_cmd("/vm3/tomcat"),
            deploy_cmd("/vm3/tomcat/rubis"),
            restore_cmd("/vm3", "/vm1", DeletePolicy::WholeRoot),
            restore_cmd("/vm3/tomcat", "/vm1/tomcat", DeletePolicy::WholeRoot),
            restore_cmd("/vm3/tomcat/rubis", "/vm1/tomcat/rubis", DeletePolicy::WholeRoot),
            start_cmd("/vm3/tomcat"),
            start_cmd("/vm3/tomcat/rubis"),
        ]
    );
}

#[tokio::test]
async fn test_restore_to_an_existing_machine() {
    let f = Fixture::new();
    f.set_status("/vm2", InstanceStatus::DeployedStarted);

    f.manager
        .restore_to("lamp", "/vm1/tomcat/rubis", Some("/vm2/web/shop"), Some("0"))
        .await
        .unwrap();
    assert!(f.exists("/vm2/web/shop"));
    assert!(f.iaas.running_machines().is_empty());

    let sent: Vec<Command> = f.sent().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        sent,
        vec![
            deploy_cmd("/vm2/web"),
            deploy_cmd("/vm2/web/shop"),
            restore_cmd("/vm2/web", "/vm1/tomcat", DeletePolicy::InstanceOnly),
            restore_cmd("/vm2/web/shop", "/vm1/tomcat/rubis", DeletePolicy::InstanceOnly),
            start_cmd("/vm2/web"),
            start_cmd("/vm2/web/shop"),
        ]
    );
}

#[tokio::test]
async fn test_restore_to_a_reused_instance() {
    let f = Fixture::new();
    f.manager
        .add_instance(
            "lamp",
            Some("/vm2"),
            &InstanceDescription::new("tomcat", "tomcat")
                .with_child(InstanceDescription::new("rubis", "war")),
        )
        .await
        .unwrap();
    f.set_status("/vm2", InstanceStatus::DeployedStarted);
    f.manager.flush_all().await;
    f.sent();
    let count = f.instance_count();

    // Started targets are never overwritten
    f.set_status("/vm2/tomcat/rubis", InstanceStatus::DeployedStarted);
    assert!(matches!(
        f.manager
            .restore_to("lamp", "/vm1/tomcat/rubis", Some("/vm2/tomcat/rubis"), Some("1"))
            .await,
        Err(DmError::UnauthorizedAction(_))
    ));

    f.set_status("/vm2/tomcat/rubis", InstanceStatus::DeployedStopped);
    f.manager
        .restore_to("lamp", "/vm1/tomcat/rubis", Some("/vm2/tomcat/rubis"), Some("1"))
        .await
        .unwrap();
    assert_eq!(f.instance_count(), count);
    let sent: Vec<Command> = f.sent().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        sent,
        vec![
            restore_cmd("/vm2/tomcat/rubis", "/vm1/tomcat/rubis", DeletePolicy::KeepAll),
            start_cmd("/vm2/tomcat/rubis"),
        ]
    );

    // A not deployed target is deployed first
    f.set_status("/vm2/tomcat/rubis", InstanceStatus::NotDeployed);
    f.manager
        .restore_to("lamp", "/vm1/tomcat/rubis", Some("/vm2/tomcat/rubis"), Some("1"))
        .await
        .unwrap();
    let sent: Vec<Command> = f.sent().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        sent,
        vec![
            deploy_cmd("/vm2/tomcat"),
            deploy_cmd("/vm2/tomcat/rubis"),
            restore_cmd("/vm2/tomcat/rubis", "/vm1/tomcat/rubis", DeletePolicy::KeepAll),
            start_cmd("/vm2/tomcat/rubis"),
        ]
    );
}

#[tokio::test]
async fn test_check_states_flags_silent_machines() {
    let f = Fixture::new();
    let mut events = f.events.subscribe();
    f.set_status("/vm1", InstanceStatus::DeployedStarted);

    for _ in 0..THRESHOLD {
        f.manager.check_states();
        assert_eq!(f.status("/vm1"), InstanceStatus::DeployedStarted);
    }
    f.manager.check_states();
    assert_eq!(f.status("/vm1"), InstanceStatus::Problem);
    assert_eq!(f.status("/vm2"), InstanceStatus::NotDeployed);

    let mut flagged = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let DmEvent::MachineProblem { root_instance, .. } = event.event {
            flagged.push(root_instance);
        }
    }
    assert_eq!(flagged, vec!["vm1".to_string()]);
}

#[test]
fn test_list_children() {
    let f = Fixture::new();
    let paths = |snapshots: Vec<agent_protocol::InstanceSnapshot>| {
        snapshots.into_iter().map(|s| s.path).collect::<Vec<_>>()
    };

    assert_eq!(paths(f.manager.list_children("lamp", None, false).unwrap()), vec!["/vm1", "/vm2"]);
    assert_eq!(
        paths(f.manager.list_children("lamp", None, true).unwrap()),
        vec!["/vm1", "/vm1/tomcat", "/vm1/tomcat/rubis", "/vm2", "/vm2/mysql"]
    );
    assert_eq!(
        paths(f.manager.list_children("lamp", Some("/vm1"), false).unwrap()),
        vec!["/vm1/tomcat"]
    );
    assert_eq!(
        paths(f.manager.list_children("lamp", Some("/vm1"), true).unwrap()),
        vec!["/vm1/tomcat", "/vm1/tomcat/rubis"]
    );
}

#[test]
fn test_component_queries() {
    let f = Fixture::new();
    assert_eq!(
        f.manager.components("lamp").unwrap(),
        vec!["mysql", "tomcat", "vm", "war"]
    );
    assert_eq!(f.manager.possibilities("lamp", None).unwrap(), vec!["vm"]);
    assert_eq!(
        f.manager.possibilities("lamp", Some("/vm2")).unwrap(),
        vec!["mysql", "tomcat"]
    );
    assert_eq!(
        f.manager.possible_parents("lamp", "war").unwrap(),
        vec!["/vm1/tomcat"]
    );
    assert!(matches!(
        f.manager.possible_parents("lamp", "php"),
        Err(DmError::InvalidParameter(_))
    ));

    let blank = f.manager.new_instance("lamp", "tomcat").unwrap();
    assert_eq!(blank.component, "tomcat");
    assert!(blank.name.is_empty());
    assert_eq!(blank.exports["port"], "8080");
}

#[tokio::test]
async fn test_request_migration() {
    let f = Fixture::new();
    f.set_status("/vm1", InstanceStatus::DeployedStarted);
    f.set_status("/vm1/tomcat/rubis", InstanceStatus::DeployedStarted);

    assert!(matches!(
        f.manager
            .request_migration("lamp", "/vm1/tomcat/rubis", Some("/vm2"), Some("1"))
            .await,
        Err(DmError::InvalidParameter(_))
    ));
    assert!(f.sent().is_empty());

    f.manager
        .request_migration("lamp", "/vm1/tomcat/rubis", Some("/vm3/t/r"), Some("1"))
        .await
        .unwrap();
    assert_eq!(
        f.sent(),
        vec![(
            "vm1".to_string(),
            Command::Migrate {
                instance_path: "/vm1/tomcat/rubis".into(),
                dest_path: Some("/vm3/t/r".into()),
                delete_old_root: DeletePolicy::WholeRoot,
            }
        )]
    );

    // Nor onto itself
    assert!(matches!(
        f.manager
            .request_migration("lamp", "/vm1/tomcat/rubis", Some("/vm1/tomcat/rubis"), Some("1"))
            .await,
        Err(DmError::InvalidParameter(_))
    ));
    assert!(f.sent().is_empty());

    // Roots move with their machine, not through a migration
    assert!(matches!(
        f.manager.request_migration("lamp", "/vm1", None, Some("1")).await,
        Err(DmError::UnauthorizedAction(_))
    ));
}
