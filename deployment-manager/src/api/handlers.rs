use super::AppState;
use crate::error::DmError;
use crate::manager::Action;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    Json,
};
use deployment_core::{ApplicationDescription, InstanceDescription};
use log::{debug, info};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Default, Deserialize)]
pub struct InstanceQuery {
    #[serde(rename = "instance-path")]
    instance_path: Option<String>,
    #[serde(rename = "dest-path")]
    dest_path: Option<String>,
    #[serde(rename = "delete-old-root")]
    delete_old_root: Option<String>,
    #[serde(rename = "all-children", default)]
    all_children: bool,
}

impl InstanceQuery {
    fn required_path(&self) -> Result<&str, DmError> {
        self.instance_path
            .as_deref()
            .ok_or_else(|| DmError::InvalidParameter("Missing 'instance-path' parameter".into()))
    }
}

fn ok(msg: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "OK", "msg": msg}))
}

pub async fn health_check() -> &'static str {
    "OK"
}

// WebSocket Handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut rx = state.manager.events().subscribe();

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                debug!("WebSocket client lagged, {} events skipped", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let Ok(text) = serde_json::to_string(&event) else {
            continue;
        };
        if socket.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}

// Application handlers
pub async fn list_applications(State(state): State<AppState>) -> impl IntoResponse {
    let names = state.manager.registry().names();
    Json(serde_json::json!({"status": "OK", "applications": names}))
}

pub async fn register_application(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(description): Json<ApplicationDescription>,
) -> Result<impl IntoResponse, DmError> {
    if description.name != name {
        return Err(DmError::InvalidParameter(format!(
            "The description is about {}, not {}",
            description.name, name
        )));
    }
    state.manager.register_application(&description)?;
    Ok(ok("Application registered"))
}

// Instance handlers
pub async fn perform(
    State(state): State<AppState>,
    Path((name, action)): Path<(String, String)>,
    Query(query): Query<InstanceQuery>,
) -> Result<impl IntoResponse, DmError> {
    let action: Action = action.parse()?;
    let instance_path = query.required_path()?;
    info!("{:?} requested on {} in {}", action, instance_path, name);
    state.manager.perform(&name, action, instance_path).await?;
    Ok(ok("Request sent"))
}

pub async fn add_instance(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<InstanceQuery>,
    Json(instance): Json<InstanceDescription>,
) -> Result<impl IntoResponse, DmError> {
    let path = state
        .manager
        .add_instance(&name, query.instance_path.as_deref(), &instance)
        .await?;
    Ok(Json(serde_json::json!({"status": "OK", "path": path})))
}

pub async fn migrate(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<impl IntoResponse, DmError> {
    state
        .manager
        .request_migration(
            &name,
            query.required_path()?,
            query.dest_path.as_deref(),
            query.delete_old_root.as_deref(),
        )
        .await?;
    Ok(ok("Migration requested"))
}

pub async fn restore(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<impl IntoResponse, DmError> {
    state
        .manager
        .restore_to(
            &name,
            query.required_path()?,
            query.dest_path.as_deref(),
            query.delete_old_root.as_deref(),
        )
        .await?;
    Ok(ok("Restore requested"))
}

// Bulk handlers
pub async fn deploy_all(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<impl IntoResponse, DmError> {
    let (app, scope) = state.manager.resolve_scope(&name, query.instance_path.as_deref())?;
    state.manager.deploy_all(&app, scope).await?;
    Ok(ok("Requests sent"))
}

pub async fn deploy_and_start_all(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<impl IntoResponse, DmError> {
    let (app, scope) = state.manager.resolve_scope(&name, query.instance_path.as_deref())?;
    state.manager.deploy_and_start_all(&app, scope).await?;
    Ok(ok("Requests sent"))
}

pub async fn start_all(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<impl IntoResponse, DmError> {
    let (app, scope) = state.manager.resolve_scope(&name, query.instance_path.as_deref())?;
    state.manager.start_all(&app, scope).await?;
    Ok(ok("Requests sent"))
}

pub async fn stop_all(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<impl IntoResponse, DmError> {
    let (app, scope) = state.manager.resolve_scope(&name, query.instance_path.as_deref())?;
    state.manager.stop_all(&app, scope).await?;
    Ok(ok("Requests sent"))
}

pub async fn undeploy_all(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<impl IntoResponse, DmError> {
    let (app, scope) = state.manager.resolve_scope(&name, query.instance_path.as_deref())?;
    state.manager.undeploy_all(&app, scope).await?;
    Ok(ok("Requests sent"))
}

// Model queries
pub async fn children(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<impl IntoResponse, DmError> {
    let instances =
        state
            .manager
            .list_children(&name, query.instance_path.as_deref(), query.all_children)?;
    Ok(Json(serde_json::json!({"status": "OK", "instances": instances})))
}

pub async fn components(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, DmError> {
    let components = state.manager.components(&name)?;
    Ok(Json(serde_json::json!({"status": "OK", "components": components})))
}

pub async fn possibilities(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<impl IntoResponse, DmError> {
    let components = state
        .manager
        .possibilities(&name, query.instance_path.as_deref())?;
    Ok(Json(serde_json::json!({"status": "OK", "components": components})))
}

pub async fn possible_parents(
    State(state): State<AppState>,
    Path((name, component)): Path<(String, String)>,
) -> Result<impl IntoResponse, DmError> {
    let paths = state.manager.possible_parents(&name, &component)?;
    Ok(Json(serde_json::json!({"status": "OK", "paths": paths})))
}

pub async fn new_instance(
    State(state): State<AppState>,
    Path((name, component)): Path<(String, String)>,
) -> Result<impl IntoResponse, DmError> {
    let instance = state.manager.new_instance(&name, &component)?;
    Ok(Json(serde_json::json!({"status": "OK", "instance": instance})))
}
