//! REST API
//!
//! Operator façade over the [`Manager`]: application registration, instance
//! actions, model queries and a WebSocket stream of the DM events.

mod handlers;

use crate::error::DmError;
use crate::manager::Manager;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{debug, error, info};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// App State to share with routes
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Manager>,
}

pub fn router(manager: Arc<Manager>) -> Router {
    let app_state = AppState { manager };

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ws", get(handlers::ws_handler))
        .route("/applications", get(handlers::list_applications))
        .route("/applications/:name", post(handlers::register_application))
        .route("/app/:name/add", post(handlers::add_instance))
        .route("/app/:name/migrate", post(handlers::migrate))
        .route("/app/:name/restore", post(handlers::restore))
        .route("/app/:name/deploy-all", post(handlers::deploy_all))
        .route("/app/:name/deploy-and-start-all", post(handlers::deploy_and_start_all))
        .route("/app/:name/start-all", post(handlers::start_all))
        .route("/app/:name/stop-all", post(handlers::stop_all))
        .route("/app/:name/undeploy-all", post(handlers::undeploy_all))
        .route("/app/:name/children", get(handlers::children))
        .route("/app/:name/components", get(handlers::components))
        .route("/app/:name/possibilities", get(handlers::possibilities))
        .route("/app/:name/component/:component", get(handlers::possible_parents))
        .route("/app/:name/component/:component/new", get(handlers::new_instance))
        .route("/app/:name/:action", post(handlers::perform))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

pub async fn run_api_server(manager: Arc<Manager>, port: u16) -> anyhow::Result<()> {
    let app = router(manager);

    let addr = format!("0.0.0.0:{}", port);
    info!("API Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

impl IntoResponse for DmError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let msg = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Unexpected failure of a REST request");
            debug!("{:#}", self);
            "Internal error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({"status": "ERROR", "msg": msg}))).into_response()
    }
}
