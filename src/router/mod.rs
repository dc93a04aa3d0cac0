//! Routing module for the shopping cart application

use std::sync::Arc;

use axum::{http::HeaderName, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::cart::state::SharedState;
use crate::mcp::handler_factory;
use crate::session::{SessionHooks, SessionRegistry};
use crate::transport::{SessionTransport, SESSION_HEADER};

/// State shared by every HTTP handler
#[derive(Clone)]
pub struct ServerState {
    pub app: SharedState,
    pub transport: Arc<SessionTransport>,
}

impl ServerState {
    /// Wires a fresh session registry to MCP handlers bound to `app`.
    pub fn new(app: SharedState, hooks: SessionHooks) -> Self {
        let registry = Arc::new(SessionRegistry::new(hooks));
        let transport = SessionTransport::new(registry, handler_factory(app.clone()));
        Self {
            app,
            transport: Arc::new(transport),
        }
    }
}

/// Creates and configures the application router with all routes and middleware
pub fn create_app_router(state: ServerState) -> Router {
    // Middleware: CORS (Permissive for local dev). Browser hosts must be able
    // to read the session header.
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_HEADER)]);

    // Routes
    Router::new()
        .merge(crate::transport::routes())
        .route("/health", get(health))
        .layer(axum::middleware::from_fn(
            crate::logging::request_logging_middleware,
        ))
        .layer(cors_layer)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
