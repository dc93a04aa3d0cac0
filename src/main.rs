use cart_app_server::cart::AppState;
use cart_app_server::config::Config;
use cart_app_server::logging::init_logging;
use cart_app_server::router::{create_app_router, ServerState};
use cart_app_server::session::SessionHooks;
use cart_app_server::widget::WidgetAssets;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env()?;
    let addr = config.bind_socket()?;

    // Initialize application state
    let widgets = WidgetAssets::locate(config.assets_dir.clone());
    info!(assets_dir = %widgets.assets_dir().display(), "widget assets");
    let app = Arc::new(AppState::new(widgets));

    let hooks = SessionHooks::new()
        .on_create(|session| info!(session_id = %session.session_id(), "session opened"))
        .on_close(|session| {
            let lifetime = chrono::Utc::now() - session.created_at();
            info!(
                session_id = %session.session_id(),
                lifetime_secs = lifetime.num_seconds(),
                "session closed"
            );
        });
    let server = ServerState::new(app, hooks);
    let transport = server.transport.clone();

    // Build application router with all routes and middleware
    let router = create_app_router(server);

    // Start the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "server running");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
            // Ends open push streams so in-flight connections can drain.
            let closed = transport.shutdown();
            info!(closed, "shutting down");
        })
        .await?;

    Ok(())
}
