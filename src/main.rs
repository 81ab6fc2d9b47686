use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::signal;

use subscope::{config, handlers, middleware, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Settings::new()?;

    middleware::init_logging(&config.log_level, &config.log_format)?;

    tracing::info!("Starting subscope v{}", env!("CARGO_PKG_VERSION"));

    let app_state = AppState::new(config.clone()).await?;

    let cors_layer = middleware::create_cors_layer(config.cors_allow_origins.clone());

    let api_routes = Router::new()
        .route("/api/search", get(handlers::search_handlers::search))
        .route("/api/status", get(handlers::status_handlers::status))
        .route("/api/history", get(handlers::history_handlers::history))
        .route("/api/recent", get(handlers::history_handlers::recent))
        .route_layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::rate_limit_middleware,
        ));

    let app = Router::new()
        .route("/", get(handlers::service_info))
        .route("/healthz", get(handlers::health_check))
        .merge(api_routes)
        .with_state(app_state)
        .layer(axum::middleware::from_fn(
            middleware::request_logging_middleware,
        ))
        .layer(middleware::create_logging_layer())
        .layer(cors_layer);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    tracing::info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
