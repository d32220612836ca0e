use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::auth::auth_middleware;
use crate::routes;
use crate::state::AppState;

/// Everything under /api/v1 requires a bearer token; /health does not.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/subjects", get(routes::list_subjects))
        .route("/education-levels", get(routes::list_education_levels))
        .route("/courses/generate", post(routes::generate_course))
        .route("/assessment/analyze", post(routes::analyze_assessment))
        .route("/assessment/sessions", post(routes::start_session))
        .route("/assessment/sessions/{id}", get(routes::get_session))
        .route("/assessment/sessions/{id}/messages", post(routes::send_message))
        .route(
            "/auth/roles",
            get(routes::get_roles).post(routes::add_role).put(routes::switch_role),
        )
        .route("/auth/roles/{role}", delete(routes::remove_role))
        .route("/gamification/profile", get(routes::get_gamification))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api/v1", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: Arc<AppState>, port: u16) -> io::Result<()> {
    let app = build_router(state);

    let address = format!("0.0.0.0:{port}");
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
